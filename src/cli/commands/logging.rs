use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accepts a level name or its index (0 = error .. 4 = trace) from
/// `AUTHBRIDGE_LOG_LEVEL`; the count from repeated `-v` flags maps the same way.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        let level = level.trim().to_ascii_lowercase();
        if let Ok(index) = level.parse::<u8>() {
            return if usize::from(index) < LEVELS.len() {
                Ok(index)
            } else {
                Err(format!("log level index must be 0-{}", LEVELS.len() - 1))
            };
        }

        LEVELS
            .iter()
            .position(|name| *name == level)
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| format!("invalid log level, expected one of: {}", LEVELS.join(", ")))
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log verbosity on stderr: -v warn, -vv info, -vvv debug, -vvvv trace (default: error)")
            .env("AUTHBRIDGE_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}
