pub mod bridge;
pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const CMD_MOUNT: &str = "mount";
pub const CMD_LOGOUT: &str = "logout";
pub const CMD_REQUEST: &str = "request";
pub const CMD_STATUS: &str = "status";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("authbridge")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new(CMD_MOUNT)
                .about("Load a page URL: capture the handoff, validate, and render the guard")
                .arg(
                    Arg::new("url")
                        .long("url")
                        .help("Page URL as the browser would load it, may carry ?auth_token=<jwt>")
                        .env("AUTHBRIDGE_URL")
                        .required(true),
                )
                .arg(
                    Arg::new("content")
                        .long("content")
                        .help("Protected content to render when authenticated")
                        .default_value("Protected content"),
                )
                .arg(
                    Arg::new("fallback")
                        .long("fallback")
                        .help("Shown instead of the default notice when unauthenticated"),
                ),
        )
        .subcommand(
            Command::new(CMD_LOGOUT)
                .about("Clear the credential, notify the API, and return to the parent site"),
        )
        .subcommand(
            Command::new(CMD_REQUEST)
                .about("Send one API call through the authenticated transport")
                .arg(
                    Arg::new("method")
                        .help("HTTP method, example: GET")
                        .required(true),
                )
                .arg(
                    Arg::new("path")
                        .help("API path, example: /chat/rooms")
                        .required(true),
                )
                .arg(
                    Arg::new("body")
                        .long("body")
                        .help("JSON request body"),
                ),
        )
        .subcommand(
            Command::new(CMD_STATUS).about("Report whether a bearer credential is stored"),
        );

    let command = bridge::with_args(command);
    logging::with_args(command)
}
