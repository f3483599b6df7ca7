use clap::{Arg, ArgAction, Command};

pub const ARG_API_BASE_URL: &str = "api-base-url";
pub const ARG_PARENT_ORIGIN: &str = "parent-origin";
pub const ARG_SIGN_IN_PATH: &str = "sign-in-path";
pub const ARG_VARIANT: &str = "variant";
pub const ARG_TOKEN_FILE: &str = "token-file";
pub const ARG_REDIRECT_GRACE_MS: &str = "redirect-grace-ms";
pub const ARG_VALIDATE_TIMEOUT_MS: &str = "validate-timeout-ms";
pub const ARG_NO_REDIRECT: &str = "no-redirect";
pub const ARG_COOKIE: &str = "cookie";

pub fn with_args(command: Command) -> Command {
    let command = with_origin_args(command);
    with_session_args(command)
}

fn with_origin_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_API_BASE_URL)
                .long(ARG_API_BASE_URL)
                .help("API base URL, example: https://api.example.com")
                .env("AUTHBRIDGE_API_BASE_URL")
                .global(true),
        )
        .arg(
            Arg::new(ARG_PARENT_ORIGIN)
                .long(ARG_PARENT_ORIGIN)
                .help("Parent site origin that owns sign-in, example: https://example.com")
                .env("AUTHBRIDGE_PARENT_ORIGIN")
                .global(true),
        )
        .arg(
            Arg::new(ARG_SIGN_IN_PATH)
                .long(ARG_SIGN_IN_PATH)
                .help("Sign-in path on the parent site")
                .env("AUTHBRIDGE_SIGN_IN_PATH")
                .default_value("/auth/signin")
                .global(true),
        )
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VARIANT)
                .long(ARG_VARIANT)
                .help("Credential variant: bearer (JWT in URL + Authorization header) or cookie")
                .env("AUTHBRIDGE_VARIANT")
                .value_parser(["bearer", "cookie"])
                .default_value("bearer")
                .global(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_FILE)
                .long(ARG_TOKEN_FILE)
                .help("File holding the persisted bearer credential")
                .env("AUTHBRIDGE_TOKEN_FILE")
                .default_value("authbridge-token.json")
                .global(true),
        )
        .arg(
            Arg::new(ARG_REDIRECT_GRACE_MS)
                .long(ARG_REDIRECT_GRACE_MS)
                .help("Delay before redirecting to sign-in after a failed validation")
                .env("AUTHBRIDGE_REDIRECT_GRACE_MS")
                .default_value("0")
                .value_parser(clap::value_parser!(u64))
                .global(true),
        )
        .arg(
            Arg::new(ARG_VALIDATE_TIMEOUT_MS)
                .long(ARG_VALIDATE_TIMEOUT_MS)
                .help("Validation timeout; expiry counts as unreachable")
                .env("AUTHBRIDGE_VALIDATE_TIMEOUT_MS")
                .default_value("10000")
                .value_parser(clap::value_parser!(u64).range(1..))
                .global(true),
        )
        .arg(
            Arg::new(ARG_NO_REDIRECT)
                .long(ARG_NO_REDIRECT)
                .help("Show the fallback instead of redirecting when validation fails")
                .env("AUTHBRIDGE_NO_REDIRECT")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new(ARG_COOKIE)
                .long(ARG_COOKIE)
                .help("Session cookie to seed the jar with (cookie variant), example: session=abc")
                .env("AUTHBRIDGE_COOKIE")
                .hide_env_values(true)
                .global(true),
        )
}
