use crate::{
    bridge::{BridgeConfig, Variant},
    cli::{
        actions::{logout, mount, request, status, Action, BridgeArgs},
        commands::{bridge as args, CMD_LOGOUT, CMD_MOUNT, CMD_REQUEST, CMD_STATUS},
    },
};
use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};

/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((CMD_MOUNT, sub)) => Ok(Action::Mount(mount::Args {
            bridge: bridge_args(sub)?,
            url: sub
                .get_one::<String>("url")
                .cloned()
                .context("missing required argument: --url")?,
            content: sub
                .get_one::<String>("content")
                .cloned()
                .unwrap_or_default(),
            fallback: sub.get_one::<String>("fallback").cloned(),
        })),
        Some((CMD_LOGOUT, sub)) => Ok(Action::Logout(logout::Args {
            bridge: bridge_args(sub)?,
        })),
        Some((CMD_REQUEST, sub)) => Ok(Action::Request(request::Args {
            bridge: bridge_args(sub)?,
            method: sub
                .get_one::<String>("method")
                .cloned()
                .context("missing required argument: METHOD")?,
            path: sub
                .get_one::<String>("path")
                .cloned()
                .context("missing required argument: PATH")?,
            body: sub.get_one::<String>("body").cloned(),
        })),
        Some((CMD_STATUS, sub)) => Ok(Action::Status(status::Args {
            token_file: token_file(sub),
        })),
        Some((other, _)) => Err(anyhow!("unknown command: {other}")),
        None => Err(anyhow!("missing command, see --help")),
    }
}

fn bridge_args(matches: &ArgMatches) -> Result<BridgeArgs> {
    let api_base_url = matches
        .get_one::<String>(args::ARG_API_BASE_URL)
        .context("missing required argument: --api-base-url")?;
    let parent_origin = matches
        .get_one::<String>(args::ARG_PARENT_ORIGIN)
        .context("missing required argument: --parent-origin")?;

    let variant = matches
        .get_one::<String>(args::ARG_VARIANT)
        .map_or(Ok(Variant::default()), |value| value.parse::<Variant>())?;

    let mut config = BridgeConfig::new(api_base_url, parent_origin)
        .context("invalid AUTHBRIDGE_API_BASE_URL or AUTHBRIDGE_PARENT_ORIGIN")?
        .with_variant(variant)
        .with_redirect_on_failure(!matches.get_flag(args::ARG_NO_REDIRECT));

    if let Some(path) = matches.get_one::<String>(args::ARG_SIGN_IN_PATH) {
        config = config.with_sign_in_path(path);
    }
    if let Some(ms) = matches.get_one::<u64>(args::ARG_REDIRECT_GRACE_MS) {
        config = config.with_redirect_grace(Duration::from_millis(*ms));
    }
    if let Some(ms) = matches.get_one::<u64>(args::ARG_VALIDATE_TIMEOUT_MS) {
        config = config.with_validate_timeout(Duration::from_millis(*ms));
    }

    Ok(BridgeArgs {
        config,
        token_file: token_file(matches),
        cookie: matches
            .get_one::<String>(args::ARG_COOKIE)
            .map(|cookie| SecretString::from(cookie.clone())),
    })
}

fn token_file(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<String>(args::ARG_TOKEN_FILE)
        .map_or_else(|| PathBuf::from("authbridge-token.json"), PathBuf::from)
}
