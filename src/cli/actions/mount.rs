use crate::{
    bridge::{AuthGuard, AuthState, Host, HostCommand, UnauthenticatedReason},
    cli::actions::{report, BridgeArgs},
};
use anyhow::{Context, Result};
use tracing::debug;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub bridge: BridgeArgs,
    pub url: String,
    pub content: String,
    pub fallback: Option<String>,
}

/// What one page load ended with.
#[derive(Debug)]
struct PageLoad {
    view: String,
    state: AuthState,
    location: Url,
    commands: Vec<HostCommand>,
}

/// Run one page load and print what the page would show, then where it goes.
/// # Errors
/// Returns an error if the URL is invalid or the client cannot be built.
pub async fn execute(args: Args) -> Result<()> {
    let page = load(args).await?;

    println!("{}", page.view);
    match &page.state {
        AuthState::Authenticated(user) => {
            let name = user
                .str_field("name")
                .or_else(|| user.str_field("email"))
                .unwrap_or("unknown user");
            println!("session: authenticated as {name}");
        }
        AuthState::Unauthenticated(reason) => {
            println!("session: unauthenticated ({})", describe(*reason));
        }
        AuthState::Initializing => println!("session: initializing"),
    }
    println!("location: {}", page.location);
    report(&page.commands);

    Ok(())
}

async fn load(args: Args) -> Result<PageLoad> {
    let location = Url::parse(&args.url).context("invalid --url")?;
    let (session, host) = args.bridge.connect(location)?;

    let snapshot = session.mount().await;
    debug!(loading = snapshot.loading, "Mount finished");

    let commands = host.executed();
    let redirecting = commands
        .iter()
        .any(|command| matches!(command, HostCommand::Redirect { .. }));

    let mut guard = AuthGuard::new().redirecting(redirecting);
    if let Some(fallback) = args.fallback {
        guard = guard.with_fallback(fallback);
    }
    let view = guard.render(&snapshot, &args.content).to_string();

    Ok(PageLoad {
        view,
        state: session.state(),
        location: host.location(),
        commands,
    })
}

fn describe(reason: UnauthenticatedReason) -> &'static str {
    match reason {
        UnauthenticatedReason::Rejected => "credential rejected",
        UnauthenticatedReason::Unreachable => "API unreachable",
        UnauthenticatedReason::Invalidated => "session invalidated",
        UnauthenticatedReason::LoggedOut => "logged out",
    }
}
