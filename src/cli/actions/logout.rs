use crate::cli::actions::{report, BridgeArgs};
use anyhow::Result;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub bridge: BridgeArgs,
}

/// Log out and print where the user is sent.
/// # Errors
/// Returns an error if the client cannot be built.
pub async fn execute(args: Args) -> Result<()> {
    // The page location plays no part in logout.
    let location = Url::parse("about:blank")?;
    let (session, host) = args.bridge.connect(location)?;

    session.logout().await;
    println!("session: logged out");
    report(&host.executed());
    Ok(())
}
