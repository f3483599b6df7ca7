pub mod logout;
pub mod mount;
pub mod request;
pub mod status;

// Internal "interpreter" for `Action`; the match lives in `run` so this file
// only grows by one variant per action.
mod run;

use crate::bridge::{AuthSession, BridgeConfig, FileTokenStore, HostCommand, MemoryHost, Variant};
use anyhow::{Context, Result};
use reqwest::cookie::Jar;
use secrecy::{ExposeSecret, SecretString};
use std::{path::PathBuf, sync::Arc};
use url::Url;

#[derive(Debug)]
pub enum Action {
    Mount(mount::Args),
    Logout(logout::Args),
    Request(request::Args),
    Status(status::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> Result<()> {
        run::execute(self).await
    }
}

/// Settings shared by every action that talks to the API.
#[derive(Debug)]
pub struct BridgeArgs {
    pub config: BridgeConfig,
    pub token_file: PathBuf,
    /// Seeds the cookie jar for the cookie variant.
    pub cookie: Option<SecretString>,
}

impl BridgeArgs {
    /// Wire a session against an in-memory host that starts at `location`.
    /// Navigation is recorded, not performed; actions print it with [`report`].
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn connect(&self, location: Url) -> Result<(AuthSession, Arc<MemoryHost>)> {
        let store = Arc::new(FileTokenStore::new(&self.token_file));

        let jar = Arc::new(Jar::default());
        if let Some(cookie) = &self.cookie {
            if self.config.variant == Variant::Cookie {
                jar.add_cookie_str(cookie.expose_secret(), &self.config.api_base_url);
            }
        }

        let host = Arc::new(MemoryHost::new(location));
        let session = AuthSession::from_config(&self.config, store, jar, host.clone())
            .context("failed to build the API client")?;
        Ok((session, host))
    }
}

/// Print the navigation the session asked for, in order.
pub fn report(commands: &[HostCommand]) {
    for command in commands {
        println!("{command}");
    }
}
