use crate::{bridge::TransportError, cli::actions::BridgeArgs};
use anyhow::{bail, Context, Result};
use reqwest::Method;
use serde_json::Value;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub bridge: BridgeArgs,
    pub method: String,
    pub path: String,
    pub body: Option<String>,
}

/// Send one call through the transport and print the JSON reply.
/// # Errors
/// Returns an error for invalid input, transport failures, and 401 responses.
pub async fn execute(args: Args) -> Result<()> {
    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method: {}", args.method))?;
    let body: Option<Value> = args
        .body
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .context("--body must be valid JSON")?;

    let (session, _host) = args.bridge.connect(Url::parse("about:blank")?)?;

    match session
        .transport()
        .request(method, &args.path, body.as_ref())
        .await
    {
        Ok((status, value)) => {
            println!("status: {}", status.as_u16());
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(TransportError::Unauthorized) => {
            println!("session invalidated: stored credential cleared");
            bail!("request was not authorized (401)")
        }
        Err(err) => Err(err).context("request failed"),
    }
}
