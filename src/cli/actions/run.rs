use crate::cli::actions::{logout, mount, request, status, Action};
use anyhow::Result;

/// Execute the provided action.
// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Mount(args) => mount::execute(args).await,
        Action::Logout(args) => logout::execute(args).await,
        Action::Request(args) => request::execute(args).await,
        Action::Status(args) => status::execute(&args),
    }
}
