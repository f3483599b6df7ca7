use crate::bridge::{FileTokenStore, TokenStore};
use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug)]
pub struct Args {
    pub token_file: PathBuf,
}

/// Report whether a credential is stored. The value itself is never printed.
/// # Errors
/// Never fails today; kept fallible like every other action.
#[allow(clippy::unnecessary_wraps)]
pub fn execute(args: &Args) -> Result<()> {
    let store = FileTokenStore::new(&args.token_file);
    let state = if store.get().is_some() {
        "present"
    } else {
        "absent"
    };
    println!("credential: {state} ({})", store.path().display());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bridge::Credential;

    #[test]
    fn reports_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            token_file: dir.path().join("token.json"),
        };
        assert!(execute(&args).is_ok());

        FileTokenStore::new(&args.token_file)
            .set(&Credential::new("abc.def.ghi"))
            .unwrap();
        assert!(execute(&args).is_ok());
    }
}
