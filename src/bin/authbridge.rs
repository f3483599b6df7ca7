use anyhow::Result;
use authbridge::cli::{self, telemetry};

// The bridge is single-threaded and suspend-on-I/O; one thread is enough.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let action = cli::start()?;

    let result = action.execute().await;

    telemetry::shutdown_tracer();

    result
}
