//! certsweep - certificate inventory from the command line.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    certsweep_cli::run().await
}
