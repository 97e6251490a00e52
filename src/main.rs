use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    netclip_cli::cli::app::run().await
}
