//! Email Worker Service - Entry Point

#[tokio::main]
async fn main() -> eyre::Result<()> {
    pipeline_email_worker::run().await
}
