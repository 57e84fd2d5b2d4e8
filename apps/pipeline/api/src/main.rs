//! Pipeline API Service - Entry Point

#[tokio::main]
async fn main() -> eyre::Result<()> {
    pipeline_api::run().await
}
