//! Story Worker Service - Entry Point

#[tokio::main]
async fn main() -> eyre::Result<()> {
    pipeline_story_worker::run().await
}
