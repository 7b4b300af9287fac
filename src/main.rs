#[tokio::main]
async fn main() -> anyhow::Result<()> {
    webchat_lib::run().await
}
