#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tradedesk::run().await
}
