#[tokio::main]
async fn main() -> anyhow::Result<()> {
    medreturn_server::start().await
}
