//! Session initialization binary.

use tg_relay::commands::init_session;
use tg_relay::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Config::load_dotenv();
    tracing_subscriber::fmt::init();
    let config = Config::load()?;
    init_session::run(&config).await?;
    Ok(())
}
