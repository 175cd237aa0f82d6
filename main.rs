use clap::Parser;
use todo::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dot_env = dotenvy::dotenv();
    let config = Config::parse();
    init_tracing_subscriber()?;
    if let Err(e) = dot_env {
        info!(".env not used: {e}")
    }

    let store = TodoStore::open(&config.dbpath)?;
    info!("Opened store at {}", config.dbpath.display());

    Server::new(config.bind, store)?.serve().await
}
