use agent_resolver::api::server::{start_server, AppState};
use agent_resolver::config::Settings;
use agent_resolver::registry::RegistryGateway;
use agent_resolver::resolver::Resolver;
use agent_resolver::storage::{CacheStore, ContentStoreClient};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

/// Agent interface resolver node
#[derive(Parser, Debug)]
#[clap(name = "agent-resolver", version)]
struct Args {
    /// Path to the configuration file
    #[clap(long, default_value = "config/resolver.toml")]
    config_path: PathBuf,

    /// HTTP port to listen on, overriding the configuration
    #[clap(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let mut settings = Settings::load(&args.config_path)?;
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    // Fail on unusable endpoints before binding anything.
    let chain_endpoint = settings.chain_endpoint()?;
    let store_endpoint = settings.content_store_endpoint()?;

    let cache = CacheStore::new(&settings.storage.cache_dir);
    cache.ensure_layout()?;
    log::info!("cache directory at {}", settings.storage.cache_dir.display());
    log::info!("content store at {}", store_endpoint);

    let registry = Arc::new(RegistryGateway::new(&chain_endpoint)?);
    let store = ContentStoreClient::new(&store_endpoint)?;
    let resolver = Arc::new(Resolver::new(cache, store));

    start_server(settings.server.port, AppState { registry, resolver }).await
}
