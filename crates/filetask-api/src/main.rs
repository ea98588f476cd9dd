use filetask_core::Config;

// Use mimalloc as the global allocator for better performance and lower fragmentation,
// especially when running on musl-based systems inside containers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::load()?;

    // Validation, logging, backend connections and routes
    let (state, router) = filetask_api::setup::initialize_app(config).await?;

    filetask_api::setup::server::start_server(state, router).await?;

    Ok(())
}
