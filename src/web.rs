use env_logger::Env;
use tribes::Config;
use tribes::app;

/// Entry point for the HTTP server
///
/// Reads settings from the environment (`PORT`, `TRIBES_DATA_DIR`, ...) and
/// serves the JSON API until the process is stopped.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Error if the address cannot be bound
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    app::run(Config::from_env()).await
}
