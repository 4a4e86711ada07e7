use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use csvdata::config::{has_flag, ServerConfig, USAGE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }
    let config = ServerConfig::from_env_and_args(&args)?;

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "csvdata",
        "csvdata starting: RUST_LOG='{}', bind={}, http_port={}, data_dir='{}', metadata_dir='{}'",
        rust_log,
        config.bind,
        config.http_port,
        config.data_dir.display(),
        config.metadata_dir.display()
    );

    csvdata::server::run(config).await
}
