use std::env;

use octofhir_launch_server::ServerBuilder;
use octofhir_launch_server::config::loader::{load_config, resolve_config_path};
use octofhir_launch_server::observability;

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    observability::init_tracing();

    let config_path = resolve_config_path(
        env::args().skip(1),
        env::var("OCTOFHIR_LAUNCH_CONFIG").ok(),
    );

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path,
        client_id = %cfg.client.client_id,
        redirect_uri = %cfg.client.redirect_uri,
        "Configuration loaded"
    );

    observability::apply_logging(&cfg.logging);

    let server = match ServerBuilder::new().with_config(cfg).build() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Server initialization failed: {e}");
            std::process::exit(2);
        }
    };

    if let Err(err) = server.run().await {
        eprintln!("Server error: {err}");
        std::process::exit(1);
    }
}
