use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port: u16 = std::env::var("VITRINA_HTTP_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(7878);
    let data_folder = std::env::var("VITRINA_DATA_FOLDER").unwrap_or_else(|_| "data".to_string());
    let whatsapp_number =
        std::env::var("VITRINA_WHATSAPP_NUMBER").unwrap_or_else(|_| "5491123456789".to_string());
    info!(
        target: "vitrina",
        "Vitrina starting: RUST_LOG='{}', http_port={}, data_root='{}', whatsapp_number='{}'",
        rust_log, http_port, data_folder, whatsapp_number
    );

    vitrina::server::run_with_config(http_port, &data_folder, &whatsapp_number).await
}
