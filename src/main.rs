use web_radio_lib::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file for PORT, RADIO_* settings
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[ENV] No .env loaded: {}", e);
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    web_radio_lib::serve(config).await
}
