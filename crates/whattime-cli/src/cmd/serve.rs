use anyhow::Result;
use whattime_core::Config;
use whattime_server::AppState;

pub fn run(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.host.clone());
    let port = port.unwrap_or(config.port);
    tracing::info!(
        max_sleep_time_secs = config.max_sleep_time_secs,
        default_release_after = %config.default_release_after,
        "starting action provider"
    );
    let state = AppState::open(config)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(whattime_server::serve(state, &host, port))
}
