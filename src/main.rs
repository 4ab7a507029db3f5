fn main() -> anyhow::Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .with_colors(true)
        .with_threads(true)
        .with_local_timestamps()
        .init()
        .expect("failed to build logger instance");

    // optional folder to load on startup
    let initial_folder = std::env::args_os().nth(1).map(std::path::PathBuf::from);

    let channels = subplay_bridge::BridgeChannels::default();
    let backend = subplay_backend::run(channels.backend_rx, channels.backend_tx);
    subplay_frontend::run(channels.frontend_rx, channels.frontend_tx, initial_folder)?;

    if backend.join().is_err() {
        log::error!("Backend thread panicked");
    }
    Ok(())
}
