/// Installs a `tracing` subscriber printing to stderr, filtered by `RUST_LOG`
/// and defaulting to `info`.
///
/// Calling it again once a global subscriber is set does nothing.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr));

    if registry.try_init().is_err() {
        tracing::debug!("A global subscriber is already installed");
    }

    Ok(())
}
