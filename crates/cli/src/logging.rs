//! Logging setup for CLI commands.

/// Console logging with an INFO default; RUST_LOG overrides.
pub fn init_cli_logging() {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
    )
    .with_writer(std::io::stderr)
    .init();
}
