use tracing_subscriber::EnvFilter;

/// Install the process-wide fmt subscriber on stderr.
///
/// `RUST_LOG` wins when set; otherwise `-v` flags pick the level.
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
