use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global fmt subscriber. Output goes to stderr so that CSV on
/// stdout stays machine readable; `RUST_LOG` overrides the default filter.
pub fn init() {
    let ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());
    fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,actix_web=warn,actix_server=warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(ansi)
        .init();
}
