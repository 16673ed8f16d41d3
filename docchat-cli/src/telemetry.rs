use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "docchat=info,docchat_rag=info,warn";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the default filter. Logs go to stderr so
/// answers on stdout stay clean.
pub fn init(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder =
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}
