use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "recipe_finder_core=info";

/// Installs a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `filter`, which falls back to
/// `recipe_finder_core=info`. Returns false if a subscriber was already
/// installed (by an earlier call or by the host application).
pub fn init_logging(filter: Option<&str>, json: bool) -> bool {
    let env_filter = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| filter.map(str::to_owned))
        .unwrap_or_else(|| DEFAULT_FILTER.to_owned());
    let env_filter = EnvFilter::try_new(&env_filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    let installed = if json {
        builder.with_target(false).json().try_init()
    } else {
        builder.try_init()
    };
    installed.is_ok()
}
