mod facet_cmd;

pub use facet_cmd::FacetCli;
pub use facet_cmd::FacetCommand;
pub use facet_cmd::FacetReport;
pub use facet_cmd::FilterReport;
pub use facet_cmd::parse_filter_args;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "FACET_LOG";

/// Installs a compact stderr subscriber. Stdout stays reserved for command
/// output so `--json` reports remain parseable.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}
