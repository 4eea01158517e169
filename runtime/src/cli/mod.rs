//! CLI subcommand implementations for the pricescout binary.

pub mod scrape_cmd;
pub mod serve;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the service logs at info, or debug
/// with `--verbose`.
pub fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "pricescout={default_level},pricescout_runtime={default_level},\
             pricescout_core={default_level},tower_http=info"
        ))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
