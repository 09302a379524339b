use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Installs the global `tracing` subscriber once per process.
///
/// Verbosity follows `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    if INITIALISED.set(()).is_err() {
        return;
    }

    let ansi = std::io::stderr().is_terminal();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(ansi)
        .with_writer(std::io::stderr);

    if let Err(err) = Registry::default().with(filter).with(fmt_layer).try_init() {
        eprintln!("failed to initialise tracing subscriber: {err}");
    }
}
