use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: OnceCell<()> = OnceCell::new();

/// Install the tracing subscriber for binaries and tests. Library code only
/// emits events; the host application may install its own subscriber
/// instead, in which case this is never called.
///
/// `MORADIA_LOG` selects the filter (defaults to `info`), `MORADIA_LOG_JSON`
/// switches the output to machine-readable JSON lines.
pub fn init() {
    INIT.get_or_init(|| {
        // Route `log` records from sqlx and friends through tracing.
        let _ = tracing_log::LogTracer::init();

        let filter =
            EnvFilter::try_from_env("MORADIA_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

        if std::env::var_os("MORADIA_LOG_JSON").is_some() {
            let subscriber = fmt()
                .with_env_filter(filter)
                .with_target(true)
                .json()
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        } else {
            let subscriber = fmt().with_env_filter(filter).with_target(true).finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    });
}
