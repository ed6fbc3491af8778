//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber for modshape.
///
/// The filter comes from the `MODSHAPE_LOG` environment variable and falls
/// back to `modshape=info`. Events use `modshape::host`, `modshape::probe`,
/// `modshape::scan` targets, so per-subsystem filtering works the obvious
/// way: `MODSHAPE_LOG=modshape::host=debug`.
///
/// Idempotent; later calls are no-ops.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env("MODSHAPE_LOG").unwrap_or_else(|_| EnvFilter::new("modshape=info"));

        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .with(filter)
            .init();
    });
}
