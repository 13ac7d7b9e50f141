use std::sync::Once;

use tracing_subscriber::filter::{Directive, LevelFilter};

static TRACING_INIT: Once = Once::new();

/// Initializes the global tracing subscriber. `RUST_LOG` wins over `filter`;
/// an unparsable directive falls back to `info`.
pub fn init_tracing(filter: &str) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let directive: Directive = filter
            .parse()
            .unwrap_or_else(|_| LevelFilter::INFO.into());
        let filter = EnvFilter::from_default_env().add_directive(directive);

        // A subscriber installed by the host application keeps precedence.
        let _ = fmt().with_env_filter(filter).try_init();
    });
}
