pub mod actions;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod invoices;
pub mod state;
pub mod sync;
pub mod users;

#[cfg(test)]
mod test_support;

use tracing_subscriber::{fmt, EnvFilter};

pub use actions::Actions;
pub use config::ClientConfig;
pub use error::{ClientError, RemoteOperationError, Result};
pub use events::{StateMirror, Store, Subscription};
pub use state::AppState;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Calling it twice is harmless.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("shock_client=debug,shock_net=debug,shock_store=info,warn")
    });

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Shock client logging initialised");
    }
}
