//! tokenprobe - Locate a usable Claude OAuth credential on the local machine
//!
//! Sources are consulted in a fixed priority order (environment, OS secret
//! store, credential files, active CLI session) and the outcome is cached.
//! Every OS-facing piece sits behind a trait so the resolver can be tested
//! without touching the real keychain or home directory.

pub mod cache;
pub mod config;
pub mod credential;
pub mod diagnostics;
pub mod mocks;
pub mod platform;
pub mod production;
pub mod resolver;
pub mod sources;
pub mod traits;
pub mod validator;

use std::future::Future;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use cache::ResolutionCache;
pub use config::{ConfigError, ResolverConfig};
pub use credential::{Credential, FailureKind, FailureReason, ResolutionOutcome, SourceKind};
pub use diagnostics::{remediation, DiagnosticsReport, Remediation};
pub use platform::PlatformKind;
pub use resolver::{CredentialExtraction, CredentialResolver};
pub use validator::TokenValidator;

/// Install the stderr tracing subscriber.
///
/// `RUST_LOG` overrides the default `tokenprobe=info` filter. Calling this
/// twice is harmless; the second install is ignored.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tokenprobe=info,tokenprobe_lib=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Drive `future` on a fresh runtime, then give leftover blocking work at
/// most `grace` before shutting the runtime down.
///
/// A keyring call that outlived its lookup timeout is abandoned here rather
/// than holding the process open until the OS store answers.
pub fn block_on_with_grace<F: Future>(future: F, grace: Duration) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    Ok(output)
}
