//! # Observability & Tracing
//!
//! [`setup_tracing`] installs the global `tracing` subscriber. It is called
//! once by the binary; tests never call it.
//!
//! ## What Gets Traced
//!
//! - **Requests**: every request runs inside a `request` span carrying the
//!   HTTP method and path.
//! - **Backend calls**: each invocation logs the resolved backend method name
//!   (`vm_lookup`, `storagevolumes_create`, ...) and the identifier at debug.
//! - **Tasks**: submission and completion at info, failures at warn.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Default filter from the configuration
//! virt-api --log-filter info
//!
//! # RUST_LOG wins over the configured default
//! RUST_LOG=resource_framework=debug virt-api
//! ```
//!
//! With `debug`, a create on a nested collection reads:
//!
//! ```text
//! DEBUG request: Invoke method=storagevolumes_create args=["pool1"] params={...} method=POST path=/storagepools/pool1/storagevolumes
//!  INFO request: Task submitted task_id=1 target_uri=Some("/storagepools/pool1/storagevolumes/vol1")
//! DEBUG request: Handled status=202 Accepted
//!  INFO Task finished task_id=1 message="OK"
//! ```

use tracing_subscriber::EnvFilter;

/// Install a compact subscriber. `RUST_LOG` overrides `default_filter`.
pub fn setup_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false) // kind and method fields say where a line came from
        .compact()
        .init();
}
