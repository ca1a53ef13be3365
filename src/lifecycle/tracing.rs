//! # Observability & Tracing
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter. The level is
//! taken from `RUST_LOG` and defaults to `info`.
//!
//! ```bash
//! # Dispatch decisions, transitions and container lifecycle
//! RUST_LOG=info cargo test -- --nocapture
//!
//! # Also shows rejected replies with their reasons and instance creation
//! RUST_LOG=participant_core=debug cargo test -- --nocapture
//! ```
//!
//! Every log line carries structured fields instead of formatted text where it can:
//! `message_id` and `correlation_id` on the messaging path, `resource`/`partition`
//! on transitions, `container_id` on the container manager. For example:
//!
//! ```text
//! INFO Invoking reply callback message_id=5f0c... correlation_id="corr-1"
//! INFO Transition completed resource="TestDB" partition="TestDB_0" from="OFFLINE" to="ONLINE"
//! INFO Created container_id="node_7" pid=Some(4242) size=1
//! ```
use tracing_subscriber::EnvFilter;

pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
