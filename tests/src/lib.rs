//! # Meshlink Test Suite
//!
//! Cross-crate flows that exercise the session core, the event sink and the
//! bridge together over the in-memory network and chain.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs     # Service + backend fixtures
//!     ├── lifecycle.rs   # create / recreate / reconnect / close / eviction
//!     ├── messaging.rs   # fan-out, dedup, replies, publish
//!     ├── events.rs      # connect events, sink drops, worker liveness
//!     ├── chain.rs       # subscriptions, nonces, height
//!     └── bridge.rs      # JSON dispatch end to end
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p mc-tests
//! cargo test -p mc-tests integration::messaging
//! cargo bench -p mc-tests
//! ```

pub mod integration;
