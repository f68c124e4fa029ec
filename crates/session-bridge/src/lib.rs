//! # Session Bridge
//!
//! Exposes the session core to an external consumer over stdio.
//!
//! ## Protocol
//!
//! One JSON object per line in each direction:
//!
//! | Direction | Shape |
//! |-----------|-------|
//! | request   | `{"id": n, "method": "sendText", "args": {...}}` |
//! | response  | `{"id": n, "result": ...}` |
//! | failure   | `{"id": n, "error": {"code", "message", "details"}}` |
//! | event     | `{"event": {...}}` |
//!
//! ## Module Structure
//!
//! ```text
//! session-bridge/
//! ├── config.rs      # BridgeConfig with MC_* environment overrides
//! ├── dispatch.rs    # method name → SessionApi call
//! ├── transport.rs   # line framing, request tasks, event forwarding
//! └── main.rs        # logging, wiring, shutdown
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod dispatch;
pub mod transport;

pub use config::BridgeConfig;
pub use dispatch::{BridgeError, BridgeRequest, BridgeResponse, DispatchError, Dispatcher};
pub use transport::serve;
