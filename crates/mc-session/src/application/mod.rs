//! # Application Module
//!
//! Clients, the session registry, the event pump and the façade service.

pub mod event_pump;
pub mod multi_client;
pub mod registry;
pub mod reply;
pub mod service;
pub mod subclient;

pub use event_pump::{EventPump, GenerationPump, PumpSettings};
pub use multi_client::MultiClient;
pub use registry::SessionRegistry;
pub use reply::{PendingReplies, ReplyStats, ReplyWaiter};
pub use service::SessionService;
pub use subclient::Subclient;
