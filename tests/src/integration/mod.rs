//! # Integration Flows
//!
//! End-to-end scenarios over [`SessionService`](mc_session::SessionService).

pub mod harness;

mod bridge;
mod chain;
mod events;
mod lifecycle;
mod messaging;
