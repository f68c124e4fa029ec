//! # Domain Module
//!
//! Core domain types for the session core.

pub mod entities;
pub mod errors;
pub mod identity;
pub mod invariants;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use identity::*;
pub use invariants::*;
pub use value_objects::*;
