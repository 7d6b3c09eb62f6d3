//! Policy-governance REST API contract types and validation
//!
//! This crate defines the wire types exchanged with the governance backend:
//! login and profile records, the streaming query body and the events that
//! come back over the text-event-stream. They are shared between the REST
//! client, the scripted mock client and the CLI.

pub mod error;
pub mod types;
pub mod validation;

pub use error::*;
pub use types::*;
