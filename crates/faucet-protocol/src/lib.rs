//! Shared Protocol Definitions for the Faucet client
//!
//! This crate contains the JSON bodies exchanged with the faucet service,
//! the chat history model and the per-request lifecycle state machine.

mod codec;
mod error;
mod lifecycle;
mod messages;

pub use codec::*;
pub use error::*;
pub use lifecycle::*;
pub use messages::*;

/// JSON field carrying the server's base64 public key
pub const SERVER_PUBLIC_KEY_FIELD: &str = "server_public_key";

/// JSON field carrying the base64 encrypted reply
pub const ENCRYPTED_RESPONSE_FIELD: &str = "encrypted_response";
