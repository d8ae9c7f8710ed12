//! Faucet Client - encrypted chat submission over HTTP
//!
//! Fetches the faucet's public key, seals the chat history to it, posts the
//! envelope and opens the encrypted reply with the client's own key.

mod client;
mod config;
mod error;
mod mock;
mod transport;

pub use client::*;
pub use config::*;
pub use error::*;
pub use mock::*;
pub use transport::*;

/// Default faucet base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Default public key endpoint path
pub const DEFAULT_PUBLIC_KEY_PATH: &str = "/get_server_public_key";

/// Default submission endpoint path
pub const DEFAULT_SUBMIT_PATH: &str = "/send_request";

/// Conventional reply polling path
pub const DEFAULT_RESPONSE_PATH: &str = "/retrieve_response";

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Largest reply body the HTTP transport buffers: a base64 envelope of the
/// largest plaintext plus room for the RSA-4096 wrapped key and JSON framing
pub const MAX_RESPONSE_BODY_SIZE: usize =
    (crypto_envelope::MAX_PLAINTEXT_SIZE + 1024).div_ceil(3) * 4 + 1024;
