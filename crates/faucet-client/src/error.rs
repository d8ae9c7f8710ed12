//! Client error types

use std::time::Duration;

use crypto_envelope::CryptoError;
use faucet_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Faucet server unavailable: no public key")]
    ServerUnavailable,

    #[error("Submission rejected with status {status}")]
    SubmissionRejected { status: u16 },
}

pub type ClientResult<T> = Result<T, ClientError>;
