//! Faucet client orchestration
//!
//! One round trip: fetch server key -> seal history -> submit -> fetch reply
//! -> open reply. Each call is awaited in turn and bounded by the configured
//! timeout.

use std::borrow::Cow;
use std::future::Future;

use crypto_envelope::{Envelope, KeyPair, PublicKey, generate_keys, open, seal};
use faucet_protocol::{
    ChatHistory, ENCRYPTED_RESPONSE_FIELD, FaucetSubmission, RequestId, RequestLifecycle,
    RequestState, ServerKeyResponse, decode_b64, encode_b64,
};
use serde::de::DeserializeOwned;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    ClientError, ClientResult, FaucetConfig, HttpResponse, HttpTransport, ReplyMode, Transport,
    TransportError, TransportResult,
};

/// Server public key bytes as delivered by the key endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPublicKey(Vec<u8>);

impl ServerPublicKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        encode_b64(&self.0)
    }

    /// Interpret the bytes as key material
    pub fn parse(&self) -> ClientResult<PublicKey> {
        Ok(PublicKey::from_bytes(&self.0)?)
    }
}

/// Decrypted faucet reply
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub request_id: RequestId,
    pub payload: Vec<u8>,
}

impl ChatReply {
    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_slice(&self.payload).map_err(|e| ClientError::Protocol(e.into()))
    }

    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Client for one faucet service
pub struct FaucetClient<T = HttpTransport> {
    config: FaucetConfig,
    transport: T,
    key_pair: KeyPair,
}

impl FaucetClient<HttpTransport> {
    /// Client over real HTTP with a freshly generated key pair
    pub fn new(config: FaucetConfig) -> ClientResult<Self> {
        let transport = HttpTransport::new(config.timeout())?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> FaucetClient<T> {
    /// Client over `transport` with a freshly generated key pair
    pub fn with_transport(config: FaucetConfig, transport: T) -> ClientResult<Self> {
        config.validate()?;
        let key_pair = generate_keys(&config.key_options)?;
        info!(algorithm = %key_pair.algorithm(), base_url = %config.base_url, "faucet client ready");
        Ok(Self::with_key_pair(config, transport, key_pair))
    }

    pub fn with_key_pair(config: FaucetConfig, transport: T, key_pair: KeyPair) -> Self {
        Self {
            config,
            transport,
            key_pair,
        }
    }

    pub fn config(&self) -> &FaucetConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Fetch the server's public key.
    ///
    /// A non-200 status or a body without a decodable `server_public_key`
    /// yields `Ok(None)`; only network failures are errors.
    pub async fn get_server_public_key(&self) -> ClientResult<Option<ServerPublicKey>> {
        let url = self.config.endpoint(&self.config.public_key_path)?;
        debug!(%url, "fetching server public key");

        let response = self.call(self.transport.get(&url)).await?;
        if !response.is_success() {
            warn!(status = response.status, "server public key unavailable");
            return Ok(None);
        }

        let body: ServerKeyResponse = match response.parse_json() {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "malformed server public key response");
                return Ok(None);
            }
        };

        match decode_b64(&body.server_public_key) {
            Ok(bytes) => Ok(Some(ServerPublicKey::new(bytes))),
            Err(e) => {
                warn!(error = %e, "server public key is not valid base64");
                Ok(None)
            }
        }
    }

    /// Post the encrypted history. The response is returned as received.
    pub async fn send_request_to_faucet(
        &self,
        encrypted_chat_history_b64: &str,
        server_public_key_b64: &str,
    ) -> ClientResult<HttpResponse> {
        let url = self.config.endpoint(&self.config.submit_path)?;
        let submission = FaucetSubmission {
            encrypted_chat_history: encrypted_chat_history_b64.to_string(),
            server_public_key: server_public_key_b64.to_string(),
            client_public_key: Some(encode_b64(self.key_pair.public_key_pem()?)),
        };
        let body = serde_json::to_value(&submission).map_err(|e| ClientError::Protocol(e.into()))?;

        let response = self.call(self.transport.post_json(&url, &body)).await?;
        info!(status = response.status, "submitted chat history");
        Ok(response)
    }

    /// Fetch the encrypted reply for `submission` and open it with the
    /// client's private key
    pub async fn retrieve_response(&self, submission: &HttpResponse) -> ClientResult<Vec<u8>> {
        let envelope = self.fetch_reply(submission).await?;
        self.open_reply(&envelope)
    }

    /// Run a full round trip for `history`
    pub async fn round_trip(&self, history: &ChatHistory) -> ClientResult<ChatReply> {
        let mut lifecycle = RequestLifecycle::new(RequestId::new());
        let span = info_span!("round_trip", request_id = %lifecycle.id());

        let result = self
            .drive(&mut lifecycle, history)
            .instrument(span)
            .await;

        if let Err(e) = &result {
            let stage = lifecycle.fail();
            warn!(request_id = %lifecycle.id(), stage = ?stage, error = %e, "round trip failed");
        }
        result
    }

    async fn drive(
        &self,
        lifecycle: &mut RequestLifecycle,
        history: &ChatHistory,
    ) -> ClientResult<ChatReply> {
        lifecycle.advance(RequestState::FetchingServerKey)?;
        let server_key = self
            .get_server_public_key()
            .await?
            .ok_or(ClientError::ServerUnavailable)?;

        lifecycle.advance(RequestState::Encrypting)?;
        let recipient = server_key.parse()?;
        let plaintext = history.to_canonical_json()?;
        let envelope = seal(&plaintext, &recipient)?;
        let encrypted_b64 = encode_b64(envelope.to_bytes());

        lifecycle.advance(RequestState::Submitting)?;
        let response = self
            .send_request_to_faucet(&encrypted_b64, &server_key.to_base64())
            .await?;
        if !response.is_success() {
            return Err(ClientError::SubmissionRejected {
                status: response.status,
            });
        }

        lifecycle.advance(RequestState::AwaitingResponse)?;
        let reply = self.fetch_reply(&response).await?;

        lifecycle.advance(RequestState::Decrypting)?;
        let payload = self.open_reply(&reply)?;

        lifecycle.advance(RequestState::Done)?;
        info!(messages = history.len(), reply_len = payload.len(), "round trip complete");

        Ok(ChatReply {
            request_id: lifecycle.id(),
            payload,
        })
    }

    async fn fetch_reply(&self, submission: &HttpResponse) -> ClientResult<Envelope> {
        let response = match &self.config.reply {
            ReplyMode::Inline => {
                if !submission.is_success() {
                    return Err(ClientError::SubmissionRejected {
                        status: submission.status,
                    });
                }
                Cow::Borrowed(submission)
            }
            ReplyMode::Poll { path } => {
                let url = self.config.endpoint(path)?;
                let response = self.call(self.transport.get(&url)).await?;
                if !response.is_success() {
                    return Err(TransportError::UnexpectedStatus {
                        url: url.to_string(),
                        status: response.status,
                    }
                    .into());
                }
                Cow::Owned(response)
            }
        };

        let body: serde_json::Value = response
            .parse_json()
            .map_err(|e| TransportError::InvalidBody(e.to_string()))?;
        let encoded = body
            .get(ENCRYPTED_RESPONSE_FIELD)
            .and_then(|v| v.as_str())
            .ok_or(TransportError::MissingField(ENCRYPTED_RESPONSE_FIELD))?;

        Ok(Envelope::from_bytes(&decode_b64(encoded)?)?)
    }

    fn open_reply(&self, envelope: &Envelope) -> ClientResult<Vec<u8>> {
        Ok(open(envelope, self.key_pair.private_key())?)
    }

    async fn call<F>(&self, request: F) -> TransportResult<HttpResponse>
    where
        F: Future<Output = TransportResult<HttpResponse>>,
    {
        let timeout = self.config.timeout();
        tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }
}
