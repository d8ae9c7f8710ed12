//! End-to-end checks of the reqwest transport against a local axum faucet

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get, routing::post};
use crypto_envelope::{Envelope, KeyOptions, KeyPair, encrypt, generate_keys, open};
use faucet_client::{
    ClientError, DEFAULT_PUBLIC_KEY_PATH, DEFAULT_SUBMIT_PATH, FaucetClient, FaucetConfig,
    HttpTransport, Transport, TransportError,
};
use faucet_protocol::{
    ChatHistory, ChatMessage, FaucetReply, FaucetSubmission, ServerKeyResponse, decode_b64,
    encode_b64,
};
use url::Url;

struct Faucet {
    keys: KeyPair,
}

async fn public_key(State(faucet): State<Arc<Faucet>>) -> Json<ServerKeyResponse> {
    let pem = faucet.keys.public_key_pem().unwrap();
    Json(ServerKeyResponse {
        server_public_key: encode_b64(pem),
    })
}

async fn submit(
    State(faucet): State<Arc<Faucet>>,
    Json(submission): Json<FaucetSubmission>,
) -> Result<Json<FaucetReply>, StatusCode> {
    let framed =
        decode_b64(&submission.encrypted_chat_history).map_err(|_| StatusCode::BAD_REQUEST)?;
    let envelope = Envelope::from_bytes(&framed).map_err(|_| StatusCode::BAD_REQUEST)?;
    let plaintext =
        open(&envelope, faucet.keys.private_key()).map_err(|_| StatusCode::BAD_REQUEST)?;
    let history = ChatHistory::from_json(&plaintext).map_err(|_| StatusCode::BAD_REQUEST)?;

    let reply = ChatMessage::assistant(format!("{} messages received", history.len()));
    let client_key = submission
        .client_public_key
        .as_deref()
        .ok_or(StatusCode::BAD_REQUEST)
        .and_then(|k| decode_b64(k).map_err(|_| StatusCode::BAD_REQUEST))?;
    let sealed = encrypt(&serde_json::to_vec(&reply).unwrap(), &client_key)
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    Ok(Json(FaucetReply {
        encrypted_response: encode_b64(sealed.to_bytes()),
    }))
}

async fn stall() -> &'static str {
    tokio::time::sleep(Duration::from_secs(10)).await;
    "late"
}

async fn oversized() -> Vec<u8> {
    vec![b'a'; 64 * 1024]
}

async fn spawn_faucet() -> Url {
    let faucet = Arc::new(Faucet {
        keys: generate_keys(&KeyOptions::default()).unwrap(),
    });
    let app = Router::new()
        .route(DEFAULT_PUBLIC_KEY_PATH, get(public_key))
        .route(DEFAULT_SUBMIT_PATH, post(submit))
        .route("/stall", get(stall))
        .route("/oversized", get(oversized))
        .with_state(faucet);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Url::parse(&format!("http://{}", addr)).unwrap()
}

#[tokio::test]
async fn test_round_trip_over_http() {
    let base_url = spawn_faucet().await;
    let client = FaucetClient::new(FaucetConfig::new(base_url.as_str()).unwrap()).unwrap();

    let history: ChatHistory = vec![
        ChatMessage::user("Hello"),
        ChatMessage::assistant("Hi"),
        ChatMessage::user("Send tokens"),
    ]
    .into();

    let reply = client.round_trip(&history).await.unwrap();
    let message: ChatMessage = reply.json().unwrap();
    assert_eq!(message, ChatMessage::assistant("3 messages received"));
}

#[tokio::test]
async fn test_server_key_fetch_over_http() {
    let base_url = spawn_faucet().await;
    let client = FaucetClient::new(FaucetConfig::new(base_url.as_str()).unwrap()).unwrap();

    let key = client.get_server_public_key().await.unwrap().unwrap();
    assert!(key.as_bytes().starts_with(b"-----BEGIN PUBLIC KEY-----"));
    assert!(key.parse().is_ok());
}

#[tokio::test]
async fn test_unknown_route_yields_absent_key() {
    let base_url = spawn_faucet().await;
    let config = FaucetConfig {
        public_key_path: "/no_such_endpoint".into(),
        ..FaucetConfig::new(base_url.as_str()).unwrap()
    };
    let client = FaucetClient::new(config).unwrap();

    assert!(client.get_server_public_key().await.unwrap().is_none());
    assert!(matches!(
        client.round_trip(&ChatHistory::new()).await,
        Err(ClientError::ServerUnavailable)
    ));
}

#[tokio::test]
async fn test_http_timeout() {
    let base_url = spawn_faucet().await;
    let transport = HttpTransport::new(Duration::from_millis(200)).unwrap();

    let err = transport
        .get(&base_url.join("/stall").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Timeout(_)));
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let base_url = spawn_faucet().await;
    let transport = HttpTransport::with_body_limit(Duration::from_secs(5), 1024).unwrap();

    let err = transport
        .get(&base_url.join("/oversized").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::InvalidBody(_)));

    let ok = transport
        .get(&base_url.join(DEFAULT_PUBLIC_KEY_PATH).unwrap())
        .await
        .unwrap();
    assert!(ok.is_success());
}
