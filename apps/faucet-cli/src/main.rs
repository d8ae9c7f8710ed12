//! Faucet CLI
//!
//! Generates key pairs, fetches the faucet's public key and runs encrypted
//! chat round trips from the command line.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use crypto_envelope::{KeyOptions, generate_keys};
use faucet_client::{FaucetClient, FaucetConfig, ReplyMode};
use faucet_protocol::{ChatHistory, ChatMessage};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "faucet-cli", version, about = "Encrypted faucet client")]
struct Cli {
    /// JSON configuration file; FAUCET_* environment variables apply otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Faucet base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Use RSA keys of this size instead of X25519
    #[arg(long, global = true)]
    key_bits: Option<usize>,

    /// Poll this path for the reply instead of reading it inline
    #[arg(long, global = true)]
    reply_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a fresh private and public key in PEM form
    Keygen,
    /// Fetch and print the faucet's public key
    ServerKey,
    /// Send a chat history and print the decrypted reply
    Chat {
        /// Message appended to the history
        #[arg(long, short)]
        message: Option<String>,

        /// Role of the appended message
        #[arg(long, default_value = "user")]
        role: String,

        /// JSON file holding earlier messages
        #[arg(long)]
        history: Option<PathBuf>,
    },
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<FaucetConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_slice(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => FaucetConfig::from_env()?,
        };

        if let Some(url) = &self.base_url {
            config.base_url = FaucetConfig::new(url)?.base_url;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        if let Some(bits) = self.key_bits {
            config.key_options = KeyOptions::with_key_size(bits);
        }
        if let Some(path) = &self.reply_path {
            config.reply = ReplyMode::Poll { path: path.clone() };
        }

        config.validate()?;
        Ok(config)
    }
}

fn load_history(path: Option<&PathBuf>) -> anyhow::Result<ChatHistory> {
    let Some(path) = path else {
        return Ok(ChatHistory::new());
    };
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    ChatHistory::from_json(&raw).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("faucet_cli=info".parse()?)
                .add_directive("faucet_client=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    match cli.command {
        Command::Keygen => {
            let pair = generate_keys(&config.key_options)?;
            info!(algorithm = %pair.algorithm(), "generated key pair");
            print!("{}", pair.private_key_pem()?.as_str());
            print!("{}", pair.public_key_pem()?);
        }

        Command::ServerKey => {
            let client = FaucetClient::new(config)?;
            match client.get_server_public_key().await? {
                Some(key) => println!("{}", String::from_utf8_lossy(key.as_bytes())),
                None => {
                    eprintln!("faucet did not provide a public key");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }

        Command::Chat {
            message,
            role,
            history,
        } => {
            let mut chat = load_history(history.as_ref())?;
            if let Some(content) = message {
                chat.push(ChatMessage::new(role, content));
            }
            anyhow::ensure!(!chat.is_empty(), "nothing to send: pass --message or --history");

            let client = FaucetClient::new(config)?;
            let reply = client
                .round_trip(&chat)
                .await
                .context("faucet round trip failed")?;

            info!(request_id = %reply.request_id, "reply received");
            match reply.json::<serde_json::Value>() {
                Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                Err(_) => println!("{}", String::from_utf8_lossy(&reply.payload)),
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_envelope::KeyAlgorithm;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "faucet-cli",
            "--base-url",
            "http://faucet.internal:8080",
            "--timeout-secs",
            "7",
            "--key-bits",
            "4096",
            "--reply-path",
            "/retrieve_response",
            "chat",
            "-m",
            "Hello",
        ]);
        let config = cli.load_config().unwrap();

        assert_eq!(config.base_url.as_str(), "http://faucet.internal:8080/");
        assert_eq!(config.timeout_secs, 7);
        assert_eq!(config.key_options.algorithm, KeyAlgorithm::Rsa { bits: 4096 });
        assert_eq!(
            config.reply,
            ReplyMode::Poll {
                path: "/retrieve_response".into()
            }
        );
        assert!(matches!(cli.command, Command::Chat { message: Some(ref m), .. } if m == "Hello"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let cli = Cli::parse_from(["faucet-cli", "--timeout-secs", "0", "keygen"]);
        assert!(cli.load_config().is_err());
    }

    #[test]
    fn test_missing_history_file() {
        let path = PathBuf::from("/nonexistent/faucet-history.json");
        assert!(load_history(Some(&path)).is_err());
        assert!(load_history(None).unwrap().is_empty());
    }
}
