//! Broadcasting raw transactions to the Bitcoin network.
//!
//! Two backends, dispatched by a closed enum: mempool.space's REST endpoint
//! (raw hex as `text/plain`, txid in the body) and a Bitcoin Core node's
//! JSON-RPC `sendrawtransaction` with HTTP basic auth.

use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

pub const DEFAULT_MEMPOOL_URL: &str = "https://mempool.space/api/tx";
pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 8332;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("broadcast rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("malformed RPC response")]
    MalformedResponse,
}

/// Broadcast backend with its configuration carried in the variant.
#[derive(Debug, Clone)]
pub enum BroadcastBackend {
    Mempool {
        url: String,
    },
    BitcoinRpc {
        host: String,
        port: u16,
        user: String,
        pass: String,
    },
}

impl Default for BroadcastBackend {
    fn default() -> Self {
        Self::Mempool {
            url: DEFAULT_MEMPOOL_URL.to_string(),
        }
    }
}

pub struct Broadcaster {
    backend: BroadcastBackend,
    client: reqwest::blocking::Client,
}

impl Broadcaster {
    pub fn new(backend: BroadcastBackend) -> Result<Self, BroadcastError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(BroadcastError::Client)?;
        Ok(Self { backend, client })
    }

    /// Send a raw hex transaction to the configured backend. Returns the
    /// txid reported by the remote.
    pub fn broadcast(&self, raw_tx_hex: &str) -> Result<String, BroadcastError> {
        match &self.backend {
            BroadcastBackend::Mempool { url } => self.broadcast_mempool(url, raw_tx_hex),
            BroadcastBackend::BitcoinRpc {
                host,
                port,
                user,
                pass,
            } => self.broadcast_rpc(host, *port, user, pass, raw_tx_hex),
        }
    }

    fn broadcast_mempool(&self, url: &str, raw_tx_hex: &str) -> Result<String, BroadcastError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(raw_tx_hex.to_string())
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(BroadcastError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        // The response body is the txid.
        Ok(body.trim().to_string())
    }

    fn broadcast_rpc(
        &self,
        host: &str,
        port: u16,
        user: &str,
        pass: &str,
        raw_tx_hex: &str,
    ) -> Result<String, BroadcastError> {
        let payload = json!({
            "jsonrpc": "1.0",
            "id": "btccw",
            "method": "sendrawtransaction",
            "params": [raw_tx_hex],
        });

        let response = self
            .client
            .post(format!("http://{host}:{port}"))
            .basic_auth(user, Some(pass))
            .json(&payload)
            .send()?;

        let value: Value = response.json()?;
        if let Some(err) = value.get("error").filter(|e| !e.is_null()) {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            return Err(BroadcastError::Rpc(message));
        }
        value
            .get("result")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(BroadcastError::MalformedResponse)
    }
}
