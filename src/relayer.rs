//! Relay network (bundler) client.
//!
//! Signed user operations go to a relay endpoint over JSON-RPC:
//! `eth_estimateUserOperationGas`, `eth_sendUserOperation`,
//! `eth_getUserOperationReceipt`, `eth_supportedEntryPoints`. Every numeric
//! field crosses the wire as canonical minimal hex (see
//! [`util::quantity`](crate::util::quantity)).

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde::ser::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

use crate::config::BundlerConfig;
use crate::poll::{PollError, RetryPolicy, poll_until};
use crate::userop::{GasEstimate, UserOperation};

#[derive(Debug, thiserror::Error)]
pub enum RelayerError {
    #[error("relay transport error")]
    Http(#[from] reqwest::Error),
    /// The relay accepted the HTTP request but rejected the operation.
    #[error("relay rejected the request: {message} (code {code})")]
    Rpc { code: i64, message: String },
    #[error("malformed relay response: {0}")]
    Malformed(String),
}

/// Receipt of an included user operation, as reported by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    pub user_op_hash: B256,
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
    pub receipt: TransactionSummary,
}

/// The enclosing transaction the relay bundled the operation into.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub transaction_hash: B256,
}

/// Submission-side view of the relay network.
#[async_trait]
pub trait Relayer: Send + Sync {
    /// Ask the relay to simulate the (unsigned) operation and return gas
    /// limits.
    async fn estimate_user_operation_gas(
        &self,
        op: &UserOperation,
    ) -> Result<GasEstimate, RelayerError>;

    /// Submit a signed operation. Returns the user operation hash the relay
    /// tracks it under.
    async fn send_user_operation(&self, op: &UserOperation) -> Result<B256, RelayerError>;

    /// Receipt for a previously submitted operation, or `None` while it is
    /// still pending.
    async fn get_user_operation_receipt(
        &self,
        user_op_hash: B256,
    ) -> Result<Option<UserOperationReceipt>, RelayerError>;

    /// Entry points the relay serves.
    async fn supported_entry_points(&self) -> Result<Vec<Address>, RelayerError>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl<R> RpcResponse<R> {
    fn into_result(self) -> Result<Option<R>, RelayerError> {
        if let Some(error) = self.error {
            return Err(RelayerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(self.result)
    }
}

/// JSON-RPC [`Relayer`] over HTTP.
pub struct HttpRelayerClient {
    http: reqwest::Client,
    config: BundlerConfig,
    next_id: AtomicU64,
}

impl HttpRelayerClient {
    pub fn new(config: BundlerConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn entry_point(&self) -> Address {
        self.config.entry_point
    }

    async fn request<P, R>(&self, method: &str, params: P) -> Result<Option<R>, RelayerError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let response = self
            .http
            .post(self.config.endpoint.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let envelope: RpcResponse<R> = response.json().await?;
        envelope.into_result()
    }
}

#[async_trait]
impl Relayer for HttpRelayerClient {
    async fn estimate_user_operation_gas(
        &self,
        op: &UserOperation,
    ) -> Result<GasEstimate, RelayerError> {
        self.request(
            "eth_estimateUserOperationGas",
            (op, self.config.entry_point),
        )
        .await?
        .ok_or_else(|| RelayerError::Malformed("estimation returned no result".into()))
    }

    async fn send_user_operation(&self, op: &UserOperation) -> Result<B256, RelayerError> {
        let hash = self
            .request("eth_sendUserOperation", (op, self.config.entry_point))
            .await?
            .ok_or_else(|| RelayerError::Malformed("submission returned no result".into()))?;
        tracing::info!(user_op_hash = %hash, sender = %op.sender, "user operation submitted");
        Ok(hash)
    }

    async fn get_user_operation_receipt(
        &self,
        user_op_hash: B256,
    ) -> Result<Option<UserOperationReceipt>, RelayerError> {
        self.request("eth_getUserOperationReceipt", (user_op_hash,))
            .await
    }

    async fn supported_entry_points(&self) -> Result<Vec<Address>, RelayerError> {
        self.request::<_, Vec<Address>>("eth_supportedEntryPoints", serde_json::json!([]))
            .await?
            .ok_or_else(|| RelayerError::Malformed("entry point listing returned no result".into()))
    }
}

/// Poll the relay for a receipt under `policy`, cancellable between attempts.
pub async fn await_receipt<R: Relayer>(
    relayer: &R,
    user_op_hash: B256,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<UserOperationReceipt, PollError> {
    poll_until(policy, cancel, || {
        relayer.get_user_operation_receipt(user_op_hash)
    })
    .await
}
