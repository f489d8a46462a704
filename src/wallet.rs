//! The wallet/session boundary.
//!
//! The engine never owns the buyer's key for bridge transfers: the embedding
//! application supplies a [`WalletSession`] that knows the active chain, can
//! request a chain switch (which may silently fail to take effect, so callers
//! re-check), and submits signed transactions.

use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// The user declined the signature or switch prompt.
    #[error("request rejected by wallet")]
    Rejected,
    #[error("wallet transport error: {0}")]
    Transport(String),
    #[error("{0}")]
    Other(String),
}

/// Wallet/session capability supplied by the embedding application.
///
/// `switch_chain` is best-effort: some wallets acknowledge the request
/// without actually switching, so the orchestrator re-reads
/// [`active_chain`](WalletSession::active_chain) afterwards.
#[async_trait]
pub trait WalletSession: Send + Sync {
    /// The account address transactions are sent from.
    fn address(&self) -> Address;

    /// The chain the wallet is currently connected to.
    async fn active_chain(&self) -> Result<u64, WalletError>;

    /// Ask the wallet to switch to `chain_id`.
    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError>;

    /// Sign and submit a transaction on the active chain. Returns the
    /// transaction hash as soon as the node accepts it.
    async fn send_transaction(&self, to: Address, calldata: Bytes) -> Result<B256, WalletError>;

    /// Wait until the transaction is mined. Returns the execution status
    /// (`true` for success, `false` for revert).
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<bool, WalletError>;
}
