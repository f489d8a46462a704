//! Sponsor-paid (gasless) payment orchestration.
//!
//! [`GaslessPaymentOrchestrator`] moves USDC out of a smart account whose gas
//! is underwritten by a paymaster, so the buyer never needs the native token:
//!
//! `derive account → enable sponsorship → (deploy + approve) → sponsored
//! transfer → receipt`
//!
//! The first payment on an undeployed account is special-cased. Deployment
//! and the paymaster approval are bundled into one **sponsor-free** operation
//! (the sponsor cannot underwrite the operation whose outcome, a successful
//! approval, it depends on to judge solvency), and the value transfer is a
//! second, sponsored operation submitted only once the first is confirmed
//! on-chain. On an already-deployed account the approval, when needed, stays
//! a separate operation: the sponsor re-validates the allowance per
//! operation, so approval and transfer are never batched.
//!
//! Every error transition returns the orchestrator to `Ready`, never
//! `Disconnected`: the derived account is still valid and the caller can
//! retry without re-deriving.

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_signer::Signer;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::account::{
    AccountError, AccountReader, SmartAccountDeriver, SmartAccountHandle, execute_calldata,
};
use crate::bridge::{approve_calldata, transfer_calldata};
use crate::config::GaslessConfig;
use crate::network::ChainRegistry;
use crate::poll::PollError;
use crate::relayer::{Relayer, RelayerError, UserOperationReceipt, await_receipt};
use crate::types::UsdcAmount;
use crate::userop::{SponsorData, UserOpError, UserOperationBuilder, UserOperationDraft};

/// Lifecycle of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaslessState {
    Disconnected,
    Initialized,
    SponsorshipEnabled,
    Ready,
    Submitting,
    Confirmed,
    Failed,
}

/// One progress notification: the orchestrator changed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaslessEvent {
    pub state: GaslessState,
    pub user_op_hash: Option<B256>,
    pub error: Option<String>,
}

/// A sponsor-paid value transfer.
#[derive(Debug, Clone)]
pub struct GaslessPaymentRequest {
    pub recipient: Address,
    pub amount: UsdcAmount,
}

/// Result of a confirmed gasless payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaslessOutcome {
    /// The sponsored transfer operation.
    pub user_op_hash: B256,
    /// The transaction the relay bundled it into.
    pub transaction_hash: B256,
    /// The sponsor-free setup operation (deploy and/or approve), when one
    /// was needed.
    pub setup_user_op_hash: Option<B256>,
}

/// Snapshot of a smart account's funding state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartAccountInfo {
    pub address: Address,
    pub usdc_balance: UsdcAmount,
    pub native_balance: U256,
    /// The paymaster holds a non-zero allowance, i.e. sponsorship works.
    pub sponsorship_enabled: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum GaslessError {
    #[error("smart account not initialized")]
    NotInitialized,
    #[error("orchestrator is {0:?}, expected Ready")]
    NotReady(GaslessState),
    #[error("account read failed")]
    Account(#[from] AccountError),
    #[error(transparent)]
    Signing(#[from] UserOpError),
    #[error("relay error")]
    Relayer(#[from] RelayerError),
    /// The operation was submitted but its receipt never arrived within the
    /// budget. The hash is preserved; the operation may still land.
    #[error("user operation {user_op_hash} was not confirmed")]
    Receipt {
        user_op_hash: B256,
        #[source]
        source: PollError,
    },
    #[error("user operation {user_op_hash} reverted")]
    OperationReverted {
        user_op_hash: B256,
        reason: Option<String>,
    },
}

/// Drives sponsor-paid payments for one (owner, chain) pair.
pub struct GaslessPaymentOrchestrator<S, P, R> {
    deriver: SmartAccountDeriver<P>,
    builder: UserOperationBuilder<S>,
    relayer: R,
    config: GaslessConfig,
    owner: Address,
    usdc: Address,
    state: Mutex<GaslessState>,
    handle: Mutex<Option<SmartAccountHandle>>,
    events: mpsc::UnboundedSender<GaslessEvent>,
    subscriber: Mutex<Option<mpsc::UnboundedReceiver<GaslessEvent>>>,
    cancel: CancellationToken,
}

impl<S, P, R> GaslessPaymentOrchestrator<S, P, R>
where
    S: Signer + Send + Sync,
    P: AccountReader,
    R: Relayer,
{
    pub fn new(signer: S, reader: P, relayer: R, config: GaslessConfig) -> Self {
        let owner = signer.address();
        let usdc = ChainRegistry::config(config.network).usdc;
        let chain_id = config.network.chain_id();
        let (events, receiver) = mpsc::unbounded_channel();
        Self {
            deriver: SmartAccountDeriver::new(config.factory, config.bundler.entry_point, reader),
            builder: UserOperationBuilder::new(config.bundler.entry_point, chain_id, signer),
            relayer,
            owner,
            usdc,
            config,
            state: Mutex::new(GaslessState::Disconnected),
            handle: Mutex::new(None),
            events,
            subscriber: Mutex::new(Some(receiver)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> GaslessState {
        *self.state.lock().expect("state lock poisoned")
    }

    /// The derived account address, once initialized.
    pub fn account_address(&self) -> Option<Address> {
        self.handle
            .lock()
            .expect("handle lock poisoned")
            .as_ref()
            .map(|h| h.address)
    }

    /// The event stream for this orchestrator; can be taken once.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<GaslessEvent>> {
        self.subscriber.lock().expect("subscriber lock poisoned").take()
    }

    /// Token that cancels in-flight receipt polling.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn set_state(&self, state: GaslessState, user_op_hash: Option<B256>, error: Option<String>) {
        *self.state.lock().expect("state lock poisoned") = state;
        let _ = self.events.send(GaslessEvent {
            state,
            user_op_hash,
            error,
        });
    }

    /// Derive the smart account for the configured (owner, salt) and read its
    /// deployment state. Idempotent; the address never changes for a given
    /// configuration.
    pub async fn initialize(&self) -> Result<Address, GaslessError> {
        let handle = self.deriver.derive(self.owner, self.config.salt).await?;
        let address = handle.address;
        *self.handle.lock().expect("handle lock poisoned") = Some(handle);
        self.set_state(GaslessState::Initialized, None, None);
        Ok(address)
    }

    /// Check whether the paymaster already holds an allowance and move to
    /// `Ready`. Returns the current sponsorship flag; a missing allowance is
    /// fixed by the first payment, not here.
    pub async fn enable_sponsorship(&self) -> Result<bool, GaslessError> {
        let handle = self.current_handle()?;
        let allowance = self
            .deriver
            .reader()
            .erc20_allowance(self.usdc, handle.address, self.config.paymaster)
            .await?;
        let enabled = allowance > U256::ZERO;
        tracing::info!(account = %handle.address, enabled, "sponsorship checked");
        self.set_state(GaslessState::SponsorshipEnabled, None, None);
        self.set_state(GaslessState::Ready, None, None);
        Ok(enabled)
    }

    /// Funding snapshot of the derived account.
    pub async fn account_info(&self) -> Result<SmartAccountInfo, GaslessError> {
        let handle = self.current_handle()?;
        let reader = self.deriver.reader();
        let usdc_balance = reader.erc20_balance(self.usdc, handle.address).await?;
        let native_balance = reader.native_balance(handle.address).await?;
        let allowance = reader
            .erc20_allowance(self.usdc, handle.address, self.config.paymaster)
            .await?;
        Ok(SmartAccountInfo {
            address: handle.address,
            usdc_balance: UsdcAmount::from_units(u64::try_from(usdc_balance).unwrap_or(u64::MAX)),
            native_balance,
            sponsorship_enabled: allowance > U256::ZERO,
        })
    }

    /// Execute a sponsor-paid payment.
    ///
    /// On an undeployed account this submits two operations: a sponsor-free
    /// deploy+approve bundle, then the sponsored transfer. Errors return the
    /// orchestrator to `Ready` so the caller can retry without re-deriving.
    pub async fn pay(&self, request: &GaslessPaymentRequest) -> Result<GaslessOutcome, GaslessError> {
        let state = self.state();
        if state != GaslessState::Ready {
            return Err(GaslessError::NotReady(state));
        }
        self.set_state(GaslessState::Submitting, None, None);
        match self.pay_inner(request).await {
            Ok(outcome) => {
                self.set_state(GaslessState::Confirmed, Some(outcome.user_op_hash), None);
                self.set_state(GaslessState::Ready, None, None);
                Ok(outcome)
            }
            Err(err) => {
                tracing::warn!(error = %err, "gasless payment failed; returning to Ready");
                self.set_state(GaslessState::Failed, None, Some(err.to_string()));
                self.set_state(GaslessState::Ready, None, None);
                Err(err)
            }
        }
    }

    async fn pay_inner(
        &self,
        request: &GaslessPaymentRequest,
    ) -> Result<GaslessOutcome, GaslessError> {
        let mut handle = self.current_handle()?;
        // Fresh deployment flag and nonce per operation; externally submitted
        // operations can have advanced the nonce since the last payment.
        self.deriver.refresh(&mut handle).await?;

        let mut setup_user_op_hash = None;
        if !handle.is_deployed() {
            let approve = execute_calldata(
                self.usdc,
                U256::ZERO,
                approve_calldata(self.config.paymaster, self.config.sponsor_allowance),
            );
            let draft = UserOperationDraft {
                sender: handle.address,
                nonce: handle.cached_nonce().unwrap_or_default(),
                init_code: self.deriver.init_code(&handle),
                call_data: approve,
                sponsor: SponsorData::SenderPays,
            };
            let receipt = self.submit_and_confirm(&draft).await?;
            setup_user_op_hash = Some(receipt.user_op_hash);
            handle.invalidate();
            self.deriver.refresh(&mut handle).await?;
        } else {
            let allowance = self
                .deriver
                .reader()
                .erc20_allowance(self.usdc, handle.address, self.config.paymaster)
                .await?;
            if allowance.is_zero() {
                let approve = execute_calldata(
                    self.usdc,
                    U256::ZERO,
                    approve_calldata(self.config.paymaster, self.config.sponsor_allowance),
                );
                let draft = UserOperationDraft {
                    sender: handle.address,
                    nonce: handle.cached_nonce().unwrap_or_default(),
                    init_code: Bytes::new(),
                    call_data: approve,
                    sponsor: SponsorData::SenderPays,
                };
                let receipt = self.submit_and_confirm(&draft).await?;
                setup_user_op_hash = Some(receipt.user_op_hash);
                handle.invalidate();
                self.deriver.refresh(&mut handle).await?;
            }
        }

        let transfer = execute_calldata(
            self.usdc,
            U256::ZERO,
            transfer_calldata(request.recipient, request.amount),
        );
        let draft = UserOperationDraft {
            sender: handle.address,
            nonce: handle.cached_nonce().unwrap_or_default(),
            init_code: Bytes::new(),
            call_data: transfer,
            sponsor: SponsorData::Paymaster {
                paymaster: self.config.paymaster,
                window: None,
            },
        };
        let receipt = self.submit_and_confirm(&draft).await?;
        handle.invalidate();
        *self.handle.lock().expect("handle lock poisoned") = Some(handle);
        Ok(GaslessOutcome {
            user_op_hash: receipt.user_op_hash,
            transaction_hash: receipt.receipt.transaction_hash,
            setup_user_op_hash,
        })
    }

    /// Estimate, sign, submit, and confirm one operation. Ordering matters:
    /// sponsor data is fixed in the draft, gas is estimated over it, and the
    /// signature comes last.
    async fn submit_and_confirm(
        &self,
        draft: &UserOperationDraft,
    ) -> Result<UserOperationReceipt, GaslessError> {
        let estimation = self.builder.for_estimation(draft);
        let gas = self.relayer.estimate_user_operation_gas(&estimation).await?;
        let fees = self.deriver.reader().fee_estimate().await?;
        let op = self.builder.finalize(draft, gas, fees).await?;
        let user_op_hash = self.relayer.send_user_operation(&op).await?;
        self.set_state(GaslessState::Submitting, Some(user_op_hash), None);
        let receipt = await_receipt(
            &self.relayer,
            user_op_hash,
            &self.config.receipt_policy,
            &self.cancel,
        )
        .await
        .map_err(|source| GaslessError::Receipt {
            user_op_hash,
            source,
        })?;
        if !receipt.success {
            return Err(GaslessError::OperationReverted {
                user_op_hash: receipt.user_op_hash,
                reason: receipt.reason.clone(),
            });
        }
        Ok(receipt)
    }

    fn current_handle(&self) -> Result<SmartAccountHandle, GaslessError> {
        self.handle
            .lock()
            .expect("handle lock poisoned")
            .clone()
            .ok_or(GaslessError::NotInitialized)
    }
}
