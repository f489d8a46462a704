//! Cross-chain transfer orchestration.
//!
//! [`TransferOrchestrator`] drives one transfer end to end:
//!
//! `network check → balance check → allowance/approval → burn →
//! attestation wait → finalize (or defer)`
//!
//! Steps are strictly ordered; each on-chain write waits for the previous
//! one's confirmed outcome. The burn is the point of no return: funds leave
//! the source chain the moment it lands, so every outcome after it, timeout,
//! cancellation, refused network switch, still resolves successfully and
//! carries the burn transaction hash. The bridge's off-chain relayer
//! completes a deferred mint independently; this orchestrator's job is to
//! report accurately, not to force completion.
//!
//! Progress is emitted as a typed event per state transition; the embedding
//! application subscribes via [`TransferOrchestrator::take_events`].

use alloy_primitives::B256;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::attestation::{AttestationClient, AttestationMessage};
use crate::bridge::{
    BridgeError, DepositForBurn, StablecoinReader, approve_calldata, deposit_for_burn_calldata,
    receive_message_calldata,
};
use crate::config::TransferConfig;
use crate::network::{ChainRegistry, Network, NoBridgeDeployment};
use crate::poll::{PollError, poll_until};
use crate::types::{
    FinalityThreshold, RequestValidationError, StepStatus, TransferRequest, TransferStep,
    UsdcAmount,
};
use crate::wallet::{WalletError, WalletSession};

/// One progress notification: a step changed status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub step: TransferStep,
    pub status: StepStatus,
    pub tx_hash: Option<B256>,
    pub error: Option<String>,
}

/// Mutable record of one transfer run. Owned exclusively by the run; the
/// orchestrator keeps a snapshot readable afterwards for inspection.
#[derive(Debug, Clone, Default)]
pub struct TransferState {
    pub statuses: HashMap<TransferStep, StepStatus>,
    pub burn_tx_hash: Option<B256>,
    pub attestation: Option<AttestationMessage>,
    pub finalize_tx_hash: Option<B256>,
    pub last_error: Option<String>,
}

/// Why finalization was left to the bridge's off-chain relayer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferralReason {
    /// The attestation did not complete within the wait budget. The burn
    /// stands; the attestation will still be produced.
    AttestationTimeout { last_error: Option<String> },
    /// The caller cancelled while waiting. Nothing already submitted is
    /// retracted.
    Cancelled,
    /// The wallet did not end up on the destination chain.
    NetworkSwitchRefused,
    /// Submitting or confirming the destination-chain mint failed.
    FinalizeFailed { message: String },
    /// The orchestrator is configured not to finalize.
    AutoFinalizeDisabled,
    /// The burn was submitted but its receipt could not be confirmed.
    ReceiptUnavailable { message: String },
}

/// How the transfer concluded. Both variants mean funds left the source
/// chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferCompletion {
    /// Same-chain transfer, or mint finalized by this orchestrator.
    Completed { finalize_tx_hash: Option<B256> },
    /// Burn done; the mint completes independently.
    FinalizeDeferred { reason: DeferralReason },
}

/// Successful result of a transfer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub burn_tx_hash: B256,
    pub completion: TransferCompletion,
}

/// Errors raised only while no funds-moving transaction has landed.
/// Everything after a successful burn resolves to a [`TransferOutcome`]
/// instead.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error(transparent)]
    InvalidRequest(#[from] RequestValidationError),
    /// The wallet reported a different chain even after a switch request;
    /// switching is external and may silently no-op.
    #[error("wallet is on chain {actual}, expected {expected}")]
    WrongNetwork { expected: u64, actual: u64 },
    #[error("insufficient funds: {available} USDC available, {required} USDC required")]
    InsufficientFunds {
        required: UsdcAmount,
        available: UsdcAmount,
    },
    #[error("on-chain read failed")]
    Read(#[from] BridgeError),
    #[error("wallet error during {step}")]
    Wallet {
        step: TransferStep,
        #[source]
        source: WalletError,
    },
    #[error("approval transaction reverted: {tx_hash}")]
    ApprovalReverted { tx_hash: B256 },
    #[error("burn transaction reverted: {tx_hash}")]
    BurnReverted { tx_hash: B256 },
}

impl From<NoBridgeDeployment> for TransferError {
    fn from(err: NoBridgeDeployment) -> Self {
        TransferError::InvalidRequest(RequestValidationError::UnsupportedChain(err.0))
    }
}

/// Drives one [`TransferRequest`] through the bridge flow.
///
/// Generic over the three collaborators it sequences: the wallet session
/// (submits transactions), the stablecoin reader (balances and allowances),
/// and the attestation client.
pub struct TransferOrchestrator<W, R, A> {
    wallet: W,
    reader: R,
    attestation: A,
    config: TransferConfig,
    events: mpsc::UnboundedSender<TransferEvent>,
    subscriber: Mutex<Option<mpsc::UnboundedReceiver<TransferEvent>>>,
    state: Mutex<TransferState>,
    cancel: CancellationToken,
}

impl<W, R, A> TransferOrchestrator<W, R, A>
where
    W: WalletSession,
    R: StablecoinReader,
    A: AttestationClient,
{
    pub fn new(wallet: W, reader: R, attestation: A, config: TransferConfig) -> Self {
        let (events, receiver) = mpsc::unbounded_channel();
        Self {
            wallet,
            reader,
            attestation,
            config,
            events,
            subscriber: Mutex::new(Some(receiver)),
            state: Mutex::new(TransferState::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// The event stream for this orchestrator. Yields one event per state
    /// transition; can be taken once.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransferEvent>> {
        self.subscriber.lock().expect("subscriber lock poisoned").take()
    }

    /// Token that cancels in-flight polling (attestation waits). Cancelling
    /// never retracts a submitted transaction.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Snapshot of the last run's state, for inspection after a failure.
    pub fn state(&self) -> TransferState {
        self.state.lock().expect("state lock poisoned").clone()
    }

    fn emit(&self, step: TransferStep, status: StepStatus, tx_hash: Option<B256>, error: Option<String>) {
        {
            let mut state = self.state.lock().expect("state lock poisoned");
            state.statuses.insert(step, status);
            if let Some(error) = &error {
                state.last_error = Some(error.clone());
            }
        }
        tracing::debug!(step = %step, ?status, ?tx_hash, "transfer step transition");
        // A dropped subscriber only means nobody is watching.
        let _ = self.events.send(TransferEvent {
            step,
            status,
            tx_hash,
            error,
        });
    }

    fn fail(&self, step: TransferStep, error: TransferError) -> TransferError {
        self.emit(step, StepStatus::Failed, None, Some(error.to_string()));
        error
    }

    fn defer(
        &self,
        burn_tx_hash: B256,
        step: TransferStep,
        reason: DeferralReason,
    ) -> TransferOutcome {
        let note = format!("{reason:?}");
        tracing::warn!(burn_tx = %burn_tx_hash, step = %step, reason = %note, "finalization deferred to the bridge relayer");
        self.emit(step, StepStatus::Failed, Some(burn_tx_hash), Some(note));
        TransferOutcome {
            burn_tx_hash,
            completion: TransferCompletion::FinalizeDeferred { reason },
        }
    }

    /// Execute the transfer.
    ///
    /// Resolves with the burn transaction hash whenever funds moved, whether
    /// or not the destination mint was finalized here. Rejects only when no
    /// funds-moving transaction was ever submitted.
    pub async fn execute(
        &self,
        request: TransferRequest,
    ) -> Result<TransferOutcome, TransferError> {
        request.validate()?;
        let source = ChainRegistry::config(request.source);
        let source_bridge = ChainRegistry::bridge(request.source)?;
        let destination_bridge = ChainRegistry::bridge(request.destination)?;
        *self.state.lock().expect("state lock poisoned") = TransferState::default();

        // Network: the wallet must be on the source chain before any write.
        self.emit(TransferStep::VerifyNetwork, StepStatus::InProgress, None, None);
        let active = self
            .wallet
            .active_chain()
            .await
            .map_err(|source| self.fail(TransferStep::VerifyNetwork, TransferError::Wallet {
                step: TransferStep::VerifyNetwork,
                source,
            }))?;
        if active != source.chain_id {
            self.wallet
                .switch_chain(source.chain_id)
                .await
                .map_err(|source| self.fail(TransferStep::VerifyNetwork, TransferError::Wallet {
                    step: TransferStep::VerifyNetwork,
                    source,
                }))?;
            // Re-check: the switch is external and may silently no-op.
            let now = self
                .wallet
                .active_chain()
                .await
                .map_err(|source| self.fail(TransferStep::VerifyNetwork, TransferError::Wallet {
                    step: TransferStep::VerifyNetwork,
                    source,
                }))?;
            if now != source.chain_id {
                return Err(self.fail(
                    TransferStep::VerifyNetwork,
                    TransferError::WrongNetwork {
                        expected: source.chain_id,
                        actual: now,
                    },
                ));
            }
        }
        self.emit(TransferStep::VerifyNetwork, StepStatus::Done, None, None);

        // Balance: reject before spending any gas.
        self.emit(TransferStep::VerifyBalance, StepStatus::InProgress, None, None);
        let owner = self.wallet.address();
        let available = self
            .reader
            .balance_of(request.source, owner)
            .await
            .map_err(|e| self.fail(TransferStep::VerifyBalance, e.into()))?;
        if available < request.amount {
            return Err(self.fail(
                TransferStep::VerifyBalance,
                TransferError::InsufficientFunds {
                    required: request.amount,
                    available,
                },
            ));
        }
        self.emit(TransferStep::VerifyBalance, StepStatus::Done, None, None);

        // Allowance: the bridge charges its fee from the allowance
        // atomically with the burn, so the approval must cover amount + fee
        // and must be its own confirmed transaction before the burn.
        self.emit(TransferStep::Approve, StepStatus::InProgress, None, None);
        let required = self.config.fee_schedule.required_allowance(request.amount);
        let allowance = self
            .reader
            .allowance(request.source, owner, source_bridge.token_messenger)
            .await
            .map_err(|e| self.fail(TransferStep::Approve, e.into()))?;
        if allowance < required {
            let calldata = approve_calldata(source_bridge.token_messenger, required);
            let tx_hash = self
                .wallet
                .send_transaction(source.usdc, calldata)
                .await
                .map_err(|source| self.fail(TransferStep::Approve, TransferError::Wallet {
                    step: TransferStep::Approve,
                    source,
                }))?;
            let ok = self
                .wallet
                .wait_for_receipt(tx_hash)
                .await
                .map_err(|source| self.fail(TransferStep::Approve, TransferError::Wallet {
                    step: TransferStep::Approve,
                    source,
                }))?;
            if !ok {
                return Err(self.fail(
                    TransferStep::Approve,
                    TransferError::ApprovalReverted { tx_hash },
                ));
            }
            self.emit(TransferStep::Approve, StepStatus::Done, Some(tx_hash), None);
        } else {
            self.emit(TransferStep::Approve, StepStatus::Done, None, None);
        }

        // Burn. The destination is identified by its bridge domain, not its
        // chain ID; the standard finality path burns with a zero max fee.
        self.emit(TransferStep::Burn, StepStatus::InProgress, None, None);
        let max_fee = match self.config.finality {
            FinalityThreshold::Fast => self.config.fee_schedule.max_fee(request.amount),
            FinalityThreshold::Standard => UsdcAmount::ZERO,
        };
        let burn = DepositForBurn {
            amount: request.amount,
            destination_domain: destination_bridge.domain,
            mint_recipient: request.recipient,
            burn_token: source.usdc,
            max_fee,
            finality: self.config.finality,
            hook_data: request.hook_data.clone(),
        };
        let calldata = deposit_for_burn_calldata(&burn);
        let burn_tx_hash = self
            .wallet
            .send_transaction(source_bridge.token_messenger, calldata)
            .await
            .map_err(|source| self.fail(TransferStep::Burn, TransferError::Wallet {
                step: TransferStep::Burn,
                source,
            }))?;
        self.state
            .lock()
            .expect("state lock poisoned")
            .burn_tx_hash = Some(burn_tx_hash);
        tracing::info!(
            burn_tx = %burn_tx_hash,
            explorer = %ChainRegistry::tx_url(request.source, burn_tx_hash),
            amount = %request.amount,
            destination_domain = destination_bridge.domain,
            "burn submitted"
        );
        match self.wallet.wait_for_receipt(burn_tx_hash).await {
            Ok(true) => {
                self.emit(TransferStep::Burn, StepStatus::Done, Some(burn_tx_hash), None);
            }
            Ok(false) => {
                // A reverted burn moved no funds; this is still a failure.
                return Err(self.fail(
                    TransferStep::Burn,
                    TransferError::BurnReverted {
                        tx_hash: burn_tx_hash,
                    },
                ));
            }
            Err(err) => {
                // The burn may have been mined; report it rather than fail.
                return Ok(self.defer(
                    burn_tx_hash,
                    TransferStep::Burn,
                    DeferralReason::ReceiptUnavailable {
                        message: err.to_string(),
                    },
                ));
            }
        }

        if !request.is_cross_chain() {
            // Same-chain: the burn is the entire operation.
            return Ok(TransferOutcome {
                burn_tx_hash,
                completion: TransferCompletion::Completed {
                    finalize_tx_hash: None,
                },
            });
        }

        // Attestation, keyed by the burn hash and the *source* domain. A
        // timeout here is not a transfer failure: the burn already happened.
        self.emit(TransferStep::AwaitAttestation, StepStatus::InProgress, None, None);
        let attestation = match poll_until(&self.config.attestation_policy, &self.cancel, || {
            self.attestation.fetch(source_bridge.domain, burn_tx_hash)
        })
        .await
        {
            Ok(attestation) => attestation,
            Err(PollError::Timeout { last_error, .. }) => {
                return Ok(self.defer(
                    burn_tx_hash,
                    TransferStep::AwaitAttestation,
                    DeferralReason::AttestationTimeout { last_error },
                ));
            }
            Err(PollError::Cancelled) => {
                return Ok(self.defer(
                    burn_tx_hash,
                    TransferStep::AwaitAttestation,
                    DeferralReason::Cancelled,
                ));
            }
        };
        self.state
            .lock()
            .expect("state lock poisoned")
            .attestation = Some(attestation.clone());
        self.emit(TransferStep::AwaitAttestation, StepStatus::Done, None, None);

        if !self.config.auto_finalize {
            return Ok(self.defer(
                burn_tx_hash,
                TransferStep::Finalize,
                DeferralReason::AutoFinalizeDisabled,
            ));
        }

        // Finalize on the destination chain. Any refusal here defers instead
        // of failing: the off-chain relayer will mint regardless.
        self.emit(TransferStep::Finalize, StepStatus::InProgress, None, None);
        let destination = ChainRegistry::config(request.destination);
        let switched = match self.wallet.switch_chain(destination.chain_id).await {
            Ok(()) => match self.wallet.active_chain().await {
                Ok(chain_id) => chain_id == destination.chain_id,
                Err(_) => false,
            },
            Err(_) => false,
        };
        if !switched {
            return Ok(self.defer(
                burn_tx_hash,
                TransferStep::Finalize,
                DeferralReason::NetworkSwitchRefused,
            ));
        }
        let calldata = receive_message_calldata(attestation.message, attestation.attestation);
        let finalize_tx_hash = match self
            .wallet
            .send_transaction(destination_bridge.message_transmitter, calldata)
            .await
        {
            Ok(tx_hash) => tx_hash,
            Err(err) => {
                return Ok(self.defer(
                    burn_tx_hash,
                    TransferStep::Finalize,
                    DeferralReason::FinalizeFailed {
                        message: err.to_string(),
                    },
                ));
            }
        };
        match self.wallet.wait_for_receipt(finalize_tx_hash).await {
            Ok(true) => {}
            Ok(false) => {
                // Possibly already minted by the relayer; either way the
                // transfer stands.
                return Ok(self.defer(
                    burn_tx_hash,
                    TransferStep::Finalize,
                    DeferralReason::FinalizeFailed {
                        message: format!("receive transaction reverted: {finalize_tx_hash}"),
                    },
                ));
            }
            Err(err) => {
                return Ok(self.defer(
                    burn_tx_hash,
                    TransferStep::Finalize,
                    DeferralReason::FinalizeFailed {
                        message: err.to_string(),
                    },
                ));
            }
        }
        self.state
            .lock()
            .expect("state lock poisoned")
            .finalize_tx_hash = Some(finalize_tx_hash);
        self.emit(TransferStep::Finalize, StepStatus::Done, Some(finalize_tx_hash), None);
        Ok(TransferOutcome {
            burn_tx_hash,
            completion: TransferCompletion::Completed {
                finalize_tx_hash: Some(finalize_tx_hash),
            },
        })
    }

    /// USDC balances for `owner` across every bridge-capable network the
    /// reader is configured for. Read failures log and report zero rather
    /// than failing the whole sweep.
    pub async fn balances_for(&self, owner: alloy_primitives::Address) -> Vec<(Network, UsdcAmount)> {
        let mut balances = Vec::new();
        for network in ChainRegistry::bridge_networks() {
            match self.reader.balance_of(network, owner).await {
                Ok(balance) => balances.push((network, balance)),
                Err(BridgeError::NotConfigured(_)) => {}
                Err(err) => {
                    tracing::warn!(chain = %network, error = %err, "balance read failed");
                    balances.push((network, UsdcAmount::ZERO));
                }
            }
        }
        balances
    }
}

/// Whether the bridge can route between the two networks.
pub fn is_supported_route(source: Network, destination: Network) -> bool {
    if ChainRegistry::bridge(source).is_err() || ChainRegistry::bridge(destination).is_err() {
        return false;
    }
    ChainRegistry::config(source).testnet == ChainRegistry::config(destination).testnet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::AttestationError;
    use crate::bridge::ITokenMessengerV2;
    use alloy_primitives::{Address, Bytes, U256, address};
    use alloy_sol_types::SolCall;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

    const BUYER: Address = address!("0x00000000000000000000000000000000000000b1");

    fn seller() -> Address {
        address!("0x00000000000000000000000000000000000000e1")
    }

    struct MockWallet {
        chain: AtomicU64,
        /// When false, switch_chain acknowledges but leaves the chain as-is.
        switch_takes_effect: bool,
        sent: StdMutex<Vec<(Address, Bytes)>>,
        next_tx: AtomicU64,
    }

    impl MockWallet {
        fn on_chain(chain_id: u64) -> Self {
            Self {
                chain: AtomicU64::new(chain_id),
                switch_takes_effect: true,
                sent: StdMutex::new(Vec::new()),
                next_tx: AtomicU64::new(1),
            }
        }

        fn sent(&self) -> Vec<(Address, Bytes)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WalletSession for MockWallet {
        fn address(&self) -> Address {
            BUYER
        }

        async fn active_chain(&self) -> Result<u64, WalletError> {
            Ok(self.chain.load(Ordering::SeqCst))
        }

        async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
            if self.switch_takes_effect {
                self.chain.store(chain_id, Ordering::SeqCst);
            }
            Ok(())
        }

        async fn send_transaction(
            &self,
            to: Address,
            calldata: Bytes,
        ) -> Result<B256, WalletError> {
            self.sent.lock().unwrap().push((to, calldata));
            let n = self.next_tx.fetch_add(1, Ordering::SeqCst);
            Ok(B256::with_last_byte(n as u8))
        }

        async fn wait_for_receipt(&self, _tx_hash: B256) -> Result<bool, WalletError> {
            Ok(true)
        }
    }

    struct MockReader {
        balance: UsdcAmount,
        allowance: UsdcAmount,
        reads: AtomicU32,
    }

    impl MockReader {
        fn with(balance: &str, allowance: &str) -> Self {
            Self {
                balance: UsdcAmount::parse(balance).unwrap(),
                allowance: UsdcAmount::parse(allowance).unwrap(),
                reads: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl StablecoinReader for MockReader {
        async fn balance_of(
            &self,
            _network: Network,
            _owner: Address,
        ) -> Result<UsdcAmount, BridgeError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.balance)
        }

        async fn allowance(
            &self,
            _network: Network,
            _owner: Address,
            _spender: Address,
        ) -> Result<UsdcAmount, BridgeError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.allowance)
        }
    }

    enum AttestationBehavior {
        CompleteImmediately,
        NeverComplete,
        NetworkError,
    }

    struct MockAttestation {
        behavior: AttestationBehavior,
        fetched_domains: StdMutex<Vec<u32>>,
    }

    impl MockAttestation {
        fn new(behavior: AttestationBehavior) -> Self {
            Self {
                behavior,
                fetched_domains: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AttestationClient for MockAttestation {
        async fn fetch(
            &self,
            source_domain: u32,
            _tx_hash: B256,
        ) -> Result<Option<AttestationMessage>, AttestationError> {
            self.fetched_domains.lock().unwrap().push(source_domain);
            match self.behavior {
                AttestationBehavior::CompleteImmediately => Ok(Some(AttestationMessage {
                    message: Bytes::from(vec![0xaa]),
                    attestation: Bytes::from(vec![0xbb]),
                })),
                AttestationBehavior::NeverComplete => Ok(None),
                AttestationBehavior::NetworkError => {
                    Err(AttestationError::Malformed("connection reset".into()))
                }
            }
        }
    }

    fn request(source: Network, destination: Network) -> TransferRequest {
        TransferRequest {
            amount: UsdcAmount::parse("10").unwrap(),
            source,
            destination,
            recipient: seller(),
            hook_data: None,
        }
    }

    fn orchestrator(
        wallet: MockWallet,
        reader: MockReader,
        attestation: MockAttestation,
    ) -> TransferOrchestrator<MockWallet, MockReader, MockAttestation> {
        TransferOrchestrator::new(wallet, reader, attestation, TransferConfig::default())
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    #[tokio::test]
    async fn happy_path_finalizes_on_the_destination_chain() {
        init_tracing();
        let orchestrator = orchestrator(
            MockWallet::on_chain(8453),
            MockReader::with("100", "100"),
            MockAttestation::new(AttestationBehavior::CompleteImmediately),
        );
        let outcome = orchestrator
            .execute(request(Network::Base, Network::Arbitrum))
            .await
            .unwrap();
        match outcome.completion {
            TransferCompletion::Completed { finalize_tx_hash } => {
                assert!(finalize_tx_hash.is_some())
            }
            other => panic!("expected completion, got {other:?}"),
        }
        // Burn went to the token messenger, finalize to the transmitter.
        let sent = orchestrator.wallet.sent();
        assert_eq!(sent.len(), 2);
        let base_bridge = ChainRegistry::bridge(Network::Base).unwrap();
        let arb_bridge = ChainRegistry::bridge(Network::Arbitrum).unwrap();
        assert_eq!(sent[0].0, base_bridge.token_messenger);
        assert_eq!(sent[1].0, arb_bridge.message_transmitter);
        // Attestation was fetched with the source domain.
        assert_eq!(
            orchestrator.attestation.fetched_domains.lock().unwrap()[0],
            base_bridge.domain
        );
    }

    #[tokio::test]
    async fn burn_addresses_the_destination_domain_never_the_chain_id() {
        // Every cross-chain pair must resolve the destination's registry
        // domain into the burn calldata.
        let pairs = [
            (Network::Base, Network::Arbitrum),
            (Network::Arbitrum, Network::Base),
            (Network::Ethereum, Network::Linea),
            (Network::Polygon, Network::Avalanche),
            (Network::Sepolia, Network::ArbitrumSepolia),
        ];
        for (source, destination) in pairs {
            let orchestrator = orchestrator(
                MockWallet::on_chain(ChainRegistry::config(source).chain_id),
                MockReader::with("100", "100"),
                MockAttestation::new(AttestationBehavior::CompleteImmediately),
            );
            orchestrator
                .execute(request(source, destination))
                .await
                .unwrap();
            let sent = orchestrator.wallet.sent();
            let call = ITokenMessengerV2::depositForBurnCall::abi_decode(&sent[0].1).unwrap();
            let expected = ChainRegistry::bridge(destination).unwrap().domain;
            assert_eq!(call.destinationDomain, expected, "{source} -> {destination}");
            assert_ne!(
                call.destinationDomain as u64,
                ChainRegistry::config(destination).chain_id,
                "domain must not be the chain id for {destination}"
            );
        }
    }

    #[tokio::test]
    async fn zero_recipient_is_rejected_before_any_network_call() {
        let orchestrator = orchestrator(
            MockWallet::on_chain(8453),
            MockReader::with("100", "100"),
            MockAttestation::new(AttestationBehavior::CompleteImmediately),
        );
        let mut req = request(Network::Base, Network::Arbitrum);
        req.recipient = Address::ZERO;
        let err = orchestrator.execute(req).await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::InvalidRequest(RequestValidationError::ZeroRecipient)
        ));
        assert_eq!(orchestrator.wallet.sent().len(), 0);
        assert_eq!(orchestrator.reader.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn insufficient_funds_fails_before_spending_gas() {
        let orchestrator = orchestrator(
            MockWallet::on_chain(8453),
            MockReader::with("5", "100"),
            MockAttestation::new(AttestationBehavior::CompleteImmediately),
        );
        let err = orchestrator
            .execute(request(Network::Base, Network::Arbitrum))
            .await
            .unwrap_err();
        match err {
            TransferError::InsufficientFunds {
                required,
                available,
            } => {
                assert_eq!(required, UsdcAmount::parse("10").unwrap());
                assert_eq!(available, UsdcAmount::parse("5").unwrap());
            }
            other => panic!("expected insufficient funds, got {other}"),
        }
        assert_eq!(orchestrator.wallet.sent().len(), 0);
    }

    #[tokio::test]
    async fn silently_failing_switch_is_detected() {
        let mut wallet = MockWallet::on_chain(1);
        wallet.switch_takes_effect = false;
        let orchestrator = orchestrator(
            wallet,
            MockReader::with("100", "100"),
            MockAttestation::new(AttestationBehavior::CompleteImmediately),
        );
        let err = orchestrator
            .execute(request(Network::Base, Network::Arbitrum))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::WrongNetwork {
                expected: 8453,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn short_allowance_inserts_an_approval_sized_for_amount_plus_fee() {
        let orchestrator = orchestrator(
            MockWallet::on_chain(8453),
            MockReader::with("100", "9"),
            MockAttestation::new(AttestationBehavior::CompleteImmediately),
        );
        orchestrator
            .execute(request(Network::Base, Network::Arbitrum))
            .await
            .unwrap();
        let sent = orchestrator.wallet.sent();
        // approve + burn + finalize
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].0, ChainRegistry::config(Network::Base).usdc);
        let approve = crate::bridge::IERC20::approveCall::abi_decode(&sent[0].1).unwrap();
        assert_eq!(approve.amount, U256::from(10_010_000u64));
    }

    #[tokio::test]
    async fn sufficient_allowance_skips_the_approval() {
        let orchestrator = orchestrator(
            MockWallet::on_chain(8453),
            MockReader::with("100", "10.01"),
            MockAttestation::new(AttestationBehavior::CompleteImmediately),
        );
        orchestrator
            .execute(request(Network::Base, Network::Arbitrum))
            .await
            .unwrap();
        // burn + finalize only
        assert_eq!(orchestrator.wallet.sent().len(), 2);
    }

    #[tokio::test]
    async fn same_chain_transfer_completes_at_the_burn() {
        let orchestrator = orchestrator(
            MockWallet::on_chain(8453),
            MockReader::with("100", "100"),
            MockAttestation::new(AttestationBehavior::NeverComplete),
        );
        let outcome = orchestrator
            .execute(request(Network::Base, Network::Base))
            .await
            .unwrap();
        assert_eq!(
            outcome.completion,
            TransferCompletion::Completed {
                finalize_tx_hash: None
            }
        );
        // No attestation request was ever made.
        assert!(orchestrator
            .attestation
            .fetched_domains
            .lock()
            .unwrap()
            .is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn attestation_timeout_defers_and_keeps_the_burn_hash() {
        let orchestrator = orchestrator(
            MockWallet::on_chain(8453),
            MockReader::with("100", "100"),
            MockAttestation::new(AttestationBehavior::NeverComplete),
        );
        let outcome = orchestrator
            .execute(request(Network::Base, Network::Arbitrum))
            .await
            .unwrap();
        assert_eq!(outcome.burn_tx_hash, B256::with_last_byte(1));
        assert!(matches!(
            outcome.completion,
            TransferCompletion::FinalizeDeferred {
                reason: DeferralReason::AttestationTimeout { .. }
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn attestation_network_errors_still_resolve_with_the_burn_hash() {
        let orchestrator = orchestrator(
            MockWallet::on_chain(8453),
            MockReader::with("100", "100"),
            MockAttestation::new(AttestationBehavior::NetworkError),
        );
        let outcome = orchestrator
            .execute(request(Network::Base, Network::Arbitrum))
            .await
            .unwrap();
        assert_eq!(outcome.burn_tx_hash, B256::with_last_byte(1));
        match outcome.completion {
            TransferCompletion::FinalizeDeferred {
                reason: DeferralReason::AttestationTimeout { last_error },
            } => assert!(last_error.unwrap().contains("connection reset")),
            other => panic!("expected deferred outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn events_trace_the_step_sequence() {
        let orchestrator = orchestrator(
            MockWallet::on_chain(8453),
            MockReader::with("100", "100"),
            MockAttestation::new(AttestationBehavior::CompleteImmediately),
        );
        let mut events = orchestrator.take_events().unwrap();
        orchestrator
            .execute(request(Network::Base, Network::Arbitrum))
            .await
            .unwrap();
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push((event.step, event.status));
        }
        let done: Vec<TransferStep> = seen
            .iter()
            .filter(|(_, status)| *status == StepStatus::Done)
            .map(|(step, _)| *step)
            .collect();
        assert_eq!(
            done,
            vec![
                TransferStep::VerifyNetwork,
                TransferStep::VerifyBalance,
                TransferStep::Approve,
                TransferStep::Burn,
                TransferStep::AwaitAttestation,
                TransferStep::Finalize,
            ]
        );
    }

    #[test]
    fn route_support_requires_bridges_on_both_ends() {
        assert!(is_supported_route(Network::Base, Network::Arbitrum));
        assert!(is_supported_route(Network::Base, Network::Base));
        assert!(!is_supported_route(Network::Base, Network::PolygonAmoy));
        assert!(!is_supported_route(Network::Base, Network::BaseSepolia));
    }
}
