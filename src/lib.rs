//! Cross-chain USDC payment orchestration.
//!
//! This crate is the payment core of a listings marketplace: it moves a
//! stablecoin balance from a buyer's account on one chain to a seller's
//! account on a possibly different chain, optionally without the buyer
//! holding any native gas token. The marketplace itself (listings, search,
//! UI) is an external collaborator that supplies a seller address, an
//! amount, and subscribes to progress events.
//!
//! # Overview
//!
//! Two coupled protocols do the heavy lifting:
//!
//! - **Burn-and-mint bridging** (CCTP v2): the source-chain balance is
//!   burned, an off-chain operator attests to the burn, and an equivalent
//!   balance is minted on the destination chain. Finality is asynchronous
//!   and spans two independent ledgers, so the flow is tracked as an
//!   explicit state machine with the burn as its point of no return.
//! - **Account abstraction** (ERC-4337): a deterministic smart account,
//!   derived before it exists on-chain, authorizes transfers via signed
//!   user operations relayed by a bundler, with gas underwritten by a
//!   paymaster and recouped in USDC.
//!
//! # Modules
//!
//! - [`network`] — supported chains and the static registry of bridge
//!   domains, contract addresses, and display metadata.
//! - [`types`] — fixed-point USDC amounts, transfer requests, step/status
//!   vocabulary.
//! - [`bridge`] — contract bindings, pure calldata builders, and balance /
//!   allowance reads.
//! - [`attestation`] — the attestation service client.
//! - [`poll`] — retry policies and the generic cancellable polling
//!   primitive.
//! - [`transfer`] — the [`TransferOrchestrator`](transfer::TransferOrchestrator)
//!   state machine for bridge transfers.
//! - [`account`] — deterministic smart-account derivation and state.
//! - [`userop`] — user operation envelopes, canonical hashing, signing.
//! - [`relayer`] — the bundler JSON-RPC client.
//! - [`gasless`] — the [`GaslessPaymentOrchestrator`](gasless::GaslessPaymentOrchestrator)
//!   state machine for sponsor-paid payments.
//! - [`describe`] — clear-signing previews of payment calls.
//! - [`wallet`] — the wallet/session trait the embedding application
//!   implements.
//! - [`config`] — explicit configuration passed to orchestrators at
//!   construction.
//!
//! # Example
//!
//! ```ignore
//! use stablepay::config::TransferConfig;
//! use stablepay::network::Network;
//! use stablepay::transfer::TransferOrchestrator;
//! use stablepay::types::{TransferRequest, UsdcAmount};
//!
//! let orchestrator = TransferOrchestrator::new(wallet, reader, attestation, TransferConfig::default());
//! let mut events = orchestrator.take_events().unwrap();
//! let outcome = orchestrator
//!     .execute(TransferRequest {
//!         amount: UsdcAmount::parse("10.50")?,
//!         source: Network::Base,
//!         destination: Network::Arbitrum,
//!         recipient: seller,
//!         hook_data: None,
//!     })
//!     .await?;
//! // outcome.burn_tx_hash is valid even when finalization was deferred.
//! ```

pub mod account;
pub mod attestation;
pub mod bridge;
pub mod config;
pub mod describe;
pub mod gasless;
pub mod network;
pub mod poll;
pub mod relayer;
pub mod transfer;
pub mod types;
pub mod userop;
pub mod util;
pub mod wallet;
