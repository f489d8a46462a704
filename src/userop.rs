//! User operation envelope, canonical hashing, and signing.
//!
//! A [`UserOperation`] is the signed description of a smart-account action
//! submitted to a relay network instead of a native transaction (entry point
//! v0.6 layout). Construction is two-phase:
//!
//! 1. assemble a draft with resolved sponsor data and placeholder gas fields,
//!    and send it for gas estimation;
//! 2. fill in the estimated limits and current fee parameters, compute the
//!    canonical hash, and sign it.
//!
//! The hash covers every field except the signature and is domain-separated
//! by the entry point address and chain ID, so mutating any signed field (or
//! replaying on another chain or entry point) invalidates the signature.
//! Sponsor data is resolved **before** estimation and signing: a change to
//! any field afterwards would invalidate both the signature and the
//! sponsor's authorization.

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_signer::Signer;
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

use crate::account::FeeEstimate;
use crate::util::quantity;

/// An ERC-4337 user operation (entry point v0.6).
///
/// Numeric fields serialize as canonical minimal hex, the form relay
/// endpoints require.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    #[serde(with = "quantity")]
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    #[serde(with = "quantity")]
    pub call_gas_limit: U256,
    #[serde(with = "quantity")]
    pub verification_gas_limit: U256,
    #[serde(with = "quantity")]
    pub pre_verification_gas: U256,
    #[serde(with = "quantity")]
    pub max_fee_per_gas: U256,
    #[serde(with = "quantity")]
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

/// Gas limits returned by the relay network's estimation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    #[serde(with = "quantity")]
    pub call_gas_limit: U256,
    #[serde(with = "quantity")]
    pub verification_gas_limit: U256,
    #[serde(with = "quantity")]
    pub pre_verification_gas: U256,
}

/// Time window within which a sponsor authorization is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityWindow {
    pub valid_until: u64,
    pub valid_after: u64,
}

/// Who pays for gas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SponsorData {
    /// The sender pays in the native token. Encodes as an empty payload.
    SenderPays,
    /// A paymaster underwrites gas, optionally within a validity window.
    Paymaster {
        paymaster: Address,
        window: Option<ValidityWindow>,
    },
}

impl SponsorData {
    /// Encode into the `paymasterAndData` field: empty for sender-paid
    /// operations; otherwise the paymaster address followed by either a zero
    /// word (unbounded) or the ABI-encoded validity bounds.
    pub fn encode(&self) -> Bytes {
        match self {
            SponsorData::SenderPays => Bytes::new(),
            SponsorData::Paymaster { paymaster, window } => {
                let mut bytes = Vec::with_capacity(52);
                bytes.extend_from_slice(paymaster.as_slice());
                match window {
                    None => bytes.extend_from_slice(&[0u8; 32]),
                    Some(window) => {
                        let bounds = (
                            U256::from(window.valid_until),
                            U256::from(window.valid_after),
                        )
                            .abi_encode();
                        bytes.extend_from_slice(&bounds);
                    }
                }
                bytes.into()
            }
        }
    }

    pub fn is_sponsored(&self) -> bool {
        !matches!(self, SponsorData::SenderPays)
    }
}

/// The fields fixed before gas estimation.
#[derive(Debug, Clone)]
pub struct UserOperationDraft {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub sponsor: SponsorData,
}

/// Canonical hash of a user operation.
///
/// `keccak256(abi.encode(keccak256(packed fields), entryPoint, chainId))`,
/// where the packed fields hash the variable-length members (`initCode`,
/// `callData`, `paymasterAndData`) instead of embedding them.
pub fn user_operation_hash(op: &UserOperation, entry_point: Address, chain_id: u64) -> B256 {
    let packed = (
        op.sender,
        op.nonce,
        keccak256(&op.init_code),
        keccak256(&op.call_data),
        op.call_gas_limit,
        op.verification_gas_limit,
        op.pre_verification_gas,
        op.max_fee_per_gas,
        op.max_priority_fee_per_gas,
        keccak256(&op.paymaster_and_data),
    )
        .abi_encode();
    let envelope = (keccak256(packed), entry_point, U256::from(chain_id)).abi_encode();
    keccak256(envelope)
}

#[derive(Debug, thiserror::Error)]
pub enum UserOpError {
    #[error("signing failed")]
    Signing(#[from] alloy_signer::Error),
}

/// Two-phase builder bound to one entry point, chain, and owner key.
pub struct UserOperationBuilder<S> {
    entry_point: Address,
    chain_id: u64,
    signer: S,
}

impl<S: Signer + Send + Sync> UserOperationBuilder<S> {
    pub fn new(entry_point: Address, chain_id: u64, signer: S) -> Self {
        Self {
            entry_point,
            chain_id,
            signer,
        }
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    /// Phase one: the unsigned operation sent for gas estimation. Gas fields
    /// are placeholders; sponsor data is already final.
    pub fn for_estimation(&self, draft: &UserOperationDraft) -> UserOperation {
        UserOperation {
            sender: draft.sender,
            nonce: draft.nonce,
            init_code: draft.init_code.clone(),
            call_data: draft.call_data.clone(),
            call_gas_limit: U256::ZERO,
            verification_gas_limit: U256::ZERO,
            pre_verification_gas: U256::ZERO,
            max_fee_per_gas: U256::ZERO,
            max_priority_fee_per_gas: U256::ZERO,
            paymaster_and_data: draft.sponsor.encode(),
            signature: Bytes::new(),
        }
    }

    /// Phase two: fill in estimated gas limits and current fees, then sign
    /// the canonical hash. Must be re-run from scratch if any field changes
    /// afterwards (e.g. a retried nonce).
    pub async fn finalize(
        &self,
        draft: &UserOperationDraft,
        gas: GasEstimate,
        fees: FeeEstimate,
    ) -> Result<UserOperation, UserOpError> {
        let mut op = self.for_estimation(draft);
        op.call_gas_limit = gas.call_gas_limit;
        op.verification_gas_limit = gas.verification_gas_limit;
        op.pre_verification_gas = gas.pre_verification_gas;
        op.max_fee_per_gas = U256::from(fees.max_fee_per_gas);
        op.max_priority_fee_per_gas = U256::from(fees.max_priority_fee_per_gas);
        let hash = user_operation_hash(&op, self.entry_point, self.chain_id);
        let signature = self.signer.sign_message(hash.as_slice()).await?;
        op.signature = Bytes::from(signature.as_bytes().to_vec());
        tracing::debug!(sender = %op.sender, nonce = %op.nonce, user_op_hash = %hash, "signed user operation");
        Ok(op)
    }

    /// The hash `finalize` signed for this operation.
    pub fn hash(&self, op: &UserOperation) -> B256 {
        user_operation_hash(op, self.entry_point, self.chain_id)
    }
}
