//! Shared payment types: fixed-point USDC amounts, transfer requests, and the
//! step/status vocabulary the orchestrators report progress in.

use alloy_primitives::{Address, Bytes, U256};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::network::{ChainRegistry, Network};

/// Number of decimal places in USDC.
pub const USDC_DECIMALS: u32 = 6;

const UNIT: u64 = 10u64.pow(USDC_DECIMALS);

/// A USDC amount in base units (6 decimal places).
///
/// `UsdcAmount::parse("10.50")` is 10_500_000 units. Arithmetic is checked;
/// amounts never go negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsdcAmount(u64);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AmountParseError {
    #[error("invalid decimal amount")]
    InvalidFormat,
    #[error("negative amounts are not allowed")]
    Negative,
    #[error("too many decimal places: {0} (USDC has {USDC_DECIMALS})")]
    TooPrecise(u32),
    #[error("amount does not fit into 64 bits of base units")]
    Overflow,
}

impl UsdcAmount {
    pub const ZERO: UsdcAmount = UsdcAmount(0);

    /// Construct from base units (millionths of a USDC).
    pub const fn from_units(units: u64) -> Self {
        UsdcAmount(units)
    }

    /// Base units.
    pub const fn units(&self) -> u64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parse a human-readable decimal amount, e.g. `"10.50"`.
    pub fn parse(input: &str) -> Result<Self, AmountParseError> {
        let decimal = Decimal::from_str(input).map_err(|_| AmountParseError::InvalidFormat)?;
        if decimal.is_sign_negative() {
            return Err(AmountParseError::Negative);
        }
        if decimal.scale() > USDC_DECIMALS {
            return Err(AmountParseError::TooPrecise(decimal.scale()));
        }
        let scaled = decimal
            .checked_mul(Decimal::from(UNIT))
            .ok_or(AmountParseError::Overflow)?;
        let units = scaled.to_u64().ok_or(AmountParseError::Overflow)?;
        Ok(UsdcAmount(units))
    }

    pub fn checked_add(self, other: UsdcAmount) -> Option<UsdcAmount> {
        self.0.checked_add(other.0).map(UsdcAmount)
    }

    pub fn min(self, other: UsdcAmount) -> UsdcAmount {
        UsdcAmount(self.0.min(other.0))
    }
}

impl Display for UsdcAmount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNIT;
        let frac = self.0 % UNIT;
        if frac == 0 {
            write!(f, "{whole}")
        } else {
            let frac = format!("{frac:06}");
            write!(f, "{whole}.{}", frac.trim_end_matches('0'))
        }
    }
}

impl FromStr for UsdcAmount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UsdcAmount::parse(s)
    }
}

impl From<UsdcAmount> for U256 {
    fn from(amount: UsdcAmount) -> Self {
        U256::from(amount.0)
    }
}

/// Finality threshold selecting the attestation path for a burn.
///
/// The fast path attests at a lower finality threshold and completes on a
/// seconds scale; the standard path waits for full finality and takes minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalityThreshold {
    Fast,
    Standard,
}

impl FinalityThreshold {
    /// The `minFinalityThreshold` wire value for the burn call.
    pub const fn as_u32(&self) -> u32 {
        match self {
            FinalityThreshold::Fast => 1000,
            FinalityThreshold::Standard => 2000,
        }
    }
}

/// A request to move USDC from the caller's account on `source` to
/// `recipient` on `destination`.
///
/// `source == destination` is legal and means the transfer completes at the
/// burn step with no attestation round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub amount: UsdcAmount,
    pub source: Network,
    pub destination: Network,
    pub recipient: Address,
    /// Optional hook payload executed on the destination chain after the mint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_data: Option<Bytes>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("transfer amount must be positive")]
    ZeroAmount,
    /// A zero recipient would burn funds into an unspendable mint. Rejected
    /// before any network call.
    #[error("recipient must not be the zero address")]
    ZeroRecipient,
    #[error("no bridge deployment on {0}")]
    UnsupportedChain(Network),
    #[error("source and destination belong to different environments")]
    MixedEnvironments,
}

impl TransferRequest {
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if self.amount.is_zero() {
            return Err(RequestValidationError::ZeroAmount);
        }
        if self.recipient == Address::ZERO {
            return Err(RequestValidationError::ZeroRecipient);
        }
        for network in [self.source, self.destination] {
            if ChainRegistry::bridge(network).is_err() {
                return Err(RequestValidationError::UnsupportedChain(network));
            }
        }
        let src = ChainRegistry::config(self.source);
        let dst = ChainRegistry::config(self.destination);
        if src.testnet != dst.testnet {
            return Err(RequestValidationError::MixedEnvironments);
        }
        Ok(())
    }

    /// Whether this request crosses chains (and therefore needs attestation
    /// and finalization).
    pub fn is_cross_chain(&self) -> bool {
        self.source != self.destination
    }
}

/// Identifies one step of a transfer flow in progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferStep {
    VerifyNetwork,
    VerifyBalance,
    Approve,
    Burn,
    AwaitAttestation,
    Finalize,
}

impl Display for TransferStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferStep::VerifyNetwork => "verify-network",
            TransferStep::VerifyBalance => "verify-balance",
            TransferStep::Approve => "approve",
            TransferStep::Burn => "burn",
            TransferStep::AwaitAttestation => "await-attestation",
            TransferStep::Finalize => "finalize",
        };
        write!(f, "{}", s)
    }
}

/// Status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}
