//! Engine configuration.
//!
//! Everything that used to be a module-level singleton in earlier iterations
//! is an explicit value here, passed to an orchestrator at construction: the
//! bridge fee schedule, attestation/receipt retry policies, and the ERC-4337
//! deployment addresses.

use alloy_primitives::{Address, U256, address};
use url::Url;

use crate::network::Network;
use crate::poll::RetryPolicy;
use crate::types::{FinalityThreshold, UsdcAmount};

/// ERC-4337 entry point v0.6, shared across the supported chains.
pub const ENTRY_POINT_V06: Address = address!("0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");

/// SimpleAccount factory deployment, shared across the supported chains.
pub const SIMPLE_ACCOUNT_FACTORY: Address = address!("0x9406Cc6185a346906296840746125a0E44976454");

/// Circle paymaster (v0.7) on the gasless testnets.
pub const CIRCLE_PAYMASTER: Address = address!("0x31BE08D380A21fc740883c0BC434FcFc88740b58");

/// Bridge fee model: a percentage of the burned amount, capped.
///
/// Both knobs are deployment configuration, not protocol constants; confirm
/// them against the live bridge version before changing the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    /// Fee share in basis points (100 = 1%).
    pub bps: u32,
    /// Absolute fee ceiling.
    pub cap: UsdcAmount,
}

impl Default for FeeSchedule {
    /// 1% of the amount, capped at 0.01 USDC.
    fn default() -> Self {
        FeeSchedule {
            bps: 100,
            cap: UsdcAmount::from_units(10_000),
        }
    }
}

impl FeeSchedule {
    /// Maximum fee the bridge may deduct for `amount`:
    /// `min(amount * bps / 10_000, cap)`.
    pub fn max_fee(&self, amount: UsdcAmount) -> UsdcAmount {
        let share = (amount.units() as u128) * (self.bps as u128) / 10_000;
        let share = UsdcAmount::from_units(u64::try_from(share).unwrap_or(u64::MAX));
        share.min(self.cap)
    }

    /// Allowance the burn needs: the amount plus the worst-case fee. The fee
    /// is charged from the allowance atomically with the burn, which is why
    /// approval is sized up front and never batched with the burn call.
    pub fn required_allowance(&self, amount: UsdcAmount) -> UsdcAmount {
        amount
            .checked_add(self.max_fee(amount))
            .unwrap_or(UsdcAmount::from_units(u64::MAX))
    }
}

/// Configuration of a [`TransferOrchestrator`](crate::transfer::TransferOrchestrator).
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub fee_schedule: FeeSchedule,
    pub finality: FinalityThreshold,
    pub attestation_policy: RetryPolicy,
    /// Submit the destination-chain `receiveMessage` call ourselves. When
    /// `false` the transfer reports deferred finalization and the bridge's
    /// off-chain relayer completes the mint.
    pub auto_finalize: bool,
}

impl TransferConfig {
    pub fn new(finality: FinalityThreshold) -> Self {
        let attestation_policy = match finality {
            FinalityThreshold::Fast => RetryPolicy::fast_attestation(),
            FinalityThreshold::Standard => RetryPolicy::standard_attestation(),
        };
        TransferConfig {
            fee_schedule: FeeSchedule::default(),
            finality,
            attestation_policy,
            auto_finalize: true,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig::new(FinalityThreshold::Fast)
    }
}

/// A relay (bundler) endpoint and the entry point it serves.
#[derive(Debug, Clone)]
pub struct BundlerConfig {
    pub endpoint: Url,
    pub entry_point: Address,
}

/// Configuration of a [`GaslessPaymentOrchestrator`](crate::gasless::GaslessPaymentOrchestrator).
#[derive(Debug, Clone)]
pub struct GaslessConfig {
    pub network: Network,
    pub bundler: BundlerConfig,
    pub factory: Address,
    pub paymaster: Address,
    /// Smart-account derivation salt. A fixed salt keeps the derived address
    /// stable for a given owner.
    pub salt: U256,
    /// Allowance granted to the paymaster in the enable step.
    pub sponsor_allowance: UsdcAmount,
    pub receipt_policy: RetryPolicy,
}

impl GaslessConfig {
    /// Defaults for `network` with the given bundler endpoint: entry point
    /// v0.6, the shared SimpleAccount factory, the Circle paymaster, salt 0,
    /// and a 10,000 USDC sponsor allowance.
    pub fn new(network: Network, bundler_endpoint: Url) -> Self {
        GaslessConfig {
            network,
            bundler: BundlerConfig {
                endpoint: bundler_endpoint,
                entry_point: ENTRY_POINT_V06,
            },
            factory: SIMPLE_ACCOUNT_FACTORY,
            paymaster: CIRCLE_PAYMASTER,
            salt: U256::ZERO,
            sponsor_allowance: UsdcAmount::from_units(10_000_000_000),
            receipt_policy: RetryPolicy::user_operation_receipt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_is_one_percent_up_to_the_cap() {
        let fees = FeeSchedule::default();
        // 1% of 0.50 is under the cap.
        let small = UsdcAmount::parse("0.50").unwrap();
        assert_eq!(fees.max_fee(small), UsdcAmount::from_units(5_000));
        // 1% of 10.00 would be 0.10; the cap wins.
        let large = UsdcAmount::parse("10").unwrap();
        assert_eq!(fees.max_fee(large), UsdcAmount::from_units(10_000));
    }

    #[test]
    fn required_allowance_adds_the_fee() {
        let fees = FeeSchedule::default();
        let amount = UsdcAmount::parse("10").unwrap();
        assert_eq!(
            fees.required_allowance(amount),
            UsdcAmount::parse("10.01").unwrap()
        );
    }

    #[test]
    fn transfer_config_picks_the_policy_for_the_finality_path() {
        let fast = TransferConfig::new(FinalityThreshold::Fast);
        assert_eq!(fast.attestation_policy, RetryPolicy::fast_attestation());
        let standard = TransferConfig::new(FinalityThreshold::Standard);
        assert_eq!(
            standard.attestation_policy,
            RetryPolicy::standard_attestation()
        );
    }
}
