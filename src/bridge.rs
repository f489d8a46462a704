//! CCTP v2 and ERC-20 contract bindings, calldata builders, and on-chain
//! reads.
//!
//! Calldata builders are pure: they deterministically encode a contract call
//! and never touch the network, so the orchestrators can hand the bytes to
//! whatever submits transactions (a wallet session or a user operation).
//! Reads go through the [`StablecoinReader`] trait; [`RpcBridgeReader`] is
//! the JSON-RPC-backed implementation.

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_provider::RootProvider;
use alloy_sol_types::{SolCall, sol};
use async_trait::async_trait;
use std::collections::HashMap;
use url::Url;

use crate::network::{ChainRegistry, Network};
use crate::types::{FinalityThreshold, UsdcAmount};

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    interface ITokenMessengerV2 {
        function depositForBurn(
            uint256 amount,
            uint32 destinationDomain,
            bytes32 mintRecipient,
            address burnToken,
            bytes32 destinationCaller,
            uint256 maxFee,
            uint32 minFinalityThreshold
        ) external returns (uint64 nonce);

        function depositForBurnWithHook(
            uint256 amount,
            uint32 destinationDomain,
            bytes32 mintRecipient,
            address burnToken,
            bytes32 destinationCaller,
            uint256 maxFee,
            uint32 minFinalityThreshold,
            bytes hookData
        ) external returns (uint64 nonce);
    }

    interface IMessageTransmitterV2 {
        function receiveMessage(bytes message, bytes attestation) external returns (bool success);
    }
}

/// Encode an address into the 32-byte left-padded form CCTP uses for
/// recipients and callers.
pub fn address_to_bytes32(address: Address) -> B256 {
    B256::left_padding_from(address.as_slice())
}

/// Calldata for `IERC20::approve(spender, amount)`.
pub fn approve_calldata(spender: Address, amount: UsdcAmount) -> Bytes {
    IERC20::approveCall {
        spender,
        amount: amount.into(),
    }
    .abi_encode()
    .into()
}

/// Calldata for `IERC20::transfer(to, amount)`.
pub fn transfer_calldata(to: Address, amount: UsdcAmount) -> Bytes {
    IERC20::transferCall {
        to,
        amount: amount.into(),
    }
    .abi_encode()
    .into()
}

/// Parameters of a burn deposit.
///
/// `destination_domain` is the CCTP domain of the destination chain, looked
/// up from its registry entry. It is never a chain ID.
#[derive(Debug, Clone)]
pub struct DepositForBurn {
    pub amount: UsdcAmount,
    pub destination_domain: u32,
    pub mint_recipient: Address,
    pub burn_token: Address,
    pub max_fee: UsdcAmount,
    pub finality: FinalityThreshold,
    /// Optional post-mint hook executed on the destination chain.
    pub hook_data: Option<Bytes>,
}

/// Calldata for `ITokenMessengerV2::depositForBurn` (or the hook variant when
/// a hook payload is present).
///
/// The destination caller is always the zero sentinel: anyone may finalize
/// the mint, which is what lets the off-chain relayer complete a deferred
/// transfer.
pub fn deposit_for_burn_calldata(params: &DepositForBurn) -> Bytes {
    let mint_recipient = address_to_bytes32(params.mint_recipient);
    let destination_caller = B256::ZERO;
    match &params.hook_data {
        Some(hook_data) => ITokenMessengerV2::depositForBurnWithHookCall {
            amount: params.amount.into(),
            destinationDomain: params.destination_domain,
            mintRecipient: mint_recipient,
            burnToken: params.burn_token,
            destinationCaller: destination_caller,
            maxFee: params.max_fee.into(),
            minFinalityThreshold: params.finality.as_u32(),
            hookData: hook_data.clone(),
        }
        .abi_encode()
        .into(),
        None => ITokenMessengerV2::depositForBurnCall {
            amount: params.amount.into(),
            destinationDomain: params.destination_domain,
            mintRecipient: mint_recipient,
            burnToken: params.burn_token,
            destinationCaller: destination_caller,
            maxFee: params.max_fee.into(),
            minFinalityThreshold: params.finality.as_u32(),
        }
        .abi_encode()
        .into(),
    }
}

/// Calldata for `IMessageTransmitterV2::receiveMessage(message, attestation)`.
pub fn receive_message_calldata(message: Bytes, attestation: Bytes) -> Bytes {
    IMessageTransmitterV2::receiveMessageCall {
        message,
        attestation,
    }
    .abi_encode()
    .into()
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("no RPC endpoint configured for {0}")]
    NotConfigured(Network),
    #[error("contract call failed")]
    ContractCall(#[from] alloy_contract::Error),
}

/// Read-side view of the stablecoin on each chain.
#[async_trait]
pub trait StablecoinReader: Send + Sync {
    /// USDC balance of `owner` on `network`.
    async fn balance_of(&self, network: Network, owner: Address)
    -> Result<UsdcAmount, BridgeError>;

    /// USDC allowance granted by `owner` to `spender` on `network`.
    async fn allowance(
        &self,
        network: Network,
        owner: Address,
        spender: Address,
    ) -> Result<UsdcAmount, BridgeError>;
}

/// JSON-RPC-backed [`StablecoinReader`] over a set of per-network endpoints.
pub struct RpcBridgeReader {
    providers: HashMap<Network, RootProvider>,
}

impl RpcBridgeReader {
    /// Connect one HTTP provider per configured network. Networks without an
    /// endpoint simply fail reads with [`BridgeError::NotConfigured`].
    pub fn new(endpoints: impl IntoIterator<Item = (Network, Url)>) -> Self {
        let mut providers = HashMap::new();
        for (network, url) in endpoints {
            tracing::info!(chain = %network, rpc_url = %url, "using HTTP transport");
            providers.insert(network, RootProvider::new_http(url));
        }
        Self { providers }
    }

    fn provider(&self, network: Network) -> Result<&RootProvider, BridgeError> {
        self.providers
            .get(&network)
            .ok_or(BridgeError::NotConfigured(network))
    }
}

// Balances beyond 64 bits of base units cannot occur for a 6-decimal token
// with a bounded supply; saturate rather than fail the read.
fn to_usdc_amount(value: U256) -> UsdcAmount {
    UsdcAmount::from_units(u64::try_from(value).unwrap_or(u64::MAX))
}

#[async_trait]
impl StablecoinReader for RpcBridgeReader {
    async fn balance_of(
        &self,
        network: Network,
        owner: Address,
    ) -> Result<UsdcAmount, BridgeError> {
        let config = ChainRegistry::config(network);
        let erc20 = IERC20::new(config.usdc, self.provider(network)?);
        let balance = erc20.balanceOf(owner).call().await?;
        Ok(to_usdc_amount(balance))
    }

    async fn allowance(
        &self,
        network: Network,
        owner: Address,
        spender: Address,
    ) -> Result<UsdcAmount, BridgeError> {
        let config = ChainRegistry::config(network);
        let erc20 = IERC20::new(config.usdc, self.provider(network)?);
        let allowance = erc20.allowance(owner, spender).call().await?;
        Ok(to_usdc_amount(allowance))
    }
}
