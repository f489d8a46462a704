//! Network definitions and the static chain registry.
//!
//! This module defines the supported networks, their chain IDs, and the
//! per-chain deployment data the payment engine needs: the CCTP v2 contract
//! addresses, the USDC deployment, and display metadata (explorer URL, native
//! currency symbol).
//!
//! Bridge **domain** identifiers live in their own namespace, distinct from
//! chain IDs: Base is chain `8453` but domain `6`. The registry is the only
//! place a domain is ever resolved from, so the two namespaces cannot be
//! confused elsewhere in the crate.

use alloy_primitives::{Address, B256, address};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Supported EVM networks.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    /// Ethereum mainnet (chain ID 1).
    #[serde(rename = "ethereum")]
    Ethereum,
    /// Avalanche C-Chain (chain ID 43114).
    #[serde(rename = "avalanche")]
    Avalanche,
    /// Optimism mainnet (chain ID 10).
    #[serde(rename = "optimism")]
    Optimism,
    /// Arbitrum One (chain ID 42161).
    #[serde(rename = "arbitrum")]
    Arbitrum,
    /// Base mainnet (chain ID 8453).
    #[serde(rename = "base")]
    Base,
    /// Polygon PoS (chain ID 137).
    #[serde(rename = "polygon")]
    Polygon,
    /// Linea mainnet (chain ID 59144).
    #[serde(rename = "linea")]
    Linea,
    /// Ethereum Sepolia testnet (chain ID 11155111).
    #[serde(rename = "sepolia")]
    Sepolia,
    /// Avalanche Fuji testnet (chain ID 43113).
    #[serde(rename = "avalanche-fuji")]
    AvalancheFuji,
    /// Base Sepolia testnet (chain ID 84532).
    #[serde(rename = "base-sepolia")]
    BaseSepolia,
    /// Arbitrum Sepolia testnet (chain ID 421614).
    #[serde(rename = "arbitrum-sepolia")]
    ArbitrumSepolia,
    /// Linea Sepolia testnet (chain ID 59141).
    #[serde(rename = "linea-sepolia")]
    LineaSepolia,
    /// Optimism Sepolia testnet (chain ID 11155420). Gasless-capable, no bridge deployment.
    #[serde(rename = "optimism-sepolia")]
    OptimismSepolia,
    /// Polygon Amoy testnet (chain ID 80002). Gasless-capable, no bridge deployment.
    #[serde(rename = "polygon-amoy")]
    PolygonAmoy,
}

impl Network {
    /// Return all known [`Network`] variants.
    pub fn variants() -> &'static [Network] {
        &[
            Network::Ethereum,
            Network::Avalanche,
            Network::Optimism,
            Network::Arbitrum,
            Network::Base,
            Network::Polygon,
            Network::Linea,
            Network::Sepolia,
            Network::AvalancheFuji,
            Network::BaseSepolia,
            Network::ArbitrumSepolia,
            Network::LineaSepolia,
            Network::OptimismSepolia,
            Network::PolygonAmoy,
        ]
    }

    /// The numeric EIP-155 chain ID.
    pub fn chain_id(&self) -> u64 {
        ChainRegistry::config(*self).chain_id
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Network::Ethereum => "ethereum",
            Network::Avalanche => "avalanche",
            Network::Optimism => "optimism",
            Network::Arbitrum => "arbitrum",
            Network::Base => "base",
            Network::Polygon => "polygon",
            Network::Linea => "linea",
            Network::Sepolia => "sepolia",
            Network::AvalancheFuji => "avalanche-fuji",
            Network::BaseSepolia => "base-sepolia",
            Network::ArbitrumSepolia => "arbitrum-sepolia",
            Network::LineaSepolia => "linea-sepolia",
            Network::OptimismSepolia => "optimism-sepolia",
            Network::PolygonAmoy => "polygon-amoy",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown network: {0}")]
pub struct NetworkParseError(String);

impl FromStr for Network {
    type Err = NetworkParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::variants()
            .iter()
            .copied()
            .find(|n| n.to_string() == s)
            .ok_or_else(|| NetworkParseError(s.to_string()))
    }
}

/// CCTP v2 deployment on a single chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeDeployment {
    /// CCTP domain identifier. A protocol-level namespace distinct from the chain ID.
    pub domain: u32,
    /// `TokenMessengerV2` entrypoint (burn side).
    pub token_messenger: Address,
    /// `MessageTransmitterV2` entrypoint (mint side).
    pub message_transmitter: Address,
    /// Whether the fast finality path is available with this chain as destination.
    pub fast_transfer: bool,
}

/// Immutable per-chain configuration. Created once from the static table below,
/// never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainConfig {
    pub network: Network,
    pub chain_id: u64,
    pub display_name: &'static str,
    pub native_symbol: &'static str,
    /// Block explorer base URL, without a trailing slash.
    pub explorer_url: &'static str,
    /// USDC deployment on this chain.
    pub usdc: Address,
    pub testnet: bool,
    /// CCTP v2 deployment, absent on gasless-only chains.
    pub bridge: Option<BridgeDeployment>,
}

// CCTP v2 entrypoints are deployed at the same address on every mainnet, and
// at a different shared address on every testnet.
const MAINNET_TOKEN_MESSENGER: Address = address!("0x28b5a0e9C621a5BadaA536219b3a228C8168cf5d");
const MAINNET_MESSAGE_TRANSMITTER: Address = address!("0x81D40F21F12A8F0E3252Bccb954D722d4c464B64");
const TESTNET_TOKEN_MESSENGER: Address = address!("0x8FE6B999Dc680CcFDD5Bf7EB0974218be2542DAA");
const TESTNET_MESSAGE_TRANSMITTER: Address = address!("0xE737e5cEBEEBa77EFE34D4aa090756590b1CE275");

const fn mainnet_bridge(domain: u32, fast_transfer: bool) -> Option<BridgeDeployment> {
    Some(BridgeDeployment {
        domain,
        token_messenger: MAINNET_TOKEN_MESSENGER,
        message_transmitter: MAINNET_MESSAGE_TRANSMITTER,
        fast_transfer,
    })
}

const fn testnet_bridge(domain: u32, fast_transfer: bool) -> Option<BridgeDeployment> {
    Some(BridgeDeployment {
        domain,
        token_messenger: TESTNET_TOKEN_MESSENGER,
        message_transmitter: TESTNET_MESSAGE_TRANSMITTER,
        fast_transfer,
    })
}

static CHAINS: &[ChainConfig] = &[
    ChainConfig {
        network: Network::Ethereum,
        chain_id: 1,
        display_name: "Ethereum",
        native_symbol: "ETH",
        explorer_url: "https://etherscan.io",
        usdc: address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
        testnet: false,
        bridge: mainnet_bridge(0, true),
    },
    ChainConfig {
        network: Network::Avalanche,
        chain_id: 43114,
        display_name: "Avalanche",
        native_symbol: "AVAX",
        explorer_url: "https://snowtrace.io",
        usdc: address!("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
        testnet: false,
        bridge: mainnet_bridge(1, false),
    },
    ChainConfig {
        network: Network::Optimism,
        chain_id: 10,
        display_name: "Optimism",
        native_symbol: "ETH",
        explorer_url: "https://optimistic.etherscan.io",
        usdc: address!("0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85"),
        testnet: false,
        bridge: mainnet_bridge(2, false),
    },
    ChainConfig {
        network: Network::Arbitrum,
        chain_id: 42161,
        display_name: "Arbitrum One",
        native_symbol: "ETH",
        explorer_url: "https://arbiscan.io",
        usdc: address!("0xaf88d065e77c8cC2239327C5EDb3A432268e5831"),
        testnet: false,
        bridge: mainnet_bridge(3, true),
    },
    ChainConfig {
        network: Network::Base,
        chain_id: 8453,
        display_name: "Base",
        native_symbol: "ETH",
        explorer_url: "https://basescan.org",
        usdc: address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
        testnet: false,
        bridge: mainnet_bridge(6, true),
    },
    ChainConfig {
        network: Network::Polygon,
        chain_id: 137,
        display_name: "Polygon",
        native_symbol: "POL",
        explorer_url: "https://polygonscan.com",
        usdc: address!("0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359"),
        testnet: false,
        bridge: mainnet_bridge(7, false),
    },
    ChainConfig {
        network: Network::Linea,
        chain_id: 59144,
        display_name: "Linea",
        native_symbol: "ETH",
        explorer_url: "https://lineascan.build",
        usdc: address!("0x176211869cA2b568f2A7D4EE941E073a821EE1ff"),
        testnet: false,
        bridge: mainnet_bridge(11, true),
    },
    ChainConfig {
        network: Network::Sepolia,
        chain_id: 11155111,
        display_name: "Ethereum Sepolia",
        native_symbol: "ETH",
        explorer_url: "https://sepolia.etherscan.io",
        usdc: address!("0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"),
        testnet: true,
        bridge: testnet_bridge(0, true),
    },
    ChainConfig {
        network: Network::AvalancheFuji,
        chain_id: 43113,
        display_name: "Avalanche Fuji",
        native_symbol: "AVAX",
        explorer_url: "https://testnet.snowtrace.io",
        usdc: address!("0x5425890298aed601595a70AB815c96711a31Bc65"),
        testnet: true,
        bridge: testnet_bridge(1, false),
    },
    ChainConfig {
        network: Network::BaseSepolia,
        chain_id: 84532,
        display_name: "Base Sepolia",
        native_symbol: "ETH",
        explorer_url: "https://sepolia.basescan.org",
        usdc: address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
        testnet: true,
        bridge: testnet_bridge(6, true),
    },
    ChainConfig {
        network: Network::ArbitrumSepolia,
        chain_id: 421614,
        display_name: "Arbitrum Sepolia",
        native_symbol: "ETH",
        explorer_url: "https://sepolia.arbiscan.io",
        usdc: address!("0x75faf114eafb1BDbe2F0316DF893fd58CE46AA4d"),
        testnet: true,
        bridge: testnet_bridge(3, true),
    },
    ChainConfig {
        network: Network::LineaSepolia,
        chain_id: 59141,
        display_name: "Linea Sepolia",
        native_symbol: "ETH",
        explorer_url: "https://sepolia.lineascan.build",
        usdc: address!("0xFEce4462D57bD51A6A552365A011b95f0E16d9B7"),
        testnet: true,
        bridge: testnet_bridge(9, true),
    },
    ChainConfig {
        network: Network::OptimismSepolia,
        chain_id: 11155420,
        display_name: "Optimism Sepolia",
        native_symbol: "ETH",
        explorer_url: "https://sepolia-optimism.etherscan.io",
        usdc: address!("0x5fd84259d66Cd46123540766Be93DFE6D43130D7"),
        testnet: true,
        bridge: None,
    },
    ChainConfig {
        network: Network::PolygonAmoy,
        chain_id: 80002,
        display_name: "Polygon Amoy",
        native_symbol: "POL",
        explorer_url: "https://amoy.polygonscan.com",
        usdc: address!("0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582"),
        testnet: true,
        bridge: None,
    },
];

/// The chain is registered but carries no CCTP deployment.
#[derive(Debug, thiserror::Error)]
#[error("no bridge deployment on {0}")]
pub struct NoBridgeDeployment(pub Network);

/// Static lookup over the chain table. Pure reads, no state.
pub struct ChainRegistry;

impl ChainRegistry {
    /// Configuration for a registered network. Every [`Network`] variant has a row.
    pub fn config(network: Network) -> &'static ChainConfig {
        CHAINS
            .iter()
            .find(|c| c.network == network)
            .expect("every Network variant has a chain table row")
    }

    /// Resolve a numeric chain ID back to a [`Network`].
    pub fn by_chain_id(chain_id: u64) -> Option<Network> {
        CHAINS
            .iter()
            .find(|c| c.chain_id == chain_id)
            .map(|c| c.network)
    }

    /// The CCTP deployment for a network, or [`NoBridgeDeployment`] for
    /// gasless-only chains.
    pub fn bridge(network: Network) -> Result<&'static BridgeDeployment, NoBridgeDeployment> {
        Self::config(network)
            .bridge
            .as_ref()
            .ok_or(NoBridgeDeployment(network))
    }

    /// Reverse lookup: the network a CCTP domain refers to, within one
    /// environment. Domains are reused between mainnet and testnet, so the
    /// environment must be part of the key.
    pub fn by_bridge_domain(domain: u32, testnet: bool) -> Option<Network> {
        CHAINS
            .iter()
            .filter(|c| c.testnet == testnet)
            .find(|c| c.bridge.as_ref().is_some_and(|b| b.domain == domain))
            .map(|c| c.network)
    }

    /// All networks carrying a CCTP deployment.
    pub fn bridge_networks() -> impl Iterator<Item = Network> {
        CHAINS.iter().filter(|c| c.bridge.is_some()).map(|c| c.network)
    }

    /// Explorer link for a transaction hash on the given network.
    pub fn tx_url(network: Network, tx_hash: B256) -> String {
        format!("{}/tx/{}", Self::config(network).explorer_url, tx_hash)
    }
}
