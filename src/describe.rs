//! Human-readable previews of payment calls for pre-signature display.
//!
//! The supported call shapes are a closed set: decoding yields a [`CallKind`]
//! with strongly-typed arguments, and anything else is [`CallKind::Unknown`],
//! never a guessed default. Rendering a preview is pure: fixed-point amounts
//! scale by the token's decimals, bridge domains resolve to chain names via
//! the registry's reverse table, long addresses truncate for display, and
//! each kind carries a fixed set of advisory risk notes. No network access.

use alloy_primitives::{Address, B256, Selector};
use alloy_sol_types::SolCall;

use crate::bridge::{IERC20, IMessageTransmitterV2, ITokenMessengerV2};
use crate::network::{ChainRegistry, Network};
use crate::types::UsdcAmount;

/// The call shapes the engine knows how to present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    Approve {
        spender: Address,
        amount: UsdcAmount,
    },
    DepositForBurn {
        amount: UsdcAmount,
        destination_domain: u32,
        mint_recipient: B256,
        max_fee: UsdcAmount,
    },
    ReceiveMessage,
    Transfer {
        to: Address,
        amount: UsdcAmount,
    },
    Unknown {
        selector: Selector,
    },
}

impl CallKind {
    /// Classify raw calldata. Unknown selectors map to
    /// [`CallKind::Unknown`], never to a best-effort guess.
    pub fn from_calldata(data: &[u8]) -> CallKind {
        if data.len() < 4 {
            return CallKind::Unknown {
                selector: Selector::ZERO,
            };
        }
        if let Ok(call) = IERC20::approveCall::abi_decode(data) {
            return CallKind::Approve {
                spender: call.spender,
                amount: truncated_amount(call.amount),
            };
        }
        if let Ok(call) = IERC20::transferCall::abi_decode(data) {
            return CallKind::Transfer {
                to: call.to,
                amount: truncated_amount(call.amount),
            };
        }
        if let Ok(call) = ITokenMessengerV2::depositForBurnCall::abi_decode(data) {
            return CallKind::DepositForBurn {
                amount: truncated_amount(call.amount),
                destination_domain: call.destinationDomain,
                mint_recipient: call.mintRecipient,
                max_fee: truncated_amount(call.maxFee),
            };
        }
        if let Ok(call) = ITokenMessengerV2::depositForBurnWithHookCall::abi_decode(data) {
            return CallKind::DepositForBurn {
                amount: truncated_amount(call.amount),
                destination_domain: call.destinationDomain,
                mint_recipient: call.mintRecipient,
                max_fee: truncated_amount(call.maxFee),
            };
        }
        if IMessageTransmitterV2::receiveMessageCall::abi_decode(data).is_ok() {
            return CallKind::ReceiveMessage;
        }
        CallKind::Unknown {
            selector: Selector::from_slice(&data[..4]),
        }
    }
}

fn truncated_amount(value: alloy_primitives::U256) -> UsdcAmount {
    UsdcAmount::from_units(u64::try_from(value).unwrap_or(u64::MAX))
}

/// Semantic type of a preview field, for display formatting downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Amount,
    Address,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewField {
    pub label: &'static str,
    pub value: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskSeverity {
    Info,
    Caution,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskNote {
    pub severity: RiskSeverity,
    pub text: &'static str,
}

/// A derived, immutable preview; discarded after display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearSigningPreview {
    pub title: String,
    pub description: String,
    pub fields: Vec<PreviewField>,
    pub risks: Vec<RiskNote>,
}

fn truncate_address(address: Address) -> String {
    let s = address.to_string();
    format!("{}...{}", &s[..6], &s[s.len() - 4..])
}

fn chain_name_by_domain(domain: u32, testnet: bool) -> String {
    match ChainRegistry::by_bridge_domain(domain, testnet) {
        Some(network) => ChainRegistry::config(network).display_name.to_string(),
        None => format!("domain {domain}"),
    }
}

/// Render the preview for a call executed on `network`.
pub fn describe(kind: &CallKind, network: Network) -> ClearSigningPreview {
    let config = ChainRegistry::config(network);
    match kind {
        CallKind::Approve { spender, amount } => ClearSigningPreview {
            title: "USDC allowance".into(),
            description: format!(
                "Authorize spending of {amount} USDC on {}",
                config.display_name
            ),
            fields: vec![
                PreviewField {
                    label: "Authorized amount",
                    value: format!("{amount} USDC"),
                    kind: FieldKind::Amount,
                },
                PreviewField {
                    label: "Authorized contract",
                    value: truncate_address(*spender),
                    kind: FieldKind::Address,
                },
                PreviewField {
                    label: "Chain",
                    value: config.display_name.into(),
                    kind: FieldKind::Text,
                },
            ],
            risks: vec![
                RiskNote {
                    severity: RiskSeverity::Caution,
                    text: "The authorized contract can spend your USDC up to this amount",
                },
                RiskNote {
                    severity: RiskSeverity::Info,
                    text: "This allowance is required before the bridge can burn your USDC",
                },
            ],
        },
        CallKind::DepositForBurn {
            amount,
            destination_domain,
            mint_recipient,
            max_fee,
        } => {
            let recipient = Address::from_slice(&mint_recipient[12..]);
            let destination = chain_name_by_domain(*destination_domain, config.testnet);
            ClearSigningPreview {
                title: "Cross-chain USDC transfer".into(),
                description: format!(
                    "Send {amount} USDC from {} to {destination}",
                    config.display_name
                ),
                fields: vec![
                    PreviewField {
                        label: "Amount",
                        value: format!("{amount} USDC"),
                        kind: FieldKind::Amount,
                    },
                    PreviewField {
                        label: "From",
                        value: config.display_name.into(),
                        kind: FieldKind::Text,
                    },
                    PreviewField {
                        label: "To",
                        value: destination,
                        kind: FieldKind::Text,
                    },
                    PreviewField {
                        label: "Recipient",
                        value: truncate_address(recipient),
                        kind: FieldKind::Address,
                    },
                    PreviewField {
                        label: "Maximum fee",
                        value: format!("{max_fee} USDC"),
                        kind: FieldKind::Amount,
                    },
                ],
                risks: vec![
                    RiskNote {
                        severity: RiskSeverity::Info,
                        text: "Cross-chain transfers can take several minutes to finalize",
                    },
                    RiskNote {
                        severity: RiskSeverity::Caution,
                        text: "Verify the recipient address; burns cannot be reversed",
                    },
                    RiskNote {
                        severity: RiskSeverity::Info,
                        text: "The bridge may deduct a fee up to the shown maximum",
                    },
                ],
            }
        }
        CallKind::ReceiveMessage => ClearSigningPreview {
            title: "Finalize cross-chain transfer".into(),
            description: format!("Complete the USDC mint on {}", config.display_name),
            fields: vec![
                PreviewField {
                    label: "Action",
                    value: "Finalize the transfer".into(),
                    kind: FieldKind::Text,
                },
                PreviewField {
                    label: "Chain",
                    value: config.display_name.into(),
                    kind: FieldKind::Text,
                },
            ],
            risks: vec![RiskNote {
                severity: RiskSeverity::Info,
                text: "This credits USDC already burned on the source chain",
            }],
        },
        CallKind::Transfer { to, amount } => ClearSigningPreview {
            title: "USDC transfer".into(),
            description: format!("Send {amount} USDC on {}", config.display_name),
            fields: vec![
                PreviewField {
                    label: "Amount",
                    value: format!("{amount} USDC"),
                    kind: FieldKind::Amount,
                },
                PreviewField {
                    label: "Recipient",
                    value: truncate_address(*to),
                    kind: FieldKind::Address,
                },
            ],
            risks: vec![RiskNote {
                severity: RiskSeverity::Caution,
                text: "Verify the recipient address; transfers cannot be reversed",
            }],
        },
        CallKind::Unknown { selector } => ClearSigningPreview {
            title: "Unrecognized transaction".into(),
            description: "This call is not recognized by the payment engine".into(),
            fields: vec![PreviewField {
                label: "Selector",
                value: selector.to_string(),
                kind: FieldKind::Text,
            }],
            risks: vec![RiskNote {
                severity: RiskSeverity::Caution,
                text: "Do not sign unless you trust the source of this transaction",
            }],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{
        DepositForBurn, address_to_bytes32, approve_calldata, deposit_for_burn_calldata,
        receive_message_calldata, transfer_calldata,
    };
    use crate::types::FinalityThreshold;
    use alloy_primitives::{Bytes, address};

    const SPENDER: Address = address!("0x28b5a0e9C621a5BadaA536219b3a228C8168cf5d");
    const RECIPIENT: Address = address!("0x00000000000000000000000000000000000000e1");

    #[test]
    fn classifies_each_supported_call() {
        let approve = approve_calldata(SPENDER, UsdcAmount::parse("10.01").unwrap());
        assert!(matches!(
            CallKind::from_calldata(&approve),
            CallKind::Approve { spender, .. } if spender == SPENDER
        ));

        let transfer = transfer_calldata(RECIPIENT, UsdcAmount::parse("5").unwrap());
        assert!(matches!(
            CallKind::from_calldata(&transfer),
            CallKind::Transfer { to, .. } if to == RECIPIENT
        ));

        let burn = deposit_for_burn_calldata(&DepositForBurn {
            amount: UsdcAmount::parse("10").unwrap(),
            destination_domain: 3,
            mint_recipient: RECIPIENT,
            burn_token: SPENDER,
            max_fee: UsdcAmount::parse("0.01").unwrap(),
            finality: FinalityThreshold::Fast,
            hook_data: None,
        });
        assert!(matches!(
            CallKind::from_calldata(&burn),
            CallKind::DepositForBurn {
                destination_domain: 3,
                ..
            }
        ));

        let receive = receive_message_calldata(Bytes::from(vec![1]), Bytes::from(vec![2]));
        assert_eq!(CallKind::from_calldata(&receive), CallKind::ReceiveMessage);
    }

    #[test]
    fn unknown_selectors_stay_unknown() {
        let kind = CallKind::from_calldata(&[0xde, 0xad, 0xbe, 0xef, 0x00]);
        assert!(matches!(kind, CallKind::Unknown { .. }));
        let preview = describe(&kind, Network::Base);
        assert_eq!(preview.title, "Unrecognized transaction");
        assert_eq!(preview.risks[0].severity, RiskSeverity::Caution);
    }

    #[test]
    fn empty_calldata_is_unknown() {
        assert!(matches!(
            CallKind::from_calldata(&[]),
            CallKind::Unknown { .. }
        ));
    }

    #[test]
    fn burn_preview_resolves_the_domain_to_a_chain_name() {
        let kind = CallKind::DepositForBurn {
            amount: UsdcAmount::parse("10").unwrap(),
            destination_domain: 3,
            mint_recipient: address_to_bytes32(RECIPIENT),
            max_fee: UsdcAmount::parse("0.01").unwrap(),
        };
        let preview = describe(&kind, Network::Base);
        assert_eq!(preview.description, "Send 10 USDC from Base to Arbitrum One");
        let to = preview.fields.iter().find(|f| f.label == "To").unwrap();
        assert_eq!(to.value, "Arbitrum One");
        // Same domain resolves within the testnet environment instead.
        let testnet = describe(&kind, Network::Sepolia);
        let to = testnet.fields.iter().find(|f| f.label == "To").unwrap();
        assert_eq!(to.value, "Arbitrum Sepolia");
    }

    #[test]
    fn unknown_domain_is_spelled_out_not_guessed() {
        let kind = CallKind::DepositForBurn {
            amount: UsdcAmount::parse("1").unwrap(),
            destination_domain: 42,
            mint_recipient: address_to_bytes32(RECIPIENT),
            max_fee: UsdcAmount::ZERO,
        };
        let preview = describe(&kind, Network::Base);
        let to = preview.fields.iter().find(|f| f.label == "To").unwrap();
        assert_eq!(to.value, "domain 42");
    }

    #[test]
    fn amounts_scale_by_token_decimals() {
        let kind = CallKind::Transfer {
            to: RECIPIENT,
            amount: UsdcAmount::from_units(12_340_000),
        };
        let preview = describe(&kind, Network::Arbitrum);
        let amount = preview.fields.iter().find(|f| f.label == "Amount").unwrap();
        assert_eq!(amount.value, "12.34 USDC");
        assert_eq!(amount.kind, FieldKind::Amount);
    }

    #[test]
    fn addresses_are_truncated_for_display() {
        let kind = CallKind::Approve {
            spender: SPENDER,
            amount: UsdcAmount::parse("1").unwrap(),
        };
        let preview = describe(&kind, Network::Base);
        let contract = preview
            .fields
            .iter()
            .find(|f| f.label == "Authorized contract")
            .unwrap();
        assert_eq!(contract.value, "0x28b5...cf5d");
        assert_eq!(contract.kind, FieldKind::Address);
    }
}
