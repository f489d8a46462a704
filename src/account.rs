//! Smart-account derivation and state.
//!
//! A smart account's address is a pure function of (factory, owner, salt),
//! known before the account is deployed or funded. Derivation asks the
//! factory contract itself (`getAddress`) instead of reimplementing the
//! CREATE2 hash locally, so the answer agrees bit-for-bit with what
//! deployment will produce. An account is deployed iff its address holds
//! non-empty code.

use alloy_primitives::aliases::U192;
use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_sol_types::{SolCall, sol};
use async_trait::async_trait;
use url::Url;

use crate::bridge::IERC20;

sol! {
    #[sol(rpc)]
    interface ISimpleAccountFactory {
        function createAccount(address owner, uint256 salt) external returns (address ret);
        function getAddress(address owner, uint256 salt) external view returns (address);
    }

    interface ISimpleAccount {
        function execute(address dest, uint256 value, bytes func) external;
    }

    #[sol(rpc)]
    interface IEntryPoint {
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
    }
}

/// Calldata for `ISimpleAccountFactory::createAccount(owner, salt)`.
pub fn create_account_calldata(owner: Address, salt: U256) -> Bytes {
    ISimpleAccountFactory::createAccountCall { owner, salt }
        .abi_encode()
        .into()
}

/// The init code of an undeployed account: factory address followed by the
/// `createAccount` calldata.
pub fn init_code(factory: Address, owner: Address, salt: U256) -> Bytes {
    let calldata = create_account_calldata(owner, salt);
    let mut bytes = Vec::with_capacity(20 + calldata.len());
    bytes.extend_from_slice(factory.as_slice());
    bytes.extend_from_slice(&calldata);
    bytes.into()
}

/// Calldata for `ISimpleAccount::execute(dest, value, func)`, the single-call
/// entry every user operation routes through.
pub fn execute_calldata(dest: Address, value: U256, func: Bytes) -> Bytes {
    ISimpleAccount::executeCall { dest, value, func }
        .abi_encode()
        .into()
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("contract call failed")]
    Contract(#[from] alloy_contract::Error),
    #[error("transport error")]
    Transport(#[from] alloy_transport::TransportError),
}

/// Current EIP-1559 fee parameters for the account's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Chain reads the gasless flow needs, all on a single chain.
#[async_trait]
pub trait AccountReader: Send + Sync {
    /// Ask the factory for the deterministic address of (owner, salt).
    async fn counterfactual_address(
        &self,
        factory: Address,
        owner: Address,
        salt: U256,
    ) -> Result<Address, AccountError>;

    /// Bytecode at `address` (empty for undeployed accounts).
    async fn code_at(&self, address: Address) -> Result<Bytes, AccountError>;

    /// The entry point's nonce for `sender`. Zero for accounts the entry
    /// point has never seen, including undeployed ones.
    async fn entry_point_nonce(
        &self,
        entry_point: Address,
        sender: Address,
    ) -> Result<U256, AccountError>;

    async fn native_balance(&self, address: Address) -> Result<U256, AccountError>;

    async fn erc20_balance(&self, token: Address, owner: Address) -> Result<U256, AccountError>;

    async fn erc20_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AccountError>;

    async fn fee_estimate(&self) -> Result<FeeEstimate, AccountError>;
}

/// JSON-RPC-backed [`AccountReader`].
pub struct RpcAccountReader {
    provider: RootProvider,
}

impl RpcAccountReader {
    pub fn new(rpc_url: Url) -> Self {
        Self {
            provider: RootProvider::new_http(rpc_url),
        }
    }
}

#[async_trait]
impl AccountReader for RpcAccountReader {
    async fn counterfactual_address(
        &self,
        factory: Address,
        owner: Address,
        salt: U256,
    ) -> Result<Address, AccountError> {
        let factory = ISimpleAccountFactory::new(factory, &self.provider);
        Ok(factory.getAddress(owner, salt).call().await?)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, AccountError> {
        Ok(self.provider.get_code_at(address).await?)
    }

    async fn entry_point_nonce(
        &self,
        entry_point: Address,
        sender: Address,
    ) -> Result<U256, AccountError> {
        let entry_point = IEntryPoint::new(entry_point, &self.provider);
        Ok(entry_point.getNonce(sender, U192::ZERO).call().await?)
    }

    async fn native_balance(&self, address: Address) -> Result<U256, AccountError> {
        Ok(self.provider.get_balance(address).await?)
    }

    async fn erc20_balance(&self, token: Address, owner: Address) -> Result<U256, AccountError> {
        let erc20 = IERC20::new(token, &self.provider);
        Ok(erc20.balanceOf(owner).call().await?)
    }

    async fn erc20_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AccountError> {
        let erc20 = IERC20::new(token, &self.provider);
        Ok(erc20.allowance(owner, spender).call().await?)
    }

    async fn fee_estimate(&self) -> Result<FeeEstimate, AccountError> {
        let estimate = self.provider.estimate_eip1559_fees().await?;
        Ok(FeeEstimate {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        })
    }
}

/// A derived smart account: the address plus cached deployment state.
///
/// The caches exist to avoid redundant reads inside one operation; both are
/// invalidated after any submitted operation, and the nonce is re-fetched
/// fresh per operation regardless (externally submitted operations can
/// advance it at any time).
#[derive(Debug, Clone)]
pub struct SmartAccountHandle {
    pub address: Address,
    pub owner: Address,
    pub salt: U256,
    deployed: bool,
    nonce: Option<U256>,
}

impl SmartAccountHandle {
    pub fn is_deployed(&self) -> bool {
        self.deployed
    }

    pub fn cached_nonce(&self) -> Option<U256> {
        self.nonce
    }

    /// Drop both caches. Called after every submitted operation.
    pub fn invalidate(&mut self) {
        self.nonce = None;
    }
}

/// Derives smart accounts and refreshes their on-chain state.
pub struct SmartAccountDeriver<R> {
    factory: Address,
    entry_point: Address,
    reader: R,
}

impl<R: AccountReader> SmartAccountDeriver<R> {
    pub fn new(factory: Address, entry_point: Address, reader: R) -> Self {
        Self {
            factory,
            entry_point,
            reader,
        }
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Derive the handle for (owner, salt) and read its deployment state.
    pub async fn derive(
        &self,
        owner: Address,
        salt: U256,
    ) -> Result<SmartAccountHandle, AccountError> {
        let address = self
            .reader
            .counterfactual_address(self.factory, owner, salt)
            .await?;
        let deployed = self.is_deployed(address).await?;
        tracing::info!(account = %address, %owner, deployed, "derived smart account");
        Ok(SmartAccountHandle {
            address,
            owner,
            salt,
            deployed,
            nonce: None,
        })
    }

    /// Whether `address` currently holds code.
    pub async fn is_deployed(&self, address: Address) -> Result<bool, AccountError> {
        let code = self.reader.code_at(address).await?;
        Ok(!code.is_empty())
    }

    /// Re-read deployment state and nonce into the handle.
    pub async fn refresh(&self, handle: &mut SmartAccountHandle) -> Result<(), AccountError> {
        handle.deployed = self.is_deployed(handle.address).await?;
        let nonce = self
            .reader
            .entry_point_nonce(self.entry_point, handle.address)
            .await?;
        handle.nonce = Some(nonce);
        Ok(())
    }

    /// Init code for the handle's account: empty once deployed.
    pub fn init_code(&self, handle: &SmartAccountHandle) -> Bytes {
        if handle.deployed {
            Bytes::new()
        } else {
            init_code(self.factory, handle.owner, handle.salt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, keccak256};

    const FACTORY: Address = address!("0x9406Cc6185a346906296840746125a0E44976454");
    const ENTRY_POINT: Address = address!("0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");
    const OWNER: Address = address!("0x00000000000000000000000000000000000000aa");

    /// Mock factory: address = truncated keccak of (factory, owner, salt),
    /// deterministic like the real CREATE2 derivation.
    struct MockReader {
        deployed: Vec<Address>,
        nonce: U256,
    }

    fn mock_address(factory: Address, owner: Address, salt: U256) -> Address {
        let mut preimage = Vec::new();
        preimage.extend_from_slice(factory.as_slice());
        preimage.extend_from_slice(owner.as_slice());
        preimage.extend_from_slice(&salt.to_be_bytes::<32>());
        Address::from_slice(&keccak256(&preimage)[12..])
    }

    #[async_trait]
    impl AccountReader for MockReader {
        async fn counterfactual_address(
            &self,
            factory: Address,
            owner: Address,
            salt: U256,
        ) -> Result<Address, AccountError> {
            Ok(mock_address(factory, owner, salt))
        }

        async fn code_at(&self, address: Address) -> Result<Bytes, AccountError> {
            if self.deployed.contains(&address) {
                Ok(Bytes::from(vec![0x60, 0x80]))
            } else {
                Ok(Bytes::new())
            }
        }

        async fn entry_point_nonce(
            &self,
            _entry_point: Address,
            _sender: Address,
        ) -> Result<U256, AccountError> {
            Ok(self.nonce)
        }

        async fn native_balance(&self, _address: Address) -> Result<U256, AccountError> {
            Ok(U256::ZERO)
        }

        async fn erc20_balance(
            &self,
            _token: Address,
            _owner: Address,
        ) -> Result<U256, AccountError> {
            Ok(U256::ZERO)
        }

        async fn erc20_allowance(
            &self,
            _token: Address,
            _owner: Address,
            _spender: Address,
        ) -> Result<U256, AccountError> {
            Ok(U256::ZERO)
        }

        async fn fee_estimate(&self) -> Result<FeeEstimate, AccountError> {
            Ok(FeeEstimate {
                max_fee_per_gas: 0,
                max_priority_fee_per_gas: 0,
            })
        }
    }

    fn deriver(deployed: Vec<Address>) -> SmartAccountDeriver<MockReader> {
        SmartAccountDeriver::new(
            FACTORY,
            ENTRY_POINT,
            MockReader {
                deployed,
                nonce: U256::from(7u64),
            },
        )
    }

    #[tokio::test]
    async fn same_salt_derives_the_same_address() {
        let deriver = deriver(vec![]);
        let a = deriver.derive(OWNER, U256::ZERO).await.unwrap();
        let b = deriver.derive(OWNER, U256::ZERO).await.unwrap();
        assert_eq!(a.address, b.address);
    }

    #[tokio::test]
    async fn different_salt_derives_a_different_address() {
        let deriver = deriver(vec![]);
        let a = deriver.derive(OWNER, U256::ZERO).await.unwrap();
        let b = deriver.derive(OWNER, U256::from(1u64)).await.unwrap();
        assert_ne!(a.address, b.address);
    }

    #[tokio::test]
    async fn deployment_tracks_code_presence() {
        let address = mock_address(FACTORY, OWNER, U256::ZERO);
        let fresh = deriver(vec![]).derive(OWNER, U256::ZERO).await.unwrap();
        assert!(!fresh.is_deployed());
        let live = deriver(vec![address]).derive(OWNER, U256::ZERO).await.unwrap();
        assert!(live.is_deployed());
    }

    #[tokio::test]
    async fn init_code_is_empty_once_deployed() {
        let address = mock_address(FACTORY, OWNER, U256::ZERO);
        let deriver = deriver(vec![address]);
        let handle = deriver.derive(OWNER, U256::ZERO).await.unwrap();
        assert!(deriver.init_code(&handle).is_empty());
    }

    #[tokio::test]
    async fn init_code_embeds_the_factory_and_create_call() {
        let deriver = deriver(vec![]);
        let handle = deriver.derive(OWNER, U256::ZERO).await.unwrap();
        let init_code = deriver.init_code(&handle);
        assert_eq!(&init_code[..20], FACTORY.as_slice());
        let call =
            ISimpleAccountFactory::createAccountCall::abi_decode(&init_code[20..]).unwrap();
        assert_eq!(call.owner, OWNER);
        assert_eq!(call.salt, U256::ZERO);
    }

    #[tokio::test]
    async fn refresh_pulls_the_entry_point_nonce() {
        let deriver = deriver(vec![]);
        let mut handle = deriver.derive(OWNER, U256::ZERO).await.unwrap();
        assert_eq!(handle.cached_nonce(), None);
        deriver.refresh(&mut handle).await.unwrap();
        assert_eq!(handle.cached_nonce(), Some(U256::from(7u64)));
        handle.invalidate();
        assert_eq!(handle.cached_nonce(), None);
    }
}
