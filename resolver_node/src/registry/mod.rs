//! On-chain agent registry gateway
//!
//! Agents register themselves as contracts exposing `metadataURI()`. This
//! module owns the JSON-RPC provider, a per-address cache of contract
//! bindings, and the translation of chain-level failures into the resolver
//! error taxonomy.

use crate::api::errors::{ResolverError, Result};
use anyhow::anyhow;
use ethers::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

abigen!(
    AgentRegistration,
    r#"[
        function metadataURI() external view returns (string)
    ]"#
);

/// Gateway to the chain-hosted agent registry.
pub struct RegistryGateway {
    provider: Arc<Provider<Http>>,
    /// Contract bindings already constructed this process, keyed by address.
    bindings: RwLock<HashMap<Address, AgentRegistration<Provider<Http>>>>,
}

impl RegistryGateway {
    pub fn new(rpc_endpoint: &str) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_endpoint)
            .map_err(|e| anyhow!("Failed to create HTTP provider: {}", e))?;
        Ok(Self {
            provider: Arc::new(provider),
            bindings: RwLock::new(HashMap::new()),
        })
    }

    /// Parse a caller-supplied address, rejecting anything that is not a
    /// well-formed Ethereum address.
    pub fn parse_address(address: &str) -> Result<Address> {
        address.parse::<Address>().map_err(|_| {
            ResolverError::bad_request(format!("{address} is not a valid Ethereum address"))
        })
    }

    async fn binding(&self, address: Address) -> AgentRegistration<Provider<Http>> {
        if let Some(existing) = self.bindings.read().await.get(&address) {
            return existing.clone();
        }
        let binding = AgentRegistration::new(address, Arc::clone(&self.provider));
        self.bindings
            .write()
            .await
            .insert(address, binding.clone());
        binding
    }

    /// Look up the metadata locator registered at `address`.
    ///
    /// A call that cannot be decoded as a string means nothing answering the
    /// registration interface lives at that address; that is a lookup miss,
    /// not a fault of ours.
    pub async fn resolve_locator(&self, address: &str) -> Result<String> {
        let parsed = Self::parse_address(address)?;
        let binding = self.binding(parsed).await;
        match binding.metadata_uri().call().await {
            Ok(locator) => Ok(locator),
            Err(err) if lookup_came_up_empty(&err) => Err(ResolverError::not_found(format!(
                "{address} is probably not an Agent instance"
            ))),
            Err(err) => Err(ResolverError::Internal(
                anyhow::Error::new(err).context(format!("querying metadataURI() on {address}")),
            )),
        }
    }
}

/// Whether a contract call failure means "no agent registered here" rather
/// than an infrastructure problem.
///
/// An `eth_call` against an address with no readable contract state answers
/// empty data, which fails output decoding inside the call path and arrives
/// wrapped as `AbiError`. Reverts and undeployed contracts are the same kind
/// of miss; transport and middleware failures fall through and stay internal.
fn lookup_came_up_empty<M: Middleware>(err: &ContractError<M>) -> bool {
    matches!(
        err,
        ContractError::AbiError(_)
            | ContractError::DecodingError(_)
            | ContractError::DetokenizationError(_)
            | ContractError::Revert(_)
            | ContractError::ContractNotDeployed
    )
}

/// Extract the content hash from a locator: its final `/`-separated segment.
///
/// Handles bare hashes (`Qmabc`), scheme-prefixed locators (`ipfs://Qmabc`)
/// and full gateway URLs (`https://gateway/ipfs/Qmabc`) alike.
pub fn hash_from_locator(locator: &str) -> &str {
    locator.rsplit('/').next().unwrap_or(locator)
}
