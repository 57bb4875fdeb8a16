//! Extension loading and per-kind views
//!
//! Two stages: read the extension's factory, resolve it through the
//! [`ExtensionRegistry`], then batch-read the fields that kind exposes.
//! An unknown factory becomes [`ExtensionView::Unsupported`], never an error.

use ethers::abi::Token;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use love20_protocol::abi::{
    EXTENSION_ABI, EXTENSION_CENTER_ABI, GROUP_ACTION_EXTENSION_ABI, GROUP_SERVICE_EXTENSION_ABI,
    LP_EXTENSION_ABI,
};
use love20_protocol::config::ContractsConfig;
use love20_protocol::serde_u256;
use love20_protocol::{ExtensionDispatch, ExtensionKind, ExtensionRegistry, TokenContext};

use crate::batch::{BatchExecutor, BatchResults, ReadBatch};
use crate::chain::{ChainClient, ContractCall};
use crate::derive;
use crate::{ClientError, Result};

/// LP-staking extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpExtensionView {
    pub extension: Address,
    pub lp_token: Option<Address>,
    #[serde(with = "serde_u256")]
    pub joined_value: U256,
    #[serde(with = "serde_u256::option")]
    pub account_joined_value: Option<U256>,
}

/// Group-action extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupActionView {
    pub extension: Address,
    #[serde(with = "serde_u256")]
    pub group_id: U256,
    #[serde(with = "serde_u256")]
    pub max_capacity: U256,
    #[serde(with = "serde_u256")]
    pub joined_value: U256,

    /// `joined_value / max_capacity` in basis points
    pub capacity_usage_bps: u64,
}

/// Group-service extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupServiceView {
    pub extension: Address,
    #[serde(with = "serde_u256")]
    pub max_recipients: U256,
    #[serde(with = "serde_u256")]
    pub joined_value: U256,
}

/// Kind-specific view of an extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtensionView {
    Lp(LpExtensionView),
    GroupAction(GroupActionView),
    GroupService(GroupServiceView),
    Unsupported { extension: Address, factory: Address },
}

impl ExtensionView {
    pub fn kind(&self) -> Option<ExtensionKind> {
        match self {
            ExtensionView::Lp(_) => Some(ExtensionKind::Lp),
            ExtensionView::GroupAction(_) => Some(ExtensionKind::GroupAction),
            ExtensionView::GroupService(_) => Some(ExtensionKind::GroupService),
            ExtensionView::Unsupported { .. } => None,
        }
    }

    pub fn extension(&self) -> Address {
        match self {
            ExtensionView::Lp(view) => view.extension,
            ExtensionView::GroupAction(view) => view.extension,
            ExtensionView::GroupService(view) => view.extension,
            ExtensionView::Unsupported { extension, .. } => *extension,
        }
    }
}

/// Read the factory that deployed `extension`
pub async fn fetch_factory(client: &dyn ChainClient, extension: Address) -> Result<Address> {
    let tokens = ContractCall::new(extension, &EXTENSION_ABI, "factory", vec![]).read(client).await?;
    tokens
        .into_iter()
        .next()
        .and_then(Token::into_address)
        .ok_or_else(|| ClientError::decode("factory", "expected an address"))
}

/// Extension bound to an action, if any
pub async fn load_action_extension(
    client: &dyn ChainClient,
    contracts: &ContractsConfig,
    token: &TokenContext,
    action_id: U256,
) -> Result<Option<Address>> {
    let tokens = ContractCall::new(
        contracts.extension_center,
        &EXTENSION_CENTER_ABI,
        "extension",
        vec![Token::Address(token.address), Token::Uint(action_id)],
    )
    .read(client)
    .await?;

    let extension = tokens
        .into_iter()
        .next()
        .and_then(Token::into_address)
        .ok_or_else(|| ClientError::decode("extension", "expected an address"))?;

    debug!(token = %token.symbol, action_id = %action_id, extension = ?extension, "Loaded action extension");
    Ok((!extension.is_zero()).then_some(extension))
}

/// Resolve and load the kind-specific view of `extension`
pub async fn load_extension_view(
    executor: &BatchExecutor,
    registry: &ExtensionRegistry,
    extension: Address,
    account: Option<Address>,
) -> Result<ExtensionView> {
    let factory = fetch_factory(executor.client(), extension).await?;

    let kind = match registry.resolve(factory) {
        ExtensionDispatch::Known { kind } => kind,
        ExtensionDispatch::Unsupported { factory } => {
            info!(extension = ?extension, factory = ?factory, "Unsupported extension factory");
            return Ok(ExtensionView::Unsupported { extension, factory });
        }
    };

    let mut batch = ReadBatch::new();
    let joined = batch.push(ContractCall::new(extension, &EXTENSION_ABI, "joinedValue", vec![]));

    let view = match kind {
        ExtensionKind::Lp => {
            let lp_token = batch.push(ContractCall::new(extension, &LP_EXTENSION_ABI, "lpTokenAddress", vec![]));
            let mine = batch.push_if(account.map(|account| {
                ContractCall::new(
                    extension,
                    &EXTENSION_ABI,
                    "joinedValueByAccount",
                    vec![Token::Address(account)],
                )
            }));
            let results = executor.execute(batch).await?;
            ExtensionView::Lp(LpExtensionView {
                extension,
                lp_token: results.address(lp_token),
                joined_value: results.uint_or_zero(joined),
                account_joined_value: results.uint(mine),
            })
        }
        ExtensionKind::GroupAction => {
            let capacity = batch.push(ContractCall::new(
                extension,
                &GROUP_ACTION_EXTENSION_ABI,
                "maxCapacity",
                vec![],
            ));
            let group_id = batch.push(ContractCall::new(extension, &GROUP_ACTION_EXTENSION_ABI, "groupId", vec![]));
            let results = executor.execute(batch).await?;
            group_action_view(extension, &results, joined, capacity, group_id)
        }
        ExtensionKind::GroupService => {
            let recipients = batch.push(ContractCall::new(
                extension,
                &GROUP_SERVICE_EXTENSION_ABI,
                "maxRecipients",
                vec![],
            ));
            let results = executor.execute(batch).await?;
            ExtensionView::GroupService(GroupServiceView {
                extension,
                max_recipients: results.uint_or_zero(recipients),
                joined_value: results.uint_or_zero(joined),
            })
        }
    };

    debug!(extension = ?extension, kind = %kind, "Loaded extension view");
    Ok(view)
}

fn group_action_view(
    extension: Address,
    results: &BatchResults,
    joined: crate::batch::Slot,
    capacity: crate::batch::Slot,
    group_id: crate::batch::Slot,
) -> ExtensionView {
    let joined_value = results.uint_or_zero(joined);
    let max_capacity = results.uint_or_zero(capacity);
    ExtensionView::GroupAction(GroupActionView {
        extension,
        group_id: results.uint_or_zero(group_id),
        max_capacity,
        joined_value,
        capacity_usage_bps: derive::capacity_usage_bps(joined_value, max_capacity),
    })
}
