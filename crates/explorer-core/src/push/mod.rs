//! Push notifications to subscribed clients.
//!
//! Two logical topics exist:
//!
//! | Topic             | Event                   | Payload                          |
//! |-------------------|-------------------------|----------------------------------|
//! | `blocks`          | `blocksUpdated`         | [`BlockUpdate`] per ingested tip |
//! | `background_data` | `blockchainInfoUpdated` | full [`ChainInfo`] snapshot      |
//!
//! Delivery is best-effort. Callers in the engine log and drop every [`PushError`].

pub mod channel;

pub use channel::BroadcastPushChannel;

use crate::{
    cache::types::{BlockSummary, ProofType},
    types::ChainInfo,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a push channel.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PushError {
    /// Nobody is listening on the channel.
    #[error("no subscribers for topic {0}")]
    NoSubscribers(Topic),

    #[error("failed to serialize push payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Subscriber group a message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Blocks,
    BackgroundData,
}

impl Topic {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::BackgroundData => "background_data",
        }
    }

    /// Event name clients receive for this topic.
    #[must_use]
    pub fn event(&self) -> &'static str {
        match self {
            Self::Blocks => "blocksUpdated",
            Self::BackgroundData => "blockchainInfoUpdated",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload pushed on the `blocks` topic for every newly ingested block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockUpdate {
    pub height: u64,
    pub size: u64,
    pub weight: u64,
    pub proof_type: ProofType,
    pub time: i64,
    pub median_time: i64,
    pub tx_count: u32,
}

impl From<&BlockSummary> for BlockUpdate {
    fn from(summary: &BlockSummary) -> Self {
        Self {
            height: summary.height,
            size: summary.size,
            weight: summary.weight,
            proof_type: summary.proof_type,
            time: summary.time,
            median_time: summary.median_time,
            tx_count: summary.tx_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PushPayload {
    Block(BlockUpdate),
    ChainInfo(Arc<ChainInfo>),
}

/// A message addressed to one topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub topic: Topic,
    pub event: &'static str,
    pub payload: PushPayload,
}

impl PushMessage {
    #[must_use]
    pub fn block(update: BlockUpdate) -> Self {
        Self { topic: Topic::Blocks, event: Topic::Blocks.event(), payload: PushPayload::Block(update) }
    }

    #[must_use]
    pub fn chain_info(info: Arc<ChainInfo>) -> Self {
        Self {
            topic: Topic::BackgroundData,
            event: Topic::BackgroundData.event(),
            payload: PushPayload::ChainInfo(info),
        }
    }

    /// Serializes the payload for a text transport.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Serialization`] if the payload cannot be encoded.
    pub fn payload_json(&self) -> Result<String, PushError> {
        Ok(serde_json::to_string(&self.payload)?)
    }
}

/// Outbound side of the push transport.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Publishes a newly ingested block on the `blocks` topic.
    async fn publish_block(&self, update: BlockUpdate) -> Result<(), PushError>;

    /// Publishes the chain info snapshot on the `background_data` topic.
    async fn publish_chain_info(&self, info: Arc<ChainInfo>) -> Result<(), PushError>;
}
