//! Wire types for the push/pull sync protocol.
//!
//! Push carries a client's ordered mutation queue to the server; pull
//! returns the fact/message diff since a cookie as a patch the client
//! applies to its mirrored index. Both shapes are shared verbatim between
//! `weft-client` and `weft-server`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{fact::Fact, message::Message};

pub const PUSH_VERSION: u32 = 1;

// ─── Push ────────────────────────────────────────────────────────────────────

/// One queued mutation. Ids are strictly increasing per client; the server
/// stores the highest applied id per client and skips everything at or
/// below it on replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationEnvelope {
  pub id:        u64,
  pub name:      String,
  pub args:      JsonValue,
  /// Client wall clock in milliseconds; informational only.
  pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
  pub token:          String,
  pub client_id:      String,
  pub mutations:      Vec<MutationEnvelope>,
  pub push_version:   u32,
  pub schema_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
  pub success: bool,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub errors:  Vec<String>,
}

// ─── Pull ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
  pub client_id: String,
  /// The last-observed watermark; absent on a client's first pull.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cookie:    Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
  pub cookie:           String,
  /// The server's watermark for the requesting client, so it can drop
  /// locally-queued mutations the pulled state already reflects.
  pub last_mutation_id: u64,
  pub patch:            Vec<PatchOp>,
}

/// One patch entry: a live record to mirror, or a retracted fact to drop
/// from the mirror (keyed by fact id).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
  Put { key: String, value: PatchValue },
  Del { key: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatchValue {
  Fact(FactWithIndexes),
  Message(MessageWithIndexes),
}

// ─── Denormalized index keys ─────────────────────────────────────────────────

/// A fact plus its index keys, attached at serialization time so the client
/// can populate its mirrored index without recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactWithIndexes {
  #[serde(flatten)]
  pub fact:    Fact,
  pub indexes: FactIndexes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactIndexes {
  pub eav: String,
  pub aev: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ave: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub vae: Option<String>,
}

impl FactWithIndexes {
  pub fn new(fact: Fact) -> Self {
    let indexes = FactIndexes {
      eav: format!("{}-{}-{}", fact.entity, fact.attribute, fact.id),
      aev: format!("{}-{}-{}", fact.attribute, fact.entity, fact.id),
      ave: fact
        .schema
        .unique
        .then(|| format!("{}-{}", fact.attribute, fact.value.lexical())),
      vae: fact
        .value
        .reference_target()
        .map(|target| format!("{}-{}", target, fact.attribute)),
    };
    Self { fact, indexes }
  }
}

/// A message plus its topic-scan key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageWithIndexes {
  #[serde(flatten)]
  pub message: Message,
  pub indexes: MessageIndexes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageIndexes {
  pub messages: String,
}

impl MessageWithIndexes {
  pub fn new(message: Message) -> Self {
    let indexes = MessageIndexes {
      messages: format!(
        "{}-{}-{}",
        message.topic, message.ts, message.id
      ),
    };
    Self { message, indexes }
  }
}
