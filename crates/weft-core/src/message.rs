//! Discussion messages, the secondary append-only log.
//!
//! Messages never change after they are written; there is no retraction.
//! They ride the same pull/patch mechanics as facts, indexed by topic and a
//! store-assigned sequence index.

use serde::{Deserialize, Serialize};

/// A stored message. `index` is the store-assigned monotonic sequence
/// number within the space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
  pub id:      String,
  pub topic:   String,
  /// Zero-padded millisecond stamp; shares the fact clock so pull cookies
  /// cover both logs.
  pub ts:      String,
  /// The member entity that authored the message.
  pub sender:  String,
  pub content: String,
  pub index:   u64,
}

/// Input to `post_message`; the store assigns the sequence index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
  pub id:      String,
  pub topic:   String,
  pub ts:      String,
  pub sender:  String,
  pub content: String,
}
