// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document revisions and their serializable projection.
//!
//! A revision serializes as a flat JSON object: the reserved `_id`, `_rev`,
//! `_deleted` and `_attachments` keys next to the body fields. Attachment
//! data travels base64-encoded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Binary attachment of a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub content_type: String,
    #[serde(serialize_with = "encode_base64", deserialize_with = "decode_base64")]
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

fn encode_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(data))
}

fn decode_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

/// One revision of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRevision {
    #[serde(rename = "_id", default)]
    pub doc_id: String,
    #[serde(rename = "_rev")]
    pub rev_id: String,
    #[serde(rename = "_deleted", default)]
    pub deleted: bool,
    #[serde(rename = "_attachments", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attachments: BTreeMap<String, Attachment>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl DocumentRevision {
    pub fn new(doc_id: impl Into<String>, rev_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            rev_id: rev_id.into(),
            deleted: false,
            attachments: BTreeMap::new(),
            body: Map::new(),
        }
    }

    /// Replace the body. Non-object values become an empty body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    pub fn with_attachment(mut self, name: impl Into<String>, attachment: Attachment) -> Self {
        self.attachments.insert(name.into(), attachment);
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// What the decision-maker sees of one conflicting revision.
///
/// Deleted revisions are included but carry no attachments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionSnapshot {
    #[serde(rename = "_id")]
    pub doc_id: String,
    #[serde(rename = "_rev")]
    pub rev_id: String,
    #[serde(rename = "_deleted")]
    pub deleted: bool,
    #[serde(rename = "_attachments", skip_serializing_if = "Option::is_none")]
    pub attachments: Option<BTreeMap<String, Attachment>>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl From<&DocumentRevision> for RevisionSnapshot {
    fn from(revision: &DocumentRevision) -> Self {
        let attachments = (!revision.deleted && !revision.attachments.is_empty())
            .then(|| revision.attachments.clone());
        Self {
            doc_id: revision.doc_id.clone(),
            rev_id: revision.rev_id.clone(),
            deleted: revision.deleted,
            attachments,
            body: revision.body.clone(),
        }
    }
}

/// One document's conflict set as handed to the decision-maker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictSnapshot {
    pub doc_id: String,
    /// Same order as offered by the store.
    pub conflicts: Vec<RevisionSnapshot>,
}

impl ConflictSnapshot {
    pub fn new(doc_id: &str, conflicts: &[DocumentRevision]) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            conflicts: conflicts.iter().map(RevisionSnapshot::from).collect(),
        }
    }
}
