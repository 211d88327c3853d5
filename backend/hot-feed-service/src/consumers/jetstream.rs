//! Jetstream event decoding.
//!
//! Jetstream delivers repository commits as JSON text frames. Only post
//! records matter here; identity/account events and other collections
//! decode to an event without an operation so the cursor still advances.

use crate::models::PostCreate;
use serde::Deserialize;
use std::time::Instant;

pub const POST_COLLECTION: &str = "app.bsky.feed.post";

#[derive(Debug, Clone, PartialEq)]
pub enum PostOperation {
    Create(PostCreate),
    /// AT-URI of the deleted post
    Delete(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JetstreamEvent {
    /// Stream position in microseconds; also the resume cursor
    pub time_us: i64,
    pub operation: Option<PostOperation>,
}

/// An event that could not be turned into an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedEvent {
    /// Present when the frame decoded far enough to carry a position
    pub time_us: Option<i64>,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    did: String,
    time_us: i64,
    kind: String,
    commit: Option<RawCommit>,
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    operation: String,
    collection: String,
    rkey: Option<String>,
    cid: Option<String>,
    record: Option<RawPostRecord>,
}

#[derive(Debug, Deserialize)]
struct RawPostRecord {
    text: Option<String>,
    langs: Option<Vec<String>>,
    reply: Option<serde_json::Value>,
}

pub fn post_uri(did: &str, rkey: &str) -> String {
    format!("at://{}/{}/{}", did, POST_COLLECTION, rkey)
}

pub fn decode_event(raw: &str) -> Result<JetstreamEvent, MalformedEvent> {
    let event: RawEvent = serde_json::from_str(raw).map_err(|e| MalformedEvent {
        time_us: None,
        reason: e.to_string(),
    })?;

    let malformed = |reason: &str| MalformedEvent {
        time_us: Some(event.time_us),
        reason: reason.to_string(),
    };

    let commit = match (event.kind.as_str(), &event.commit) {
        ("commit", Some(commit)) if commit.collection == POST_COLLECTION => commit,
        ("commit", None) => return Err(malformed("commit event without commit body")),
        _ => {
            return Ok(JetstreamEvent {
                time_us: event.time_us,
                operation: None,
            })
        }
    };

    let rkey = commit
        .rkey
        .as_deref()
        .filter(|rkey| !rkey.is_empty())
        .ok_or_else(|| malformed("commit without rkey"))?;
    let uri = post_uri(&event.did, rkey);

    let operation = match commit.operation.as_str() {
        "create" => {
            let record = commit
                .record
                .as_ref()
                .ok_or_else(|| malformed("create without record"))?;
            let cid = commit
                .cid
                .clone()
                .ok_or_else(|| malformed("create without cid"))?;
            let text = record
                .text
                .clone()
                .ok_or_else(|| malformed("post record without text"))?;
            Some(PostOperation::Create(PostCreate {
                uri,
                cid,
                text,
                langs: record.langs.clone(),
                is_reply: record.reply.is_some(),
            }))
        }
        "delete" => Some(PostOperation::Delete(uri)),
        // Edits do not change ranking inputs.
        "update" => None,
        other => return Err(malformed(&format!("unknown operation {}", other))),
    };

    Ok(JetstreamEvent {
        time_us: event.time_us,
        operation,
    })
}

/// Creates and deletes accumulated for one flush.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationsByType {
    pub creates: Vec<PostCreate>,
    pub deletes: Vec<String>,
}

impl OperationsByType {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.deletes.is_empty()
    }
}

/// Pending operations plus the stream position they reach.
#[derive(Debug)]
pub struct OperationBatch {
    operations: OperationsByType,
    cursor: Option<i64>,
    events: usize,
    malformed: u64,
    started_at: Instant,
}

impl OperationBatch {
    pub fn new() -> Self {
        Self {
            operations: OperationsByType::default(),
            cursor: None,
            events: 0,
            malformed: 0,
            started_at: Instant::now(),
        }
    }

    pub fn add(&mut self, event: JetstreamEvent) {
        self.advance(Some(event.time_us));
        match event.operation {
            Some(PostOperation::Create(create)) => self.operations.creates.push(create),
            Some(PostOperation::Delete(uri)) => {
                // A post created and deleted within one batch never reaches the store.
                self.operations.creates.retain(|create| create.uri != uri);
                self.operations.deletes.push(uri);
            }
            None => {}
        }
    }

    pub fn add_malformed(&mut self, event: MalformedEvent) {
        self.malformed += 1;
        self.advance(event.time_us);
    }

    fn advance(&mut self, time_us: Option<i64>) {
        self.events += 1;
        if let Some(time_us) = time_us {
            self.cursor = Some(self.cursor.map_or(time_us, |c| c.max(time_us)));
        }
    }

    pub fn should_flush_by_size(&self, max_size: usize) -> bool {
        self.events >= max_size
    }

    pub fn should_flush_by_time(&self, max_age: std::time::Duration) -> bool {
        self.events > 0 && self.started_at.elapsed() >= max_age
    }

    pub fn len(&self) -> usize {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events == 0
    }

    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    pub fn cursor(&self) -> Option<i64> {
        self.cursor
    }

    pub fn operations(&self) -> &OperationsByType {
        &self.operations
    }
}

impl Default for OperationBatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATE: &str = r#"{
        "did": "did:plc:author",
        "time_us": 1725911162329308,
        "kind": "commit",
        "commit": {
            "rev": "3l3qo2vuowo2b",
            "operation": "create",
            "collection": "app.bsky.feed.post",
            "rkey": "3l3qo2vutsw2b",
            "record": {
                "$type": "app.bsky.feed.post",
                "createdAt": "2024-09-09T19:46:02.102Z",
                "langs": ["en"],
                "text": "Watching a film tonight"
            },
            "cid": "bafyreidwaivazkwu67xztlmuobx35hs2lnfh3kolmgfmucldvhd3sgzcqi"
        }
    }"#;

    fn delete_event(rkey: &str, time_us: i64) -> JetstreamEvent {
        decode_event(&format!(
            r#"{{"did":"did:plc:author","time_us":{},"kind":"commit","commit":{{"operation":"delete","collection":"app.bsky.feed.post","rkey":"{}"}}}}"#,
            time_us, rkey
        ))
        .unwrap()
    }

    #[test]
    fn test_decode_create() {
        let event = decode_event(CREATE).unwrap();
        assert_eq!(event.time_us, 1725911162329308);
        match event.operation {
            Some(PostOperation::Create(create)) => {
                assert_eq!(
                    create.uri,
                    "at://did:plc:author/app.bsky.feed.post/3l3qo2vutsw2b"
                );
                assert_eq!(create.langs, Some(vec!["en".to_string()]));
                assert!(!create.is_reply);
                assert_eq!(create.text, "Watching a film tonight");
            }
            other => panic!("expected create, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_reply_and_missing_langs() {
        let raw = r#"{"did":"did:plc:a","time_us":5,"kind":"commit","commit":{"operation":"create","collection":"app.bsky.feed.post","rkey":"k","cid":"c","record":{"text":"film","reply":{"root":{},"parent":{}}}}}"#;
        match decode_event(raw).unwrap().operation {
            Some(PostOperation::Create(create)) => {
                assert!(create.is_reply);
                assert_eq!(create.langs, None);
            }
            other => panic!("expected create, got {:?}", other),
        }
    }

    #[test]
    fn test_non_post_events_carry_only_position() {
        let identity = r#"{"did":"did:plc:a","time_us":9,"kind":"identity","identity":{}}"#;
        assert_eq!(
            decode_event(identity).unwrap(),
            JetstreamEvent {
                time_us: 9,
                operation: None
            }
        );
        let like = r#"{"did":"did:plc:a","time_us":10,"kind":"commit","commit":{"operation":"create","collection":"app.bsky.feed.like","rkey":"k"}}"#;
        assert_eq!(decode_event(like).unwrap().operation, None);
    }

    #[test]
    fn test_malformed_events() {
        assert_eq!(decode_event("not json").unwrap_err().time_us, None);

        let no_record = r#"{"did":"did:plc:a","time_us":11,"kind":"commit","commit":{"operation":"create","collection":"app.bsky.feed.post","rkey":"k","cid":"c"}}"#;
        assert_eq!(decode_event(no_record).unwrap_err().time_us, Some(11));

        let no_rkey = r#"{"did":"did:plc:a","time_us":12,"kind":"commit","commit":{"operation":"delete","collection":"app.bsky.feed.post"}}"#;
        assert!(decode_event(no_rkey).is_err());
    }

    #[test]
    fn test_batch_cancels_create_deleted_in_same_batch() {
        let mut batch = OperationBatch::new();
        let create = decode_event(CREATE).unwrap();
        batch.add(create);
        batch.add(delete_event("3l3qo2vutsw2b", 1725911162329400));

        assert!(batch.operations().creates.is_empty());
        assert_eq!(batch.operations().deletes.len(), 1);
        assert_eq!(batch.cursor(), Some(1725911162329400));
        assert!(batch.should_flush_by_size(2));
    }

    #[test]
    fn test_malformed_events_still_advance_cursor() {
        let mut batch = OperationBatch::new();
        batch.add_malformed(MalformedEvent {
            time_us: Some(42),
            reason: "bad".to_string(),
        });
        batch.add_malformed(MalformedEvent {
            time_us: None,
            reason: "worse".to_string(),
        });
        assert_eq!(batch.cursor(), Some(42));
        assert_eq!(batch.malformed(), 2);
        assert!(batch.operations().is_empty());
    }

    #[test]
    fn test_empty_batch_never_flushes_by_time() {
        let batch = OperationBatch::new();
        assert!(!batch.should_flush_by_time(std::time::Duration::ZERO));
    }
}
