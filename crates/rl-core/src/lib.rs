//! roving-lily/crates/rl-core/src/lib.rs
//!
//! The central domain types and port definitions for Roving Lily.

pub mod bucket;
pub mod codec;
pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use bucket::*;
pub use codec::*;
pub use error::*;
pub use models::*;
pub use traits::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use serde_json::json;

    #[test]
    fn test_pointer_wire_forms() {
        let simple: PostPointer = serde_json::from_value(json!(7)).unwrap();
        assert_eq!(simple, PostPointer::Simple(7));

        let composite: PostPointer =
            serde_json::from_value(json!([1_684_800_000_000u64, "5GrwvaEF"])).unwrap();
        assert_eq!(
            composite,
            PostPointer::Composite(1_684_800_000_000, AccountId::new("5GrwvaEF"))
        );
    }

    #[test]
    fn test_post_record_from_gateway_json() {
        let record: PostRecord = serde_json::from_value(json!({
            "content": "0x68656c6c6f",
            "owner": "5FHneW46",
            "likes": 3,
            "dislikes": 0,
            "attention": 9,
            "postedTime": 1_684_800_000_000u64,
            "lastReplyTime": 1_684_800_100_000u64
        }))
        .unwrap();

        assert_eq!(record.id, 0);
        assert!(record.replies.is_empty());
        assert_eq!(record.content, Payload::Encoded("0x68656c6c6f".into()));
        assert_eq!(record.attention, 9);
    }

    #[test]
    fn test_profile_accepts_byte_array() {
        let profile: ProfileRecord =
            serde_json::from_value(json!({ "nickname": [76, 105, 108, 121] })).unwrap();
        assert_eq!(profile.nickname, Payload::Raw(b"Lily".to_vec()));
    }

    #[test]
    fn test_post_view_serializes_camel_case() {
        let view = PostView {
            id: 1,
            nickname: UNKNOWN_NICKNAME.to_string(),
            owner: "5FHneW46".into(),
            content: "hi".into(),
            likes: 0,
            dislikes: 0,
            attention: 0,
            reply_count: 2,
            posted_time: 10,
            last_reply_time: 20,
        };
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["replyCount"], 2);
        assert_eq!(value["lastReplyTime"], 20);
        assert_eq!(value["nickname"], "Unknown");
    }
}
