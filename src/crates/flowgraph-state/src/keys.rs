//! Persisted key layout
//!
//! Live thread state is stored under the bare thread id. Named checkpoints
//! share the same keyspace under `{thread_id}:checkpoint:{name}`, which is why
//! thread listings have to filter checkpoint keys out.

const CHECKPOINT_SEGMENT: &str = ":checkpoint:";

/// Key under which a named checkpoint of `thread_id` is stored
pub fn checkpoint_key(thread_id: &str, name: &str) -> String {
    format!("{}{}{}", thread_id, CHECKPOINT_SEGMENT, name)
}

/// Prefix shared by every checkpoint key of `thread_id`
pub fn checkpoint_prefix(thread_id: &str) -> String {
    format!("{}{}", thread_id, CHECKPOINT_SEGMENT)
}

pub fn is_checkpoint_key(key: &str) -> bool {
    key.contains(CHECKPOINT_SEGMENT)
}

/// Split a checkpoint key into `(thread_id, name)`
pub fn parse_checkpoint_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(CHECKPOINT_SEGMENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_key_layout() {
        assert_eq!(checkpoint_key("t1", "cp1"), "t1:checkpoint:cp1");
        assert!(checkpoint_key("t1", "cp1").starts_with(&checkpoint_prefix("t1")));
    }

    #[test]
    fn test_parse_checkpoint_key() {
        assert_eq!(parse_checkpoint_key("t1:checkpoint:cp1"), Some(("t1", "cp1")));
        assert_eq!(parse_checkpoint_key("t1"), None);
        assert!(is_checkpoint_key("t1:checkpoint:x"));
        assert!(!is_checkpoint_key("t1"));
    }
}
