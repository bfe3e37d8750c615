use serde_json::Value;

/// Bookmark over the Bot API update stream. The next pull starts at
/// `last_seen + 1`, so updates already handed to the caller are never
/// delivered twice.
#[derive(Debug, Default)]
pub struct UpdateCursor {
    last_seen: Option<i64>,
}

impl UpdateCursor {
    /// Offset argument for the next pull; `None` means "whatever the
    /// transport currently has pending".
    pub fn next_offset(&self) -> Option<i64> {
        self.last_seen.map(|id| id + 1)
    }

    /// Records progress after a successful pull. Batches arrive in ascending
    /// `update_id` order, so the last element is the high-water mark. An
    /// empty batch leaves the cursor untouched.
    pub fn advance(&mut self, batch: &[Value]) {
        if let Some(id) = batch
            .last()
            .and_then(|update| update.get("update_id"))
            .and_then(Value::as_i64)
        {
            self.last_seen = Some(id);
        }
    }

    pub fn last_seen(&self) -> Option<i64> {
        self.last_seen
    }
}

#[cfg(test)]
mod tests {
    use super::UpdateCursor;
    use serde_json::json;

    #[test]
    fn fresh_cursor_has_no_offset() {
        let cursor = UpdateCursor::default();
        assert_eq!(cursor.next_offset(), None);
        assert_eq!(cursor.last_seen(), None);
    }

    #[test]
    fn advance_tracks_last_batch_element() {
        let mut cursor = UpdateCursor::default();
        cursor.advance(&[json!({"update_id": 5}), json!({"update_id": 7})]);
        assert_eq!(cursor.last_seen(), Some(7));
        assert_eq!(cursor.next_offset(), Some(8));
    }

    #[test]
    fn empty_batch_leaves_cursor_unchanged() {
        let mut cursor = UpdateCursor::default();
        cursor.advance(&[json!({"update_id": 12})]);
        cursor.advance(&[]);
        assert_eq!(cursor.last_seen(), Some(12));
        assert_eq!(cursor.next_offset(), Some(13));
    }

    #[test]
    fn cursor_is_monotonic_across_batches() {
        let mut cursor = UpdateCursor::default();
        cursor.advance(&[json!({"update_id": 3})]);
        cursor.advance(&[json!({"update_id": 4}), json!({"update_id": 9})]);
        assert_eq!(cursor.next_offset(), Some(10));
    }
}
