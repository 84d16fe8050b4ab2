//! Wrapper for review items shown in a session, tracking display content and outcome.
use super::{Content, ReviewItem};

#[derive(Clone, Debug)]
pub struct PresentedItem {
    pub item: ReviewItem,
    pub content: Option<Content>,
    pub outcome: Option<ReviewItem>,
}

impl PresentedItem {
    pub fn new(item: ReviewItem, content: Option<Content>) -> Self {
        Self {
            item,
            content,
            outcome: None,
        }
    }

    pub fn mark_reviewed(&mut self, outcome: ReviewItem) {
        self.outcome = Some(outcome);
    }

    pub fn is_reviewed(&self) -> bool {
        self.outcome.is_some()
    }

    /// Text to show for the item; falls back to the item id when content is missing.
    pub fn display_text(&self) -> &str {
        self.content
            .as_ref()
            .map(|content| content.display_text.as_str())
            .unwrap_or(&self.item.key.item_id)
    }
}
