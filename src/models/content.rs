//! Display content for a learned item. Content is looked up by key only to
//! present an item; scheduling never depends on it.
use super::ItemKey;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub display_text: String,
    pub transliteration: String,
    pub translation: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("no content for {0}")]
    NotFound(ItemKey),
    #[error("content source unavailable: {0}")]
    Unavailable(String),
}

/// Source of display content, e.g. the lesson catalog.
pub trait ContentResolver: Send + Sync {
    fn resolve_content(&self, key: &ItemKey) -> Result<Content, ContentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_json_shape() {
        let content = Content {
            display_text: "안녕하세요".to_string(),
            transliteration: "annyeonghaseyo".to_string(),
            translation: "hello".to_string(),
        };

        let json = serde_json::to_string(&content).unwrap();
        assert!(json.contains("\"displayText\":\"안녕하세요\""));

        let back: Content = serde_json::from_str(&json).unwrap();
        assert_eq!(back, content);
    }
}
