//! Lesson is a set of items sharing a level and lesson type
use super::{Content, ItemKey, LessonType};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub level: u32,
    pub lesson_type: LessonType,
    pub entries: Vec<LessonEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonEntry {
    pub item_id: String,
    #[serde(flatten)]
    pub content: Content,
}

impl Lesson {
    pub fn key_for(&self, entry: &LessonEntry) -> ItemKey {
        ItemKey::new(self.level, self.lesson_type.clone(), entry.item_id.clone())
    }

    pub fn find(&self, item_id: &str) -> Option<&LessonEntry> {
        self.entries.iter().find(|entry| entry.item_id == item_id)
    }
}
