//! Container for all available lessons, usable as a [`ContentResolver`].
use super::{Content, ContentError, ContentResolver, ItemKey, Lesson, LessonEntry, LessonType};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub lessons: Vec<Lesson>,
}

impl Catalog {
    /// Every item key the catalog can resolve, in lesson order.
    pub fn keys(&self) -> impl Iterator<Item = ItemKey> + '_ {
        self.lessons
            .iter()
            .flat_map(|lesson| lesson.entries.iter().map(move |entry| lesson.key_for(entry)))
    }

    /// Small built-in catalog used when no catalog file is configured.
    pub fn sample() -> Self {
        fn entry(item_id: &str, display: &str, roman: &str, meaning: &str) -> LessonEntry {
            LessonEntry {
                item_id: item_id.to_string(),
                content: Content {
                    display_text: display.to_string(),
                    transliteration: roman.to_string(),
                    translation: meaning.to_string(),
                },
            }
        }

        Self {
            lessons: vec![
                Lesson {
                    level: 1,
                    lesson_type: LessonType::Consonants,
                    entries: vec![
                        entry("giyeok", "ㄱ", "g/k", "giyeok"),
                        entry("nieun", "ㄴ", "n", "nieun"),
                        entry("digeut", "ㄷ", "d/t", "digeut"),
                    ],
                },
                Lesson {
                    level: 1,
                    lesson_type: LessonType::Vowels,
                    entries: vec![
                        entry("a", "ㅏ", "a", "a"),
                        entry("eo", "ㅓ", "eo", "eo"),
                    ],
                },
                Lesson {
                    level: 2,
                    lesson_type: LessonType::Vocabulary,
                    entries: vec![
                        entry("hello", "안녕하세요", "annyeonghaseyo", "hello"),
                        entry("thanks", "감사합니다", "gamsahamnida", "thank you"),
                    ],
                },
            ],
        }
    }
}

impl ContentResolver for Catalog {
    fn resolve_content(&self, key: &ItemKey) -> Result<Content, ContentError> {
        self.lessons
            .iter()
            .filter(|lesson| lesson.level == key.level && lesson.lesson_type == key.lesson_type)
            .find_map(|lesson| lesson.find(&key.item_id))
            .map(|entry| entry.content.clone())
            .ok_or_else(|| ContentError::NotFound(key.clone()))
    }
}
