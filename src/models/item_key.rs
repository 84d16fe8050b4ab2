//! Identity of a schedulable item: the learner it belongs to and the
//! `(level, lesson type, item id)` triple naming the learned content.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Explicit learner identity passed to every engine call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LearnerId(String);

impl LearnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LearnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LearnerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lesson category an item was learned in.
///
/// Names outside the known set are kept verbatim in `Other` so that
/// records written by newer clients survive a round trip. Identity is the
/// name: `Other("vowels")` equals `Vowels`, as it would after a trip
/// through any store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LessonType {
    Consonants,
    Vowels,
    Vocabulary,
    AdvancedVocab,
    Sentences,
    Advanced,
    DailyLife,
    Other(String),
}

impl LessonType {
    pub fn as_str(&self) -> &str {
        match self {
            LessonType::Consonants => "consonants",
            LessonType::Vowels => "vowels",
            LessonType::Vocabulary => "vocabulary",
            LessonType::AdvancedVocab => "advancedVocab",
            LessonType::Sentences => "sentences",
            LessonType::Advanced => "advanced",
            LessonType::DailyLife => "dailylife",
            LessonType::Other(name) => name,
        }
    }

    /// Maps an `Other` holding a known name to its named variant.
    pub fn normalized(self) -> Self {
        match self {
            LessonType::Other(name) => LessonType::from(name.as_str()),
            known => known,
        }
    }
}

impl PartialEq for LessonType {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for LessonType {}

impl Hash for LessonType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for LessonType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LessonType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl From<&str> for LessonType {
    fn from(name: &str) -> Self {
        match name {
            "consonants" => LessonType::Consonants,
            "vowels" => LessonType::Vowels,
            "vocabulary" => LessonType::Vocabulary,
            "advancedVocab" => LessonType::AdvancedVocab,
            "sentences" => LessonType::Sentences,
            "advanced" => LessonType::Advanced,
            "dailylife" => LessonType::DailyLife,
            other => LessonType::Other(other.to_string()),
        }
    }
}

impl From<String> for LessonType {
    fn from(name: String) -> Self {
        LessonType::from(name.as_str())
    }
}

impl From<LessonType> for String {
    fn from(lesson_type: LessonType) -> Self {
        match lesson_type {
            LessonType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for LessonType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(LessonType::from(s))
    }
}

impl fmt::Display for LessonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique key of a review item within one learner's collection.
///
/// Ordering is level, then lesson type name, then item id; it is only used
/// as the final tie-break of the due set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemKey {
    pub level: u32,
    pub lesson_type: LessonType,
    pub item_id: String,
}

impl ItemKey {
    pub fn new(level: u32, lesson_type: impl Into<LessonType>, item_id: impl Into<String>) -> Self {
        let lesson_type: LessonType = lesson_type.into();
        Self {
            level,
            lesson_type: lesson_type.normalized(),
            item_id: item_id.into(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.lesson_type, self.item_id)
    }
}
