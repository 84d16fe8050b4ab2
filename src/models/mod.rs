pub mod catalog;
pub mod content;
pub mod item_key;
pub mod lesson;
pub mod presented_item;
pub mod quality;
pub mod review_item;
pub mod sm2;
pub mod stats;

pub use catalog::Catalog;
pub use content::{Content, ContentError, ContentResolver};
pub use item_key::{ItemKey, LearnerId, LessonType};
pub use lesson::{Lesson, LessonEntry};
pub use presented_item::PresentedItem;
pub use quality::Quality;
pub use review_item::ReviewItem;
pub use sm2::SchedulingPolicy;
pub use stats::{Aggregates, LessonBreakdown, ReviewStats};
