pub mod clock;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod export;
pub mod models;
pub mod session;

pub use config::SchedulerConfig;
pub use engine::ReviewEngine;
pub use error::{ReviewError, StoreError};
pub use models::{ItemKey, LearnerId, LessonType, Quality, ReviewItem};
pub use session::{ReviewSession, SessionController};
