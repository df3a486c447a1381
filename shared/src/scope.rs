use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("progress update must target at least one of level, module, lesson or exercise")]
    Empty,
}

/// The tuple of identifiers a progress record is keyed by. Absent fields are
/// part of the key: two requests address the same record iff all four fields
/// match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub level_id: Option<String>,
    pub module_id: Option<String>,
    pub lesson_id: Option<String>,
    pub exercise_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeDepth {
    Level,
    Module,
    Lesson,
    Exercise,
}

impl ScopeKey {
    pub fn resolve(
        level_id: Option<String>,
        module_id: Option<String>,
        lesson_id: Option<String>,
        exercise_id: Option<String>,
    ) -> Result<Self, ScopeError> {
        let key = Self {
            level_id,
            module_id,
            lesson_id,
            exercise_id,
        };
        if key.level_id.is_none()
            && key.module_id.is_none()
            && key.lesson_id.is_none()
            && key.exercise_id.is_none()
        {
            return Err(ScopeError::Empty);
        }
        Ok(key)
    }

    /// Deepest identifier present, which decides the structural reward.
    pub fn deepest(&self) -> ScopeDepth {
        if self.exercise_id.is_some() {
            ScopeDepth::Exercise
        } else if self.lesson_id.is_some() {
            ScopeDepth::Lesson
        } else if self.module_id.is_some() {
            ScopeDepth::Module
        } else {
            ScopeDepth::Level
        }
    }
}
