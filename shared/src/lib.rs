use serde::{Deserialize, Serialize};

mod achievement;
mod progress;
mod scope;
mod session;
mod stats;
mod streak;
mod xp;

pub use achievement::*;
pub use progress::*;
pub use scope::*;
pub use session::*;
pub use stats::*;
pub use streak::*;
pub use xp::*;

pub type UserId = String;

/// Read-only view of the learner supplied by the identity boundary.
/// The progress engine only writes back through its own XP/streak credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub level: String,
    pub total_xp: u32,
    pub streak: u32,
    pub last_active: Option<chrono::NaiveDateTime>,
}
