use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::xp;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is already closed")]
    Closed,
}

/// One graded answer submission. Immutable once recorded; session XP is a
/// fold over these in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseResponse {
    pub exercise_id: String,
    pub answer: String,
    pub is_correct: bool,
    pub time_spent: u32,
    pub hints_used: u32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub xp_earned: u32,
    pub exercises_completed: u32,
    pub correct: u32,
    pub duration_secs: u64,
}

impl SessionSummary {
    pub const fn is_perfect(&self) -> bool {
        self.exercises_completed > 0 && self.correct == self.exercises_completed
    }
}

/// Bounded window of answering activity. OPEN while accepting responses,
/// CLOSED once finalized; a session is never reopened or resumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningSession {
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    responses: Vec<ExerciseResponse>,
    summary: Option<SessionSummary>,
}

impl LearningSession {
    pub fn start(now: NaiveDateTime) -> Self {
        Self {
            started_at: now,
            ended_at: None,
            responses: Vec::new(),
            summary: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn responses(&self) -> &[ExerciseResponse] {
        &self.responses
    }

    pub fn record(&mut self, response: ExerciseResponse) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        self.responses.push(response);
        Ok(())
    }

    /// Finalizes the session: stamps the end time and computes XP once over
    /// the full response list. Closing an already-closed session returns the
    /// stored summary without recomputing.
    pub fn close(&mut self, now: NaiveDateTime) -> SessionSummary {
        if let Some(summary) = self.summary {
            return summary;
        }
        let summary = SessionSummary {
            xp_earned: xp::session_xp(&self.responses),
            exercises_completed: self.responses.len() as u32,
            correct: self.responses.iter().filter(|r| r.is_correct).count() as u32,
            duration_secs: (now - self.started_at).num_seconds().max(0) as u64,
        };
        self.ended_at = Some(now);
        self.summary = Some(summary);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> NaiveDateTime {
        chrono::DateTime::from_timestamp(1_724_544_000 + secs, 0)
            .unwrap()
            .naive_utc()
    }

    fn correct_response(time_spent: u32) -> ExerciseResponse {
        ExerciseResponse {
            exercise_id: "ex-1".to_string(),
            answer: "stand-up".to_string(),
            is_correct: true,
            time_spent,
            hints_used: 0,
            created_at: at(0),
        }
    }

    #[test]
    fn close_computes_xp_over_recorded_responses() {
        let mut session = LearningSession::start(at(0));
        session.record(correct_response(5)).unwrap();
        session.record(correct_response(90)).unwrap();

        let summary = session.close(at(120));
        assert_eq!(summary.xp_earned, 75 + 20);
        assert_eq!(summary.exercises_completed, 2);
        assert_eq!(summary.correct, 2);
        assert_eq!(summary.duration_secs, 120);
        assert!(session.is_closed());
    }

    #[test]
    fn close_is_idempotent() {
        let mut session = LearningSession::start(at(0));
        session.record(correct_response(5)).unwrap();

        let first = session.close(at(60));
        let second = session.close(at(3600));
        assert_eq!(first, second);
        assert_eq!(session.ended_at, Some(at(60)));
    }

    #[test]
    fn closed_session_rejects_responses() {
        let mut session = LearningSession::start(at(0));
        session.close(at(10));
        assert_eq!(
            session.record(correct_response(5)),
            Err(SessionError::Closed)
        );
    }

    #[test]
    fn perfect_session_requires_at_least_one_response() {
        let mut empty = LearningSession::start(at(0));
        assert!(!empty.close(at(1)).is_perfect());

        let mut session = LearningSession::start(at(0));
        session.record(correct_response(5)).unwrap();
        assert!(session.close(at(10)).is_perfect());

        let mut session = LearningSession::start(at(0));
        let mut wrong = correct_response(5);
        wrong.is_correct = false;
        session.record(wrong).unwrap();
        assert!(!session.close(at(10)).is_perfect());
    }
}
