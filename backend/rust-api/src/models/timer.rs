use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::game::Outcome;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    SessionStarted(SessionStarted),
    TimerTick(TimerTick),
    TimeExpired(TimeExpired),
    AnswerResolved(AnswerResolved),
    QuestionAdvanced(QuestionAdvanced),
    SessionFinished(SessionFinished),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionStarted {
    pub session_id: String,
    pub balance: u32,
    pub time_remaining: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TimerTick {
    pub session_id: String,
    pub question_index: usize,
    pub remaining_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TimeExpired {
    pub session_id: String,
    pub question_index: usize,
    pub balance: u32,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AnswerResolved {
    pub session_id: String,
    pub question_index: usize,
    pub outcome: Outcome,
    pub balance: u32,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QuestionAdvanced {
    pub session_id: String,
    pub question_index: usize,
    pub time_remaining: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionFinished {
    pub session_id: String,
    pub final_balance: u32,
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::SessionStarted(_) => "session-started",
            SessionEvent::TimerTick(_) => "timer-tick",
            SessionEvent::TimeExpired(_) => "time-expired",
            SessionEvent::AnswerResolved(_) => "answer-resolved",
            SessionEvent::QuestionAdvanced(_) => "question-advanced",
            SessionEvent::SessionFinished(_) => "session-finished",
        }
    }
}
