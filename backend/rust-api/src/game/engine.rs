//! Game session engine.
//!
//! Owns the authoritative [`SessionState`] of one play-through and applies
//! commands synchronously. Commands whose phase or resolution preconditions
//! are not met leave the state untouched and report `false`; only
//! [`GameEngine::build_summary`] returns an error. Timers and delayed
//! transitions are the caller's job, see [`crate::game::driver`].

use std::sync::Arc;

use thiserror::Error;

use crate::models::{
    GameConfig, Outcome, Question, QuestionBank, QuestionView, RewardChoice, Screen,
    SessionCommand, SessionState, SessionSummary,
};

/// Options left visible after the second hint purchase.
const FIFTY_FIFTY_OPTIONS: usize = 2;
const MAX_HINTS: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Session is {actual:?}, expected {expected:?}")]
    InvalidPhase { expected: Screen, actual: Screen },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing, or the question is already resolved.
    Ignored,
    Counting,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct GameEngine {
    config: GameConfig,
    bank: Arc<QuestionBank>,
    state: SessionState,
}

impl GameEngine {
    pub fn new(config: GameConfig, bank: Arc<QuestionBank>) -> Self {
        Self {
            state: SessionState::welcome(&config),
            config,
            bank,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn question_count(&self) -> usize {
        self.bank.len()
    }

    pub fn current_question(&self) -> Option<&Question> {
        if self.state.screen != Screen::Playing {
            return None;
        }
        self.bank.get(self.state.question_index)
    }

    pub fn question_view(&self) -> Option<QuestionView> {
        self.current_question().map(|question| QuestionView {
            id: question.id,
            text: question.text.clone(),
            revealed_options: self.state.revealed_options.clone(),
            textual_hint: self
                .state
                .easy_hint_used
                .then(|| question.textual_hint.clone()),
        })
    }

    fn accepting_input(&self) -> bool {
        self.state.screen == Screen::Playing && !self.state.is_resolved()
    }

    fn deduct(&mut self, amount: u32) {
        self.state.balance = self.state.balance.saturating_sub(amount);
    }

    /// Begins a fresh play-through, discarding whatever came before.
    pub fn start(&mut self, config: GameConfig) {
        self.config = config;
        self.state = SessionState {
            screen: Screen::Playing,
            ..SessionState::welcome(&config)
        };
    }

    pub fn restart(&mut self) {
        self.start(self.config);
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.accepting_input() {
            return TickOutcome::Ignored;
        }

        self.state.time_remaining = self.state.time_remaining.saturating_sub(1);
        if self.state.time_remaining > 0 {
            return TickOutcome::Counting;
        }

        let penalty = self.config.timeout_penalty;
        self.deduct(penalty);
        self.state.last_outcome = Outcome::Incorrect;
        self.state.last_message = format!("Time is up! Minus {}", penalty);
        TickOutcome::TimedOut
    }

    pub fn request_hint(&mut self) -> bool {
        if !self.accepting_input() || self.state.hints_used >= MAX_HINTS {
            return false;
        }
        let Some(options) = self
            .current_question()
            .map(|q| q.multiple_choice_options.clone())
        else {
            return false;
        };

        let cost = self.config.hint_cost;
        self.deduct(cost);
        if self.state.hints_used == 0 {
            self.state.revealed_options = options;
            self.state.last_message = format!("Hint used. Minus {}", cost);
        } else {
            // Keeps the first two authored options, whichever holds the answer.
            self.state.revealed_options = options.into_iter().take(FIFTY_FIFTY_OPTIONS).collect();
            self.state.last_message = format!("Extra hint used. Minus {}", cost);
        }
        self.state.hints_used += 1;
        true
    }

    pub fn request_time_boost(&mut self) -> bool {
        if !self.accepting_input() || self.state.time_boost_used {
            return false;
        }

        let cost = self.config.time_boost_cost;
        self.deduct(cost);
        self.state.time_remaining += self.config.time_boost_seconds;
        self.state.time_boost_used = true;
        self.state.last_message = format!("Time boost! Minus {}", cost);
        true
    }

    pub fn request_easy_hint(&mut self) -> bool {
        if !self.accepting_input() || self.state.easy_hint_used {
            return false;
        }

        let cost = self.config.easy_hint_cost;
        self.deduct(cost);
        self.state.easy_hint_used = true;
        self.state.last_message = format!("Textual hint revealed. Minus {}", cost);
        true
    }

    pub fn set_pending_answer(&mut self, text: impl Into<String>) -> bool {
        if self.state.screen != Screen::Playing {
            return false;
        }
        self.state.pending_answer = text.into();
        true
    }

    pub fn submit_answer(&mut self) -> bool {
        if !self.accepting_input() || self.state.pending_answer.trim().is_empty() {
            return false;
        }
        let Some(correct) = self
            .current_question()
            .map(|q| q.accepts(&self.state.pending_answer))
        else {
            return false;
        };

        if correct {
            self.state.last_outcome = Outcome::Correct;
            self.state.last_message = "Correct! No change".to_string();
        } else {
            let penalty = self.config.wrong_answer_penalty;
            self.deduct(penalty);
            self.state.last_outcome = Outcome::Incorrect;
            self.state.last_message = format!("Incorrect. Minus {}", penalty);
        }
        true
    }

    pub fn advance_question(&mut self) -> bool {
        if self.state.screen != Screen::Playing {
            return false;
        }
        if !self.state.is_resolved() && self.state.time_remaining > 0 {
            return false;
        }

        let next = self.state.question_index + 1;
        if next >= self.bank.len() {
            self.state.screen = Screen::Finished;
            return true;
        }

        let balance = self.state.balance;
        self.state = SessionState {
            screen: Screen::Playing,
            question_index: next,
            balance,
            ..SessionState::welcome(&self.config)
        };
        true
    }

    pub fn build_summary(&self, choice: RewardChoice) -> Result<SessionSummary, EngineError> {
        if self.state.screen != Screen::Finished {
            return Err(EngineError::InvalidPhase {
                expected: Screen::Finished,
                actual: self.state.screen,
            });
        }

        Ok(SessionSummary {
            final_balance: self.state.balance,
            reward_kind: choice.kind,
            reward_contact: choice.contact,
            note: choice.note.filter(|note| !note.trim().is_empty()),
        })
    }

    /// Applies a client command. `Start` restarts with the current config.
    pub fn apply(&mut self, command: &SessionCommand) -> bool {
        match command {
            SessionCommand::Start => {
                self.restart();
                true
            }
            SessionCommand::SetPendingAnswer { text } => self.set_pending_answer(text.as_str()),
            SessionCommand::SubmitAnswer => self.submit_answer(),
            SessionCommand::RequestHint => self.request_hint(),
            SessionCommand::RequestTimeBoost => self.request_time_boost(),
            SessionCommand::RequestEasyHint => self.request_easy_hint(),
            SessionCommand::AdvanceQuestion => self.advance_question(),
        }
    }
}
