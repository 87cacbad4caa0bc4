use serde::{Deserialize, Serialize};

/// Economy and timer constants, fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub starting_balance: u32,
    pub starting_time: u32,
    pub hint_cost: u32,
    pub easy_hint_cost: u32,
    pub time_boost_cost: u32,
    pub time_boost_seconds: u32,
    pub wrong_answer_penalty: u32,
    pub timeout_penalty: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting_balance: 100,
            starting_time: 40,
            hint_cost: 3,
            easy_hint_cost: 2,
            time_boost_cost: 1,
            time_boost_seconds: 5,
            wrong_answer_penalty: 10,
            timeout_penalty: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Welcome,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Unknown,
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub screen: Screen,
    pub question_index: usize,
    pub balance: u32,
    pub time_remaining: u32,
    pub hints_used: u8,
    pub time_boost_used: bool,
    pub easy_hint_used: bool,
    pub pending_answer: String,
    pub revealed_options: Vec<String>,
    pub last_outcome: Outcome,
    pub last_message: String,
}

impl SessionState {
    pub fn welcome(config: &GameConfig) -> Self {
        Self {
            screen: Screen::Welcome,
            question_index: 0,
            balance: config.starting_balance,
            time_remaining: config.starting_time,
            hints_used: 0,
            time_boost_used: false,
            easy_hint_used: false,
            pending_answer: String::new(),
            revealed_options: Vec::new(),
            last_outcome: Outcome::Unknown,
            last_message: String::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.last_outcome != Outcome::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GiftType {
    Crypto,
    Amazon,
    Playstation,
    Gas,
}

impl GiftType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GiftType::Crypto => "crypto",
            GiftType::Amazon => "amazon",
            GiftType::Playstation => "playstation",
            GiftType::Gas => "gas",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GiftType::Crypto => "Crypto transfer",
            GiftType::Amazon => "Amazon gift card",
            GiftType::Playstation => "PlayStation gift card",
            GiftType::Gas => "Gas card",
        }
    }
}

/// Delivery method picked on the end screen. `contact` is a wallet address
/// for crypto and an email address for every card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardChoice {
    pub kind: GiftType,
    pub contact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub final_balance: u32,
    pub reward_kind: GiftType,
    pub reward_contact: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionCommand {
    Start,
    SetPendingAnswer { text: String },
    SubmitAnswer,
    RequestHint,
    RequestTimeBoost,
    RequestEasyHint,
    AdvanceQuestion,
}

impl SessionCommand {
    pub fn name(&self) -> &'static str {
        match self {
            SessionCommand::Start => "start",
            SessionCommand::SetPendingAnswer { .. } => "set_pending_answer",
            SessionCommand::SubmitAnswer => "submit_answer",
            SessionCommand::RequestHint => "request_hint",
            SessionCommand::RequestTimeBoost => "request_time_boost",
            SessionCommand::RequestEasyHint => "request_easy_hint",
            SessionCommand::AdvanceQuestion => "advance_question",
        }
    }
}

/// What a client may see of the current question. Accepted answers stay hidden.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: u32,
    pub text: String,
    pub revealed_options: Vec<String>,
    pub textual_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub question_count: usize,
    pub question: Option<QuestionView>,
    #[serde(flatten)]
    pub state: SessionState,
}
