pub mod email;
pub mod game;
pub mod game_result;
pub mod question;
pub mod timer;

pub use game::{
    GameConfig, GiftType, Outcome, QuestionView, RewardChoice, Screen, SessionCommand,
    SessionState, SessionSummary, SessionView,
};
pub use game_result::{GameResult, NewGameResult};
pub use question::{Question, QuestionBank};
