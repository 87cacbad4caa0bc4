use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::game::{GiftType, SessionSummary};

/// Body of `POST /api/game-results`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewGameResult {
    #[validate(length(
        min = 1,
        max = 100,
        message = "playerName must be between 1 and 100 characters"
    ))]
    pub player_name: String,

    #[validate(range(min = 0, message = "finalBalance must not be negative"))]
    pub final_balance: i64,

    pub gift_type: GiftType,

    #[validate(length(
        min = 1,
        max = 500,
        message = "giftAddress must be between 1 and 500 characters"
    ))]
    pub gift_address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "playerEmail must be a valid email address"))]
    pub player_email: Option<String>,
}

impl NewGameResult {
    /// Crypto payouts carry the wallet address; card payouts carry the email,
    /// which is also copied on the notification.
    pub fn from_summary(player_name: &str, summary: &SessionSummary) -> Self {
        let contact = summary.reward_contact.trim();
        let gift_address = match summary.note.as_deref().map(str::trim) {
            Some(note) if !note.is_empty() => format!("{} | Note: {}", contact, note),
            _ => contact.to_string(),
        };
        let player_email = match summary.reward_kind {
            GiftType::Crypto => None,
            _ => Some(contact.to_string()),
        };

        Self {
            player_name: player_name.to_string(),
            final_balance: i64::from(summary.final_balance),
            gift_type: summary.reward_kind,
            gift_address,
            player_email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    pub id: String,
    pub player_name: String,
    pub final_balance: i64,
    pub gift_type: GiftType,
    pub gift_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_email: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl GameResult {
    pub fn new(id: String, new: NewGameResult, completed_at: DateTime<Utc>) -> Self {
        Self {
            id,
            player_name: new.player_name,
            final_balance: new.final_balance,
            gift_type: new.gift_type,
            gift_address: new.gift_address,
            player_email: new.player_email,
            completed_at,
        }
    }
}
