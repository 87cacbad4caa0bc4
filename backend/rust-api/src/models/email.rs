use serde::{Deserialize, Serialize};

/// SMTP account used by the results notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSettings {
    pub server: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    #[serde(default)]
    pub use_tls: bool,
}

/// Shape returned by the credential connector endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorCredentialsResponse {
    pub settings: EmailSettings,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// What the notifier needs to describe one stored result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultNotification {
    pub player_name: String,
    pub final_balance: i64,
    pub gift_type: super::game::GiftType,
    pub player_email: Option<String>,
}

impl From<&super::game_result::GameResult> for ResultNotification {
    fn from(result: &super::game_result::GameResult) -> Self {
        Self {
            player_name: result.player_name.clone(),
            final_balance: result.final_balance,
            gift_type: result.gift_type,
            player_email: result.player_email.clone(),
        }
    }
}
