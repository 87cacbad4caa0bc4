use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use validator::Validate;

use crate::metrics::{GAME_RESULTS_TOTAL, NOTIFICATIONS_TOTAL};
use crate::models::email::ResultNotification;
use crate::models::game_result::{GameResult, NewGameResult};
use crate::services::email_service::Notifier;
use crate::services::results_store::ResultsStore;

#[derive(Debug, Error)]
pub enum GameResultError {
    #[error("{0}")]
    Validation(String),
    #[error("Failed to store game result")]
    Storage(#[source] anyhow::Error),
}

#[derive(Clone)]
pub struct GameResultService {
    store: Arc<dyn ResultsStore>,
    notifier: Arc<dyn Notifier>,
}

impl GameResultService {
    pub fn new(store: Arc<dyn ResultsStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Validates and stores a result, then notifies in the background.
    pub async fn create(&self, new: NewGameResult) -> Result<GameResult, GameResultError> {
        if let Err(errors) = new.validate() {
            GAME_RESULTS_TOTAL.with_label_values(&["invalid"]).inc();
            return Err(GameResultError::Validation(format_validation_errors(
                &errors,
            )));
        }

        let result = self.store.create(new).await.map_err(|err| {
            GAME_RESULTS_TOTAL.with_label_values(&["error"]).inc();
            tracing::error!(error = ?err, backend = self.store.backend(), "Failed to store game result");
            GameResultError::Storage(err)
        })?;

        GAME_RESULTS_TOTAL.with_label_values(&["created"]).inc();
        tracing::info!(
            result_id = %result.id,
            final_balance = result.final_balance,
            gift_type = result.gift_type.as_str(),
            "Game result stored"
        );

        self.spawn_notification(&result);
        Ok(result)
    }

    pub async fn list(&self) -> Result<Vec<GameResult>, GameResultError> {
        self.store.list().await.map_err(|err| {
            tracing::error!(error = ?err, "Failed to list game results");
            GameResultError::Storage(err)
        })
    }

    pub async fn health(&self) -> anyhow::Result<()> {
        self.store.health().await
    }

    /// Failures are logged and counted, never retried.
    fn spawn_notification(&self, result: &GameResult) -> JoinHandle<()> {
        let notifier = self.notifier.clone();
        let notification = ResultNotification::from(result);
        let result_id = result.id.clone();

        tokio::spawn(async move {
            match notifier.notify(&notification).await {
                Ok(()) => {
                    NOTIFICATIONS_TOTAL.with_label_values(&["sent"]).inc();
                }
                Err(err) => {
                    NOTIFICATIONS_TOTAL.with_label_values(&["failed"]).inc();
                    tracing::warn!(
                        result_id = %result_id,
                        error = ?err,
                        "Failed to send results notification"
                    );
                }
            }
        })
    }
}

fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            field_errors.iter().map(move |error| {
                error
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game::GiftType;
    use crate::services::results_store::MemoryResultsStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<ResultNotification>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: &ResultNotification) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(notification.clone());
            if self.fail {
                Err(anyhow!("smtp down"))
            } else {
                Ok(())
            }
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl ResultsStore for BrokenStore {
        fn backend(&self) -> &'static str {
            "broken"
        }

        async fn create(&self, _new: NewGameResult) -> anyhow::Result<GameResult> {
            Err(anyhow!("disk full"))
        }

        async fn list(&self) -> anyhow::Result<Vec<GameResult>> {
            Err(anyhow!("disk full"))
        }
    }

    fn valid() -> NewGameResult {
        NewGameResult {
            player_name: "Dave".to_string(),
            final_balance: 55,
            gift_type: GiftType::Gas,
            gift_address: "dave@example.com".to_string(),
            player_email: Some("dave@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn create_stores_and_notifies() {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = GameResultService::new(Arc::new(MemoryResultsStore::new()), notifier.clone());

        let result = service.create(valid()).await.unwrap();
        for _ in 0..10 {
            if !notifier.seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }

        let seen = notifier.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].player_name, "Dave");
        assert_eq!(seen[0].player_email.as_deref(), Some("dave@example.com"));
        assert_eq!(service.list().await.unwrap(), vec![result]);
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_creation() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let service = GameResultService::new(Arc::new(MemoryResultsStore::new()), notifier);

        let result = service.create(valid()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn invalid_submission_is_rejected_before_storage() {
        let service = GameResultService::new(
            Arc::new(MemoryResultsStore::new()),
            Arc::new(RecordingNotifier::default()),
        );

        let mut bad = valid();
        bad.player_name = String::new();
        bad.final_balance = -1;

        match service.create(bad).await {
            Err(GameResultError::Validation(message)) => {
                assert!(message.contains("playerName"));
                assert!(message.contains("finalBalance"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_skips_notification() {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = GameResultService::new(Arc::new(BrokenStore), notifier.clone());

        assert!(matches!(
            service.create(valid()).await,
            Err(GameResultError::Storage(_))
        ));
        tokio::task::yield_now().await;
        assert!(notifier.seen.lock().unwrap().is_empty());
    }
}
