use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    Collection, Database,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::metrics::track_store_operation;
use crate::models::game::GiftType;
use crate::models::game_result::{GameResult, NewGameResult};
use crate::utils::time::bson_datetime_as_chrono;

const COLLECTION: &str = "game_results";

/// Persistence for completed game results.
///
/// Implementations assign the id and completion timestamp; input is expected
/// to be validated already.
#[async_trait]
pub trait ResultsStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn create(&self, new: NewGameResult) -> Result<GameResult>;

    /// All stored results, oldest first.
    async fn list(&self) -> Result<Vec<GameResult>>;

    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryResultsStore {
    results: RwLock<Vec<GameResult>>,
}

impl MemoryResultsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultsStore for MemoryResultsStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, new: NewGameResult) -> Result<GameResult> {
        track_store_operation("create", self.backend(), async {
            let result = GameResult::new(Uuid::new_v4().to_string(), new, Utc::now());
            self.results.write().await.push(result.clone());
            Ok(result)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<GameResult>> {
        track_store_operation("list", self.backend(), async {
            Ok(self.results.read().await.clone())
        })
        .await
    }
}

/// Stored shape of a result; timestamps are native BSON dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GameResultDocument {
    #[serde(rename = "_id")]
    id: String,
    player_name: String,
    final_balance: i64,
    gift_type: GiftType,
    gift_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    player_email: Option<String>,
    #[serde(with = "bson_datetime_as_chrono")]
    completed_at: DateTime<Utc>,
}

impl From<&GameResult> for GameResultDocument {
    fn from(result: &GameResult) -> Self {
        Self {
            id: result.id.clone(),
            player_name: result.player_name.clone(),
            final_balance: result.final_balance,
            gift_type: result.gift_type,
            gift_address: result.gift_address.clone(),
            player_email: result.player_email.clone(),
            completed_at: result.completed_at,
        }
    }
}

impl From<GameResultDocument> for GameResult {
    fn from(document: GameResultDocument) -> Self {
        Self {
            id: document.id,
            player_name: document.player_name,
            final_balance: document.final_balance,
            gift_type: document.gift_type,
            gift_address: document.gift_address,
            player_email: document.player_email,
            completed_at: document.completed_at,
        }
    }
}

pub struct MongoResultsStore {
    mongo: Database,
}

impl MongoResultsStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn collection(&self) -> Collection<GameResultDocument> {
        self.mongo.collection(COLLECTION)
    }
}

#[async_trait]
impl ResultsStore for MongoResultsStore {
    fn backend(&self) -> &'static str {
        "mongo"
    }

    async fn create(&self, new: NewGameResult) -> Result<GameResult> {
        let result = GameResult::new(Uuid::new_v4().to_string(), new, Utc::now());
        let document = GameResultDocument::from(&result);

        track_store_operation("create", self.backend(), async {
            self.collection()
                .insert_one(&document)
                .await
                .context("Failed to insert game result")?;
            Ok(())
        })
        .await?;

        tracing::debug!(result_id = %result.id, "Stored game result in MongoDB");
        Ok(result)
    }

    async fn list(&self) -> Result<Vec<GameResult>> {
        track_store_operation("list", self.backend(), async {
            let cursor = self
                .collection()
                .find(doc! {})
                .sort(doc! { "completed_at": 1, "_id": 1 })
                .await
                .context("Failed to query game results")?;

            let documents: Vec<GameResultDocument> = cursor
                .try_collect()
                .await
                .context("Failed to read game results cursor")?;

            Ok(documents.into_iter().map(GameResult::from).collect())
        })
        .await
    }

    async fn health(&self) -> Result<()> {
        self.mongo
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_: Document| ())
            .context("MongoDB ping failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(name: &str) -> NewGameResult {
        NewGameResult {
            player_name: name.to_string(),
            final_balance: 42,
            gift_type: GiftType::Amazon,
            gift_address: "dave@example.com".to_string(),
            player_email: Some("dave@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn memory_store_assigns_id_and_keeps_insertion_order() {
        let store = MemoryResultsStore::new();
        let first = store.create(submission("first")).await.unwrap();
        let second = store.create(submission("second")).await.unwrap();

        assert_ne!(first.id, second.id);
        assert!(Uuid::parse_str(&first.id).is_ok());

        let listed = store.list().await.unwrap();
        let names: Vec<_> = listed.iter().map(|r| r.player_name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(listed[0], first);
    }

    #[tokio::test]
    async fn memory_store_is_healthy() {
        let store = MemoryResultsStore::new();
        assert!(store.health().await.is_ok());
        assert_eq!(store.backend(), "memory");
    }

    #[test]
    fn document_uses_snake_case_and_bson_date() {
        let result = GameResult::new("abc".to_string(), submission("Dave"), Utc::now());
        let document = mongodb::bson::to_document(&GameResultDocument::from(&result)).unwrap();

        assert_eq!(document.get_str("_id").unwrap(), "abc");
        assert_eq!(document.get_str("gift_type").unwrap(), "amazon");
        assert!(document.get_datetime("completed_at").is_ok());
    }
}
