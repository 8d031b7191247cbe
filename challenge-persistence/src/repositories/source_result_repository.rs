use anyhow::Result;
use async_trait::async_trait;
use sea_orm::{ActiveValue, DatabaseConnection, EntityTrait};

use crate::entities::{prelude::*, source_results};
use crate::store::{SourceResultLookup, StoreError};
use challenge_types::SourceResult;

/// Game results submitted by the game UIs. Completions reference them by id.
pub struct SourceResultRepository {
    db: DatabaseConnection,
}

impl SourceResultRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_result(model: source_results::Model) -> Result<SourceResult, StoreError> {
        Ok(SourceResult {
            game_type: model
                .game_type
                .parse()
                .map_err(|e| StoreError::InvalidRecord(format!("result {}: {}", model.id, e)))?,
            id: model.id,
            user_id: model.user_id,
            score: model.score,
            completed_at: model.completed_at,
        })
    }

    pub async fn create(&self, result: SourceResult) -> Result<SourceResult> {
        let model = source_results::ActiveModel {
            id: ActiveValue::Set(result.id.clone()),
            user_id: ActiveValue::Set(result.user_id),
            game_type: ActiveValue::Set(result.game_type.to_string()),
            score: ActiveValue::Set(result.score),
            completed_at: ActiveValue::Set(result.completed_at),
        };
        SourceResults::insert(model).exec(&self.db).await?;
        Ok(result)
    }
}

#[async_trait]
impl SourceResultLookup for SourceResultRepository {
    async fn find_source_result(&self, id: &str) -> Result<Option<SourceResult>, StoreError> {
        SourceResults::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .map(Self::model_to_result)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_to_memory_database;
    use challenge_types::GameType;
    use migration::{Migrator, MigratorTrait};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_create_and_find_result() {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let repo = SourceResultRepository::new(db);

        let user_id = Uuid::new_v4();
        repo.create(SourceResult {
            id: "game-42".to_string(),
            user_id,
            game_type: GameType::Reaction,
            score: 312,
            completed_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

        let found = repo.find_source_result("game-42").await.unwrap().unwrap();
        assert_eq!(found.user_id, user_id);
        assert_eq!(found.game_type, GameType::Reaction);
        assert_eq!(found.score, 312);

        assert!(repo.find_source_result("missing").await.unwrap().is_none());
    }
}
