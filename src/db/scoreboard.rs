//! Dice 100 scoreboard.
//!
//! The `rm_game` table holds one row per submitted game. Submission rules
//! (members only, finished games only) are enforced by the site before a
//! score reaches [`Database::save_score`].

use super::Database;
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScoreEntry {
    pub acronym: String,
    pub name: String,
    pub points: i32,
}

impl Database {
    /// Best `limit` scores, highest first. Ties keep submission order.
    pub async fn top_scores(&self, limit: i64) -> Result<Vec<ScoreEntry>> {
        let rows = sqlx::query_as::<_, ScoreEntry>(
            "SELECT acronym, name, points FROM rm_game
             ORDER BY points DESC, id ASC
             LIMIT $1",
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn save_score(&self, entry: &ScoreEntry) -> Result<()> {
        sqlx::query("INSERT INTO rm_game (acronym, name, points) VALUES ($1, $2, $3)")
            .bind(&entry.acronym)
            .bind(&entry.name)
            .bind(entry.points)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Display name for a member acronym, if the account exists.
    pub async fn user_name(&self, acronym: &str) -> Result<Option<String>> {
        let name = sqlx::query_scalar::<_, String>(
            "SELECT COALESCE(name, acronym) FROM rm_user WHERE acronym = $1",
        )
        .bind(acronym)
        .fetch_optional(&self.pool)
        .await?;
        Ok(name)
    }
}
