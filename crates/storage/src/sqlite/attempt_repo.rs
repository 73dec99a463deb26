use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portal_core::model::{QuestionNumber, UserHash};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{AttemptRecord, InductionAttemptRepository, StorageError};

use super::SqliteRepository;

fn questions_to_json(questions: &[QuestionNumber]) -> Result<String, StorageError> {
    let raw: Vec<u16> = questions.iter().map(|n| n.value()).collect();
    serde_json::to_string(&raw).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn questions_from_json(raw: &str) -> Result<Vec<QuestionNumber>, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn map_attempt_row(row: &SqliteRow) -> Result<AttemptRecord, StorageError> {
    let ser = |e: sqlx::Error| StorageError::Serialization(e.to_string());
    let user: String = row.try_get("user_hash").map_err(ser)?;
    let passed: i64 = row.try_get("passed").map_err(ser)?;
    let attempted: String = row.try_get("attempted_questions").map_err(ser)?;
    let incorrect: String = row.try_get("incorrect_questions").map_err(ser)?;
    let recorded_at: DateTime<Utc> = row.try_get("recorded_at").map_err(ser)?;

    Ok(AttemptRecord {
        user: UserHash::from_digest(user),
        passed: passed != 0,
        attempted_questions: questions_from_json(&attempted)?,
        incorrect_questions: questions_from_json(&incorrect)?,
        recorded_at,
    })
}

#[async_trait]
impl InductionAttemptRepository for SqliteRepository {
    async fn append_attempt(&self, record: &AttemptRecord) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO induction_attempts (
                    user_hash, passed, attempted_questions, incorrect_questions, recorded_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(record.user.as_str())
        .bind(i64::from(record.passed))
        .bind(questions_to_json(&record.attempted_questions)?)
        .bind(questions_to_json(&record.incorrect_questions)?)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.last_insert_rowid())
    }

    async fn attempts_for_user(&self, user: &UserHash) -> Result<Vec<AttemptRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT user_hash, passed, attempted_questions, incorrect_questions, recorded_at
                FROM induction_attempts
                WHERE user_hash = ?1
                ORDER BY id ASC
            ",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_attempt_row).collect()
    }
}
