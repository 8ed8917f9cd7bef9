use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    application::repos::{CreateSubmissionParams, RepoError, SubmissionsRepo},
    domain::{entities::SubmissionRecord, keys::SubmissionKey},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: Uuid,
    submission_url: String,
    show: Option<String>,
    title: Option<String>,
    description: Option<String>,
    episode_date: Option<Date>,
    submitted_at: OffsetDateTime,
}

impl From<SubmissionRow> for SubmissionRecord {
    fn from(row: SubmissionRow) -> Self {
        Self {
            key: SubmissionKey::from_uuid(row.id),
            submission_url: row.submission_url,
            show: row.show,
            title: row.title,
            description: row.description,
            episode_date: row.episode_date,
            submitted_at: row.submitted_at,
        }
    }
}

#[async_trait]
impl SubmissionsRepo for PostgresRepositories {
    async fn list_pending(&self) -> Result<Vec<SubmissionRecord>, RepoError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT id, submission_url, show, title, description, episode_date, submitted_at
            FROM submissions
            ORDER BY submitted_at ASC, id ASC
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(SubmissionRecord::from).collect())
    }

    async fn create_submission(
        &self,
        params: CreateSubmissionParams,
    ) -> Result<SubmissionRecord, RepoError> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            INSERT INTO submissions (
                id, submission_url, show, title, description, episode_date, submitted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, submission_url, show, title, description, episode_date, submitted_at
            "#,
        )
        .bind(SubmissionKey::new().as_uuid())
        .bind(params.submission_url)
        .bind(params.show)
        .bind(params.title)
        .bind(params.description)
        .bind(params.episode_date)
        .bind(params.submitted_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(SubmissionRecord::from(row))
    }

    async fn delete_submission(&self, key: SubmissionKey) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM submissions WHERE id = $1")
            .bind(key.as_uuid())
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }

    async fn count_pending(&self) -> Result<u64, RepoError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM submissions")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }
}
