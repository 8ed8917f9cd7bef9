use async_trait::async_trait;
use time::{Date, OffsetDateTime};

use crate::{
    application::repos::{CreateEpisodeParams, EpisodesRepo, RepoError},
    domain::entities::EpisodeRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct EpisodeRow {
    id: i64,
    show: String,
    title: String,
    description: String,
    episode_url: String,
    media_url: Option<String>,
    runtime_seconds: Option<i32>,
    size_bytes: Option<i64>,
    episode_date: Date,
    added_at: OffsetDateTime,
}

impl From<EpisodeRow> for EpisodeRecord {
    fn from(row: EpisodeRow) -> Self {
        Self {
            id: row.id,
            show: row.show,
            title: row.title,
            description: row.description,
            episode_url: row.episode_url,
            media_url: row.media_url,
            runtime_seconds: row.runtime_seconds,
            size_bytes: row.size_bytes,
            episode_date: row.episode_date,
            added_at: row.added_at,
        }
    }
}

#[async_trait]
impl EpisodesRepo for PostgresRepositories {
    async fn list_episodes(&self) -> Result<Vec<EpisodeRecord>, RepoError> {
        let rows = sqlx::query_as::<_, EpisodeRow>(
            r#"
            SELECT id, show, title, description, episode_url, media_url,
                   runtime_seconds, size_bytes, episode_date, added_at
            FROM episodes
            ORDER BY episode_date DESC, id DESC
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(EpisodeRecord::from).collect())
    }

    async fn insert_episode(
        &self,
        params: CreateEpisodeParams,
    ) -> Result<EpisodeRecord, RepoError> {
        let row = sqlx::query_as::<_, EpisodeRow>(
            r#"
            INSERT INTO episodes (
                id, show, title, description, episode_url, media_url,
                runtime_seconds, size_bytes, episode_date, added_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, show, title, description, episode_url, media_url,
                      runtime_seconds, size_bytes, episode_date, added_at
            "#,
        )
        .bind(params.id)
        .bind(params.show)
        .bind(params.title)
        .bind(params.description)
        .bind(params.episode_url)
        .bind(params.media_url)
        .bind(params.runtime_seconds)
        .bind(params.size_bytes)
        .bind(params.episode_date)
        .bind(params.added_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(EpisodeRecord::from(row))
    }

    async fn reserve_episode_ids(&self, count: u32) -> Result<Vec<i64>, RepoError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT nextval('episode_id_seq') FROM generate_series(1, $1) ORDER BY 1",
        )
        .bind(i64::from(count))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
