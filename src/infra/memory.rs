//! In-process repositories for local development and tests.
//!
//! Selected when no database URL is configured. Contents are lost at process exit.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicI64, Ordering},
    },
};

use async_trait::async_trait;

use crate::application::repos::{
    CreateEpisodeParams, CreateSubmissionParams, EpisodesRepo, HealthRepo, RepoError,
    SubmissionsRepo,
};
use crate::cache::lock::mutex_lock;
use crate::domain::{
    entities::{EpisodeRecord, SubmissionRecord},
    keys::SubmissionKey,
};

const SOURCE: &str = "infra::memory";

#[derive(Default)]
pub struct InMemoryEpisodes {
    episodes: Mutex<Vec<EpisodeRecord>>,
    sequence: AtomicI64,
}

#[async_trait]
impl EpisodesRepo for InMemoryEpisodes {
    async fn list_episodes(&self) -> Result<Vec<EpisodeRecord>, RepoError> {
        let mut episodes = mutex_lock(&self.episodes, SOURCE, "list_episodes").clone();
        episodes.sort_by(|a, b| {
            b.episode_date
                .cmp(&a.episode_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(episodes)
    }

    async fn insert_episode(
        &self,
        params: CreateEpisodeParams,
    ) -> Result<EpisodeRecord, RepoError> {
        let mut episodes = mutex_lock(&self.episodes, SOURCE, "insert_episode");
        if episodes.iter().any(|episode| episode.id == params.id) {
            return Err(RepoError::Duplicate {
                constraint: "episodes_pkey".to_owned(),
            });
        }

        let record = EpisodeRecord {
            id: params.id,
            show: params.show,
            title: params.title,
            description: params.description,
            episode_url: params.episode_url,
            media_url: params.media_url,
            runtime_seconds: params.runtime_seconds,
            size_bytes: params.size_bytes,
            episode_date: params.episode_date,
            added_at: params.added_at,
        };
        episodes.push(record.clone());
        Ok(record)
    }

    async fn reserve_episode_ids(&self, count: u32) -> Result<Vec<i64>, RepoError> {
        let count = i64::from(count);
        let start = self.sequence.fetch_add(count, Ordering::SeqCst) + 1;
        Ok((start..start + count).collect())
    }
}

#[async_trait]
impl HealthRepo for InMemoryEpisodes {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySubmissions {
    submissions: Mutex<HashMap<SubmissionKey, SubmissionRecord>>,
}

#[async_trait]
impl SubmissionsRepo for InMemorySubmissions {
    async fn list_pending(&self) -> Result<Vec<SubmissionRecord>, RepoError> {
        let mut pending: Vec<_> = mutex_lock(&self.submissions, SOURCE, "list_pending")
            .values()
            .cloned()
            .collect();
        pending.sort_by_key(|submission| submission.submitted_at);
        Ok(pending)
    }

    async fn create_submission(
        &self,
        params: CreateSubmissionParams,
    ) -> Result<SubmissionRecord, RepoError> {
        let record = SubmissionRecord {
            key: SubmissionKey::new(),
            submission_url: params.submission_url,
            show: params.show,
            title: params.title,
            description: params.description,
            episode_date: params.episode_date,
            submitted_at: params.submitted_at,
        };
        mutex_lock(&self.submissions, SOURCE, "create_submission")
            .insert(record.key, record.clone());
        Ok(record)
    }

    async fn delete_submission(&self, key: SubmissionKey) -> Result<(), RepoError> {
        mutex_lock(&self.submissions, SOURCE, "delete_submission").remove(&key);
        Ok(())
    }

    async fn count_pending(&self) -> Result<u64, RepoError> {
        let count = mutex_lock(&self.submissions, SOURCE, "count_pending").len();
        u64::try_from(count).map_err(RepoError::from_persistence)
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime, macros::date};

    use super::*;

    fn params(id: i64, episode_date: time::Date) -> CreateEpisodeParams {
        CreateEpisodeParams {
            id,
            show: "Go Time".into(),
            title: format!("Ep{id}"),
            description: String::new(),
            episode_url: format!("https://example.com/ep{id}"),
            media_url: None,
            runtime_seconds: None,
            size_bytes: None,
            episode_date,
            added_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn episode_scan_is_newest_first() {
        let repo = InMemoryEpisodes::default();
        repo.insert_episode(params(1, date!(2024 - 03 - 01)))
            .await
            .expect("insert");
        repo.insert_episode(params(2, date!(2023 - 03 - 01)))
            .await
            .expect("insert");
        repo.insert_episode(params(3, date!(2024 - 03 - 01)))
            .await
            .expect("insert");

        let scan = repo.list_episodes().await.expect("scan");
        assert_eq!(scan.iter().map(|e| e.id).collect::<Vec<_>>(), vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn duplicate_episode_id_is_rejected() {
        let repo = InMemoryEpisodes::default();
        repo.insert_episode(params(1, date!(2024 - 03 - 01)))
            .await
            .expect("insert");
        assert!(matches!(
            repo.insert_episode(params(1, date!(2024 - 03 - 02))).await,
            Err(RepoError::Duplicate { .. })
        ));
    }

    #[tokio::test]
    async fn reservations_never_overlap() {
        let repo = InMemoryEpisodes::default();
        let first = repo.reserve_episode_ids(3).await.expect("ids");
        let second = repo.reserve_episode_ids(2).await.expect("ids");
        assert_eq!(first, vec![1, 2, 3]);
        assert_eq!(second, vec![4, 5]);
    }

    #[tokio::test]
    async fn pending_is_oldest_first_and_delete_is_idempotent() {
        let repo = InMemorySubmissions::default();
        let now = OffsetDateTime::now_utc();
        let newer = repo
            .create_submission(CreateSubmissionParams {
                submission_url: "https://example.com/new".into(),
                show: None,
                title: None,
                description: None,
                episode_date: None,
                submitted_at: now,
            })
            .await
            .expect("create");
        repo.create_submission(CreateSubmissionParams {
            submission_url: "https://example.com/old".into(),
            show: None,
            title: None,
            description: None,
            episode_date: None,
            submitted_at: now - Duration::minutes(5),
        })
        .await
        .expect("create");

        let pending = repo.list_pending().await.expect("pending");
        assert_eq!(pending[0].submission_url, "https://example.com/old");
        assert_eq!(pending[1].submission_url, "https://example.com/new");

        repo.delete_submission(newer.key).await.expect("delete");
        repo.delete_submission(newer.key).await.expect("delete again");
        assert_eq!(repo.count_pending().await.expect("count"), 1);
    }
}
