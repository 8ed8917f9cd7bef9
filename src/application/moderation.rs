//! Submission intake and the moderation queue.
//!
//! A submission moves `submitted -> promoted` or `submitted -> rejected` exactly once. Intake
//! runs the abuse gate before anything is cleaned or stored; promotion writes the episode,
//! consumes the submission and invalidates the catalog cache, in that order.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::application::{
    catalog::CatalogService,
    gate::{AbuseGate, GateError, GateVerdict},
    ids::EpisodeIdAllocator,
    repos::{
        CreateEpisodeParams, CreateSubmissionParams, EpisodesRepo, RepoError, SubmissionsRepo,
    },
    sanitize::{TextSanitizer, normalize_url},
};
use crate::domain::{
    dates::parse_episode_date,
    entities::{EpisodeRecord, SubmissionRecord},
    error::DomainError,
    keys::{KeyDecodeError, SubmissionKey},
};

const SOURCE: &str = "application::moderation";

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("submission rejected by verification")]
    GateRejected { reasons: Vec<String> },
    #[error(transparent)]
    GateUnavailable(#[from] GateError),
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Decode(#[from] KeyDecodeError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Public intake payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionInput {
    /// Current intake: the episode URL alone.
    UrlOnly { url: String },
    /// Legacy intake with full metadata; `date` is required in this shape.
    Full {
        url: String,
        show: String,
        title: String,
        description: String,
        date: String,
    },
}

impl SubmissionInput {
    pub fn url(&self) -> &str {
        match self {
            Self::UrlOnly { url } | Self::Full { url, .. } => url,
        }
    }
}

/// Fields of an episode as entered by a moderator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeFields {
    pub show: String,
    pub title: String,
    pub description: String,
    pub episode_url: String,
    pub media_url: Option<String>,
    pub runtime: Option<String>,
    pub size: Option<String>,
    pub date: String,
}

pub struct ModerationService {
    submissions: Arc<dyn SubmissionsRepo>,
    episodes: Arc<dyn EpisodesRepo>,
    ids: Arc<EpisodeIdAllocator>,
    gate: Arc<dyn AbuseGate>,
    catalog: CatalogService,
    sanitizer: TextSanitizer,
}

impl ModerationService {
    pub fn new(
        submissions: Arc<dyn SubmissionsRepo>,
        episodes: Arc<dyn EpisodesRepo>,
        ids: Arc<EpisodeIdAllocator>,
        gate: Arc<dyn AbuseGate>,
        catalog: CatalogService,
    ) -> Self {
        Self {
            submissions,
            episodes,
            ids,
            gate,
            catalog,
            sanitizer: TextSanitizer::new(),
        }
    }

    /// Accept a public submission after the abuse gate passes.
    pub async fn submit(
        &self,
        input: SubmissionInput,
        token: &str,
        client_address: Option<&str>,
    ) -> Result<SubmissionRecord, ModerationError> {
        if let GateVerdict::Rejected { reasons } = self.gate.verify(token, client_address).await?
        {
            warn!(
                target = SOURCE,
                client = client_address.unwrap_or("unknown"),
                reasons = ?reasons,
                "abuse gate rejected submission"
            );
            return Err(ModerationError::GateRejected { reasons });
        }

        let params = self.intake_params(input)?;
        let record = self.submissions.create_submission(params).await?;
        info!(
            target = SOURCE,
            key = %record.key,
            url = %record.submission_url,
            "submission queued"
        );
        Ok(record)
    }

    /// Pending submissions, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<SubmissionRecord>, ModerationError> {
        Ok(self.submissions.list_pending().await?)
    }

    /// Publish an episode and consume the submission identified by `key`.
    ///
    /// Without a key this is the direct moderator entry path: the episode is created and
    /// nothing is deleted. The two store writes are not atomic; a failed delete leaves the
    /// submission pending next to its published episode.
    pub async fn promote(
        &self,
        key: Option<&str>,
        fields: EpisodeFields,
    ) -> Result<EpisodeRecord, ModerationError> {
        let key = match key.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(SubmissionKey::decode(raw)?),
            None => None,
        };
        let validated = ValidatedEpisode::from_fields(fields)?;

        let id = self.ids.next_id().await?;
        let episode = self
            .episodes
            .insert_episode(validated.into_params(id, OffsetDateTime::now_utc()))
            .await?;

        if let Some(key) = key
            && let Err(err) = self.submissions.delete_submission(key).await
        {
            error!(
                target = SOURCE,
                episode_id = episode.id,
                key = %key,
                error = %err,
                "episode published but submission could not be removed"
            );
            self.catalog.invalidate().await;
            return Err(err.into());
        }

        self.catalog.invalidate().await;
        info!(target = SOURCE, episode_id = episode.id, "episode published");
        Ok(episode)
    }

    /// Discard a submission. Rejecting an already-consumed key succeeds.
    pub async fn reject(&self, key: &str) -> Result<(), ModerationError> {
        let key = SubmissionKey::decode(key)?;
        self.submissions.delete_submission(key).await?;
        info!(target = SOURCE, key = %key, "submission rejected");
        Ok(())
    }

    fn intake_params(
        &self,
        input: SubmissionInput,
    ) -> Result<CreateSubmissionParams, ModerationError> {
        let submitted_at = OffsetDateTime::now_utc();
        let params = match input {
            SubmissionInput::UrlOnly { url } => CreateSubmissionParams {
                submission_url: normalize_url("url", &url)?,
                show: None,
                title: None,
                description: None,
                episode_date: None,
                submitted_at,
            },
            SubmissionInput::Full {
                url,
                show,
                title,
                description,
                date,
            } => CreateSubmissionParams {
                episode_date: Some(parse_episode_date(&self.sanitizer.clean(&date))?),
                submission_url: normalize_url("url", &url)?,
                show: self.sanitizer.clean_optional(Some(&show)),
                title: self.sanitizer.clean_optional(Some(&title)),
                description: self.sanitizer.clean_optional(Some(&description)),
                submitted_at,
            },
        };
        Ok(params)
    }
}

struct ValidatedEpisode {
    show: String,
    title: String,
    description: String,
    episode_url: String,
    media_url: Option<String>,
    runtime_seconds: Option<i32>,
    size_bytes: Option<i64>,
    episode_date: time::Date,
}

impl ValidatedEpisode {
    fn from_fields(fields: EpisodeFields) -> Result<Self, DomainError> {
        let episode_date = parse_episode_date(&fields.date)?;
        let episode_url = normalize_url("url", &fields.episode_url)?;
        let media_url = match non_blank(fields.media_url.as_deref()) {
            Some(raw) => Some(normalize_url("media", raw)?),
            None => None,
        };
        let runtime_seconds = match non_blank(fields.runtime.as_deref()) {
            Some(raw) => Some(parse_runtime(raw)?),
            None => None,
        };
        let size_bytes = match non_blank(fields.size.as_deref()) {
            Some(raw) => Some(
                raw.parse::<i64>()
                    .ok()
                    .filter(|size| *size >= 0)
                    .ok_or_else(|| DomainError::validation(format!("size `{raw}` is invalid")))?,
            ),
            None => None,
        };

        Ok(Self {
            show: fields.show.trim().to_owned(),
            title: fields.title.trim().to_owned(),
            description: fields.description.trim().to_owned(),
            episode_url,
            media_url,
            runtime_seconds,
            size_bytes,
            episode_date,
        })
    }

    fn into_params(self, id: i64, added_at: OffsetDateTime) -> CreateEpisodeParams {
        CreateEpisodeParams {
            id,
            show: self.show,
            title: self.title,
            description: self.description,
            episode_url: self.episode_url,
            media_url: self.media_url,
            runtime_seconds: self.runtime_seconds,
            size_bytes: self.size_bytes,
            episode_date: self.episode_date,
            added_at,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Parse a runtime given as plain seconds, `mm:ss` or `h:mm:ss`.
fn parse_runtime(raw: &str) -> Result<i32, DomainError> {
    let invalid = || DomainError::validation(format!("runtime `{raw}` is invalid"));

    let parts = raw
        .split(':')
        .map(|part| part.trim().parse::<u32>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    let seconds = match parts.as_slice() {
        [seconds] => u64::from(*seconds),
        [minutes, seconds] if *seconds < 60 => u64::from(*minutes) * 60 + u64::from(*seconds),
        [hours, minutes, seconds] if *minutes < 60 && *seconds < 60 => {
            u64::from(*hours) * 3600 + u64::from(*minutes) * 60 + u64::from(*seconds)
        }
        _ => return Err(invalid()),
    };
    i32::try_from(seconds).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::application::gate::BypassGate;
    use crate::cache::{CacheBackend, CacheConfig, MemoryCache};
    use crate::infra::memory::{InMemoryEpisodes, InMemorySubmissions};

    struct FixedGate(GateVerdict);

    #[async_trait]
    impl AbuseGate for FixedGate {
        async fn verify(
            &self,
            _token: &str,
            _client_address: Option<&str>,
        ) -> Result<GateVerdict, GateError> {
            Ok(self.0.clone())
        }
    }

    struct DownGate;

    #[async_trait]
    impl AbuseGate for DownGate {
        async fn verify(
            &self,
            _token: &str,
            _client_address: Option<&str>,
        ) -> Result<GateVerdict, GateError> {
            Err(GateError::Transport("connection refused".into()))
        }
    }

    /// Submissions store whose deletes always fail.
    struct StuckSubmissions(InMemorySubmissions);

    #[async_trait]
    impl SubmissionsRepo for StuckSubmissions {
        async fn list_pending(&self) -> Result<Vec<SubmissionRecord>, RepoError> {
            self.0.list_pending().await
        }

        async fn create_submission(
            &self,
            params: CreateSubmissionParams,
        ) -> Result<SubmissionRecord, RepoError> {
            self.0.create_submission(params).await
        }

        async fn delete_submission(&self, _key: SubmissionKey) -> Result<(), RepoError> {
            Err(RepoError::Timeout)
        }

        async fn count_pending(&self) -> Result<u64, RepoError> {
            self.0.count_pending().await
        }
    }

    struct Harness {
        service: ModerationService,
        submissions: Arc<dyn SubmissionsRepo>,
        catalog: CatalogService,
    }

    fn harness_with(gate: Arc<dyn AbuseGate>, submissions: Arc<dyn SubmissionsRepo>) -> Harness {
        let episodes: Arc<dyn EpisodesRepo> = Arc::new(InMemoryEpisodes::default());
        let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::new(&CacheConfig::default()));
        let catalog = CatalogService::new(
            episodes.clone(),
            Some(cache),
            Duration::from_secs(60),
        );
        let ids = Arc::new(EpisodeIdAllocator::new(episodes.clone(), 10));
        let service = ModerationService::new(
            submissions.clone(),
            episodes,
            ids,
            gate,
            catalog.clone(),
        );
        Harness {
            service,
            submissions,
            catalog,
        }
    }

    fn harness() -> Harness {
        harness_with(
            Arc::new(BypassGate),
            Arc::new(InMemorySubmissions::default()),
        )
    }

    fn ep1_fields() -> EpisodeFields {
        EpisodeFields {
            show: "Go Time".into(),
            title: "Ep1".into(),
            episode_url: "https://example.com/ep1".into(),
            date: "2024-01-02".into(),
            ..Default::default()
        }
    }

    fn url_only(url: &str) -> SubmissionInput {
        SubmissionInput::UrlOnly { url: url.into() }
    }

    #[tokio::test]
    async fn submit_then_promote_publishes_episode() {
        let h = harness();
        h.service
            .submit(url_only("https://example.com/ep1"), "token", Some("127.0.0.1"))
            .await
            .expect("submit");

        let pending = h.service.list_pending().await.expect("pending");
        assert_eq!(pending.len(), 1);
        let key = pending[0].key.encode();
        assert!(!key.is_empty());

        // Prime the cache so promotion has something to invalidate.
        assert!(h.catalog.episodes().await.expect("catalog").is_empty());

        let episode = h
            .service
            .promote(Some(&key), ep1_fields())
            .await
            .expect("promote");
        assert!(episode.id > 0);

        assert!(h.service.list_pending().await.expect("pending").is_empty());
        let catalog = h.catalog.episodes().await.expect("catalog");
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].episode_url, "https://example.com/ep1");
    }

    #[tokio::test]
    async fn rejected_gate_creates_nothing() {
        let h = harness_with(
            Arc::new(FixedGate(GateVerdict::Rejected {
                reasons: vec!["invalid-input-response".into()],
            })),
            Arc::new(InMemorySubmissions::default()),
        );

        let err = h
            .service
            .submit(url_only("https://example.com/ep1"), "bad", None)
            .await
            .expect_err("gate rejects");
        assert!(matches!(err, ModerationError::GateRejected { .. }));
        assert_eq!(h.submissions.count_pending().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn unreachable_gate_is_a_request_error() {
        let h = harness_with(Arc::new(DownGate), Arc::new(InMemorySubmissions::default()));

        let err = h
            .service
            .submit(url_only("https://example.com/ep1"), "token", None)
            .await
            .expect_err("gate down");
        assert!(matches!(err, ModerationError::GateUnavailable(_)));
        assert_eq!(h.submissions.count_pending().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn legacy_submission_with_bad_date_is_not_stored() {
        let h = harness();
        let err = h
            .service
            .submit(
                SubmissionInput::Full {
                    url: "https://example.com/ep1".into(),
                    show: "Go Time".into(),
                    title: "Ep1".into(),
                    description: String::new(),
                    date: "2024-13-40".into(),
                },
                "token",
                None,
            )
            .await
            .expect_err("invalid date");
        assert!(matches!(err, ModerationError::Validation(_)));
        assert_eq!(h.submissions.count_pending().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn legacy_submission_fields_are_sanitized() {
        let h = harness();
        let record = h
            .service
            .submit(
                SubmissionInput::Full {
                    url: " https://example.com/ep1 ".into(),
                    show: " <script>x</script> ".into(),
                    title: "  <i>Ep1</i> ".into(),
                    description: "desc".into(),
                    date: " 2024-01-02 ".into(),
                },
                "token",
                None,
            )
            .await
            .expect("submit");

        assert_eq!(record.show, None);
        assert_eq!(record.title.as_deref(), Some("Ep1"));
        assert_eq!(record.submission_url, "https://example.com/ep1");
        assert!(record.episode_date.is_some());
    }

    #[tokio::test]
    async fn reject_is_idempotent() {
        let h = harness();
        let record = h
            .service
            .submit(url_only("https://example.com/ep1"), "token", None)
            .await
            .expect("submit");
        let key = record.key.encode();

        h.service.reject(&key).await.expect("first reject");
        h.service.reject(&key).await.expect("second reject");
        assert!(h.service.list_pending().await.expect("pending").is_empty());
    }

    #[tokio::test]
    async fn malformed_key_is_rejected_before_any_write() {
        let h = harness();
        let err = h
            .service
            .promote(Some("!!"), ep1_fields())
            .await
            .expect_err("bad key");
        assert!(matches!(err, ModerationError::Decode(_)));
        assert!(h.catalog.episodes().await.expect("catalog").is_empty());

        assert!(matches!(
            h.service.reject("").await,
            Err(ModerationError::Decode(KeyDecodeError::Empty))
        ));
    }

    #[tokio::test]
    async fn direct_entry_publishes_without_key() {
        let h = harness();
        let mut fields = ep1_fields();
        fields.media_url = Some("https://cdn.example.com/ep1.mp3".into());
        fields.runtime = Some("1:02:03".into());
        fields.size = Some("1024".into());

        let episode = h.service.promote(None, fields).await.expect("promote");
        assert_eq!(episode.runtime_seconds, Some(3723));
        assert_eq!(episode.size_bytes, Some(1024));
        assert_eq!(h.catalog.episodes().await.expect("catalog").len(), 1);
    }

    #[tokio::test]
    async fn failed_delete_still_invalidates_catalog() {
        let h = harness_with(
            Arc::new(BypassGate),
            Arc::new(StuckSubmissions(InMemorySubmissions::default())),
        );
        let record = h
            .service
            .submit(url_only("https://example.com/ep1"), "token", None)
            .await
            .expect("submit");
        assert!(h.catalog.episodes().await.expect("catalog").is_empty());

        let err = h
            .service
            .promote(Some(&record.key.encode()), ep1_fields())
            .await
            .expect_err("delete fails");
        assert!(matches!(err, ModerationError::Repo(RepoError::Timeout)));

        assert_eq!(h.catalog.episodes().await.expect("catalog").len(), 1);
        assert_eq!(h.service.list_pending().await.expect("pending").len(), 1);
    }

    #[test]
    fn runtime_accepts_clock_and_seconds() {
        assert_eq!(parse_runtime("90"), Ok(90));
        assert_eq!(parse_runtime("01:30"), Ok(90));
        assert_eq!(parse_runtime("1:00:00"), Ok(3600));
        assert!(parse_runtime("1:75").is_err());
        assert!(parse_runtime("-5").is_err());
        assert!(parse_runtime("abc").is_err());
    }
}
