//! Router-level flows against the in-memory store.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
    response::Response,
};
use gopherpods::{
    application::{
        catalog::CatalogService,
        gate::{AbuseGate, GateError, GateVerdict},
        ids::EpisodeIdAllocator,
        moderation::ModerationService,
        notifications::NotificationService,
        syndication::FeedSettings,
    },
    cache::{CacheBackend, CacheConfig, MemoryCache},
    infra::{
        http::{HttpState, REQUEST_ID_HEADER, build_router},
        memory::{InMemoryEpisodes, InMemorySubmissions},
        notify::LogNotifier,
    },
};
use http_body_util::BodyExt;
use tower::ServiceExt;

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

fn build_state(verdict: GateVerdict) -> HttpState {
    let episodes = Arc::new(InMemoryEpisodes::default());
    let submissions = Arc::new(InMemorySubmissions::default());
    let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::new(&CacheConfig::default()));
    let catalog = CatalogService::new(episodes.clone(), Some(cache), Duration::from_secs(3600));
    let ids = Arc::new(EpisodeIdAllocator::new(episodes.clone(), 10));
    let moderation = Arc::new(ModerationService::new(
        submissions.clone(),
        episodes.clone(),
        ids,
        Arc::new(FixedGate(verdict)),
        catalog.clone(),
    ));
    let notifications = Arc::new(NotificationService::new(
        submissions,
        Arc::new(LogNotifier),
        "gopherpods@localhost",
    ));

    HttpState {
        catalog,
        moderation,
        notifications,
        health: episodes,
        feed: Arc::new(FeedSettings::default()),
        site_key: None,
    }
}

fn passing_state() -> (HttpState, Router) {
    let state = build_state(GateVerdict::Passed);
    let router = build_router(state.clone());
    (state, router)
}

fn form(pairs: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in pairs {
        serializer.append_pair(name, value);
    }
    serializer.finish()
}

async fn get(router: &Router, uri: &str) -> Response {
    router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response")
}

async fn post_form(router: &Router, uri: &str, pairs: &[(&str, &str)]) -> Response {
    let request = Request::post(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form(pairs)))
        .expect("request");
    router.clone().oneshot(request).await.expect("response")
}

async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

async fn submit(router: &Router, url: &str) -> Response {
    post_form(
        router,
        "/submit/add",
        &[("url", url), ("g-recaptcha-response", "token")],
    )
    .await
}

async fn pending_key(state: &HttpState) -> String {
    let pending = state.moderation.list_pending().await.expect("pending");
    assert_eq!(pending.len(), 1);
    pending[0].key.encode()
}

fn promote_fields<'a>(key: &'a str, url: &'a str, date: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("key", key),
        ("show", "Go Time"),
        ("title", "Ep1"),
        ("desc", ""),
        ("url", url),
        ("media", ""),
        ("runtime", ""),
        ("size", ""),
        ("date", date),
    ]
}

#[tokio::test]
async fn submission_flows_through_moderation_into_the_feed() {
    let (state, router) = passing_state();

    let response = submit(&router, "https://example.com/ep1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Thanks!"));

    let key = pending_key(&state).await;
    let page = body_text(get(&router, "/submissions").await).await;
    assert!(page.contains(&key));
    assert!(page.contains("https://example.com/ep1"));

    let response = post_form(
        &router,
        "/submissions/add",
        &promote_fields(&key, "https://example.com/ep1", "2024-01-02"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(state.moderation.list_pending().await.expect("pending").is_empty());
    let episodes = state.catalog.episodes().await.expect("catalog");
    assert_eq!(episodes.len(), 1);
    assert_eq!(episodes[0].show, "Go Time");
    assert_eq!(episodes[0].title, "Ep1");

    let response = get(&router, "/feed").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("application/xml")
    );
    let feed = body_text(response).await;
    assert_eq!(feed.matches("<item>").count(), 1);
    assert!(feed.contains("<link>https://example.com/ep1</link>"));
    assert!(feed.contains("Go Time - Ep1"));
}

#[tokio::test]
async fn invalid_date_rejects_promotion_without_side_effects() {
    let (state, router) = passing_state();
    submit(&router, "https://example.com/ep1").await;
    let key = pending_key(&state).await;

    let response = post_form(
        &router,
        "/submissions/add",
        &promote_fields(&key, "https://example.com/ep1", "2024-13-40"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(state.catalog.episodes().await.expect("catalog").is_empty());
    assert_eq!(state.moderation.list_pending().await.expect("pending").len(), 1);
}

#[tokio::test]
async fn gate_rejection_renders_failure_and_queues_nothing() {
    let state = build_state(GateVerdict::Rejected {
        reasons: vec!["invalid-input-response".to_string()],
    });
    let router = build_router(state.clone());

    let response = submit(&router, "https://example.com/ep1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Submission failed"));
    assert!(state.moderation.list_pending().await.expect("pending").is_empty());
}

#[tokio::test]
async fn rejecting_twice_succeeds() {
    let (state, router) = passing_state();
    submit(&router, "https://example.com/ep1").await;
    let key = pending_key(&state).await;

    for _ in 0..2 {
        let response = post_form(&router, "/submissions/del", &[("key", key.as_str())]).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert!(state.moderation.list_pending().await.expect("pending").is_empty());
}

#[tokio::test]
async fn malformed_key_is_a_bad_request() {
    let (state, router) = passing_state();

    let response = post_form(&router, "/submissions/del", &[("key", "not-a-key")]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_form(
        &router,
        "/submissions/add",
        &promote_fields("not-a-key", "https://example.com/ep1", "2024-01-02"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(state.catalog.episodes().await.expect("catalog").is_empty());
}

#[tokio::test]
async fn invalid_submission_url_is_a_bad_request() {
    let (state, router) = passing_state();

    let response = submit(&router, "javascript:alert(1)").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(state.moderation.list_pending().await.expect("pending").is_empty());
}

#[tokio::test]
async fn index_shows_promoted_episode_after_cached_read() {
    let (_state, router) = passing_state();

    let before = body_text(get(&router, "/").await).await;
    assert!(before.contains("No episodes yet."));

    let mut fields = promote_fields("", "https://example.com/direct", "2024-03-04");
    fields.retain(|(name, _)| *name != "key");
    let response = post_form(&router, "/submissions/add", &fields).await;
    assert_eq!(response.status(), StatusCode::OK);

    let after = body_text(get(&router, "/").await).await;
    assert!(after.contains("Go Time - Ep1"));
    assert!(after.contains("04 Mar 2024"));
}

#[tokio::test]
async fn dump_lists_catalog_oldest_first() {
    let (_state, router) = passing_state();
    for (url, date) in [
        ("https://example.com/newer", "2024-05-01"),
        ("https://example.com/older", "2023-01-15"),
    ] {
        let mut fields = promote_fields("", url, date);
        fields.retain(|(name, _)| *name != "key");
        let response = post_form(&router, "/submissions/add", &fields).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = get(&router, "/dump").await;
    assert_eq!(response.status(), StatusCode::OK);
    let dump: serde_json::Value =
        serde_json::from_str(&body_text(response).await).expect("json dump");
    let entries = dump.as_array().expect("array");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["url"], "https://example.com/older");
    assert_eq!(entries[0]["date"], "2023-01-15");
    assert_eq!(entries[1]["url"], "https://example.com/newer");
}

#[tokio::test]
async fn notification_sweep_reports_pending_count() {
    let (_state, router) = passing_state();

    let idle = body_text(get(&router, "/tasks/email").await).await;
    assert_eq!(idle, "no pending submissions");

    submit(&router, "https://example.com/ep1").await;
    let response = get(&router, "/tasks/email").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("1 submissions"));
}

#[tokio::test]
async fn health_and_request_id() {
    let (_state, router) = passing_state();

    let response = get(&router, "/_health/db").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .expect("request id header");
    assert!(!request_id.is_empty());
}
