use std::{future::IntoFuture, net::SocketAddr, process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_cron::{CronStream, Schedule};
use gopherpods::{
    application::{
        catalog::CatalogService,
        error::AppError,
        gate::{AbuseGate, BypassGate},
        ids::EpisodeIdAllocator,
        jobs::{NotifySweepContext, process_notify_sweep_job},
        moderation::ModerationService,
        notifications::{NotificationService, Notifier, SweepOutcome},
        repos::{EpisodesRepo, HealthRepo, SubmissionsRepo},
    },
    cache::{CacheBackend, CacheConfig, MemoryCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        gate::RecaptchaGate,
        http::{self, HttpState},
        memory::{InMemoryEpisodes, InMemorySubmissions},
        notify::{LogNotifier, WebhookNotifier},
        telemetry,
    },
};
use tokio::{sync::Notify, time::sleep};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Sweep(_) => run_sweep(settings).await,
    }
}

struct Repositories {
    episodes: Arc<dyn EpisodesRepo>,
    submissions: Arc<dyn SubmissionsRepo>,
    health: Arc<dyn HealthRepo>,
}

async fn init_repositories(settings: &config::Settings) -> Result<Repositories, AppError> {
    let Some(database_url) = settings.database.url.as_deref() else {
        warn!(
            target = "gopherpods::startup",
            "database url is not configured; using the in-memory store"
        );
        let episodes = Arc::new(InMemoryEpisodes::default());
        return Ok(Repositories {
            episodes: episodes.clone(),
            submissions: Arc::new(InMemorySubmissions::default()),
            health: episodes,
        });
    };

    let pool = PostgresRepositories::connect(
        database_url,
        settings.database.max_connections.get(),
        settings.database.acquire_timeout,
    )
    .await
    .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let repositories = Arc::new(PostgresRepositories::new(pool));
    Ok(Repositories {
        episodes: repositories.clone(),
        submissions: repositories.clone(),
        health: repositories,
    })
}

fn build_notifier(settings: &config::Settings) -> Result<Arc<dyn Notifier>, AppError> {
    match &settings.notifications.webhook_url {
        Some(endpoint) => {
            let notifier =
                WebhookNotifier::new(endpoint.clone(), settings.notifications.timeout)
                    .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;
            Ok(Arc::new(notifier))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}

fn build_notification_service(
    repositories: &Repositories,
    settings: &config::Settings,
) -> Result<Arc<NotificationService>, AppError> {
    Ok(Arc::new(NotificationService::new(
        repositories.submissions.clone(),
        build_notifier(settings)?,
        settings.notifications.sender.clone(),
    )))
}

fn build_gate(settings: &config::Settings) -> Result<Arc<dyn AbuseGate>, AppError> {
    match &settings.gate.mode {
        config::GateMode::Live { secret, verify_url } => {
            let gate = RecaptchaGate::new(secret.clone(), verify_url.clone(), settings.gate.timeout)
                .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;
            Ok(Arc::new(gate))
        }
        config::GateMode::Bypass => {
            warn!(
                target = "gopherpods::startup",
                "abuse gate is bypassed; every submission will be accepted"
            );
            Ok(Arc::new(BypassGate))
        }
    }
}

fn build_http_state(
    repositories: &Repositories,
    notifications: Arc<NotificationService>,
    settings: &config::Settings,
) -> Result<HttpState, AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let cache: Option<Arc<dyn CacheBackend>> = if cache_config.enabled {
        Some(Arc::new(MemoryCache::new(&cache_config)))
    } else {
        None
    };

    let catalog = CatalogService::new(repositories.episodes.clone(), cache, cache_config.ttl);
    let ids = Arc::new(EpisodeIdAllocator::new(
        repositories.episodes.clone(),
        settings.ids.block_size.get(),
    ));
    let moderation = Arc::new(ModerationService::new(
        repositories.submissions.clone(),
        repositories.episodes.clone(),
        ids,
        build_gate(settings)?,
        catalog.clone(),
    ));

    Ok(HttpState {
        catalog,
        moderation,
        notifications,
        health: repositories.health.clone(),
        feed: Arc::new(settings.feed.clone()),
        site_key: settings.gate.site_key.as_deref().map(Arc::from),
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let notifications = build_notification_service(&repositories, &settings)?;
    let state = build_http_state(&repositories, notifications.clone(), &settings)?;

    let monitor_handle = settings
        .notifications
        .schedule
        .clone()
        .map(|schedule| spawn_job_monitor(notifications, schedule));

    let result = serve_http(&settings, state).await;

    if let Some(handle) = monitor_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_sweep(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let notifications = build_notification_service(&repositories, &settings)?;

    match notifications.sweep().await {
        Ok(SweepOutcome::Idle) => {
            info!(target = "gopherpods::sweep", "no pending submissions");
            Ok(())
        }
        Ok(SweepOutcome::Notified { pending }) => {
            info!(target = "gopherpods::sweep", pending, "moderators notified");
            Ok(())
        }
        Err(err) => Err(AppError::unexpected(format!("notification sweep failed: {err}"))),
    }
}

fn spawn_job_monitor(
    notifications: Arc<NotificationService>,
    schedule: Schedule,
) -> tokio::task::JoinHandle<()> {
    let notify_sweep_worker = WorkerBuilder::new("notify-sweep-worker")
        .data(NotifySweepContext { notifications })
        .backend(CronStream::new(schedule))
        .build_fn(process_notify_sweep_job);

    let monitor = Monitor::new().register(notify_sweep_worker);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "gopherpods::startup",
        addr = %settings.server.addr,
        "listening"
    );

    let shutdown_requested = Arc::new(Notify::new());
    let signal = shutdown_requested.clone();
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for shutdown signal");
        }
        info!(target = "gopherpods::shutdown", "shutdown requested; draining connections");
        signal.notify_one();
    })
    .into_future();

    let grace = settings.server.graceful_shutdown;
    let deadline = async move {
        shutdown_requested.notified().await;
        sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = deadline => {
            warn!(
                target = "gopherpods::shutdown",
                grace_seconds = grace.as_secs(),
                "connections still open after grace period; exiting"
            );
        }
    }

    Ok(())
}
