use actix_web::{dev::Service, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hot_feed::clients::{AppViewClient, Classifier, ContentSource, OpenAiClassifier};
use hot_feed::config::{settings_channel, Config, SettingsSource, StoreBackend};
use hot_feed::consumers::FirehoseConsumer;
use hot_feed::db::{self, InMemoryStore, ItemStore, PgStore, SubscriptionStateStore};
use hot_feed::handlers::{self, FeedHandlerState, ServiceIdentity};
use hot_feed::jobs::{JobRunner, JobSet, SettingsReload};
use hot_feed::metrics;
use hot_feed::services::refresh_queue;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true),
        )
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    info!("Starting hot-feed-service v{}", env!("CARGO_PKG_VERSION"));
    info!(env = %config.app.env, hostname = %config.app.hostname, "Environment");

    let (items, subscription): (Arc<dyn ItemStore>, Arc<dyn SubscriptionStateStore>) =
        match config.database.backend {
            StoreBackend::Postgres => {
                let pool = db::create_pool(&config.database)
                    .await
                    .context("failed to connect to database")?;
                db::migrate(&pool).await.context("failed to run migrations")?;
                let store = Arc::new(PgStore::new(pool));
                (store.clone(), store)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; ranked items are lost on restart");
                let store = Arc::new(InMemoryStore::new());
                (store.clone(), store)
            }
        };

    // A bad policy at startup is fatal; later reload failures are not.
    let settings_source = config.filter.source();
    let policy = settings_source
        .load()
        .await
        .context("failed to load filter settings")?;
    let (publisher, settings) = settings_channel(policy);
    let settings_reload = if matches!(settings_source, SettingsSource::File(_)) {
        Some(SettingsReload {
            publisher,
            source: settings_source,
            interval: config.filter.reload_interval,
        })
    } else {
        None
    };

    let content: Arc<dyn ContentSource> =
        Arc::new(AppViewClient::new(&config.appview).context("failed to build AppView client")?);
    let classifier: Option<Arc<dyn Classifier>> = OpenAiClassifier::from_config(&config.classifier)
        .context("failed to build classifier client")?
        .map(|classifier| Arc::new(classifier) as Arc<dyn Classifier>);

    let (refresh_trigger, refresh_requests) = refresh_queue();

    let jobs = JobRunner::new();
    jobs.start(JobSet {
        store: items.clone(),
        content,
        classifier,
        ranking: config.ranking.clone(),
        classification: config.classifier.clone(),
        eviction: config.eviction.clone(),
        refresh_requests,
        settings: settings_reload,
    });
    info!(tasks = jobs.task_count(), "Background jobs started");

    if config.firehose.enabled {
        let consumer = FirehoseConsumer::new(
            config.firehose.clone(),
            items.clone(),
            subscription,
            settings,
        );
        tokio::spawn(consumer.run());
        info!(endpoint = %config.firehose.endpoint, "Firehose consumer started");
    } else {
        info!("Firehose consumer disabled by configuration");
    }

    let feed_state = web::Data::new(FeedHandlerState {
        store: items,
        refresh: refresh_trigger,
        publisher_did: config.app.publisher_did.clone(),
    });
    let identity = web::Data::new(ServiceIdentity {
        hostname: config.app.hostname.clone(),
        service_did: config.app.service_did(),
        publisher_did: config.app.publisher_did.clone(),
    });

    let bind_address = format!("0.0.0.0:{}", config.app.port);
    info!("HTTP server listening on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(feed_state.clone())
            .app_data(identity.clone())
            .configure(handlers::configure)
            .wrap_fn(|req, srv| {
                let method = req.method().to_string();
                let route = req
                    .match_pattern()
                    .unwrap_or_else(|| "unmatched".to_string());
                let start = Instant::now();

                let fut = srv.call(req);
                async move {
                    match fut.await {
                        Ok(res) => {
                            metrics::http::observe_request(
                                &method,
                                &route,
                                res.status().as_u16(),
                                start.elapsed(),
                            );
                            Ok(res)
                        }
                        Err(err) => {
                            metrics::http::observe_request(
                                &method,
                                &route,
                                500,
                                start.elapsed(),
                            );
                            Err(err)
                        }
                    }
                }
            })
    })
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {}", bind_address))?
    .run()
    .await?;

    jobs.abort_all();
    info!("hot-feed-service stopped");
    Ok(())
}
