use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::db::connection::{DbPool, get_pool_stats, init_db};
use crate::db::{InMemoryStore, PgStore, PollStore, Roster};
use crate::engine::PollEngine;
use crate::events::create_event_channel;
use crate::notifier::DeadlineNotifier;
use crate::polls;
use axum::{
    Router,
    extract::Extension,
    http::{
        HeaderName, StatusCode,
        header::{ACCEPT, CONTENT_TYPE},
    },
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub engine: PollEngine,
    pub db: Option<DbPool>,
}

impl AppState {
    pub async fn new(settings: &Settings) -> Result<Self, sqlx::Error> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let (store, roster, db): (Arc<dyn PollStore>, Arc<dyn Roster>, Option<DbPool>) =
            match &settings.database.url {
                Some(url) => {
                    let pool = init_db(url, settings.database.max_connections).await?;
                    let pg = PgStore::new(pool.clone());
                    let store: Arc<dyn PollStore> = Arc::new(pg.clone());
                    let roster: Arc<dyn Roster> = Arc::new(pg);
                    (store, roster, Some(pool))
                }
                None => {
                    warn!("no database url configured, polls will live in memory only");
                    let memory = InMemoryStore::new();
                    let store: Arc<dyn PollStore> = Arc::new(memory.clone());
                    let roster: Arc<dyn Roster> = Arc::new(memory);
                    (store, roster, None)
                }
            };

        let engine = PollEngine::new(
            store,
            roster,
            clock.clone(),
            settings.polls.clone(),
            create_event_channel(),
        );

        match engine.templates.seed_defaults().await {
            Ok(0) => {}
            Ok(seeded) => info!(seeded, "seeded default question templates"),
            Err(e) => error!(error = %e, "failed to seed default templates"),
        }

        DeadlineNotifier::new(
            engine.clone(),
            clock,
            ChronoDuration::minutes(settings.polls.ending_soon_minutes),
        )
        .spawn();

        if let Some(pool) = db.clone() {
            tokio::spawn(async move {
                let mut interval = interval(Duration::from_secs(60));
                loop {
                    interval.tick().await;
                    match pool.acquire().await {
                        Ok(conn) => {
                            drop(conn);
                            if let Ok(stats) = get_pool_stats(&pool).await {
                                debug!("{stats}");
                            }
                        }
                        Err(e) => {
                            error!("Database connection health check failed: {}", e);
                        }
                    }
                }
            });
        }

        Ok(AppState { engine, db })
    }
}

pub fn app(app_state: AppState) -> Router {
    Router::new()
        .route("/templates", get(polls::list_templates))
        .route("/templates/:template_id", get(polls::get_template))
        .route(
            "/circles/:circle_id/polls",
            get(polls::list_circle_polls).post(polls::create_poll),
        )
        .route("/polls/:poll_id", get(polls::get_poll).delete(polls::delete_poll))
        .route("/polls/:poll_id/votes", post(polls::vote_on_poll))
        .route("/polls/:poll_id/close", post(polls::close_poll))
        .route("/polls/:poll_id/results", get(polls::poll_results))
        .layer(Extension(app_state))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::mirror_request())
                .allow_credentials(true)
                .allow_methods([
                    axum::http::Method::POST,
                    axum::http::Method::GET,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    CONTENT_TYPE,
                    ACCEPT,
                    HeaderName::from_static(polls::USER_ID_HEADER),
                ]),
        )
        .fallback(handler_404)
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}
