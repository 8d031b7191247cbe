use serde::Deserialize;
use std::sync::Arc;
use warp::Filter;
use warp::http::StatusCode;

use crate::challenges::ChallengeCatalog;
use crate::predictions::{PredictionRequest, PredictionService};
use crate::reconcile::CompletionReconciler;
use crate::recorder::{CompletionRecorder, RecordError};
use crate::stats_service::{ChallengeStatsService, StatsOutcome};
use challenge_core::{ModelCacheError, ModelKind};
use challenge_persistence::repositories::DailyChallengeRepository;
use challenge_types::{
    ChallengeError, DailyChallenge, DateRange, MissingResource, RecordDecision, RecordRequest,
    StatsQuery, SyncRequest,
};

pub mod challenges;
pub mod config;
pub mod predictions;
pub mod reconcile;
pub mod recorder;
pub mod stats_service;

#[derive(Deserialize)]
struct UpcomingQuery {
    days: Option<u32>,
}

/// Everything the HTTP layer dispatches to.
#[derive(Clone)]
pub struct Services {
    pub recorder: Arc<CompletionRecorder>,
    pub stats: Arc<ChallengeStatsService>,
    pub reconciler: Arc<CompletionReconciler>,
    pub catalog: Arc<ChallengeCatalog>,
    pub challenge_repository: Arc<DailyChallengeRepository>,
    pub predictions: Arc<PredictionService>,
}

fn error_reply(message: impl Into<String>, status: StatusCode) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message.into()
        })),
        status,
    )
}

pub fn create_routes(
    services: Services,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let recorder_filter = warp::any().map({
        let recorder = services.recorder.clone();
        move || recorder.clone()
    });

    let stats_filter = warp::any().map({
        let stats = services.stats.clone();
        move || stats.clone()
    });

    let reconciler_filter = warp::any().map({
        let reconciler = services.reconciler.clone();
        move || reconciler.clone()
    });

    let catalog_filter = warp::any().map({
        let catalog = services.catalog.clone();
        move || catalog.clone()
    });

    let challenge_repository_filter = warp::any().map({
        let challenge_repository = services.challenge_repository.clone();
        move || challenge_repository.clone()
    });

    let predictions_filter = warp::any().map({
        let predictions = services.predictions.clone();
        move || predictions.clone()
    });

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    let complete = warp::path!("challenges" / "complete")
        .and(warp::post())
        .and(warp::body::json::<RecordRequest>())
        .and(recorder_filter.clone())
        .and_then(handle_complete_request);

    let stats = warp::path!("challenges" / "stats")
        .and(warp::get())
        .and(warp::query::<StatsQuery>())
        .and(stats_filter.clone())
        .and_then(handle_stats_request);

    let today = warp::path!("challenges" / "today")
        .and(warp::get())
        .and(catalog_filter.clone())
        .and_then(handle_today_request);

    let upcoming = warp::path!("challenges" / "upcoming")
        .and(warp::get())
        .and(warp::query::<UpcomingQuery>())
        .and(catalog_filter.clone())
        .and(challenge_repository_filter.clone())
        .and_then(handle_upcoming_request);

    let publish = warp::path!("challenges")
        .and(warp::post())
        .and(warp::body::json::<DailyChallenge>())
        .and(challenge_repository_filter.clone())
        .and_then(handle_publish_request);

    let sync = warp::path!("challenges" / "sync")
        .and(warp::post())
        .and(warp::body::json::<SyncRequest>())
        .and(reconciler_filter.clone())
        .and_then(handle_sync_request);

    let predict = warp::path!("predictions")
        .and(warp::post())
        .and(warp::body::json::<PredictionRequest>())
        .and(predictions_filter.clone())
        .and_then(handle_prediction_request);

    let loaded_models = warp::path!("predictions" / "models")
        .and(warp::get())
        .and(predictions_filter.clone())
        .and_then(handle_loaded_models_request);

    let evict_models = warp::path!("predictions" / "models" / String)
        .and(warp::delete())
        .and(predictions_filter.clone())
        .and_then(handle_evict_models_request);

    // CORS configuration
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET", "POST", "DELETE"]);

    health
        .or(complete)
        .or(stats)
        .or(today)
        .or(upcoming)
        .or(publish)
        .or(sync)
        .or(predict)
        .or(loaded_models)
        .or(evict_models)
        .with(cors)
        .with(warp::log("challenge_streaks"))
}

async fn handle_complete_request(
    request: RecordRequest,
    recorder: Arc<CompletionRecorder>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let decision = match recorder.record(request).await {
        Ok(decision) => decision,
        Err(err @ RecordError::LocalCapture(_)) => {
            tracing::error!("Failed to record completion: {}", err);
            return Ok(error_reply(
                ChallengeError::StoreUnavailable.message(),
                StatusCode::SERVICE_UNAVAILABLE,
            ));
        }
        Err(err) => {
            tracing::error!("Failed to record completion: {}", err);
            return Ok(error_reply(
                "Failed to record completion",
                StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }
    };

    let status = match &decision {
        RecordDecision::Recorded { .. } => StatusCode::CREATED,
        RecordDecision::PendingSync { .. } => StatusCode::ACCEPTED,
        RecordDecision::AlreadyCompleted { .. } => StatusCode::OK,
        RecordDecision::NotFound { resource } => {
            let message = match resource {
                MissingResource::SourceResult => "Game result not found",
                MissingResource::DailyChallenge => "No active challenge for this date",
            };
            return Ok(error_reply(message, StatusCode::NOT_FOUND));
        }
        RecordDecision::Invalid { reason } => {
            return Ok(error_reply(reason.clone(), StatusCode::BAD_REQUEST));
        }
    };

    Ok(warp::reply::with_status(warp::reply::json(&decision), status))
}

async fn handle_stats_request(
    query: StatsQuery,
    stats: Arc<ChallengeStatsService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let range = match (query.start_date, query.end_date) {
        (None, None) => None,
        (start, end) => {
            let default = stats.default_range(chrono::Utc::now());
            match DateRange::new(start.unwrap_or(default.start), end.unwrap_or(default.end)) {
                Some(range) => Some(range),
                None => {
                    return Ok(error_reply(
                        ChallengeError::InvalidDateRange.message(),
                        StatusCode::BAD_REQUEST,
                    ));
                }
            }
        }
    };

    let outcome = stats.get_stats(query.user_id, range).await;
    if let StatsOutcome::Superseded(_) = &outcome {
        tracing::debug!("Answering stats for user {} with a newer request's report", query.user_id);
    }
    Ok(warp::reply::with_status(
        warp::reply::json(outcome.report()),
        StatusCode::OK,
    ))
}

async fn handle_today_request(
    catalog: Arc<ChallengeCatalog>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let today = catalog.today().await;
    Ok(warp::reply::with_status(
        warp::reply::json(&today),
        StatusCode::OK,
    ))
}

async fn handle_upcoming_request(
    query: UpcomingQuery,
    catalog: Arc<ChallengeCatalog>,
    challenge_repository: Arc<DailyChallengeRepository>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let start = catalog.current_day();
    let days = query.days.unwrap_or(7);

    match challenge_repository.upcoming(start, days).await {
        Ok(challenges) => Ok(warp::reply::with_status(
            warp::reply::json(&challenges),
            StatusCode::OK,
        )),
        Err(err) => {
            tracing::error!("Failed to fetch upcoming challenges: {}", err);
            Ok(error_reply(
                "Failed to fetch upcoming challenges",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_publish_request(
    challenge: DailyChallenge,
    challenge_repository: Arc<DailyChallengeRepository>,
) -> Result<impl warp::Reply, warp::Rejection> {
    if challenge.title.trim().is_empty() {
        return Ok(error_reply("title must not be blank", StatusCode::BAD_REQUEST));
    }

    match challenge_repository.publish(challenge).await {
        Ok(Some(published)) => Ok(warp::reply::with_status(
            warp::reply::json(&published),
            StatusCode::CREATED,
        )),
        Ok(None) => Ok(error_reply(
            "A challenge is already published for this date",
            StatusCode::CONFLICT,
        )),
        Err(err) => {
            tracing::error!("Failed to publish challenge: {}", err);
            Ok(error_reply(
                "Failed to publish challenge",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_sync_request(
    request: SyncRequest,
    reconciler: Arc<CompletionReconciler>,
) -> Result<impl warp::Reply, warp::Rejection> {
    match reconciler.reconcile(request.user_id).await {
        Ok(report) => Ok(warp::reply::with_status(
            warp::reply::json(&report),
            StatusCode::OK,
        )),
        Err(err) => {
            tracing::error!("Failed to reconcile user {}: {}", request.user_id, err);
            Ok(error_reply(
                "Failed to sync local completions",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_prediction_request(
    request: PredictionRequest,
    predictions: Arc<PredictionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    match predictions.predict(&request).await {
        Ok(prediction) => Ok(warp::reply::with_status(
            warp::reply::json(&prediction),
            StatusCode::OK,
        )),
        Err(ModelCacheError::Io { location, .. }) => {
            tracing::warn!("No model artifact at {}", location);
            Ok(error_reply("Model not found", StatusCode::NOT_FOUND))
        }
        Err(err @ ModelCacheError::InvalidVersion { .. }) => {
            Ok(error_reply(err.to_string(), StatusCode::BAD_REQUEST))
        }
        Err(err) => {
            tracing::error!("Prediction failed: {}", err);
            Ok(error_reply(
                "Failed to run prediction",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_loaded_models_request(
    predictions: Arc<PredictionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let loaded = predictions.loaded_models().await;
    Ok(warp::reply::with_status(
        warp::reply::json(&loaded),
        StatusCode::OK,
    ))
}

async fn handle_evict_models_request(
    kind: String,
    predictions: Arc<PredictionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let Some(kind) = ModelKind::from_slug(&kind) else {
        return Ok(error_reply("Unknown model kind", StatusCode::NOT_FOUND));
    };

    let evicted = predictions.evict(kind).await;
    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "evicted": evicted })),
        StatusCode::OK,
    ))
}
