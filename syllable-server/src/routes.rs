use actix_web::error::{InternalError, JsonPayloadError, QueryPayloadError};
use actix_web::{HttpRequest, HttpResponse, Responder, get, post, web};
use log::error;
use serde::Deserialize;
use serde_json::{Value, json};

use syllable_core::error::ServiceError;
use syllable_core::model::counter::{Counted, WordOutcome, WordResult};
use syllable_core::service::SyllableService;

/// State shared by every worker.
///
/// The service handle is a channel sender; requests are serialized by the
/// counter actor behind it, so no extra lock is needed here.
pub struct AppState {
	pub service: SyllableService,
}

/// Body of `POST /count`.
#[derive(Deserialize)]
struct CountRequest {
	text: String,
	#[serde(default)]
	detailed: bool,
}

/// Query parameters of `GET /count`.
#[derive(Deserialize)]
struct CountQuery {
	text: String,
	#[serde(default)]
	detailed: bool,
}

fn error_body(kind: &str, message: impl ToString) -> Value {
	json!({"error": kind, "message": message.to_string()})
}

fn service_error(e: ServiceError) -> HttpResponse {
	HttpResponse::ServiceUnavailable().json(error_body("service_unavailable", e))
}

fn blocking_error(e: impl ToString) -> HttpResponse {
	let message = e.to_string();
	error!("blocking task failed: {message}");
	HttpResponse::InternalServerError().json(error_body("internal_error", message))
}

fn count_body(text: &str, counted: Counted<u32>) -> Value {
	match counted {
		Counted::Single(syllables) => json!({"text": text, "syllables": syllables}),
		Counted::Multiple(counts) => {
			let total: u32 = counts.iter().sum();
			json!({"text": text, "syllables": counts, "total": total})
		}
	}
}

fn detailed_body(text: &str, counted: Counted<WordOutcome>) -> Value {
	match counted {
		Counted::Single(outcome) => match outcome.result {
			WordResult::Hit { count, source } => json!({"text": text, "syllables": count, "method": source}),
			WordResult::Miss(reason) => json!({"text": text, "syllables": 0, "error": reason}),
		},
		Counted::Multiple(outcomes) => {
			let total: u32 = outcomes.iter().map(|o| o.result.syllables()).sum();
			json!({"text": text, "words": outcomes, "total": total})
		}
	}
}

/// Counts `text` on a blocking thread and renders the response.
async fn count_text(data: web::Data<AppState>, text: String, detailed: bool) -> HttpResponse {
	let service = data.service.clone();
	let body_text = text.clone();

	let result = web::block(move || {
		if detailed {
			service.count_detailed(&text).map(|counted| detailed_body(&text, counted))
		} else {
			service.count(&text).map(|counted| count_body(&text, counted))
		}
	})
	.await;

	match result {
		Ok(Ok(body)) => HttpResponse::Ok().json(body),
		Ok(Err(e)) => {
			error!("counting '{body_text}' failed: {e}");
			service_error(e)
		}
		Err(e) => blocking_error(e),
	}
}

/// HTTP GET endpoint `/health`
///
/// `ready` tells whether the counter answers; `state` stays `initializing`
/// while the model loads.
#[get("/health")]
async fn health(data: web::Data<AppState>) -> impl Responder {
	let service = data.service.clone();
	let state = match web::block(move || service.stats()).await {
		Ok(Ok(stats)) => Some(stats.state),
		_ => None,
	};
	let ready = state.is_some();
	let body = json!({
		"status": if ready { "ok" } else { "unavailable" },
		"ready": ready,
		"state": state,
		"model_status": data.service.model_status(),
	});
	if ready { HttpResponse::Ok().json(body) } else { HttpResponse::ServiceUnavailable().json(body) }
}

/// HTTP POST endpoint `/count` with a JSON body `{"text": ..., "detailed": ...}`
#[post("/count")]
async fn post_count(data: web::Data<AppState>, body: web::Json<CountRequest>) -> impl Responder {
	let CountRequest { text, detailed } = body.into_inner();
	count_text(data, text, detailed).await
}

/// HTTP GET endpoint `/count?text=...&detailed=...`
#[get("/count")]
async fn get_count(data: web::Data<AppState>, query: web::Query<CountQuery>) -> impl Responder {
	let CountQuery { text, detailed } = query.into_inner();
	count_text(data, text, detailed).await
}

#[get("/stats")]
async fn get_stats(data: web::Data<AppState>) -> impl Responder {
	let service = data.service.clone();
	match web::block(move || service.stats()).await {
		Ok(Ok(stats)) => HttpResponse::Ok().json(stats),
		Ok(Err(e)) => service_error(e),
		Err(e) => blocking_error(e),
	}
}

#[get("/benchmark")]
async fn get_benchmark(data: web::Data<AppState>) -> impl Responder {
	let service = data.service.clone();
	match web::block(move || service.benchmark()).await {
		Ok(Ok(report)) => HttpResponse::Ok().json(report),
		Ok(Err(e)) => service_error(e),
		Err(e) => blocking_error(e),
	}
}

#[get("/docs")]
async fn get_docs() -> impl Responder {
	HttpResponse::Ok().json(json!({
		"service": "syllable counter",
		"endpoints": [
			{"method": "GET", "path": "/health", "description": "Liveness of the counter and model status"},
			{"method": "POST", "path": "/count", "body": {"text": "string", "detailed": "bool (optional)"},
				"description": "Count syllables; one word yields a number, several words a list"},
			{"method": "GET", "path": "/count", "query": {"text": "string", "detailed": "bool (optional)"},
				"description": "Same as POST /count"},
			{"method": "GET", "path": "/stats", "description": "Running performance statistics"},
			{"method": "GET", "path": "/benchmark", "description": "Count a fixed word list and report timings"},
			{"method": "GET", "path": "/docs", "description": "This document"}
		],
		"methods": ["dictionary", "model"],
		"errors": ["word_not_encodable", "model_not_loaded", "model_not_available", "prediction_failed"]
	}))
}

/// Fallback for unknown routes.
pub async fn not_found(req: HttpRequest) -> HttpResponse {
	HttpResponse::NotFound().json(error_body("not_found", format!("no route for {} {}", req.method(), req.path())))
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
	let response = HttpResponse::BadRequest().json(error_body("bad_request", &err));
	InternalError::from_response(err, response).into()
}

fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
	let response = HttpResponse::BadRequest().json(error_body("bad_request", &err));
	InternalError::from_response(err, response).into()
}

/// Registers every route and the structured 400 handlers.
pub fn configure(cfg: &mut web::ServiceConfig) {
	cfg.app_data(web::JsonConfig::default().error_handler(json_error))
		.app_data(web::QueryConfig::default().error_handler(query_error))
		.service(health)
		.service(post_count)
		.service(get_count)
		.service(get_stats)
		.service(get_benchmark)
		.service(get_docs);
}
