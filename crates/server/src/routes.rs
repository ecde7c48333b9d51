//! The JSON API surface: prompt processing, inquiry status polling, health.
//!
//! One pipeline per request: extract venue details, look up matching
//! restaurants, then dispatch the voice agent when extraction produced both
//! a name and a phone number. Dispatch failures never fail the request; they
//! are embedded in the response payload so partial results always reach the
//! caller.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use maitre_agent::VenueExtractor;
use maitre_core::{ClientInfo, VenueContact, VoiceCallRequest};
use maitre_db::RestaurantRepository;
use maitre_voice::VoiceAgentClient;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

const DEFAULT_CUISINE: &str = "italian";

#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<VenueExtractor>,
    pub restaurants: Arc<RestaurantRepository>,
    pub voice: Arc<dyn VoiceAgentClient>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/process-prompt", post(process_prompt))
        .route("/api/check-inquiry-status", post(check_inquiry_status))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct ProcessPromptRequest {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    cuisine: Option<String>,
    #[serde(default, rename = "clientInfo")]
    client_info: Option<ClientInfo>,
}

#[derive(Debug, Serialize)]
struct ProcessPromptResponse {
    success: bool,
    extracted_venue: VenueContact,
    matching_restaurants: Vec<Value>,
    phone_numbers: Vec<VenueContact>,
    voice_agent_result: Option<Value>,
    message: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct InquiryStatusRequest {
    #[serde(default)]
    inquiry_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct InquiryStatusResponse {
    success: bool,
    inquiry_status: Value,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError { error: message.to_string(), details: None }),
    )
        .into_response()
}

async fn process_prompt(State(state): State<AppState>, body: String) -> Response {
    let correlation_id = Uuid::new_v4();
    // Malformed or absent bodies are treated as empty requests so the
    // missing-prompt answer stays uniform.
    let request: ProcessPromptRequest = serde_json::from_str(&body).unwrap_or_default();

    let Some(prompt) = request.prompt.filter(|prompt| !prompt.trim().is_empty()) else {
        return bad_request("Prompt is required");
    };

    info!(
        event_name = "api.process_prompt.start",
        correlation_id = %correlation_id,
        prompt_chars = prompt.len(),
        "processing prompt"
    );

    let extracted = state.extractor.extract(&prompt).await;

    let cuisine = request
        .cuisine
        .map(|cuisine| cuisine.trim().to_string())
        .filter(|cuisine| !cuisine.is_empty())
        .unwrap_or_else(|| DEFAULT_CUISINE.to_string());

    let restaurants = match state.restaurants.by_cuisine(&cuisine).await {
        Ok(rows) => rows,
        Err(lookup_error) => {
            error!(
                event_name = "api.process_prompt.lookup_failed",
                correlation_id = %correlation_id,
                error = %lookup_error,
                "restaurant lookup failed"
            );
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError {
                    error: "Failed to process prompt".to_string(),
                    details: Some(lookup_error.to_string()),
                }),
            )
                .into_response();
        }
    };

    let phone_numbers: Vec<VenueContact> =
        restaurants.iter().map(|record| record.contact()).collect();

    let voice_agent_result = if extracted.is_complete() {
        let call = VoiceCallRequest::from_parts(&extracted, &request.client_info.unwrap_or_default());
        match state.voice.dispatch(&call).await {
            Ok(stdout) => Some(Value::String(stdout)),
            Err(dispatch_error) => {
                warn!(
                    event_name = "api.process_prompt.dispatch_failed",
                    correlation_id = %correlation_id,
                    error = %dispatch_error,
                    "voice agent dispatch failed, returning partial result"
                );
                Some(json!({ "error": dispatch_error.to_string() }))
            }
        }
    } else {
        info!(
            event_name = "api.process_prompt.dispatch_skipped",
            correlation_id = %correlation_id,
            "venue details incomplete, skipping voice agent"
        );
        None
    };

    info!(
        event_name = "api.process_prompt.completed",
        correlation_id = %correlation_id,
        restaurant_count = restaurants.len(),
        dispatched = voice_agent_result.is_some(),
        "prompt processed"
    );

    Json(ProcessPromptResponse {
        success: true,
        extracted_venue: extracted,
        matching_restaurants: restaurants.iter().map(|record| record.as_json()).collect(),
        phone_numbers,
        voice_agent_result,
        message: "Prompt processed successfully",
    })
    .into_response()
}

async fn check_inquiry_status(State(state): State<AppState>, body: String) -> Response {
    let correlation_id = Uuid::new_v4();
    let request: InquiryStatusRequest = serde_json::from_str(&body).unwrap_or_default();
    let inquiry_id = request.inquiry_id.filter(|id| !id.trim().is_empty());

    let Some(inquiry_id) = inquiry_id else {
        return bad_request("inquiry_id is required");
    };

    info!(
        event_name = "api.check_inquiry_status.start",
        correlation_id = %correlation_id,
        inquiry_id = %inquiry_id,
        "checking inquiry status"
    );

    match state.voice.check_status(&inquiry_id).await {
        Ok(inquiry_status) => Json(InquiryStatusResponse {
            success: true,
            inquiry_status,
            message: "Inquiry status retrieved successfully",
        })
        .into_response(),
        Err(status_error) => {
            error!(
                event_name = "api.check_inquiry_status.failed",
                correlation_id = %correlation_id,
                inquiry_id = %inquiry_id,
                error = %status_error,
                "inquiry status check failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError { error: status_error.to_string(), details: None }),
            )
                .into_response()
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "OK", "message": "Backend is running" }))
}
