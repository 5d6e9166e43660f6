//! HTTP handlers for the browser extension.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;

use crate::error::AnalysisError;
use crate::model::Provenance;
use crate::pipeline::{AnalysisOutcome, Analyzer, ServedFrom};

pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    /// Whether cached verdicts survive a restart
    pub persistent_cache: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    /// Product page URL; `https://` is added when the scheme is missing
    pub url: String,
    #[serde(default)]
    pub include_recommendations: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecommendationView {
    pub title: String,
    pub price: Option<f64>,
    pub score: u8,
    pub url: String,
    pub similarity: f64,
    pub explanation_text: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MetaView {
    pub confidence: f64,
    pub data_quality: f64,
    pub low_confidence: bool,
    pub sentences: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DescriptionView {
    pub key_features: Vec<String>,
    pub feature_completeness: f64,
    pub usability_score: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResponse {
    pub ok: bool,
    pub score: u8,
    /// "Recommended", "Acceptable" or "Not Recommended"
    pub recommendation: String,
    /// `[aspect, polarity]` pairs, strongest first
    #[schema(value_type = Vec<Object>)]
    pub pros: Vec<(String, f64)>,
    #[schema(value_type = Vec<Object>)]
    pub cons: Vec<(String, f64)>,
    pub recommendations: Vec<RecommendationView>,
    pub voice_verdict: String,
    pub insight: String,
    pub meta: MetaView,
    /// Up to three quoted sentences per aspect
    #[schema(value_type = Object)]
    pub aspect_support: BTreeMap<String, Vec<String>>,
    pub description_analysis: DescriptionView,
    pub product_title: String,
    pub product_url: String,
    pub category: String,
    pub price: Option<f64>,
    pub reviews_analyzed: usize,
    /// Seconds spent serving the request
    pub processing_time: f64,
    pub offline: bool,
    pub stale: bool,
    pub cached: bool,
}

impl AnalysisResponse {
    pub fn from_outcome(outcome: AnalysisOutcome, processing_time: f64) -> Self {
        let AnalysisOutcome {
            product,
            analysis,
            recommendations,
            served_from,
        } = outcome;
        Self {
            ok: true,
            score: analysis.score,
            recommendation: analysis.label.to_string(),
            pros: analysis.pros,
            cons: analysis.cons,
            recommendations: recommendations
                .into_iter()
                .map(|r| RecommendationView {
                    title: r.title,
                    price: r.price,
                    score: r.score,
                    url: r.url,
                    similarity: (r.similarity * 1000.0).round() / 1000.0,
                    explanation_text: r.explanation.text,
                })
                .collect(),
            aspect_support: analysis
                .aspects
                .into_iter()
                .filter(|a| !a.evidence.is_empty())
                .map(|a| (a.aspect, a.evidence))
                .collect(),
            description_analysis: DescriptionView {
                key_features: analysis.description.key_features,
                feature_completeness: analysis.description.feature_completeness,
                usability_score: analysis.description.usability_score,
            },
            voice_verdict: analysis.voice_verdict,
            insight: analysis.insight,
            meta: MetaView {
                confidence: analysis.meta.confidence,
                data_quality: analysis.meta.data_quality,
                low_confidence: analysis.meta.low_confidence,
                sentences: analysis.meta.sentences,
            },
            product_title: product.title,
            product_url: product.url,
            category: product.category,
            price: product.price,
            reviews_analyzed: analysis.meta.reviews_used,
            processing_time: (processing_time * 100.0).round() / 100.0,
            offline: analysis.meta.provenance == Provenance::Offline,
            stale: served_from == ServedFrom::StaleCache,
            cached: matches!(served_from, ServedFrom::Cache | ServedFrom::StaleCache),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthFeatures {
    pub recommendations: bool,
    pub voice_verdict: bool,
    pub category_detection: bool,
    pub offline_fallback: bool,
    pub persistent_cache: bool,
    pub vader: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub ok: bool,
    pub status: String,
    pub version: String,
    pub cached_products: usize,
    pub features: HealthFeatures,
    pub timestamp: String,
}

fn status_for(e: &AnalysisError) -> StatusCode {
    match e {
        AnalysisError::UnsupportedSite { .. } | AnalysisError::InvalidUrl { .. } => {
            StatusCode::BAD_REQUEST
        }
        AnalysisError::SourceUnavailable(_) | AnalysisError::AnalysisFailed { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[utoipa::path(
    post,
    path = "/api/extension/analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Worth score, pros/cons and alternatives", body = AnalysisResponse),
        (status = 400, description = "Unsupported or malformed product URL", body = ErrorResponse),
        (status = 503, description = "No score could be produced", body = ErrorResponse)
    ),
    tag = "verdict"
)]
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResponse>, (StatusCode, Json<ErrorResponse>)> {
    let started = Instant::now();
    if req.url.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                ok: false,
                error: "url is required".into(),
            }),
        ));
    }

    match state
        .analyzer
        .analyze(&req.url, req.include_recommendations)
        .await
    {
        Ok(outcome) => {
            let elapsed = started.elapsed().as_secs_f64();
            info!(
                url = %req.url,
                served_from = ?outcome.served_from,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Analyze request served"
            );
            Ok(Json(AnalysisResponse::from_outcome(outcome, elapsed)))
        }
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!(url = %req.url, error = %e, "Analyze request failed");
            } else {
                info!(url = %req.url, error = %e, "Analyze request rejected");
            }
            Err((
                status,
                Json(ErrorResponse {
                    ok: false,
                    error: e.to_string(),
                }),
            ))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/extension/health",
    responses((status = 200, description = "Service status and enabled features", body = HealthResponse)),
    tag = "verdict"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let settings = state.analyzer.settings();
    Json(HealthResponse {
        ok: true,
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        cached_products: state.analyzer.store().len(),
        features: HealthFeatures {
            recommendations: settings.recommendation_limit > 0,
            voice_verdict: true,
            category_detection: true,
            offline_fallback: settings.offline_fallback,
            persistent_cache: state.persistent_cache,
            vader: settings.use_vader,
        },
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::source::SampleReviewSource;
    use crate::store::ReviewStore;

    fn state() -> Arc<AppState> {
        let settings = Settings {
            use_vader: false,
            ..Settings::default()
        };
        let store = Arc::new(ReviewStore::new(&settings));
        let analyzer = Analyzer::new(settings, store, Arc::new(SampleReviewSource::new()));
        Arc::new(AppState {
            analyzer: Arc::new(analyzer),
            persistent_cache: false,
        })
    }

    #[tokio::test]
    async fn test_analyze_response_shape() {
        let req = AnalyzeRequest {
            url: "www.flipkart.com/acme-laptop/p/itm0001?pid=COMABC123".into(),
            include_recommendations: true,
        };
        let Json(resp) = analyze(State(state()), Json(req)).await.unwrap();
        assert!(resp.ok);
        assert_eq!(resp.category, "laptop");
        assert!(resp.score <= 100);
        assert!(!resp.offline);
        assert!(resp.recommendations.is_empty());

        let json = serde_json::to_value(&resp).unwrap();
        assert!(json["pros"][0][0].is_string());
        assert!(json["pros"][0][1].is_number());
    }

    #[tokio::test]
    async fn test_unsupported_site_is_bad_request() {
        let req = AnalyzeRequest {
            url: "https://www.ebay.com/itm/1".into(),
            include_recommendations: false,
        };
        let (status, Json(body)) = analyze(State(state()), Json(req)).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.ok);
        assert!(body.error.contains("ebay.com"));
    }

    #[tokio::test]
    async fn test_health() {
        let Json(resp) = health(State(state())).await;
        assert!(resp.ok);
        assert!(!resp.features.vader);
        assert_eq!(resp.cached_products, 0);
    }

    #[test]
    fn test_request_defaults_to_no_recommendations() {
        let req: AnalyzeRequest = serde_json::from_str(r#"{"url":"amazon.in/dp/B0ABC12345"}"#).unwrap();
        assert!(!req.include_recommendations);
    }

    #[tokio::test]
    async fn test_response_json_round_trip() {
        let state = state();
        let outcome = state
            .analyzer
            .analyze("https://www.amazon.in/Acme-Smartphone/dp/B0ABC12345", false)
            .await
            .unwrap();
        let response = AnalysisResponse::from_outcome(outcome, 0.42);

        let json = serde_json::to_string(&response).unwrap();
        let back: AnalysisResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.score, response.score);
        assert_eq!(back.recommendation, response.recommendation);
        assert_eq!(back.pros, response.pros);
        assert_eq!(back.cons, response.cons);
        assert_eq!(back.aspect_support, response.aspect_support);
        assert_eq!(back.description_analysis.key_features, response.description_analysis.key_features);
        assert_eq!(serde_json::to_string(&back).unwrap(), json);
    }
}
