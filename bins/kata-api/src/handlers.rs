// HTTP route handlers for the Kata API
//
// Engine outcomes (including unsupported languages and failed runs) are
// always 200 OK with the result in the body; only malformed requests are
// rejected, by axum's Json extractor.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use kata_common::types::{
    CombinedExecutionResult, ExecutionResult, Language, ScoringConfig, SyntaxCheckResult,
    ValidationError, ValidationErrorKind,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub language: String,
    #[serde(alias = "userCode")]
    pub code: String,
    #[serde(default)]
    pub test_file_name: String,
    pub kata_dir: PathBuf,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRequest {
    pub language: String,
    #[serde(alias = "userCode")]
    pub code: String,
    pub kata_dir: PathBuf,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub scoring: Option<ScoringConfig>,
}

#[derive(Debug, Deserialize)]
pub struct CheckSyntaxRequest {
    pub language: String,
    pub code: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LanguageInfo {
    pub name: String,
    pub display_name: String,
    pub extension: String,
    pub enabled: bool,
}

/// POST /execute - Run a submission against one test file
pub async fn execute(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExecuteRequest>,
) -> Json<ExecutionResult> {
    let timeout_ms = payload
        .timeout_ms
        .unwrap_or(state.settings.default_timeout_ms);

    let result = state
        .engine
        .execute_code(
            &payload.language,
            &payload.code,
            &payload.test_file_name,
            &payload.kata_dir,
            payload.hidden,
            timeout_ms,
        )
        .await;

    info!(
        language = %payload.language,
        hidden = payload.hidden,
        success = result.success,
        duration_ms = result.duration,
        "Execute request served"
    );
    Json(result)
}

/// POST /grade - Public + hidden runs folded into one verdict
pub async fn grade(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GradeRequest>,
) -> Json<CombinedExecutionResult> {
    let timeout_ms = payload
        .timeout_ms
        .unwrap_or(state.settings.default_timeout_ms);

    let combined = state
        .engine
        .grade(
            &payload.language,
            &payload.code,
            &payload.kata_dir,
            timeout_ms,
            payload.scoring.as_ref(),
        )
        .await;

    info!(
        language = %payload.language,
        final_score = combined.final_score,
        passed = combined.passed,
        "Grade request served"
    );
    Json(combined)
}

/// POST /check-syntax - Validate without executing
pub async fn check_syntax(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CheckSyntaxRequest>,
) -> Json<SyntaxCheckResult> {
    let language = match payload.language.parse::<Language>() {
        Ok(language) => language,
        Err(message) => {
            return Json(SyntaxCheckResult {
                is_valid: false,
                errors: vec![ValidationError {
                    kind: ValidationErrorKind::Internal,
                    message,
                    file: None,
                    line: None,
                }],
                warnings: Vec::new(),
                suggestions: Vec::new(),
            })
        }
    };

    Json(state.validator.check_syntax(&payload.code, language).await)
}

/// GET /languages - Every known language and whether it can run
pub async fn list_languages(State(state): State<Arc<AppState>>) -> Json<Vec<LanguageInfo>> {
    let config = state.engine.config();
    let languages = Language::ALL
        .into_iter()
        .map(|language| LanguageInfo {
            name: language.to_string(),
            display_name: language.display_name().to_string(),
            extension: language.extension().to_string(),
            enabled: config.is_enabled(&language),
        })
        .collect();
    Json(languages)
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
