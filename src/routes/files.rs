use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Local, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::certificate::CertificateError;
use crate::db::EnrollmentStatus;
use crate::state::AppState;
use crate::storage::verify_signature;

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

#[derive(Deserialize)]
pub struct SignedLink {
    pub expires: i64,
    pub sig: String,
}

/// Serves a stored object if the request carries a valid, unexpired
/// signature for its key.
pub async fn serve_object(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(link): Query<SignedLink>,
) -> impl IntoResponse {
    if link.expires < Utc::now().timestamp() {
        return error_response(StatusCode::FORBIDDEN, "Link expired.");
    }
    if !verify_signature(&state.config.url_signing_secret, &key, link.expires, &link.sig) {
        return error_response(StatusCode::FORBIDDEN, "Invalid signature.");
    }

    let path = match state.objects.resolve(&key) {
        Ok(p) => p,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid object key."),
    };

    match tokio::fs::read(&path).await {
        Ok(content) => {
            let mime = mime_guess::from_path(&key)
                .first_raw()
                .unwrap_or("application/octet-stream");
            axum::response::Response::builder()
                .header("Content-Type", mime)
                .body(axum::body::Body::from(content))
                .unwrap()
                .into_response()
        }
        Err(_) => error_response(StatusCode::NOT_FOUND, "Object not found."),
    }
}

/// On-demand certificate download: re-renders for a completed enrollment
/// and streams the bytes straight to the caller without touching storage
/// or the enrollment record.
pub async fn download_certificate(
    State(state): State<Arc<AppState>>,
    Path((student_id, course_id)): Path<(String, Uuid)>,
) -> impl IntoResponse {
    let enrollment =
        match crate::db::get_enrollment(state.pool.as_ref(), &student_id, course_id).await {
            Ok(Some(e)) => e,
            Ok(None) => return error_response(StatusCode::NOT_FOUND, "Enrollment not found."),
            Err(e) => {
                tracing::error!(
                    "Failed to load enrollment {}/{}: {}",
                    student_id,
                    course_id,
                    e
                );
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error.");
            }
        };

    if enrollment.status != EnrollmentStatus::Completed {
        return error_response(StatusCode::CONFLICT, "Course not completed yet.");
    }

    let student_name = match crate::db::get_student(state.pool.as_ref(), &student_id).await {
        Ok(student) => student
            .and_then(|s| s.display_name)
            .unwrap_or_else(|| "Valued Student".to_string()),
        Err(e) => {
            tracing::error!("Failed to load student {}: {}", student_id, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error.");
        }
    };

    let completion_date = enrollment
        .completed_at
        .map(|at| at.with_timezone(&Local))
        .unwrap_or_else(|| Local::now())
        .format("%B %d, %Y")
        .to_string();

    let bytes = match state
        .renderer
        .render(&student_name, &enrollment.course_title, &completion_date)
    {
        Ok(b) => b,
        Err(e @ CertificateError::TemplateMissing(_)) => {
            tracing::error!("Certificate render failed: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Certificate template is missing.",
            );
        }
        Err(e) => {
            tracing::error!("Certificate render failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Certificate error.");
        }
    };

    let download_name = format!(
        "{}-certificate.pdf",
        enrollment.course_title.replace(' ', "_")
    );

    axum::response::Response::builder()
        .header("Content-Type", "application/pdf")
        .header(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", download_name),
        )
        .body(axum::body::Body::from(bytes))
        .unwrap()
        .into_response()
}
