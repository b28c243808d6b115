use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::state::AppState;
use crate::watcher::EnrollmentUpdated;

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// 201 for a fresh enrollment, 200 when the student was already enrolled
/// and the existing record is returned unchanged.
fn enrollment_response(
    created: bool,
    enrollment: &crate::db::Enrollment,
) -> axum::response::Response {
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(serde_json::json!({ "enrollment": enrollment }))).into_response()
}

pub async fn list_courses(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match crate::db::list_courses(state.pool.as_ref()).await {
        Ok(courses) => Json(serde_json::json!({ "courses": courses })).into_response(),
        Err(e) => {
            tracing::error!("Failed to list courses: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error.")
        }
    }
}

pub async fn course_detail(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
) -> impl IntoResponse {
    let course = match crate::db::get_course(state.pool.as_ref(), course_id).await {
        Ok(Some(c)) => c,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Course not found."),
        Err(e) => {
            tracing::error!("Failed to load course {}: {}", course_id, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error.");
        }
    };

    let lessons = match crate::db::get_lessons(state.pool.as_ref(), course_id).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to load lessons for {}: {}", course_id, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error.");
        }
    };

    Json(serde_json::json!({ "course": course, "lessons": lessons })).into_response()
}

#[derive(Deserialize)]
pub struct EnrollRequest {
    pub course_id: Uuid,
}

pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
    Json(req): Json<EnrollRequest>,
) -> impl IntoResponse {
    match crate::db::get_student(state.pool.as_ref(), &student_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Student not found."),
        Err(e) => {
            tracing::error!("Failed to load student {}: {}", student_id, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error.");
        }
    }

    match crate::db::create_enrollment(state.pool.as_ref(), &student_id, req.course_id).await {
        Ok(Some((enrollment, created))) => enrollment_response(created, &enrollment),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Course not found."),
        Err(e) => {
            tracing::error!("Failed to enroll {} in {}: {}", student_id, req.course_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error.")
        }
    }
}

pub async fn list_enrollments(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
) -> impl IntoResponse {
    match crate::db::list_enrollments(state.pool.as_ref(), &student_id).await {
        Ok(enrollments) => {
            Json(serde_json::json!({ "enrollments": enrollments })).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to list enrollments for {}: {}", student_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error.")
        }
    }
}

/// Marks a lesson complete. When the update flips the enrollment to
/// completed, certificate issuance runs in the background; the response
/// does not wait for it.
pub async fn complete_lesson(
    State(state): State<Arc<AppState>>,
    Path((student_id, course_id, lesson)): Path<(String, Uuid, i32)>,
) -> impl IntoResponse {
    let completion =
        match crate::db::complete_lesson(state.pool.as_ref(), &student_id, course_id, lesson).await
        {
            Ok(Some(c)) => c,
            Ok(None) => {
                return error_response(StatusCode::NOT_FOUND, "Enrollment or lesson not found.")
            }
            Err(e) => {
                tracing::error!(
                    "Failed to complete lesson {} for {}/{}: {}",
                    lesson,
                    student_id,
                    course_id,
                    e
                );
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error.");
            }
        };

    let event = EnrollmentUpdated::from_records(&completion.prior, &completion.current);
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        pipeline.handle(event).await;
    });

    Json(serde_json::json!({ "enrollment": completion.current })).into_response()
}

#[derive(Deserialize)]
pub struct PositionRequest {
    pub lesson: i32,
}

pub async fn save_position(
    State(state): State<Arc<AppState>>,
    Path((student_id, course_id)): Path<(String, Uuid)>,
    Json(req): Json<PositionRequest>,
) -> impl IntoResponse {
    match crate::db::save_last_watched(state.pool.as_ref(), &student_id, course_id, req.lesson)
        .await
    {
        Ok(true) => Json(serde_json::json!({ "saved": true })).into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "Enrollment not found."),
        Err(e) => {
            tracing::error!(
                "Failed to save position for {}/{}: {}",
                student_id,
                course_id,
                e
            );
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Enrollment, EnrollmentStatus};
    use chrono::Utc;

    fn enrollment() -> Enrollment {
        Enrollment {
            student_id: "uid-1".to_string(),
            course_id: Uuid::nil(),
            course_title: "Intro to Faith".to_string(),
            status: EnrollmentStatus::NotStarted,
            completed_lessons: Vec::new(),
            last_watched_lesson: None,
            progress: 0,
            enrolled_at: Utc::now(),
            last_accessed: None,
            completed_at: None,
            certificate_url: None,
            certificate_generated_at: None,
        }
    }

    #[test]
    fn fresh_enrollment_is_created_and_repeat_is_ok() {
        let record = enrollment();
        assert_eq!(enrollment_response(true, &record).status(), StatusCode::CREATED);
        assert_eq!(enrollment_response(false, &record).status(), StatusCode::OK);
    }
}
