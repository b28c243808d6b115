use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "enrollment_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EnrollmentStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct Lesson {
    pub course_id: Uuid,
    pub position: i32,
    pub title: String,
    pub video_url: Option<String>,
    pub text_content: Option<String>,
}

/// One student's relationship to one course. Certificate fields stay unset
/// until issuance succeeds.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub student_id: String,
    pub course_id: Uuid,
    pub course_title: String,
    pub status: EnrollmentStatus,
    pub completed_lessons: Vec<String>,
    pub last_watched_lesson: Option<i32>,
    pub progress: i32,
    pub enrolled_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub certificate_url: Option<String>,
    pub certificate_generated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_in_kebab_case() {
        assert_eq!(
            serde_json::to_string(&EnrollmentStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!(
            serde_json::from_str::<EnrollmentStatus>("\"not-started\"").unwrap(),
            EnrollmentStatus::NotStarted
        );
    }
}
