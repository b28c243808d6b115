mod models;

pub use models::*;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::watcher::{BoxError, RecordStore};

pub type DbPool = Arc<PgPool>;

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn list_courses(pool: &PgPool) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

pub async fn get_course(pool: &PgPool, course_id: Uuid) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_optional(pool)
        .await
}

pub async fn get_lessons(pool: &PgPool, course_id: Uuid) -> Result<Vec<Lesson>, sqlx::Error> {
    sqlx::query_as::<_, Lesson>(
        "SELECT * FROM course_lessons WHERE course_id = $1 ORDER BY position",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await
}

pub async fn get_student(pool: &PgPool, student_id: &str) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
        .bind(student_id)
        .fetch_optional(pool)
        .await
}

pub async fn get_enrollment(
    pool: &PgPool,
    student_id: &str,
    course_id: Uuid,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE student_id = $1 AND course_id = $2",
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_enrollments(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE student_id = $1 ORDER BY enrolled_at DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
}

/// Creates the enrollment record if the course exists. Enrolling twice is a
/// no-op; the existing record is returned with `created` false.
pub async fn create_enrollment(
    pool: &PgPool,
    student_id: &str,
    course_id: Uuid,
) -> Result<Option<(Enrollment, bool)>, sqlx::Error> {
    let Some(course) = get_course(pool, course_id).await? else {
        return Ok(None);
    };

    let result = sqlx::query(
        r#"
        INSERT INTO enrollments (student_id, course_id, course_title, status, progress)
        VALUES ($1, $2, $3, 'not-started', 0)
        ON CONFLICT (student_id, course_id) DO NOTHING
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .bind(&course.title)
    .execute(pool)
    .await?;
    let created = result.rows_affected() > 0;

    let enrollment = get_enrollment(pool, student_id, course_id).await?;
    Ok(enrollment.map(|e| (e, created)))
}

pub async fn save_last_watched(
    pool: &PgPool,
    student_id: &str,
    course_id: Uuid,
    lesson: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE enrollments
        SET last_watched_lesson = $3, last_accessed = now()
        WHERE student_id = $1 AND course_id = $2
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .bind(lesson)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Before/after snapshots of a single enrollment update.
#[derive(Debug, Clone)]
pub struct LessonCompletion {
    pub prior: Enrollment,
    pub current: Enrollment,
}

/// Marks one lesson complete and recomputes progress and status inside a
/// transaction. The row lock means only one request can observe the flip
/// to completed, so duplicate issuance events are never produced.
pub async fn complete_lesson(
    pool: &PgPool,
    student_id: &str,
    course_id: Uuid,
    lesson: i32,
) -> Result<Option<LessonCompletion>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let prior = sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE student_id = $1 AND course_id = $2 FOR UPDATE",
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(prior) = prior else {
        return Ok(None);
    };

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM course_lessons WHERE course_id = $1")
            .bind(course_id)
            .fetch_one(&mut *tx)
            .await?;
    if lesson < 0 || i64::from(lesson) >= total {
        return Ok(None);
    }

    let lesson_id = lesson.to_string();
    if prior.completed_lessons.contains(&lesson_id) {
        // Already counted; nothing changes and no event fires.
        return Ok(Some(LessonCompletion {
            current: prior.clone(),
            prior,
        }));
    }

    let mut completed = prior.completed_lessons.clone();
    completed.push(lesson_id);
    let progress = ((completed.len() as f64 / total as f64) * 100.0).round() as i32;
    let all_done = completed.len() as i64 >= total;
    let status = if all_done {
        EnrollmentStatus::Completed
    } else {
        EnrollmentStatus::InProgress
    };

    let current = sqlx::query_as::<_, Enrollment>(
        r#"
        UPDATE enrollments
        SET completed_lessons = $3,
            progress = $4,
            status = $5,
            completed_at = CASE WHEN $6 THEN now() ELSE completed_at END,
            last_accessed = now()
        WHERE student_id = $1 AND course_id = $2
        RETURNING *
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .bind(&completed)
    .bind(progress)
    .bind(status)
    .bind(all_done)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(LessonCompletion { prior, current }))
}

pub async fn set_certificate(
    pool: &PgPool,
    student_id: &str,
    course_id: Uuid,
    url: &str,
    issued_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE enrollments
        SET certificate_url = $3, certificate_generated_at = $4
        WHERE student_id = $1 AND course_id = $2
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .bind(url)
    .bind(issued_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Postgres-backed record store for the certificate pipeline.
pub struct PgRecordStore {
    pool: DbPool,
}

impl PgRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RecordStore for PgRecordStore {
    async fn display_name(&self, student_id: &str) -> Result<Option<String>, BoxError> {
        let student = get_student(self.pool.as_ref(), student_id).await?;
        Ok(student.and_then(|s| s.display_name))
    }

    async fn record_issuance(
        &self,
        student_id: &str,
        course_id: Uuid,
        url: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<(), BoxError> {
        set_certificate(self.pool.as_ref(), student_id, course_id, url, issued_at).await?;
        Ok(())
    }
}
