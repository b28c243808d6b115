// Completion watcher: decides when an enrollment update warrants
// certificate issuance and runs the render -> store -> record pipeline.
// Failures anywhere in the pipeline are logged and swallowed here; the
// enrollment record is only touched after storage and URL signing succeed.

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::certificate::CertificateRenderer;
use crate::db::{Enrollment, EnrollmentStatus};
use crate::storage::{certificate_object_key, far_future_expiry, ObjectStore};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const NAME_FALLBACK: &str = "Valued Student";
const COURSE_FALLBACK: &str = "Course";

/// The fields of an enrollment record the watcher inspects.
#[derive(Debug, Clone)]
pub struct EnrollmentSnapshot {
    pub status: EnrollmentStatus,
    pub course_title: String,
}

impl From<&Enrollment> for EnrollmentSnapshot {
    fn from(record: &Enrollment) -> Self {
        Self {
            status: record.status,
            course_title: record.course_title.clone(),
        }
    }
}

/// One observed update of an enrollment record, as an atomic
/// before/after pair.
#[derive(Debug, Clone)]
pub struct EnrollmentUpdated {
    pub student_id: String,
    pub course_id: Uuid,
    pub prior: EnrollmentSnapshot,
    pub current: EnrollmentSnapshot,
}

impl EnrollmentUpdated {
    pub fn from_records(prior: &Enrollment, current: &Enrollment) -> Self {
        Self {
            student_id: current.student_id.clone(),
            course_id: current.course_id,
            prior: prior.into(),
            current: current.into(),
        }
    }
}

/// Enrollment-record reads and writes the pipeline needs. Injected so the
/// pipeline can be exercised without a database.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn display_name(&self, student_id: &str) -> Result<Option<String>, BoxError>;
    async fn record_issuance(
        &self,
        student_id: &str,
        course_id: Uuid,
        url: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<(), BoxError>;
}

/// True exactly for transitions into completed from any other status.
pub fn should_issue(prior: EnrollmentStatus, current: EnrollmentStatus) -> bool {
    current == EnrollmentStatus::Completed && prior != EnrollmentStatus::Completed
}

pub struct CertificatePipeline {
    records: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    renderer: CertificateRenderer,
}

impl CertificatePipeline {
    pub fn new(
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        renderer: CertificateRenderer,
    ) -> Self {
        Self {
            records,
            objects,
            renderer,
        }
    }

    /// Entry point for enrollment-update events. Non-qualifying updates are
    /// ignored; a failed issuance leaves the record without a certificate
    /// and is visible only in the logs.
    pub async fn handle(&self, event: EnrollmentUpdated) {
        if !should_issue(event.prior.status, event.current.status) {
            return;
        }

        tracing::info!(
            student_id = %event.student_id,
            course_id = %event.course_id,
            "generating certificate"
        );

        match self.issue(&event).await {
            Ok(url) => {
                tracing::info!(
                    student_id = %event.student_id,
                    course_id = %event.course_id,
                    url = %url,
                    "certificate generated and URL saved"
                );
            }
            Err(e) => {
                tracing::error!(
                    student_id = %event.student_id,
                    course_id = %event.course_id,
                    error = %e,
                    "certificate generation failed"
                );
            }
        }
    }

    async fn issue(&self, event: &EnrollmentUpdated) -> Result<String, BoxError> {
        let student_name = self
            .records
            .display_name(&event.student_id)
            .await?
            .unwrap_or_else(|| NAME_FALLBACK.to_string());

        // The enrollment record carries the title it was created with;
        // prefer it over a second course lookup.
        let course_title = if event.current.course_title.is_empty() {
            COURSE_FALLBACK.to_string()
        } else {
            event.current.course_title.clone()
        };

        let completion_date = Local::now().format("%B %d, %Y").to_string();
        let bytes = self
            .renderer
            .render(&student_name, &course_title, &completion_date)?;

        let key = certificate_object_key(&event.student_id, event.course_id);
        self.objects.save(&key, &bytes, "application/pdf").await?;
        let url = self.objects.signed_url(&key, far_future_expiry()).await?;

        self.records
            .record_issuance(&event.student_id, event.course_id, &url, Utc::now())
            .await?;

        Ok(url)
    }
}
