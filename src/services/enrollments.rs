use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{segment, ListResponse};
use crate::client::ApiClient;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    #[serde(alias = "_id")]
    pub id: String,
    pub course_id: String,
    /// Percent complete, 0 to 100.
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub completed_lessons: Vec<String>,
    #[serde(default)]
    pub enrolled_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    pub fn is_complete(&self) -> bool { self.progress >= 100.0 }
}

#[derive(Clone)]
pub struct EnrollmentService {
    api: ApiClient,
}

impl EnrollmentService {
    pub fn new(api: ApiClient) -> Self { Self { api } }

    pub async fn enroll(&self, course_id: &str) -> AppResult<Enrollment> {
        self.api.post_json("enrollments", &serde_json::json!({ "courseId": course_id })).await
    }

    pub async fn mine(&self) -> AppResult<Vec<Enrollment>> {
        let list: ListResponse<Enrollment> = self.api.get_json("enrollments/me").await?;
        Ok(list.into_vec())
    }

    /// Redeem an admin-issued enrollment code.
    pub async fn redeem_code(&self, code: &str) -> AppResult<Enrollment> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::user("invalid_code", "enrollment code is empty"));
        }
        self.api.post_json("enrollments/redeem", &serde_json::json!({ "code": code })).await
    }

    pub async fn update_progress(&self, enrollment_id: &str, lesson_id: &str, completed: bool) -> AppResult<Enrollment> {
        let body = serde_json::json!({ "lessonId": lesson_id, "completed": completed });
        self.api.put_json(&format!("enrollments/{}/progress", segment(enrollment_id)), &body).await
    }
}
