use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{segment, ListResponse};
use crate::client::ApiClient;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub instructor_id: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub video_url: Option<String>,
    /// Free preview lesson.
    #[serde(default)]
    pub preview: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

/// Fields an instructor sets when creating or editing a course.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseDraft {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl CourseDraft {
    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::user("invalid_course", "course title is required"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(AppError::user("invalid_course".to_string(), format!("invalid price {}", self.price)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub page: Option<u32>,
}

impl CourseQuery {
    pub fn search(text: impl Into<String>) -> Self { Self { search: Some(text.into()), ..Default::default() } }

    pub fn to_path(&self) -> String {
        let mut params: Vec<String> = Vec::new();
        if let Some(s) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            params.push(format!("search={}", urlencoding::encode(s)));
        }
        if let Some(c) = self.category.as_deref().filter(|s| !s.is_empty()) {
            params.push(format!("category={}", urlencoding::encode(c)));
        }
        if let Some(p) = self.page { params.push(format!("page={}", p)); }
        if params.is_empty() { "courses".to_string() } else { format!("courses?{}", params.join("&")) }
    }
}

/// Course catalogue access. Course details are cached until the session's
/// reload epoch changes.
#[derive(Clone)]
pub struct CourseService {
    api: ApiClient,
    cache: Arc<RwLock<(u64, HashMap<String, Course>)>>,
}

impl CourseService {
    pub fn new(api: ApiClient) -> Self { Self { api, cache: Arc::new(RwLock::new((0, HashMap::new()))) } }

    pub async fn list(&self, query: &CourseQuery) -> AppResult<Vec<Course>> {
        let list: ListResponse<Course> = self.api.get_json(&query.to_path()).await?;
        Ok(list.into_vec())
    }

    pub async fn get(&self, id: &str) -> AppResult<Course> {
        let epoch = self.api.session().epoch();
        {
            let cache = self.cache.read();
            if cache.0 == epoch {
                if let Some(c) = cache.1.get(id) { return Ok(c.clone()); }
            }
        }
        let course: Course = self.api.get_json(&format!("courses/{}", segment(id))).await?;
        let mut cache = self.cache.write();
        if cache.0 != epoch { *cache = (epoch, HashMap::new()); }
        cache.1.insert(id.to_string(), course.clone());
        Ok(course)
    }

    pub async fn sections(&self, course_id: &str) -> AppResult<Vec<Section>> {
        let list: ListResponse<Section> = self.api.get_json(&format!("courses/{}/sections", segment(course_id))).await?;
        let mut sections = list.into_vec();
        sections.sort_by_key(|s| s.order);
        Ok(sections)
    }

    pub async fn create(&self, draft: &CourseDraft) -> AppResult<Course> {
        draft.validate()?;
        self.api.post_json("courses", draft).await
    }

    pub async fn update(&self, id: &str, draft: &CourseDraft) -> AppResult<Course> {
        draft.validate()?;
        let course: Course = self.api.put_json(&format!("courses/{}", segment(id)), draft).await?;
        self.cache.write().1.remove(id);
        Ok(course)
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.api.delete(&format!("courses/{}", segment(id))).await?;
        self.cache.write().1.remove(id);
        Ok(())
    }
}
