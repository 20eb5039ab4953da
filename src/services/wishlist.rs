use super::{segment, Course, ListResponse};
use crate::client::ApiClient;
use crate::error::AppResult;

#[derive(Clone)]
pub struct WishlistService {
    api: ApiClient,
}

impl WishlistService {
    pub fn new(api: ApiClient) -> Self { Self { api } }

    pub async fn list(&self) -> AppResult<Vec<Course>> {
        let list: ListResponse<Course> = self.api.get_json("wishlist").await?;
        Ok(list.into_vec())
    }

    pub async fn add(&self, course_id: &str) -> AppResult<()> {
        let _: serde_json::Value = self.api.post_json("wishlist", &serde_json::json!({ "courseId": course_id })).await?;
        Ok(())
    }

    pub async fn remove(&self, course_id: &str) -> AppResult<()> {
        self.api.delete(&format!("wishlist/{}", segment(course_id))).await
    }
}
