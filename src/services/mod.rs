//! Typed wrappers over the marketplace resource endpoints. All calls go through
//! the authenticated [`ApiClient`](crate::client::ApiClient).

pub mod courses;
pub mod enrollments;
pub mod wishlist;

use serde::Deserialize;

pub use courses::{Course, CourseDraft, CourseQuery, CourseService, Lesson, Section};
pub use enrollments::{Enrollment, EnrollmentService};
pub use wishlist::WishlistService;

/// List endpoints answer either with a bare array or with the items wrapped
/// under `items`, `data` or a resource-named key.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListResponse<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "data", alias = "courses", alias = "enrollments", alias = "wishlist")]
        items: Vec<T>,
    },
}

impl<T> ListResponse<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self { ListResponse::Bare(v) | ListResponse::Wrapped { items: v } => v }
    }
}

/// Percent-encode a single path segment.
pub(crate) fn segment(id: &str) -> String { urlencoding::encode(id).into_owned() }
