//! Catalog collaborator: courses and their content sequence.
//!
//! The catalog is an external collaborator of the settlement engine; it
//! supplies course prices for order creation and the ordered content
//! sequence for gating. Implement [`CatalogStore`] against your course
//! database. An in-memory implementation is provided for development
//! and testing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A purchasable course.
///
/// The price is fixed at creation: later changes never retroactively
/// alter existing orders, which snapshot their amount due.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Course {
    /// Course ID.
    pub id: String,
    /// Domain the course is grouped under.
    pub domain_id: String,
    /// Display title.
    pub title: String,
    /// Price in the smallest currency unit.
    pub price: u64,
}

/// One item in a course's ordered content sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentItem {
    /// Item ID.
    pub id: String,
    /// Owning course.
    pub course_id: String,
    /// Position in the sequence; positive and unique per course.
    pub sequence_order: u32,
    /// Display title.
    pub title: String,
    /// Reference to the item's media payload.
    pub media_ref: String,
}

/// Trait for the course catalog.
///
/// Implement this trait against your catalog database. An in-memory
/// implementation is provided for testing.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Get a course by ID.
    async fn get_course(&self, course_id: &str) -> Result<Option<Course>>;

    /// Get a course's content items, ordered by `sequence_order`.
    async fn list_content(&self, course_id: &str) -> Result<Vec<ContentItem>>;
}

/// In-memory catalog store for development and testing.
#[derive(Default, Clone)]
pub struct InMemoryCatalogStore {
    inner: std::sync::Arc<tokio::sync::RwLock<InMemoryCatalogInner>>,
}

#[derive(Default)]
struct InMemoryCatalogInner {
    courses: std::collections::HashMap<String, Course>,
    content: std::collections::HashMap<String, Vec<ContentItem>>,
}

impl InMemoryCatalogStore {
    /// Create an empty in-memory catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a course.
    pub async fn seed_course(&self, course: Course) {
        let mut inner = self.inner.write().await;
        inner.courses.insert(course.id.clone(), course);
    }

    /// Seed a course's content items. Items are kept sorted by
    /// `sequence_order`.
    pub async fn seed_content(&self, course_id: &str, mut items: Vec<ContentItem>) {
        items.sort_by_key(|i| i.sequence_order);
        let mut inner = self.inner.write().await;
        inner.content.insert(course_id.to_string(), items);
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn get_course(&self, course_id: &str) -> Result<Option<Course>> {
        Ok(self.inner.read().await.courses.get(course_id).cloned())
    }

    async fn list_content(&self, course_id: &str) -> Result<Vec<ContentItem>> {
        Ok(self
            .inner
            .read()
            .await
            .content
            .get(course_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, order: u32) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            course_id: "course_1".to_string(),
            sequence_order: order,
            title: format!("Lesson {}", order),
            media_ref: format!("media://{}", id),
        }
    }

    #[tokio::test]
    async fn test_in_memory_catalog() {
        let store = InMemoryCatalogStore::new();

        assert!(store.get_course("course_1").await.unwrap().is_none());

        store
            .seed_course(Course {
                id: "course_1".to_string(),
                domain_id: "domain_1".to_string(),
                title: "Rust Fundamentals".to_string(),
                price: 1000,
            })
            .await;

        let course = store.get_course("course_1").await.unwrap().unwrap();
        assert_eq!(course.price, 1000);
    }

    #[tokio::test]
    async fn test_content_kept_sorted() {
        let store = InMemoryCatalogStore::new();
        store
            .seed_content("course_1", vec![item("c", 3), item("a", 1), item("b", 2)])
            .await;

        let items = store.list_content("course_1").await.unwrap();
        let orders: Vec<u32> = items.iter().map(|i| i.sequence_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_unknown_course_has_no_content() {
        let store = InMemoryCatalogStore::new();
        assert!(store.list_content("missing").await.unwrap().is_empty());
    }
}
