//! In-memory comments and likes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use lexikon_core::dictionary::{timestamp_now, Comment, Like};
use lexikon_core::storage::{AnnotationRepository, Page, Pagination, RepositoryError, Result};

#[derive(Debug, Default)]
struct Annotations {
    comments: HashMap<Uuid, Comment>,
    /// entry_id -> user_id -> like
    likes: HashMap<Uuid, BTreeMap<Uuid, Like>>,
}

/// Process-local store for social annotations.
///
/// Annotations are not part of the entry graph; the entry delete handler
/// clears them through `purge_entry`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAnnotations {
    inner: Arc<RwLock<Annotations>>,
}

impl InMemoryAnnotations {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnnotationRepository for InMemoryAnnotations {
    async fn add_comment(&self, entry_id: Uuid, user_id: Uuid, body: String) -> Result<Comment> {
        let comment = Comment::new(entry_id, user_id, body);
        self.inner
            .write()
            .await
            .comments
            .insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, entry_id: Uuid, page: Pagination) -> Result<Page<Comment>> {
        let inner = self.inner.read().await;
        let mut comments: Vec<Comment> = inner
            .comments
            .values()
            .filter(|c| c.entry_id == entry_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| (c.created_at, c.id));
        Ok(page.paginate(comments))
    }

    async fn delete_comment(&self, id: Uuid) -> Result<Comment> {
        self.inner
            .write()
            .await
            .comments
            .remove(&id)
            .ok_or_else(|| RepositoryError::not_found("Comment", id))
    }

    async fn like(&self, entry_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let likes = inner.likes.entry(entry_id).or_default();
        if likes.contains_key(&user_id) {
            return Ok(false);
        }
        likes.insert(
            user_id,
            Like {
                entry_id,
                user_id,
                created_at: timestamp_now(),
            },
        );
        Ok(true)
    }

    async fn unlike(&self, entry_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let removed = inner
            .likes
            .get_mut(&entry_id)
            .and_then(|likes| likes.remove(&user_id))
            .is_some();
        if inner.likes.get(&entry_id).is_some_and(BTreeMap::is_empty) {
            inner.likes.remove(&entry_id);
        }
        Ok(removed)
    }

    async fn count_likes(&self, entry_id: Uuid) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner.likes.get(&entry_id).map_or(0, |l| l.len() as u64))
    }

    async fn purge_entry(&self, entry_id: Uuid) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.comments.len();
        inner.comments.retain(|_, c| c.entry_id != entry_id);
        let comments = before - inner.comments.len();
        let likes = inner.likes.remove(&entry_id).map_or(0, |l| l.len());
        Ok((comments + likes) as u64)
    }
}
