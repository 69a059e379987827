//! Cached annotation repository decorator.
//!
//! Comment pages and like counts use the social TTL tier, the shortest one.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use lexikon_core::cache::{Mutation, TtlTier};
use lexikon_core::dictionary::Comment;
use lexikon_core::storage::{AnnotationRepository, Page, Pagination, Result};

use super::CacheAside;

/// Cached annotation repository decorator.
pub struct CachedAnnotationRepository<R: ?Sized> {
    repository: Arc<R>,
    cache: CacheAside,
}

impl<R: AnnotationRepository + ?Sized> CachedAnnotationRepository<R> {
    pub fn new(repository: Arc<R>, cache: CacheAside) -> Self {
        Self { repository, cache }
    }
}

#[async_trait]
impl<R> AnnotationRepository for CachedAnnotationRepository<R>
where
    R: AnnotationRepository + ?Sized + 'static,
{
    async fn add_comment(&self, entry_id: Uuid, user_id: Uuid, body: String) -> Result<Comment> {
        let comment = self.repository.add_comment(entry_id, user_id, body).await?;

        self.cache.invalidate(Mutation::Annotation { entry_id }).await;
        tracing::debug!(comment_id = %comment.id, %entry_id, %user_id, "Comment added");
        Ok(comment)
    }

    async fn list_comments(&self, entry_id: Uuid, page: Pagination) -> Result<Page<Comment>> {
        let key = self.cache.keys().entry_comments(entry_id, page);
        self.cache
            .get_or_load(key, TtlTier::Social, || {
                self.repository.list_comments(entry_id, page)
            })
            .await
    }

    async fn delete_comment(&self, id: Uuid) -> Result<Comment> {
        let removed = self.repository.delete_comment(id).await?;

        self.cache
            .invalidate(Mutation::Annotation {
                entry_id: removed.entry_id,
            })
            .await;
        tracing::debug!(comment_id = %id, entry_id = %removed.entry_id, "Comment deleted");
        Ok(removed)
    }

    async fn like(&self, entry_id: Uuid, user_id: Uuid) -> Result<bool> {
        let added = self.repository.like(entry_id, user_id).await?;

        if added {
            self.cache.invalidate(Mutation::Annotation { entry_id }).await;
        }
        tracing::debug!(%entry_id, %user_id, added, "Entry liked");
        Ok(added)
    }

    async fn unlike(&self, entry_id: Uuid, user_id: Uuid) -> Result<bool> {
        let removed = self.repository.unlike(entry_id, user_id).await?;

        if removed {
            self.cache.invalidate(Mutation::Annotation { entry_id }).await;
        }
        tracing::debug!(%entry_id, %user_id, removed, "Entry unliked");
        Ok(removed)
    }

    async fn count_likes(&self, entry_id: Uuid) -> Result<u64> {
        let key = self.cache.keys().entry_likes(entry_id);
        self.cache
            .get_or_load(key, TtlTier::Social, || self.repository.count_likes(entry_id))
            .await
    }

    async fn purge_entry(&self, entry_id: Uuid) -> Result<u64> {
        let removed = self.repository.purge_entry(entry_id).await?;

        self.cache.invalidate(Mutation::Annotation { entry_id }).await;
        tracing::debug!(%entry_id, removed, "Entry annotations purged");
        Ok(removed)
    }
}
