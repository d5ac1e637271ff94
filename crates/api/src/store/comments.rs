//! Durable mirror of chat messages as ticket comments

use async_trait::async_trait;
use helpdesk_shared::{HelpdeskError, Identity, TicketId};
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Persist a chat message as a comment on its ticket, returning the comment id
    async fn save_comment(
        &self,
        ticket_id: TicketId,
        content: &str,
        author: &Identity,
    ) -> Result<Uuid, HelpdeskError>;
}

#[derive(Clone)]
pub struct PgCommentStore {
    pool: PgPool,
}

impl PgCommentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentStore for PgCommentStore {
    async fn save_comment(
        &self,
        ticket_id: TicketId,
        content: &str,
        author: &Identity,
    ) -> Result<Uuid, HelpdeskError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO comments (ticket_id, comment, author_id, author_type)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(ticket_id.0)
        .bind(content)
        .bind(author.id)
        .bind(author.role.author_type())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}
