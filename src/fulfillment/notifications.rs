// Notification outbox. Delivery (SMS, push) is handled by a separate worker
// reading the `notifications` table.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::NotificationDispatcher;
use crate::error::AppResult;

pub struct NotificationOutbox {
    pool: PgPool,
}

impl NotificationOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationDispatcher for NotificationOutbox {
    async fn notify(&self, user_id: &str, message: &str) -> AppResult<()> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, body, status, retry_count, created_at)
            VALUES ($1, $2, $3, 'pending', 0, $4)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!("📬 Notification queued: {} for user {}", id, user_id);
        Ok(())
    }
}
