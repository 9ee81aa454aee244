use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::AppError;
use crate::users::repo_types::User;

/// Persistence seam for users.
///
/// Callers go through `users::services`, which validates input before
/// anything reaches an implementation.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// All users, newest first; ties on `created_at` are broken by `id` descending.
    async fn list_users(&self) -> Result<Vec<User>, AppError>;

    /// Inserts a user with an already validated name and returns the stored row.
    async fn insert_user(&self, name: &str) -> Result<User, AppError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
    op_timeout: Duration,
    // Set once the `users` table is known to exist; a failed attempt leaves it empty.
    schema_ready: Arc<OnceCell<()>>,
}

impl PgUserRepository {
    pub fn new(db: PgPool, op_timeout: Duration) -> Self {
        Self {
            db,
            op_timeout,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    /// Creates the table on first use, retrying on every call until it succeeds.
    async fn ensure_schema(&self) -> Result<(), AppError> {
        self.schema_ready
            .get_or_try_init(|| async {
                match tokio::time::timeout(self.op_timeout, crate::db::ensure_schema(&self.db)).await
                {
                    Ok(Ok(())) => {
                        info!("users table ready");
                        Ok(())
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "could not prepare users table");
                        Err(schema_error(e))
                    }
                    Err(_) => {
                        warn!(timeout = ?self.op_timeout, "preparing users table timed out");
                        Err(AppError::StorageTimeout(self.op_timeout))
                    }
                }
            })
            .await
            .map(|_| ())
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, AppError>
    where
        T: Send,
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => {
                warn!(op, error = %e, "store operation failed");
                Err(e.into())
            }
            Err(_) => {
                warn!(op, timeout = ?self.op_timeout, "store operation timed out");
                Err(AppError::StorageTimeout(self.op_timeout))
            }
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.ensure_schema().await?;
        self.bounded("list_users", async {
            // Returned to the pool when `conn` drops, on every path.
            let mut conn = self.db.acquire().await?;
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, name, created_at
                FROM users
                ORDER BY created_at DESC, id DESC
                "#,
            )
            .fetch_all(&mut *conn)
            .await
        })
        .await
    }

    async fn insert_user(&self, name: &str) -> Result<User, AppError> {
        self.ensure_schema().await?;
        self.bounded("insert_user", async {
            let mut conn = self.db.acquire().await?;
            sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (name)
                VALUES ($1)
                RETURNING id, name, created_at
                "#,
            )
            .bind(name)
            .fetch_one(&mut *conn)
            .await
        })
        .await
    }
}

// Keeps the sqlx classification (unavailable vs. internal) for bootstrap failures.
fn schema_error(e: anyhow::Error) -> AppError {
    match e.downcast::<sqlx::Error>() {
        Ok(db_err) => db_err.into(),
        Err(other) => AppError::Internal(other),
    }
}
