//! Postgres-backed user store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{StoreError, UserStore};
use crate::models::{RefreshTokenRecord, User};

/// Maps a unique violation on insert to the given domain error.
fn map_unique(e: sqlx::Error, users_table: bool) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let on_email = db
                .constraint()
                .map(|c| c.contains("email"))
                .unwrap_or(users_table);
            return if on_email {
                StoreError::DuplicateEmail
            } else {
                StoreError::DuplicateToken
            };
        }
    }
    StoreError::from(e)
}

#[derive(Clone)]
pub struct PgUserStore {
    db_pool: PgPool,
}

impl PgUserStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.db_pool).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(user)
    }

    async fn create(&self, user: &User, initial: &RefreshTokenRecord) -> Result<(), StoreError> {
        let mut tx = self.db_pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique(e, true))?;

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token_hash, user_id, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&initial.token_hash)
        .bind(user.id)
        .bind(initial.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique(e, false))?;

        tx.commit().await?;
        Ok(())
    }

    async fn add_refresh_token(
        &self,
        user_id: Uuid,
        record: &RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token_hash, user_id, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&record.token_hash)
        .bind(user_id)
        .bind(record.created_at)
        .execute(&self.db_pool)
        .await
        .map_err(|e| map_unique(e, false))?;

        Ok(())
    }

    async fn refresh_tokens(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let records = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            SELECT token_hash, created_at
            FROM refresh_tokens
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(records)
    }

    async fn has_refresh_token(&self, user_id: Uuid, token_hash: &str) -> Result<bool, StoreError> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(SELECT 1 FROM refresh_tokens WHERE user_id = $1 AND token_hash = $2)
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(found)
    }

    async fn replace_refresh_token(
        &self,
        user_id: Uuid,
        old_hash: &str,
        new: &RefreshTokenRecord,
    ) -> Result<bool, StoreError> {
        let mut tx = self.db_pool.begin().await?;

        // A concurrent rotation of the same token blocks on the row lock here and
        // then sees zero rows once the winner commits.
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM refresh_tokens
            WHERE user_id = $1 AND token_hash = $2
            "#,
        )
        .bind(user_id)
        .bind(old_hash)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token_hash, user_id, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&new.token_hash)
        .bind(user_id)
        .bind(new.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique(e, false))?;

        tx.commit().await?;
        Ok(true)
    }

    async fn revoke_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> Result<bool, StoreError> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM refresh_tokens WHERE user_id = $1 AND token_hash = $2
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn revoke_all_refresh_tokens(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM refresh_tokens WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }

    async fn prune_refresh_tokens(
        &self,
        user_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM refresh_tokens WHERE user_id = $1 AND created_at < $2
            "#,
        )
        .bind(user_id)
        .bind(cutoff)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        // refresh_tokens rows go with the user via ON DELETE CASCADE
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM users WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        Ok(rows_affected > 0)
    }
}
