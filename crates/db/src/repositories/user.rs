use chrono::Utc;
use sqlx::sqlite::SqliteRow;

use rfq_tracker_core::domain::user::{NewUser, Role, User, UserId, UserPatch};
use rfq_tracker_core::errors::DomainError;

use super::{column, format_timestamp, parse_enum, parse_timestamp, RepositoryError, UserRepository};
use crate::DbPool;

const USER_COLUMNS: &str =
    "id, username, email, full_name, role, is_active, created_at, updated_at";

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User, RepositoryError> {
    let role: String = column(row, "role")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(User {
        id: UserId(column(row, "id")?),
        username: column(row, "username")?,
        email: column(row, "email")?,
        full_name: column(row, "full_name")?,
        role: parse_enum(&role)?,
        is_active: column(row, "is_active")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn already_exists() -> RepositoryError {
    RepositoryError::Rejected(DomainError::Validation("user already exists".to_string()))
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn create(&self, input: NewUser) -> Result<User, RepositoryError> {
        input.validate()?;

        let now = Utc::now();
        let user = User {
            id: UserId::generate(),
            username: input.username.trim().to_string(),
            email: input.email.trim().to_ascii_lowercase(),
            full_name: input.full_name.trim().to_string(),
            role: input.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let result = sqlx::query(
            "INSERT INTO users (id, username, email, full_name, role, is_active,
                                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(&user.id.0)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(format_timestamp(user.created_at))
        .bind(format_timestamp(user.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(user),
            Err(error) if is_unique_violation(&error) => Err(already_exists()),
            Err(error) => Err(error.into()),
        }
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE is_active = 1 OR ?
             ORDER BY full_name ASC, username ASC"
        ))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_user).collect()
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE role = ? AND is_active = 1
             ORDER BY full_name ASC"
        ))
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_user).collect()
    }

    async fn update(
        &self,
        id: &UserId,
        patch: &UserPatch,
    ) -> Result<Option<User>, RepositoryError> {
        patch.validate()?;

        let Some(mut user) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        if let Some(email) = &patch.email {
            user.email = email.trim().to_ascii_lowercase();
        }
        if let Some(full_name) = &patch.full_name {
            user.full_name = full_name.trim().to_string();
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(is_active) = patch.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();

        let result = sqlx::query(
            "UPDATE users SET email = ?, full_name = ?, role = ?, is_active = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(format_timestamp(user.updated_at))
        .bind(&user.id.0)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(Some(user)),
            Err(error) if is_unique_violation(&error) => Err(already_exists()),
            Err(error) => Err(error.into()),
        }
    }

    async fn deactivate(&self, id: &UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE users SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(format_timestamp(Utc::now()))
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_permanently(&self, id: &UserId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        detach_user_references(&mut *tx, &id.0).await?;

        let result =
            sqlx::query("DELETE FROM users WHERE id = ?").bind(&id.0).execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        tracing::info!(event_name = "user.deleted_permanently", user_id = %id, "user removed");
        Ok(true)
    }
}

/// Clears every foreign reference to `user_id` so the row can be deleted.
pub(crate) async fn detach_user_references(
    conn: &mut sqlx::SqliteConnection,
    user_id: &str,
) -> Result<(), RepositoryError> {
    for statement in [
        "UPDATE rfqs SET assigned_engineer_id = NULL WHERE assigned_engineer_id = ?",
        "UPDATE rfqs SET assigned_sales_person_id = NULL WHERE assigned_sales_person_id = ?",
        "UPDATE rfqs SET created_by = NULL WHERE created_by = ?",
        "DELETE FROM notifications WHERE user_id = ?",
        "UPDATE status_audit_log SET changed_by = NULL WHERE changed_by = ?",
        "UPDATE quotations SET created_by = NULL WHERE created_by = ?",
        "UPDATE quotation_documents SET uploaded_by = NULL WHERE uploaded_by = ?",
    ] {
        sqlx::query(statement).bind(user_id).execute(&mut *conn).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rfq_tracker_core::domain::user::{NewUser, Role, UserPatch};
    use rfq_tracker_core::errors::DomainError;

    use super::SqlUserRepository;
    use crate::repositories::test_support::{setup, user};
    use crate::repositories::{RepositoryError, UserRepository};

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool.clone());
        user(&pool, "asha", Role::Sales).await;

        let error = repo
            .create(NewUser {
                username: "asha".to_string(),
                email: "other@example.com".to_string(),
                full_name: "Asha Again".to_string(),
                role: Role::Sales,
            })
            .await
            .expect_err("duplicate username");

        assert!(matches!(
            error,
            RepositoryError::Rejected(DomainError::Validation(ref message))
                if message == "user already exists"
        ));
    }

    #[tokio::test]
    async fn list_by_role_returns_active_users_only() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool.clone());
        let active = user(&pool, "eng-a", Role::Engineer).await;
        let inactive = user(&pool, "eng-b", Role::Engineer).await;
        user(&pool, "sales-a", Role::Sales).await;

        assert!(repo.deactivate(&inactive.id).await.expect("deactivate"));

        let engineers = repo.list_by_role(Role::Engineer).await.expect("by role");
        assert_eq!(engineers.len(), 1);
        assert_eq!(engineers[0].id, active.id);

        assert_eq!(repo.list(false).await.expect("active").len(), 2);
        assert_eq!(repo.list(true).await.expect("all").len(), 3);
    }

    #[tokio::test]
    async fn update_changes_role_and_full_name() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool.clone());
        let created = user(&pool, "ravi", Role::Engineer).await;

        let updated = repo
            .update(
                &created.id,
                &UserPatch {
                    full_name: Some("Ravi Kumar".to_string()),
                    role: Some(Role::Management),
                    ..UserPatch::default()
                },
            )
            .await
            .expect("update")
            .expect("user exists");

        assert_eq!(updated.full_name, "Ravi Kumar");
        assert_eq!(updated.role, Role::Management);
        let stored = repo.find_by_id(&created.id).await.expect("find").expect("stored");
        assert_eq!(stored.role, Role::Management);
    }

    #[tokio::test]
    async fn permanent_delete_of_missing_user_reports_false() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool);
        let deleted = repo
            .delete_permanently(&rfq_tracker_core::domain::user::UserId("ghost".to_string()))
            .await
            .expect("delete");
        assert!(!deleted);
    }
}
