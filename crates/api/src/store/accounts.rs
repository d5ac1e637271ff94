//! Account lookup for login

use async_trait::async_trait;
use helpdesk_shared::{HelpdeskError, Identity, Role};
use sqlx::PgPool;
use uuid::Uuid;

/// Account record with its credential hash
#[derive(Debug, Clone)]
pub struct Account {
    pub identity: Identity,
    pub password_hash: String,
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Find a staff user or customer by email
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, HelpdeskError>;

    /// Connectivity check for readiness probes
    async fn ping(&self) -> Result<(), HelpdeskError>;
}

/// Postgres-backed directory over the `users` and `customers` tables
#[derive(Clone)]
pub struct PgAccountDirectory {
    pool: PgPool,
}

impl PgAccountDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password: String,
    role: String,
    tenant_ids: Vec<String>,
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    name: String,
    password: String,
    tenant_id: Option<Uuid>,
}

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, HelpdeskError> {
        let user = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT u.id, u.username, u.password, u.role::text AS role,
                   COALESCE(
                     ARRAY_AGG(tu.tenant_id::text) FILTER (WHERE tu.tenant_id IS NOT NULL),
                     '{}'
                   ) AS tenant_ids
            FROM users u
            LEFT JOIN tenant_users tu ON tu.user_id = u.id
            WHERE u.email = $1
            GROUP BY u.id
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = user {
            let role = row
                .role
                .parse::<Role>()
                .map_err(HelpdeskError::Validation)?;
            return Ok(Some(Account {
                identity: Identity {
                    id: row.id,
                    username: row.username,
                    role,
                    belong: row.tenant_ids,
                },
                password_hash: row.password,
            }));
        }

        let customer = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, name, password, tenant_id FROM customers WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer.map(|row| Account {
            identity: Identity {
                id: row.id,
                username: row.name,
                role: Role::Customer,
                belong: row.tenant_id.map(|t| vec![t.to_string()]).unwrap_or_default(),
            },
            password_hash: row.password,
        }))
    }

    async fn ping(&self) -> Result<(), HelpdeskError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
