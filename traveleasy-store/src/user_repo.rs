use async_trait::async_trait;
use sqlx::PgPool;
use traveleasy_core::repository::{RepoError, RepoResult, UserRepository};
use traveleasy_core::{CoreError, ProviderProfile, User};
use traveleasy_shared::Masked;
use uuid::Uuid;

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, travel_name, contact, vehicle, \
                            is_verified, verification_code, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    travel_name: Option<String>,
    contact: Option<String>,
    vehicle: Option<String>,
    is_verified: bool,
    verification_code: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepoError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let provider = match (row.travel_name, row.contact, row.vehicle) {
            (Some(travel_name), Some(contact), Some(vehicle)) => Some(ProviderProfile {
                travel_name,
                contact,
                vehicle,
            }),
            _ => None,
        };

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: Masked(row.password_hash),
            role: row.role.parse()?,
            provider,
            is_verified: row.is_verified,
            verification_code: row.verification_code.map(Masked),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &User) -> RepoResult<()> {
        let profile = user.provider.as_ref();

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, travel_name, contact, vehicle,
                               is_verified, verification_code, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.password_hash.expose())
        .bind(user.role.as_str())
        .bind(profile.map(|p| p.travel_name.as_str()))
        .bind(profile.map(|p| p.contact.as_str()))
        .bind(profile.map(|p| p.vehicle.as_str()))
        .bind(user.is_verified)
        .bind(user.verification_code.as_ref().map(|c| c.expose().as_str()))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Duplicate("User with this email already exists".to_string())
            }
            other => RepoError::backend(other),
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepoError::backend)?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepoError::backend)?;

        row.map(User::try_from).transpose()
    }

    async fn update_verification(&self, user: &User) -> RepoResult<()> {
        let result = sqlx::query(
            "UPDATE users SET is_verified = $1, verification_code = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(user.is_verified)
        .bind(user.verification_code.as_ref().map(|c| c.expose().as_str()))
        .bind(user.updated_at)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(RepoError::backend)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound("User"));
        }
        Ok(())
    }

    async fn reissue_code(&self, user: &User) -> RepoResult<()> {
        let result = sqlx::query(
            "UPDATE users SET verification_code = $1, updated_at = $2 WHERE id = $3 AND is_verified = FALSE",
        )
        .bind(user.verification_code.as_ref().map(|c| c.expose().as_str()))
        .bind(user.updated_at)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(RepoError::backend)?;

        // The caller has just loaded this user, so a miss means it was verified meanwhile.
        if result.rows_affected() == 0 {
            return Err(CoreError::already_verified().into());
        }
        Ok(())
    }
}
