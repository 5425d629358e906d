use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use postgres_types::Json;
use tokio_postgres::NoTls;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Business, NewBusiness, NewUserProfile, Schedule, UserProfile};

#[cfg(test)]
pub mod memory;

/// Unique index enforcing one business per owner
pub const OWNER_UNIQUE: &str = "businesses_owner_id_key";
/// Unique index on profile emails
pub const USER_EMAIL_UNIQUE: &str = "users_email_key";

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const BUSINESS_COLUMNS: &str = "id, name, description, hours, city, photo_url, owner_id, owner_email, rating, business_type, address, phone, schedule, created_at, updated_at";
const USER_COLUMNS: &str = "id, email, display_name, photo_url, location, favorites, reviews, recently_visited, created_at, updated_at";

type Result<T> = std::result::Result<T, StoreError>;

/// Document store behind every directory operation
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn create_business(&self, business: NewBusiness) -> Result<Business>;
    async fn get_business(&self, business_id: Uuid) -> Result<Option<Business>>;
    async fn get_business_for_owner(&self, owner_id: &str) -> Result<Option<Business>>;
    /// Exact, case-sensitive match on `city`, backend order.
    async fn list_businesses_by_city(&self, city: &str, limit: i64) -> Result<Vec<Business>>;
    /// Unknown ids are silently skipped.
    async fn list_businesses_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Business>>;
    async fn list_cities(&self) -> Result<Vec<String>>;
    async fn update_business(&self, business: Business) -> Result<Business>;

    async fn create_user(&self, profile: NewUserProfile) -> Result<UserProfile>;
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>>;
    async fn update_user(&self, profile: UserProfile) -> Result<UserProfile>;
    async fn set_user_location(&self, user_id: &str, city: &str) -> Result<()>;
    /// Appends the id unless already present. Returns the new list, `None` for an unknown user.
    async fn add_favorite(&self, user_id: &str, business_id: Uuid) -> Result<Option<Vec<Uuid>>>;
    /// Removes every occurrence of the id. Returns the new list, `None` for an unknown user.
    async fn remove_favorite(&self, user_id: &str, business_id: Uuid)
        -> Result<Option<Vec<Uuid>>>;
    /// Moves the id to the front of the visit history, keeping at most `cap` entries.
    async fn record_visit(&self, user_id: &str, business_id: Uuid, cap: usize) -> Result<()>;
}

pub struct DatabaseService {
    pool: Pool,
}

impl DatabaseService {
    pub async fn new(database_url: &str) -> Result<Self> {
        let mut cfg = Config::new();
        cfg.url = Some(database_url.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Other(e.to_string()))?;
        let client = pool.get().await?;
        client.execute("SELECT 1", &[]).await?;

        log::info!("Database connection established");
        Ok(Self { pool })
    }

    /// Applies the embedded schema. Every statement is idempotent.
    pub async fn init_schema(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client.batch_execute(SCHEMA).await?;
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for DatabaseService {
    async fn create_business(&self, business: NewBusiness) -> Result<Business> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO businesses ({BUSINESS_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) RETURNING {BUSINESS_COLUMNS}"
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &business.id,
                    &business.name,
                    &business.description,
                    &business.hours,
                    &business.city,
                    &business.photo_url,
                    &business.owner_id,
                    &business.owner_email,
                    &business.rating,
                    &business.business_type,
                    &business.address,
                    &business.phone,
                    &business.schedule.as_ref().map(Json),
                    &business.created_at,
                    &business.updated_at,
                ],
            )
            .await?;

        Ok(row_to_business(&row))
    }

    async fn get_business(&self, business_id: Uuid) -> Result<Option<Business>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = $1"),
                &[&business_id],
            )
            .await?;

        Ok(row.map(|r| row_to_business(&r)))
    }

    async fn get_business_for_owner(&self, owner_id: &str) -> Result<Option<Business>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE owner_id = $1"),
                &[&owner_id],
            )
            .await?;

        Ok(row.map(|r| row_to_business(&r)))
    }

    async fn list_businesses_by_city(&self, city: &str, limit: i64) -> Result<Vec<Business>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE city = $1 LIMIT $2"),
                &[&city, &limit],
            )
            .await?;

        Ok(rows.iter().map(row_to_business).collect())
    }

    async fn list_businesses_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Business>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = ANY($1)"),
                &[&ids],
            )
            .await?;

        Ok(rows.iter().map(row_to_business).collect())
    }

    async fn list_cities(&self) -> Result<Vec<String>> {
        let client = self.pool.get().await?;
        let rows = client
            .query("SELECT DISTINCT city FROM businesses ORDER BY city", &[])
            .await?;

        Ok(rows.iter().map(|r| r.get("city")).collect())
    }

    async fn update_business(&self, business: Business) -> Result<Business> {
        let client = self.pool.get().await?;
        let sql = format!(
            "UPDATE businesses SET name = $2, description = $3, hours = $4, city = $5, photo_url = $6, owner_email = $7, rating = $8, business_type = $9, address = $10, phone = $11, schedule = $12, updated_at = NOW() WHERE id = $1 RETURNING {BUSINESS_COLUMNS}"
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &business.id,
                    &business.name,
                    &business.description,
                    &business.hours,
                    &business.city,
                    &business.photo_url,
                    &business.owner_email,
                    &business.rating,
                    &business.business_type,
                    &business.address,
                    &business.phone,
                    &business.schedule.as_ref().map(Json),
                ],
            )
            .await?;

        Ok(row_to_business(&row))
    }

    async fn create_user(&self, profile: NewUserProfile) -> Result<UserProfile> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO users (id, email, display_name, photo_url, location, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &profile.id,
                    &profile.email,
                    &profile.display_name,
                    &profile.photo_url,
                    &profile.location,
                    &profile.created_at,
                    &profile.updated_at,
                ],
            )
            .await?;

        Ok(row_to_user(&row))
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"),
                &[&user_id],
            )
            .await?;

        Ok(row.map(|r| row_to_user(&r)))
    }

    async fn update_user(&self, profile: UserProfile) -> Result<UserProfile> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!("UPDATE users SET display_name = $2, photo_url = $3, location = $4, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"),
                &[&profile.id, &profile.display_name, &profile.photo_url, &profile.location],
            )
            .await?;

        Ok(row_to_user(&row))
    }

    async fn set_user_location(&self, user_id: &str, city: &str) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE users SET location = $2, updated_at = NOW() WHERE id = $1",
                &[&user_id, &city],
            )
            .await?;
        Ok(())
    }

    async fn add_favorite(&self, user_id: &str, business_id: Uuid) -> Result<Option<Vec<Uuid>>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "UPDATE users SET favorites = CASE WHEN $2 = ANY(favorites) THEN favorites ELSE array_append(favorites, $2) END, updated_at = NOW() WHERE id = $1 RETURNING favorites",
                &[&user_id, &business_id],
            )
            .await?;

        Ok(row.map(|r| r.get("favorites")))
    }

    async fn remove_favorite(
        &self,
        user_id: &str,
        business_id: Uuid,
    ) -> Result<Option<Vec<Uuid>>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "UPDATE users SET favorites = array_remove(favorites, $2), updated_at = NOW() WHERE id = $1 RETURNING favorites",
                &[&user_id, &business_id],
            )
            .await?;

        Ok(row.map(|r| r.get("favorites")))
    }

    async fn record_visit(&self, user_id: &str, business_id: Uuid, cap: usize) -> Result<()> {
        let cap = i32::try_from(cap).unwrap_or(i32::MAX);
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE users SET recently_visited = (array_prepend($2::uuid, array_remove(recently_visited, $2::uuid)))[1:$3::int], updated_at = NOW() WHERE id = $1",
                &[&user_id, &business_id, &cap],
            )
            .await?;
        Ok(())
    }
}

// Row mapping functions
fn row_to_business(row: &tokio_postgres::Row) -> Business {
    let schedule: Option<Json<Schedule>> = row.get("schedule");
    Business {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        hours: row.get("hours"),
        city: row.get("city"),
        photo_url: row.get("photo_url"),
        owner_id: row.get("owner_id"),
        owner_email: row.get("owner_email"),
        rating: row.get("rating"),
        business_type: row.get("business_type"),
        address: row.get("address"),
        phone: row.get("phone"),
        schedule: schedule.map(|Json(s)| s),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_user(row: &tokio_postgres::Row) -> UserProfile {
    UserProfile {
        id: row.get("id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        photo_url: row.get("photo_url"),
        location: row.get("location"),
        favorites: row.get("favorites"),
        reviews: row.get("reviews"),
        recently_visited: row.get("recently_visited"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
