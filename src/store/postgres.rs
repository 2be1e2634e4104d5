// src/store/postgres.rs
use super::{ChatStore, HireRequestStore, PlanStore, Store, UserStore};
use crate::error::{AppError, Result};
use crate::hire::{self, Decision};
use crate::models::{
    ChatMessage, ClientProfile, DietPlan, Exercise, HireRequest, Meal, PlanBundle, Role,
    TrainingPlan, User,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::types::Json;
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL,
        name TEXT NOT NULL,
        role TEXT NOT NULL,
        image_url TEXT,
        bio TEXT,
        specialties TEXT[] NOT NULL DEFAULT '{}',
        certifications TEXT[] NOT NULL DEFAULT '{}',
        trainer_id TEXT,
        trainer_status TEXT NOT NULL DEFAULT 'none',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS profiles_email_key ON profiles (LOWER(email))",
    r#"
    CREATE TABLE IF NOT EXISTS credentials (
        user_id TEXT PRIMARY KEY REFERENCES profiles(id) ON DELETE CASCADE,
        password_hash TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS hire_requests (
        id TEXT PRIMARY KEY,
        client_id TEXT NOT NULL,
        trainer_id TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS hire_requests_trainer_idx ON hire_requests (trainer_id, status)",
    r#"
    CREATE TABLE IF NOT EXISTS chat_messages (
        seq BIGSERIAL PRIMARY KEY,
        id TEXT NOT NULL UNIQUE,
        sender_id TEXT NOT NULL,
        receiver_id TEXT NOT NULL,
        text TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS chat_messages_pair_idx ON chat_messages (sender_id, receiver_id)",
    r#"
    CREATE TABLE IF NOT EXISTS client_profiles (
        user_id TEXT PRIMARY KEY,
        weight DOUBLE PRECISION NOT NULL,
        height DOUBLE PRECISION NOT NULL,
        goal TEXT NOT NULL,
        activity_level TEXT NOT NULL,
        medical_conditions TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS training_plans (
        id TEXT PRIMARY KEY,
        client_id TEXT NOT NULL,
        trainer_id TEXT NOT NULL,
        exercises JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS diet_plans (
        id TEXT PRIMARY KEY,
        client_id TEXT NOT NULL,
        trainer_id TEXT NOT NULL,
        meals JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
];

const USER_COLUMNS: &str = "id, email, name, role, image_url, bio, specialties, certifications, \
                            trainer_id, trainer_status, created_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: String,
    role: String,
    image_url: Option<String>,
    bio: Option<String>,
    specialties: Vec<String>,
    certifications: Vec<String>,
    trainer_id: Option<String>,
    trainer_status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> anyhow::Result<Self> {
        let mut user = User::new(row.id, row.email, row.name, row.role.parse()?);
        user.image_url = row.image_url;
        user.bio = row.bio;
        user.specialties = row.specialties;
        user.certifications = row.certifications;
        user.created_at = row.created_at;
        user.restore_trainer_link(row.trainer_id, row.trainer_status.parse()?);
        Ok(user)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(Debug, sqlx::FromRow)]
struct HireRequestRow {
    id: String,
    client_id: String,
    trainer_id: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<HireRequestRow> for HireRequest {
    type Error = anyhow::Error;

    fn try_from(row: HireRequestRow) -> anyhow::Result<Self> {
        Ok(HireRequest {
            id: row.id,
            client_id: row.client_id,
            trainer_id: row.trainer_id,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChatMessageRow {
    id: String,
    sender_id: String,
    receiver_id: String,
    text: String,
    created_at: DateTime<Utc>,
}

impl From<ChatMessageRow> for ChatMessage {
    fn from(row: ChatMessageRow) -> Self {
        ChatMessage {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            text: row.text,
            timestamp: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ClientProfileRow {
    user_id: String,
    weight: f64,
    height: f64,
    goal: String,
    activity_level: String,
    medical_conditions: String,
}

impl From<ClientProfileRow> for ClientProfile {
    fn from(row: ClientProfileRow) -> Self {
        ClientProfile {
            user_id: row.user_id,
            weight: row.weight,
            height: row.height,
            goal: row.goal,
            activity_level: row.activity_level,
            medical_conditions: row.medical_conditions,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TrainingPlanRow {
    id: String,
    client_id: String,
    trainer_id: String,
    exercises: Json<Vec<Exercise>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct DietPlanRow {
    id: String,
    client_id: String,
    trainer_id: String,
    meals: Json<Vec<Meal>>,
    created_at: DateTime<Utc>,
}

fn to_users(rows: Vec<UserRow>) -> anyhow::Result<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

/// Postgres store. Each hire transition runs in one transaction with the
/// request and client rows locked.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and make sure every table exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to create schema")?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn lock_user(conn: &mut PgConnection, id: &str) -> anyhow::Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM profiles WHERE id = $1 FOR UPDATE",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to lock user")?;
    row.map(User::try_from).transpose()
}

async fn write_trainer_link(conn: &mut PgConnection, user: &User) -> anyhow::Result<()> {
    sqlx::query("UPDATE profiles SET trainer_id = $2, trainer_status = $3 WHERE id = $1")
        .bind(&user.id)
        .bind(user.trainer_id())
        .bind(user.trainer_status().as_str())
        .execute(&mut *conn)
        .await
        .context("Failed to update trainer link")?;
    Ok(())
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: &User, password_hash: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let inserted = sqlx::query(
            r#"INSERT INTO profiles (id, email, name, role, image_url, bio, specialties, certifications, trainer_id, trainer_status, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(&user.image_url)
        .bind(&user.bio)
        .bind(&user.specialties)
        .bind(&user.certifications)
        .bind(user.trainer_id())
        .bind(user.trainer_status().as_str())
        .bind(user.created_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return Err(AppError::Conflict("Email already exists".to_string()));
                }
            }
            return Err(anyhow::Error::new(e).context("Failed to create user").into());
        }

        sqlx::query("INSERT INTO credentials (user_id, password_hash) VALUES ($1, $2)")
            .bind(&user.id)
            .bind(password_hash)
            .execute(&mut *tx)
            .await
            .context("Failed to store credentials")?;
        tx.commit().await.context("Failed to commit user")?;
        Ok(())
    }

    async fn user(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM profiles WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get user by id")?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn credentials(&self, email: &str) -> Result<Option<(User, String)>> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {}, password_hash FROM profiles JOIN credentials ON credentials.user_id = profiles.id \
             WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get credentials by email")?;
        match row {
            Some(row) => Ok(Some((User::try_from(row.user)?, row.password_hash))),
            None => Ok(None),
        }
    }

    async fn update_profile(&self, user: &User) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let Some(stored) = lock_user(&mut tx, &user.id).await? else {
            return Ok(false);
        };
        hire::check_role_change(&stored, user.role)?;
        sqlx::query(
            r#"UPDATE profiles SET name = $2, role = $3, image_url = $4, bio = $5, specialties = $6, certifications = $7
               WHERE id = $1"#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(&user.image_url)
        .bind(&user.bio)
        .bind(&user.specialties)
        .bind(&user.certifications)
        .execute(&mut *tx)
        .await
        .context("Failed to update profile")?;
        tx.commit().await.context("Failed to commit profile update")?;
        Ok(true)
    }

    async fn users_with_role(&self, role: Role) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM profiles WHERE role = $1 ORDER BY created_at",
            USER_COLUMNS
        ))
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users by role")?;
        Ok(to_users(rows)?)
    }

    async fn clients_of(&self, trainer_id: &str) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM profiles WHERE role = 'client' AND trainer_id = $1 AND trainer_status = 'accepted' \
             ORDER BY created_at",
            USER_COLUMNS
        ))
        .bind(trainer_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list clients of trainer")?;
        Ok(to_users(rows)?)
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM profiles ORDER BY created_at",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;
        Ok(to_users(rows)?)
    }

    async fn delete_user(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let Some(user) = lock_user(&mut tx, id).await? else {
            return Ok(false);
        };
        if user.is_trainer() {
            sqlx::query(
                "UPDATE profiles SET trainer_id = NULL, trainer_status = 'none' WHERE trainer_id = $1",
            )
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to unlink clients of deleted trainer")?;
        }
        sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete user")?;
        tx.commit().await.context("Failed to commit user deletion")?;
        Ok(true)
    }
}

#[async_trait]
impl HireRequestStore for PgStore {
    async fn open_request(
        &self,
        client_id: &str,
        trainer_id: &str,
    ) -> Result<(User, HireRequest)> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut client = lock_user(&mut tx, client_id)
            .await?
            .ok_or(AppError::NotFound("Client"))?;
        let trainer = lock_user(&mut tx, trainer_id)
            .await?
            .ok_or(AppError::NotFound("Trainer"))?;

        let request = hire::open(Uuid::new_v4().to_string(), &mut client, &trainer, Utc::now())?;

        sqlx::query(
            "INSERT INTO hire_requests (id, client_id, trainer_id, status, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&request.id)
        .bind(&request.client_id)
        .bind(&request.trainer_id)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .execute(&mut *tx)
        .await
        .context("Failed to create hire request")?;
        write_trainer_link(&mut tx, &client).await?;
        tx.commit().await.context("Failed to commit hire request")?;

        Ok((client, request))
    }

    async fn resolve_request(
        &self,
        request_id: &str,
        decision: Decision,
    ) -> Result<(HireRequest, Option<User>)> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let row = sqlx::query_as::<_, HireRequestRow>(
            "SELECT id, client_id, trainer_id, status, created_at FROM hire_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock hire request")?
        .ok_or(AppError::NotFound("Request"))?;
        let mut request = HireRequest::try_from(row)?;
        let mut client = lock_user(&mut tx, &request.client_id).await?;

        hire::resolve(&mut request, client.as_mut(), decision)?;

        sqlx::query("UPDATE hire_requests SET status = $2 WHERE id = $1")
            .bind(&request.id)
            .bind(request.status.as_str())
            .execute(&mut *tx)
            .await
            .context("Failed to update hire request")?;
        if let Some(client) = &client {
            write_trainer_link(&mut tx, client).await?;
        }
        tx.commit().await.context("Failed to commit hire response")?;

        Ok((request, client))
    }

    async fn request(&self, id: &str) -> Result<Option<HireRequest>> {
        let row = sqlx::query_as::<_, HireRequestRow>(
            "SELECT id, client_id, trainer_id, status, created_at FROM hire_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get hire request")?;
        Ok(row.map(HireRequest::try_from).transpose()?)
    }

    async fn pending_for_trainer(&self, trainer_id: &str) -> Result<Vec<HireRequest>> {
        let rows = sqlx::query_as::<_, HireRequestRow>(
            "SELECT id, client_id, trainer_id, status, created_at FROM hire_requests \
             WHERE trainer_id = $1 AND status = 'pending' ORDER BY created_at",
        )
        .bind(trainer_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list pending hire requests")?;
        let requests = rows
            .into_iter()
            .map(HireRequest::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(requests)
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn append_message(&self, message: &ChatMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_messages (id, sender_id, receiver_id, text, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.text)
        .bind(message.timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to store chat message")?;
        Ok(())
    }

    async fn conversation(&self, a: &str, b: &str) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, ChatMessageRow>(
            r#"SELECT id, sender_id, receiver_id, text, created_at FROM chat_messages
               WHERE (sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1)
               ORDER BY seq"#,
        )
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load conversation")?;
        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }
}

#[async_trait]
impl PlanStore for PgStore {
    async fn upsert_client_profile(&self, profile: &ClientProfile) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO client_profiles (user_id, weight, height, goal, activity_level, medical_conditions)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (user_id) DO UPDATE SET
                   weight = EXCLUDED.weight,
                   height = EXCLUDED.height,
                   goal = EXCLUDED.goal,
                   activity_level = EXCLUDED.activity_level,
                   medical_conditions = EXCLUDED.medical_conditions"#,
        )
        .bind(&profile.user_id)
        .bind(profile.weight)
        .bind(profile.height)
        .bind(&profile.goal)
        .bind(&profile.activity_level)
        .bind(&profile.medical_conditions)
        .execute(&self.pool)
        .await
        .context("Failed to save client profile")?;
        Ok(())
    }

    async fn client_profile(&self, user_id: &str) -> Result<Option<ClientProfile>> {
        let row = sqlx::query_as::<_, ClientProfileRow>(
            "SELECT user_id, weight, height, goal, activity_level, medical_conditions FROM client_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get client profile")?;
        Ok(row.map(ClientProfile::from))
    }

    async fn insert_training_plan(&self, plan: &TrainingPlan) -> Result<()> {
        sqlx::query(
            "INSERT INTO training_plans (id, client_id, trainer_id, exercises, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&plan.id)
        .bind(&plan.client_id)
        .bind(&plan.trainer_id)
        .bind(Json(&plan.exercises))
        .bind(plan.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to store training plan")?;
        Ok(())
    }

    async fn insert_diet_plan(&self, plan: &DietPlan) -> Result<()> {
        sqlx::query(
            "INSERT INTO diet_plans (id, client_id, trainer_id, meals, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&plan.id)
        .bind(&plan.client_id)
        .bind(&plan.trainer_id)
        .bind(Json(&plan.meals))
        .bind(plan.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to store diet plan")?;
        Ok(())
    }

    async fn plans_for(&self, client_id: &str) -> Result<PlanBundle> {
        let training = sqlx::query_as::<_, TrainingPlanRow>(
            "SELECT id, client_id, trainer_id, exercises, created_at FROM training_plans WHERE client_id = $1 ORDER BY created_at",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list training plans")?;
        let diet = sqlx::query_as::<_, DietPlanRow>(
            "SELECT id, client_id, trainer_id, meals, created_at FROM diet_plans WHERE client_id = $1 ORDER BY created_at",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list diet plans")?;

        Ok(PlanBundle {
            training: training
                .into_iter()
                .map(|r| TrainingPlan {
                    id: r.id,
                    client_id: r.client_id,
                    trainer_id: r.trainer_id,
                    exercises: r.exercises.0,
                    created_at: r.created_at,
                })
                .collect(),
            diet: diet
                .into_iter()
                .map(|r| DietPlan {
                    id: r.id,
                    client_id: r.client_id,
                    trainer_id: r.trainer_id,
                    meals: r.meals.0,
                    created_at: r.created_at,
                })
                .collect(),
        })
    }
}

impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }
}
