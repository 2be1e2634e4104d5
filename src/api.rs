// src/api.rs
use crate::access;
use crate::error::{AppError, Result};
use crate::hire::{self, Decision};
use crate::models::{
    ClientProfile, DietPlan, Exercise, HireRequest, Meal, PendingHireRequest, PlanBundle, Role,
    TrainingPlan, User,
};
use crate::registry::ConnectionRegistry;
use crate::store::Store;
use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Registration payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password: String,
}

/// Profile fields a user may change. The trainer link is deliberately absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub bio: Option<String>,
    pub specialties: Option<Vec<String>>,
    pub certifications: Option<Vec<String>>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrainingPlan {
    pub client_id: String,
    pub trainer_id: String,
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDietPlan {
    pub client_id: String,
    pub trainer_id: String,
    pub meals: Vec<Meal>,
}

/// Service facade: every operation of the marketplace goes through here.
pub struct Api {
    store: Arc<dyn Store>,
    live: Arc<ConnectionRegistry>,
    bcrypt_cost: u32,
}

impl Api {
    pub fn new(store: Arc<dyn Store>, live: Arc<ConnectionRegistry>, bcrypt_cost: u32) -> Self {
        Self {
            store,
            live,
            bcrypt_cost,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn live(&self) -> &Arc<ConnectionRegistry> {
        &self.live
    }

    pub async fn register(&self, account: NewAccount) -> Result<User> {
        let email = account.email.trim();
        let name = account.name.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::validation("A valid email is required"));
        }
        if name.is_empty() {
            return Err(AppError::validation("Name is required"));
        }
        if account.password.is_empty() {
            return Err(AppError::validation("Password is required"));
        }
        if account.role == Role::Admin {
            return Err(AppError::validation("Admin accounts cannot self-register"));
        }

        let user = self
            .create_account(email, name, account.role, account.password)
            .await?;
        tracing::info!(user_id = %user.id, role = %user.role, "Registered {}", user.email);
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let Some((user, password_hash)) = self.store.credentials(email.trim()).await? else {
            tracing::info!("Login failed: unknown email {}", email);
            return Err(AppError::Unauthorized);
        };

        if verify_password(password.to_string(), password_hash).await? {
            tracing::info!(user_id = %user.id, "Login successful");
            Ok(user)
        } else {
            tracing::info!(user_id = %user.id, "Login failed: wrong password");
            Err(AppError::Unauthorized)
        }
    }

    /// Seed an admin account unless one with that email already exists.
    /// Returns true if an account was created.
    pub async fn ensure_admin(&self, email: &str, password: &str, name: &str) -> Result<bool> {
        if self.store.credentials(email).await?.is_some() {
            tracing::info!("Initial admin '{}' already exists, skipping seed", email);
            return Ok(false);
        }
        self.create_account(email, name, Role::Admin, password.to_string())
            .await?;
        tracing::info!("Created initial admin: {}", email);
        Ok(true)
    }

    async fn create_account(
        &self,
        email: &str,
        name: &str,
        role: Role,
        password: String,
    ) -> Result<User> {
        let password_hash = hash_password(password, self.bcrypt_cost).await?;
        let mut user = User::new(
            Uuid::new_v4().to_string(),
            email.to_string(),
            name.to_string(),
            role,
        );
        user.image_url = Some(format!("https://picsum.photos/seed/{}/200", email));
        self.store.insert_user(&user, &password_hash).await?;
        Ok(user)
    }

    pub async fn user(&self, id: &str) -> Result<User> {
        self.store.user(id).await?.ok_or(AppError::NotFound("User"))
    }

    pub async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<User> {
        let mut user = self.user(user_id).await?;

        if let Some(role) = update.role {
            if role == Role::Admin && user.role != Role::Admin {
                return Err(AppError::validation("Admin role cannot be self-assigned"));
            }
            hire::check_role_change(&user, role)?;
            user.role = role;
        }
        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::validation("Name cannot be empty"));
            }
            user.name = name.to_string();
        }
        if let Some(image_url) = update.image_url {
            user.image_url = Some(image_url);
        }
        if let Some(bio) = update.bio {
            user.bio = Some(bio);
        }
        if let Some(specialties) = update.specialties {
            user.specialties = specialties;
        }
        if let Some(certifications) = update.certifications {
            user.certifications = certifications;
        }

        if !self.store.update_profile(&user).await? {
            return Err(AppError::NotFound("User"));
        }
        Ok(user)
    }

    pub async fn trainers(&self) -> Result<Vec<User>> {
        self.store.users_with_role(Role::Trainer).await
    }

    pub async fn clients_of(&self, trainer_id: &str) -> Result<Vec<User>> {
        self.store.clients_of(trainer_id).await
    }

    pub async fn all_users(&self) -> Result<Vec<User>> {
        self.store.all_users().await
    }

    pub async fn delete_user(&self, id: &str) -> Result<()> {
        if !self.store.delete_user(id).await? {
            return Err(AppError::NotFound("User"));
        }
        tracing::info!(user_id = id, "Deleted user");
        Ok(())
    }

    pub fn online_users(&self) -> Vec<String> {
        self.live.online_users()
    }

    /// `none -> pending` for the client.
    pub async fn request_hire(&self, client_id: &str, trainer_id: &str) -> Result<(User, HireRequest)> {
        let (client, request) = self.store.open_request(client_id, trainer_id).await?;
        tracing::info!(
            request_id = %request.id,
            client_id,
            trainer_id,
            "Hire request opened"
        );
        Ok((client, request))
    }

    /// Pending requests for a trainer, joined with each requesting client.
    pub async fn pending_requests(&self, trainer_id: &str) -> Result<Vec<PendingHireRequest>> {
        let requests = self.store.pending_for_trainer(trainer_id).await?;
        let mut pending = Vec::with_capacity(requests.len());
        for request in requests {
            match self.store.user(&request.client_id).await? {
                Some(client) => pending.push(PendingHireRequest {
                    request_id: request.id,
                    requested_at: request.created_at,
                    client,
                }),
                None => tracing::warn!(
                    request_id = %request.id,
                    "Skipping pending request from deleted client {}",
                    request.client_id
                ),
            }
        }
        Ok(pending)
    }

    /// `pending -> accepted | rejected`. When `acting_trainer` is given it
    /// must be the trainer the request was addressed to.
    pub async fn respond_to_request(
        &self,
        request_id: &str,
        decision: Decision,
        acting_trainer: Option<&str>,
    ) -> Result<(HireRequest, Option<User>)> {
        if let Some(acting) = acting_trainer {
            let request = self
                .store
                .request(request_id)
                .await?
                .ok_or(AppError::NotFound("Request"))?;
            if request.trainer_id != acting {
                return Err(AppError::forbidden(
                    "Only the requested trainer can respond",
                ));
            }
        }

        let (request, client) = self.store.resolve_request(request_id, decision).await?;
        tracing::info!(
            request_id,
            status = %request.status,
            client_id = %request.client_id,
            "Hire request resolved"
        );
        Ok((request, client))
    }

    /// Load both users and require them to be a connected pair.
    pub(crate) async fn connected_pair(&self, a: &str, b: &str) -> Result<(User, User)> {
        let first = self.user(a).await?;
        let second = self.user(b).await?;
        if !access::is_connected(&first, &second) {
            return Err(AppError::forbidden("You are not connected to this user"));
        }
        Ok((first, second))
    }

    pub async fn save_client_profile(&self, profile: ClientProfile) -> Result<ClientProfile> {
        self.user(&profile.user_id).await?;
        for (field, value) in [("weight", profile.weight), ("height", profile.height)] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::validation(format!(
                    "{} must be a non-negative number",
                    field
                )));
            }
        }
        self.store.upsert_client_profile(&profile).await?;
        Ok(profile)
    }

    pub async fn client_profile(&self, user_id: &str) -> Result<Option<ClientProfile>> {
        self.store.client_profile(user_id).await
    }

    pub async fn create_training_plan(&self, plan: NewTrainingPlan) -> Result<TrainingPlan> {
        self.connected_pair(&plan.trainer_id, &plan.client_id).await?;
        let plan = TrainingPlan {
            id: Uuid::new_v4().to_string(),
            client_id: plan.client_id,
            trainer_id: plan.trainer_id,
            exercises: plan.exercises,
            created_at: Utc::now(),
        };
        self.store.insert_training_plan(&plan).await?;
        tracing::info!(plan_id = %plan.id, client_id = %plan.client_id, "Training plan created");
        Ok(plan)
    }

    pub async fn create_diet_plan(&self, plan: NewDietPlan) -> Result<DietPlan> {
        self.connected_pair(&plan.trainer_id, &plan.client_id).await?;
        let plan = DietPlan {
            id: Uuid::new_v4().to_string(),
            client_id: plan.client_id,
            trainer_id: plan.trainer_id,
            meals: plan.meals,
            created_at: Utc::now(),
        };
        self.store.insert_diet_plan(&plan).await?;
        tracing::info!(plan_id = %plan.id, client_id = %plan.client_id, "Diet plan created");
        Ok(plan)
    }

    pub async fn plans_for(&self, client_id: &str) -> Result<PlanBundle> {
        self.store.plans_for(client_id).await
    }
}

async fn hash_password(password: String, cost: u32) -> Result<String> {
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("Password hashing task failed")?
        .context("Failed to hash password")?;
    Ok(hashed)
}

/// A hash bcrypt cannot parse counts as a mismatch, not a failure.
async fn verify_password(password: String, hash: String) -> Result<bool> {
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context("Password verification task failed")?;
    Ok(verified.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrainerStatus;
    use crate::store::JsonFileStore;
    use tempfile::TempDir;

    async fn api(dir: &TempDir) -> Api {
        let store = JsonFileStore::open(dir.path().join("db.json")).await.unwrap();
        Api::new(Arc::new(store), Arc::new(ConnectionRegistry::new()), 4)
    }

    fn account(email: &str, role: Role) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            name: "Sam".to_string(),
            role,
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let dir = TempDir::new().unwrap();
        let api = api(&dir).await;

        let user = api
            .register(account("sam@example.com", Role::Client))
            .await
            .unwrap();
        assert_eq!(user.trainer_status(), TrainerStatus::None);
        assert!(user.image_url.as_deref().unwrap().contains("sam@example.com"));

        let logged_in = api.login("SAM@example.com", "secret").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        assert!(matches!(
            api.login("sam@example.com", "wrong").await.unwrap_err(),
            AppError::Unauthorized
        ));
        assert!(matches!(
            api.login("nobody@example.com", "secret").await.unwrap_err(),
            AppError::Unauthorized
        ));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let dir = TempDir::new().unwrap();
        let api = api(&dir).await;

        assert!(matches!(
            api.register(account("not-an-email", Role::Client))
                .await
                .unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            api.register(account("root@example.com", Role::Admin))
                .await
                .unwrap_err(),
            AppError::Validation(_)
        ));
        let mut blank = account("blank@example.com", Role::Client);
        blank.password.clear();
        assert!(matches!(
            api.register(blank).await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let dir = TempDir::new().unwrap();
        let api = api(&dir).await;
        api.register(account("sam@example.com", Role::Client))
            .await
            .unwrap();

        assert!(matches!(
            api.register(account("sam@example.com", Role::Trainer))
                .await
                .unwrap_err(),
            AppError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let api = api(&dir).await;

        assert!(api
            .ensure_admin("admin@example.com", "pw", "Admin")
            .await
            .unwrap());
        assert!(!api
            .ensure_admin("admin@example.com", "pw", "Admin")
            .await
            .unwrap());
        let admin = api.login("admin@example.com", "pw").await.unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_update_profile_rules() {
        let dir = TempDir::new().unwrap();
        let api = api(&dir).await;
        let client = api
            .register(account("c@example.com", Role::Client))
            .await
            .unwrap();
        let trainer = api
            .register(account("t@example.com", Role::Trainer))
            .await
            .unwrap();

        let updated = api
            .update_profile(
                &trainer.id,
                ProfileUpdate {
                    bio: Some("Olympic lifting coach".into()),
                    specialties: Some(vec!["strength".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.specialties, vec!["strength".to_string()]);

        api.request_hire(&client.id, &trainer.id).await.unwrap();
        let err = api
            .update_profile(
                &client.id,
                ProfileUpdate {
                    role: Some(Role::Trainer),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition(_)));

        let err = api
            .update_profile(
                &trainer.id,
                ProfileUpdate {
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert!(matches!(
            api.update_profile("ghost", ProfileUpdate::default())
                .await
                .unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_respond_checks_acting_trainer() {
        let dir = TempDir::new().unwrap();
        let api = api(&dir).await;
        let client = api
            .register(account("c@example.com", Role::Client))
            .await
            .unwrap();
        let trainer = api
            .register(account("t@example.com", Role::Trainer))
            .await
            .unwrap();
        let other = api
            .register(account("o@example.com", Role::Trainer))
            .await
            .unwrap();
        let (_, request) = api.request_hire(&client.id, &trainer.id).await.unwrap();

        let err = api
            .respond_to_request(&request.id, Decision::Accepted, Some(&other.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let (request, client) = api
            .respond_to_request(&request.id, Decision::Accepted, Some(&trainer.id))
            .await
            .unwrap();
        assert_eq!(request.status.as_str(), "accepted");
        assert_eq!(client.unwrap().trainer_status(), TrainerStatus::Accepted);
        assert_eq!(api.clients_of(&trainer.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_requests_join_client() {
        let dir = TempDir::new().unwrap();
        let api = api(&dir).await;
        let client = api
            .register(account("c@example.com", Role::Client))
            .await
            .unwrap();
        let trainer = api
            .register(account("t@example.com", Role::Trainer))
            .await
            .unwrap();
        let (_, request) = api.request_hire(&client.id, &trainer.id).await.unwrap();

        let pending = api.pending_requests(&trainer.id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].request_id, request.id);
        assert_eq!(pending[0].client.email, "c@example.com");

        api.delete_user(&client.id).await.unwrap();
        assert!(api.pending_requests(&trainer.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_plans_require_connection() {
        let dir = TempDir::new().unwrap();
        let api = api(&dir).await;
        let client = api
            .register(account("c@example.com", Role::Client))
            .await
            .unwrap();
        let trainer = api
            .register(account("t@example.com", Role::Trainer))
            .await
            .unwrap();
        let plan = NewTrainingPlan {
            client_id: client.id.clone(),
            trainer_id: trainer.id.clone(),
            exercises: vec![Exercise {
                name: "Squat".into(),
                sets: 5,
                reps: "5".into(),
                notes: String::new(),
                link: None,
                image_url: None,
            }],
        };

        assert!(matches!(
            api.create_training_plan(plan.clone()).await.unwrap_err(),
            AppError::Forbidden(_)
        ));

        let (_, request) = api.request_hire(&client.id, &trainer.id).await.unwrap();
        api.respond_to_request(&request.id, Decision::Accepted, None)
            .await
            .unwrap();
        let created = api.create_training_plan(plan).await.unwrap();

        let bundle = api.plans_for(&client.id).await.unwrap();
        assert_eq!(bundle.training, vec![created]);
        assert!(bundle.diet.is_empty());
    }

    #[tokio::test]
    async fn test_client_profile_validation() {
        let dir = TempDir::new().unwrap();
        let api = api(&dir).await;
        let client = api
            .register(account("c@example.com", Role::Client))
            .await
            .unwrap();
        let mut profile = ClientProfile {
            user_id: client.id.clone(),
            weight: -1.0,
            height: 170.0,
            goal: "Endurance".into(),
            activity_level: "high".into(),
            medical_conditions: String::new(),
        };

        assert!(matches!(
            api.save_client_profile(profile.clone()).await.unwrap_err(),
            AppError::Validation(_)
        ));
        profile.weight = 65.0;
        api.save_client_profile(profile.clone()).await.unwrap();
        assert_eq!(api.client_profile(&client.id).await.unwrap(), Some(profile));

        let orphan = ClientProfile {
            user_id: "ghost".into(),
            weight: 1.0,
            height: 1.0,
            goal: String::new(),
            activity_level: String::new(),
            medical_conditions: String::new(),
        };
        assert!(matches!(
            api.save_client_profile(orphan).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
