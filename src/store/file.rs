// src/store/file.rs
use super::{ChatStore, HireRequestStore, PlanStore, Store, UserStore};
use crate::error::{AppError, Result};
use crate::hire::{self, Decision};
use crate::models::{
    ChatMessage, ClientProfile, DietPlan, HireRequest, HireRequestStatus, PlanBundle, Role,
    TrainerStatus, TrainingPlan, User,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUser {
    #[serde(flatten)]
    user: User,
    #[serde(default)]
    password_hash: String,
}

/// The whole persisted state, rewritten on every mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    #[serde(default)]
    users: Vec<StoredUser>,
    #[serde(default)]
    client_profiles: Vec<ClientProfile>,
    #[serde(default)]
    training_plans: Vec<TrainingPlan>,
    #[serde(default)]
    diet_plans: Vec<DietPlan>,
    #[serde(default)]
    chat_messages: Vec<ChatMessage>,
    #[serde(default)]
    hire_requests: Vec<HireRequest>,
}

impl Document {
    fn user_index(&self, id: &str) -> Option<usize> {
        self.users.iter().position(|u| u.user.id == id)
    }
}

/// Single-document JSON store. Writers are serialized by one lock; each
/// mutation is applied to a copy, written to a temp file and renamed over
/// the document before the in-memory copy is swapped.
pub struct JsonFileStore {
    path: PathBuf,
    doc: RwLock<Document>,
}

impl JsonFileStore {
    /// Load the document at `path`, or start empty if it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let doc = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let mut doc: Document = serde_json::from_slice(&bytes)
                    .with_context(|| format!("Failed to parse store document {}", path.display()))?;
                for stored in &mut doc.users {
                    let trainer_id = stored.user.trainer_id().map(str::to_string);
                    let status = stored.user.trainer_status();
                    stored.user.restore_trainer_link(trainer_id, status);
                }
                tracing::info!(
                    "Loaded store document {} ({} users, {} messages)",
                    path.display(),
                    doc.users.len(),
                    doc.chat_messages.len()
                );
                doc
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No store document at {}, starting empty", path.display());
                Document::default()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read store document {}", path.display()))
            }
        };

        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read<T>(&self, f: impl FnOnce(&Document) -> T) -> T {
        let doc = self.doc.read().await;
        f(&doc)
    }

    async fn mutate<T>(&self, f: impl FnOnce(&mut Document) -> Result<T>) -> Result<T> {
        let mut doc = self.doc.write().await;
        let mut next = doc.clone();
        let out = f(&mut next)?;
        self.persist(&next).await?;
        *doc = next;
        Ok(out)
    }

    async fn persist(&self, doc: &Document) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(doc).context("Failed to serialize store document")?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for JsonFileStore {
    async fn insert_user(&self, user: &User, password_hash: &str) -> Result<()> {
        self.mutate(|doc| {
            if doc
                .users
                .iter()
                .any(|u| u.user.email.eq_ignore_ascii_case(&user.email))
            {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
            doc.users.push(StoredUser {
                user: user.clone(),
                password_hash: password_hash.to_string(),
            });
            Ok(())
        })
        .await
    }

    async fn user(&self, id: &str) -> Result<Option<User>> {
        Ok(self
            .read(|doc| doc.user_index(id).map(|i| doc.users[i].user.clone()))
            .await)
    }

    async fn credentials(&self, email: &str) -> Result<Option<(User, String)>> {
        Ok(self
            .read(|doc| {
                doc.users
                    .iter()
                    .find(|u| u.user.email.eq_ignore_ascii_case(email))
                    .map(|u| (u.user.clone(), u.password_hash.clone()))
            })
            .await)
    }

    async fn update_profile(&self, user: &User) -> Result<bool> {
        self.mutate(|doc| {
            let Some(i) = doc.user_index(&user.id) else {
                return Ok(false);
            };
            let stored = &mut doc.users[i].user;
            hire::check_role_change(stored, user.role)?;
            let trainer_id = stored.trainer_id().map(str::to_string);
            let status = stored.trainer_status();
            let mut updated = user.clone();
            updated.restore_trainer_link(trainer_id, status);
            *stored = updated;
            Ok(true)
        })
        .await
    }

    async fn users_with_role(&self, role: Role) -> Result<Vec<User>> {
        Ok(self
            .read(|doc| {
                doc.users
                    .iter()
                    .filter(|u| u.user.role == role)
                    .map(|u| u.user.clone())
                    .collect()
            })
            .await)
    }

    async fn clients_of(&self, trainer_id: &str) -> Result<Vec<User>> {
        Ok(self
            .read(|doc| {
                doc.users
                    .iter()
                    .map(|u| &u.user)
                    .filter(|u| {
                        u.is_client()
                            && u.trainer_id() == Some(trainer_id)
                            && u.trainer_status() == TrainerStatus::Accepted
                    })
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        Ok(self
            .read(|doc| doc.users.iter().map(|u| u.user.clone()).collect())
            .await)
    }

    async fn delete_user(&self, id: &str) -> Result<bool> {
        self.mutate(|doc| {
            let Some(i) = doc.user_index(id) else {
                return Ok(false);
            };
            let removed = doc.users.remove(i);
            if removed.user.is_trainer() {
                for stored in &mut doc.users {
                    if stored.user.trainer_id() == Some(id) {
                        stored.user.unlink_trainer();
                    }
                }
            }
            Ok(true)
        })
        .await
    }
}

#[async_trait]
impl HireRequestStore for JsonFileStore {
    async fn open_request(
        &self,
        client_id: &str,
        trainer_id: &str,
    ) -> Result<(User, HireRequest)> {
        self.mutate(|doc| {
            let ci = doc.user_index(client_id).ok_or(AppError::NotFound("Client"))?;
            let trainer = doc
                .user_index(trainer_id)
                .map(|i| doc.users[i].user.clone())
                .ok_or(AppError::NotFound("Trainer"))?;

            let client = &mut doc.users[ci].user;
            let request = hire::open(Uuid::new_v4().to_string(), client, &trainer, Utc::now())?;
            let client = client.clone();
            doc.hire_requests.push(request.clone());
            Ok((client, request))
        })
        .await
    }

    async fn resolve_request(
        &self,
        request_id: &str,
        decision: Decision,
    ) -> Result<(HireRequest, Option<User>)> {
        self.mutate(|doc| {
            let ri = doc
                .hire_requests
                .iter()
                .position(|r| r.id == request_id)
                .ok_or(AppError::NotFound("Request"))?;
            let ci = doc.user_index(&doc.hire_requests[ri].client_id);

            {
                let users = &mut doc.users;
                let request = &mut doc.hire_requests[ri];
                let client = match ci {
                    Some(i) => Some(&mut users[i].user),
                    None => None,
                };
                hire::resolve(request, client, decision)?;
            }

            Ok((
                doc.hire_requests[ri].clone(),
                ci.map(|i| doc.users[i].user.clone()),
            ))
        })
        .await
    }

    async fn request(&self, id: &str) -> Result<Option<HireRequest>> {
        Ok(self
            .read(|doc| doc.hire_requests.iter().find(|r| r.id == id).cloned())
            .await)
    }

    async fn pending_for_trainer(&self, trainer_id: &str) -> Result<Vec<HireRequest>> {
        Ok(self
            .read(|doc| {
                doc.hire_requests
                    .iter()
                    .filter(|r| r.trainer_id == trainer_id && r.status == HireRequestStatus::Pending)
                    .cloned()
                    .collect()
            })
            .await)
    }
}

#[async_trait]
impl ChatStore for JsonFileStore {
    async fn append_message(&self, message: &ChatMessage) -> Result<()> {
        self.mutate(|doc| {
            doc.chat_messages.push(message.clone());
            Ok(())
        })
        .await
    }

    async fn conversation(&self, a: &str, b: &str) -> Result<Vec<ChatMessage>> {
        Ok(self
            .read(|doc| {
                doc.chat_messages
                    .iter()
                    .filter(|m| m.is_between(a, b))
                    .cloned()
                    .collect()
            })
            .await)
    }
}

#[async_trait]
impl PlanStore for JsonFileStore {
    async fn upsert_client_profile(&self, profile: &ClientProfile) -> Result<()> {
        self.mutate(|doc| {
            match doc
                .client_profiles
                .iter_mut()
                .find(|p| p.user_id == profile.user_id)
            {
                Some(existing) => *existing = profile.clone(),
                None => doc.client_profiles.push(profile.clone()),
            }
            Ok(())
        })
        .await
    }

    async fn client_profile(&self, user_id: &str) -> Result<Option<ClientProfile>> {
        Ok(self
            .read(|doc| {
                doc.client_profiles
                    .iter()
                    .find(|p| p.user_id == user_id)
                    .cloned()
            })
            .await)
    }

    async fn insert_training_plan(&self, plan: &TrainingPlan) -> Result<()> {
        self.mutate(|doc| {
            doc.training_plans.push(plan.clone());
            Ok(())
        })
        .await
    }

    async fn insert_diet_plan(&self, plan: &DietPlan) -> Result<()> {
        self.mutate(|doc| {
            doc.diet_plans.push(plan.clone());
            Ok(())
        })
        .await
    }

    async fn plans_for(&self, client_id: &str) -> Result<PlanBundle> {
        Ok(self
            .read(|doc| PlanBundle {
                training: doc
                    .training_plans
                    .iter()
                    .filter(|p| p.client_id == client_id)
                    .cloned()
                    .collect(),
                diet: doc
                    .diet_plans
                    .iter()
                    .filter(|p| p.client_id == client_id)
                    .cloned()
                    .collect(),
            })
            .await)
    }
}

impl Store for JsonFileStore {
    fn backend(&self) -> &'static str {
        "file"
    }
}
