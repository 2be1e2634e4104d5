//! Storage interfaces. The service depends only on these traits; the JSON
//! document store and the Postgres store both implement all of them.

pub mod file;
pub mod postgres;

use crate::error::Result;
use crate::hire::Decision;
use crate::models::{
    ChatMessage, ClientProfile, DietPlan, HireRequest, PlanBundle, Role, TrainingPlan, User,
};
use async_trait::async_trait;

pub use file::JsonFileStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new account. Fails with `Conflict` if the email is taken
    /// (case-insensitive).
    async fn insert_user(&self, user: &User, password_hash: &str) -> Result<()>;

    async fn user(&self, id: &str) -> Result<Option<User>>;

    /// The user and its password hash, looked up by email (case-insensitive).
    async fn credentials(&self, email: &str) -> Result<Option<(User, String)>>;

    /// Persist profile fields of an existing user. The trainer link is never
    /// written through this call. A role change is refused with
    /// `InvalidStateTransition` if the stored user is linked to a trainer at
    /// write time. Returns false if the user does not exist.
    async fn update_profile(&self, user: &User) -> Result<bool>;

    async fn users_with_role(&self, role: Role) -> Result<Vec<User>>;

    /// Clients whose accepted trainer is `trainer_id`.
    async fn clients_of(&self, trainer_id: &str) -> Result<Vec<User>>;

    async fn all_users(&self) -> Result<Vec<User>>;

    /// Delete a user. Clients linked to a deleted trainer are reset to no
    /// trainer in the same write. Returns false if the user did not exist.
    async fn delete_user(&self, id: &str) -> Result<bool>;
}

#[async_trait]
pub trait HireRequestStore: Send + Sync {
    /// Run the `none -> pending` transition and persist the new request and
    /// the linked client as one unit.
    async fn open_request(&self, client_id: &str, trainer_id: &str)
        -> Result<(User, HireRequest)>;

    /// Run the `pending -> accepted | rejected` transition and persist the
    /// request and its client as one unit. The client is `None` if it was
    /// deleted.
    async fn resolve_request(
        &self,
        request_id: &str,
        decision: Decision,
    ) -> Result<(HireRequest, Option<User>)>;

    async fn request(&self, id: &str) -> Result<Option<HireRequest>>;

    /// Pending requests addressed to `trainer_id`, oldest first.
    async fn pending_for_trainer(&self, trainer_id: &str) -> Result<Vec<HireRequest>>;
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn append_message(&self, message: &ChatMessage) -> Result<()>;

    /// Every message between `a` and `b`, in arrival order.
    async fn conversation(&self, a: &str, b: &str) -> Result<Vec<ChatMessage>>;
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn upsert_client_profile(&self, profile: &ClientProfile) -> Result<()>;

    async fn client_profile(&self, user_id: &str) -> Result<Option<ClientProfile>>;

    async fn insert_training_plan(&self, plan: &TrainingPlan) -> Result<()>;

    async fn insert_diet_plan(&self, plan: &DietPlan) -> Result<()>;

    async fn plans_for(&self, client_id: &str) -> Result<PlanBundle>;
}

/// Everything the service needs from a backend.
pub trait Store: UserStore + HireRequestStore + ChatStore + PlanStore {
    /// Short backend name reported by the health endpoint.
    fn backend(&self) -> &'static str;
}
