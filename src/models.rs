// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Trainer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Trainer => "trainer",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "trainer" => Ok(Role::Trainer),
            "admin" => Ok(Role::Admin),
            other => anyhow::bail!("unknown role '{}'", other),
        }
    }
}

/// Where a client stands with its trainer. Only meaningful for `Role::Client`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainerStatus {
    #[default]
    None,
    Pending,
    Accepted,
}

impl TrainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainerStatus::None => "none",
            TrainerStatus::Pending => "pending",
            TrainerStatus::Accepted => "accepted",
        }
    }
}

impl FromStr for TrainerStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(TrainerStatus::None),
            "pending" => Ok(TrainerStatus::Pending),
            "accepted" => Ok(TrainerStatus::Accepted),
            other => anyhow::bail!("unknown trainer status '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HireRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl HireRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HireRequestStatus::Pending => "pending",
            HireRequestStatus::Accepted => "accepted",
            HireRequestStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for HireRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HireRequestStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(HireRequestStatus::Pending),
            "accepted" => Ok(HireRequestStatus::Accepted),
            "rejected" => Ok(HireRequestStatus::Rejected),
            other => anyhow::bail!("unknown hire request status '{}'", other),
        }
    }
}

/// An account. The trainer link is private: `trainer_status == None` iff
/// `trainer_id` is absent, and only the hire state machine moves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trainer_id: Option<String>,
    #[serde(default)]
    trainer_status: TrainerStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: String, email: String, name: String, role: Role) -> Self {
        Self {
            id,
            email,
            name,
            role,
            image_url: None,
            bio: None,
            specialties: Vec::new(),
            certifications: Vec::new(),
            trainer_id: None,
            trainer_status: TrainerStatus::None,
            created_at: Utc::now(),
        }
    }

    pub fn trainer_id(&self) -> Option<&str> {
        self.trainer_id.as_deref()
    }

    pub fn trainer_status(&self) -> TrainerStatus {
        self.trainer_status
    }

    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }

    pub fn is_trainer(&self) -> bool {
        self.role == Role::Trainer
    }

    pub(crate) fn link_trainer(&mut self, trainer_id: &str) {
        self.trainer_id = Some(trainer_id.to_string());
        self.trainer_status = TrainerStatus::Pending;
    }

    pub(crate) fn confirm_trainer(&mut self) {
        self.trainer_status = TrainerStatus::Accepted;
    }

    pub(crate) fn unlink_trainer(&mut self) {
        self.trainer_id = None;
        self.trainer_status = TrainerStatus::None;
    }

    /// Rebuild the trainer link from stored columns, collapsing any half-set
    /// pair to `None`.
    pub(crate) fn restore_trainer_link(
        &mut self,
        trainer_id: Option<String>,
        status: TrainerStatus,
    ) {
        match (trainer_id, status) {
            (Some(id), TrainerStatus::Pending | TrainerStatus::Accepted) => {
                self.trainer_id = Some(id);
                self.trainer_status = status;
            }
            _ => self.unlink_trainer(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HireRequest {
    pub id: String,
    pub client_id: String,
    pub trainer_id: String,
    pub status: HireRequestStatus,
    pub created_at: DateTime<Utc>,
}

/// A pending request as shown to the trainer: the requesting client plus the
/// id needed to answer it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingHireRequest {
    pub request_id: String,
    pub requested_at: DateTime<Utc>,
    #[serde(flatten)]
    pub client: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// True if the message was exchanged between `a` and `b`, in either direction.
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProfile {
    pub user_id: String,
    pub weight: f64,
    pub height: f64,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub activity_level: String,
    #[serde(default)]
    pub medical_conditions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub name: String,
    pub sets: u32,
    pub reps: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub time: String,
    pub description: String,
    pub calories: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingPlan {
    pub id: String,
    pub client_id: String,
    pub trainer_id: String,
    pub exercises: Vec<Exercise>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietPlan {
    pub id: String,
    pub client_id: String,
    pub trainer_id: String,
    pub meals: Vec<Meal>,
    pub created_at: DateTime<Utc>,
}

/// Every plan a client has, split by kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanBundle {
    pub training: Vec<TrainingPlan>,
    pub diet: Vec<DietPlan>,
}
