// src/access.rs
use crate::models::{TrainerStatus, User};

/// Access guard for chat and plans: true iff one side is a client whose
/// accepted trainer is the other side. Checked in both directions.
pub fn is_connected(a: &User, b: &User) -> bool {
    has_accepted(a, b) || has_accepted(b, a)
}

fn has_accepted(client: &User, trainer: &User) -> bool {
    client.is_client()
        && client.trainer_id() == Some(trainer.id.as_str())
        && client.trainer_status() == TrainerStatus::Accepted
}
