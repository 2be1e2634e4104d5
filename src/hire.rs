//! Hire-request state machine.
//!
//! Per client: `none -> pending -> accepted`, with `pending -> none` on
//! rejection. These functions only validate and mutate in-memory values; each
//! store applies them inside a single write unit together with persisting
//! the request and the client.

use crate::error::{AppError, Result};
use crate::models::{HireRequest, HireRequestStatus, Role, TrainerStatus, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A trainer's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Rejected,
}

impl From<Decision> for HireRequestStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accepted => HireRequestStatus::Accepted,
            Decision::Rejected => HireRequestStatus::Rejected,
        }
    }
}

/// `none -> pending`. Links `client` to `trainer` and returns the new request.
/// Nothing is mutated when a precondition fails.
pub fn open(
    request_id: String,
    client: &mut User,
    trainer: &User,
    now: DateTime<Utc>,
) -> Result<HireRequest> {
    if !client.is_client() {
        return Err(AppError::invalid_transition(
            "Only clients can request a trainer",
        ));
    }
    if !trainer.is_trainer() {
        return Err(AppError::validation(format!(
            "User {} is not a trainer",
            trainer.id
        )));
    }
    if client.trainer_status() != TrainerStatus::None {
        return Err(AppError::invalid_transition(
            "You already have a trainer or a pending request",
        ));
    }

    client.link_trainer(&trainer.id);
    Ok(HireRequest {
        id: request_id,
        client_id: client.id.clone(),
        trainer_id: trainer.id.clone(),
        status: HireRequestStatus::Pending,
        created_at: now,
    })
}

/// A linked client or trainer keeps its role until the link is gone. Stores
/// run this against the stored user inside the same write as the update.
pub fn check_role_change(current: &User, new_role: Role) -> Result<()> {
    if new_role != current.role && current.trainer_id().is_some() {
        return Err(AppError::invalid_transition(
            "Cannot change role while linked to a trainer",
        ));
    }
    Ok(())
}

/// `pending -> accepted | rejected`. The client is only touched while it is
/// still waiting on this request's trainer; a deleted client is passed as `None`.
pub fn resolve(
    request: &mut HireRequest,
    client: Option<&mut User>,
    decision: Decision,
) -> Result<()> {
    if request.status != HireRequestStatus::Pending {
        return Err(AppError::invalid_transition(format!(
            "Request {} was already {}",
            request.id, request.status
        )));
    }

    request.status = decision.into();

    if let Some(client) = client {
        let waiting = client.trainer_id() == Some(request.trainer_id.as_str())
            && client.trainer_status() == TrainerStatus::Pending;
        if waiting {
            match decision {
                Decision::Accepted => client.confirm_trainer(),
                Decision::Rejected => client.unlink_trainer(),
            }
        } else {
            tracing::warn!(
                request_id = %request.id,
                client_id = %client.id,
                "Client no longer waiting on this request, leaving it unchanged"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, role: Role) -> User {
        User::new(
            id.to_string(),
            format!("{}@example.com", id),
            id.to_uppercase(),
            role,
        )
    }

    #[test]
    fn test_open_links_client_and_creates_pending_request() {
        let mut client = user("c1", Role::Client);
        let trainer = user("t1", Role::Trainer);

        let request = open("r1".into(), &mut client, &trainer, Utc::now()).unwrap();

        assert_eq!(request.status, HireRequestStatus::Pending);
        assert_eq!(request.client_id, "c1");
        assert_eq!(request.trainer_id, "t1");
        assert_eq!(client.trainer_id(), Some("t1"));
        assert_eq!(client.trainer_status(), TrainerStatus::Pending);
    }

    #[test]
    fn test_open_twice_is_invalid_transition() {
        let mut client = user("c1", Role::Client);
        let trainer = user("t1", Role::Trainer);
        let other = user("t2", Role::Trainer);

        open("r1".into(), &mut client, &trainer, Utc::now()).unwrap();
        let err = open("r2".into(), &mut client, &other, Utc::now()).unwrap_err();

        assert!(matches!(err, AppError::InvalidStateTransition(_)));
        assert_eq!(client.trainer_id(), Some("t1"));
    }

    #[test]
    fn test_open_requires_client_role() {
        let mut requester = user("t9", Role::Trainer);
        let trainer = user("t1", Role::Trainer);

        let err = open("r1".into(), &mut requester, &trainer, Utc::now()).unwrap_err();

        assert!(matches!(err, AppError::InvalidStateTransition(_)));
        assert!(requester.trainer_id().is_none());
    }

    #[test]
    fn test_open_requires_trainer_target() {
        let mut client = user("c1", Role::Client);
        let not_trainer = user("c2", Role::Client);

        let err = open("r1".into(), &mut client, &not_trainer, Utc::now()).unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(client.trainer_status(), TrainerStatus::None);
    }

    #[test]
    fn test_accept_keeps_trainer_id() {
        let mut client = user("c1", Role::Client);
        let trainer = user("t1", Role::Trainer);
        let mut request = open("r1".into(), &mut client, &trainer, Utc::now()).unwrap();

        resolve(&mut request, Some(&mut client), Decision::Accepted).unwrap();

        assert_eq!(request.status, HireRequestStatus::Accepted);
        assert_eq!(client.trainer_status(), TrainerStatus::Accepted);
        assert_eq!(client.trainer_id(), Some("t1"));
    }

    #[test]
    fn test_reject_clears_link_and_allows_new_request() {
        let mut client = user("c1", Role::Client);
        let trainer = user("t1", Role::Trainer);
        let mut request = open("r1".into(), &mut client, &trainer, Utc::now()).unwrap();

        resolve(&mut request, Some(&mut client), Decision::Rejected).unwrap();

        assert_eq!(request.status, HireRequestStatus::Rejected);
        assert_eq!(client.trainer_status(), TrainerStatus::None);
        assert!(client.trainer_id().is_none());

        let other = user("t2", Role::Trainer);
        assert!(open("r2".into(), &mut client, &other, Utc::now()).is_ok());
    }

    #[test]
    fn test_second_response_is_refused() {
        let mut client = user("c1", Role::Client);
        let trainer = user("t1", Role::Trainer);
        let mut request = open("r1".into(), &mut client, &trainer, Utc::now()).unwrap();
        resolve(&mut request, Some(&mut client), Decision::Accepted).unwrap();

        let err = resolve(&mut request, Some(&mut client), Decision::Rejected).unwrap_err();

        assert!(matches!(err, AppError::InvalidStateTransition(_)));
        assert_eq!(request.status, HireRequestStatus::Accepted);
        assert_eq!(client.trainer_status(), TrainerStatus::Accepted);
    }

    #[test]
    fn test_resolve_without_client_updates_request_only() {
        let mut client = user("c1", Role::Client);
        let trainer = user("t1", Role::Trainer);
        let mut request = open("r1".into(), &mut client, &trainer, Utc::now()).unwrap();

        resolve(&mut request, None, Decision::Accepted).unwrap();

        assert_eq!(request.status, HireRequestStatus::Accepted);
    }

    #[test]
    fn test_resolve_leaves_relinked_client_alone() {
        let mut client = user("c1", Role::Client);
        let trainer = user("t1", Role::Trainer);
        let mut stale = open("r1".into(), &mut client, &trainer, Utc::now()).unwrap();
        // Client was reset and re-linked elsewhere before the old request got answered.
        client.unlink_trainer();
        client.link_trainer("t2");

        resolve(&mut stale, Some(&mut client), Decision::Rejected).unwrap();

        assert_eq!(client.trainer_id(), Some("t2"));
        assert_eq!(client.trainer_status(), TrainerStatus::Pending);
    }

    #[test]
    fn test_role_change_refused_while_linked() {
        let mut client = user("c1", Role::Client);
        let trainer = user("t1", Role::Trainer);
        check_role_change(&client, Role::Trainer).unwrap();

        open("r1".into(), &mut client, &trainer, Utc::now()).unwrap();

        check_role_change(&client, Role::Client).unwrap();
        assert!(matches!(
            check_role_change(&client, Role::Trainer),
            Err(AppError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_decision_parses_lowercase() {
        let d: Decision = serde_json::from_str("\"accepted\"").unwrap();
        assert_eq!(d, Decision::Accepted);
        assert!(serde_json::from_str::<Decision>("\"pending\"").is_err());
    }
}
