//! Call Signaling State Machine
//!
//! Owns the lifecycle of one-to-one calls
//! (`initiated -> ringing -> ongoing -> {completed | missed | rejected}`)
//! and relays opaque WebRTC negotiation payloads between the two peers.
//! Calls are persisted on creation and on terminal transitions only; every
//! signaling hop in between stays in memory. Mutations are serialized per
//! call via the per-call mutex.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::application::events::ServerEvent;
use crate::application::registry::ConnectionRegistry;
use crate::domain::{Call, CallRepository, CallStatus, CallType};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Which negotiation hop a relay carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

pub struct CallSignaling {
    repository: Arc<dyn CallRepository>,
    registry: Arc<ConnectionRegistry>,
    ring_timeout: Duration,
    /// Non-terminal calls only; terminal transitions remove the entry, so
    /// late events resolve to `NotFound`.
    active: DashMap<Uuid, Arc<Mutex<Call>>>,
}

impl CallSignaling {
    pub fn new(
        repository: Arc<dyn CallRepository>,
        registry: Arc<ConnectionRegistry>,
        ring_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            registry,
            ring_timeout,
            active: DashMap::new(),
        }
    }

    fn active_call(&self, call_id: Uuid) -> Result<Arc<Mutex<Call>>, AppError> {
        self.active
            .get(&call_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| AppError::NotFound(format!("call {}", call_id)))
    }

    /// Create a call, ring the recipient, and arm the unanswered-call
    /// timeout.
    pub async fn initiate_call(
        self: &Arc<Self>,
        caller_id: Uuid,
        recipient_id: Uuid,
        call_type: CallType,
    ) -> Result<Call, AppError> {
        if caller_id == recipient_id {
            return Err(AppError::ValidationFailed("cannot call yourself".into()));
        }

        let mut call = Call {
            id: Uuid::new_v4(),
            caller_id,
            recipient_id,
            call_type,
            status: CallStatus::Initiated,
            started_at: None,
            ended_at: None,
            duration_secs: None,
            created_at: Utc::now(),
        };
        self.repository.create(&call).await?;

        // Ring both sides: the caller's devices render the outgoing call,
        // the recipient's devices ring.
        self.registry
            .emit_to_user(caller_id, &ServerEvent::CallInitiated { call: call.clone() });
        let rang = self
            .registry
            .emit_to_user(recipient_id, &ServerEvent::CallInitiated { call: call.clone() });
        if rang > 0 {
            call.status = CallStatus::Ringing;
        }

        self.active
            .insert(call.id, Arc::new(Mutex::new(call.clone())));

        let signaling = Arc::clone(self);
        let call_id = call.id;
        tokio::spawn(async move {
            tokio::time::sleep(signaling.ring_timeout).await;
            signaling.timeout_call(call_id).await;
        });

        tracing::info!(%call_id, %caller_id, %recipient_id, "call initiated");
        Ok(call)
    }

    /// Fired by the armed timeout; marks a still-unanswered call missed.
    async fn timeout_call(&self, call_id: Uuid) {
        let Some(entry) = self.active.get(&call_id).map(|e| e.clone()) else {
            return;
        };
        let mut call = entry.lock().await;
        if !matches!(call.status, CallStatus::Initiated | CallStatus::Ringing) {
            return;
        }

        call.status = CallStatus::Missed;
        call.ended_at = Some(Utc::now());
        let snapshot = call.clone();
        drop(call);

        tracing::info!(%call_id, "call timed out unanswered");
        if let Err(e) = self
            .finish(snapshot, |call| ServerEvent::CallEnded { call })
            .await
        {
            tracing::error!(%call_id, error = %e, "failed to persist missed call");
        }
    }

    /// Accept a ringing call. Recipient only; valid pre-`ongoing`.
    pub async fn accept_call(&self, call_id: Uuid, responder_id: Uuid) -> Result<Call, AppError> {
        let entry = self.active_call(call_id)?;
        let mut call = entry.lock().await;

        if call.recipient_id != responder_id {
            return Err(AppError::Forbidden("only the call recipient may accept".into()));
        }
        if call.status.is_terminal() {
            tracing::warn!(%call_id, status = %call.status, "accept on terminal call ignored");
            return Ok(call.clone());
        }
        if call.status == CallStatus::Ongoing {
            // Duplicate accept from a second device; nothing to do
            return Ok(call.clone());
        }

        call.status = CallStatus::Ongoing;
        call.started_at = Some(Utc::now());
        tracing::info!(%call_id, "call accepted");

        self.emit_to_parties(&call, |call| ServerEvent::CallAccepted { call });
        Ok(call.clone())
    }

    /// Decline a call before it connects.
    pub async fn reject_call(&self, call_id: Uuid, responder_id: Uuid) -> Result<Call, AppError> {
        let entry = self.active_call(call_id)?;
        let mut call = entry.lock().await;

        if call.recipient_id != responder_id {
            return Err(AppError::Forbidden("only the call recipient may reject".into()));
        }
        if call.status.is_terminal() {
            tracing::warn!(%call_id, status = %call.status, "reject on terminal call ignored");
            return Ok(call.clone());
        }
        if call.status == CallStatus::Ongoing {
            return Err(AppError::ValidationFailed(
                "call already answered; use call_end".into(),
            ));
        }

        call.status = CallStatus::Rejected;
        call.ended_at = Some(Utc::now());
        let snapshot = call.clone();
        drop(call);

        self.finish(snapshot, |call| ServerEvent::CallRejected { call })
            .await
    }

    /// Hang up. From `ongoing` this completes the call and records its
    /// duration; from any earlier state it is a cancellation (recorded as
    /// missed, no duration).
    pub async fn end_call(&self, call_id: Uuid, requester_id: Uuid) -> Result<Call, AppError> {
        let entry = self.active_call(call_id)?;
        let mut call = entry.lock().await;

        if !call.is_participant(requester_id) {
            return Err(AppError::Forbidden("not a participant of this call".into()));
        }
        if call.status.is_terminal() {
            tracing::warn!(%call_id, status = %call.status, "end on terminal call ignored");
            return Ok(call.clone());
        }

        let now = Utc::now();
        if call.status == CallStatus::Ongoing {
            call.status = CallStatus::Completed;
            call.ended_at = Some(now);
            call.duration_secs = call.started_at.map(|s| (now - s).num_seconds());
        } else {
            call.status = CallStatus::Missed;
            call.ended_at = Some(now);
        }
        let snapshot = call.clone();
        drop(call);

        self.finish(snapshot, |call| ServerEvent::CallEnded { call }).await
    }

    /// Relay an opaque negotiation payload to the other participant. The
    /// payload is never inspected; only call existence, liveness, and
    /// participation are checked.
    pub async fn relay(
        &self,
        kind: SignalKind,
        call_id: Uuid,
        sender_id: Uuid,
        target_user_id: Uuid,
        payload: Value,
    ) -> Result<(), AppError> {
        let entry = self.active_call(call_id)?;
        let call = entry.lock().await;

        if !call.is_participant(sender_id) {
            return Err(AppError::Forbidden("not a participant of this call".into()));
        }
        if call.peer_of(sender_id) != target_user_id {
            return Err(AppError::Forbidden(
                "signal target is not the call peer".into(),
            ));
        }

        let event = match kind {
            SignalKind::Offer => ServerEvent::WebrtcOffer {
                call_id,
                sender_id,
                payload,
            },
            SignalKind::Answer => ServerEvent::WebrtcAnswer {
                call_id,
                sender_id,
                payload,
            },
            SignalKind::IceCandidate => ServerEvent::WebrtcIceCandidate {
                call_id,
                sender_id,
                payload,
            },
        };
        self.registry.emit_to_user(target_user_id, &event);
        Ok(())
    }

    /// Disconnect cleanup: end every non-terminal call the user is part of.
    /// Called when the user's last connection drops.
    pub async fn end_all_for_user(&self, user_id: Uuid) {
        let call_ids: Vec<Uuid> = self
            .active
            .iter()
            .map(|entry| *entry.key())
            .collect();

        for call_id in call_ids {
            let Some(entry) = self.active.get(&call_id).map(|e| e.clone()) else {
                continue;
            };
            let involved = entry.lock().await.is_participant(user_id);
            if !involved {
                continue;
            }
            if let Err(e) = self.end_call(call_id, user_id).await {
                tracing::warn!(%call_id, %user_id, error = %e, "disconnect cleanup failed");
            }
        }
    }

    /// Persist a terminal transition, notify both parties, and retire the
    /// in-memory state.
    async fn finish(
        &self,
        call: Call,
        event: fn(Call) -> ServerEvent,
    ) -> Result<Call, AppError> {
        debug_assert!(call.status.is_terminal());
        let persisted = self.finalize(&call).await;

        metrics::record_call_outcome(call.status.as_str());
        self.emit_to_parties(&call, event);
        self.active.remove(&call.id);
        tracing::info!(call_id = %call.id, status = %call.status, "call finished");

        persisted.map(|_| call)
    }

    async fn finalize(&self, call: &Call) -> Result<(), AppError> {
        self.repository.finalize(call).await.map_err(|e| {
            tracing::error!(call_id = %call.id, error = %e, "failed to persist call transition");
            e
        })
    }

    fn emit_to_parties(&self, call: &Call, event: fn(Call) -> ServerEvent) {
        for party in call.participants() {
            self.registry.emit_to_user(party, &event(call.clone()));
        }
    }
}
