//! Active-payment tracking and status polling.
//!
//! A payment returned by the provider in a non-terminal status is tracked:
//! a background task fetches `GET /payments/{id}` every poll interval until
//! the payment reaches a terminal status, either by poll or by webhook, or
//! until the host stops tracking it.
//!
//! # Ownership
//!
//! Entries live in a table keyed by payment id. Each entry carries a
//! [`PollHandle`] stamped with a generation number that is never reused, so
//! a handle from an earlier tracking round cannot cancel or drive a newer
//! one. The poll task only holds a weak reference back to the tracker.
//!
//! # Settled payments
//!
//! Once a payment settles its entry is removed, but its terminal status is
//! remembered (most recent [`SETTLED_HISTORY`] ids) so that a late poll
//! reply or webhook can never move it back to a non-terminal status.
//!
//! # Correlation
//!
//! [`RequestContexts`] records every in-flight request. Stopping a payment
//! cancels its in-flight poll contexts, so a poll reply that lands after
//! the stop is discarded instead of being applied.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::events::{EventSink, PaymentEvent};
use crate::gateway::ApiGateway;
use crate::mapper;
use crate::models::{Payment, PaymentStatus};
use crate::{KioskPayError, Result};

/// How many settled payment ids keep their terminal status on record.
pub const SETTLED_HISTORY: usize = 1024;

// ============================================================================
// Request correlation
// ============================================================================

/// What a request was sent for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    CreatePayment,
    GetPayment,
    ListPayments,
    CancelPayment,
    ExchangeRates,
    DownloadQrCode,
    /// Background status poll issued by the tracker.
    PollPayment,
}

/// Context registered while a request is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub kind: RequestKind,
    pub payment_id: Option<String>,
}

impl RequestContext {
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            payment_id: None,
        }
    }

    pub fn for_payment(kind: RequestKind, payment_id: impl Into<String>) -> Self {
        Self {
            kind,
            payment_id: Some(payment_id.into()),
        }
    }
}

/// Opaque, never reused identifier of one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextToken(u64);

/// Table of in-flight request contexts.
#[derive(Debug, Default)]
pub struct RequestContexts {
    next: AtomicU64,
    pending: Mutex<HashMap<ContextToken, RequestContext>>,
}

impl RequestContexts {
    fn lock(&self) -> MutexGuard<'_, HashMap<ContextToken, RequestContext>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a context and return its token.
    pub fn issue(&self, context: RequestContext) -> ContextToken {
        let token = ContextToken(self.next.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(token, context);
        token
    }

    /// Take the context for `token`. Succeeds at most once per token.
    pub fn consume(&self, token: ContextToken) -> Option<RequestContext> {
        self.lock().remove(&token)
    }

    /// Drop in-flight poll contexts for `payment_id`. Returns how many were dropped.
    pub fn cancel_polls(&self, payment_id: &str) -> usize {
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, ctx| {
            !(ctx.kind == RequestKind::PollPayment && ctx.payment_id.as_deref() == Some(payment_id))
        });
        before - pending.len()
    }

    /// Number of requests in flight.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }
}

// ============================================================================
// Tracking table
// ============================================================================

/// Generation-tagged reference to one tracking round of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollHandle {
    generation: u64,
}

impl PollHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What happened when a snapshot was applied to the tracking table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The payment is not tracked; nothing changed.
    Untracked,
    /// Same status as before; snapshot refreshed.
    Unchanged,
    /// Status moved to another non-terminal status.
    Updated,
    /// Status became terminal; tracking stopped.
    Settled,
    /// The payment already settled with this same status.
    AlreadySettled,
    /// The payment already settled and the snapshot tried to leave that status.
    Rejected,
}

struct TrackingEntry {
    snapshot: Payment,
    handle: PollHandle,
    task: Option<JoinHandle<()>>,
}

impl TrackingEntry {
    fn merge(&mut self, incoming: &Payment) -> ApplyOutcome {
        let current = self.snapshot.status;
        if !current.can_transition_to(incoming.status) {
            return ApplyOutcome::Rejected;
        }
        self.snapshot = incoming.clone();
        if incoming.is_terminal() {
            ApplyOutcome::Settled
        } else if current != incoming.status {
            ApplyOutcome::Updated
        } else {
            ApplyOutcome::Unchanged
        }
    }

    fn cancel(self) {
        if let Some(task) = self.task {
            task.abort();
        }
    }
}

#[derive(Default)]
struct TrackerState {
    entries: HashMap<String, TrackingEntry>,
    next_generation: u64,
    settled: HashMap<String, PaymentStatus>,
    settled_order: VecDeque<String>,
}

impl TrackerState {
    fn record_settled(&mut self, payment_id: &str, status: PaymentStatus) {
        if self.settled.insert(payment_id.to_string(), status).is_some() {
            return;
        }
        self.settled_order.push_back(payment_id.to_string());
        while self.settled_order.len() > SETTLED_HISTORY {
            if let Some(oldest) = self.settled_order.pop_front() {
                self.settled.remove(&oldest);
            }
        }
    }

    /// Check a snapshot of an untracked payment against the settled record.
    fn check_settled(&mut self, payment: &Payment) -> ApplyOutcome {
        match self.settled.get(&payment.id) {
            Some(&status) if status == payment.status => ApplyOutcome::AlreadySettled,
            Some(_) => ApplyOutcome::Rejected,
            None => {
                if payment.is_terminal() && !payment.id.is_empty() {
                    self.record_settled(&payment.id, payment.status);
                }
                ApplyOutcome::Untracked
            }
        }
    }
}

struct TrackerShared {
    state: Mutex<TrackerState>,
    gateway: Arc<ApiGateway>,
    events: EventSink,
    poll_interval: Duration,
}

impl TrackerShared {
    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, payment_id: &str, handle: PollHandle) -> bool {
        self.state()
            .entries
            .get(payment_id)
            .is_some_and(|e| e.handle == handle)
    }

    /// Remove an entry and cancel everything in flight for it.
    fn remove(&self, payment_id: &str) -> bool {
        let removed = self.state().entries.remove(payment_id);
        match removed {
            Some(entry) => {
                entry.cancel();
                self.gateway.contexts().cancel_polls(payment_id);
                true
            }
            None => false,
        }
    }

    /// Apply a snapshot; `handle` restricts it to one tracking round.
    fn apply(&self, payment: &Payment, handle: Option<PollHandle>) -> ApplyOutcome {
        let outcome = {
            let mut state = self.state();
            match state.entries.get_mut(&payment.id) {
                Some(entry) => {
                    if handle.is_some_and(|h| h != entry.handle) {
                        return ApplyOutcome::Untracked;
                    }
                    let outcome = entry.merge(payment);
                    if outcome == ApplyOutcome::Settled {
                        state.record_settled(&payment.id, payment.status);
                    }
                    outcome
                }
                None if handle.is_some() => return ApplyOutcome::Untracked,
                None => state.check_settled(payment),
            }
        };

        match outcome {
            ApplyOutcome::Settled => {
                self.remove(&payment.id);
                tracing::info!(
                    payment_id = %payment.id,
                    status = %payment.status,
                    "payment settled, tracking stopped"
                );
            }
            ApplyOutcome::Rejected => {
                tracing::warn!(
                    payment_id = %payment.id,
                    status = %payment.status,
                    "ignoring status change of a settled payment"
                );
            }
            _ => {}
        }
        outcome
    }

    async fn fetch(&self, payment_id: &str) -> Result<Option<Payment>> {
        let request = self.gateway.builder().get_payment(payment_id)?;
        let context = RequestContext::for_payment(RequestKind::PollPayment, payment_id);
        let reply = self.gateway.send_json(request, context).await?;
        Ok(reply.map(|value| mapper::payment_from_wire(&value)))
    }
}

impl Drop for TrackerShared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, entry) in state.entries.drain() {
            entry.cancel();
        }
    }
}

async fn poll_loop(
    shared: Weak<TrackerShared>,
    payment_id: String,
    handle: PollHandle,
    interval: Duration,
) {
    loop {
        tokio::time::sleep(interval).await;

        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.is_current(&payment_id, handle) {
            return;
        }

        tracing::debug!(payment_id = %payment_id, "polling payment status");
        match shared.fetch(&payment_id).await {
            Ok(Some(mut payment)) => {
                if payment.id.is_empty() {
                    payment.id = payment_id.clone();
                } else if payment.id != payment_id {
                    let err = KioskPayError::Protocol(format!(
                        "status poll for {} answered with payment {}",
                        payment_id, payment.id
                    ));
                    tracing::warn!(payment_id = %payment_id, error = %err, "status poll failed");
                    shared.events.error(&err);
                    continue;
                }
                match shared.apply(&payment, Some(handle)) {
                    ApplyOutcome::Updated => {
                        shared.events.emit(PaymentEvent::PaymentStatusUpdated(payment));
                    }
                    ApplyOutcome::Settled => {
                        shared.events.emit(PaymentEvent::PaymentStatusUpdated(payment));
                        return;
                    }
                    // This round is no longer current.
                    ApplyOutcome::Untracked => return,
                    ApplyOutcome::Unchanged
                    | ApplyOutcome::AlreadySettled
                    | ApplyOutcome::Rejected => {}
                }
            }
            // Reply discarded: tracking was stopped while the poll was in flight.
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(payment_id = %payment_id, error = %err, "status poll failed");
                shared.events.error(&err);
            }
        }
    }
}

/// Tracks non-terminal payments and polls them until they settle.
///
/// Cloning is cheap; clones share the same table.
#[derive(Clone)]
pub struct PaymentLifecycleTracker {
    shared: Arc<TrackerShared>,
}

impl PaymentLifecycleTracker {
    pub(crate) fn new(gateway: Arc<ApiGateway>, events: EventSink, poll_interval: Duration) -> Self {
        Self {
            shared: Arc::new(TrackerShared {
                state: Mutex::new(TrackerState::default()),
                gateway,
                events,
                poll_interval,
            }),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.shared.poll_interval
    }

    /// Start tracking `payment` and schedule its polls.
    ///
    /// Idempotent: tracking an already tracked id returns the existing
    /// handle and schedules nothing new. Terminal payments, payments
    /// without an id and payments that already settled are not tracked.
    ///
    /// Must be called from within a tokio runtime.
    pub fn track(&self, payment: &Payment) -> Option<PollHandle> {
        if payment.id.is_empty() || payment.is_terminal() {
            return None;
        }

        let mut state = self.shared.state();
        if let Some(existing) = state.entries.get(&payment.id) {
            return Some(existing.handle);
        }
        if state.settled.contains_key(&payment.id) {
            return None;
        }

        state.next_generation += 1;
        let handle = PollHandle {
            generation: state.next_generation,
        };
        let task = tokio::spawn(poll_loop(
            Arc::downgrade(&self.shared),
            payment.id.clone(),
            handle,
            self.shared.poll_interval,
        ));
        state.entries.insert(
            payment.id.clone(),
            TrackingEntry {
                snapshot: payment.clone(),
                handle,
                task: Some(task),
            },
        );
        drop(state);

        tracing::info!(
            payment_id = %payment.id,
            generation = handle.generation,
            "tracking payment"
        );
        Some(handle)
    }

    /// Stop tracking `payment_id`. No-op (returns false) when untracked.
    ///
    /// Safe to call from event handlers and from inside a poll round.
    pub fn stop(&self, payment_id: &str) -> bool {
        let stopped = self.shared.remove(payment_id);
        if stopped {
            tracing::info!(payment_id = %payment_id, "stopped tracking payment");
        }
        stopped
    }

    /// Stop tracking only if `handle` still refers to the current round.
    pub fn stop_handle(&self, payment_id: &str, handle: PollHandle) -> bool {
        if !self.shared.is_current(payment_id, handle) {
            return false;
        }
        self.stop(payment_id)
    }

    /// Merge a fresh snapshot of a payment.
    ///
    /// A terminal status stops tracking. A settled payment's terminal status
    /// is never replaced: later snapshots come back as
    /// [`ApplyOutcome::AlreadySettled`] or [`ApplyOutcome::Rejected`].
    pub fn apply(&self, payment: &Payment) -> ApplyOutcome {
        self.shared.apply(payment, None)
    }

    /// Terminal status a payment settled with, if still on record.
    pub fn settled_status(&self, payment_id: &str) -> Option<PaymentStatus> {
        self.shared.state().settled.get(payment_id).copied()
    }

    pub fn is_tracking(&self, payment_id: &str) -> bool {
        self.shared.state().entries.contains_key(payment_id)
    }

    /// Current handle for a tracked payment.
    pub fn handle(&self, payment_id: &str) -> Option<PollHandle> {
        self.shared.state().entries.get(payment_id).map(|e| e.handle)
    }

    /// Last known snapshot of a tracked payment.
    pub fn snapshot(&self, payment_id: &str) -> Option<Payment> {
        self.shared
            .state()
            .entries
            .get(payment_id)
            .map(|e| e.snapshot.clone())
    }

    pub fn tracked_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.shared.state().entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.shared.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop tracking everything.
    pub fn stop_all(&self) {
        for id in self.tracked_ids() {
            self.stop(&id);
        }
    }
}

impl std::fmt::Debug for PaymentLifecycleTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentLifecycleTracker")
            .field("tracked", &self.tracked_ids())
            .field("poll_interval", &self.shared.poll_interval)
            .finish()
    }
}
