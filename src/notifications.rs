//! Toast messages shown after asynchronous operations

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, broadcast::error::RecvError};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::TripPlannerError;
use crate::events::{ChangeKind, EventBus, PlannerEvent};

pub const DEFAULT_CAPACITY: usize = 5;
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: u64,
    pub kind: ToastKind,
    pub message: String,
    #[serde(skip)]
    pub created_at: Instant,
}

/// Newest toasts last. When full, the oldest toast makes room.
#[derive(Debug)]
pub struct ToastQueue {
    toasts: VecDeque<Toast>,
    capacity: usize,
    ttl: Duration,
    next_id: u64,
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl ToastQueue {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            toasts: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            ttl,
            next_id: 1,
        }
    }

    /// Queue a toast created at `now`, returning its id
    pub fn push_at(&mut self, kind: ToastKind, message: impl Into<String>, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        while self.toasts.len() >= self.capacity {
            self.toasts.pop_front();
        }
        self.toasts.push_back(Toast {
            id,
            kind,
            message: message.into(),
            created_at: now,
        });
        id
    }

    pub fn push(&mut self, kind: ToastKind, message: impl Into<String>) -> u64 {
        self.push_at(kind, message, Instant::now())
    }

    pub fn success(&mut self, message: impl Into<String>) -> u64 {
        self.push(ToastKind::Success, message)
    }

    pub fn info(&mut self, message: impl Into<String>) -> u64 {
        self.push(ToastKind::Info, message)
    }

    /// Error toast with the user facing text of `error`
    pub fn from_error(&mut self, error: &TripPlannerError) -> u64 {
        self.push(ToastKind::Error, error.user_message())
    }

    /// Remove a toast, false when it was already gone
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|toast| toast.id != id);
        self.toasts.len() != before
    }

    /// Drop toasts older than the TTL, returning how many were removed
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.toasts.len();
        let ttl = self.ttl;
        self.toasts
            .retain(|toast| now.saturating_duration_since(toast.created_at) < ttl);
        before - self.toasts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }
}

pub type SharedToasts = Arc<Mutex<ToastQueue>>;

/// Success text shown after a change went through
#[must_use]
pub fn event_message(event: &PlannerEvent) -> String {
    let (what, change) = match event {
        PlannerEvent::TravelChanged { change, .. } => ("Trip", change),
        PlannerEvent::ItineraryChanged { change, .. } => ("Itinerary", change),
        PlannerEvent::ActivityChanged { change, .. } => ("Activity", change),
        PlannerEvent::ExpenseChanged { change, .. } => ("Expense", change),
        PlannerEvent::AccommodationChanged { change, .. } => ("Accommodation", change),
        PlannerEvent::ActivitiesGenerated { count, .. } => {
            return match count {
                1 => "Added 1 suggested activity".to_string(),
                n => format!("Added {n} suggested activities"),
            };
        }
    };
    let verb = match change {
        ChangeKind::Created => "added",
        ChangeKind::Updated => "updated",
        ChangeKind::Deleted => "deleted",
    };
    format!("{what} {verb}")
}

/// Turn every planner event into a success toast until the bus closes
pub fn forward_events(events: &EventBus, toasts: SharedToasts) -> JoinHandle<()> {
    let mut receiver = events.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    toasts.lock().await.success(event_message(&event));
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "toast forwarder lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
