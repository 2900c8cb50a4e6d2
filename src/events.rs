//! Change notifications between planner components
//!
//! Every mutation made through [`crate::service::TripService`] publishes one
//! [`PlannerEvent`]. Views holding derived data (daily plan, budget,
//! calendars) subscribe and refetch when their trip changes.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::models::RecordId;

/// Events are dropped for receivers lagging more than this many behind
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlannerEvent {
    TravelChanged {
        travel_id: RecordId,
        change: ChangeKind,
    },
    ItineraryChanged {
        travel_id: RecordId,
        itinerary_id: RecordId,
        change: ChangeKind,
    },
    ActivityChanged {
        travel_id: RecordId,
        activity_id: RecordId,
        change: ChangeKind,
    },
    ExpenseChanged {
        travel_id: RecordId,
        expense_id: RecordId,
        change: ChangeKind,
    },
    AccommodationChanged {
        travel_id: RecordId,
        accommodation_id: RecordId,
        change: ChangeKind,
    },
    /// A batch of AI suggestions was saved as activities
    ActivitiesGenerated {
        travel_id: RecordId,
        itinerary_id: RecordId,
        count: usize,
    },
}

impl PlannerEvent {
    /// Trip whose derived views are stale after this event
    #[must_use]
    pub fn travel_id(&self) -> RecordId {
        match self {
            Self::TravelChanged { travel_id, .. }
            | Self::ItineraryChanged { travel_id, .. }
            | Self::ActivityChanged { travel_id, .. }
            | Self::ExpenseChanged { travel_id, .. }
            | Self::AccommodationChanged { travel_id, .. }
            | Self::ActivitiesGenerated { travel_id, .. } => *travel_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlannerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Deliver to current subscribers. Having none is not an error.
    pub fn publish(&self, event: PlannerEvent) {
        trace!(?event, "publish");
        let _ = self.sender.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PlannerEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
