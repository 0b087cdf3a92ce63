use std::future::Future;

use anyhow::Result;
use chrono::NaiveDate;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use uuid::Uuid;

use crate::models::{
    ActivityFields, ActivityUpdate, NewWeightEntry, Profile, WeekPlanEntry, WeightEntry,
    WorkoutActivity,
};

/// Row data capability every view is handed.
///
/// Implemented by the embedded SQLite store and by the hosted REST client.
/// Every call is scoped to an owner; implementations must refuse to touch
/// another owner's rows. Views never hold on to an implementation beyond a
/// single action, so one value can serve any number of views.
pub trait Backend: Send + Sync {
    // --- weight_entries ---

    /// All entries of `owner`, newest date first.
    fn list_weight_entries(
        &self,
        owner: Uuid,
    ) -> impl Future<Output = Result<Vec<WeightEntry>>> + Send;

    fn find_weight_entry(
        &self,
        owner: Uuid,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<WeightEntry>>> + Send;

    fn insert_weight_entry(
        &self,
        owner: Uuid,
        entry: &NewWeightEntry,
    ) -> impl Future<Output = Result<WeightEntry>> + Send;

    fn update_weight_entry(
        &self,
        owner: Uuid,
        id: Uuid,
        weight_kg: f64,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete_weight_entry(&self, owner: Uuid, id: Uuid)
    -> impl Future<Output = Result<()>> + Send;

    // --- workout_activities ---

    /// All activities of `owner` in creation order.
    fn list_activities(
        &self,
        owner: Uuid,
    ) -> impl Future<Output = Result<Vec<WorkoutActivity>>> + Send;

    /// Insert new rows and return them, in input order, with the ids the
    /// store assigned.
    fn insert_activities(
        &self,
        owner: Uuid,
        rows: &[ActivityFields],
    ) -> impl Future<Output = Result<Vec<WorkoutActivity>>> + Send;

    /// Bulk upsert keyed on the row id.
    fn upsert_activities(
        &self,
        owner: Uuid,
        rows: &[ActivityUpdate],
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete_activity(&self, owner: Uuid, id: Uuid) -> impl Future<Output = Result<()>> + Send;

    // --- week_plan_entries ---

    fn list_week_plan(&self, owner: Uuid)
    -> impl Future<Output = Result<Vec<WeekPlanEntry>>> + Send;

    /// Upsert keyed on (owner, day, slot).
    fn upsert_week_plan_entry(
        &self,
        entry: &WeekPlanEntry,
    ) -> impl Future<Output = Result<()>> + Send;

    // --- profiles ---

    fn get_profile(&self, owner: Uuid) -> impl Future<Output = Result<Option<Profile>>> + Send;

    /// Upsert keyed on the owner.
    fn upsert_profile(&self, profile: &Profile) -> impl Future<Output = Result<()>> + Send;

    // --- change feed ---

    /// Subscribe to "something changed" signals for `table`, optionally
    /// narrowed to one owner.
    fn subscribe(&self, table: Table, owner: Option<Uuid>) -> ChangeFeed;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    WeightEntries,
    WorkoutActivities,
    WeekPlanEntries,
    Profiles,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Self::WeightEntries => "weight_entries",
            Self::WorkoutActivities => "workout_activities",
            Self::WeekPlanEntries => "week_plan_entries",
            Self::Profiles => "profiles",
        }
    }
}

/// Payload-free notice that some row of `owner` in `table` changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotice {
    pub table: Table,
    pub owner: Uuid,
}

const FEED_CAPACITY: usize = 64;

/// Fan-out point for change notices. Stores publish after every successful
/// write; views hold a [`ChangeFeed`].
#[derive(Debug, Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<ChangeNotice>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, table: Table, owner: Uuid) {
        tracing::debug!(table = table.name(), %owner, "change published");
        // No subscribers is fine.
        let _ = self.tx.send(ChangeNotice { table, owner });
    }

    pub fn subscribe(&self, table: Table, owner: Option<Uuid>) -> ChangeFeed {
        ChangeFeed {
            rx: self.tx.subscribe(),
            table,
            owner,
        }
    }
}

pub struct ChangeFeed {
    rx: broadcast::Receiver<ChangeNotice>,
    table: Table,
    owner: Option<Uuid>,
}

impl ChangeFeed {
    fn matches(&self, notice: &ChangeNotice) -> bool {
        notice.table == self.table && self.owner.is_none_or(|o| o == notice.owner)
    }

    /// Wait for the next matching change. Returns `false` once the store is
    /// gone and no further changes can arrive.
    pub async fn changed(&mut self) -> bool {
        loop {
            match self.rx.recv().await {
                Ok(notice) if self.matches(&notice) => return true,
                Ok(_) => {}
                // Missed notices may have matched; a refetch covers them.
                Err(RecvError::Lagged(_)) => return true,
                Err(RecvError::Closed) => return false,
            }
        }
    }

    /// Drain queued notices without waiting; `true` if any matched.
    pub fn try_changed(&mut self) -> bool {
        let mut hit = false;
        loop {
            match self.rx.try_recv() {
                Ok(notice) => hit |= self.matches(&notice),
                Err(TryRecvError::Lagged(_)) => hit = true,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return hit,
            }
        }
    }
}
