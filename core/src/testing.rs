//! Store wrapper for view tests: injects failures per operation and records
//! which writes reached the store.

use std::sync::Mutex;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use uuid::Uuid;

use crate::backend::{Backend, ChangeFeed, Table};
use crate::db::Database;
use crate::models::{
    ActivityFields, ActivityUpdate, NewWeightEntry, Profile, WeekPlanEntry, WeightEntry,
    WorkoutActivity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    ListWeights,
    FindWeight,
    InsertWeight,
    UpdateWeight,
    DeleteWeight,
    ListActivities,
    InsertActivities,
    UpsertActivities,
    DeleteActivity,
    ListWeekPlan,
    UpsertWeekPlan,
    GetProfile,
    UpsertProfile,
}

pub struct FlakyBackend {
    pub db: Database,
    failing: Mutex<Vec<Op>>,
    calls: Mutex<Vec<Op>>,
}

impl FlakyBackend {
    pub fn new() -> Self {
        Self {
            db: Database::open_in_memory().unwrap(),
            failing: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail(&self, op: Op) {
        self.failing.lock().unwrap().push(op);
    }

    pub fn heal(&self, op: Op) {
        self.failing.lock().unwrap().retain(|o| *o != op);
    }

    pub fn calls(&self) -> Vec<Op> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls.lock().unwrap().iter().filter(|o| **o == op).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn enter(&self, op: Op) -> Result<()> {
        self.calls.lock().unwrap().push(op);
        if self.failing.lock().unwrap().contains(&op) {
            bail!("simulated failure in {op:?}");
        }
        Ok(())
    }
}

impl Backend for FlakyBackend {
    async fn list_weight_entries(&self, owner: Uuid) -> Result<Vec<WeightEntry>> {
        self.enter(Op::ListWeights)?;
        self.db.weight_entries(owner)
    }

    async fn find_weight_entry(&self, owner: Uuid, date: NaiveDate) -> Result<Option<WeightEntry>> {
        self.enter(Op::FindWeight)?;
        self.db.weight_entry_on(owner, date)
    }

    async fn insert_weight_entry(&self, owner: Uuid, entry: &NewWeightEntry) -> Result<WeightEntry> {
        self.enter(Op::InsertWeight)?;
        self.db.add_weight_entry(owner, entry)
    }

    async fn update_weight_entry(&self, owner: Uuid, id: Uuid, weight_kg: f64) -> Result<()> {
        self.enter(Op::UpdateWeight)?;
        self.db.set_weight(owner, id, weight_kg)
    }

    async fn delete_weight_entry(&self, owner: Uuid, id: Uuid) -> Result<()> {
        self.enter(Op::DeleteWeight)?;
        self.db.remove_weight_entry(owner, id)
    }

    async fn list_activities(&self, owner: Uuid) -> Result<Vec<WorkoutActivity>> {
        self.enter(Op::ListActivities)?;
        self.db.activities(owner)
    }

    async fn insert_activities(
        &self,
        owner: Uuid,
        rows: &[ActivityFields],
    ) -> Result<Vec<WorkoutActivity>> {
        self.enter(Op::InsertActivities)?;
        self.db.add_activities(owner, rows)
    }

    async fn upsert_activities(&self, owner: Uuid, rows: &[ActivityUpdate]) -> Result<()> {
        self.enter(Op::UpsertActivities)?;
        self.db.save_activities(owner, rows)
    }

    async fn delete_activity(&self, owner: Uuid, id: Uuid) -> Result<()> {
        self.enter(Op::DeleteActivity)?;
        self.db.remove_activity(owner, id)
    }

    async fn list_week_plan(&self, owner: Uuid) -> Result<Vec<WeekPlanEntry>> {
        self.enter(Op::ListWeekPlan)?;
        self.db.week_plan(owner)
    }

    async fn upsert_week_plan_entry(&self, entry: &WeekPlanEntry) -> Result<()> {
        self.enter(Op::UpsertWeekPlan)?;
        self.db.put_week_plan_entry(entry)
    }

    async fn get_profile(&self, owner: Uuid) -> Result<Option<Profile>> {
        self.enter(Op::GetProfile)?;
        self.db.profile(owner)
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.enter(Op::UpsertProfile)?;
        self.db.put_profile(profile)
    }

    fn subscribe(&self, table: Table, owner: Option<Uuid>) -> ChangeFeed {
        self.db.subscribe(table, owner)
    }
}
