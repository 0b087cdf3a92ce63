//! Workout activity table and the weekly calorie aggregate.

use std::fmt;
use std::str::FromStr;

use anyhow::Context;
use serde::Serialize;
use uuid::Uuid;

use crate::backend::{Backend, ChangeFeed, Table};
use crate::error::{FitError, FitResult};
use crate::models::{
    ActivityFields, ActivityUpdate, WorkoutActivity, parse_optional_amount, parse_optional_count,
};
use crate::notice::Notice;

pub const EMPTY_TABLE: &str = "No activities yet. Click \"Add Activity\" to get started.";
pub const DELETE_PROMPT: &str =
    "This will permanently delete this activity. This action cannot be undone.";

/// Row identity. Pending rows only exist locally and carry a temporary id
/// that is never sent to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "state", content = "id", rename_all = "lowercase")]
pub enum RowId {
    Persisted(Uuid),
    Pending(Uuid),
}

impl RowId {
    pub fn uuid(self) -> Uuid {
        match self {
            Self::Persisted(id) | Self::Pending(id) => id,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRow {
    pub id: RowId,
    #[serde(flatten)]
    pub fields: ActivityFields,
}

impl From<WorkoutActivity> for ActivityRow {
    fn from(a: WorkoutActivity) -> Self {
        Self {
            id: RowId::Persisted(a.id),
            fields: a.fields,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityField {
    Name,
    Reps,
    Sets,
    CurrentWeight,
    TimesPerWeek,
    Calories,
}

impl ActivityField {
    pub const ALL: [ActivityField; 6] = [
        Self::Name,
        Self::Reps,
        Self::Sets,
        Self::CurrentWeight,
        Self::TimesPerWeek,
        Self::Calories,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Name => "activity",
            Self::Reps => "reps",
            Self::Sets => "sets",
            Self::CurrentWeight => "current_weight",
            Self::TimesPerWeek => "times_per_week",
            Self::Calories => "calories",
        }
    }

    /// Apply raw cell text. On error the fields are left untouched.
    pub fn apply(self, fields: &mut ActivityFields, value: &str) -> FitResult<()> {
        match self {
            Self::Name => value.clone_into(&mut fields.name),
            Self::Reps => fields.reps = parse_optional_count(self.key(), value)?,
            Self::Sets => fields.sets = parse_optional_count(self.key(), value)?,
            Self::CurrentWeight => {
                fields.current_weight = parse_optional_amount(self.key(), value)?;
            }
            Self::TimesPerWeek => {
                fields.times_per_week = parse_optional_count(self.key(), value)?;
            }
            Self::Calories => fields.calories = parse_optional_amount(self.key(), value)?,
        }
        Ok(())
    }
}

impl fmt::Display for ActivityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ActivityField {
    type Err = FitError;

    fn from_str(s: &str) -> FitResult<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "activity" | "name" => Ok(Self::Name),
            "reps" => Ok(Self::Reps),
            "sets" => Ok(Self::Sets),
            "current_weight" | "weight" => Ok(Self::CurrentWeight),
            "times_per_week" | "times" => Ok(Self::TimesPerWeek),
            "calories" => Ok(Self::Calories),
            _ => Err(FitError::validation(
                "field",
                format!(
                    "Unknown field '{s}'. Use activity, reps, sets, current_weight, times_per_week, or calories"
                ),
            )),
        }
    }
}

/// The working set split for a save: new rows to insert (without their
/// temporary ids) and known rows to upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavePlan {
    pub inserts: Vec<ActivityFields>,
    pub updates: Vec<ActivityUpdate>,
}

impl SavePlan {
    pub fn from_rows(rows: &[ActivityRow]) -> Self {
        let mut plan = Self::default();
        for row in rows {
            match row.id {
                RowId::Pending(_) => plan.inserts.push(row.fields.clone()),
                RowId::Persisted(id) => plan.updates.push(ActivityUpdate {
                    id,
                    fields: row.fields.clone(),
                }),
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }
}

/// What happened after a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStep {
    /// A pending row was dropped locally; nothing to confirm.
    Removed,
    /// A stored row awaits [`ActivityTable::confirm_delete`].
    NeedsConfirmation,
}

pub fn total_weekly_calories<'a>(fields: impl IntoIterator<Item = &'a ActivityFields>) -> f64 {
    fields.into_iter().map(ActivityFields::weekly_calories).sum()
}

/// Editable activity table of one owner.
pub struct ActivityTable<'a, B> {
    backend: &'a B,
    owner: Uuid,
    rows: Vec<ActivityRow>,
    saving: bool,
    delete_target: Option<Uuid>,
}

impl<'a, B: Backend> ActivityTable<'a, B> {
    pub fn new(backend: &'a B, owner: Uuid) -> Self {
        Self {
            backend,
            owner,
            rows: Vec::new(),
            saving: false,
            delete_target: None,
        }
    }

    pub fn rows(&self) -> &[ActivityRow] {
        &self.rows
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn pending_delete(&self) -> Option<Uuid> {
        self.delete_target
    }

    pub fn weekly_calories(&self) -> f64 {
        total_weekly_calories(self.rows.iter().map(|r| &r.fields))
    }

    /// Replace the working set with the stored rows. On failure the
    /// current rows are kept.
    pub async fn load(&mut self) -> FitResult<()> {
        let stored = self
            .backend
            .list_activities(self.owner)
            .await
            .context("Failed to load activities")?;
        self.rows = stored.into_iter().map(ActivityRow::from).collect();
        Ok(())
    }

    pub fn add_row(&mut self) -> RowId {
        let id = RowId::Pending(Uuid::new_v4());
        self.rows.push(ActivityRow {
            id,
            fields: ActivityFields::default(),
        });
        id
    }

    /// Find a row by exact id or by a unique prefix of its id.
    pub fn resolve(&self, key: &str) -> FitResult<RowId> {
        let key = key.trim().to_lowercase();
        let mut hits = self
            .rows
            .iter()
            .filter(|r| r.id.uuid().to_string().starts_with(&key));
        match (hits.next(), hits.next()) {
            (Some(row), None) if !key.is_empty() => Ok(row.id),
            (Some(_), Some(_)) => Err(FitError::validation(
                "id",
                format!("Ambiguous activity id '{key}'"),
            )),
            _ => Err(FitError::validation(
                "id",
                format!("No activity with id '{key}'"),
            )),
        }
    }

    /// Local edit; nothing is stored until [`Self::save`].
    pub fn edit(&mut self, id: RowId, field: ActivityField, value: &str) -> FitResult<()> {
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| FitError::validation("id", "No such activity row"))?;
        field.apply(&mut row.fields, value)
    }

    pub fn save_plan(&self) -> SavePlan {
        SavePlan::from_rows(&self.rows)
    }

    /// Insert pending rows, then upsert stored rows, then refetch. Stops at
    /// the first failure.
    pub async fn save(&mut self) -> FitResult<Notice> {
        let plan = self.save_plan();
        self.saving = true;
        let result = self.store(&plan).await;
        self.saving = false;
        result?;

        if let Err(err) = self.load().await {
            tracing::warn!("reload after save failed: {err}");
        }
        Ok(Notice::success(
            "Success",
            "Workout activities saved successfully",
        ))
    }

    async fn store(&mut self, plan: &SavePlan) -> anyhow::Result<()> {
        tracing::debug!(
            inserts = plan.inserts.len(),
            updates = plan.updates.len(),
            "saving activities"
        );
        if !plan.inserts.is_empty() {
            let created = self
                .backend
                .insert_activities(self.owner, &plan.inserts)
                .await
                .context("Failed to add new activities")?;
            self.mark_inserted(created);
        }
        if !plan.updates.is_empty() {
            self.backend
                .upsert_activities(self.owner, &plan.updates)
                .await
                .context("Failed to update activities")?;
        }
        Ok(())
    }

    /// Swap pending rows, in order, for the stored rows that replaced them
    /// so a retry after a later failure does not insert them again.
    fn mark_inserted(&mut self, created: Vec<WorkoutActivity>) {
        let pending = self.rows.iter_mut().filter(|r| r.id.is_pending());
        for (row, stored) in pending.zip(created) {
            *row = ActivityRow::from(stored);
        }
    }

    pub fn request_delete(&mut self, id: RowId) -> DeleteStep {
        match id {
            RowId::Pending(_) => {
                self.rows.retain(|r| r.id != id);
                DeleteStep::Removed
            }
            RowId::Persisted(uuid) => {
                self.delete_target = Some(uuid);
                DeleteStep::NeedsConfirmation
            }
        }
    }

    pub fn cancel_delete(&mut self) {
        self.delete_target = None;
    }

    /// Delete the row awaiting confirmation. The confirmation is consumed
    /// whether or not the delete succeeds.
    pub async fn confirm_delete(&mut self) -> FitResult<Notice> {
        let id = self
            .delete_target
            .take()
            .ok_or_else(|| FitError::validation("id", "No activity selected for deletion"))?;
        self.backend
            .delete_activity(self.owner, id)
            .await
            .context("Failed to delete activity")?;
        self.rows.retain(|r| r.id != RowId::Persisted(id));
        Ok(Notice::success("Success", "Activity deleted successfully"))
    }
}

/// Weekly calorie total over the stored activities.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkoutStats {
    pub activities: Vec<WorkoutActivity>,
    pub total_weekly_calories: f64,
}

impl WorkoutStats {
    pub fn from_activities(activities: Vec<WorkoutActivity>) -> Self {
        let total_weekly_calories = total_weekly_calories(activities.iter().map(|a| &a.fields));
        Self {
            activities,
            total_weekly_calories,
        }
    }

    pub async fn fetch<B: Backend>(backend: &B, owner: Uuid) -> FitResult<Self> {
        let activities = backend
            .list_activities(owner)
            .await
            .context("Failed to load activities")?;
        Ok(Self::from_activities(activities))
    }
}

/// Keeps [`WorkoutStats`] current by refetching on every change to the
/// owner's activities.
pub struct StatsWatcher<'a, B> {
    backend: &'a B,
    owner: Uuid,
    feed: ChangeFeed,
    stats: WorkoutStats,
    loading: bool,
}

impl<'a, B: Backend> StatsWatcher<'a, B> {
    /// Subscribe first so no change between the first fetch and the
    /// subscription is missed.
    pub fn new(backend: &'a B, owner: Uuid) -> Self {
        Self {
            feed: backend.subscribe(Table::WorkoutActivities, Some(owner)),
            backend,
            owner,
            stats: WorkoutStats::default(),
            loading: true,
        }
    }

    pub fn stats(&self) -> &WorkoutStats {
        &self.stats
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Fetch and recompute. A failed fetch keeps the previous figures.
    pub async fn refresh(&mut self) {
        match WorkoutStats::fetch(self.backend, self.owner).await {
            Ok(stats) => self.stats = stats,
            Err(err) => tracing::warn!("workout stats refresh failed: {err}"),
        }
        self.loading = false;
    }

    /// Wait for the next change and refresh. Returns `false` once the
    /// feed has closed.
    pub async fn next_change(&mut self) -> bool {
        if !self.feed.changed().await {
            return false;
        }
        self.refresh().await;
        true
    }

    /// Refresh if changes are queued, without waiting.
    pub async fn poll(&mut self) -> bool {
        if !self.feed.try_changed() {
            return false;
        }
        self.refresh().await;
        true
    }
}
