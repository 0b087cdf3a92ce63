//! Weight tracker page: entry form, history list and chart over one
//! owner's entries.

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::backend::Backend;
use crate::chart::WeightChart;
use crate::error::{FitError, FitResult};
use crate::models::{NewWeightEntry, WeightEntry, is_weight_input, parse_weight};
use crate::notice::Notice;

pub const EMPTY_HISTORY: &str = "No entries yet. Start by logging your weight!";

fn earliest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Saved(WeightEntry),
    Updated { id: Uuid, weight_kg: f64 },
}

impl SubmitOutcome {
    pub fn notice(&self) -> Notice {
        match self {
            Self::Saved(_) => Notice::success("Success!", "Weight entry saved successfully"),
            Self::Updated { .. } => {
                Notice::success("Success!", "Weight entry updated successfully")
            }
        }
    }
}

/// Notice for a failed submit.
pub fn submit_failure(err: &FitError) -> Notice {
    let title = if err.is_validation() {
        "Invalid Weight"
    } else {
        "Error"
    };
    Notice::error(title, err)
}

/// Form state: the raw input buffer, the chosen date and a saving flag.
#[derive(Debug, Clone)]
pub struct WeightEntryForm {
    input: String,
    date: NaiveDate,
    saving: bool,
    error: Option<String>,
}

impl WeightEntryForm {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            input: String::new(),
            date: today,
            saving: false,
            error: None,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Inline error for the weight field from the last submit.
    pub fn field_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Replace the input buffer. Values that could never become a number
    /// are ignored; returns whether the buffer changed.
    pub fn set_input(&mut self, value: &str) -> bool {
        if !is_weight_input(value) {
            return false;
        }
        value.clone_into(&mut self.input);
        true
    }

    pub fn select_date(&mut self, date: NaiveDate, today: NaiveDate) -> FitResult<()> {
        if date > today {
            return Err(FitError::validation("date", "Date cannot be in the future"));
        }
        if date < earliest_date() {
            return Err(FitError::validation("date", "Date must be after 1900-01-01"));
        }
        self.date = date;
        Ok(())
    }

    /// Validate, then store the weight for the chosen date: the existing
    /// entry for that date is updated, otherwise a new one is inserted.
    /// Nothing is sent to the backend when validation fails.
    pub async fn submit<B: Backend>(
        &mut self,
        backend: &B,
        owner: Option<Uuid>,
        today: NaiveDate,
    ) -> FitResult<SubmitOutcome> {
        let weight_kg = match parse_weight(&self.input) {
            Ok(w) => w,
            Err(err) => {
                self.error = Some(err.to_string());
                return Err(err);
            }
        };
        self.error = None;
        let owner = owner.ok_or(FitError::Unauthenticated)?;

        self.saving = true;
        let result = store_weight(backend, owner, self.date, weight_kg).await;
        self.saving = false;

        let outcome = result?;
        self.input.clear();
        self.date = today;
        Ok(outcome)
    }
}

async fn store_weight<B: Backend>(
    backend: &B,
    owner: Uuid,
    date: NaiveDate,
    weight_kg: f64,
) -> anyhow::Result<SubmitOutcome> {
    tracing::debug!(%date, weight_kg, "saving weight entry");
    let existing = backend
        .find_weight_entry(owner, date)
        .await
        .context("Failed to look up existing entry")?;
    match existing {
        Some(entry) => {
            backend.update_weight_entry(owner, entry.id, weight_kg).await?;
            Ok(SubmitOutcome::Updated {
                id: entry.id,
                weight_kg,
            })
        }
        None => {
            let entry = backend
                .insert_weight_entry(owner, &NewWeightEntry { date, weight_kg })
                .await?;
            Ok(SubmitOutcome::Saved(entry))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRow {
    pub id: Uuid,
    /// e.g. "Jan 5, 2025"
    pub date: String,
    /// e.g. "75.5 kg"
    pub weight: String,
}

impl HistoryRow {
    fn from_entry(entry: &WeightEntry) -> Self {
        Self {
            id: entry.id,
            date: entry.date.format("%b %-d, %Y").to_string(),
            weight: format!("{} kg", entry.weight_kg),
        }
    }
}

/// History rows, newest date first.
pub fn history_rows(entries: &[WeightEntry]) -> Vec<HistoryRow> {
    let mut sorted: Vec<&WeightEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    sorted.into_iter().map(HistoryRow::from_entry).collect()
}

/// The weight tracker page for one signed-in owner.
pub struct WeightTracker<'a, B> {
    backend: &'a B,
    owner: Uuid,
    entries: Vec<WeightEntry>,
    pub form: WeightEntryForm,
}

impl<'a, B: Backend> WeightTracker<'a, B> {
    pub fn new(backend: &'a B, owner: Uuid, today: NaiveDate) -> Self {
        Self {
            backend,
            owner,
            entries: Vec::new(),
            form: WeightEntryForm::new(today),
        }
    }

    pub fn entries(&self) -> &[WeightEntry] {
        &self.entries
    }

    pub async fn refresh(&mut self) -> FitResult<()> {
        self.entries = self
            .backend
            .list_weight_entries(self.owner)
            .await
            .context("Failed to load weight entries")?;
        Ok(())
    }

    /// Refresh after a successful write. A failed refetch keeps the
    /// previous list; the write itself already succeeded.
    async fn refresh_after_write(&mut self) {
        if let Err(err) = self.refresh().await {
            tracing::warn!("refresh after write failed: {err}");
        }
    }

    pub async fn submit(&mut self, today: NaiveDate) -> FitResult<SubmitOutcome> {
        let outcome = self
            .form
            .submit(self.backend, Some(self.owner), today)
            .await?;
        self.refresh_after_write().await;
        Ok(outcome)
    }

    pub async fn delete(&mut self, id: Uuid) -> FitResult<Notice> {
        self.backend
            .delete_weight_entry(self.owner, id)
            .await
            .context("Failed to delete weight entry")?;
        self.refresh_after_write().await;
        Ok(Notice::success(
            "Success!",
            "Weight entry deleted successfully",
        ))
    }

    pub fn chart(&self) -> WeightChart {
        WeightChart::from_entries(&self.entries)
    }

    pub fn history(&self) -> Vec<HistoryRow> {
        history_rows(&self.entries)
    }
}
