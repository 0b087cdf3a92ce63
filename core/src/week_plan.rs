//! Week plan: a 7 x 48 grid of free-text cells, one per half hour of each
//! weekday, plus the day/week view state around it.

use anyhow::Context;
use chrono::NaiveTime;
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::FitResult;
use crate::models::{DayOfWeek, SLOTS_PER_DAY, Theme, TimeSlot, WeekPlanEntry};
use crate::notice::Notice;
use crate::profile;

pub const SWIPE_THRESHOLD_PX: f64 = 50.0;
pub const ROW_HEIGHT_PX: f64 = 49.0;
pub const HEADER_HEIGHT_PX: f64 = 41.0;

const CELL_COUNT: usize = 7 * SLOTS_PER_DAY;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekPlanGrid {
    cells: Vec<String>,
}

impl Default for WeekPlanGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl WeekPlanGrid {
    pub fn new() -> Self {
        Self {
            cells: vec![String::new(); CELL_COUNT],
        }
    }

    /// Empty grid overlaid with stored rows. Rows with an unknown day or
    /// slot key are skipped.
    pub fn from_entries(entries: &[WeekPlanEntry]) -> Self {
        let mut grid = Self::new();
        for entry in entries {
            let (Ok(day), Ok(slot)) = (
                entry.day_of_week.parse::<DayOfWeek>(),
                entry.time_slot.parse::<TimeSlot>(),
            ) else {
                tracing::warn!(
                    day = %entry.day_of_week,
                    slot = %entry.time_slot,
                    "skipping week plan row with unknown key"
                );
                continue;
            };
            grid.set(day, slot, &entry.content);
        }
        grid
    }

    fn index(day: DayOfWeek, slot: TimeSlot) -> usize {
        day.index() * SLOTS_PER_DAY + slot.index()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(String::is_empty)
    }

    pub fn get(&self, day: DayOfWeek, slot: TimeSlot) -> &str {
        &self.cells[Self::index(day, slot)]
    }

    pub fn set(&mut self, day: DayOfWeek, slot: TimeSlot, content: &str) {
        content.clone_into(&mut self.cells[Self::index(day, slot)]);
    }

    /// Cells with content, in day then slot order.
    pub fn filled(&self) -> impl Iterator<Item = (DayOfWeek, TimeSlot, &str)> {
        DayOfWeek::ALL.into_iter().flat_map(move |day| {
            TimeSlot::all().filter_map(move |slot| {
                let content = self.get(day, slot);
                (!content.is_empty()).then_some((day, slot, content))
            })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Week,
    Day,
}

/// Day shown in day mode; moves wrap around the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCursor(DayOfWeek);

impl DayCursor {
    pub fn new(day: DayOfWeek) -> Self {
        Self(day)
    }

    pub fn day(self) -> DayOfWeek {
        self.0
    }

    pub fn next(&mut self) {
        self.0 = DayOfWeek::from_index(self.0.index() + 1);
    }

    pub fn prev(&mut self) {
        self.0 = DayOfWeek::from_index(self.0.index() + 6);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swipe {
    Next,
    Prev,
}

/// Horizontal swipe detection. A gesture is judged once, on release, by
/// the distance between where it started and where it ended.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwipeTracker {
    start_x: Option<f64>,
}

impl SwipeTracker {
    pub fn start(&mut self, x: f64) {
        self.start_x = Some(x);
    }

    /// Finish the gesture at horizontal position `x`; vertical movement is
    /// irrelevant. Ending left of the start past the threshold means next day.
    pub fn end(&mut self, x: f64) -> Option<Swipe> {
        let dx = x - self.start_x.take()?;
        if dx < -SWIPE_THRESHOLD_PX {
            Some(Swipe::Next)
        } else if dx > SWIPE_THRESHOLD_PX {
            Some(Swipe::Prev)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollLayout {
    pub row_height: f64,
    pub header_height: f64,
}

impl Default for ScrollLayout {
    fn default() -> Self {
        Self {
            row_height: ROW_HEIGHT_PX,
            header_height: HEADER_HEIGHT_PX,
        }
    }
}

impl ScrollLayout {
    /// Offset of the slot's row below the top of the table.
    #[allow(clippy::cast_precision_loss)]
    pub fn row_top(&self, slot: TimeSlot) -> f64 {
        self.header_height + slot.index() as f64 * self.row_height
    }

    /// Scroll position that puts the slot containing `now` right under
    /// the sticky header.
    pub fn scroll_top(&self, now: NaiveTime) -> f64 {
        (self.row_top(TimeSlot::containing(now)) - self.header_height).max(0.0)
    }
}

/// The week plan page for one signed-in owner.
pub struct WeekPlanView<'a, B> {
    backend: &'a B,
    owner: Uuid,
    grid: WeekPlanGrid,
    mode: ViewMode,
    cursor: DayCursor,
    today: DayOfWeek,
    swipe: SwipeTracker,
    theme: Option<Theme>,
}

impl<'a, B: Backend> WeekPlanView<'a, B> {
    pub fn new(backend: &'a B, owner: Uuid, today: DayOfWeek) -> Self {
        Self {
            backend,
            owner,
            grid: WeekPlanGrid::new(),
            mode: ViewMode::default(),
            cursor: DayCursor::new(today),
            today,
            swipe: SwipeTracker::default(),
            theme: None,
        }
    }

    pub fn grid(&self) -> &WeekPlanGrid {
        &self.grid
    }

    pub fn theme(&self) -> Option<Theme> {
        self.theme
    }

    /// Load the owner's theme and plan. A failed theme lookup is logged and
    /// skipped; a failed plan load keeps the current grid.
    pub async fn load(&mut self) -> FitResult<()> {
        match profile::load_theme(self.backend, self.owner).await {
            Ok(theme) => self.theme = theme,
            Err(err) => tracing::warn!("theme lookup failed: {err}"),
        }
        let entries = self
            .backend
            .list_week_plan(self.owner)
            .await
            .context("Failed to load week plan")?;
        self.grid = WeekPlanGrid::from_entries(&entries);
        Ok(())
    }

    pub async fn set_theme(&mut self, theme: Theme) -> FitResult<()> {
        profile::set_theme(self.backend, self.owner, theme).await?;
        self.theme = Some(theme);
        Ok(())
    }

    /// Local edit while typing.
    pub fn edit_cell(&mut self, day: DayOfWeek, slot: TimeSlot, content: &str) {
        self.grid.set(day, slot, content);
    }

    /// Store one cell, trimmed. The local text is kept either way; a
    /// failure yields the notice to show.
    pub async fn commit_cell(&self, day: DayOfWeek, slot: TimeSlot) -> Result<(), Notice> {
        let content = self.grid.get(day, slot).trim();
        let entry = WeekPlanEntry::new(self.owner, day, slot, content);
        match self.backend.upsert_week_plan_entry(&entry).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(%day, %slot, "week plan save failed: {err:#}");
                Err(Notice::destructive(
                    "Error",
                    "Failed to save entry. Please try again.",
                ))
            }
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    pub fn selected_day(&self) -> DayOfWeek {
        self.cursor.day()
    }

    pub fn select_day(&mut self, day: DayOfWeek) {
        self.cursor = DayCursor::new(day);
    }

    pub fn next_day(&mut self) {
        self.cursor.next();
    }

    pub fn prev_day(&mut self) {
        self.cursor.prev();
    }

    pub fn visible_days(&self) -> Vec<DayOfWeek> {
        match self.mode {
            ViewMode::Week => DayOfWeek::ALL.to_vec(),
            ViewMode::Day => vec![self.cursor.day()],
        }
    }

    pub fn is_current_day(&self, day: DayOfWeek) -> bool {
        day == self.today
    }

    pub fn touch_start(&mut self, x: f64) {
        self.swipe.start(x);
    }

    /// Swipes only navigate in day mode.
    pub fn touch_end(&mut self, x: f64) -> Option<Swipe> {
        let swipe = self.swipe.end(x)?;
        if self.mode != ViewMode::Day {
            return None;
        }
        match swipe {
            Swipe::Next => self.next_day(),
            Swipe::Prev => self.prev_day(),
        }
        Some(swipe)
    }
}
