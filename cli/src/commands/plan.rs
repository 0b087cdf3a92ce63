use anyhow::Result;
use chrono::{Datelike, Local, NaiveTime};
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

use fatnomo_core::auth::SessionStore;
use fatnomo_core::backend::Backend;
use fatnomo_core::models::{DayOfWeek, TimeSlot};
use fatnomo_core::week_plan::{ViewMode, WeekPlanView};

use super::helpers::{fit_error, notice_error, truncate};
use super::signed_in;

const CELL_WIDTH: usize = 16;

#[derive(Serialize)]
struct PlanCell<'a> {
    day_of_week: &'static str,
    time_slot: String,
    content: &'a str,
}

fn today() -> DayOfWeek {
    DayOfWeek::from_weekday(Local::now().weekday())
}

fn parse_day(day: &str) -> Result<DayOfWeek> {
    if day.trim().eq_ignore_ascii_case("today") {
        return Ok(today());
    }
    day.parse().map_err(|e| fit_error("Error", &e))
}

pub(crate) async fn cmd_plan_show<B: Backend>(
    backend: &B,
    store: &SessionStore,
    day: Option<String>,
    all: bool,
    json: bool,
) -> Result<()> {
    let owner = signed_in(store).await?.user.id;
    let mut view = WeekPlanView::new(backend, owner, today());
    if let Some(day) = day {
        view.select_day(parse_day(&day)?);
        view.set_mode(ViewMode::Day);
    }
    view.load().await.map_err(|e| fit_error("Error", &e))?;

    if json {
        let visible = view.visible_days();
        let cells: Vec<PlanCell<'_>> = view
            .grid()
            .filled()
            .filter(|(d, _, _)| visible.contains(d))
            .map(|(d, slot, content)| PlanCell {
                day_of_week: d.key(),
                time_slot: slot.label(),
                content,
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "theme": view.theme(),
                "cells": cells,
            }))?
        );
        return Ok(());
    }

    println!("{}", render_plan(&view, first_row(all, Local::now().time())));
    Ok(())
}

/// Table of the visible days from slot `first` to the end of the day.
/// The current weekday's header is starred.
fn render_plan<B: Backend>(view: &WeekPlanView<'_, B>, first: usize) -> String {
    let days = view.visible_days();
    let mut builder = Builder::default();

    let mut header = vec!["Time".to_string()];
    header.extend(days.iter().map(|&d| {
        if view.is_current_day(d) {
            format!("{}*", d.name())
        } else {
            d.name().to_string()
        }
    }));
    builder.push_record(header);

    for slot in TimeSlot::all().skip(first) {
        let mut record = vec![slot.label()];
        record.extend(
            days.iter()
                .map(|&d| truncate(view.grid().get(d, slot), CELL_WIDTH)),
        );
        builder.push_record(record);
    }

    builder.build().with(Style::rounded()).to_string()
}

pub(crate) async fn cmd_plan_set<B: Backend>(
    backend: &B,
    store: &SessionStore,
    day: &str,
    slot: &str,
    content: &str,
    json: bool,
) -> Result<()> {
    let day = parse_day(day)?;
    let slot: TimeSlot = if slot.trim().eq_ignore_ascii_case("now") {
        TimeSlot::containing(Local::now().time())
    } else {
        slot.parse().map_err(|e| fit_error("Error", &e))?
    };
    let owner = signed_in(store).await?.user.id;

    let mut view = WeekPlanView::new(backend, owner, today());
    view.edit_cell(day, slot, content);
    view.commit_cell(day, slot)
        .await
        .map_err(|notice| notice_error(&notice))?;

    let stored = content.trim();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&PlanCell {
                day_of_week: day.key(),
                time_slot: slot.label(),
                content: stored,
            })?
        );
    } else if stored.is_empty() {
        println!("Cleared {} {}", day.name(), slot);
    } else {
        println!("{} {}: {stored}", day.name(), slot);
    }
    Ok(())
}

/// First slot shown: the one containing `now`, unless the whole day is wanted.
fn first_row(all: bool, now: NaiveTime) -> usize {
    if all {
        0
    } else {
        TimeSlot::containing(now).index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fatnomo_core::db::Database;

    fn signed_in_store(db: &Database) -> SessionStore {
        let store = SessionStore::in_memory();
        store.set_session(db.sign_in_local("me@example.com").unwrap()).unwrap();
        store
    }

    #[test]
    fn test_first_row_floors_to_half_hour() {
        let at = |h, m, s| NaiveTime::from_hms_opt(h, m, s).unwrap();
        assert_eq!(first_row(false, at(0, 0, 0)), 0);
        assert_eq!(first_row(false, at(14, 47, 0)), 29);
        assert_eq!(first_row(false, at(23, 59, 59)), 47);
        assert_eq!(first_row(true, at(23, 59, 59)), 0);
    }

    #[test]
    fn test_parse_day_aliases() {
        assert_eq!(parse_day("Fri").unwrap(), DayOfWeek::Friday);
        assert_eq!(parse_day("today").unwrap(), today());
        assert!(parse_day("someday").is_err());
    }

    #[tokio::test]
    async fn test_set_trims_and_round_trips() {
        let db = Database::open_in_memory().unwrap();
        let store = signed_in_store(&db);
        let owner = store.session().unwrap().user.id;

        cmd_plan_set(&db, &store, "monday", "07:30", "  Run 5k  ", true)
            .await
            .unwrap();
        let rows = db.week_plan(owner).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].day_of_week, "monday");
        assert_eq!(rows[0].time_slot, "07:30");
        assert_eq!(rows[0].content, "Run 5k");

        cmd_plan_set(&db, &store, "mon", "07:30", "", true)
            .await
            .unwrap();
        let rows = db.week_plan(owner).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "");
    }

    #[tokio::test]
    async fn test_set_rejects_off_grid_slot() {
        let db = Database::open_in_memory().unwrap();
        let store = signed_in_store(&db);
        assert!(
            cmd_plan_set(&db, &store, "monday", "07:15", "Run", true)
                .await
                .is_err()
        );
        assert!(db.week_plan(store.session().unwrap().user.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_render_day_and_week() {
        let db = Database::open_in_memory().unwrap();
        let store = signed_in_store(&db);
        let owner = store.session().unwrap().user.id;
        cmd_plan_set(&db, &store, "friday", "23:30", "Stretch", true)
            .await
            .unwrap();

        let mut view = WeekPlanView::new(&db, owner, DayOfWeek::Friday);
        view.load().await.unwrap();
        let week = render_plan(&view, 47);
        assert!(week.contains("Friday*"));
        assert!(week.contains("Monday"));
        assert!(week.contains("Stretch"));
        assert!(!week.contains("23:00"));

        view.select_day(DayOfWeek::Monday);
        view.set_mode(ViewMode::Day);
        let day = render_plan(&view, 0);
        assert!(day.contains("Monday"));
        assert!(!day.contains("Friday"));
        assert!(day.contains("00:00"));
        assert!(day.contains("23:30"));
    }
}
