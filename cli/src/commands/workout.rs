use std::time::Duration;

use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use fatnomo_core::auth::SessionStore;
use fatnomo_core::backend::Backend;
use fatnomo_core::workout::{
    ActivityField, ActivityRow, ActivityTable, DELETE_PROMPT, DeleteStep, StatsWatcher,
    WorkoutStats,
};

use super::helpers::{cell, confirm, fit_error, print_notice, truncate};
use super::signed_in;

const EMPTY_LIST: &str = "No activities yet. Use `fatnomo workout add` to get started.";
const WATCH_POLL: Duration = Duration::from_secs(5);

/// Values given on the command line for a new activity.
#[derive(Debug, Default)]
pub(crate) struct NewActivity {
    pub name: String,
    pub reps: Option<String>,
    pub sets: Option<String>,
    pub current_weight: Option<String>,
    pub times_per_week: Option<String>,
    pub calories: Option<String>,
}

impl NewActivity {
    fn cells(&self) -> [(ActivityField, Option<&str>); 6] {
        [
            (ActivityField::Name, Some(self.name.as_str())),
            (ActivityField::Reps, self.reps.as_deref()),
            (ActivityField::Sets, self.sets.as_deref()),
            (ActivityField::CurrentWeight, self.current_weight.as_deref()),
            (ActivityField::TimesPerWeek, self.times_per_week.as_deref()),
            (ActivityField::Calories, self.calories.as_deref()),
        ]
    }
}

async fn load_table<'a, B: Backend>(
    backend: &'a B,
    store: &SessionStore,
) -> Result<ActivityTable<'a, B>> {
    let owner = signed_in(store).await?.user.id;
    let mut table = ActivityTable::new(backend, owner);
    table
        .load()
        .await
        .map_err(|e| fit_error("Error loading activities", &e))?;
    Ok(table)
}

pub(crate) async fn cmd_workout_list<B: Backend>(
    backend: &B,
    store: &SessionStore,
    json: bool,
) -> Result<()> {
    let table = load_table(backend, store).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "activities": table.rows(),
                "total_weekly_calories": table.weekly_calories(),
            }))?
        );
    } else if table.rows().is_empty() {
        eprintln!("{EMPTY_LIST}");
    } else {
        println!("{}", render_rows(table.rows()));
        println!("Total weekly calories: {}", table.weekly_calories());
    }
    Ok(())
}

fn render_rows(rows: &[ActivityRow]) -> String {
    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Activity")]
        name: String,
        #[tabled(rename = "Reps")]
        reps: String,
        #[tabled(rename = "Sets")]
        sets: String,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "Times/Week")]
        times: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Weekly")]
        weekly: String,
    }

    let rows: Vec<Row> = rows
        .iter()
        .map(|r| {
            let f = &r.fields;
            Row {
                id: r.id.uuid().to_string()[..8].to_string(),
                name: truncate(&f.name, 30),
                reps: cell(f.reps),
                sets: cell(f.sets),
                weight: cell(f.current_weight),
                times: cell(f.times_per_week),
                calories: cell(f.calories),
                weekly: f.weekly_calories().to_string(),
            }
        })
        .collect();

    Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..8)).with(Alignment::right()))
        .to_string()
}

pub(crate) async fn cmd_workout_add<B: Backend>(
    backend: &B,
    store: &SessionStore,
    activity: &NewActivity,
    json: bool,
) -> Result<()> {
    let mut table = load_table(backend, store).await?;
    let id = table.add_row();
    for (field, value) in activity.cells() {
        if let Some(value) = value {
            table
                .edit(id, field, value)
                .map_err(|e| fit_error("Error saving activities", &e))?;
        }
    }
    let notice = table
        .save()
        .await
        .map_err(|e| fit_error("Error saving activities", &e))?;
    print_notice(&notice, json)
}

pub(crate) async fn cmd_workout_edit<B: Backend>(
    backend: &B,
    store: &SessionStore,
    id: &str,
    field: &str,
    value: &str,
    json: bool,
) -> Result<()> {
    let mut table = load_table(backend, store).await?;
    let (row, field) = field
        .parse::<ActivityField>()
        .and_then(|field| table.resolve(id).map(|row| (row, field)))
        .map_err(|e| fit_error("Error saving activities", &e))?;
    table
        .edit(row, field, value)
        .map_err(|e| fit_error("Error saving activities", &e))?;
    let notice = table
        .save()
        .await
        .map_err(|e| fit_error("Error saving activities", &e))?;
    print_notice(&notice, json)
}

pub(crate) async fn cmd_workout_delete<B: Backend>(
    backend: &B,
    store: &SessionStore,
    id: &str,
    yes: bool,
    json: bool,
) -> Result<()> {
    let mut table = load_table(backend, store).await?;
    let row = table
        .resolve(id)
        .map_err(|e| fit_error("Error deleting activity", &e))?;

    if table.request_delete(row) == DeleteStep::NeedsConfirmation
        && !yes
        && !confirm(&format!("Are you sure? {DELETE_PROMPT}"))?
    {
        table.cancel_delete();
        if json {
            println!("{}", serde_json::json!({ "deleted": false }));
        } else {
            println!("Cancelled");
        }
        return Ok(());
    }

    let notice = table
        .confirm_delete()
        .await
        .map_err(|e| fit_error("Error deleting activity", &e))?;
    print_notice(&notice, json)
}

fn print_stats(stats: &WorkoutStats, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "activities": stats.activities.len(),
                "total_weekly_calories": stats.total_weekly_calories,
            })
        );
    } else {
        println!(
            "Total weekly calories: {} ({} activities)",
            stats.total_weekly_calories,
            stats.activities.len()
        );
    }
}

/// Print the weekly calorie total. With `watch`, keep printing it whenever
/// it changes until interrupted. Writes from this process arrive on the
/// change feed; other processes are picked up by polling.
pub(crate) async fn cmd_workout_stats<B: Backend>(
    backend: &B,
    store: &SessionStore,
    watch: bool,
    json: bool,
) -> Result<()> {
    let owner = signed_in(store).await?.user.id;
    let mut watcher = StatsWatcher::new(backend, owner);
    watcher.refresh().await;
    print_stats(watcher.stats(), json);
    if !watch {
        return Ok(());
    }

    let mut ticker = tokio::time::interval(WATCH_POLL);
    ticker.tick().await;
    let mut shown = watcher.stats().clone();
    loop {
        tokio::select! {
            open = watcher.next_change() => {
                if !open {
                    break;
                }
            }
            _ = ticker.tick() => watcher.refresh().await,
            _ = tokio::signal::ctrl_c() => break,
        }
        if *watcher.stats() != shown {
            shown = watcher.stats().clone();
            print_stats(&shown, json);
        }
    }
    Ok(())
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

    fn squat() -> NewActivity {
        NewActivity {
            name: "Squat".to_string(),
            reps: Some("5".to_string()),
            sets: Some("5".to_string()),
            current_weight: Some("100".to_string()),
            times_per_week: Some("2".to_string()),
            calories: Some("150".to_string()),
        }
    }

    #[tokio::test]
    async fn test_add_then_edit() {
        let db = Database::open_in_memory().unwrap();
        let store = signed_in_store(&db);
        let owner = store.session().unwrap().user.id;

        cmd_workout_add(&db, &store, &squat(), true).await.unwrap();
        let stored = db.activities(owner).unwrap();
        assert_eq!(stored.len(), 1);
        assert!((stored[0].fields.weekly_calories() - 300.0).abs() < f64::EPSILON);

        let prefix = stored[0].id.to_string()[..8].to_string();
        cmd_workout_edit(&db, &store, &prefix, "times-per-week", "3", true)
            .await
            .unwrap();
        let stored = db.activities(owner).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].fields.times_per_week, Some(3));
    }

    #[tokio::test]
    async fn test_add_rejects_bad_number_without_saving() {
        let db = Database::open_in_memory().unwrap();
        let store = signed_in_store(&db);
        let activity = NewActivity {
            reps: Some("five".to_string()),
            ..squat()
        };
        let err = cmd_workout_add(&db, &store, &activity, true)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Error saving activities"));
        assert!(db.activities(store.session().unwrap().user.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edit_unknown_field() {
        let db = Database::open_in_memory().unwrap();
        let store = signed_in_store(&db);
        cmd_workout_add(&db, &store, &squat(), true).await.unwrap();
        let id = db.activities(store.session().unwrap().user.id).unwrap()[0].id;
        assert!(
            cmd_workout_edit(&db, &store, &id.to_string(), "tempo", "3", true)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_delete_with_yes_skips_prompt() {
        let db = Database::open_in_memory().unwrap();
        let store = signed_in_store(&db);
        let owner = store.session().unwrap().user.id;
        cmd_workout_add(&db, &store, &squat(), true).await.unwrap();
        let id = db.activities(owner).unwrap()[0].id;

        cmd_workout_delete(&db, &store, &id.to_string(), true, true)
            .await
            .unwrap();
        assert!(db.activities(owner).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats_once() {
        let db = Database::open_in_memory().unwrap();
        let store = signed_in_store(&db);
        cmd_workout_add(&db, &store, &squat(), true).await.unwrap();
        cmd_workout_stats(&db, &store, false, true).await.unwrap();
    }

    #[test]
    fn test_render_rows_shows_missing_values() {
        let row = ActivityRow {
            id: fatnomo_core::workout::RowId::Pending(uuid::Uuid::nil()),
            fields: fatnomo_core::models::ActivityFields {
                name: "Plank".to_string(),
                times_per_week: Some(3),
                ..Default::default()
            },
        };
        let out = render_rows(&[row]);
        assert!(out.contains("Plank"));
        assert!(out.contains("00000000"));
        assert!(out.contains(" - "));
    }
}
