use anyhow::{Result, bail};
use chrono::Local;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};
use uuid::Uuid;

use fatnomo_core::auth::SessionStore;
use fatnomo_core::backend::Backend;
use fatnomo_core::chart::{EMPTY_CHART, WeightChart};
use fatnomo_core::error::FitError;
use fatnomo_core::models::WeightEntry;
use fatnomo_core::weight::{EMPTY_HISTORY, WeightTracker, submit_failure};

use super::helpers::{fit_error, notice_error, parse_date, print_notice};
use super::signed_in;

const BAR_WIDTH: f64 = 40.0;

pub(crate) async fn cmd_weight_log<B: Backend>(
    backend: &B,
    store: &SessionStore,
    value: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let today = Local::now().date_naive();
    let date = parse_date(date)?;
    let owner = signed_in(store).await?.user.id;
    let mut tracker = WeightTracker::new(backend, owner, today);

    if !tracker.form.set_input(value.trim()) {
        let err = FitError::validation("weight", "Please enter a valid number");
        return Err(notice_error(&submit_failure(&err)));
    }
    tracker
        .form
        .select_date(date, today)
        .map_err(|e| fit_error("Invalid Date", &e))?;

    let outcome = tracker
        .submit(today)
        .await
        .map_err(|e| notice_error(&submit_failure(&e)))?;

    print_notice(&outcome.notice(), json)
}

pub(crate) async fn cmd_weight_history<B: Backend>(
    backend: &B,
    store: &SessionStore,
    json: bool,
) -> Result<()> {
    let tracker = load_tracker(backend, store).await?;
    let rows = tracker.history();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if rows.is_empty() {
        eprintln!("{EMPTY_HISTORY}");
    } else {
        #[derive(Tabled)]
        struct Row {
            #[tabled(rename = "ID")]
            id: String,
            #[tabled(rename = "Date")]
            date: String,
            #[tabled(rename = "Weight")]
            weight: String,
        }

        let rows: Vec<Row> = rows
            .into_iter()
            .map(|r| Row {
                id: short_id(r.id),
                date: r.date,
                weight: r.weight,
            })
            .collect();
        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }
    Ok(())
}

pub(crate) async fn cmd_weight_chart<B: Backend>(
    backend: &B,
    store: &SessionStore,
    json: bool,
) -> Result<()> {
    let tracker = load_tracker(backend, store).await?;
    let chart = tracker.chart();

    if json {
        println!("{}", serde_json::to_string_pretty(&chart)?);
        return Ok(());
    }

    println!("Weight Progress");
    println!("{}", chart.description());
    if chart.is_empty() {
        eprintln!("{EMPTY_CHART}");
        return Ok(());
    }
    println!();
    for line in render_bars(&chart) {
        println!("{line}");
    }
    if let Some(stats) = &chart.stats {
        println!();
        println!(
            "Highest: {} kg   Lowest: {} kg   Average: {} kg",
            stats.highest, stats.lowest, stats.average
        );
    }
    Ok(())
}

pub(crate) async fn cmd_weight_delete<B: Backend>(
    backend: &B,
    store: &SessionStore,
    id: &str,
    json: bool,
) -> Result<()> {
    let mut tracker = load_tracker(backend, store).await?;
    let id = resolve_entry(tracker.entries(), id)?;
    let notice = tracker
        .delete(id)
        .await
        .map_err(|e| fit_error("Error", &e))?;
    print_notice(&notice, json)
}

async fn load_tracker<'a, B: Backend>(
    backend: &'a B,
    store: &SessionStore,
) -> Result<WeightTracker<'a, B>> {
    let owner = signed_in(store).await?.user.id;
    let mut tracker = WeightTracker::new(backend, owner, Local::now().date_naive());
    tracker
        .refresh()
        .await
        .map_err(|e| fit_error("Error", &e))?;
    Ok(tracker)
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// Match an entry by full id or id prefix (hyphens optional).
fn resolve_entry(entries: &[WeightEntry], key: &str) -> Result<Uuid> {
    let key = key.trim().to_lowercase().replace('-', "");
    if key.is_empty() {
        bail!("Entry id is required");
    }
    let hits: Vec<Uuid> = entries
        .iter()
        .map(|e| e.id)
        .filter(|id| id.simple().to_string().starts_with(&key))
        .collect();
    match hits.as_slice() {
        [id] => Ok(*id),
        [] => bail!("No weight entry with id '{key}'"),
        _ => bail!("Ambiguous weight entry id '{key}'"),
    }
}

/// One horizontal bar per point, scaled to the chart's y-domain.
fn render_bars(chart: &WeightChart) -> Vec<String> {
    let Some((lo, hi)) = chart.domain else {
        return Vec::new();
    };
    let span = (hi - lo).max(f64::EPSILON);
    let label_width = chart
        .series
        .iter()
        .map(|p| p.label.len())
        .max()
        .unwrap_or(0);
    chart
        .series
        .iter()
        .map(|p| {
            #[allow(clippy::cast_sign_loss)]
            let len = (((p.weight_kg - lo) / span) * BAR_WIDTH).round().max(1.0) as usize;
            format!(
                "{:>label_width$} │{} {} kg",
                p.label,
                "█".repeat(len),
                p.weight_kg
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use fatnomo_core::db::Database;

    fn entry(id: Uuid, date: (i32, u32, u32), weight_kg: f64) -> WeightEntry {
        WeightEntry {
            id,
            owner: Uuid::nil(),
            weight_kg,
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            created_at: Utc::now(),
        }
    }

    fn signed_in_store(db: &Database) -> SessionStore {
        let store = SessionStore::in_memory();
        store.set_session(db.sign_in_local("me@example.com").unwrap()).unwrap();
        store
    }

    #[test]
    fn test_resolve_entry_by_prefix() {
        let a = Uuid::parse_str("aaaaaaaa-0000-4000-8000-000000000001").unwrap();
        let b = Uuid::parse_str("aaaabbbb-0000-4000-8000-000000000002").unwrap();
        let entries = vec![entry(a, (2025, 1, 1), 80.0), entry(b, (2025, 1, 2), 79.0)];

        assert_eq!(resolve_entry(&entries, "aaaaaaaa").unwrap(), a);
        assert_eq!(resolve_entry(&entries, &b.to_string()).unwrap(), b);
        assert!(resolve_entry(&entries, "aaaa").is_err());
        assert!(resolve_entry(&entries, "ffff").is_err());
        assert!(resolve_entry(&entries, "").is_err());
    }

    #[test]
    fn test_bars_scale_to_domain() {
        let entries = vec![
            entry(Uuid::new_v4(), (2025, 1, 1), 80.0),
            entry(Uuid::new_v4(), (2025, 1, 10), 78.0),
        ];
        let chart = WeightChart::from_entries(&entries);
        let lines = render_bars(&chart);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(" Jan 1 │"));
        assert!(lines[0].ends_with("80 kg"));
        // Domain is [76, 82]: 80 kg fills 4/6 of the width, 78 kg 2/6.
        assert_eq!(lines[0].matches('█').count(), 27);
        assert_eq!(lines[1].matches('█').count(), 13);
    }

    #[test]
    fn test_bars_empty_chart() {
        assert!(render_bars(&WeightChart::from_entries(&[])).is_empty());
    }

    #[tokio::test]
    async fn test_log_then_relog_updates_same_date() {
        let db = Database::open_in_memory().unwrap();
        let store = signed_in_store(&db);
        let owner = store.session().unwrap().user.id;

        cmd_weight_log(&db, &store, "80,5", Some("2025-01-10".to_string()), true)
            .await
            .unwrap();
        cmd_weight_log(&db, &store, "79.5", Some("2025-01-10".to_string()), true)
            .await
            .unwrap();

        let entries = db.weight_entries(owner).unwrap();
        assert_eq!(entries.len(), 1);
        assert!((entries[0].weight_kg - 79.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_log_rejects_bad_input() {
        let db = Database::open_in_memory().unwrap();
        let store = signed_in_store(&db);

        let err = cmd_weight_log(&db, &store, "abc", None, true)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid Weight"));

        let err = cmd_weight_log(&db, &store, "0", None, true)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid Weight: Weight must be greater than 0"
        );

        let future = (Local::now().date_naive() + chrono::Duration::days(3))
            .format("%Y-%m-%d")
            .to_string();
        let err = cmd_weight_log(&db, &store, "80", Some(future), true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("future"));
        assert!(db.weight_entries(store.session().unwrap().user.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_log_requires_login() {
        let db = Database::open_in_memory().unwrap();
        let store = SessionStore::in_memory();
        let err = cmd_weight_log(&db, &store, "80", None, true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("fatnomo login"));
    }

    #[tokio::test]
    async fn test_delete_by_prefix() {
        let db = Database::open_in_memory().unwrap();
        let store = signed_in_store(&db);
        let owner = store.session().unwrap().user.id;
        cmd_weight_log(&db, &store, "80", None, true).await.unwrap();
        let id = db.weight_entries(owner).unwrap()[0].id;

        cmd_weight_delete(&db, &store, &short_id(id), true)
            .await
            .unwrap();
        assert!(db.weight_entries(owner).unwrap().is_empty());
    }
}
