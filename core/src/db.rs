use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use crate::auth::{AuthUser, Session};
use crate::backend::{Backend, ChangeFeed, ChangeHub, Table};
use crate::models::{
    ActivityFields, ActivityUpdate, NewWeightEntry, Profile, WeekPlanEntry, WeightEntry,
    WorkoutActivity,
};

pub const LOCAL_ACCESS_TOKEN: &str = "local";

/// Embedded store. Every query is scoped to an owner and every write
/// publishes a change notice.
pub struct Database {
    conn: Mutex<Connection>,
    changes: ChangeHub,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Mutex::new(conn),
            changes: ChangeHub::new(),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection poisoned"))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    email TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS weight_entries (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    weight_kg REAL NOT NULL,
                    entry_date TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    UNIQUE(user_id, entry_date)
                );

                CREATE TABLE IF NOT EXISTS workout_activities (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    activity TEXT NOT NULL DEFAULT '',
                    reps INTEGER,
                    sets INTEGER,
                    current_weight REAL,
                    times_per_week INTEGER,
                    calories REAL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS week_plan_entries (
                    user_id TEXT NOT NULL,
                    day_of_week TEXT NOT NULL,
                    time_slot TEXT NOT NULL,
                    content TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE(user_id, day_of_week, time_slot)
                );

                CREATE TABLE IF NOT EXISTS profiles (
                    user_id TEXT PRIMARY KEY,
                    theme TEXT,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_weight_entries_user ON weight_entries(user_id);
                CREATE INDEX IF NOT EXISTS idx_workout_activities_user ON workout_activities(user_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Local accounts ---

    /// Sign in against the embedded store, creating the account on first use.
    pub fn sign_in_local(&self, email: &str) -> Result<Session> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            bail!("Invalid email address: '{email}'");
        }
        let conn = self.conn()?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()?;
        let id = match existing {
            Some(id) => Uuid::parse_str(&id).context("Corrupt user id in database")?,
            None => {
                let id = Uuid::new_v4();
                conn.execute(
                    "INSERT INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
                    params![id.to_string(), email, Utc::now().to_rfc3339()],
                )?;
                tracing::info!(user = %id, "created local account");
                id
            }
        };
        Ok(Session {
            access_token: LOCAL_ACCESS_TOKEN.to_string(),
            user: AuthUser { id, email },
        })
    }

    // --- Weight Entries ---

    pub fn weight_entries(&self, owner: Uuid) -> Result<Vec<WeightEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, weight_kg, entry_date, created_at
             FROM weight_entries WHERE user_id = ?1 ORDER BY entry_date DESC",
        )?;
        let entries = stmt
            .query_map(params![owner.to_string()], weight_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn weight_entry_on(&self, owner: Uuid, date: NaiveDate) -> Result<Option<WeightEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                "SELECT id, user_id, weight_kg, entry_date, created_at
                 FROM weight_entries WHERE user_id = ?1 AND entry_date = ?2",
                params![owner.to_string(), date_key(date)],
                weight_entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    pub fn add_weight_entry(&self, owner: Uuid, entry: &NewWeightEntry) -> Result<WeightEntry> {
        let created = WeightEntry {
            id: Uuid::new_v4(),
            owner,
            weight_kg: entry.weight_kg,
            date: entry.date,
            created_at: Utc::now(),
        };
        self.conn()?
            .execute(
                "INSERT INTO weight_entries (id, user_id, weight_kg, entry_date, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    created.id.to_string(),
                    owner.to_string(),
                    created.weight_kg,
                    date_key(created.date),
                    created.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| format!("Failed to save weight entry for {}", entry.date))?;
        self.changes.publish(Table::WeightEntries, owner);
        Ok(created)
    }

    pub fn set_weight(&self, owner: Uuid, id: Uuid, weight_kg: f64) -> Result<()> {
        let rows = self.conn()?.execute(
            "UPDATE weight_entries SET weight_kg = ?1 WHERE id = ?2 AND user_id = ?3",
            params![weight_kg, id.to_string(), owner.to_string()],
        )?;
        if rows == 0 {
            bail!("Weight entry not found");
        }
        self.changes.publish(Table::WeightEntries, owner);
        Ok(())
    }

    pub fn remove_weight_entry(&self, owner: Uuid, id: Uuid) -> Result<()> {
        let rows = self.conn()?.execute(
            "DELETE FROM weight_entries WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), owner.to_string()],
        )?;
        if rows == 0 {
            bail!("Weight entry not found");
        }
        self.changes.publish(Table::WeightEntries, owner);
        Ok(())
    }

    // --- Workout Activities ---

    pub fn activities(&self, owner: Uuid) -> Result<Vec<WorkoutActivity>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, activity, reps, sets, current_weight, times_per_week,
                    calories, created_at
             FROM workout_activities WHERE user_id = ?1 ORDER BY created_at, rowid",
        )?;
        let rows = stmt
            .query_map(params![owner.to_string()], activity_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn add_activities(
        &self,
        owner: Uuid,
        rows: &[ActivityFields],
    ) -> Result<Vec<WorkoutActivity>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let created_at = Utc::now();
        let now = created_at.to_rfc3339();
        let mut created = Vec::with_capacity(rows.len());
        for fields in rows {
            let id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO workout_activities
                    (id, user_id, activity, reps, sets, current_weight, times_per_week,
                     calories, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.to_string(),
                    owner.to_string(),
                    fields.name,
                    fields.reps,
                    fields.sets,
                    fields.current_weight,
                    fields.times_per_week,
                    fields.calories,
                    now,
                ],
            )?;
            created.push(WorkoutActivity {
                id,
                owner,
                fields: fields.clone(),
                created_at,
            });
        }
        tx.commit()?;
        drop(conn);
        self.changes.publish(Table::WorkoutActivities, owner);
        Ok(created)
    }

    /// Rows whose id is unknown are inserted under that id. Rows that belong
    /// to another owner abort the whole batch.
    pub fn save_activities(&self, owner: Uuid, rows: &[ActivityUpdate]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        for row in rows {
            let holder: Option<String> = tx
                .query_row(
                    "SELECT user_id FROM workout_activities WHERE id = ?1",
                    params![row.id.to_string()],
                    |r| r.get(0),
                )
                .optional()?;
            if holder.is_some_and(|h| h != owner.to_string()) {
                bail!("Activity {} not found", row.id);
            }
            let f = &row.fields;
            tx.execute(
                "INSERT INTO workout_activities
                    (id, user_id, activity, reps, sets, current_weight, times_per_week,
                     calories, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    activity = excluded.activity,
                    reps = excluded.reps,
                    sets = excluded.sets,
                    current_weight = excluded.current_weight,
                    times_per_week = excluded.times_per_week,
                    calories = excluded.calories",
                params![
                    row.id.to_string(),
                    owner.to_string(),
                    f.name,
                    f.reps,
                    f.sets,
                    f.current_weight,
                    f.times_per_week,
                    f.calories,
                    now,
                ],
            )?;
        }
        tx.commit()?;
        drop(conn);
        self.changes.publish(Table::WorkoutActivities, owner);
        Ok(())
    }

    pub fn remove_activity(&self, owner: Uuid, id: Uuid) -> Result<()> {
        let rows = self.conn()?.execute(
            "DELETE FROM workout_activities WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), owner.to_string()],
        )?;
        if rows == 0 {
            bail!("Activity not found");
        }
        self.changes.publish(Table::WorkoutActivities, owner);
        Ok(())
    }

    // --- Week Plan ---

    pub fn week_plan(&self, owner: Uuid) -> Result<Vec<WeekPlanEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, day_of_week, time_slot, content
             FROM week_plan_entries WHERE user_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![owner.to_string()], |row| {
                Ok(WeekPlanEntry {
                    owner: uuid_column(row, 0)?,
                    day_of_week: row.get(1)?,
                    time_slot: row.get(2)?,
                    content: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn put_week_plan_entry(&self, entry: &WeekPlanEntry) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO week_plan_entries (user_id, day_of_week, time_slot, content, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, day_of_week, time_slot) DO UPDATE SET
                content = excluded.content,
                updated_at = excluded.updated_at",
            params![
                entry.owner.to_string(),
                entry.day_of_week,
                entry.time_slot,
                entry.content,
                Utc::now().to_rfc3339(),
            ],
        )?;
        self.changes.publish(Table::WeekPlanEntries, entry.owner);
        Ok(())
    }

    // --- Profiles ---

    pub fn profile(&self, owner: Uuid) -> Result<Option<Profile>> {
        let conn = self.conn()?;
        let profile = conn
            .query_row(
                "SELECT user_id, theme FROM profiles WHERE user_id = ?1",
                params![owner.to_string()],
                |row| {
                    Ok(Profile {
                        owner: uuid_column(row, 0)?,
                        theme: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    pub fn put_profile(&self, profile: &Profile) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO profiles (user_id, theme, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                theme = excluded.theme,
                updated_at = excluded.updated_at",
            params![
                profile.owner.to_string(),
                profile.theme,
                Utc::now().to_rfc3339()
            ],
        )?;
        self.changes.publish(Table::Profiles, profile.owner);
        Ok(())
    }
}

impl Backend for Database {
    async fn list_weight_entries(&self, owner: Uuid) -> Result<Vec<WeightEntry>> {
        self.weight_entries(owner)
    }

    async fn find_weight_entry(&self, owner: Uuid, date: NaiveDate) -> Result<Option<WeightEntry>> {
        self.weight_entry_on(owner, date)
    }

    async fn insert_weight_entry(&self, owner: Uuid, entry: &NewWeightEntry) -> Result<WeightEntry> {
        self.add_weight_entry(owner, entry)
    }

    async fn update_weight_entry(&self, owner: Uuid, id: Uuid, weight_kg: f64) -> Result<()> {
        self.set_weight(owner, id, weight_kg)
    }

    async fn delete_weight_entry(&self, owner: Uuid, id: Uuid) -> Result<()> {
        self.remove_weight_entry(owner, id)
    }

    async fn list_activities(&self, owner: Uuid) -> Result<Vec<WorkoutActivity>> {
        self.activities(owner)
    }

    async fn insert_activities(
        &self,
        owner: Uuid,
        rows: &[ActivityFields],
    ) -> Result<Vec<WorkoutActivity>> {
        self.add_activities(owner, rows)
    }

    async fn upsert_activities(&self, owner: Uuid, rows: &[ActivityUpdate]) -> Result<()> {
        self.save_activities(owner, rows)
    }

    async fn delete_activity(&self, owner: Uuid, id: Uuid) -> Result<()> {
        self.remove_activity(owner, id)
    }

    async fn list_week_plan(&self, owner: Uuid) -> Result<Vec<WeekPlanEntry>> {
        self.week_plan(owner)
    }

    async fn upsert_week_plan_entry(&self, entry: &WeekPlanEntry) -> Result<()> {
        self.put_week_plan_entry(entry)
    }

    async fn get_profile(&self, owner: Uuid) -> Result<Option<Profile>> {
        self.profile(owner)
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.put_profile(profile)
    }

    fn subscribe(&self, table: Table, owner: Option<Uuid>) -> ChangeFeed {
        self.changes.subscribe(table, owner)
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn uuid_column(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn date_column(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn weight_entry_from_row(row: &Row) -> rusqlite::Result<WeightEntry> {
    Ok(WeightEntry {
        id: uuid_column(row, 0)?,
        owner: uuid_column(row, 1)?,
        weight_kg: row.get(2)?,
        date: date_column(row, 3)?,
        created_at: timestamp_column(row, 4)?,
    })
}

fn activity_from_row(row: &Row) -> rusqlite::Result<WorkoutActivity> {
    Ok(WorkoutActivity {
        id: uuid_column(row, 0)?,
        owner: uuid_column(row, 1)?,
        fields: ActivityFields {
            name: row.get(2)?,
            reps: row.get(3)?,
            sets: row.get(4)?,
            current_weight: row.get(5)?,
            times_per_week: row.get(6)?,
            calories: row.get(7)?,
        },
        created_at: timestamp_column(row, 8)?,
    })
}
