//! Hosted backend: PostgREST tables and password sign-in over HTTPS.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fatnomo_core::auth::{AuthUser, Session};
use fatnomo_core::backend::{Backend, ChangeFeed, ChangeHub, Table};
use fatnomo_core::models::{
    ActivityFields, ActivityUpdate, NewWeightEntry, Profile, WeekPlanEntry, WeightEntry,
    WorkoutActivity,
};

use crate::config::HostedConfig;

const WEEK_PLAN_CONFLICT: &str = "user_id,day_of_week,time_slot";

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    changes: ChangeHub,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

/// Best human-readable message from an error body; falls back to the
/// status line.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let parsed: ApiError = serde_json::from_str(body).unwrap_or_default();
    parsed
        .message
        .or(parsed.error_description)
        .or(parsed.msg)
        .or(parsed.error)
        .unwrap_or_else(|| format!("Request failed with status {status}"))
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

#[derive(Serialize)]
struct NewWeightRow {
    user_id: Uuid,
    weight_kg: f64,
    entry_date: NaiveDate,
}

#[derive(Serialize)]
struct WeightPatch {
    weight_kg: f64,
}

#[derive(Serialize)]
struct ActivityRow<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Uuid>,
    user_id: Uuid,
    #[serde(flatten)]
    fields: &'a ActivityFields,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

impl SupabaseClient {
    pub fn new(config: &HostedConfig, access_token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!(
                "fatnomo-cli/{} (fitness tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.url.clone(),
            api_key: config.api_key.clone(),
            access_token,
            changes: ChangeHub::new(),
        })
    }

    fn table(&self, method: Method, table: Table) -> RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.http
            .request(method, format!("{}/rest/v1/{}", self.base_url, table.name()))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
    }

    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        bail!("{}", error_message(status, &body))
    }

    async fn fetch<T: DeserializeOwned>(req: RequestBuilder, what: &str) -> Result<T> {
        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to reach backend ({what})"))?;
        Self::check(resp)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse {what} response"))
    }

    async fn execute(req: RequestBuilder, what: &str) -> Result<()> {
        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to reach backend ({what})"))?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Upsert rows, merging on `conflict`.
    async fn upsert<T: Serialize + ?Sized>(
        &self,
        table: Table,
        conflict: &str,
        rows: &T,
    ) -> Result<()> {
        let req = self
            .table(Method::POST, table)
            .query(&[("on_conflict", conflict)])
            .header("Prefer", "resolution=merge-duplicates")
            .json(rows);
        Self::execute(req, table.name()).await
    }

    /// Owner-scoped delete that fails when nothing matched.
    async fn delete_owned(&self, table: Table, owner: Uuid, id: Uuid) -> Result<()> {
        let req = self
            .table(Method::DELETE, table)
            .query(&[("id", eq(id)), ("user_id", eq(owner))])
            .header("Prefer", "return=representation");
        let deleted: Vec<serde_json::Value> = Self::fetch(req, table.name()).await?;
        if deleted.is_empty() {
            bail!("Row {id} not found in {}", table.name());
        }
        self.changes.publish(table, owner);
        Ok(())
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let req = self
            .http
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }));
        let token: TokenResponse = Self::fetch(req, "sign-in").await?;
        tracing::debug!(user = %token.user.id, "signed in to hosted backend");
        Ok(Session {
            access_token: token.access_token,
            user: AuthUser {
                id: token.user.id,
                email: token.user.email.unwrap_or_else(|| email.to_string()),
            },
        })
    }
}

impl Backend for SupabaseClient {
    async fn list_weight_entries(&self, owner: Uuid) -> Result<Vec<WeightEntry>> {
        let req = self.table(Method::GET, Table::WeightEntries).query(&[
            ("select", "*".to_string()),
            ("user_id", eq(owner)),
            ("order", "entry_date.desc".to_string()),
        ]);
        Self::fetch(req, "weight entries").await
    }

    async fn find_weight_entry(&self, owner: Uuid, date: NaiveDate) -> Result<Option<WeightEntry>> {
        let req = self.table(Method::GET, Table::WeightEntries).query(&[
            ("select", "*".to_string()),
            ("user_id", eq(owner)),
            ("entry_date", eq(date)),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<WeightEntry> = Self::fetch(req, "weight entry").await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_weight_entry(&self, owner: Uuid, entry: &NewWeightEntry) -> Result<WeightEntry> {
        let req = self
            .table(Method::POST, Table::WeightEntries)
            .header("Prefer", "return=representation")
            .json(&NewWeightRow {
                user_id: owner,
                weight_kg: entry.weight_kg,
                entry_date: entry.date,
            });
        let rows: Vec<WeightEntry> = Self::fetch(req, "weight entry insert").await?;
        let created = rows
            .into_iter()
            .next()
            .context("Backend returned no row for the new weight entry")?;
        self.changes.publish(Table::WeightEntries, owner);
        Ok(created)
    }

    async fn update_weight_entry(&self, owner: Uuid, id: Uuid, weight_kg: f64) -> Result<()> {
        let req = self
            .table(Method::PATCH, Table::WeightEntries)
            .query(&[("id", eq(id)), ("user_id", eq(owner))])
            .header("Prefer", "return=representation")
            .json(&WeightPatch { weight_kg });
        let rows: Vec<serde_json::Value> = Self::fetch(req, "weight entry update").await?;
        if rows.is_empty() {
            bail!("Weight entry not found");
        }
        self.changes.publish(Table::WeightEntries, owner);
        Ok(())
    }

    async fn delete_weight_entry(&self, owner: Uuid, id: Uuid) -> Result<()> {
        self.delete_owned(Table::WeightEntries, owner, id).await
    }

    async fn list_activities(&self, owner: Uuid) -> Result<Vec<WorkoutActivity>> {
        let req = self.table(Method::GET, Table::WorkoutActivities).query(&[
            ("select", "*".to_string()),
            ("user_id", eq(owner)),
            ("order", "created_at.asc".to_string()),
        ]);
        Self::fetch(req, "activities").await
    }

    async fn insert_activities(
        &self,
        owner: Uuid,
        rows: &[ActivityFields],
    ) -> Result<Vec<WorkoutActivity>> {
        let body: Vec<ActivityRow<'_>> = rows
            .iter()
            .map(|fields| ActivityRow {
                id: None,
                user_id: owner,
                fields,
            })
            .collect();
        let req = self
            .table(Method::POST, Table::WorkoutActivities)
            .header("Prefer", "return=representation")
            .json(&body);
        let created: Vec<WorkoutActivity> = Self::fetch(req, "activity insert").await?;
        self.changes.publish(Table::WorkoutActivities, owner);
        Ok(created)
    }

    async fn upsert_activities(&self, owner: Uuid, rows: &[ActivityUpdate]) -> Result<()> {
        let body: Vec<ActivityRow<'_>> = rows
            .iter()
            .map(|row| ActivityRow {
                id: Some(row.id),
                user_id: owner,
                fields: &row.fields,
            })
            .collect();
        self.upsert(Table::WorkoutActivities, "id", &body).await?;
        self.changes.publish(Table::WorkoutActivities, owner);
        Ok(())
    }

    async fn delete_activity(&self, owner: Uuid, id: Uuid) -> Result<()> {
        self.delete_owned(Table::WorkoutActivities, owner, id).await
    }

    async fn list_week_plan(&self, owner: Uuid) -> Result<Vec<WeekPlanEntry>> {
        let req = self.table(Method::GET, Table::WeekPlanEntries).query(&[
            ("select", "user_id,day_of_week,time_slot,content".to_string()),
            ("user_id", eq(owner)),
        ]);
        Self::fetch(req, "week plan").await
    }

    async fn upsert_week_plan_entry(&self, entry: &WeekPlanEntry) -> Result<()> {
        self.upsert(Table::WeekPlanEntries, WEEK_PLAN_CONFLICT, entry)
            .await?;
        self.changes.publish(Table::WeekPlanEntries, entry.owner);
        Ok(())
    }

    async fn get_profile(&self, owner: Uuid) -> Result<Option<Profile>> {
        let req = self.table(Method::GET, Table::Profiles).query(&[
            ("select", "user_id,theme".to_string()),
            ("user_id", eq(owner)),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<Profile> = Self::fetch(req, "profile").await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.upsert(Table::Profiles, "user_id", profile).await?;
        self.changes.publish(Table::Profiles, profile.owner);
        Ok(())
    }

    fn subscribe(&self, table: Table, owner: Option<Uuid>) -> ChangeFeed {
        self.changes.subscribe(table, owner)
    }
}
