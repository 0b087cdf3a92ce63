mod account;
mod helpers;
mod plan;
mod weight;
mod workout;

use anyhow::{Result, anyhow};

use fatnomo_core::auth::{Session, SessionStore};
use fatnomo_core::session::SessionGate;

pub(crate) use account::{
    SignIn, cmd_login, cmd_logout, cmd_theme_set, cmd_theme_show, cmd_whoami,
};
pub(crate) use helpers::json_error;
pub(crate) use plan::{cmd_plan_set, cmd_plan_show};
pub(crate) use weight::{cmd_weight_chart, cmd_weight_delete, cmd_weight_history, cmd_weight_log};
pub(crate) use workout::{
    NewActivity, cmd_workout_add, cmd_workout_delete, cmd_workout_edit, cmd_workout_list,
    cmd_workout_stats,
};

/// Run the page gate for a command: the stored session, or an error that
/// sends the user to `fatnomo login`.
pub(super) async fn signed_in(store: &SessionStore) -> Result<Session> {
    let (gate, redirect, _changes) = SessionGate::establish(store).await?;
    if let Some(route) = redirect {
        tracing::debug!(route = route.path(), "no session, redirecting");
        return Err(anyhow!(
            "Not signed in. Run `fatnomo login <email>` first"
        ));
    }
    gate.session()
        .cloned()
        .ok_or_else(|| anyhow!("Not signed in. Run `fatnomo login <email>` first"))
}
