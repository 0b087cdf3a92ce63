use anyhow::Result;
use tokio::sync::watch;
use uuid::Uuid;

use crate::auth::{AuthService, Session};
use crate::error::{FitError, FitResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    WeightTracker,
    WeekPlan,
    Workout,
    Login,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::WeightTracker => "/weight",
            Self::WeekPlan => "/week-plan",
            Self::Workout => "/workout",
            Self::Login => "/auth",
        }
    }
}

/// What a gated page should render right now.
#[derive(Debug, PartialEq, Eq)]
pub enum GateView<'a> {
    Loading,
    Content(&'a Session),
    /// No session: render nothing and let the redirect navigate away.
    Nothing,
}

/// Per-page auth gate: an initial session check plus a subscription to
/// session changes. Every transition to "no session" yields a redirect to
/// the login route.
#[derive(Debug, Default)]
pub struct SessionGate {
    checked: bool,
    session: Option<Session>,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to session changes, then run the initial check.
    pub async fn establish<A: AuthService>(
        auth: &A,
    ) -> Result<(Self, Option<Route>, watch::Receiver<Option<Session>>)> {
        let changes = auth.on_session_change();
        let mut gate = Self::new();
        let session = auth.current_session().await?;
        let redirect = gate.on_initial_check(session);
        Ok((gate, redirect, changes))
    }

    pub fn on_initial_check(&mut self, session: Option<Session>) -> Option<Route> {
        self.checked = true;
        self.apply(session)
    }

    pub fn on_session_change(&mut self, session: Option<Session>) -> Option<Route> {
        self.apply(session)
    }

    fn apply(&mut self, session: Option<Session>) -> Option<Route> {
        self.session = session;
        if self.session.is_none() {
            Some(Route::Login)
        } else {
            None
        }
    }

    pub fn view(&self) -> GateView<'_> {
        match (&self.session, self.checked) {
            (Some(session), _) => GateView::Content(session),
            (None, false) => GateView::Loading,
            (None, true) => GateView::Nothing,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn owner(&self) -> FitResult<Uuid> {
        self.session
            .as_ref()
            .map(|s| s.user.id)
            .ok_or(FitError::Unauthenticated)
    }
}

/// Sign out and return where to navigate.
pub async fn logout<A: AuthService>(auth: &A) -> Result<Route> {
    auth.sign_out().await?;
    Ok(Route::Login)
}
