use std::future::Future;

use anyhow::{Result, bail};

use fatnomo_core::auth::{Session, SessionStore};
use fatnomo_core::backend::Backend;
use fatnomo_core::db::Database;
use fatnomo_core::models::Theme;
use fatnomo_core::profile::{load_theme, set_theme};
use fatnomo_core::session::logout;

use super::helpers::{fit_error, prompt_line, require_email};
use super::signed_in;
use crate::supabase::SupabaseClient;

/// How a backend turns credentials into a session.
pub(crate) trait SignIn {
    /// Whether sign-in needs a password at all.
    fn needs_password(&self) -> bool;

    fn sign_in(
        &self,
        email: &str,
        password: Option<&str>,
    ) -> impl Future<Output = Result<Session>> + Send;
}

impl SignIn for Database {
    fn needs_password(&self) -> bool {
        false
    }

    // The embedded store is single-user on this machine; the email just
    // picks which local account owns the data.
    async fn sign_in(&self, email: &str, _password: Option<&str>) -> Result<Session> {
        self.sign_in_local(email)
    }
}

impl SignIn for SupabaseClient {
    fn needs_password(&self) -> bool {
        true
    }

    async fn sign_in(&self, email: &str, password: Option<&str>) -> Result<Session> {
        let Some(password) = password.filter(|p| !p.is_empty()) else {
            bail!("Password is required");
        };
        self.sign_in_with_password(email, password).await
    }
}

pub(crate) async fn cmd_login<S: SignIn>(
    backend: &S,
    store: &SessionStore,
    email: &str,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let email = require_email(email)?;
    let password = match password {
        Some(p) => Some(p),
        None if backend.needs_password() => Some(prompt_line("Password: ")?),
        None => None,
    };
    let session = backend.sign_in(email, password.as_deref()).await?;
    store.set_session(session.clone())?;
    tracing::info!(user = %session.user.id, "signed in");

    if json {
        println!("{}", serde_json::to_string_pretty(&session.user)?);
    } else {
        println!("Signed in as {}", session.user.email);
    }
    Ok(())
}

pub(crate) async fn cmd_logout(store: &SessionStore, json: bool) -> Result<()> {
    let was_signed_in = store.session().is_some();
    let route = logout(store).await?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "signed_out": was_signed_in, "redirect": route.path() })
        );
    } else if was_signed_in {
        println!("Signed out");
    } else {
        println!("Not signed in");
    }
    Ok(())
}

pub(crate) async fn cmd_whoami(store: &SessionStore, json: bool) -> Result<()> {
    let session = signed_in(store).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&session.user)?);
    } else {
        println!("{} ({})", session.user.email, session.user.id);
    }
    Ok(())
}

pub(crate) async fn cmd_theme_show<B: Backend>(
    backend: &B,
    store: &SessionStore,
    json: bool,
) -> Result<()> {
    let session = signed_in(store).await?;
    let theme = load_theme(backend, session.user.id)
        .await
        .map_err(|e| fit_error("Error", &e))?;
    if json {
        println!("{}", serde_json::json!({ "theme": theme }));
    } else {
        match theme {
            Some(theme) => println!("{theme}"),
            None => println!("No theme set (following system)"),
        }
    }
    Ok(())
}

pub(crate) async fn cmd_theme_set<B: Backend>(
    backend: &B,
    store: &SessionStore,
    theme: &str,
    json: bool,
) -> Result<()> {
    let theme: Theme = theme.parse().map_err(|e| fit_error("Error", &e))?;
    let session = signed_in(store).await?;
    set_theme(backend, session.user.id, theme)
        .await
        .map_err(|e| fit_error("Error", &e))?;
    if json {
        println!("{}", serde_json::json!({ "theme": theme }));
    } else {
        println!("Theme set to {theme}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fatnomo_core::auth::AuthService;

    #[tokio::test]
    async fn test_local_login_persists_session() {
        let db = Database::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(&dir.path().join("session.json")).unwrap();

        cmd_login(&db, &store, "Runner@Example.com", None, true)
            .await
            .unwrap();
        let session = store.current_session().await.unwrap().unwrap();
        assert_eq!(session.user.email, "runner@example.com");

        let reopened = SessionStore::open(&dir.path().join("session.json")).unwrap();
        assert_eq!(reopened.session(), Some(session));
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let db = Database::open_in_memory().unwrap();
        let store = SessionStore::in_memory();
        cmd_login(&db, &store, "a@b.c", None, true).await.unwrap();
        cmd_logout(&store, true).await.unwrap();
        assert!(store.session().is_none());
        assert!(cmd_whoami(&store, true).await.is_err());
    }

    #[tokio::test]
    async fn test_login_rejects_blank_email() {
        let db = Database::open_in_memory().unwrap();
        let store = SessionStore::in_memory();
        assert!(cmd_login(&db, &store, "  ", None, false).await.is_err());
        assert!(store.session().is_none());
    }

    #[tokio::test]
    async fn test_theme_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let store = SessionStore::in_memory();
        cmd_login(&db, &store, "a@b.c", None, true).await.unwrap();

        cmd_theme_set(&db, &store, "dark", true).await.unwrap();
        let owner = store.session().unwrap().user.id;
        assert_eq!(load_theme(&db, owner).await.unwrap(), Some(Theme::Dark));
        assert!(cmd_theme_set(&db, &store, "neon", true).await.is_err());
    }

    #[tokio::test]
    async fn test_theme_needs_session() {
        let db = Database::open_in_memory().unwrap();
        let store = SessionStore::in_memory();
        let err = cmd_theme_show(&db, &store, true).await.unwrap_err();
        assert!(err.to_string().contains("fatnomo login"));
    }

    #[tokio::test]
    async fn test_hosted_sign_in_requires_password() {
        let config = crate::config::HostedConfig {
            url: "http://127.0.0.1:9".to_string(),
            api_key: "anon".to_string(),
        };
        let client = SupabaseClient::new(&config, None).unwrap();
        assert!(client.needs_password());
        let err = client.sign_in("a@b.c", None).await.unwrap_err();
        assert_eq!(err.to_string(), "Password is required");
    }
}
