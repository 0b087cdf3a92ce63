use anyhow::Context;
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::FitResult;
use crate::models::{Profile, Theme};

/// The owner's stored theme, if any. An unrecognised stored value is
/// treated as unset.
pub async fn load_theme<B: Backend>(backend: &B, owner: Uuid) -> FitResult<Option<Theme>> {
    let profile = backend
        .get_profile(owner)
        .await
        .context("Failed to load profile")?;
    let Some(name) = profile.and_then(|p| p.theme) else {
        return Ok(None);
    };
    match name.parse() {
        Ok(theme) => Ok(Some(theme)),
        Err(_) => {
            tracing::warn!(theme = %name, "ignoring unknown stored theme");
            Ok(None)
        }
    }
}

pub async fn set_theme<B: Backend>(backend: &B, owner: Uuid, theme: Theme) -> FitResult<()> {
    backend
        .upsert_profile(&Profile {
            owner,
            theme: Some(theme.as_str().to_string()),
        })
        .await
        .context("Failed to save theme")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FlakyBackend, Op};

    #[tokio::test]
    async fn test_theme_defaults_to_unset() {
        let backend = FlakyBackend::new();
        assert_eq!(load_theme(&backend, Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_load() {
        let backend = FlakyBackend::new();
        let owner = Uuid::new_v4();
        set_theme(&backend, owner, Theme::Dark).await.unwrap();
        set_theme(&backend, owner, Theme::System).await.unwrap();
        assert_eq!(
            load_theme(&backend, owner).await.unwrap(),
            Some(Theme::System)
        );
    }

    #[tokio::test]
    async fn test_unknown_stored_theme_is_ignored() {
        let backend = FlakyBackend::new();
        let owner = Uuid::new_v4();
        backend
            .db
            .put_profile(&Profile {
                owner,
                theme: Some("solarized".to_string()),
            })
            .unwrap();
        assert_eq!(load_theme(&backend, owner).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_save_reports_error() {
        let backend = FlakyBackend::new();
        backend.fail(Op::UpsertProfile);
        let err = set_theme(&backend, Uuid::new_v4(), Theme::Light)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Failed to save theme"));
    }
}
