use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use std::path::PathBuf;

pub const DATA_DIR_VAR: &str = "FATNOMO_DATA_DIR";
pub const SUPABASE_URL_VAR: &str = "FATNOMO_SUPABASE_URL";
pub const SUPABASE_KEY_VAR: &str = "FATNOMO_SUPABASE_KEY";

/// Connection details for the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub session_path: PathBuf,
    /// Set when the hosted backend is selected; otherwise the embedded
    /// store in `db_path` is used.
    pub hosted: Option<HostedConfig>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v: &String| !v.trim().is_empty());
        let data_dir = match var(DATA_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => ProjectDirs::from("", "", "fatnomo")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        let config = Self::resolve(data_dir, var(SUPABASE_URL_VAR), var(SUPABASE_KEY_VAR))?;
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!(
                "Failed to create data directory: {}",
                config.data_dir.display()
            )
        })?;
        Ok(config)
    }

    fn resolve(data_dir: PathBuf, url: Option<String>, key: Option<String>) -> Result<Self> {
        let hosted = match (url, key) {
            (Some(url), Some(api_key)) => Some(HostedConfig {
                url: url.trim().trim_end_matches('/').to_string(),
                api_key: api_key.trim().to_string(),
            }),
            (None, None) => None,
            (Some(_), None) => bail!("{SUPABASE_URL_VAR} is set but {SUPABASE_KEY_VAR} is not"),
            (None, Some(_)) => bail!("{SUPABASE_KEY_VAR} is set but {SUPABASE_URL_VAR} is not"),
        };
        Ok(Config {
            db_path: data_dir.join("fatnomo.db"),
            session_path: data_dir.join("session.json"),
            data_dir,
            hosted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_by_default() {
        let config = Config::resolve(PathBuf::from("/tmp/fat"), None, None).unwrap();
        assert!(config.hosted.is_none());
        assert_eq!(config.db_path, PathBuf::from("/tmp/fat/fatnomo.db"));
        assert_eq!(config.session_path, PathBuf::from("/tmp/fat/session.json"));
    }

    #[test]
    fn test_hosted_needs_url_and_key() {
        let config = Config::resolve(
            PathBuf::from("/tmp/fat"),
            Some("https://abc.supabase.co/ ".to_string()),
            Some("anon".to_string()),
        )
        .unwrap();
        assert_eq!(
            config.hosted,
            Some(HostedConfig {
                url: "https://abc.supabase.co".to_string(),
                api_key: "anon".to_string(),
            })
        );

        assert!(Config::resolve(PathBuf::from("/tmp"), Some("u".to_string()), None).is_err());
        assert!(Config::resolve(PathBuf::from("/tmp"), None, Some("k".to_string())).is_err());
    }
}
