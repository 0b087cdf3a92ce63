use anyhow::{Context, Result, anyhow, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::io::{self, BufRead, Write};

use fatnomo_core::error::FitError;
use fatnomo_core::notice::Notice;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    let today = Local::now().date_naive();
    match date_str {
        None => Ok(today),
        Some(s) => match s.as_str() {
            "today" => Ok(today),
            "yesterday" => Ok(today - chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD, today or yesterday")),
        },
    }
}

/// Read one trimmed line from stdin after printing `label` to stderr.
pub(crate) fn prompt_line(label: &str) -> Result<String> {
    eprint!("{label}");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    Ok(line.trim().to_string())
}

pub(crate) fn confirm(question: &str) -> Result<bool> {
    let answer = prompt_line(&format!("{question} [y/N] "))?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

/// Print a success notice the way the rest of the CLI reports results.
pub(crate) fn print_notice(notice: &Notice, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(notice)?);
    } else {
        println!("{}", notice.description);
    }
    Ok(())
}

/// Turn a failure notice into the command's error.
pub(crate) fn notice_error(notice: &Notice) -> anyhow::Error {
    anyhow!("{}: {}", notice.title, notice.description)
}

/// Error for a failed page operation, titled the way the page titles it.
pub(crate) fn fit_error(title: &str, err: &FitError) -> anyhow::Error {
    if matches!(err, FitError::Unauthenticated) {
        return anyhow!("{err}. Run `fatnomo login <email>` first");
    }
    notice_error(&Notice::error(title, err))
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// Optional numeric cell for table output.
pub(crate) fn cell<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub(crate) fn require_email(email: &str) -> Result<&str> {
    let email = email.trim();
    if email.is_empty() {
        bail!("Email is required");
    }
    Ok(email)
}
