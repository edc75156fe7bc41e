//! `amtool silence query|add|expire`

use super::{parse_time, Settings};
use crate::cli::{SilenceAddArgs, SilenceCommand, SilenceExpireArgs, SilenceQueryArgs};
use crate::client::{GettableSilence, PostableSilence};
use crate::config::parse_duration;
use crate::error::{AmtoolError, Result};
use crate::format;
use crate::matcher;
use chrono::{DateTime, Utc};
use std::io::Write;

pub fn run(cmd: SilenceCommand, settings: &Settings, out: &mut dyn Write) -> Result<()> {
    match cmd {
        SilenceCommand::Query(args) => query(&args, settings, out),
        SilenceCommand::Add(args) => add(&args, settings, Utc::now(), out),
        SilenceCommand::Expire(args) => expire(&args, settings),
    }
}

fn query(args: &SilenceQueryArgs, settings: &Settings, out: &mut dyn Write) -> Result<()> {
    let matchers = matcher::parse_matchers(&args.matchers)?;
    let client = settings.client()?;

    let silences = client.get_silences(&matchers)?;
    let selected = select_by_state(silences, args.expired);
    tracing::debug!(count = selected.len(), expired = args.expired, "fetched silences");

    format::write_silences(out, settings.output, &selected, args.quiet)
}

/// Keep expired silences with `--expired`, everything else otherwise
fn select_by_state(silences: Vec<GettableSilence>, expired: bool) -> Vec<GettableSilence> {
    silences
        .into_iter()
        .filter(|s| (s.status.state == "expired") == expired)
        .collect()
}

fn add(
    args: &SilenceAddArgs,
    settings: &Settings,
    now: DateTime<Utc>,
    out: &mut dyn Write,
) -> Result<()> {
    let silence = build_silence(args, settings, now)?;
    let client = settings.client()?;

    let id = client.post_silence(&silence)?;
    writeln!(out, "{}", id)?;
    Ok(())
}

fn build_silence(
    args: &SilenceAddArgs,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Result<PostableSilence> {
    let matchers = matcher::parse_matchers(&args.matchers)?;

    let comment = args.comment.clone().unwrap_or_default();
    if settings.comment_required && comment.is_empty() {
        return Err(AmtoolError::CommentRequired);
    }

    let starts_at = match &args.start {
        Some(start) => parse_time(start)?,
        None => now,
    };
    let ends_at = match &args.end {
        Some(end) => parse_time(end)?,
        None => {
            let duration = parse_duration(&args.duration)?;
            let duration = chrono::Duration::from_std(duration)
                .map_err(|_| AmtoolError::BadDuration(args.duration.clone()))?;
            starts_at + duration
        }
    };
    if ends_at <= starts_at {
        return Err(AmtoolError::InvalidSilenceWindow);
    }

    Ok(PostableSilence {
        id: None,
        matchers: matchers.iter().map(|m| m.to_api()).collect(),
        starts_at,
        ends_at,
        created_by: args.author.clone().unwrap_or_else(|| settings.author.clone()),
        comment,
    })
}

fn expire(args: &SilenceExpireArgs, settings: &Settings) -> Result<()> {
    let client = settings.client()?;
    for id in &args.ids {
        tracing::debug!(id = %id, "expiring silence");
        client.delete_silence(id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use crate::client::SilenceStatus;
    use chrono::TimeZone;
    use std::time::Duration;

    fn settings() -> Settings {
        Settings {
            alertmanager_url: None,
            output: OutputFormat::Simple,
            timeout: Duration::from_secs(1),
            author: "tester".to_string(),
            comment_required: false,
            receiver: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn add_args(matchers: &[&str]) -> SilenceAddArgs {
        SilenceAddArgs {
            duration: "1h".to_string(),
            matchers: matchers.iter().map(|s| s.to_string()).collect(),
            ..SilenceAddArgs::default()
        }
    }

    fn silence(id: &str, state: &str) -> GettableSilence {
        GettableSilence {
            id: id.to_string(),
            matchers: vec![],
            starts_at: now(),
            ends_at: now(),
            updated_at: None,
            created_by: "me".to_string(),
            comment: String::new(),
            status: SilenceStatus {
                state: state.to_string(),
            },
        }
    }

    #[test]
    fn test_build_silence_defaults() {
        let silence = build_silence(&add_args(&["HighLatency"]), &settings(), now()).unwrap();
        assert_eq!(silence.starts_at, now());
        assert_eq!(silence.ends_at, now() + chrono::Duration::hours(1));
        assert_eq!(silence.created_by, "tester");
        assert_eq!(silence.matchers[0].name, "alertname");
        assert_eq!(silence.matchers[0].value, "HighLatency");
    }

    #[test]
    fn test_build_silence_explicit_end_overrides_duration() {
        let mut args = add_args(&["job=api"]);
        args.end = Some("2024-05-01T18:00:00Z".to_string());
        let silence = build_silence(&args, &settings(), now()).unwrap();
        assert_eq!(silence.ends_at, Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap());
    }

    #[test]
    fn test_build_silence_requires_comment_when_configured() {
        let mut settings = settings();
        settings.comment_required = true;
        assert!(matches!(
            build_silence(&add_args(&["job=api"]), &settings, now()),
            Err(AmtoolError::CommentRequired)
        ));

        let mut args = add_args(&["job=api"]);
        args.comment = Some("deploy".to_string());
        assert!(build_silence(&args, &settings, now()).is_ok());
    }

    #[test]
    fn test_build_silence_rejects_inverted_window() {
        let mut args = add_args(&["job=api"]);
        args.end = Some("2024-05-01T11:00:00Z".to_string());
        assert!(matches!(
            build_silence(&args, &settings(), now()),
            Err(AmtoolError::InvalidSilenceWindow)
        ));
    }

    #[test]
    fn test_build_silence_bad_duration() {
        let mut args = add_args(&["job=api"]);
        args.duration = "forever".to_string();
        assert!(matches!(
            build_silence(&args, &settings(), now()),
            Err(AmtoolError::BadDuration(_))
        ));
    }

    #[test]
    fn test_select_by_state() {
        let all = vec![
            silence("a", "active"),
            silence("b", "expired"),
            silence("c", "pending"),
        ];
        let active: Vec<String> = select_by_state(all.clone(), false)
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(active, vec!["a", "c"]);

        let expired: Vec<String> = select_by_state(all, true)
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(expired, vec!["b"]);
    }

    #[test]
    fn test_query_rejects_bad_matcher_before_network() {
        let args = SilenceQueryArgs {
            matchers: vec!["a=b".to_string(), "foo".to_string()],
            ..SilenceQueryArgs::default()
        };
        let mut out = Vec::new();
        let err = query(&args, &settings(), &mut out).unwrap_err();
        assert_eq!(err.to_string(), "bad matcher format: foo");
    }
}
