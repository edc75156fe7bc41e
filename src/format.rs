//! Output formatting for alerts and silences
//!
//! `simple` and `extended` print aligned tables, `json` prints the raw API
//! objects.

use crate::cli::OutputFormat;
use crate::client::{GettableAlert, GettableSilence, LabelSet};
use crate::error::Result;
use crate::matcher::Matcher;
use chrono::{DateTime, Utc};
use std::io::Write;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

pub fn write_alerts(out: &mut dyn Write, format: OutputFormat, alerts: &[GettableAlert]) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(out, alerts),
        OutputFormat::Simple => {
            let rows = alerts
                .iter()
                .map(|a| {
                    vec![
                        a.labels.get("alertname").cloned().unwrap_or_default(),
                        format_time(&a.starts_at),
                        a.annotations.get("summary").cloned().unwrap_or_default(),
                        a.status.state.clone(),
                    ]
                })
                .collect::<Vec<_>>();
            write_table(out, &["Alertname", "Starts At", "Summary", "State"], &rows)
        }
        OutputFormat::Extended => {
            let rows = alerts
                .iter()
                .map(|a| {
                    vec![
                        format_labels(&a.labels),
                        format_labels(&a.annotations),
                        format_time(&a.starts_at),
                        format_time(&a.ends_at),
                        a.generator_url.clone().unwrap_or_default(),
                        a.status.state.clone(),
                    ]
                })
                .collect::<Vec<_>>();
            write_table(
                out,
                &[
                    "Labels",
                    "Annotations",
                    "Starts At",
                    "Ends At",
                    "Generator URL",
                    "State",
                ],
                &rows,
            )
        }
    }
}

pub fn write_silences(
    out: &mut dyn Write,
    format: OutputFormat,
    silences: &[GettableSilence],
    quiet: bool,
) -> Result<()> {
    if quiet {
        for silence in silences {
            writeln!(out, "{}", silence.id)?;
        }
        return Ok(());
    }

    match format {
        OutputFormat::Json => write_json(out, silences),
        OutputFormat::Simple => {
            let rows = silences
                .iter()
                .map(|s| {
                    vec![
                        s.id.clone(),
                        format_matchers(s),
                        format_time(&s.ends_at),
                        s.created_by.clone(),
                        s.comment.clone(),
                    ]
                })
                .collect::<Vec<_>>();
            write_table(
                out,
                &["ID", "Matchers", "Ends At", "Created By", "Comment"],
                &rows,
            )
        }
        OutputFormat::Extended => {
            let rows = silences
                .iter()
                .map(|s| {
                    vec![
                        s.id.clone(),
                        format_matchers(s),
                        format_time(&s.starts_at),
                        format_time(&s.ends_at),
                        s.updated_at.as_ref().map(format_time).unwrap_or_default(),
                        s.created_by.clone(),
                        s.comment.clone(),
                        s.status.state.clone(),
                    ]
                })
                .collect::<Vec<_>>();
            write_table(
                out,
                &[
                    "ID",
                    "Matchers",
                    "Starts At",
                    "Ends At",
                    "Updated At",
                    "Created By",
                    "Comment",
                    "State",
                ],
                &rows,
            )
        }
    }
}

fn write_json<T: serde::Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Left-aligned columns separated by two spaces
fn write_table(out: &mut dyn Write, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    write_row(out, &widths, &header_cells)?;
    for row in rows {
        write_row(out, &widths, row)?;
    }
    Ok(())
}

fn write_row(out: &mut dyn Write, widths: &[usize], cells: &[String]) -> Result<()> {
    let last = cells.len().saturating_sub(1);
    let mut line = String::new();
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if i == last {
            line.push_str(cell);
        } else {
            line.push_str(&format!("{:<width$}  ", cell, width = width));
        }
    }
    writeln!(out, "{}", line.trim_end())?;
    Ok(())
}

pub fn format_time(time: &DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// `{a="1", b="2"}`-style rendering without braces
pub fn format_labels(labels: &LabelSet) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={:?}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_matchers(silence: &GettableSilence) -> String {
    silence
        .matchers
        .iter()
        .map(|m| Matcher::from_api(m).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{AlertStatus, SilenceStatus};
    use crate::matcher::{ApiMatcher, MatchOp};
    use chrono::TimeZone;

    fn alert() -> GettableAlert {
        let mut labels = LabelSet::new();
        labels.insert("alertname".to_string(), "HighLatency".to_string());
        labels.insert("job".to_string(), "api".to_string());
        let mut annotations = LabelSet::new();
        annotations.insert("summary".to_string(), "p99 over 1s".to_string());
        GettableAlert {
            labels,
            annotations,
            starts_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap(),
            updated_at: None,
            generator_url: Some("http://prom/graph".to_string()),
            fingerprint: "abc".to_string(),
            status: AlertStatus {
                state: "active".to_string(),
                silenced_by: vec![],
                inhibited_by: vec![],
            },
            receivers: vec![],
        }
    }

    fn silence() -> GettableSilence {
        GettableSilence {
            id: "a1b2".to_string(),
            matchers: vec![Matcher::new("job", MatchOp::Regex, "api|web").to_api()],
            starts_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap(),
            updated_at: None,
            created_by: "me".to_string(),
            comment: "maintenance".to_string(),
            status: SilenceStatus {
                state: "active".to_string(),
            },
        }
    }

    fn render<F: FnOnce(&mut Vec<u8>) -> Result<()>>(f: F) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_simple_alerts_table() {
        let text = render(|out| write_alerts(out, OutputFormat::Simple, &[alert()]));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Alertname    Starts At"));
        assert!(lines[1].starts_with("HighLatency  2024-05-01 12:00:00 UTC"));
        assert!(lines[1].contains("p99 over 1s"));
        assert!(lines[1].ends_with("active"));
    }

    #[test]
    fn test_extended_alerts_include_labels() {
        let text = render(|out| write_alerts(out, OutputFormat::Extended, &[alert()]));
        assert!(text.contains("alertname=\"HighLatency\" job=\"api\""));
        assert!(text.contains("http://prom/graph"));
    }

    #[test]
    fn test_json_alerts() {
        let text = render(|out| write_alerts(out, OutputFormat::Json, &[alert()]));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["labels"]["alertname"], "HighLatency");
        assert_eq!(value[0]["generatorURL"], "http://prom/graph");
    }

    #[test]
    fn test_empty_alert_list_prints_header_only() {
        let text = render(|out| write_alerts(out, OutputFormat::Simple, &[]));
        assert_eq!(text, "Alertname  Starts At  Summary  State\n");
    }

    #[test]
    fn test_simple_silences() {
        let text = render(|out| write_silences(out, OutputFormat::Simple, &[silence()], false));
        assert!(text.contains("a1b2"));
        assert!(text.contains("job=~\"api|web\""));
        assert!(text.contains("maintenance"));
    }

    #[test]
    fn test_quiet_silences_print_ids_only() {
        let text = render(|out| write_silences(out, OutputFormat::Extended, &[silence()], true));
        assert_eq!(text, "a1b2\n");
    }

    #[test]
    fn test_api_matcher_roundtrip_in_output() {
        let api = ApiMatcher {
            name: "env".to_string(),
            value: "prod".to_string(),
            is_regex: false,
            is_equal: false,
        };
        assert_eq!(Matcher::from_api(&api).to_string(), "env!=\"prod\"");
    }
}
