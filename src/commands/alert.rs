//! `amtool alert query` and `amtool alert add`

use super::{parse_time, Settings};
use crate::cli::{AlertAddArgs, AlertCommand, AlertQueryArgs};
use crate::client::{AlertFilter, LabelSet, PostableAlert};
use crate::error::{AmtoolError, Result};
use crate::format;
use crate::matcher::{self, MatchOp};
use std::io::Write;

pub fn run(cmd: AlertCommand, settings: &Settings, out: &mut dyn Write) -> Result<()> {
    match cmd {
        AlertCommand::Query(args) => query(&args, settings, out),
        AlertCommand::Add(args) => add(&args, settings),
    }
}

fn query(args: &AlertQueryArgs, settings: &Settings, out: &mut dyn Write) -> Result<()> {
    let matchers = matcher::parse_matchers(&args.matchers)?;
    let filter = build_filter(args, settings, &matchers);
    let client = settings.client()?;

    let alerts = client.get_alerts(&filter)?;
    tracing::debug!(count = alerts.len(), "fetched alerts");
    format::write_alerts(out, settings.output, &alerts)
}

/// Without any state flag only active alerts are shown
fn build_filter(
    args: &AlertQueryArgs,
    settings: &Settings,
    matchers: &[matcher::Matcher],
) -> AlertFilter {
    let any_state = args.active || args.silenced || args.inhibited || args.unprocessed;
    AlertFilter {
        active: args.active || !any_state,
        silenced: args.silenced,
        inhibited: args.inhibited,
        unprocessed: args.unprocessed,
        receiver: args.receiver.clone().or_else(|| settings.receiver.clone()),
        matchers: matchers.to_vec(),
    }
}

fn add(args: &AlertAddArgs, settings: &Settings) -> Result<()> {
    let alert = build_alert(args)?;
    let client = settings.client()?;

    tracing::debug!(labels = ?alert.labels, "posting alert");
    client.post_alerts(&[alert])
}

fn build_alert(args: &AlertAddArgs) -> Result<PostableAlert> {
    let mut labels = LabelSet::new();
    for m in matcher::parse_matchers(&args.labels)? {
        if m.op != MatchOp::Equal {
            return Err(AmtoolError::BadLabel(m.to_string()));
        }
        labels.insert(m.name, m.value);
    }

    let mut annotations = LabelSet::new();
    for raw in &args.annotations {
        let (key, value) = raw
            .split_once('=')
            .filter(|(key, _)| matcher::is_valid_label_name(key))
            .ok_or_else(|| AmtoolError::BadAnnotation(raw.clone()))?;
        annotations.insert(key.to_string(), value.to_string());
    }

    Ok(PostableAlert {
        labels,
        annotations,
        starts_at: args.start.as_deref().map(parse_time).transpose()?,
        ends_at: args.end.as_deref().map(parse_time).transpose()?,
        generator_url: args.generator_url.clone(),
    })
}
