use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::actor::ActorId;
use crate::model::attendance::ChangeLogEntry;

const NO_TIME: &str = "--:--";

/// One rendered line of a record's change history.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "action": "approved",
    "actor_id": 1,
    "actor_name": "Ada Admin",
    "timestamp": "2026-01-05T18:10:00Z",
    "summary": "Clock in 09:00 → 09:15, clock out 17:00 → 17:30",
    "is_admin_change": false
}))]
pub struct HistoryLine {
    pub action: String,
    pub actor_id: ActorId,
    pub actor_name: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub is_admin_change: bool,
}

fn fmt_time(t: Option<NaiveDateTime>) -> String {
    t.map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| NO_TIME.to_string())
}

fn arrow(label: &str, old: Option<NaiveDateTime>, new: Option<NaiveDateTime>) -> String {
    if old == new {
        format!("{label} {}", fmt_time(new))
    } else {
        format!("{label} {} → {}", fmt_time(old), fmt_time(new))
    }
}

fn summarize(entry: &ChangeLogEntry) -> String {
    match entry {
        ChangeLogEntry::DirectEdit {
            old_clock_in,
            old_clock_out,
            new_clock_in,
            new_clock_out,
            ..
        }
        | ChangeLogEntry::Approved {
            old_clock_in,
            old_clock_out,
            new_clock_in,
            new_clock_out,
            ..
        } => format!(
            "{}, {}",
            arrow("Clock in", Some(*old_clock_in), Some(*new_clock_in)),
            arrow("clock out", *old_clock_out, *new_clock_out)
        ),
        ChangeLogEntry::Rejected {
            requested_clock_in,
            requested_clock_out,
            ..
        } => format!(
            "Requested clock in {}, clock out {} (discarded)",
            fmt_time(Some(*requested_clock_in)),
            fmt_time(*requested_clock_out)
        ),
    }
}

/// Renders a change log newest first. An empty log renders nothing.
pub fn render_history(log: &[ChangeLogEntry]) -> Vec<HistoryLine> {
    log.iter()
        .rev()
        .map(|entry| {
            let (actor_id, actor_name) = entry.actor();
            HistoryLine {
                action: entry.action().to_string(),
                actor_id,
                actor_name: actor_name.to_string(),
                timestamp: entry.timestamp(),
                summary: summarize(entry),
                is_admin_change: matches!(
                    entry,
                    ChangeLogEntry::DirectEdit {
                        is_admin_change: true,
                        ..
                    }
                ),
            }
        })
        .collect()
}
