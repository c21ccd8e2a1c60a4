use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::model::actor::ActorId;

pub type RecordId = u64;
pub type EmployeeId = u64;

/// Stored edit-approval flag.
///
/// Two states only. `Approved` means "nothing outstanding", which covers a
/// fresh record as well as one whose last proposal was rejected.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EditStatus {
    Approved,
    Pending,
}

/// Proposed replacement times held while an edit awaits approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RequestedTimes {
    #[schema(example = "2026-01-05T09:15:00")]
    pub clock_in: NaiveDateTime,
    #[schema(example = "2026-01-05T17:30:00", nullable = true)]
    pub clock_out: Option<NaiveDateTime>,
    #[schema(example = 8.25, nullable = true)]
    pub work_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingEdit {
    pub requested: RequestedTimes,
    pub requested_by: ActorId,
    pub requested_at: DateTime<Utc>,
}

/// Edit sub-state of a record. The proposal, its author and its submission
/// time only exist together, inside `Pending`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EditState {
    #[default]
    Clear,
    Pending(PendingEdit),
}

impl EditState {
    pub fn status(&self) -> EditStatus {
        match self {
            EditState::Clear => EditStatus::Approved,
            EditState::Pending(_) => EditStatus::Pending,
        }
    }

    pub fn pending(&self) -> Option<&PendingEdit> {
        match self {
            EditState::Clear => None,
            EditState::Pending(p) => Some(p),
        }
    }

    /// Rebuilds the state from the flat stored columns.
    ///
    /// Returns `None` when the columns disagree with each other.
    pub fn from_parts(
        status: EditStatus,
        requested: Option<RequestedTimes>,
        requested_by: Option<ActorId>,
        requested_at: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        match (status, requested, requested_by, requested_at) {
            (EditStatus::Approved, None, None, None) => Some(EditState::Clear),
            (EditStatus::Pending, Some(requested), Some(requested_by), Some(requested_at)) => {
                Some(EditState::Pending(PendingEdit {
                    requested,
                    requested_by,
                    requested_at,
                }))
            }
            _ => None,
        }
    }
}

/// One audit entry. Entries are appended, never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChangeLogEntry {
    /// Applied immediately by an admin or the system.
    DirectEdit {
        old_clock_in: NaiveDateTime,
        old_clock_out: Option<NaiveDateTime>,
        new_clock_in: NaiveDateTime,
        new_clock_out: Option<NaiveDateTime>,
        changed_by: ActorId,
        changed_by_name: String,
        timestamp: DateTime<Utc>,
        is_admin_change: bool,
    },
    /// A pending proposal was accepted.
    Approved {
        old_clock_in: NaiveDateTime,
        old_clock_out: Option<NaiveDateTime>,
        new_clock_in: NaiveDateTime,
        new_clock_out: Option<NaiveDateTime>,
        approved_by: ActorId,
        approved_by_name: String,
        timestamp: DateTime<Utc>,
    },
    /// A pending proposal was discarded. Holds the times that were asked for.
    Rejected {
        requested_clock_in: NaiveDateTime,
        requested_clock_out: Option<NaiveDateTime>,
        rejected_by: ActorId,
        rejected_by_name: String,
        timestamp: DateTime<Utc>,
    },
}

impl ChangeLogEntry {
    pub fn action(&self) -> &'static str {
        match self {
            ChangeLogEntry::DirectEdit { .. } => "direct_edit",
            ChangeLogEntry::Approved { .. } => "approved",
            ChangeLogEntry::Rejected { .. } => "rejected",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ChangeLogEntry::DirectEdit { timestamp, .. }
            | ChangeLogEntry::Approved { timestamp, .. }
            | ChangeLogEntry::Rejected { timestamp, .. } => *timestamp,
        }
    }

    pub fn actor(&self) -> (ActorId, &str) {
        match self {
            ChangeLogEntry::DirectEdit {
                changed_by,
                changed_by_name,
                ..
            } => (*changed_by, changed_by_name),
            ChangeLogEntry::Approved {
                approved_by,
                approved_by_name,
                ..
            } => (*approved_by, approved_by_name),
            ChangeLogEntry::Rejected {
                rejected_by,
                rejected_by_name,
                ..
            } => (*rejected_by, rejected_by_name),
        }
    }
}

/// One employee's attendance for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub id: RecordId,
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub clock_in: NaiveDateTime,
    pub clock_out: Option<NaiveDateTime>,
    /// Derived from the applied times, never from a proposal.
    pub work_hours: Option<f64>,
    pub edit: EditState,
    pub change_log: Vec<ChangeLogEntry>,
    /// Bumped on every write; guards conditional updates.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn edit_status(&self) -> EditStatus {
        self.edit.status()
    }
}

/// Values needed to create the record on clock-in.
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub clock_in: NaiveDateTime,
    pub created_at: DateTime<Utc>,
}

impl NewAttendance {
    pub fn into_record(self, id: RecordId) -> AttendanceRecord {
        AttendanceRecord {
            id,
            employee_id: self.employee_id,
            date: self.date,
            clock_in: self.clock_in,
            clock_out: None,
            work_hours: None,
            edit: EditState::Clear,
            change_log: Vec::new(),
            version: 1,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Hours between clock-in and clock-out, rounded to two decimals.
///
/// `None` while the employee has not clocked out.
pub fn work_hours(clock_in: NaiveDateTime, clock_out: Option<NaiveDateTime>) -> Option<f64> {
    let clock_out = clock_out?;
    let hours = (clock_out - clock_in).num_seconds() as f64 / 3600.0;
    Some((hours * 100.0).round() / 100.0)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "employee_id": 1000,
    "date": "2026-01-05",
    "clock_in": "2026-01-05T09:00:00",
    "clock_out": "2026-01-05T17:00:00",
    "work_hours": 8.0,
    "edit_status": "pending",
    "requested_times": {
        "clock_in": "2026-01-05T09:15:00",
        "clock_out": "2026-01-05T17:30:00",
        "work_hours": 8.25
    },
    "requested_by": 7,
    "requested_at": "2026-01-05T18:02:11Z",
    "change_log": [],
    "version": 2
}))]
pub struct AttendanceResponse {
    pub id: RecordId,
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub clock_in: NaiveDateTime,
    pub clock_out: Option<NaiveDateTime>,
    pub work_hours: Option<f64>,
    pub edit_status: EditStatus,
    pub requested_times: Option<RequestedTimes>,
    pub requested_by: Option<ActorId>,
    pub requested_at: Option<DateTime<Utc>>,
    pub change_log: Vec<ChangeLogEntry>,
    pub version: u64,
}

impl From<&AttendanceRecord> for AttendanceResponse {
    fn from(r: &AttendanceRecord) -> Self {
        let pending = r.edit.pending();
        Self {
            id: r.id,
            employee_id: r.employee_id,
            date: r.date,
            clock_in: r.clock_in,
            clock_out: r.clock_out,
            work_hours: r.work_hours,
            edit_status: r.edit_status(),
            requested_times: pending.map(|p| p.requested.clone()),
            requested_by: pending.map(|p| p.requested_by),
            requested_at: pending.map(|p| p.requested_at),
            change_log: r.change_log.clone(),
            version: r.version,
        }
    }
}
