//! Edit-approval state machine.
//!
//! Every function here is pure: it inspects a record as read from the store
//! and returns the complete write (`RecordUpdate`) that the store must apply
//! atomically, guarded by the status and version the plan was computed from.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::{AttendanceError, AttendanceResult};
use crate::model::actor::Actor;
use crate::model::attendance::{
    AttendanceRecord, ChangeLogEntry, EditState, EditStatus, PendingEdit, RequestedTimes,
    work_hours,
};

/// Proposed correction. An absent field keeps the record's current value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EditProposal {
    #[schema(example = "2026-01-05T09:15:00", nullable = true)]
    pub clock_in: Option<NaiveDateTime>,
    #[schema(example = "2026-01-05T17:30:00", nullable = true)]
    pub clock_out: Option<NaiveDateTime>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transition {
    DirectEdit,
    EditRequested,
    Approved,
    Rejected,
    ClockedOut,
}

impl Transition {
    /// Whether the pending-approvals queue changes because of this write.
    ///
    /// A direct edit may clear an outstanding proposal, so it counts.
    pub fn touches_pending_queue(self) -> bool {
        !matches!(self, Transition::ClockedOut)
    }

    pub fn is_resolution(self) -> bool {
        matches!(self, Transition::Approved | Transition::Rejected)
    }
}

/// Full replacement of the mutable fields plus at most one log entry to append.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub expected_status: EditStatus,
    pub expected_version: u64,
    pub clock_in: NaiveDateTime,
    pub clock_out: Option<NaiveDateTime>,
    pub work_hours: Option<f64>,
    pub edit: EditState,
    pub append: Option<ChangeLogEntry>,
    pub updated_at: DateTime<Utc>,
}

impl RecordUpdate {
    fn from_record(record: &AttendanceRecord, now: DateTime<Utc>) -> Self {
        Self {
            expected_status: record.edit_status(),
            expected_version: record.version,
            clock_in: record.clock_in,
            clock_out: record.clock_out,
            work_hours: record.work_hours,
            edit: record.edit.clone(),
            append: None,
            updated_at: now,
        }
    }

    /// True when `record` is still in the state this update was planned against.
    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        record.edit_status() == self.expected_status && record.version == self.expected_version
    }

    /// Applies the update in place. Callers check `matches` first.
    pub fn apply_to(&self, record: &mut AttendanceRecord) {
        record.clock_in = self.clock_in;
        record.clock_out = self.clock_out;
        record.work_hours = self.work_hours;
        record.edit = self.edit.clone();
        if let Some(entry) = &self.append {
            record.change_log.push(entry.clone());
        }
        record.version += 1;
        record.updated_at = self.updated_at;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub transition: Transition,
    pub update: RecordUpdate,
}

/// Plans an edit submission.
///
/// Elevated actors overwrite the times at once and leave a `direct_edit`
/// entry; anyone else parks the proposal as pending without logging.
pub fn plan_edit(
    record: &AttendanceRecord,
    proposal: &EditProposal,
    actor: &Actor,
    now: DateTime<Utc>,
) -> AttendanceResult<Plan> {
    actor.ensure_identified()?;
    if !actor.can_access_employee(record.employee_id) {
        return Err(AttendanceError::unauthorized(
            "not allowed to edit this attendance record",
        ));
    }

    // DATETIME columns hold whole seconds; the log must match what is stored
    let new_clock_in = proposal
        .clock_in
        .map(|t| t.trunc_subsecs(0))
        .unwrap_or(record.clock_in);
    let new_clock_out = proposal
        .clock_out
        .map(|t| t.trunc_subsecs(0))
        .or(record.clock_out);

    if new_clock_in == record.clock_in && new_clock_out == record.clock_out {
        return Err(AttendanceError::invalid_input(
            "proposal does not change clock-in or clock-out",
        ));
    }
    if let Some(out) = new_clock_out {
        if out < new_clock_in {
            return Err(AttendanceError::invalid_input(
                "clock-out cannot be before clock-in",
            ));
        }
    }

    let mut update = RecordUpdate::from_record(record, now);

    if actor.is_elevated() {
        update.clock_in = new_clock_in;
        update.clock_out = new_clock_out;
        if let Some(hours) = work_hours(new_clock_in, new_clock_out) {
            update.work_hours = Some(hours);
        }
        update.edit = EditState::Clear;
        update.append = Some(ChangeLogEntry::DirectEdit {
            old_clock_in: record.clock_in,
            old_clock_out: record.clock_out,
            new_clock_in,
            new_clock_out,
            changed_by: actor.id,
            changed_by_name: actor.display_name.clone(),
            timestamp: now,
            is_admin_change: true,
        });

        return Ok(Plan {
            transition: Transition::DirectEdit,
            update,
        });
    }

    update.edit = EditState::Pending(PendingEdit {
        requested: RequestedTimes {
            clock_in: new_clock_in,
            clock_out: new_clock_out,
            work_hours: work_hours(new_clock_in, new_clock_out),
        },
        requested_by: actor.id,
        requested_at: now,
    });

    Ok(Plan {
        transition: Transition::EditRequested,
        update,
    })
}

fn pending_of<'a>(record: &'a AttendanceRecord) -> AttendanceResult<&'a PendingEdit> {
    record.edit.pending().ok_or_else(|| {
        AttendanceError::invalid_state(format!(
            "attendance record {} has no pending edit",
            record.id
        ))
    })
}

/// Applies the pending proposal exactly as it was captured, hours included.
pub fn plan_approval(
    record: &AttendanceRecord,
    actor: &Actor,
    now: DateTime<Utc>,
) -> AttendanceResult<Plan> {
    actor.require_elevated()?;
    let pending = pending_of(record)?;
    let requested = &pending.requested;

    let mut update = RecordUpdate::from_record(record, now);
    update.clock_in = requested.clock_in;
    update.clock_out = requested.clock_out;
    update.work_hours = requested.work_hours;
    update.edit = EditState::Clear;
    update.append = Some(ChangeLogEntry::Approved {
        old_clock_in: record.clock_in,
        old_clock_out: record.clock_out,
        new_clock_in: requested.clock_in,
        new_clock_out: requested.clock_out,
        approved_by: actor.id,
        approved_by_name: actor.display_name.clone(),
        timestamp: now,
    });

    Ok(Plan {
        transition: Transition::Approved,
        update,
    })
}

/// Discards the pending proposal, keeping it only in the log.
pub fn plan_rejection(
    record: &AttendanceRecord,
    actor: &Actor,
    now: DateTime<Utc>,
) -> AttendanceResult<Plan> {
    actor.require_elevated()?;
    let pending = pending_of(record)?;

    let mut update = RecordUpdate::from_record(record, now);
    update.edit = EditState::Clear;
    update.append = Some(ChangeLogEntry::Rejected {
        requested_clock_in: pending.requested.clock_in,
        requested_clock_out: pending.requested.clock_out,
        rejected_by: actor.id,
        rejected_by_name: actor.display_name.clone(),
        timestamp: now,
    });

    Ok(Plan {
        transition: Transition::Rejected,
        update,
    })
}

/// Ordinary end of the working day. Not an edit, so nothing is logged.
pub fn plan_clock_out(
    record: &AttendanceRecord,
    at: NaiveDateTime,
    now: DateTime<Utc>,
) -> AttendanceResult<Plan> {
    if record.clock_out.is_some() {
        return Err(AttendanceError::invalid_state("already clocked out"));
    }
    if at < record.clock_in {
        return Err(AttendanceError::invalid_input(
            "clock-out cannot be before clock-in",
        ));
    }

    let mut update = RecordUpdate::from_record(record, now);
    update.clock_out = Some(at);
    update.work_hours = work_hours(record.clock_in, Some(at));

    Ok(Plan {
        transition: Transition::ClockedOut,
        update,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::NewAttendance;
    use crate::model::role::Role;
    use chrono::{NaiveDate, Timelike};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 5)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn record() -> AttendanceRecord {
        let mut r = NewAttendance {
            employee_id: 42,
            date: at(0, 0).date(),
            clock_in: at(9, 0),
            created_at: Utc::now(),
        }
        .into_record(1);
        r.clock_out = Some(at(17, 0));
        r.work_hours = Some(8.0);
        r
    }

    fn admin() -> Actor {
        Actor::new(1, "Ada Admin", Role::Admin)
    }

    fn manager() -> Actor {
        Actor::new(7, "Hal Manager", Role::Hr)
    }

    fn apply(record: &mut AttendanceRecord, plan: &Plan) {
        assert!(plan.update.matches(record));
        plan.update.apply_to(record);
    }

    fn assert_consistent(record: &AttendanceRecord) {
        match &record.edit {
            EditState::Clear => assert_eq!(record.edit_status(), EditStatus::Approved),
            EditState::Pending(_) => assert_eq!(record.edit_status(), EditStatus::Pending),
        }
    }

    #[test]
    fn manager_submission_parks_proposal_without_logging() {
        let r = record();
        let proposal = EditProposal {
            clock_in: Some(at(9, 15)),
            clock_out: Some(at(17, 30)),
        };

        let plan = plan_edit(&r, &proposal, &manager(), Utc::now()).unwrap();

        assert_eq!(plan.transition, Transition::EditRequested);
        assert_eq!(plan.update.clock_in, at(9, 0));
        assert_eq!(plan.update.work_hours, Some(8.0));
        assert!(plan.update.append.is_none());
        let pending = plan.update.edit.pending().unwrap();
        assert_eq!(pending.requested.clock_in, at(9, 15));
        assert_eq!(pending.requested.work_hours, Some(8.25));
        assert_eq!(pending.requested_by, 7);
    }

    #[test]
    fn admin_edit_applies_immediately() {
        let r = record();
        let proposal = EditProposal {
            clock_in: Some(at(8, 0)),
            clock_out: Some(at(16, 30)),
        };

        let plan = plan_edit(&r, &proposal, &admin(), Utc::now()).unwrap();

        assert_eq!(plan.transition, Transition::DirectEdit);
        assert_eq!(plan.update.work_hours, Some(8.5));
        assert_eq!(plan.update.edit, EditState::Clear);
        match plan.update.append {
            Some(ChangeLogEntry::DirectEdit {
                old_clock_in,
                new_clock_in,
                is_admin_change,
                ..
            }) => {
                assert_eq!(old_clock_in, at(9, 0));
                assert_eq!(new_clock_in, at(8, 0));
                assert!(is_admin_change);
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn proposed_times_drop_fractional_seconds() {
        let r = record();
        let precise = at(8, 0).with_nanosecond(750_000_000).unwrap();
        let proposal = EditProposal {
            clock_in: Some(precise),
            clock_out: None,
        };

        let plan = plan_edit(&r, &proposal, &admin(), Utc::now()).unwrap();
        assert_eq!(plan.update.clock_in, at(8, 0));
        assert!(matches!(
            plan.update.append,
            Some(ChangeLogEntry::DirectEdit { new_clock_in, .. }) if new_clock_in == plan.update.clock_in
        ));

        let plan = plan_edit(&r, &proposal, &manager(), Utc::now()).unwrap();
        assert_eq!(plan.update.edit.pending().unwrap().requested.clock_in, at(8, 0));
    }

    #[test]
    fn admin_edit_without_clock_out_keeps_previous_hours() {
        let mut r = record();
        r.clock_out = None;
        r.work_hours = Some(3.0);

        let proposal = EditProposal {
            clock_in: Some(at(8, 45)),
            clock_out: None,
        };
        let plan = plan_edit(&r, &proposal, &admin(), Utc::now()).unwrap();

        assert_eq!(plan.update.clock_out, None);
        assert_eq!(plan.update.work_hours, Some(3.0));
    }

    #[test]
    fn unchanged_proposal_is_rejected() {
        let r = record();
        let proposal = EditProposal {
            clock_in: Some(at(9, 0)),
            clock_out: None,
        };

        let err = plan_edit(&r, &proposal, &manager(), Utc::now()).unwrap_err();
        assert!(matches!(err, AttendanceError::InvalidInput(_)));
    }

    #[test]
    fn inverted_times_are_rejected() {
        let r = record();
        let proposal = EditProposal {
            clock_in: Some(at(18, 0)),
            clock_out: None,
        };

        let err = plan_edit(&r, &proposal, &admin(), Utc::now()).unwrap_err();
        assert!(matches!(err, AttendanceError::InvalidInput(_)));
    }

    #[test]
    fn anonymous_and_foreign_employees_are_refused() {
        let r = record();
        let proposal = EditProposal {
            clock_in: Some(at(9, 5)),
            clock_out: None,
        };

        let anonymous = Actor::new(0, "", Role::Hr);
        assert!(matches!(
            plan_edit(&r, &proposal, &anonymous, Utc::now()),
            Err(AttendanceError::Unauthorized(_))
        ));

        let stranger = Actor::new(9, "Sam", Role::Employee).with_employee(99);
        assert!(matches!(
            plan_edit(&r, &proposal, &stranger, Utc::now()),
            Err(AttendanceError::Unauthorized(_))
        ));

        let owner = Actor::new(10, "Olive", Role::Employee).with_employee(42);
        let plan = plan_edit(&r, &proposal, &owner, Utc::now()).unwrap();
        assert_eq!(plan.transition, Transition::EditRequested);
    }

    #[test]
    fn approval_copies_captured_times_and_hours() {
        let mut r = record();
        let proposal = EditProposal {
            clock_in: Some(at(9, 15)),
            clock_out: Some(at(17, 30)),
        };
        let submit = plan_edit(&r, &proposal, &manager(), Utc::now()).unwrap();
        apply(&mut r, &submit);
        assert_consistent(&r);

        let approve = plan_approval(&r, &admin(), Utc::now()).unwrap();
        apply(&mut r, &approve);
        assert_consistent(&r);

        assert_eq!(r.clock_in, at(9, 15));
        assert_eq!(r.clock_out, Some(at(17, 30)));
        assert_eq!(r.work_hours, Some(8.25));
        assert_eq!(r.edit, EditState::Clear);
        match r.change_log.last() {
            Some(ChangeLogEntry::Approved {
                old_clock_in,
                new_clock_in,
                new_clock_out,
                approved_by,
                ..
            }) => {
                assert_eq!(*old_clock_in, at(9, 0));
                assert_eq!(*new_clock_in, at(9, 15));
                assert_eq!(*new_clock_out, Some(at(17, 30)));
                assert_eq!(*approved_by, 1);
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn rejection_keeps_applied_times() {
        let mut r = record();
        let proposal = EditProposal {
            clock_in: Some(at(8, 0)),
            clock_out: None,
        };
        let submit = plan_edit(&r, &proposal, &manager(), Utc::now()).unwrap();
        apply(&mut r, &submit);

        let reject = plan_rejection(&r, &admin(), Utc::now()).unwrap();
        apply(&mut r, &reject);

        assert_eq!(r.clock_in, at(9, 0));
        assert_eq!(r.work_hours, Some(8.0));
        assert_eq!(r.edit_status(), EditStatus::Approved);
        assert!(matches!(
            r.change_log.last(),
            Some(ChangeLogEntry::Rejected { requested_clock_in, .. }) if *requested_clock_in == at(8, 0)
        ));
    }

    #[test]
    fn resolving_a_clear_record_is_invalid_state() {
        let r = record();
        assert!(matches!(
            plan_approval(&r, &admin(), Utc::now()),
            Err(AttendanceError::InvalidState(_))
        ));
        assert!(matches!(
            plan_rejection(&r, &admin(), Utc::now()),
            Err(AttendanceError::InvalidState(_))
        ));
    }

    #[test]
    fn managers_cannot_resolve() {
        let mut r = record();
        let proposal = EditProposal {
            clock_in: Some(at(9, 30)),
            clock_out: None,
        };
        let submit = plan_edit(&r, &proposal, &manager(), Utc::now()).unwrap();
        apply(&mut r, &submit);

        assert!(matches!(
            plan_approval(&r, &manager(), Utc::now()),
            Err(AttendanceError::Unauthorized(_))
        ));
    }

    #[test]
    fn second_proposal_overwrites_the_first() {
        let mut r = record();
        let first = EditProposal {
            clock_in: Some(at(9, 30)),
            clock_out: None,
        };
        let second = EditProposal {
            clock_in: Some(at(9, 45)),
            clock_out: None,
        };
        let plan = plan_edit(&r, &first, &manager(), Utc::now()).unwrap();
        apply(&mut r, &plan);
        let plan = plan_edit(&r, &second, &manager(), Utc::now()).unwrap();
        apply(&mut r, &plan);

        assert_eq!(r.edit.pending().unwrap().requested.clock_in, at(9, 45));
        assert!(r.change_log.is_empty());
    }

    #[test]
    fn clock_out_sets_hours_without_logging() {
        let mut r = record();
        r.clock_in = at(8, 0);
        r.clock_out = None;
        r.work_hours = None;

        let plan = plan_clock_out(&r, at(16, 30), Utc::now()).unwrap();
        apply(&mut r, &plan);

        assert_eq!(r.work_hours, Some(8.5));
        assert!(r.change_log.is_empty());
        assert!(matches!(
            plan_clock_out(&r, at(17, 0), Utc::now()),
            Err(AttendanceError::InvalidState(_))
        ));
    }

    #[test]
    fn stale_plans_do_not_match() {
        let mut r = record();
        let proposal = EditProposal {
            clock_in: Some(at(9, 10)),
            clock_out: None,
        };
        let plan = plan_edit(&r, &proposal, &admin(), Utc::now()).unwrap();
        plan.update.apply_to(&mut r);

        assert!(!plan.update.matches(&r));
    }
}
