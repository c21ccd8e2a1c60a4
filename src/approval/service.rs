use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, SubsecRound, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::approval::history::{HistoryLine, render_history};
use crate::approval::workflow::{
    EditProposal, Plan, Transition, plan_approval, plan_clock_out, plan_edit, plan_rejection,
};
use crate::error::{AttendanceError, AttendanceResult};
use crate::model::actor::Actor;
use crate::model::attendance::{
    AttendanceRecord, AttendanceResponse, EditStatus, EmployeeId, NewAttendance, RecordId,
};
use crate::model::role::Role;
use crate::store::{AttendanceFilter, AttendanceStore};
use crate::utils::display_name_cache::DisplayNameCache;
use crate::utils::view_cache::ViewCache;

/// Emitted after every successful write.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitEvent {
    pub record_id: RecordId,
    pub employee_id: EmployeeId,
    pub kind: CommitKind,
    pub pending_queue_changed: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CommitKind {
    ClockedIn,
    Transition(Transition),
}

/// Hook for anything that has to observe writes: caches, push channels, audit
/// forwarders. Called after the write is durable; it cannot fail the write.
#[async_trait]
pub trait CommitListener: Send + Sync {
    async fn on_commit(&self, event: &CommitEvent);
}

/// A pending record with the requester's name resolved.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PendingApproval {
    #[serde(flatten)]
    pub record: AttendanceResponse,
    #[schema(example = "Hal Manager")]
    pub requested_by_name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendancePage {
    pub data: Vec<AttendanceResponse>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 20)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: u64,
}

/// Orchestrates the edit workflow against a store.
///
/// Each mutating call is read, plan, one conditional write, then notify.
pub struct AttendanceService {
    store: Arc<dyn AttendanceStore>,
    names: DisplayNameCache,
    views: ViewCache,
    listeners: Vec<Arc<dyn CommitListener>>,
}

impl AttendanceService {
    pub fn new(store: Arc<dyn AttendanceStore>, names: DisplayNameCache, views: ViewCache) -> Self {
        let listeners: Vec<Arc<dyn CommitListener>> = vec![Arc::new(views.clone())];
        Self {
            store,
            names,
            views,
            listeners,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn CommitListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn store(&self) -> &dyn AttendanceStore {
        self.store.as_ref()
    }

    async fn notify(&self, event: CommitEvent) {
        for listener in &self.listeners {
            listener.on_commit(&event).await;
        }
    }

    async fn commit(&self, record: &AttendanceRecord, plan: Plan) -> AttendanceResult<AttendanceRecord> {
        let transition = plan.transition;
        let updated = match self.store.conditional_update(record.id, &plan.update).await {
            Ok(updated) => updated,
            Err(AttendanceError::Conflict) if transition.is_resolution() => {
                // Lost the race: tell "already resolved" apart from "still pending but changed"
                let fresh = self.store.read(record.id).await?;
                return Err(if fresh.edit_status() == EditStatus::Pending {
                    AttendanceError::Conflict
                } else {
                    AttendanceError::invalid_state(format!(
                        "attendance record {} was already resolved",
                        record.id
                    ))
                });
            }
            Err(e) => return Err(e),
        };

        info!(
            record_id = updated.id,
            employee_id = updated.employee_id,
            transition = ?transition,
            version = updated.version,
            "Attendance record updated"
        );

        self.notify(CommitEvent {
            record_id: updated.id,
            employee_id: updated.employee_id,
            kind: CommitKind::Transition(transition),
            pending_queue_changed: transition.touches_pending_queue(),
        })
        .await;

        Ok(updated)
    }

    fn employee_of(actor: &Actor) -> AttendanceResult<EmployeeId> {
        actor.ensure_identified()?;
        actor
            .employee_id
            .ok_or_else(|| AttendanceError::unauthorized("No employee profile"))
    }

    /// Creates today's record for the actor's employee profile.
    pub async fn clock_in(&self, actor: &Actor, at: NaiveDateTime) -> AttendanceResult<AttendanceRecord> {
        let employee_id = Self::employee_of(actor)?;
        let at = at.trunc_subsecs(0);

        let record = self
            .store
            .insert(NewAttendance {
                employee_id,
                date: at.date(),
                clock_in: at,
                created_at: Utc::now(),
            })
            .await
            .map_err(|e| match e {
                AttendanceError::Conflict => {
                    AttendanceError::invalid_input("Already checked in today")
                }
                other => other,
            })?;

        info!(record_id = record.id, employee_id, "Clocked in");
        self.notify(CommitEvent {
            record_id: record.id,
            employee_id,
            kind: CommitKind::ClockedIn,
            pending_queue_changed: false,
        })
        .await;

        Ok(record)
    }

    pub async fn clock_in_now(&self, actor: &Actor) -> AttendanceResult<AttendanceRecord> {
        self.clock_in(actor, Local::now().naive_local()).await
    }

    /// Closes the actor's open record for the day of `at`.
    pub async fn clock_out(&self, actor: &Actor, at: NaiveDateTime) -> AttendanceResult<AttendanceRecord> {
        let employee_id = Self::employee_of(actor)?;
        let at = at.trunc_subsecs(0);

        let record = self
            .store
            .find_open_for_day(employee_id, at.date())
            .await?
            .ok_or(AttendanceError::NotFound)?;

        let plan = plan_clock_out(&record, at, Utc::now())?;
        self.commit(&record, plan).await
    }

    pub async fn clock_out_now(&self, actor: &Actor) -> AttendanceResult<AttendanceRecord> {
        self.clock_out(actor, Local::now().naive_local()).await
    }

    pub async fn get(&self, actor: &Actor, id: RecordId) -> AttendanceResult<AttendanceRecord> {
        actor.ensure_identified()?;
        let record = self.store.read(id).await?;
        if !actor.can_access_employee(record.employee_id) {
            return Err(AttendanceError::unauthorized(
                "not allowed to view this attendance record",
            ));
        }
        Ok(record)
    }

    /// Paginated list. Employees always get their own records.
    pub async fn list(
        &self,
        actor: &Actor,
        mut filter: AttendanceFilter,
    ) -> AttendanceResult<Arc<AttendancePage>> {
        actor.ensure_identified()?;
        if let Some(requested) = filter.employee_id {
            if !actor.can_access_employee(requested) {
                return Err(AttendanceError::unauthorized(
                    "not allowed to list this employee's attendance",
                ));
            }
        } else if !actor.is_elevated() && actor.role != Role::Hr {
            filter.employee_id = Some(Self::employee_of(actor)?);
        }

        let key = (filter.employee_id, filter.page(), filter.per_page());
        if let Some(page) = self.views.list(&key).await {
            debug!(?key, "Attendance list served from cache");
            return Ok(page);
        }

        let generation = self.views.generation();
        let (records, total) = self.store.list(&filter).await?;
        let page = Arc::new(AttendancePage {
            data: records.iter().map(AttendanceResponse::from).collect(),
            page: filter.page(),
            per_page: filter.per_page(),
            total,
        });
        if !self.views.store_list(key, page.clone(), generation).await {
            debug!(?key, "Attendance list changed while loading, not cached");
        }
        Ok(page)
    }

    /// Applies or proposes an edit depending on the actor's privilege.
    pub async fn submit_edit(
        &self,
        actor: &Actor,
        id: RecordId,
        proposal: &EditProposal,
    ) -> AttendanceResult<AttendanceRecord> {
        actor.ensure_identified()?;
        let record = self.store.read(id).await?;
        let plan = plan_edit(&record, proposal, actor, Utc::now())?;
        if plan.transition == Transition::DirectEdit && record.edit_status() == EditStatus::Pending {
            warn!(record_id = id, actor_id = actor.id, "Direct edit overrides a pending request");
        }
        self.commit(&record, plan).await
    }

    pub async fn approve(&self, actor: &Actor, id: RecordId) -> AttendanceResult<AttendanceRecord> {
        actor.require_elevated()?;
        let record = self.store.read(id).await?;
        let plan = plan_approval(&record, actor, Utc::now())?;
        self.commit(&record, plan).await
    }

    pub async fn reject(&self, actor: &Actor, id: RecordId) -> AttendanceResult<AttendanceRecord> {
        actor.require_elevated()?;
        let record = self.store.read(id).await?;
        let plan = plan_rejection(&record, actor, Utc::now())?;
        self.commit(&record, plan).await
    }

    pub async fn history(&self, actor: &Actor, id: RecordId) -> AttendanceResult<Vec<HistoryLine>> {
        let record = self.get(actor, id).await?;
        Ok(render_history(&record.change_log))
    }

    /// All pending records with requester names, newest request first.
    pub async fn pending_queue(&self, actor: &Actor) -> AttendanceResult<Arc<Vec<PendingApproval>>> {
        actor.require_elevated()?;
        if let Some(queue) = self.views.pending().await {
            return Ok(queue);
        }

        let generation = self.views.generation();
        let records = self.store.query_pending().await?;
        let mut queue = Vec::with_capacity(records.len());
        for record in &records {
            let requested_by_name = match record.edit.pending() {
                Some(p) => self.names.resolve(self.store.as_ref(), p.requested_by).await,
                None => continue,
            };
            queue.push(PendingApproval {
                record: AttendanceResponse::from(record),
                requested_by_name,
            });
        }

        let queue = Arc::new(queue);
        if !self.views.store_pending(queue.clone(), generation).await {
            debug!("Pending queue changed while loading, not cached");
        }
        Ok(queue)
    }

    pub async fn pending_count(&self, actor: &Actor) -> AttendanceResult<u64> {
        actor.require_hr_or_admin()?;
        match self.views.pending().await {
            Some(queue) => Ok(queue.len() as u64),
            None => self.store.count_pending().await,
        }
    }
}
