use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{AttendanceFilter, AttendanceStore};
use crate::approval::workflow::RecordUpdate;
use crate::error::{AttendanceError, AttendanceResult};
use crate::model::actor::ActorId;
use crate::model::attendance::{
    AttendanceRecord, EditStatus, EmployeeId, NewAttendance, RecordId,
};

#[derive(Default)]
struct State {
    next_id: RecordId,
    records: BTreeMap<RecordId, AttendanceRecord>,
    names: HashMap<ActorId, String>,
}

/// Process-local store. Every operation runs under one lock, so each
/// conditional update is trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AttendanceResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| AttendanceError::Unavailable("memory store lock poisoned".into()))
    }

    /// Registers the name `lookup_display_name` answers with.
    pub fn set_display_name(&self, actor_id: ActorId, name: impl Into<String>) -> AttendanceResult<()> {
        self.lock()?.names.insert(actor_id, name.into());
        Ok(())
    }

    /// Stores a record as given, keeping its id. Used to seed fixtures.
    pub fn put(&self, record: AttendanceRecord) -> AttendanceResult<()> {
        let mut state = self.lock()?;
        state.next_id = state.next_id.max(record.id);
        state.records.insert(record.id, record);
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn read(&self, id: RecordId) -> AttendanceResult<AttendanceRecord> {
        self.lock()?
            .records
            .get(&id)
            .cloned()
            .ok_or(AttendanceError::NotFound)
    }

    async fn insert(&self, new: NewAttendance) -> AttendanceResult<AttendanceRecord> {
        let mut state = self.lock()?;
        let duplicate = state
            .records
            .values()
            .any(|r| r.employee_id == new.employee_id && r.date == new.date);
        if duplicate {
            return Err(AttendanceError::Conflict);
        }

        state.next_id += 1;
        let record = new.into_record(state.next_id);
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_open_for_day(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> AttendanceResult<Option<AttendanceRecord>> {
        Ok(self
            .lock()?
            .records
            .values()
            .find(|r| r.employee_id == employee_id && r.date == date && r.clock_out.is_none())
            .cloned())
    }

    async fn conditional_update(
        &self,
        id: RecordId,
        update: &RecordUpdate,
    ) -> AttendanceResult<AttendanceRecord> {
        let mut state = self.lock()?;
        let record = state.records.get_mut(&id).ok_or(AttendanceError::NotFound)?;
        if !update.matches(record) {
            return Err(AttendanceError::Conflict);
        }
        update.apply_to(record);
        Ok(record.clone())
    }

    async fn query_pending(&self) -> AttendanceResult<Vec<AttendanceRecord>> {
        let mut pending: Vec<AttendanceRecord> = self
            .lock()?
            .records
            .values()
            .filter(|r| r.edit_status() == EditStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| std::cmp::Reverse(r.edit.pending().map(|p| p.requested_at)));
        Ok(pending)
    }

    async fn count_pending(&self) -> AttendanceResult<u64> {
        Ok(self
            .lock()?
            .records
            .values()
            .filter(|r| r.edit_status() == EditStatus::Pending)
            .count() as u64)
    }

    async fn list(
        &self,
        filter: &AttendanceFilter,
    ) -> AttendanceResult<(Vec<AttendanceRecord>, u64)> {
        let state = self.lock()?;
        let mut matching: Vec<&AttendanceRecord> = state
            .records
            .values()
            .filter(|r| filter.employee_id.is_none_or(|e| r.employee_id == e))
            .collect();
        matching.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.per_page() as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn lookup_display_name(&self, actor_id: ActorId) -> AttendanceResult<Option<String>> {
        Ok(self.lock()?.names.get(&actor_id).cloned())
    }
}
