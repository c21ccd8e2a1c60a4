#![allow(dead_code)]
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use attendance_approvals::approval::workflow::{RecordUpdate, plan_approval};
use attendance_approvals::approval::{AttendanceService, CommitEvent, CommitKind, CommitListener};
use attendance_approvals::auth::jwt::generate_access_token;
use attendance_approvals::config::Config;
use attendance_approvals::error::AttendanceResult;
use attendance_approvals::model::actor::{Actor, ActorId};
use attendance_approvals::model::attendance::{
    AttendanceRecord, EmployeeId, NewAttendance, RecordId,
};
use attendance_approvals::model::role::Role;
use attendance_approvals::store::{AttendanceFilter, AttendanceStore, MemoryStore};
use attendance_approvals::utils::display_name_cache::DisplayNameCache;
use attendance_approvals::utils::view_cache::ViewCache;

pub const SECRET: &str = "test-secret";
pub const EMPLOYEE_ID: u64 = 42;

pub const ADMIN_ID: u64 = 1;
pub const MANAGER_ID: u64 = 7;
pub const EMPLOYEE_USER_ID: u64 = 10;

/// 2026-01-05 at hh:mm
pub fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, 5)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

pub fn admin() -> Actor {
    Actor::new(ADMIN_ID, "Ada Admin", Role::Admin)
}

pub fn manager() -> Actor {
    Actor::new(MANAGER_ID, "hal", Role::Hr)
}

pub fn employee() -> Actor {
    Actor::new(EMPLOYEE_USER_ID, "olive", Role::Employee).with_employee(EMPLOYEE_ID)
}

/// A store with display names registered for the test actors.
pub fn store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.set_display_name(ADMIN_ID, "Ada Admin").unwrap();
    store.set_display_name(MANAGER_ID, "Hal Manager").unwrap();
    store.set_display_name(EMPLOYEE_USER_ID, "Olive Employee").unwrap();
    store
}

pub fn service(store: Arc<MemoryStore>) -> AttendanceService {
    AttendanceService::new(
        store,
        DisplayNameCache::new(Duration::from_secs(60)),
        ViewCache::new(Duration::from_secs(60)),
    )
}

/// Seeds a completed 09:00-17:00 day for `EMPLOYEE_ID`.
pub fn seed_day(store: &MemoryStore, id: RecordId) -> AttendanceRecord {
    let mut record = NewAttendance {
        employee_id: EMPLOYEE_ID,
        date: at(0, 0).date() - chrono::Days::new(id),
        clock_in: at(9, 0),
        created_at: Utc::now(),
    }
    .into_record(id);
    record.clock_out = Some(at(17, 0));
    record.work_hours = Some(8.0);
    store.put(record.clone()).unwrap();
    record
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "SERVER_ADDR" => Some("127.0.0.1:0".to_string()),
        "DATABASE_URL" => Some("mysql://unused@localhost/unused".to_string()),
        "JWT_SECRET" => Some(SECRET.to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn token_for(actor: &Actor) -> String {
    generate_access_token(
        actor.id,
        actor.display_name.clone(),
        actor.role.id(),
        actor.employee_id,
        SECRET,
        300,
    )
    .unwrap()
}

/// Captures every commit notification.
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<CommitEvent>>,
}

impl Recorder {
    pub fn taken(&self) -> Vec<CommitEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

#[async_trait]
impl CommitListener for Recorder {
    async fn on_commit(&self, event: &CommitEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Where a rival admin slips in an approval of the target record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacePoint {
    /// Just before the next conditional update reaches the store.
    Update,
    /// After the next list query returned, before the caller uses it.
    List,
    /// On the next display-name lookup (mid pending-queue rebuild).
    NameLookup,
}

/// Wraps a `MemoryStore` and lets a second admin approve `target` at an
/// armed point, committing through the same view cache the service uses.
pub struct RacingStore {
    pub inner: Arc<MemoryStore>,
    target: RecordId,
    views: ViewCache,
    armed: Mutex<Option<RacePoint>>,
}

impl RacingStore {
    pub fn new(inner: Arc<MemoryStore>, target: RecordId, views: ViewCache) -> Self {
        Self {
            inner,
            target,
            views,
            armed: Mutex::new(None),
        }
    }

    pub fn arm(&self, point: RacePoint) {
        *self.armed.lock().unwrap() = Some(point);
    }

    fn fires(&self, point: RacePoint) -> bool {
        let mut armed = self.armed.lock().unwrap();
        if *armed == Some(point) {
            *armed = None;
            true
        } else {
            false
        }
    }

    async fn rival_approves(&self) {
        let rival = Actor::new(2, "Bea Admin", Role::Admin);
        let record = self.inner.read(self.target).await.unwrap();
        let plan = plan_approval(&record, &rival, Utc::now()).unwrap();
        let done = self
            .inner
            .conditional_update(self.target, &plan.update)
            .await
            .unwrap();
        self.views
            .on_commit(&CommitEvent {
                record_id: done.id,
                employee_id: done.employee_id,
                kind: CommitKind::Transition(plan.transition),
                pending_queue_changed: true,
            })
            .await;
    }
}

#[async_trait]
impl AttendanceStore for RacingStore {
    async fn read(&self, id: RecordId) -> AttendanceResult<AttendanceRecord> {
        self.inner.read(id).await
    }

    async fn insert(&self, new: NewAttendance) -> AttendanceResult<AttendanceRecord> {
        self.inner.insert(new).await
    }

    async fn find_open_for_day(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> AttendanceResult<Option<AttendanceRecord>> {
        self.inner.find_open_for_day(employee_id, date).await
    }

    async fn conditional_update(
        &self,
        id: RecordId,
        update: &RecordUpdate,
    ) -> AttendanceResult<AttendanceRecord> {
        if self.fires(RacePoint::Update) {
            self.rival_approves().await;
        }
        self.inner.conditional_update(id, update).await
    }

    async fn query_pending(&self) -> AttendanceResult<Vec<AttendanceRecord>> {
        self.inner.query_pending().await
    }

    async fn count_pending(&self) -> AttendanceResult<u64> {
        self.inner.count_pending().await
    }

    async fn list(
        &self,
        filter: &AttendanceFilter,
    ) -> AttendanceResult<(Vec<AttendanceRecord>, u64)> {
        let page = self.inner.list(filter).await?;
        if self.fires(RacePoint::List) {
            self.rival_approves().await;
        }
        Ok(page)
    }

    async fn lookup_display_name(&self, actor_id: ActorId) -> AttendanceResult<Option<String>> {
        if self.fires(RacePoint::NameLookup) {
            self.rival_approves().await;
        }
        self.inner.lookup_display_name(actor_id).await
    }
}

/// A service over a `RacingStore` aimed at `target`.
pub fn racing_service(inner: Arc<MemoryStore>, target: RecordId) -> (AttendanceService, Arc<RacingStore>) {
    let views = ViewCache::new(Duration::from_secs(60));
    let racing = Arc::new(RacingStore::new(inner, target, views.clone()));
    let service = AttendanceService::new(
        racing.clone(),
        DisplayNameCache::new(Duration::from_secs(60)),
        views,
    );
    (service, racing)
}
