use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::approval::workflow::RecordUpdate;
use crate::error::AttendanceResult;
use crate::model::actor::ActorId;
use crate::model::attendance::{AttendanceRecord, EmployeeId, NewAttendance, RecordId};

pub mod memory;
pub mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

pub const DEFAULT_PER_PAGE: u64 = 20;
pub const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct AttendanceFilter {
    #[schema(example = 1000)]
    /// Filter by employee ID
    pub employee_id: Option<EmployeeId>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 20)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

impl AttendanceFilter {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    pub fn offset(&self) -> u64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }
}

/// Row-store the workflow persists through.
///
/// `conditional_update` is the only write path for existing records. It must
/// apply the field changes and the log append as one atomic write, and only
/// if the record still has the expected status and version.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn read(&self, id: RecordId) -> AttendanceResult<AttendanceRecord>;

    /// Fails with `Conflict` if the employee already has a record for that day.
    async fn insert(&self, new: NewAttendance) -> AttendanceResult<AttendanceRecord>;

    /// The employee's record for `date` that has no clock-out yet.
    async fn find_open_for_day(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> AttendanceResult<Option<AttendanceRecord>>;

    /// `NotFound` for an unknown id, `Conflict` when the guard fails.
    async fn conditional_update(
        &self,
        id: RecordId,
        update: &RecordUpdate,
    ) -> AttendanceResult<AttendanceRecord>;

    /// All pending records, most recent proposal first.
    async fn query_pending(&self) -> AttendanceResult<Vec<AttendanceRecord>>;

    async fn count_pending(&self) -> AttendanceResult<u64>;

    /// A page of records ordered by date descending, plus the total count.
    async fn list(
        &self,
        filter: &AttendanceFilter,
    ) -> AttendanceResult<(Vec<AttendanceRecord>, u64)>;

    async fn lookup_display_name(&self, actor_id: ActorId) -> AttendanceResult<Option<String>>;
}
