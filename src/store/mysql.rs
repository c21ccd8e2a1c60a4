use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, MySqlPool};

use super::{AttendanceFilter, AttendanceStore};
use crate::approval::workflow::RecordUpdate;
use crate::error::{AttendanceError, AttendanceResult};
use crate::model::actor::ActorId;
use crate::model::attendance::{
    AttendanceRecord, ChangeLogEntry, EditState, EditStatus, EmployeeId, NewAttendance, RecordId,
    RequestedTimes,
};

const SELECT_COLUMNS: &str = r#"
    SELECT id, employee_id, date, clock_in, clock_out, work_hours,
           edit_status, requested_times, requested_by, requested_at,
           change_log, version, created_at, updated_at
    FROM attendance
"#;

#[derive(FromRow)]
struct AttendanceRow {
    id: u64,
    employee_id: u64,
    date: NaiveDate,
    clock_in: NaiveDateTime,
    clock_out: Option<NaiveDateTime>,
    work_hours: Option<f64>,
    edit_status: String,
    requested_times: Option<Json<RequestedTimes>>,
    requested_by: Option<u64>,
    requested_at: Option<DateTime<Utc>>,
    change_log: Json<Vec<ChangeLogEntry>>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = AttendanceError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status: EditStatus = row.edit_status.parse().map_err(|_| {
            AttendanceError::Internal(format!(
                "attendance {} has unknown edit_status '{}'",
                row.id, row.edit_status
            ))
        })?;

        let edit = EditState::from_parts(
            status,
            row.requested_times.map(|j| j.0),
            row.requested_by,
            row.requested_at,
        )
        .ok_or_else(|| {
            AttendanceError::Internal(format!(
                "attendance {} has inconsistent edit request columns",
                row.id
            ))
        })?;

        Ok(AttendanceRecord {
            id: row.id,
            employee_id: row.employee_id,
            date: row.date,
            clock_in: row.clock_in,
            clock_out: row.clock_out,
            work_hours: row.work_hours,
            edit,
            change_log: row.change_log.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn update_sql(append: bool) -> String {
    // JSON_ARRAY_APPEND keeps the log append inside the same guarded statement
    let log_clause = if append {
        "change_log = JSON_ARRAY_APPEND(change_log, '$', CAST(? AS JSON)),"
    } else {
        ""
    };

    format!(
        r#"
        UPDATE attendance
        SET clock_in = ?,
            clock_out = ?,
            work_hours = ?,
            edit_status = ?,
            requested_times = CAST(? AS JSON),
            requested_by = ?,
            requested_at = ?,
            {log_clause}
            version = version + 1,
            updated_at = ?
        WHERE id = ?
        AND edit_status = ?
        AND version = ?
        "#
    )
}

/// MySQL-backed store over the `attendance` table.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn read(&self, id: RecordId) -> AttendanceResult<AttendanceRecord> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AttendanceError::NotFound)?;
        row.try_into()
    }

    async fn insert(&self, new: NewAttendance) -> AttendanceResult<AttendanceRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
                (employee_id, date, clock_in, edit_status, change_log, version, created_at, updated_at)
            VALUES (?, ?, ?, 'approved', JSON_ARRAY(), 1, ?, ?)
            "#,
        )
        .bind(new.employee_id)
        .bind(new.date)
        .bind(new.clock_in)
        .bind(new.created_at)
        .bind(new.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => self.read(done.last_insert_id()).await,
            Err(e) => {
                // Duplicate clock-in for same day
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.code().as_deref() == Some("23000") {
                        return Err(AttendanceError::Conflict);
                    }
                }
                tracing::error!(error = %e, employee_id = new.employee_id, "Clock-in insert failed");
                Err(e.into())
            }
        }
    }

    async fn find_open_for_day(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> AttendanceResult<Option<AttendanceRecord>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE employee_id = ? AND date = ? AND clock_out IS NULL LIMIT 1"
        );
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceRecord::try_from)
            .transpose()
    }

    async fn conditional_update(
        &self,
        id: RecordId,
        update: &RecordUpdate,
    ) -> AttendanceResult<AttendanceRecord> {
        let (requested_times, requested_by, requested_at) = match &update.edit {
            EditState::Clear => (None, None, None),
            EditState::Pending(p) => (
                Some(serde_json::to_string(&p.requested)?),
                Some(p.requested_by),
                Some(p.requested_at),
            ),
        };
        let entry = update
            .append
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let sql = update_sql(entry.is_some());
        let mut tx = self.pool.begin().await?;

        let mut query = sqlx::query(&sql)
            .bind(update.clock_in)
            .bind(update.clock_out)
            .bind(update.work_hours)
            .bind(update.edit.status().to_string())
            .bind(requested_times)
            .bind(requested_by)
            .bind(requested_at);
        if let Some(entry) = entry {
            query = query.bind(entry);
        }
        let result = query
            .bind(update.updated_at)
            .bind(id)
            .bind(update.expected_status.to_string())
            .bind(update.expected_version)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, u64>("SELECT id FROM attendance WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            return Err(match exists {
                Some(_) => AttendanceError::Conflict,
                None => AttendanceError::NotFound,
            });
        }

        let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        row.try_into()
    }

    async fn query_pending(&self) -> AttendanceResult<Vec<AttendanceRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE edit_status = 'pending' ORDER BY requested_at DESC");
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(AttendanceRecord::try_from)
            .collect()
    }

    async fn count_pending(&self) -> AttendanceResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM attendance WHERE edit_status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn list(
        &self,
        filter: &AttendanceFilter,
    ) -> AttendanceResult<(Vec<AttendanceRecord>, u64)> {
        let where_sql = if filter.employee_id.is_some() {
            " WHERE employee_id = ?"
        } else {
            ""
        };

        let count_sql = format!("SELECT COUNT(*) FROM attendance{where_sql}");
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(employee_id) = filter.employee_id {
            count_q = count_q.bind(employee_id);
        }
        let total = count_q.fetch_one(&self.pool).await?;

        let data_sql = format!("{SELECT_COLUMNS}{where_sql} ORDER BY date DESC, id DESC LIMIT ? OFFSET ?");
        let mut data_q = sqlx::query_as::<_, AttendanceRow>(&data_sql);
        if let Some(employee_id) = filter.employee_id {
            data_q = data_q.bind(employee_id);
        }
        let records = data_q
            .bind(filter.per_page())
            .bind(filter.offset())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(AttendanceRecord::try_from)
            .collect::<AttendanceResult<Vec<_>>>()?;

        Ok((records, total.max(0) as u64))
    }

    async fn lookup_display_name(&self, actor_id: ActorId) -> AttendanceResult<Option<String>> {
        let name = sqlx::query_scalar::<_, String>(
            r#"
            SELECT COALESCE(
                NULLIF(TRIM(CONCAT_WS(' ', e.first_name, e.last_name)), ''),
                u.username
            )
            FROM users u
            LEFT JOIN employees e ON e.id = u.employee_id
            WHERE u.id = ?
            "#,
        )
        .bind(actor_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(name)
    }
}
