use crate::approval::AttendanceService;
use crate::approval::history::HistoryLine;
use crate::approval::service::{AttendancePage, PendingApproval};
use crate::approval::workflow::EditProposal;
use crate::auth::auth::AuthUser;
use crate::model::attendance::{AttendanceResponse, RecordId};
use crate::store::AttendanceFilter;
use actix_web::{HttpResponse, Responder, web};
use tracing::instrument;

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Checked in successfully", body = AttendanceResponse),
        (status = 400, description = "Already checked in today", body = Object, example = json!({
            "error": "invalid_input",
            "message": "Invalid input: Already checked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 503, description = "Storage unavailable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(skip(auth, service), fields(user_id = auth.user_id))]
pub async fn check_in(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    let record = service.clock_in_now(&auth.actor()).await?;
    Ok(HttpResponse::Ok().json(AttendanceResponse::from(&record)))
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Checked out successfully", body = AttendanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 404, description = "No active check-in found for today")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(skip(auth, service), fields(user_id = auth.user_id))]
pub async fn check_out(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    let record = service.clock_out_now(&auth.actor()).await?;
    Ok(HttpResponse::Ok().json(AttendanceResponse::from(&record)))
}

/// Paginated attendance list. Employees only ever see their own records.
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceFilter),
    responses(
        (status = 200, description = "Attendance page", body = AttendancePage),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn attendance_list(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    query: web::Query<AttendanceFilter>,
) -> actix_web::Result<impl Responder> {
    let page = service.list(&auth.actor(), query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(&*page))
}

#[utoipa::path(
    get,
    path = "/api/attendance/{attendance_id}",
    params(
        ("attendance_id" = u64, Path, description = "ID of the attendance record")
    ),
    responses(
        (status = 200, description = "Attendance record", body = AttendanceResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance record not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn get_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<RecordId>,
) -> actix_web::Result<impl Responder> {
    let record = service.get(&auth.actor(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(AttendanceResponse::from(&record)))
}

/// Change history, newest first
#[utoipa::path(
    get,
    path = "/api/attendance/{attendance_id}/history",
    params(
        ("attendance_id" = u64, Path, description = "ID of the attendance record")
    ),
    responses(
        (status = 200, description = "Rendered change log", body = [HistoryLine]),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance record not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn attendance_history(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<RecordId>,
) -> actix_web::Result<impl Responder> {
    let lines = service.history(&auth.actor(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(lines))
}

/// Submit a clock-in/clock-out correction.
///
/// Admins apply it immediately; everyone else leaves it pending for approval.
#[utoipa::path(
    put,
    path = "/api/attendance/{attendance_id}/edit",
    params(
        ("attendance_id" = u64, Path, description = "ID of the attendance record to edit")
    ),
    request_body(
        content = EditProposal,
        description = "Proposed times; omitted fields keep their current value",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Edit applied or queued for approval", body = AttendanceResponse),
        (status = 400, description = "Proposal changes nothing or times are inverted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance record not found"),
        (status = 409, description = "Record changed concurrently, refresh and retry")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(skip(auth, service, payload), fields(user_id = auth.user_id))]
pub async fn submit_edit(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<RecordId>,
    payload: web::Json<EditProposal>,
) -> actix_web::Result<impl Responder> {
    let record = service
        .submit_edit(&auth.actor(), path.into_inner(), &payload)
        .await?;
    Ok(HttpResponse::Ok().json(AttendanceResponse::from(&record)))
}

/* =========================
Approve edit (Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/attendance/{attendance_id}/approve",
    params(
        ("attendance_id" = u64, Path, description = "ID of the attendance record to approve")
    ),
    responses(
        (status = 200, description = "Edit approved", body = AttendanceResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Attendance record not found"),
        (status = 409, description = "No pending edit or already resolved", body = Object, example = json!({
            "error": "invalid_state",
            "message": "This record was just updated by someone else, please refresh and try again"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(skip(auth, service), fields(user_id = auth.user_id))]
pub async fn approve_edit(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<RecordId>,
) -> actix_web::Result<impl Responder> {
    let record = service.approve(&auth.actor(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(AttendanceResponse::from(&record)))
}

/* =========================
Reject edit (Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/attendance/{attendance_id}/reject",
    params(
        ("attendance_id" = u64, Path, description = "ID of the attendance record to reject")
    ),
    responses(
        (status = 200, description = "Edit rejected", body = AttendanceResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Attendance record not found"),
        (status = 409, description = "No pending edit or already resolved")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(skip(auth, service), fields(user_id = auth.user_id))]
pub async fn reject_edit(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<RecordId>,
) -> actix_web::Result<impl Responder> {
    let record = service.reject(&auth.actor(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(AttendanceResponse::from(&record)))
}

/// Pending approvals queue, most recent request first
#[utoipa::path(
    get,
    path = "/api/attendance/pending",
    responses(
        (status = 200, description = "Pending edit requests", body = [PendingApproval]),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn pending_queue(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    let queue = service.pending_queue(&auth.actor()).await?;
    Ok(HttpResponse::Ok().json(&*queue))
}

#[utoipa::path(
    get,
    path = "/api/attendance/pending/count",
    responses(
        (status = 200, description = "Number of pending edit requests", body = Object, example = json!({
            "pending": 3
        })),
        (status = 403, description = "HR/Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn pending_count(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    let pending = service.pending_count(&auth.actor()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "pending": pending })))
}
