use crate::approval::history::HistoryLine;
use crate::approval::service::{AttendancePage, PendingApproval};
use crate::approval::workflow::EditProposal;
use crate::model::attendance::{AttendanceResponse, ChangeLogEntry, EditStatus, RequestedTimes};
use crate::models::{LoginReqDto, TokenPair};
use crate::store::AttendanceFilter;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Approvals API",
        version = "0.1.0",
        description = r#"
## Attendance time-edit approvals

Employees clock in and out. Managers propose corrections to recorded times,
admins apply corrections directly or approve/reject pending proposals.

### 🔹 Key Features
- **Attendance**
  - Daily check-in and check-out tracking
- **Edit approvals**
  - Submit corrections, approve or reject pending ones, pending queue for admins
- **Audit trail**
  - Every correction, approval and rejection is kept in an append-only change log

### 🔐 Security
Endpoints under the API prefix require a **JWT Bearer** access token.
Only **Admin** can approve or reject edits; their own edits apply immediately.

### 📦 Response Format
- JSON responses, errors as `{"error": code, "message": text}`
- `409 Conflict` means the record changed underneath you: refresh and retry

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::attendance_list,
        crate::api::attendance::get_attendance,
        crate::api::attendance::attendance_history,
        crate::api::attendance::submit_edit,
        crate::api::attendance::approve_edit,
        crate::api::attendance::reject_edit,
        crate::api::attendance::pending_queue,
        crate::api::attendance::pending_count
    ),
    components(
        schemas(
            LoginReqDto,
            TokenPair,
            AttendanceFilter,
            AttendanceResponse,
            AttendancePage,
            EditStatus,
            RequestedTimes,
            ChangeLogEntry,
            EditProposal,
            HistoryLine,
            PendingApproval
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Token APIs"),
        (name = "Attendance", description = "Attendance and edit approval APIs"),
    )
)]
pub struct ApiDoc;
