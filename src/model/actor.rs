use serde::Serialize;

use crate::error::{AttendanceError, AttendanceResult};
use crate::model::attendance::EmployeeId;
use crate::model::role::Role;

pub type ActorId = u64;

/// The authenticated party performing an operation.
///
/// Passed explicitly into every workflow call instead of being read from
/// request-global state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Actor {
    pub id: ActorId,
    pub display_name: String,
    pub role: Role,
    /// Present only if this user is linked to an employee record
    pub employee_id: Option<EmployeeId>,
}

impl Actor {
    pub fn new(id: ActorId, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role,
            employee_id: None,
        }
    }

    pub fn with_employee(mut self, employee_id: EmployeeId) -> Self {
        self.employee_id = Some(employee_id);
        self
    }

    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }

    /// Id 0 and blank names are what an unauthenticated caller looks like.
    pub fn ensure_identified(&self) -> AttendanceResult<()> {
        if self.id == 0 || self.display_name.trim().is_empty() {
            return Err(AttendanceError::unauthorized("missing actor identity"));
        }
        Ok(())
    }

    pub fn require_elevated(&self) -> AttendanceResult<()> {
        self.ensure_identified()?;
        if self.is_elevated() {
            Ok(())
        } else {
            Err(AttendanceError::unauthorized("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> AttendanceResult<()> {
        self.ensure_identified()?;
        if self.is_elevated() || self.role == Role::Hr {
            Ok(())
        } else {
            Err(AttendanceError::unauthorized("HR/Admin only"))
        }
    }

    /// Employees only see and touch their own attendance.
    pub fn can_access_employee(&self, employee_id: EmployeeId) -> bool {
        match self.role {
            Role::Admin | Role::System | Role::Hr => true,
            Role::Employee => self.employee_id == Some(employee_id),
            Role::ApiUser => false,
        }
    }
}
