pub mod actor;
pub mod attendance;
pub mod role;
