pub mod display_name_cache;
pub mod view_cache;
