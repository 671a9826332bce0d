pub mod auth;
pub mod backup_exchange;
pub mod core;
pub mod schedules;
pub mod students;
pub mod subjects;
pub mod teachers;
pub mod week_view;
pub mod year_groups;
