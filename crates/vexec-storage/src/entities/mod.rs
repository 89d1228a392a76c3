pub mod analysis;
pub mod company;
pub mod goal;
pub mod goal_progress;
pub mod kpi_entry;
pub mod task;
pub mod team_member;
pub mod user;
