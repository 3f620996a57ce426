pub mod blog;
pub mod courses;
pub mod dashboard;
pub mod events;
pub mod orders;
pub mod users;
