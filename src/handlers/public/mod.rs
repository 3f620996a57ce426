pub mod auth;
pub mod blog;
pub mod books;
pub mod courses;
pub mod events;
pub mod health;
pub mod webhooks;
