pub mod books;
pub mod checkout;
pub mod enrollments;
pub mod events;
pub mod reading_progress;
pub mod reviews;
pub mod whoami;
