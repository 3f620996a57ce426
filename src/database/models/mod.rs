pub mod blog_post;
pub mod book;
pub mod course;
pub mod enrollment;
pub mod event;
pub mod order;
pub mod reading_progress;
pub mod review;
pub mod tenant;
pub mod user;

pub use blog_post::BlogPost;
pub use book::Book;
pub use course::Course;
pub use enrollment::Enrollment;
pub use event::{Event, EventRegistration};
pub use order::{Order, OrderItem, OrderStatus, ItemType};
pub use reading_progress::ReadingProgress;
pub use review::Review;
pub use tenant::Tenant;
pub use user::{Role, User};

/// Lifecycle shared by books, courses, events and blog posts
pub const PUBLISH_STATUSES: &[&str] = &["draft", "published", "archived"];
