pub mod init;
pub mod tenant;
pub mod token;
pub mod user;
