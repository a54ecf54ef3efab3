pub mod assignment;
pub mod catalog;
pub mod notification;
pub mod outbox;
pub mod profile;
pub mod request;
