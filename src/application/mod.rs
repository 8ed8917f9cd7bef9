//! Application services: catalog reads, moderation, syndication and notifications.

pub mod catalog;
pub mod error;
pub mod gate;
pub mod ids;
pub mod jobs;
pub mod moderation;
pub mod notifications;
pub mod repos;
pub mod sanitize;
pub mod syndication;
