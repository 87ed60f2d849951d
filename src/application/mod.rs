//! Application services layer.

pub mod content;
pub mod error;
pub mod hooks;
pub mod query;
pub mod repos;
