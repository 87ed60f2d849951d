//! Content repository: the public create/read/update/delete surface.

mod assemble;
mod commands;
mod queries;
mod service;
pub mod types;

pub use service::*;
pub use types::{
    ContentError, ContentSettings, CreateContent, LINK_SECTION, QueryOutcome, UpdateContent,
};
