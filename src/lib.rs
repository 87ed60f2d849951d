//! Folio: content storage and retrieval for a CMS.
//!
//! Content lives in a fixed `content` table plus one extension table per
//! content type. [`application::content::ContentService`] is the entry point.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
