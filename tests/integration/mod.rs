//! Integration tests for the autodiscover request pipeline.
//!
//! Each module drives the public handler API only; nothing here reaches into
//! crate internals.

pub mod get_requests;
pub mod rejections;
