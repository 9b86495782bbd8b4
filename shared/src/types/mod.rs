//! Data model shared between the filter runtime and its callers

pub mod document;
pub mod flags;
pub mod record;
