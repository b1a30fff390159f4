//! Core types shared across sdforge facilities
//!
//! This crate provides foundational types used by the diagnostics, error
//! and logging facilities:
//!
//! - **Source locations**: opaque `SourceLocation` tokens passed through from
//!   the entity-model builder to every diagnostic
//! - **Schema constants**: Canonical field keys and event names

pub mod schema;
pub mod source;

pub use source::SourceLocation;
