//! Core types shared across confx facilities
//!
//! This crate provides foundational types used by both error handling
//! and logging facilities:
//!
//! - **Schema constants**: Canonical field keys and event names
//! - **Sensitive data**: Sensitive<T> marker for automatic redaction

pub mod schema;
pub mod sensitive;

pub use sensitive::Sensitive;
