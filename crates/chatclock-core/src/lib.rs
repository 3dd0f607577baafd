//! Core types and lifecycle logic for chatclock.
//!
//! This crate is deliberately free of HTTP and async runtime dependencies.
//! Every phase decision is a function of a [`record::LifecycleRecord`] and a
//! caller-supplied `now`; when to re-evaluate is the caller's choice.

pub mod clock;
pub mod countdown;
pub mod error;
pub mod event;
pub mod id;
pub mod phase;
pub mod policy;
pub mod record;
pub mod store;

mod secs;

pub use error::{Error, Result};
