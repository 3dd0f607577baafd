//! In-memory backend for the chatclock lifecycle engine.
//!
//! Records live in a map keyed by conversation id, each behind its own lock,
//! so mutations of one conversation are serialised while different
//! conversations proceed in parallel.

mod notify;
mod store;

pub use notify::Notifier;
pub use store::MemoryStore;
