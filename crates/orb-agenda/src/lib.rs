//! Priority-tiered work queue for the Orb object runtime.
//!
//! The [`Agenda`] holds non-owning references to objects awaiting
//! processing, in four strict-priority FIFO tiers. External worker pools
//! enqueue with [`Agenda::push`] and drain with [`Agenda::pop_highest`];
//! the agenda never executes work itself, and it is never persisted —
//! every process run starts idle.

pub mod agenda;

pub use agenda::{Agenda, Priority};
