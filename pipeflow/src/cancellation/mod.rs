//! Cooperative cancellation primitives for collaborators.
//!
//! This module provides:
//! - CancellationToken for sources that must honour an advisory cancel
//! - DrainNotifier / DrainSignal for sinks reporting drain completion

mod drain;
mod token;

pub use drain::{DrainNotifier, DrainSignal};
pub use token::CancellationToken;
