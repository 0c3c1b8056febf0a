//! I/O utilities for joining two byte streams.
//!
//! Used by the client to pipe an accepted local socket into a logical
//! stream of the multiplexed session and back.

mod splice;

pub use splice::{Direction, NoOpObserver, SpliceObserver, splice};
