//! Session routing: logs accounts in, binds each live session to its tenant
//! store, and evicts idle sessions in the background.

pub mod router;
pub mod sweeper;

pub use router::{RouterConfig, SessionRouter, SweepFailure, SweepReport};
pub use sweeper::{SessionSweeper, SweeperHandle};
