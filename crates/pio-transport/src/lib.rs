//! Message-passing primitives (C1a/C1b, §4.1-4.2) and the communicator
//! context (§3) they run over. Built directly on the `mpi` crate, matching
//! §6's "outbound API to transport" list.

pub mod context;
pub mod gather;
pub mod schedule;
pub mod swapm;

pub use context::{CoreConfig, CoreContext};
pub use gather::fc_gather;
pub use schedule::{build_swapids, ceil2, pair, window_size};
pub use swapm::swapm;
