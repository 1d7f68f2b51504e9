//! Communicator context (§3): the immutable handle every C1-C8 operation is
//! threaded through instead of reading process-global state (§9 Design
//! Notes — Global mutable state).

use mpi::topology::SimpleCommunicator;

/// Process-wide configuration that used to live in globals
/// (`pio_buffer_size_limit` and friends in `original_source`).
#[derive(Debug, Clone, Copy)]
pub struct CoreConfig {
    pub buffer_size_limit: usize,
    pub max_cached_io_regions: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        // 10 MiB, matching `original_source`'s PIO_BUFFER_SIZE default.
        CoreConfig {
            buffer_size_limit: 10 * 1024 * 1024,
            max_cached_io_regions: 128,
        }
    }
}

/// The compute/IO/union communicator bundle plus the async-mode flag.
pub struct CoreContext {
    pub compute_comm: SimpleCommunicator,
    pub io_comm: SimpleCommunicator,
    pub union_comm: SimpleCommunicator,
    pub compute_master: i32,
    pub io_root: i32,
    pub async_io: bool,
    /// The compute/IO intercommunicator, present only in two-tier async
    /// mode. `write_darray_multi`'s async broadcast step (§9) runs over
    /// this; single-tier contexts never populate it.
    pub async_intercomm: Option<SimpleCommunicator>,
    pub config: CoreConfig,
}

impl CoreContext {
    /// Degenerate single-communicator context where compute and I/O ranks
    /// are the same set of processes (the common single-tier case this
    /// workspace's demo binary exercises; two-tier async dispatch reuses
    /// the same fields with distinct communicators).
    pub fn single_tier(comm: SimpleCommunicator, config: CoreConfig) -> Self {
        CoreContext {
            compute_comm: comm.duplicate(),
            io_comm: comm.duplicate(),
            union_comm: comm,
            compute_master: 0,
            io_root: 0,
            async_io: false,
            async_intercomm: None,
            config,
        }
    }

    /// Set the pool-pressure threshold used by §4.7, returning the previous
    /// value (the inbound `set_buffer_size_limit` API, §6).
    pub fn set_buffer_size_limit(&mut self, n: usize) -> usize {
        let prev = self.config.buffer_size_limit;
        self.config.buffer_size_limit = n;
        prev
    }
}
