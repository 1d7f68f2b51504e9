//! Per-open-file state (§3): iotype/mode, the in-flight staging buffer, the
//! WMB list, pending-byte counters, and per-variable fill-value caches.

use crate::iodesc::ElemType;
use crate::pool::BufferPool;
use crate::wmb::WmbList;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ReadOnly,
    ReadWrite,
}

/// Per-variable descriptor the file keeps around: the cached fill value and
/// whether the caller wants fill applied at all.
#[derive(Debug, Clone)]
pub struct VarInfo {
    pub elem_type: ElemType,
    pub use_fill: bool,
    pub fillvalue: Option<Vec<u8>>,
}

pub struct FileState {
    pub ncid: u64,
    pub mode: Mode,
    /// Set while a flush is in progress; `None` otherwise.
    pub iobuf: Option<Vec<u8>>,
    pub wmbs: WmbList,
    pub wb_pend: usize,
    pub rb_pend: usize,
    pub vars: std::collections::HashMap<i32, VarInfo>,
    /// Tracks the arena backing this file's WMBs so the flush policy (§4.7)
    /// can read `curalloc`/`maxfree` without the WMBs owning pool handles
    /// themselves.
    pub pool: BufferPool,
}

impl FileState {
    /// `pool_capacity` should be the file's `buffer_size_limit` (§4.7 rule
    /// 1 reads `curalloc` against the same number) so `maxfree` reflects
    /// actual remaining contiguous space rather than a pool that has grown
    /// on demand from zero.
    pub fn new(ncid: u64, mode: Mode, pool_capacity: usize) -> Self {
        FileState {
            ncid,
            mode,
            iobuf: None,
            wmbs: WmbList::new(),
            wb_pend: 0,
            rb_pend: 0,
            vars: std::collections::HashMap::new(),
            pool: BufferPool::new(pool_capacity),
        }
    }

    pub fn is_writable(&self) -> bool {
        self.mode == Mode::ReadWrite
    }
}
