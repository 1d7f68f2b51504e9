pub mod backend;
pub mod diag;
pub mod error;
pub mod file;
pub mod flush;
pub mod iodesc;
pub mod pool;
pub mod timing;
pub mod wmb;

pub use backend::{DarrayBackend, FileId, Kind};
pub use error::Error;
pub use file::{FileState, Mode, VarInfo};
pub use flush::{decide_flush_local, FlushInputs, FlushLevel};
pub use iodesc::{ElemType, IoDesc, Rearranger};
pub use pool::{BufferPool, Handle, PoolStats};
pub use wmb::{default_fill_bytes, Wmb, WmbKey, WmbList};
