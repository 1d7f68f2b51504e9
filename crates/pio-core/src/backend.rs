//! The back-end trait (C9, outbound API of §6): the seam C7/C8 dispatch
//! through. Shaped after `Aiori`'s required-methods-plus-capability-query
//! design rather than hardcoded iotype string comparisons.

use crate::error::Error;
use crate::iodesc::IoDesc;

/// Which half of a write_darray_multi call a back-end call is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Data,
    Fill,
}

/// A file handle opaque to the core; back-ends downcast their own concrete
/// type out of it the way `FileHandle` downcasts a `CFdHandle` in the
/// ancestor crate.
pub struct FileId(pub u64);

/// The interface the write/read drivers (C7/C8) call through. One process
/// implements this per back-end flavor (parallel netCDF, serial netCDF,
/// and, in this workspace, the in-memory reference backend).
pub trait DarrayBackend {
    /// Number of dimensions of `varid`, needed to size the I/O buffer in
    /// step 2 of §4.8.
    fn dim_count(&self, file: &FileId, varid: i32) -> Result<usize, Error>;

    /// Whether this back-end retains `iobuf` across calls for a deferred
    /// flush (the non-blocking buffered back-end does; serial/parallel
    /// netCDF back-ends do not). Governs iobuf release in step 8 of §4.8
    /// and the to-disk-flush branch of step 10.
    fn retains_iobuf(&self) -> bool {
        false
    }

    /// Whether this back-end expects `write_darray_multi_par` (true) or
    /// `write_darray_multi_serial` (false) for a given file.
    fn is_parallel(&self, file: &FileId) -> Result<bool, Error>;

    fn write_darray_multi_par(
        &mut self,
        file: &FileId,
        iodesc: &IoDesc,
        varids: &[i32],
        kind: Kind,
        frame: Option<&[i64]>,
        iobuf: &[u8],
    ) -> Result<(), Error>;

    fn write_darray_multi_serial(
        &mut self,
        file: &FileId,
        iodesc: &IoDesc,
        varids: &[i32],
        kind: Kind,
        frame: Option<&[i64]>,
        iobuf: &[u8],
    ) -> Result<(), Error>;

    fn read_darray_nc(
        &mut self,
        file: &FileId,
        iodesc: &IoDesc,
        varid: i32,
        iobuf: &mut [u8],
    ) -> Result<(), Error>;

    fn read_darray_nc_serial(
        &mut self,
        file: &FileId,
        iodesc: &IoDesc,
        varid: i32,
        iobuf: &mut [u8],
    ) -> Result<(), Error>;

    /// Persist any retained buffers. `retain_iobuf` asks the back-end to
    /// keep ownership of its staging buffer rather than releasing it back
    /// to the core (relevant only when `retains_iobuf()` is true).
    fn flush_output_buffer(
        &mut self,
        file: &FileId,
        to_disk: bool,
        retain_iobuf: bool,
    ) -> Result<(), Error>;
}
