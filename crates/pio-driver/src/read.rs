//! Read driver (C8, §4.9): allocate an I/O buffer, invoke the back-end
//! reader, rearrange to the compute side, release the buffer. No
//! multi-variable coalescing: `PIOc_read_darray` in `original_source`
//! handles one variable per call, and nothing in SPEC_FULL.md asks for a
//! `read_darray_multi`.

use pio_core::{
    backend::{DarrayBackend, FileId},
    Error, FileState, IoDesc,
};
use pio_transport::CoreContext;

/// Collective read-and-scatter of one variable (§6's `read_darray`).
/// `out_array` is `arraylen` elements of `iodesc.elem_size()` bytes, filled
/// in on return.
pub fn read_darray(
    ctx: &CoreContext,
    file: &mut FileState,
    backend: &mut dyn DarrayBackend,
    file_id: &FileId,
    iodesc: &IoDesc,
    varid: i32,
    arraylen: usize,
    out_array: &mut [u8],
) -> Result<(), Error> {
    let elem_size = iodesc.elem_size();
    if out_array.len() != arraylen * elem_size {
        return Err(Error::BadArg("read_darray: out_array length != arraylen*elem_size"));
    }

    let _dim_count = backend.dim_count(file_id, varid)?;

    // §4.9: the I/O-master's staging buffer is sized by the cross-rank
    // maximum so every rank's back-end call agrees on a buffer shape; other
    // I/O ranks size to their own local share.
    let rlen = if ctx.io_comm.rank() == ctx.io_root {
        iodesc.maxiobuflen
    } else {
        iodesc.llen
    };
    let mut iobuf = vec![0u8; rlen * elem_size];

    if backend.is_parallel(file_id)? {
        backend.read_darray_nc(file_id, iodesc, varid, &mut iobuf)?;
    } else {
        backend.read_darray_nc_serial(file_id, iodesc, varid, &mut iobuf)?;
    }

    pio_rearrange::rearrange_io2comp(&ctx.union_comm, iodesc, &iobuf, out_array, 1)?;

    file.rb_pend = 0;

    Ok(())
}
