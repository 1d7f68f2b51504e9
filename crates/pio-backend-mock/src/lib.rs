//! In-memory reference implementation of [`DarrayBackend`] (C9): a testable
//! stand-in for the real parallel/serial netCDF back-ends, in the same
//! spirit as `ior-backend-posix` being a complete, testable implementation
//! of `Aiori` against real files rather than a stub.
//!
//! No actual file format is spoken; a variable's write is simply its
//! `(ncid, varid)`-keyed `llen`-element slice of whatever the write driver
//! staged, trimmed out of the (possibly larger, fill-padded) `maxiobuflen`
//! slot it arrives in.

use std::collections::HashMap;
use std::sync::Mutex;

use pio_core::backend::{DarrayBackend, FileId, Kind};
use pio_core::{Error, IoDesc};

/// One in-memory "file": a store of each variable's current payload plus,
/// for `Subset` decompositions, its holegrid fill payload.
#[derive(Default)]
struct Store {
    data: HashMap<i32, Vec<u8>>,
    fill: HashMap<i32, Vec<u8>>,
}

/// In-memory back-end. `parallel` selects which of `write_darray_multi_par`/
/// `_serial` the write driver is expected to call, matching the
/// `is_parallel` capability query rather than an iotype string comparison.
pub struct MockBackend {
    parallel: bool,
    files: Mutex<HashMap<u64, Store>>,
    dim_counts: Mutex<HashMap<(u64, i32), usize>>,
    default_dim_count: usize,
}

impl MockBackend {
    pub fn new(parallel: bool) -> Self {
        MockBackend {
            parallel,
            files: Mutex::new(HashMap::new()),
            dim_counts: Mutex::new(HashMap::new()),
            default_dim_count: 1,
        }
    }

    /// Override the dimension count `dim_count` reports for a specific
    /// variable (defaults to 1, sufficient for the 1-D decompositions this
    /// workspace's tests and demo binary build).
    pub fn set_dim_count(&self, ncid: u64, varid: i32, ndims: usize) {
        self.dim_counts.lock().unwrap().insert((ncid, varid), ndims);
    }

    /// The bytes currently stored for `varid`, if any have been written.
    pub fn get(&self, ncid: u64, varid: i32) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(&ncid)?.data.get(&varid).cloned()
    }

    fn write(
        &self,
        file: &FileId,
        iodesc: &IoDesc,
        varids: &[i32],
        kind: Kind,
        iobuf: &[u8],
    ) -> Result<(), Error> {
        let elem_size = iodesc.elem_size();
        let slot_bytes = iodesc.maxiobuflen * elem_size;
        let live_bytes = iodesc.llen * elem_size;
        if slot_bytes == 0 || iobuf.len() != slot_bytes * varids.len() {
            return Err(Error::BadArg("mock backend: iobuf length != maxiobuflen*N*elem_size"));
        }

        let mut files = self.files.lock().unwrap();
        let store = files.entry(file.0).or_default();
        for (i, &varid) in varids.iter().enumerate() {
            let slot = &iobuf[i * slot_bytes..i * slot_bytes + live_bytes];
            match kind {
                Kind::Data => {
                    store.data.insert(varid, slot.to_vec());
                }
                Kind::Fill => {
                    store.fill.insert(varid, slot.to_vec());
                }
            }
        }
        Ok(())
    }

    fn read(&self, file: &FileId, iodesc: &IoDesc, varid: i32, iobuf: &mut [u8]) -> Result<(), Error> {
        let elem_size = iodesc.elem_size();
        let live_bytes = iodesc.llen * elem_size;
        let files = self.files.lock().unwrap();
        let stored = files
            .get(&file.0)
            .and_then(|s| s.data.get(&varid))
            .ok_or(Error::BadId)?;
        if stored.len() != live_bytes {
            return Err(Error::BadArg("mock backend: stored payload length != llen*elem_size"));
        }
        let n = live_bytes.min(iobuf.len());
        iobuf[..n].copy_from_slice(&stored[..n]);
        for b in &mut iobuf[n..] {
            *b = 0;
        }
        Ok(())
    }
}

impl DarrayBackend for MockBackend {
    fn dim_count(&self, file: &FileId, varid: i32) -> Result<usize, Error> {
        Ok(*self
            .dim_counts
            .lock()
            .unwrap()
            .get(&(file.0, varid))
            .unwrap_or(&self.default_dim_count))
    }

    fn is_parallel(&self, _file: &FileId) -> Result<bool, Error> {
        Ok(self.parallel)
    }

    fn write_darray_multi_par(
        &mut self,
        file: &FileId,
        iodesc: &IoDesc,
        varids: &[i32],
        kind: Kind,
        _frame: Option<&[i64]>,
        iobuf: &[u8],
    ) -> Result<(), Error> {
        self.write(file, iodesc, varids, kind, iobuf)
    }

    fn write_darray_multi_serial(
        &mut self,
        file: &FileId,
        iodesc: &IoDesc,
        varids: &[i32],
        kind: Kind,
        _frame: Option<&[i64]>,
        iobuf: &[u8],
    ) -> Result<(), Error> {
        self.write(file, iodesc, varids, kind, iobuf)
    }

    fn read_darray_nc(
        &mut self,
        file: &FileId,
        iodesc: &IoDesc,
        varid: i32,
        iobuf: &mut [u8],
    ) -> Result<(), Error> {
        self.read(file, iodesc, varid, iobuf)
    }

    fn read_darray_nc_serial(
        &mut self,
        file: &FileId,
        iodesc: &IoDesc,
        varid: i32,
        iobuf: &mut [u8],
    ) -> Result<(), Error> {
        self.read(file, iodesc, varid, iobuf)
    }

    fn flush_output_buffer(&mut self, _file: &FileId, _to_disk: bool, _retain_iobuf: bool) -> Result<(), Error> {
        // This backend never sets `retains_iobuf`, so there is nothing
        // deferred to persist; the call is a valid no-op.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pio_core::ElemType;

    #[test]
    fn write_then_read_round_trips_one_variable() {
        let mut backend = MockBackend::new(false);
        let iodesc = IoDesc::symmetric_box(1, ElemType::I32, 1, 4);
        let file = FileId(1);

        let slot_bytes = iodesc.maxiobuflen * iodesc.elem_size();
        let data: Vec<u8> = [1i32, 2, 3, 4].iter().flat_map(|x| x.to_ne_bytes()).collect();
        let mut iobuf = vec![0u8; slot_bytes];
        iobuf[..data.len()].copy_from_slice(&data);

        backend
            .write_darray_multi_serial(&file, &iodesc, &[42], Kind::Data, None, &iobuf)
            .unwrap();

        let mut out = vec![0u8; iodesc.llen * iodesc.elem_size()];
        backend.read_darray_nc_serial(&file, &iodesc, 42, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn read_of_never_written_variable_is_bad_id() {
        let mut backend = MockBackend::new(true);
        let iodesc = IoDesc::symmetric_box(1, ElemType::F64, 1, 2);
        let file = FileId(7);
        let mut out = vec![0u8; iodesc.llen * iodesc.elem_size()];
        let err = backend.read_darray_nc(&file, &iodesc, 99, &mut out).unwrap_err();
        assert!(matches!(err, Error::BadId));
    }

    #[test]
    fn dim_count_defaults_then_honors_override() {
        let backend = MockBackend::new(false);
        let file = FileId(3);
        assert_eq!(backend.dim_count(&file, 1).unwrap(), 1);
        backend.set_dim_count(3, 1, 2);
        assert_eq!(backend.dim_count(&file, 1).unwrap(), 2);
    }

    #[test]
    fn fill_and_data_are_stored_independently() {
        let mut backend = MockBackend::new(false);
        let iodesc = IoDesc::symmetric_box(2, ElemType::I32, 1, 2);
        let file = FileId(1);
        let slot_bytes = iodesc.maxiobuflen * iodesc.elem_size();

        let data = vec![1u8; slot_bytes];
        let fill = vec![9u8; slot_bytes];
        backend.write_darray_multi_serial(&file, &iodesc, &[1], Kind::Data, None, &data).unwrap();
        backend.write_darray_multi_serial(&file, &iodesc, &[1], Kind::Fill, None, &fill).unwrap();

        let stored = backend.get(1, 1).unwrap();
        assert_eq!(stored, vec![1u8; iodesc.llen * iodesc.elem_size()]);
    }

    #[test]
    fn end_to_end_through_write_and_read_drivers() {
        let universe = mpi::initialize().unwrap();
        let world = universe.world();
        if world.size() != 1 {
            return;
        }
        use pio_core::{FileState, Mode};
        use pio_transport::CoreContext;

        let ctx = CoreContext::single_tier(world, Default::default());
        let mut file = FileState::new(1, Mode::ReadWrite, ctx.config.buffer_size_limit);
        let mut backend = MockBackend::new(false);
        let file_id = FileId(1);
        let iodesc = IoDesc::symmetric_box(1, ElemType::I32, 1, 3);

        let arrays: Vec<u8> = [7i32, 8, 9].iter().flat_map(|x| x.to_ne_bytes()).collect();
        pio_driver::write_darray_multi(
            &ctx, &mut file, &mut backend, &file_id, &iodesc, &[4], 3, &arrays, None, None, false,
        )
        .unwrap();

        let mut out = vec![0u8; 3 * 4];
        pio_driver::read_darray(&ctx, &mut file, &mut backend, &file_id, &iodesc, 4, 3, &mut out).unwrap();
        assert_eq!(out, arrays);
    }
}
