//! Async-mode intercommunicator dispatch (§9, "Async-mode intercommunicator
//! dispatch"): one coalesced scalar broadcast plus two follow-up broadcasts
//! for the variable-length array and fillvalue buffers, replacing
//! `original_source`'s nine individual scalar broadcasts.

use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use pio_core::Error;

/// The scalar fields of one `write_darray_multi` call, packed for a single
/// broadcast. All fields are fixed-size so the struct's byte representation
/// is broadcastable without a serializer.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct AsyncDispatch {
    pub ncid: u64,
    pub ioid: u64,
    pub nvars: u64,
    pub arraylen: u64,
    pub elem_size: u64,
    pub frame_present: u8,
    pub fillvalue_present: u8,
    pub flushtodisk: u8,
}

impl AsyncDispatch {
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        let ptr = self as *mut Self as *mut u8;
        unsafe { std::slice::from_raw_parts_mut(ptr, std::mem::size_of::<Self>()) }
    }
}

/// Broadcast `dispatch` (and the trailing array/fillvalue buffers, sized by
/// its already-broadcast `nvars`/`arraylen`/`*_present` fields) from
/// `root_rank` to every other rank of `intercomm`. On the root this sends
/// `array`/`fillvalue` as given; on non-root ranks the returned buffers are
/// freshly allocated and filled in from the broadcast.
pub fn broadcast_write_darray_multi(
    intercomm: &SimpleCommunicator,
    root_rank: i32,
    mut dispatch: AsyncDispatch,
    array: &[u8],
    fillvalue: &[u8],
) -> Result<(AsyncDispatch, Vec<u8>, Vec<u8>), Error> {
    let root = intercomm.process_at_rank(root_rank);
    root.broadcast_into(dispatch.as_bytes_mut());

    let array_len = dispatch.nvars as usize * dispatch.arraylen as usize * dispatch.elem_size as usize;
    let mut array_buf = if intercomm.rank() == root_rank {
        array.to_vec()
    } else {
        vec![0u8; array_len]
    };
    if !array_buf.is_empty() {
        root.broadcast_into(&mut array_buf[..]);
    }

    let fill_len = dispatch.nvars as usize * dispatch.elem_size as usize;
    let mut fill_buf = if dispatch.fillvalue_present != 0 {
        if intercomm.rank() == root_rank {
            fillvalue.to_vec()
        } else {
            vec![0u8; fill_len]
        }
    } else {
        Vec::new()
    };
    if !fill_buf.is_empty() {
        root.broadcast_into(&mut fill_buf[..]);
    }

    Ok((dispatch, array_buf, fill_buf))
}
