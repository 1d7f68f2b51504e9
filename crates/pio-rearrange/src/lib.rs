//! Rearrangement engine (C3, §4.4): the thin orchestration layer that turns
//! an `IoDesc`'s per-peer geometry into `pio-transport::swapm` calls.

use mpi::topology::SimpleCommunicator;

use pio_core::{Error, IoDesc};
use pio_transport::swapm;

/// Move `nvars` contiguous compute-side payloads into their I/O-side
/// layout. `src_compute` holds `nvars` back-to-back blocks of
/// `iodesc.ndof * elem_size` bytes; `dst_iobuf` receives `nvars` back-to-back
/// blocks of `iodesc.llen * elem_size` bytes, in the same variable order.
///
/// Each variable's block moves through its own `swapm` call. An earlier
/// design considered coalescing all `nvars` blocks into a single `swapm`
/// call by scaling the per-peer lengths, but that only holds for compute
/// buffers laid out var-minor (one interleaved tuple per degree of freedom);
/// the write multi-buffer (§4.6) appends var-major blocks, so coalescing
/// would require per-peer strided transfers `swapm` does not express. Moving
/// one variable per call costs extra round trips, not correctness.
pub fn rearrange_comp2io(
    comm: &SimpleCommunicator,
    iodesc: &IoDesc,
    src_compute: &[u8],
    dst_iobuf: &mut [u8],
    nvars: usize,
) -> Result<(), Error> {
    let elem_size = iodesc.elem_size();
    let send_block = iodesc.ndof * elem_size;
    let recv_block = iodesc.llen * elem_size;
    check_block_lens(src_compute.len(), send_block, nvars, "src_compute")?;
    check_block_lens(dst_iobuf.len(), recv_block, nvars, "dst_iobuf")?;

    for v in 0..nvars {
        let send_slice = &src_compute[v * send_block..(v + 1) * send_block];
        let recv_slice = &mut dst_iobuf[v * recv_block..(v + 1) * recv_block];
        swapm(
            comm,
            &iodesc.sndlths,
            &iodesc.rcvlths,
            &iodesc.sdispls,
            &iodesc.rdispls,
            elem_size,
            send_slice,
            recv_slice,
            true,
            false,
            0,
        )?;
    }
    Ok(())
}

/// The inverse of [`rearrange_comp2io`]: move `nvars` I/O-side payloads back
/// to their compute-side layout, swapping the roles of the send/receive
/// length and displacement vectors.
pub fn rearrange_io2comp(
    comm: &SimpleCommunicator,
    iodesc: &IoDesc,
    src_iobuf: &[u8],
    dst_compute: &mut [u8],
    nvars: usize,
) -> Result<(), Error> {
    let elem_size = iodesc.elem_size();
    let send_block = iodesc.llen * elem_size;
    let recv_block = iodesc.ndof * elem_size;
    check_block_lens(src_iobuf.len(), send_block, nvars, "src_iobuf")?;
    check_block_lens(dst_compute.len(), recv_block, nvars, "dst_compute")?;

    for v in 0..nvars {
        let send_slice = &src_iobuf[v * send_block..(v + 1) * send_block];
        let recv_slice = &mut dst_compute[v * recv_block..(v + 1) * recv_block];
        swapm(
            comm,
            &iodesc.rcvlths,
            &iodesc.sndlths,
            &iodesc.rdispls,
            &iodesc.sdispls,
            elem_size,
            send_slice,
            recv_slice,
            true,
            false,
            0,
        )?;
    }
    Ok(())
}

fn check_block_lens(actual: usize, block: usize, nvars: usize, what: &'static str) -> Result<(), Error> {
    if actual != block * nvars {
        return Err(Error::BadArg(match what {
            "src_compute" => "rearrange_comp2io: src_compute length != nvars * ndof * elem_size",
            "dst_iobuf" => "rearrange_comp2io: dst_iobuf length != nvars * llen * elem_size",
            "src_iobuf" => "rearrange_io2comp: src_iobuf length != nvars * llen * elem_size",
            _ => "rearrange_io2comp: dst_compute length != nvars * ndof * elem_size",
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pio_core::ElemType;

    // Single-process `cargo test` gives a world of size 1, so a symmetric
    // box decomposition degenerates to self-transfer on every variable.
    // Multi-rank round-tripping needs `mpirun`.
    #[test]
    fn comp2io_then_io2comp_round_trips_at_p1() {
        let universe = mpi::initialize().unwrap();
        let world = universe.world();
        if world.size() != 1 {
            return;
        }
        let iodesc = IoDesc::symmetric_box(1, ElemType::I32, 1, 3);
        let nvars = 2;
        let src: Vec<u8> = (0..iodesc.ndof * 4 * nvars).map(|i| i as u8).collect();
        let mut iobuf = vec![0u8; iodesc.llen * 4 * nvars];
        rearrange_comp2io(&world, &iodesc, &src, &mut iobuf, nvars).unwrap();
        assert_eq!(iobuf, src);

        let mut back = vec![0u8; iodesc.ndof * 4 * nvars];
        rearrange_io2comp(&world, &iodesc, &iobuf, &mut back, nvars).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn rejects_mismatched_buffer_lengths() {
        let universe = mpi::initialize().unwrap();
        let world = universe.world();
        if world.size() != 1 {
            return;
        }
        let iodesc = IoDesc::symmetric_box(1, ElemType::I32, 1, 3);
        let src = vec![0u8; 4];
        let mut iobuf = vec![0u8; 100];
        let err = rearrange_comp2io(&world, &iodesc, &src, &mut iobuf, 2).unwrap_err();
        assert!(matches!(err, Error::BadArg(_)));
    }
}
