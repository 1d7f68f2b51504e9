//! Flow-controlled gather (C1a, §4.1).

use mpi::request::{scope, LocalScope, Request};
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use pio_core::Error;

const HANDSHAKE_TOKEN: u8 = 1;

/// Gather `cnt`-element, `elem_size`-byte-wide blocks from every rank in
/// `comm` onto `root`. `recvbuf` must be `Some` and sized `P * cnt *
/// elem_size` on `root`; ignored elsewhere.
///
/// MPI's default error handler (`MPI_ERRORS_ARE_FATAL`) aborts the process
/// on a transport failure, matching §7's propagation policy ("the process
/// aborts"); this function does not attempt to recover from one.
pub fn fc_gather(
    comm: &SimpleCommunicator,
    root_rank: i32,
    flow_cntl: i32,
    elem_size: usize,
    cnt: usize,
    sendbuf: &[u8],
    recvbuf: Option<&mut [u8]>,
) -> Result<(), Error> {
    let block_bytes = cnt * elem_size;
    if sendbuf.len() != block_bytes {
        return Err(Error::BadArg("fc_gather: sendbuf length != cnt*elem_size"));
    }

    if flow_cntl <= 0 {
        return native_gather(comm, root_rank, block_bytes, sendbuf, recvbuf);
    }

    let me = comm.rank();
    let p_count = comm.size();
    let window = (flow_cntl as usize).min(64);

    if me == root_rank {
        let recvbuf = recvbuf.ok_or(Error::BadArg("fc_gather: root requires recvbuf"))?;
        if recvbuf.len() != block_bytes * p_count as usize {
            return Err(Error::BadArg("fc_gather: recvbuf length != P*cnt*elem_size"));
        }

        let root_idx = root_rank as usize;
        recvbuf[root_idx * block_bytes..(root_idx + 1) * block_bytes].copy_from_slice(sendbuf);

        let mut chunks: Vec<Option<&mut [u8]>> =
            recvbuf.chunks_mut(block_bytes).map(Some).collect();
        let tag = 2 * p_count;

        scope(|s| {
            let mut window_q: std::collections::VecDeque<Request<'_, LocalScope<'_>>> =
                std::collections::VecDeque::new();
            for p in 0..p_count {
                if p == root_rank {
                    continue;
                }
                if window_q.len() >= window {
                    window_q.pop_front().unwrap().wait();
                }
                let buf = chunks[p as usize].take().unwrap();
                let req = comm
                    .process_at_rank(p)
                    .immediate_receive_into_with_tag(s, buf, tag);
                window_q.push_back(req);
                comm.process_at_rank(p).send_with_tag(&HANDSHAKE_TOKEN, tag);
            }
            while let Some(req) = window_q.pop_front() {
                req.wait();
            }
        });
        Ok(())
    } else {
        let tag = 2 * p_count;
        let root = comm.process_at_rank(root_rank);
        let mut token = 0u8;
        root.receive_into_with_tag(&mut token, tag);
        root.ready_send_with_tag(sendbuf, tag);
        Ok(())
    }
}

fn native_gather(
    comm: &SimpleCommunicator,
    root_rank: i32,
    block_bytes: usize,
    sendbuf: &[u8],
    recvbuf: Option<&mut [u8]>,
) -> Result<(), Error> {
    let me = comm.rank();
    let root = comm.process_at_rank(root_rank);
    if me == root_rank {
        let recvbuf = recvbuf.ok_or(Error::BadArg("fc_gather: root requires recvbuf"))?;
        if recvbuf.len() < block_bytes {
            return Err(Error::BadArg("fc_gather: recvbuf too small"));
        }
        root.gather_into_root(sendbuf, recvbuf);
    } else {
        root.gather_into(sendbuf);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // A single-process `cargo test` run gives MPI_COMM_WORLD size 1, so
    // rank 0 is simultaneously root and its own only sender. This exercises
    // the root-side direct-copy path and the native-gather fallback without
    // requiring an `mpirun` launch; the multi-rank window/handshake path
    // (scenarios 1-2 of SPEC_FULL.md §8) needs `mpirun -n 4` and is not
    // exercised by plain `cargo test`.
    #[test]
    fn single_rank_native_fallback_copies_own_block() {
        let universe = mpi::initialize().unwrap();
        let world = universe.world();
        if world.size() != 1 {
            return;
        }
        let send = [7u8, 8, 9, 10];
        let mut recv = vec![0u8; 4];
        fc_gather(&world, 0, 0, 1, 4, &send, Some(&mut recv)).unwrap();
        assert_eq!(recv, send);
    }

    #[test]
    fn single_rank_flow_controlled_root_direct_copy() {
        let universe = mpi::initialize().unwrap();
        let world = universe.world();
        if world.size() != 1 {
            return;
        }
        let send = [1u8, 2, 3, 4];
        let mut recv = vec![0u8; 4];
        fc_gather(&world, 0, 2, 1, 4, &send, Some(&mut recv)).unwrap();
        assert_eq!(recv, send);
    }
}
