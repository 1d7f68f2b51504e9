//! Collective half of the flush policy (C6, §4.7): the all-reduce MAX over
//! the compute communicator that turns a per-rank decision into an
//! agreed-upon one. The local decision itself lives in
//! `pio_core::decide_flush_local`, which stays free of `mpi`.

use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use pio_core::FlushLevel;

fn to_i32(level: FlushLevel) -> i32 {
    match level {
        FlushLevel::NoFlush => 0,
        FlushLevel::IoFlush => 1,
        FlushLevel::DiskFlush => 2,
    }
}

fn from_i32(v: i32) -> FlushLevel {
    match v {
        0 => FlushLevel::NoFlush,
        1 => FlushLevel::IoFlush,
        _ => FlushLevel::DiskFlush,
    }
}

/// Agree on a single flush level across every rank in `comm`: if any rank
/// locally decided to flush, every rank flushes together, since the flush
/// itself invokes a collective rearrangement.
pub fn decide_flush_collective(comm: &SimpleCommunicator, local: FlushLevel) -> FlushLevel {
    let local_code = to_i32(local);
    let mut agreed_code = local_code;
    comm.all_reduce_into(&local_code, &mut agreed_code, SystemOperation::max());
    from_i32(agreed_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rank_agreement_is_a_no_op() {
        let universe = mpi::initialize().unwrap();
        let world = universe.world();
        if world.size() != 1 {
            return;
        }
        assert_eq!(decide_flush_collective(&world, FlushLevel::IoFlush), FlushLevel::IoFlush);
        assert_eq!(decide_flush_collective(&world, FlushLevel::NoFlush), FlushLevel::NoFlush);
    }
}
