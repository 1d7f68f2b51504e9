//! Pairwise swap-many (C1b, §4.2): an all-to-all-w realized as a schedule of
//! point-to-point sends/receives with a bounded in-flight window.

use mpi::request::{scope, LocalScope, Request};
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use pio_core::Error;

use crate::schedule::{build_swapids, window_size};

/// Reborrow `len` bytes starting at `offset` out of `base` as an
/// independent mutable slice.
///
/// # Safety
/// Callers must guarantee that the regions handed out for distinct peers
/// during one `swapm` call never overlap — true of any `IoDesc` built from
/// a valid decomposition, where each peer owns a disjoint span of the
/// receive buffer.
unsafe fn disjoint_mut_slice<'a>(base: *mut u8, offset: usize, len: usize) -> &'a mut [u8] {
    unsafe { std::slice::from_raw_parts_mut(base.add(offset), len) }
}

/// Realize an all-to-all-w: rank `me` sends `sndlths[p]` elements (each
/// `elem_size` bytes) from `sendbuf[sdispls[p]*elem_size..]` to `p`, and
/// receives `rcvlths[p]` elements into `recvbuf[rdispls[p]*elem_size..]`
/// from `p`, for every `p`.
#[allow(clippy::too_many_arguments)]
pub fn swapm(
    comm: &SimpleCommunicator,
    sndlths: &[usize],
    rcvlths: &[usize],
    sdispls: &[usize],
    rdispls: &[usize],
    elem_size: usize,
    sendbuf: &[u8],
    recvbuf: &mut [u8],
    handshake: bool,
    isend: bool,
    max_requests: usize,
) -> Result<(), Error> {
    let me = comm.rank() as usize;
    let np = comm.size() as usize;
    if sndlths.len() != np || rcvlths.len() != np || sdispls.len() != np || rdispls.len() != np {
        return Err(Error::BadArg("swapm: per-peer arrays must have length == comm size"));
    }

    if sndlths[me] > 0 {
        let send_off = sdispls[me] * elem_size;
        let send_len = sndlths[me] * elem_size;
        let recv_off = rdispls[me] * elem_size;
        recvbuf[recv_off..recv_off + send_len]
            .copy_from_slice(&sendbuf[send_off..send_off + send_len]);
    }

    let swapids = build_swapids(np, me, sndlths, rcvlths);
    let s = swapids.len();
    if s == 0 {
        return Ok(());
    }
    let (w, wh) = window_size(s, max_requests);

    let p_count = np as i32;
    let recv_ptr = recvbuf.as_mut_ptr();

    let mut hs_tokens = vec![0u8; s];
    let hs_token_refs: Vec<&mut u8> = hs_tokens.iter_mut().collect();
    let mut hs_tokens_iter: Vec<Option<&mut u8>> = hs_token_refs.into_iter().map(Some).collect();

    scope(|scope_tok| {
        let mut hs_recv: Vec<Option<Request<'_, LocalScope<'_>>>> = (0..s).map(|_| None).collect();
        let mut data_recv: Vec<Option<Request<'_, LocalScope<'_>>>> = (0..s).map(|_| None).collect();
        let mut send_req: Vec<Option<Request<'_, LocalScope<'_>>>> = (0..s).map(|_| None).collect();

        let mut prime = |rstep: usize, hs_recv: &mut Vec<Option<Request<'_, LocalScope<'_>>>>, data_recv: &mut Vec<Option<Request<'_, LocalScope<'_>>>>| {
            let p = swapids[rstep];
            if handshake && sndlths[p] > 0 {
                let buf = hs_tokens_iter[rstep].take().unwrap();
                let req = comm
                    .process_at_rank(p as i32)
                    .immediate_receive_into_with_tag(scope_tok, buf, me as i32 + p_count);
                hs_recv[rstep] = Some(req);
            }
            if rcvlths[p] > 0 {
                let off = rdispls[p] * elem_size;
                let len = rcvlths[p] * elem_size;
                let buf = unsafe { disjoint_mut_slice(recv_ptr, off, len) };
                let tag = p as i32 + p_count;
                let req = comm
                    .process_at_rank(p as i32)
                    .immediate_receive_into_with_tag(scope_tok, buf, tag);
                data_recv[rstep] = Some(req);
                if handshake {
                    comm.process_at_rank(p as i32).send_with_tag(&[0u8][..], tag);
                }
            }
        };

        let primed = w.min(s);
        for rstep in 0..primed {
            prime(rstep, &mut hs_recv, &mut data_recv);
        }
        let mut rstep = primed;

        for istep in 0..s {
            let p = swapids[istep];
            if sndlths[p] > 0 {
                if handshake {
                    if let Some(req) = hs_recv[istep].take() {
                        req.wait();
                    }
                }
                let off = sdispls[p] * elem_size;
                let len = sndlths[p] * elem_size;
                let tag = me as i32 + p_count;
                let chunk = &sendbuf[off..off + len];
                if isend {
                    let req = comm
                        .process_at_rank(p as i32)
                        .immediate_ready_send_with_tag(scope_tok, chunk, tag);
                    send_req[istep] = Some(req);
                } else {
                    comm.process_at_rank(p as i32).ready_send_with_tag(chunk, tag);
                }
            }

            if istep > wh {
                if let Some(req) = data_recv[istep - wh].take() {
                    req.wait();
                }
            }

            if rstep < s {
                prime(rstep, &mut hs_recv, &mut data_recv);
                rstep += 1;
            }
        }

        for pos in s.saturating_sub(wh)..s {
            if let Some(req) = data_recv[pos].take() {
                req.wait();
            }
            if isend {
                if let Some(req) = send_req[pos].take() {
                    req.wait();
                }
            }
        }
    });

    Ok(())
}
