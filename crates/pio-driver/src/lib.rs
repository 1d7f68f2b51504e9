//! Write/read drivers (C7/C8) and the inbound API of §6: the entry points an
//! application calls. Everything below this crate (`pio-core`,
//! `pio-transport`, `pio-rearrange`) is an interface-only or orchestration
//! collaborator; this crate is where they're wired together into the four
//! operations `original_source/src/clib/pio_darray.c` exposes as
//! `PIOc_write_darray(_multi)`/`PIOc_read_darray`/`PIOc_set_buffer_size_limit`.

pub mod dispatch;
pub mod flush;
pub mod read;
pub mod write;

pub use flush::decide_flush_collective;
pub use read::read_darray;
pub use write::{write_darray, write_darray_multi};

use pio_transport::CoreContext;

/// Sets the pool-pressure threshold used by the flush policy (§4.7),
/// returning the previous value. Applies to files opened after the call, in
/// the sense that it mutates `ctx.config` in place and every subsequent
/// `write_darray`/`write_darray_multi` reads the new value.
pub fn set_buffer_size_limit(ctx: &mut CoreContext, n: usize) -> usize {
    ctx.set_buffer_size_limit(n)
}
