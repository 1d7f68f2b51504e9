//! Rank-0-gated diagnostics. The workspace this core descends from never
//! pulls in `log`/`tracing`; plain `eprintln!`/`println!` guarded by a rank
//! check is its entire diagnostic surface, so that is what this crate keeps.

/// Print to stderr only when `rank == 0`.
#[macro_export]
macro_rules! rank0_eprintln {
    ($rank:expr, $($arg:tt)*) => {
        if $rank == 0 {
            eprintln!($($arg)*);
        }
    };
}

/// Print to stdout only when `rank == 0`.
#[macro_export]
macro_rules! rank0_println {
    ($rank:expr, $($arg:tt)*) => {
        if $rank == 0 {
            println!($($arg)*);
        }
    };
}
