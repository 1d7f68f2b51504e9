//! Flush policy (C6): decides whether a WMB must be flushed before another
//! payload can be appended to it. The local decision lives here, free of any
//! transport dependency; turning it into a collective decision (all ranks
//! agree) is `pio-driver`'s job since that crate already talks to `mpi`.

use crate::pool::PoolStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FlushLevel {
    NoFlush = 0,
    IoFlush = 1,
    DiskFlush = 2,
}

/// Everything the local flush decision needs to know about a WMB and its
/// decomposition, without owning either.
#[derive(Debug, Clone, Copy)]
pub struct FlushInputs {
    pub num_arrays: usize,
    pub arraylen: usize,
    pub elem_size: usize,
    pub maxregions: usize,
    pub maxfillregions: usize,
    pub buffer_size_limit: usize,
    pub max_cached_io_regions: usize,
}

/// §4.7's four-step rule, evaluated on this rank only.
pub fn decide_flush_local(pool: PoolStats, inputs: FlushInputs) -> FlushLevel {
    if pool.curalloc >= inputs.buffer_size_limit {
        return FlushLevel::DiskFlush;
    }

    let req = (1 + inputs.num_arrays) * inputs.arraylen * inputs.elem_size;
    let mut level = if (pool.maxfree as f64) <= 1.1 * (req as f64) {
        FlushLevel::IoFlush
    } else {
        FlushLevel::NoFlush
    };

    let decomp_max_regions = inputs.maxregions.max(inputs.maxfillregions);
    if (1 + inputs.num_arrays) * decomp_max_regions > inputs.max_cached_io_regions {
        level = FlushLevel::DiskFlush;
    }

    level
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(num_arrays: usize) -> FlushInputs {
        FlushInputs {
            num_arrays,
            arraylen: 1000,
            elem_size: 8,
            maxregions: 3,
            maxfillregions: 0,
            buffer_size_limit: 10 * 1024 * 1024,
            max_cached_io_regions: 10,
        }
    }

    #[test]
    fn disk_flush_on_buffer_size_limit() {
        let pool = PoolStats { curalloc: 10 * 1024 * 1024, totfree: 0, maxfree: 0, n_get: 0, n_rel: 0 };
        assert_eq!(decide_flush_local(pool, inputs(0)), FlushLevel::DiskFlush);
    }

    #[test]
    fn scenario_5_region_limit_promotes_to_disk_flush_on_fourth_append() {
        // max_cached_io_regions=10, decomp_max_regions=3: (1+3)*3=12 > 10.
        let pool = PoolStats { curalloc: 0, totfree: 1 << 30, maxfree: 1 << 30, n_get: 0, n_rel: 0 };
        assert_eq!(decide_flush_local(pool, inputs(3)), FlushLevel::DiskFlush);
        // At 2 prior appends: (1+2)*3=9 <= 10, no promotion.
        assert_ne!(decide_flush_local(pool, inputs(2)), FlushLevel::DiskFlush);
    }

    #[test]
    fn io_flush_on_pool_pressure() {
        let req = (1 + 2) * 1000 * 8;
        let pool = PoolStats {
            curalloc: 0,
            totfree: req,
            maxfree: (1.05 * req as f64) as usize,
            n_get: 0,
            n_rel: 0,
        };
        let mut i = inputs(2);
        i.max_cached_io_regions = 1000; // keep region rule from firing
        assert_eq!(decide_flush_local(pool, i), FlushLevel::IoFlush);
    }

    #[test]
    fn monotonic_non_decreasing_in_num_arrays_at_fixed_pool_state() {
        let pool = PoolStats { curalloc: 0, totfree: 1000, maxfree: 1000, n_get: 0, n_rel: 0 };
        let mut prev = FlushLevel::NoFlush;
        for n in 0..20 {
            let level = decide_flush_local(pool, inputs(n));
            assert!(level >= prev);
            prev = level;
        }
    }
}
