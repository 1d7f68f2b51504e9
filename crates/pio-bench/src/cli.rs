use clap::Parser;

/// Rust PIO-core demo/bench — wires MPI init, a toy symmetric box
/// decomposition, the in-memory reference back-end, and the write/read
/// drivers together, then reports timing.
#[derive(Parser, Debug)]
#[command(name = "pio-bench", about = "pio-core write/read driver demo")]
pub struct CliArgs {
    /// Elements each rank contributes to (and receives back from) the
    /// decomposition.
    #[arg(short = 'n', long = "elems-per-rank", default_value_t = 1024)]
    pub elems_per_rank: usize,

    /// Number of variables coalesced into each write_darray_multi call.
    #[arg(short = 'v', long = "num-vars", default_value_t = 4)]
    pub num_vars: usize,

    /// Number of write+read repetitions.
    #[arg(short = 'i', long = "repetitions", default_value_t = 1)]
    pub repetitions: i32,

    /// Pool pressure threshold passed to set_buffer_size_limit (supports
    /// k/m/g/t suffixes).
    #[arg(short = 'b', long = "buffer-size-limit", default_value = "10m")]
    pub buffer_size_limit: String,

    /// MAX_CACHED_IO_REGIONS used by the flush policy's region-count rule.
    #[arg(long = "max-cached-io-regions", default_value_t = 128)]
    pub max_cached_io_regions: usize,

    /// Verify the read-back payload matches what was written.
    #[arg(short = 'c', long = "check")]
    pub check: bool,

    /// Output results as JSON to stdout (suppresses text output).
    #[arg(long = "json")]
    pub json: bool,

    /// Output results as JSON to file (text output still printed).
    #[arg(long = "json-file")]
    pub json_file: Option<String>,
}

/// Parse a size string with optional k/m/g/t suffix (case-insensitive).
pub fn parse_size(s: &str) -> usize {
    let s = s.trim();
    if s.is_empty() {
        return 0;
    }

    let (num_str, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024usize),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        Some(b't' | b'T') => (&s[..s.len() - 1], 1024usize * 1024 * 1024 * 1024),
        _ => (s, 1),
    };

    num_str
        .trim()
        .parse::<usize>()
        .unwrap_or_else(|_| panic!("invalid size: {s}"))
        * multiplier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024"), 1024);
        assert_eq!(parse_size("1k"), 1024);
        assert_eq!(parse_size("1K"), 1024);
        assert_eq!(parse_size("1m"), 1_048_576);
        assert_eq!(parse_size("10m"), 10_485_760);
        assert_eq!(parse_size("1g"), 1_073_741_824);
    }
}
