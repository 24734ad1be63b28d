//! Human-readable segment sizes.

use forkproc_common::{ShmError, ShmResult};

/// Parse a size such as `"10000"`, `"64k"` or `"2M"` into bytes.
///
/// Units are `b`, `k`, `m` and `g` (case-insensitive, powers of 1024). A
/// bare number is taken as bytes.
pub fn parse_size(input: &str) -> ShmResult<usize> {
    let trimmed = input.trim();
    let (number, multiplier) = match trimmed.chars().last().map(|c| c.to_ascii_lowercase()) {
        Some('b') => (&trimmed[..trimmed.len() - 1], 1),
        Some('k') => (&trimmed[..trimmed.len() - 1], 1024),
        Some('m') => (&trimmed[..trimmed.len() - 1], 1024 * 1024),
        Some('g') => (&trimmed[..trimmed.len() - 1], 1024 * 1024 * 1024),
        _ => (trimmed, 1),
    };

    number
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| ShmError::invalid_size(input))
}
