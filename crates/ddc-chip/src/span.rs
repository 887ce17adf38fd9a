//! Span (analysis bandwidth) codes.
//!
//! The span register takes a 4-bit code. Requests are rounded down to the
//! widest supported bandwidth they meet; anything under 200 kHz lands on the
//! narrowest code.

/// `(threshold_hz, code)` in descending threshold order.
pub const SPAN_TABLE: [(u64, u32); 10] = [
    (100_000_000, 0x0),
    (80_000_000, 0x1),
    (50_000_000, 0x2),
    (20_000_000, 0x3),
    (10_000_000, 0x4),
    (5_000_000, 0x5),
    (2_000_000, 0x6),
    (1_000_000, 0x7),
    (500_000, 0x8),
    (200_000, 0x9),
];

/// Code selected when the request is below every threshold.
pub const NARROWEST_CODE: u32 = 0xA;
/// Bandwidth reported for [`NARROWEST_CODE`].
pub const NARROWEST_HZ: u64 = 100_000;

/// Code for a requested bandwidth.
#[must_use]
pub fn code_for(bandwidth_hz: u64) -> u32 {
    SPAN_TABLE
        .iter()
        .find(|&&(threshold, _)| bandwidth_hz >= threshold)
        .map_or(NARROWEST_CODE, |&(_, code)| code)
}

/// Bandwidth for a code read back from the span register, if the code is known.
#[must_use]
pub fn bandwidth_for(code: u32) -> Option<u64> {
    if code == NARROWEST_CODE {
        return Some(NARROWEST_HZ);
    }
    SPAN_TABLE
        .iter()
        .find(|&&(_, c)| c == code)
        .map(|&(hz, _)| hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_descend() {
        assert!(SPAN_TABLE.windows(2).all(|w| w[0].0 > w[1].0));
    }

    #[test]
    fn rounding() {
        assert_eq!(code_for(200_000_000), 0x0);
        assert_eq!(code_for(100_000_000), 0x0);
        assert_eq!(code_for(99_999_999), 0x1);
        assert_eq!(code_for(60_000_000), 0x2);
        assert_eq!(code_for(200_000), 0x9);
        assert_eq!(code_for(99_000), 0xA);
        assert_eq!(code_for(0), 0xA);
    }

    #[test]
    fn inverse() {
        assert_eq!(bandwidth_for(0x2), Some(50_000_000));
        assert_eq!(bandwidth_for(0xA), Some(100_000));
        assert_eq!(bandwidth_for(0xB), None);
    }
}
