//! Filter coefficient tables.
//!
//! Taps are 32-bit words written verbatim into the coefficient windows; the
//! core only decodes the low 16 bits as a two's-complement value.

/// Most halfband taps a profile may carry.
pub const HALFBAND_CAPACITY: usize = 256;
/// Most polyphase taps a profile may carry.
pub const POLY_CAPACITY: usize = 1024;

/// Halfband table loaded at probe.
pub const DEFAULT_HALFBAND: [i32; 14] = [
    0x0002, 0xFFF8, 0x0014, 0xFFD3, 0x0059, 0xFF5F, 0x0112, 0xFE42,
    0x02C0, 0xFBAE, 0x0702, 0xF322, 0x2880, 0x4000,
];

/// Polyphase table loaded at probe. Symmetric; the two outermost taps on
/// each side are zero padding that aligns the table to 129 taps.
pub const DEFAULT_POLY: [i32; 129] = [
    0x0000, 0x0000,
    0x0000, 0xFFFE, 0x0006, 0xFFF2, 0x001F, 0xFFC5, 0x006A, 0xFF4E,
    0x0120, 0xFE34, 0x02F0, 0xFA8A, 0x1389, 0x0C88, 0xFBBF, 0x023A,
    0xFEB9, 0x00BE, 0xFF95, 0x0039, 0xFFE4, 0x000C, 0xFFFB, 0x0001,
    0x0000, 0x0001, 0xFFFD, 0x0009, 0xFFEC, 0x0028, 0xFFB9, 0x0075,
    0xFF49, 0x0114, 0xFE66, 0x0277, 0xFB8A, 0x1894, 0x053A, 0xFE30,
    0x00D1, 0xFFA2, 0x0024, 0xFFF8, 0xFFFB, 0x0008, 0xFFF9, 0x0004,
    0xFFFE, 0x0001, 0x0001, 0xFFFC, 0x0009, 0xFFEE, 0x0021, 0xFFCC,
    0x004D, 0xFF96, 0x0088, 0xFF5C, 0x00BC, 0xFF35, 0x1A6A, 0xFF35,
    0x00BC, 0xFF5C, 0x0088, 0xFF96, 0x004D, 0xFFCC, 0x0021, 0xFFEE,
    0x0009, 0xFFFC, 0x0001, 0x0001, 0xFFFE, 0x0004, 0xFFF9, 0x0008,
    0xFFFB, 0xFFF8, 0x0024, 0xFFA2, 0x00D1, 0xFE30, 0x053A, 0x1894,
    0xFB8A, 0x0277, 0xFE66, 0x0114, 0xFF49, 0x0075, 0xFFB9, 0x0028,
    0xFFEC, 0x0009, 0xFFFD, 0x0001, 0x0000, 0x0001, 0xFFFB, 0x000C,
    0xFFE4, 0x0039, 0xFF95, 0x00BE, 0xFEB9, 0x023A, 0xFBBF, 0x0C88,
    0x1389, 0xFA8A, 0x02F0, 0xFE34, 0x0120, 0xFF4E, 0x006A, 0xFFC5,
    0x001F, 0xFFF2, 0x0006, 0xFFFE, 0x0000,
    0x0000, 0x0000,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables_fit_windows() {
        assert_eq!(DEFAULT_HALFBAND.len(), 14);
        assert_eq!(DEFAULT_POLY.len(), 129);
        assert!(DEFAULT_HALFBAND.len() <= HALFBAND_CAPACITY);
        assert!(DEFAULT_POLY.len() <= POLY_CAPACITY);
    }

    #[test]
    fn default_poly_is_symmetric() {
        let n = DEFAULT_POLY.len();
        for i in 0..n / 2 {
            assert_eq!(DEFAULT_POLY[i], DEFAULT_POLY[n - 1 - i], "tap {i}");
        }
    }
}
