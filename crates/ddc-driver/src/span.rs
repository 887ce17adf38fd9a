//! Span controller
//!
//! Requested bandwidth in Hz is rounded down to a span code (see
//! [`ddc_chip::span`]) and written to the span register. Reading maps the
//! stored code back to its bandwidth.

use crate::error::{DdcError, Result};
use crate::registers::RegisterInterface;
use ddc_chip::{regs, span};
use tracing::{debug, warn};

/// Span register access over a register interface.
#[derive(Debug, Clone, Copy)]
pub struct SpanController<'a> {
    registers: &'a dyn RegisterInterface,
}

impl<'a> SpanController<'a> {
    /// Controller over `registers`
    pub const fn new(registers: &'a dyn RegisterInterface) -> Self {
        Self { registers }
    }

    /// Select the span for `bandwidth_hz`, returning the code written.
    pub fn write(&self, bandwidth_hz: u64) -> u32 {
        let code = span::code_for(bandwidth_hz);
        debug!("Span {bandwidth_hz} Hz -> code {code:#x}");
        self.registers.write32(regs::SPAN, code);
        code
    }

    /// Bandwidth of the stored code.
    ///
    /// A code outside the table reads as 0.
    #[must_use]
    pub fn read(&self) -> u64 {
        let code = self.registers.read32(regs::SPAN);
        span::bandwidth_for(code).unwrap_or_else(|| {
            warn!("Span register holds unknown code {code:#x}");
            0
        })
    }

    /// Text form of [`write`](Self::write): a decimal integer, optionally
    /// followed by a newline. Returns the bytes consumed.
    ///
    /// # Errors
    ///
    /// [`DdcError::InvalidArgument`] if the text is not a decimal `u64`.
    pub fn write_text(&self, text: &[u8]) -> Result<usize> {
        let hz = parse_hz(text)?;
        self.write(hz);
        Ok(text.len())
    }

    /// Text form of [`read`](Self::read): decimal Hz and a newline.
    #[must_use]
    pub fn read_text(&self) -> String {
        format!("{}\n", self.read())
    }
}

/// Decimal Hz with an optional leading `+` and one trailing newline.
pub(crate) fn parse_hz(text: &[u8]) -> Result<u64> {
    let reject = || {
        DdcError::invalid_argument(format!(
            "span must be a decimal frequency in Hz, got {:?}",
            String::from_utf8_lossy(text)
        ))
    };

    let body = text.strip_suffix(b"\n").unwrap_or(text);
    let digits = body.strip_prefix(b"+").unwrap_or(body);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(reject());
    }
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(reject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SoftwareRegisters;

    #[test]
    fn write_selects_code() {
        let regs = SoftwareRegisters::new();
        let span = SpanController::new(&regs);
        assert_eq!(span.write(60_000_000), 0x2);
        assert_eq!(span.write(99_000), 0xA);
        assert_eq!(regs.writes_to(regs::SPAN), vec![0x2, 0xA]);
    }

    #[test]
    fn read_text_after_write() {
        let regs = SoftwareRegisters::new();
        let span = SpanController::new(&regs);
        span.write(60_000_000);
        assert_eq!(span.read_text(), "50000000\n");
    }

    #[test]
    fn unknown_code_reads_zero() {
        let regs = SoftwareRegisters::new().with_value(regs::SPAN, 0xF);
        assert_eq!(SpanController::new(&regs).read(), 0);
    }

    #[test]
    fn text_parsing() {
        assert_eq!(parse_hz(b"20000000\n").unwrap(), 20_000_000);
        assert_eq!(parse_hz(b"+5").unwrap(), 5);
        for bad in [&b""[..], b"\n", b"-1", b"1.5", b"12 ", b"99999999999999999999"] {
            assert!(parse_hz(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn write_text_consumes_everything() {
        let regs = SoftwareRegisters::new();
        let span = SpanController::new(&regs);
        assert_eq!(span.write_text(b"1000000\n").unwrap(), 8);
        assert_eq!(regs.value(regs::SPAN), 0x7);
        assert!(span.write_text(b"wide").is_err());
        assert_eq!(regs.writes_to(regs::SPAN), vec![0x7]);
    }
}
