//! Coefficient profiles
//!
//! A profile is ASCII text framed by tags, one coefficient per line:
//!
//! ```text
//! <profile DDC name=custom>
//! # comments and blank lines are skipped
//! <coef-hb>
//! 0x0000ff12
//! ...
//! </coef-hb>
//! <coef-poly>
//! 0xfffffe01
//! ...
//! </coef-poly>
//! </profile>
//! ```
//!
//! Tags are matched anywhere on the line. Coefficients are 32-bit two's
//! complement written as `0x` hex. A profile is accepted only once the
//! closing `</profile>` is reached; running out of text first is an error
//! even when every section closed cleanly.

use crate::buffer::{Progress, UploadBuffer};
use crate::error::{DdcError, Result};
use crate::registers::RegisterInterface;
use ddc_chip::coefficients::{DEFAULT_HALFBAND, DEFAULT_POLY, HALFBAND_CAPACITY, POLY_CAPACITY};
use ddc_chip::regs;
use tracing::{debug, error, info};

const PROFILE_OPEN: &str = "<profile DDC";
const PROFILE_CLOSE: &str = "</profile>";

/// Parsed filter tables, ready to be written to the coefficient windows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoefficientProfile {
    halfband: Vec<i32>,
    poly: Vec<i32>,
}

impl CoefficientProfile {
    /// Build a profile from explicit tables.
    ///
    /// # Errors
    ///
    /// [`DdcError::InvalidArgument`] if a table exceeds its section cap.
    pub fn new(halfband: Vec<i32>, poly: Vec<i32>) -> Result<Self> {
        for (section, taps) in [(Section::Halfband, &halfband), (Section::Poly, &poly)] {
            if taps.len() > section.capacity() {
                return Err(section.overflow());
            }
        }
        Ok(Self { halfband, poly })
    }

    /// Tables the core is loaded with at probe.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            halfband: DEFAULT_HALFBAND.to_vec(),
            poly: DEFAULT_POLY.to_vec(),
        }
    }

    /// Halfband taps in element order
    #[must_use]
    pub fn halfband(&self) -> &[i32] {
        &self.halfband
    }

    /// Polyphase taps in element order
    #[must_use]
    pub fn poly(&self) -> &[i32] {
        &self.poly
    }

    /// Write both tables, halfband first, one word per tap.
    #[allow(clippy::cast_sign_loss)]
    pub fn push(&self, registers: &dyn RegisterInterface) {
        for (i, &tap) in self.halfband.iter().enumerate() {
            registers.write32(regs::halfband_tap(i), tap as u32);
        }
        for (i, &tap) in self.poly.iter().enumerate() {
            registers.write32(regs::poly_tap(i), tap as u32);
        }
        debug!(
            "Pushed {} halfband + {} polyphase taps",
            self.halfband.len(),
            self.poly.len()
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Halfband,
    Poly,
}

impl Section {
    fn opened_by(line: &str) -> Option<Self> {
        if line.contains("<coef-hb>") {
            Some(Self::Halfband)
        } else if line.contains("<coef-poly>") {
            Some(Self::Poly)
        } else {
            None
        }
    }

    fn closed_by(line: &str) -> Option<Self> {
        if line.contains("</coef-hb>") {
            Some(Self::Halfband)
        } else if line.contains("</coef-poly>") {
            Some(Self::Poly)
        } else {
            None
        }
    }

    const fn capacity(self) -> usize {
        match self {
            Self::Halfband => HALFBAND_CAPACITY,
            Self::Poly => POLY_CAPACITY,
        }
    }

    fn overflow(self) -> DdcError {
        let name = match self {
            Self::Halfband => "halfband",
            Self::Poly => "polyphase",
        };
        DdcError::invalid_argument(format!(
            "more than {} {name} coefficients",
            self.capacity()
        ))
    }
}

/// Parse profile text.
///
/// The text ends at the first NUL byte, if any.
///
/// # Errors
///
/// - [`DdcError::Malformed`] for a line that is neither a tag nor a hex
///   coefficient inside an open section, and for tags out of place
/// - [`DdcError::InvalidArgument`] when a section exceeds its cap, or the
///   text ends before `</profile>`
pub fn parse(text: &[u8]) -> Result<CoefficientProfile> {
    let text = until_nul(text);

    let mut header = false;
    let mut open: Option<Section> = None;
    let mut taps: Vec<i32> = Vec::new();
    let mut profile = CoefficientProfile::default();

    for raw in text.split(|&b| b == b'\n') {
        let line = std::str::from_utf8(raw)
            .map_err(|_| DdcError::malformed(String::from_utf8_lossy(raw).trim_start()))?
            .trim_start();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if !header && line.contains(PROFILE_OPEN) {
            header = true;
            continue;
        }

        if let Some(section) = Section::opened_by(line) {
            if open.is_some() {
                return Err(DdcError::malformed(line));
            }
            open = Some(section);
            taps.clear();
            continue;
        }

        if let Some(section) = Section::closed_by(line) {
            if open != Some(section) {
                return Err(DdcError::malformed(line));
            }
            let done = std::mem::take(&mut taps);
            match section {
                Section::Halfband => profile.halfband = done,
                Section::Poly => profile.poly = done,
            }
            open = None;
            continue;
        }

        if let Some(section) = open {
            if let Some(tap) = parse_hex(line) {
                if taps.len() >= section.capacity() {
                    return Err(section.overflow());
                }
                taps.push(tap);
                continue;
            }
        }

        if header && line.contains(PROFILE_CLOSE) {
            return Ok(profile);
        }

        return Err(DdcError::malformed(line));
    }

    Err(DdcError::invalid_argument(format!(
        "profile ended without {PROFILE_CLOSE}"
    )))
}

/// `0x` followed by at least one hex digit; trailing text is ignored.
#[allow(clippy::cast_possible_wrap)]
fn parse_hex(line: &str) -> Option<i32> {
    let digits = line.strip_prefix("0x")?;
    let end = digits
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(digits.len());
    u32::from_str_radix(&digits[..end], 16)
        .ok()
        .map(|v| v as i32)
}

fn until_nul(text: &[u8]) -> &[u8] {
    text.iter()
        .position(|&b| b == 0)
        .map_or(text, |nul| &text[..nul])
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Profile upload channel.
///
/// Text accumulates until it contains `</profile>`; only then is it parsed
/// and, on success, pushed to the coefficient windows.
#[derive(Debug)]
pub struct ProfileChannel {
    buffer: UploadBuffer,
    committed: Option<CoefficientProfile>,
}

impl ProfileChannel {
    /// Channel accepting up to `capacity` bytes per upload.
    pub const fn new(capacity: usize) -> Self {
        Self {
            buffer: UploadBuffer::new(capacity),
            committed: None,
        }
    }

    /// Last profile written to the hardware through this channel
    #[must_use]
    pub const fn committed(&self) -> Option<&CoefficientProfile> {
        self.committed.as_ref()
    }

    /// Record a profile written outside the channel (probe defaults).
    pub(crate) fn set_committed(&mut self, profile: CoefficientProfile) {
        self.committed = Some(profile);
    }

    /// Accept `bytes` at `offset`.
    ///
    /// # Errors
    ///
    /// Buffer errors, and parse errors once `</profile>` is present. Any
    /// error drops the transfer; the previously committed tables stay in
    /// the hardware.
    pub fn write(
        &mut self,
        registers: &dyn RegisterInterface,
        offset: usize,
        bytes: &[u8],
    ) -> Result<Progress> {
        if let Err(e) = self.buffer.append(offset, bytes) {
            self.buffer.discard();
            error!("Profile upload rejected: {e}");
            return Err(e);
        }

        let text = until_nul(self.buffer.as_slice());
        if !contains(text, PROFILE_CLOSE.as_bytes()) {
            debug!("Profile upload: {} bytes, waiting for {PROFILE_CLOSE}", text.len());
            return Ok(Progress::Incomplete);
        }

        match parse(text) {
            Ok(profile) => {
                profile.push(registers);
                info!(
                    "Profile committed: {} halfband, {} polyphase taps",
                    profile.halfband.len(),
                    profile.poly.len()
                );
                self.buffer.finalize();
                self.committed = Some(profile);
                Ok(Progress::Applied)
            }
            Err(e) => {
                self.buffer.discard();
                error!("Profile upload rejected: {e}");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SoftwareRegisters;
    use crate::error::ErrorKind;

    const SMALL: &str = "<profile DDC test>\n\
        <coef-hb>\n0x1\n0xffffffff\n</coef-hb>\n\
        <coef-poly>\n0x10\n0x20\n0x30\n</coef-poly>\n\
        </profile>\n";

    #[test]
    fn parses_both_sections() {
        let p = parse(SMALL.as_bytes()).unwrap();
        assert_eq!(p.halfband(), &[1, -1]);
        assert_eq!(p.poly(), &[0x10, 0x20, 0x30]);
    }

    #[test]
    fn skips_comments_blank_and_indented_lines() {
        let text = "\n# header\n  <profile DDC x>\r\n\t<coef-hb>\r\n   0xA\r\n\r\n</coef-hb>\r\n</profile>\r\n";
        let p = parse(text.as_bytes()).unwrap();
        assert_eq!(p.halfband(), &[0xA]);
        assert!(p.poly().is_empty());
    }

    #[test]
    fn missing_profile_close_fails() {
        let text = SMALL.replace("</profile>\n", "");
        let err = parse(text.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn non_hex_inside_section_is_malformed() {
        let text = SMALL.replace("0x20", "twenty");
        match parse(text.as_bytes()).unwrap_err() {
            DdcError::Malformed { line } => assert_eq!(line, "twenty"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stray_lines_are_malformed() {
        for bad in [
            "<profile DDC>\n0x1\n</profile>\n",
            "<profile DDC>\n<coef-hb>\n<coef-poly>\n",
            "<profile DDC>\n</coef-hb>\n</profile>\n",
            "<coef-hb>\n0x1\n</coef-hb>\n</profile>\n",
            "<profile DDC>\n<profile DDC>\n</profile>\n",
            "<profile DDC>\n<coef-hb>\n0x1ffffffff\n</coef-hb>\n</profile>\n",
            "<profile DDC>\n<coef-hb>\n0x\n</coef-hb>\n</profile>\n",
        ] {
            assert_eq!(
                parse(bad.as_bytes()).unwrap_err().kind(),
                ErrorKind::Malformed,
                "{bad:?}"
            );
        }
    }

    #[test]
    fn section_caps() {
        let mut text = String::from("<profile DDC>\n<coef-hb>\n");
        for i in 0..256 {
            text.push_str(&format!("0x{i:x}\n"));
        }
        let full = format!("{text}</coef-hb>\n</profile>\n");
        assert_eq!(parse(full.as_bytes()).unwrap().halfband().len(), 256);

        let over = format!("{text}0x0\n</coef-hb>\n</profile>\n");
        assert_eq!(
            parse(over.as_bytes()).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn close_with_open_section_keeps_closed_ones() {
        let text = "<profile DDC>\n<coef-hb>\n0x5\n</coef-hb>\n<coef-poly>\n0x7\n</profile>\n";
        let p = parse(text.as_bytes()).unwrap();
        assert_eq!(p.halfband(), &[5]);
        assert!(p.poly().is_empty());
    }

    #[test]
    fn text_stops_at_nul() {
        let mut bytes = SMALL.as_bytes().to_vec();
        bytes.extend_from_slice(b"\0garbage that is not hex\n");
        assert!(parse(&bytes).is_ok());
    }

    #[test]
    fn explicit_tables_respect_caps() {
        assert!(CoefficientProfile::new(vec![0; 256], vec![0; 1024]).is_ok());
        assert!(CoefficientProfile::new(vec![0; 257], vec![]).is_err());
    }

    #[test]
    fn channel_waits_for_close_tag() {
        let regs = SoftwareRegisters::new();
        let mut channel = ProfileChannel::new(8192);
        let (head, tail) = SMALL.as_bytes().split_at(40);

        assert_eq!(channel.write(&regs, 0, head).unwrap(), Progress::Incomplete);
        assert!(regs.writes().is_empty());

        assert_eq!(
            channel.write(&regs, head.len(), tail).unwrap(),
            Progress::Applied
        );
        assert_eq!(
            regs.writes(),
            vec![
                (regs::halfband_tap(0), 1),
                (regs::halfband_tap(1), 0xFFFF_FFFF),
                (regs::poly_tap(0), 0x10),
                (regs::poly_tap(1), 0x20),
                (regs::poly_tap(2), 0x30),
            ]
        );
        assert_eq!(channel.committed().unwrap().poly().len(), 3);
    }

    #[test]
    fn failed_upload_keeps_committed_profile() {
        let regs = SoftwareRegisters::new();
        let mut channel = ProfileChannel::new(8192);
        channel.write(&regs, 0, SMALL.as_bytes()).unwrap();
        regs.clear_log();

        let bad = SMALL.replace("0x30", "zz");
        assert!(channel.write(&regs, 0, bad.as_bytes()).is_err());
        assert!(regs.writes().is_empty());
        assert_eq!(channel.committed().unwrap().poly(), &[0x10, 0x20, 0x30]);
    }
}
