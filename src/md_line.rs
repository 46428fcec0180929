//! Decoding (and encoding) of the lines printed by the bootloader `md`
//! command.
//!
//! Each line covers 16 bytes of memory and has a rigid layout:
//!
//! ```text
//! 00001000: 44434241 48474645 00000000 ffffffff    DCBAHGFE........\r\n
//! ^address  ^ four groups of 4 bytes in hex        ^ ASCII text
//! ```
//!
//! The layout is described once in [`MD_LINE_LAYOUT`] and both [`decode`] and
//! [`encode`] walk the same description, so they cannot drift apart.

use std::fmt;

use crate::error::DumpError;

// =============================================================================
// Public Interface
// =============================================================================

/// Number of memory bytes covered by one `md` line.
pub const BYTES_PER_LINE: usize = 16;

/// Terminator of every line printed by the device.
pub const TERMINATOR: &str = "\r\n";

/// The bootloader prompt, printed without terminator when the device waits
/// for more input.
pub const PROMPT: &str = "=> ";

/// Total width of a well formed `md` line, terminator included.
pub const MD_LINE_WIDTH: usize = layout_width(&MD_LINE_LAYOUT);

/// One decoded `md` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    /// Address of the first byte, always a multiple of 16.
    pub address: u64,
    pub bytes: [u8; BYTES_PER_LINE],
    /// The device rendering of `bytes`, non-printable bytes shown as `.`.
    pub shadow: String,
}

impl LineRecord {
    /// Build a record from raw memory, rendering the shadow text the same way
    /// the device does.
    pub fn from_bytes(address: u64, bytes: [u8; BYTES_PER_LINE]) -> Self {
        LineRecord {
            address,
            bytes,
            shadow: shadow_of(&bytes),
        }
    }

    /// The raw line the device would print for this record.
    pub fn to_line(&self) -> String {
        encode(self)
    }
}

impl fmt::Display for LineRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X} ", self.address)?;
        for byte in self.bytes.iter() {
            write!(f, " {:02X}", byte)?;
        }
        write!(f, " |{}|", self.shadow)
    }
}

/// Decode one raw `md` line of exactly `expected_size` characters.
///
/// Framing problems are reported as [`DumpError::Format`]; a line whose hex
/// data disagrees with a printable character of its ASCII text is reported as
/// [`DumpError::Corruption`].
pub fn decode(raw: &str, expected_size: usize) -> Result<LineRecord, DumpError> {
    if raw.len() != expected_size {
        return Err(DumpError::format(
            raw,
            format!("expected {} characters, got {}", expected_size, raw.len()),
        ));
    }
    if !raw.is_ascii() {
        return Err(DumpError::format(raw, "line contains non-ASCII characters"));
    }

    let mut address = 0;
    let mut hex = String::with_capacity(2 * BYTES_PER_LINE);
    let mut shadow = "";

    let mut offset = 0;
    for field in MD_LINE_LAYOUT.iter() {
        let text = raw
            .get(offset..offset + field.width())
            .ok_or_else(|| DumpError::format(raw, "line is shorter than the md layout"))?;
        match *field {
            Field::Address => {
                check_hex_digits(raw, text, offset)?;
                address = u64::from_str_radix(text, 16)
                    .map_err(|e| DumpError::format(raw, e.to_string()))?;
                if address % BYTES_PER_LINE as u64 != 0 {
                    return Err(DumpError::format(
                        raw,
                        format!("address 0x{:08x} is not a multiple of 16", address),
                    ));
                }
            }
            Field::Word => {
                check_hex_digits(raw, text, offset)?;
                hex.push_str(text);
            }
            Field::Shadow => shadow = text,
            Field::Literal(expected) => {
                if text != expected {
                    return Err(DumpError::format(
                        raw,
                        format!(
                            "expected {:?} at offset {}, found {:?}",
                            expected, offset, text
                        ),
                    ));
                }
            }
        }
        offset += field.width();
    }
    if offset != raw.len() {
        return Err(DumpError::format(
            raw,
            format!("unexpected characters after offset {}", offset),
        ));
    }

    let mut bytes = [0u8; BYTES_PER_LINE];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[2 * i..2 * i + 2], 16)
            .map_err(|e| DumpError::format(raw, e.to_string()))?;
    }

    // Printable characters of the text must be the data bytes themselves.
    for (i, (byte, shadow_char)) in bytes.iter().zip(shadow.chars()).enumerate() {
        if shadow_char != '.' && *byte != shadow_char as u8 {
            return Err(DumpError::Corruption {
                address,
                offset: i,
                byte: *byte,
                shadow_char,
                hex,
                shadow: shadow.to_owned(),
            });
        }
    }

    Ok(LineRecord {
        address,
        bytes,
        shadow: shadow.to_owned(),
    })
}

/// Render `record` in the device `md` line format, terminator included.
///
/// The address field holds 8 hex digits, so `record.address` must fit in 32
/// bits for the line to decode back.
pub fn encode(record: &LineRecord) -> String {
    let mut line = String::with_capacity(MD_LINE_WIDTH);
    let mut words = record.bytes.chunks(4);
    for field in MD_LINE_LAYOUT.iter() {
        match *field {
            Field::Address => line.push_str(&format!("{:08x}", record.address)),
            Field::Word => {
                if let Some(word) = words.next() {
                    word.iter()
                        .for_each(|byte| line.push_str(&format!("{:02x}", byte)));
                }
            }
            Field::Shadow => line.push_str(&record.shadow),
            Field::Literal(text) => line.push_str(text),
        }
    }
    line
}

/// ASCII rendering of `bytes` with every non-printable byte shown as `.`.
pub fn shadow_of(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { '.' })
        .collect()
}

// =============================================================================
// Private stuff
// =============================================================================

/// A fixed-width field of an `md` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    /// 8 hex digits.
    Address,
    /// Text that must appear verbatim.
    Literal(&'static str),
    /// 8 hex digits, 4 bytes of data.
    Word,
    /// One character per data byte.
    Shadow,
}

impl Field {
    const fn width(self) -> usize {
        match self {
            Field::Address | Field::Word => 8,
            Field::Literal(text) => text.len(),
            Field::Shadow => BYTES_PER_LINE,
        }
    }
}

const MD_LINE_LAYOUT: [Field; 12] = [
    Field::Address,
    Field::Literal(": "),
    Field::Word,
    Field::Literal(" "),
    Field::Word,
    Field::Literal(" "),
    Field::Word,
    Field::Literal(" "),
    Field::Word,
    Field::Literal("    "),
    Field::Shadow,
    Field::Literal(TERMINATOR),
];

const fn layout_width(layout: &[Field]) -> usize {
    let mut width = 0;
    let mut i = 0;
    while i < layout.len() {
        width += layout[i].width();
        i += 1;
    }
    width
}

// `from_str_radix` tolerates a leading sign, the device never prints one.
fn check_hex_digits(raw: &str, text: &str, offset: usize) -> Result<(), DumpError> {
    match text.chars().position(|c| !c.is_ascii_hexdigit()) {
        Some(pos) => Err(DumpError::format(
            raw,
            format!("invalid hex digit at offset {}", offset + pos),
        )),
        None => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
const FIXTURE: &str = "00001000: 44434241 48474645 00000000 ffffffff    DCBAHGFE........\r\n";

#[test]
fn layout_width_matches_device_line() {
    assert_eq!(MD_LINE_WIDTH, 67);
    assert_eq!(FIXTURE.len(), MD_LINE_WIDTH);
}

#[test]
fn decode_fixture_line() {
    let record = decode(FIXTURE, 67).unwrap();
    assert_eq!(record.address, 0x1000);
    assert_eq!(
        record.bytes,
        [
            0x44, 0x43, 0x42, 0x41, 0x48, 0x47, 0x46, 0x45, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff
        ]
    );
    assert_eq!(record.shadow, "DCBAHGFE........");
}

#[test]
fn decode_accepts_uppercase_hex() {
    let line = "8000FFF0: 00000000 00000000 00000000 0000ABCD    ................\r\n";
    let record = decode(line, 67).unwrap();
    assert_eq!(record.address, 0x8000_fff0);
    assert_eq!(record.bytes[14..], [0xab, 0xcd]);
}

#[test]
fn decode_rejects_wrong_length() {
    let short = &FIXTURE[..FIXTURE.len() - 1];
    assert!(matches!(decode(short, 67), Err(DumpError::Format { .. })));
    assert!(matches!(decode(FIXTURE, 68), Err(DumpError::Format { .. })));
}

#[test]
fn decode_rejects_bad_separators() {
    let colon = FIXTURE.replacen(": ", ":_", 1);
    assert!(matches!(decode(&colon, 67), Err(DumpError::Format { .. })));

    let group = FIXTURE.replacen("44434241 ", "44434241_", 1);
    assert!(matches!(decode(&group, 67), Err(DumpError::Format { .. })));

    let gap = FIXTURE.replacen("ffffffff    ", "ffffffff   _", 1);
    assert!(matches!(decode(&gap, 67), Err(DumpError::Format { .. })));
}

#[test]
fn decode_rejects_bad_terminator() {
    let line = FIXTURE.replace("\r\n", "\n\n");
    match decode(&line, 67) {
        Err(DumpError::Format { line, reason }) => {
            assert!(line.ends_with("\\n\\n"));
            assert!(reason.contains("offset 65"));
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn decode_rejects_invalid_hex_digits() {
    let line = FIXTURE.replacen("48474645", "4847464g", 1);
    assert!(matches!(decode(&line, 67), Err(DumpError::Format { .. })));

    let signed = FIXTURE.replacen("00001000", "+0001000", 1);
    assert!(matches!(decode(&signed, 67), Err(DumpError::Format { .. })));
}

#[test]
fn decode_rejects_misaligned_address() {
    let line = FIXTURE.replacen("00001000", "00001008", 1);
    match decode(&line, 67) {
        Err(DumpError::Format { reason, .. }) => assert!(reason.contains("multiple of 16")),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn decode_rejects_non_ascii() {
    // Two shadow characters replaced by one two-byte character: still 67 bytes.
    let line = FIXTURE.replacen("DCBAHGFE..", "DCBAHGFE\u{e9}", 1);
    assert_eq!(line.len(), 67);
    match decode(&line, 67) {
        Err(DumpError::Format { reason, .. }) => assert!(reason.contains("non-ASCII")),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn decode_detects_shadow_mismatch() {
    let line = FIXTURE.replacen("DCBA", "DCBX", 1);
    match decode(&line, 67) {
        Err(DumpError::Corruption {
            address,
            offset,
            byte,
            shadow_char,
            ..
        }) => {
            assert_eq!(address, 0x1000);
            assert_eq!(offset, 3);
            assert_eq!(byte, 0x41);
            assert_eq!(shadow_char, 'X');
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn decode_ignores_dots_in_shadow() {
    // 'A' rendered as '.' is tolerated, only printable characters are checked.
    let line = FIXTURE.replacen("DCBA", "DCB.", 1);
    let record = decode(&line, 67).unwrap();
    assert_eq!(record.bytes[3], 0x41);
}

#[test]
fn encode_then_decode_preserves_record() {
    let mut bytes = [0u8; BYTES_PER_LINE];
    bytes.copy_from_slice(b"U-Boot 2020.\x00\x01\x7f~");
    let record = LineRecord::from_bytes(0x8000_0020, bytes);
    assert_eq!(record.shadow, "U-Boot 2020....~");

    let line = record.to_line();
    assert_eq!(line.len(), MD_LINE_WIDTH);
    assert_eq!(decode(&line, MD_LINE_WIDTH).unwrap(), record);
}

#[test]
fn display_formats_human_readable_record() {
    let record = decode(FIXTURE, 67).unwrap();
    assert_eq!(
        record.to_string(),
        "0x00001000  44 43 42 41 48 47 46 45 00 00 00 00 FF FF FF FF |DCBAHGFE........|"
    );
}
