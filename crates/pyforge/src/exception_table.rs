//! The packed exception table of 3.11+ code units.
//!
//! Entries are four unsigned varints (`start`, `length`, `target`,
//! `depth_and_lasti`), all counted in 2-byte code units. Varints pack six
//! bits per byte, most significant chunk first, with `0x40` as the
//! continuation flag; the first byte of each entry additionally carries
//! `0x80` so a scanner can find entry boundaries.

use crate::error::DisassembleError;

/// One exception-covered region.
///
/// Offsets are byte offsets into the code: `start` is the first covered
/// instruction, `stop` is the end of the last covered instruction
/// (exclusive), `target` is the handler. The codec converts to and from the
/// code-unit counts the packed form uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExceptionTableEntry {
    pub start: u32,
    pub stop: u32,
    pub target: u32,
    pub push_lasti: bool,
    /// Operand-stack depth to unwind to before entering the handler.
    pub stack_depth: u32,
}

const CONTINUATION: u8 = 0x40;
const ENTRY_MARKER: u8 = 0x80;

fn write_varint(out: &mut Vec<u8>, value: u32, mut marker: u8) {
    let mut shift = 30;
    while shift > 0 {
        if value >> shift != 0 {
            out.push(((value >> shift) & 0x3f) as u8 | CONTINUATION | marker);
            marker = 0;
        }
        shift -= 6;
    }
    out.push((value & 0x3f) as u8 | marker);
}

/// Encodes entries in table order.
///
/// Callers sort by ascending `start` (ties by ascending `stop`) before
/// encoding; the interpreter's handler lookup assumes that order.
#[must_use]
pub fn encode(entries: &[ExceptionTableEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in entries {
        let start = entry.start / 2;
        let length = (entry.stop - entry.start) / 2;
        let target = entry.target / 2;
        let depth_lasti = (entry.stack_depth << 1) | u32::from(entry.push_lasti);
        write_varint(&mut out, start, ENTRY_MARKER);
        write_varint(&mut out, length, 0);
        write_varint(&mut out, target, 0);
        write_varint(&mut out, depth_lasti, 0);
    }
    out
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn varint(&mut self, expect_marker: bool) -> Result<u32, DisassembleError> {
        let malformed = DisassembleError::MalformedExceptionTable { offset: self.pos };
        let mut byte = *self.bytes.get(self.pos).ok_or(malformed)?;
        if (byte & ENTRY_MARKER != 0) != expect_marker {
            return Err(DisassembleError::MalformedExceptionTable { offset: self.pos });
        }
        self.pos += 1;
        let mut value = u32::from(byte & 0x3f);
        while byte & CONTINUATION != 0 {
            byte = *self
                .bytes
                .get(self.pos)
                .ok_or(DisassembleError::MalformedExceptionTable { offset: self.pos })?;
            if byte & ENTRY_MARKER != 0 {
                return Err(DisassembleError::MalformedExceptionTable { offset: self.pos });
            }
            self.pos += 1;
            value = (value << 6) | u32::from(byte & 0x3f);
        }
        Ok(value)
    }
}

/// Decodes a packed exception table.
pub fn decode(bytes: &[u8]) -> Result<Vec<ExceptionTableEntry>, DisassembleError> {
    let mut reader = Reader { bytes, pos: 0 };
    let mut entries = Vec::new();
    while reader.pos < bytes.len() {
        let start = reader.varint(true)?;
        let length = reader.varint(false)?;
        let target = reader.varint(false)?;
        let depth_lasti = reader.varint(false)?;
        entries.push(ExceptionTableEntry {
            start: start * 2,
            stop: (start + length) * 2,
            target: target * 2,
            push_lasti: depth_lasti & 1 != 0,
            stack_depth: depth_lasti >> 1,
        });
    }
    Ok(entries)
}
