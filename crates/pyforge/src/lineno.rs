//! Packed line-table codecs, one per format generation.
//!
//! All three codecs speak the same internal shape: a list of byte ranges
//! with an [`InstrLocation`] each. Encoding consumes per-instruction
//! `(byte_size, location)` pairs; decoding yields the ranges back.
//!
//! - `lnotab` (3.8, 3.9): `(u8 addr delta, i8 line delta)` pairs. Large
//!   deltas saturate across padding pairs.
//! - `linetable` (3.10): `(u8 range length, i8 line delta)` entries, with
//!   `-128` marking a range that has no line, and zero-length entries
//!   carrying oversized line deltas.
//! - `locations` (3.11+): variable-length entries carrying end line and
//!   column spans, 6-bit varint encoded.

use crate::{error::DisassembleError, location::InstrLocation};

/// A decoded line-table range: instructions in `start..end` carry
/// `location`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    pub start: u32,
    pub end: u32,
    pub location: InstrLocation,
}

// ---------------------------------------------------------------------------
// lnotab (3.8, 3.9)
// ---------------------------------------------------------------------------

/// Encodes the classic `co_lnotab` pair stream.
///
/// Only `start_line` is representable. Instructions without a line continue
/// the previous one.
#[must_use]
pub fn encode_lnotab(first_lineno: u32, instrs: &[(u32, InstrLocation)]) -> Vec<u8> {
    let mut table = Vec::new();
    let mut prev_line = i64::from(first_lineno);
    let mut prev_offset = 0u32;
    let mut offset = 0u32;
    for (size, location) in instrs {
        if let Some(line) = location.start_line {
            let line = i64::from(line);
            if line != prev_line {
                let mut addr_delta = offset - prev_offset;
                let mut line_delta = line - prev_line;
                while addr_delta > 255 {
                    table.push(255);
                    table.push(0);
                    addr_delta -= 255;
                }
                table.push(addr_delta as u8);
                while line_delta > 127 {
                    table.push(127);
                    line_delta -= 127;
                    table.push(0);
                }
                while line_delta < -128 {
                    table.push((-128i8).to_ne_bytes()[0]);
                    line_delta += 128;
                    table.push(0);
                }
                // The loops above alternate line/addr bytes; the final line
                // delta closes the last pair.
                table.push((line_delta as i8).to_ne_bytes()[0]);
                prev_line = line;
                prev_offset = offset;
            }
        }
        offset += size;
    }
    table
}

/// Decodes a `co_lnotab` stream into line ranges.
pub fn decode_lnotab(table: &[u8], first_lineno: u32, code_len: u32) -> Result<Vec<LineEntry>, DisassembleError> {
    if table.len() % 2 != 0 {
        return Err(DisassembleError::MalformedLineTable { offset: table.len() - 1 });
    }
    let mut entries: Vec<LineEntry> = Vec::new();
    let mut line = i64::from(first_lineno);
    let mut offset = 0u32;
    let mut start = 0u32;
    for pair in table.chunks_exact(2) {
        let addr_delta = u32::from(pair[0]);
        let line_delta = i64::from(pair[1] as i8);
        if addr_delta > 0 {
            push_line_range(&mut entries, start, offset + addr_delta, line);
            start = offset + addr_delta;
            offset += addr_delta;
        }
        line += line_delta;
    }
    if start < code_len || entries.is_empty() {
        push_line_range(&mut entries, start, code_len, line);
    }
    Ok(entries)
}

/// Extends the previous range or opens a new one; the lnotab walk emits a
/// boundary per pair even when the line did not change.
fn push_line_range(entries: &mut Vec<LineEntry>, start: u32, end: u32, line: i64) {
    if end <= start {
        return;
    }
    let location = InstrLocation::line(line.max(0) as u32);
    if let Some(last) = entries.last_mut()
        && last.end == start
        && last.location == location
    {
        last.end = end;
        return;
    }
    entries.push(LineEntry { start, end, location });
}

// ---------------------------------------------------------------------------
// linetable (3.10)
// ---------------------------------------------------------------------------

const NO_LINE_SENTINEL: i8 = -128;

/// Encodes the 3.10 `co_linetable`.
#[must_use]
pub fn encode_linetable_310(first_lineno: u32, instrs: &[(u32, InstrLocation)]) -> Vec<u8> {
    let mut table = Vec::new();
    let mut prev_line = i64::from(first_lineno);
    // Group consecutive instructions with the same line into one range.
    let mut group_len = 0u32;
    let mut group_line: Option<i64> = None;
    let mut started = false;

    let mut flush = |table: &mut Vec<u8>, len: u32, line: Option<i64>, prev_line: &mut i64| {
        if len == 0 {
            return;
        }
        let mut remaining = len;
        match line {
            None => {
                while remaining > 254 {
                    table.push(254);
                    table.push(NO_LINE_SENTINEL.to_ne_bytes()[0]);
                    remaining -= 254;
                }
                table.push(remaining as u8);
                table.push(NO_LINE_SENTINEL.to_ne_bytes()[0]);
            }
            Some(line) => {
                let mut delta = line - *prev_line;
                while delta > 127 {
                    table.push(0);
                    table.push(127);
                    delta -= 127;
                }
                while delta < -127 {
                    table.push(0);
                    table.push((-127i8).to_ne_bytes()[0]);
                    delta += 127;
                }
                while remaining > 254 {
                    table.push(254);
                    table.push((delta as i8).to_ne_bytes()[0]);
                    delta = 0;
                    remaining -= 254;
                }
                table.push(remaining as u8);
                table.push((delta as i8).to_ne_bytes()[0]);
                *prev_line = line;
            }
        }
    };

    for (size, location) in instrs {
        let line = location.start_line.map(i64::from);
        if started && line == group_line {
            group_len += size;
        } else {
            if started {
                flush(&mut table, group_len, group_line, &mut prev_line);
            }
            started = true;
            group_line = line;
            group_len = *size;
        }
    }
    if started {
        flush(&mut table, group_len, group_line, &mut prev_line);
    }
    table
}

/// Decodes the 3.10 `co_linetable` into line ranges.
pub fn decode_linetable_310(
    table: &[u8],
    first_lineno: u32,
    code_len: u32,
) -> Result<Vec<LineEntry>, DisassembleError> {
    if table.len() % 2 != 0 {
        return Err(DisassembleError::MalformedLineTable { offset: table.len() - 1 });
    }
    let mut entries: Vec<LineEntry> = Vec::new();
    let mut line = i64::from(first_lineno);
    let mut offset = 0u32;
    for pair in table.chunks_exact(2) {
        let range_len = u32::from(pair[0]);
        let line_delta = pair[1] as i8;
        let location = if line_delta == NO_LINE_SENTINEL {
            InstrLocation::NONE
        } else {
            line += i64::from(line_delta);
            InstrLocation::line(line.max(0) as u32)
        };
        if range_len > 0 {
            let end = offset + range_len;
            if let Some(last) = entries.last_mut()
                && last.end == offset
                && last.location == location
            {
                last.end = end;
            } else {
                entries.push(LineEntry {
                    start: offset,
                    end,
                    location,
                });
            }
            offset = end;
        }
    }
    if offset < code_len {
        return Err(DisassembleError::MalformedLineTable { offset: table.len() });
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// locations (3.11+)
// ---------------------------------------------------------------------------

const CODE_ONE_LINE0: u8 = 10;
const CODE_NO_COLUMNS: u8 = 13;
const CODE_LONG: u8 = 14;
const CODE_NONE: u8 = 15;

fn write_varint(out: &mut Vec<u8>, mut value: u32) {
    while value >= 64 {
        out.push(0x40 | (value & 0x3f) as u8);
        value >>= 6;
    }
    out.push(value as u8);
}

fn write_signed_varint(out: &mut Vec<u8>, value: i64) {
    let uval = if value < 0 {
        (((-value) as u32) << 1) | 1
    } else {
        (value as u32) << 1
    };
    write_varint(out, uval);
}

struct VarintReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> VarintReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn byte(&mut self) -> Result<u8, DisassembleError> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or(DisassembleError::MalformedLineTable { offset: self.pos })?;
        self.pos += 1;
        Ok(b)
    }

    fn varint(&mut self) -> Result<u32, DisassembleError> {
        let mut b = self.byte()?;
        let mut value = u32::from(b & 0x3f);
        let mut shift = 0u32;
        while b & 0x40 != 0 {
            b = self.byte()?;
            shift += 6;
            if shift > 30 {
                return Err(DisassembleError::MalformedLineTable { offset: self.pos - 1 });
            }
            value |= u32::from(b & 0x3f) << shift;
        }
        Ok(value)
    }

    fn signed_varint(&mut self) -> Result<i64, DisassembleError> {
        let uval = self.varint()?;
        Ok(if uval & 1 != 0 {
            -i64::from(uval >> 1)
        } else {
            i64::from(uval >> 1)
        })
    }
}

/// Encodes the 3.11+ locations table.
///
/// Sizes are in bytes and must be even; every entry covers whole code
/// units. Only the general entry codes are emitted (`NONE`, `NO_COLUMNS`,
/// `ONE_LINE0..2`, `LONG`); the short forms exist for decoding
/// interpreter-produced tables.
#[must_use]
pub fn encode_locations_311(first_lineno: u32, instrs: &[(u32, InstrLocation)]) -> Vec<u8> {
    let mut table = Vec::new();
    let mut line = i64::from(first_lineno);
    for (size, location) in instrs {
        let mut units = size / 2;
        while units > 0 {
            let chunk = units.min(8);
            encode_one_location(&mut table, chunk, location, &mut line);
            units -= chunk;
        }
    }
    table
}

fn encode_one_location(table: &mut Vec<u8>, units: u32, location: &InstrLocation, line: &mut i64) {
    let first_byte = |code: u8| 0x80 | (code << 3) | (units - 1) as u8;
    match location.start_line {
        None => table.push(first_byte(CODE_NONE)),
        Some(start_line) => {
            let start_line = i64::from(start_line);
            let delta = start_line - *line;
            let end_line = location.end_line.map(i64::from).unwrap_or(start_line);
            match (location.start_col, location.end_col) {
                (Some(start_col), Some(end_col))
                    if end_line == start_line && (0..=2).contains(&delta) && start_col < 256 && end_col < 256 =>
                {
                    table.push(first_byte(CODE_ONE_LINE0 + delta as u8));
                    table.push(start_col as u8);
                    table.push(end_col as u8);
                }
                (None, None) if end_line == start_line => {
                    table.push(first_byte(CODE_NO_COLUMNS));
                    write_signed_varint(table, delta);
                }
                (start_col, end_col) => {
                    table.push(first_byte(CODE_LONG));
                    write_signed_varint(table, delta);
                    write_varint(table, (end_line - start_line).max(0) as u32);
                    write_varint(table, start_col.map_or(0, |c| c + 1));
                    write_varint(table, end_col.map_or(0, |c| c + 1));
                }
            }
            *line = start_line;
        }
    }
}

/// Decodes the 3.11+ locations table, including the short forms this crate
/// never emits.
pub fn decode_locations_311(
    table: &[u8],
    first_lineno: u32,
    code_len: u32,
) -> Result<Vec<LineEntry>, DisassembleError> {
    let mut reader = VarintReader::new(table);
    let mut entries = Vec::new();
    let mut line = i64::from(first_lineno);
    let mut offset = 0u32;
    while reader.pos < table.len() {
        let entry_pos = reader.pos;
        let first = reader.byte()?;
        if first & 0x80 == 0 {
            return Err(DisassembleError::MalformedLineTable { offset: entry_pos });
        }
        let code = (first >> 3) & 0xf;
        let units = u32::from(first & 0x7) + 1;
        let location = match code {
            0..=9 => {
                // Short form: same line, compact column span.
                let second = reader.byte()?;
                let start_col = (u32::from(code) << 3) | u32::from(second >> 4);
                let end_col = start_col + u32::from(second & 0xf);
                InstrLocation {
                    start_line: Some(line.max(0) as u32),
                    end_line: Some(line.max(0) as u32),
                    start_col: Some(start_col),
                    end_col: Some(end_col),
                }
            }
            10..=12 => {
                line += i64::from(code - CODE_ONE_LINE0);
                let start_col = u32::from(reader.byte()?);
                let end_col = u32::from(reader.byte()?);
                InstrLocation {
                    start_line: Some(line.max(0) as u32),
                    end_line: Some(line.max(0) as u32),
                    start_col: Some(start_col),
                    end_col: Some(end_col),
                }
            }
            13 => {
                line += reader.signed_varint()?;
                InstrLocation {
                    start_line: Some(line.max(0) as u32),
                    end_line: Some(line.max(0) as u32),
                    start_col: None,
                    end_col: None,
                }
            }
            14 => {
                line += reader.signed_varint()?;
                let end_line = line + i64::from(reader.varint()?);
                let start_col = reader.varint()?;
                let end_col = reader.varint()?;
                InstrLocation {
                    start_line: Some(line.max(0) as u32),
                    end_line: Some(end_line.max(0) as u32),
                    start_col: start_col.checked_sub(1),
                    end_col: end_col.checked_sub(1),
                }
            }
            _ => InstrLocation::NONE,
        };
        let end = offset + units * 2;
        entries.push(LineEntry {
            start: offset,
            end,
            location,
        });
        offset = end;
    }
    if offset < code_len {
        return Err(DisassembleError::MalformedLineTable { offset: table.len() });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn loc(line: u32) -> InstrLocation {
        InstrLocation::line(line)
    }

    #[test]
    fn lnotab_round_trips_simple_lines() {
        let instrs = [(4, loc(1)), (2, loc(2)), (6, loc(2)), (2, loc(4))];
        let table = encode_lnotab(1, &instrs);
        let entries = decode_lnotab(&table, 1, 14).unwrap();
        assert_eq!(
            entries,
            vec![
                LineEntry {
                    start: 0,
                    end: 4,
                    location: loc(1)
                },
                LineEntry {
                    start: 4,
                    end: 12,
                    location: loc(2)
                },
                LineEntry {
                    start: 12,
                    end: 14,
                    location: loc(4)
                },
            ]
        );
    }

    #[test]
    fn lnotab_saturates_large_line_steps() {
        let instrs = [(2, loc(1)), (2, loc(1000))];
        let table = encode_lnotab(1, &instrs);
        let entries = decode_lnotab(&table, 1, 4).unwrap();
        assert_eq!(entries.last().unwrap().location, loc(1000));
    }

    #[test]
    fn lnotab_pads_large_byte_steps() {
        let instrs = [(600, loc(1)), (2, loc(2))];
        let table = encode_lnotab(1, &instrs);
        // Two (255, 0) padding pairs before the closing pair.
        assert_eq!(&table[..4], &[255, 0, 255, 0]);
        let entries = decode_lnotab(&table, 1, 602).unwrap();
        assert_eq!(entries.last().unwrap().location, loc(2));
        assert_eq!(entries.last().unwrap().start, 600);
    }

    #[test]
    fn linetable_310_handles_negative_deltas() {
        let instrs = [(2, loc(5)), (2, loc(3)), (2, loc(7))];
        let table = encode_linetable_310(5, &instrs);
        let entries = decode_linetable_310(&table, 5, 6).unwrap();
        assert_eq!(
            entries.iter().map(|e| e.location.start_line).collect::<Vec<_>>(),
            vec![Some(5), Some(3), Some(7)],
        );
    }

    #[test]
    fn linetable_310_marks_no_line_ranges() {
        let instrs = [(2, loc(1)), (4, InstrLocation::NONE), (2, loc(2))];
        let table = encode_linetable_310(1, &instrs);
        let entries = decode_linetable_310(&table, 1, 8).unwrap();
        assert_eq!(entries[1].location, InstrLocation::NONE);
        assert_eq!(entries[1].start, 2);
        assert_eq!(entries[1].end, 6);
        assert_eq!(entries[2].location, loc(2));
    }

    #[test]
    fn locations_round_trip_all_entry_shapes() {
        let instrs = [
            // ONE_LINE form
            (2, InstrLocation::span(1, 1, 0, 5)),
            // NONE form
            (2, InstrLocation::NONE),
            // NO_COLUMNS form, negative delta
            (4, loc(1)),
            // LONG form: multi-line span
            (2, InstrLocation::span(2, 4, 10, 3)),
            // LONG form with absent columns on distinct lines
            (
                2,
                InstrLocation {
                    start_line: Some(5),
                    end_line: Some(6),
                    start_col: None,
                    end_col: None,
                },
            ),
        ];
        let table = encode_locations_311(1, &instrs);
        let entries = decode_locations_311(&table, 1, 12).unwrap();
        let locations: Vec<_> = entries.iter().map(|e| e.location).collect();
        assert_eq!(
            locations,
            vec![
                InstrLocation::span(1, 1, 0, 5),
                InstrLocation::NONE,
                loc(1),
                InstrLocation::span(2, 4, 10, 3),
                InstrLocation {
                    start_line: Some(5),
                    end_line: Some(6),
                    start_col: None,
                    end_col: None,
                },
            ]
        );
        // A 4-byte instruction covers two code units in a single entry.
        assert_eq!(entries[2].start, 4);
        assert_eq!(entries[2].end, 8);
    }

    #[test]
    fn locations_split_oversized_instructions() {
        // 20 code units must split into ceil(20 / 8) = 3 entries.
        let instrs = [(40, loc(7))];
        let table = encode_locations_311(7, &instrs);
        let entries = decode_locations_311(&table, 7, 40).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].end, 16);
        assert_eq!(entries[2].end, 40);
        assert!(entries.iter().all(|e| e.location == loc(7)));
    }

    #[test]
    fn locations_decode_short_form() {
        // Hand-built short-form entry: code 1, one unit, start_col 13,
        // span 2.
        let first = 0x80 | (1 << 3);
        let second = ((13u8 & 0x7) << 4) | 2;
        let entries = decode_locations_311(&[first, second], 3, 2).unwrap();
        assert_eq!(entries[0].location, InstrLocation::span(3, 3, 13, 15));
    }

    #[test]
    fn truncated_tables_are_rejected() {
        assert!(decode_lnotab(&[1], 1, 2).is_err());
        assert!(decode_locations_311(&[0x80 | (14 << 3)], 1, 2).is_err());
        // First byte without the entry marker bit.
        assert!(decode_locations_311(&[0x01], 1, 2).is_err());
    }
}
