//! Constrained Intel-HEX dialect used for TR memory images.
//!
//! This module only covers what the TR module needs: data, End Of File and
//! base-address record types over a 16-bit address space, plus the grouping
//! step that turns parsed records into device-writable blocks. It is not a
//! general hex-file toolkit.

use crate::{Error, MemoryKind, Result};
use std::fs;
use std::path::Path;

const MIN_LINE_LEN: usize = 11;
const MAX_LINE_LEN: usize = 521;

/// Write granularity of TR flash and external EEPROM.
const BLOCK_LEN: usize = 32;
/// Internal EEPROM accepts variable-length writes up to this limit.
const WRITE_LEN_MAX: usize = 32;

/// 16-bit addressing limits every TR memory image.
const MEMORY_SIZE: usize = 65536;

/// One addressed run of bytes, either as parsed from a file or as a block
/// ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexRecord {
    pub addr: u32,
    pub data: Vec<u8>,
}

fn decode_hex_pairs(s: &str) -> std::result::Result<Vec<u8>, usize> {
    (0..s.len() / 2)
        .map(|i| u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| i))
        .collect()
}

/// Parse the text representation into ordered `(address, data)` entries.
///
/// Base-address records (types 02 and 04) update parser state that applies
/// to all following data records. Start-address records (03 and 05) have no
/// effect on a TR module and are skipped with a warning. Any failure aborts
/// the parse with a positioned [`Error::Format`].
pub fn parse_records(text: &str, file: &str) -> Result<Vec<HexRecord>> {
    let mut entries = Vec::new();
    let mut base: u32 = 0;
    let mut finished = false;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        let len = line.len();

        if len == 0 {
            continue;
        }

        if finished {
            return Err(Error::format(
                file,
                line_no,
                0,
                "hex file continues after the End Of File record",
            ));
        }

        if len < MIN_LINE_LEN {
            return Err(Error::format(file, line_no, 0, "record is too short"));
        }

        if len > MAX_LINE_LEN {
            return Err(Error::format(file, line_no, 0, "record is too long"));
        }

        if len % 2 != 1 {
            return Err(Error::format(
                file,
                line_no,
                0,
                "record length is not odd",
            ));
        }

        if let Some(pos) = line
            .bytes()
            .position(|b| b != b':' && !b.is_ascii_hexdigit())
        {
            return Err(Error::format(
                file,
                line_no,
                pos,
                "invalid character in record",
            ));
        }

        if !line.starts_with(':') {
            return Err(Error::format(
                file,
                line_no,
                1,
                "missing record start code ':'",
            ));
        }

        // A stray ':' past the start code breaks up a hex pair.
        let bytes = decode_hex_pairs(&line[1..])
            .map_err(|pair| Error::format(file, line_no, 1 + pair * 2, "invalid character in record"))?;

        let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        if sum != 0 {
            return Err(Error::format(
                file,
                line_no,
                len - 2,
                "invalid record checksum",
            ));
        }

        let data_len = bytes[0] as usize;
        let offset = u16::from_be_bytes([bytes[1], bytes[2]]) as u32;
        let rec_type = bytes[3];

        if 2 * data_len + 11 != len {
            return Err(Error::format(
                file,
                line_no,
                2,
                "actual record length differs from the indicated length",
            ));
        }

        let payload = &bytes[4..4 + data_len];

        match rec_type {
            0 => entries.push(HexRecord {
                addr: base + offset,
                data: payload.to_vec(),
            }),
            1 => {
                if data_len != 0 {
                    return Err(Error::format(
                        file,
                        line_no,
                        2,
                        "data length of an End Of File record must be 0",
                    ));
                }
                finished = true;
            }
            2 => {
                if data_len != 2 {
                    return Err(Error::format(
                        file,
                        line_no,
                        2,
                        "data length of an Extended Segment Address record must be 2",
                    ));
                }
                base = u16::from_be_bytes([payload[0], payload[1]]) as u32 * 16;
            }
            3 => {
                if data_len != 4 {
                    return Err(Error::format(
                        file,
                        line_no,
                        2,
                        "data length of a Start Segment Address record must be 4",
                    ));
                }
                tracing::warn!(
                    "{file}:{line_no}: Start Segment Address record ignored, it has no effect on a TR module"
                );
            }
            4 => {
                if data_len != 2 {
                    return Err(Error::format(
                        file,
                        line_no,
                        2,
                        "data length of an Extended Linear Address record must be 2",
                    ));
                }
                base = (u16::from_be_bytes([payload[0], payload[1]]) as u32) << 16;
            }
            5 => {
                if data_len != 4 {
                    return Err(Error::format(
                        file,
                        line_no,
                        2,
                        "data length of a Start Linear Address record must be 4",
                    ));
                }
                tracing::warn!(
                    "{file}:{line_no}: Start Linear Address record ignored, it has no effect on a TR module"
                );
            }
            other => {
                return Err(Error::format(
                    file,
                    line_no,
                    8,
                    format!("unknown record type {other:#04x}"),
                ));
            }
        }
    }

    Ok(entries)
}

/// Re-chunk parsed entries into blocks satisfying `kind`'s write contract.
pub fn group_records(
    entries: &[HexRecord],
    kind: MemoryKind,
    file: &str,
) -> Result<Vec<HexRecord>> {
    match kind {
        MemoryKind::Flash | MemoryKind::ExternalEeprom => group_fixed_blocks(entries, file),
        MemoryKind::InternalEeprom => split_variable_entries(entries, file),
    }
}

/// Flash and external EEPROM are written in whole 32-byte blocks. Entries
/// are painted into a scratch image of the 16-bit address space and every
/// 32-byte window that received at least one byte is emitted in full, with
/// untouched positions as zero.
fn group_fixed_blocks(entries: &[HexRecord], file: &str) -> Result<Vec<HexRecord>> {
    let mut image = vec![0u8; MEMORY_SIZE];
    let mut valid = vec![false; MEMORY_SIZE];

    for entry in entries {
        let start = entry.addr as usize;
        let end = start.saturating_add(entry.data.len());
        if entry.addr as usize >= MEMORY_SIZE || end > MEMORY_SIZE {
            return Err(Error::format(
                file,
                0,
                0,
                format!(
                    "record at {:#06x} extends past the 16-bit address space",
                    entry.addr
                ),
            ));
        }
        image[start..end].copy_from_slice(&entry.data);
        valid[start..end].fill(true);
    }

    let mut blocks = Vec::new();
    for window in (0..MEMORY_SIZE).step_by(BLOCK_LEN) {
        if valid[window..window + BLOCK_LEN].iter().any(|&v| v) {
            blocks.push(HexRecord {
                addr: window as u32,
                data: image[window..window + BLOCK_LEN].to_vec(),
            });
        }
    }

    Ok(blocks)
}

/// Internal EEPROM takes variable-length writes of 1 to 32 bytes, so long
/// entries are split into consecutive chunks at 32-byte offsets and the
/// rest pass through unchanged.
fn split_variable_entries(entries: &[HexRecord], file: &str) -> Result<Vec<HexRecord>> {
    let mut blocks = Vec::new();

    for entry in entries {
        if entry.data.is_empty() {
            return Err(Error::format(file, 0, 0, "empty data record in hex file"));
        }
        if entry.data.len() > WRITE_LEN_MAX {
            for (i, chunk) in entry.data.chunks(WRITE_LEN_MAX).enumerate() {
                blocks.push(HexRecord {
                    addr: entry.addr + (i * WRITE_LEN_MAX) as u32,
                    data: chunk.to_vec(),
                });
            }
        } else {
            blocks.push(entry.clone());
        }
    }

    Ok(blocks)
}

/// Serialize blocks as type-00 records followed by the fixed End Of File
/// line. Only the single-segment encoding is produced: every address must
/// fit in 16 bits.
pub fn write_records(blocks: &[HexRecord], file: &str) -> Result<String> {
    let mut out = String::new();

    for (idx, block) in blocks.iter().enumerate() {
        let line_no = idx + 1;
        if block.addr >= MEMORY_SIZE as u32 {
            return Err(Error::format(
                file,
                line_no,
                0,
                "address does not fit a single-segment record",
            ));
        }
        if block.data.len() > 0xFF {
            return Err(Error::format(
                file,
                line_no,
                0,
                "record data is longer than 255 bytes",
            ));
        }

        let mut record = Vec::with_capacity(block.data.len() + 5);
        record.push(block.data.len() as u8);
        record.push((block.addr >> 8) as u8);
        record.push((block.addr & 0xFF) as u8);
        record.push(0);
        record.extend_from_slice(&block.data);

        let sum = record.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        record.push(0u8.wrapping_sub(sum));

        out.push(':');
        for b in &record {
            out.push_str(&format!("{b:02X}"));
        }
        out.push('\n');
    }

    out.push_str(":00000001FF\n");
    Ok(out)
}

/// Parse and group a hex file into upload-ready blocks for `kind`.
pub fn read_hex_file(path: impl AsRef<Path>, kind: MemoryKind) -> Result<Vec<HexRecord>> {
    let path = path.as_ref();
    let file = path.display().to_string();
    let text = fs::read_to_string(path)?;
    let entries = parse_records(&text, &file)?;
    group_records(&entries, kind, &file)
}

/// Serialize blocks to a hex file on disk.
pub fn write_hex_file(path: impl AsRef<Path>, blocks: &[HexRecord]) -> Result<()> {
    let path = path.as_ref();
    let text = write_records(blocks, &path.display().to_string())?;
    fs::write(path, text)?;
    Ok(())
}
