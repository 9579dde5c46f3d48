//! Webfont transcoding – unpacks a WOFF container into the raw sfnt bytes a
//! document backend can embed directly.
//!
//! The container is a compressed wrapper around an ordinary sfnt: a header,
//! a table directory, and per-table data that is zlib-deflated whenever that
//! made it smaller. Transcoding rebuilds the sfnt offset table and writes
//! every table back out decompressed at a 4-byte-aligned offset.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::error::{Error, Result};

/// 'wOFF' container signature.
const WOFF_SIGNATURE: u32 = 0x774F_4646;
/// Container header length in bytes.
const HEADER_LEN: usize = 44;
/// Container table-directory entry length in bytes.
const DIR_ENTRY_LEN: usize = 20;

/// True when `bytes` starts with the WOFF container signature.
pub fn is_woff(bytes: &[u8]) -> bool {
    matches!(read_u32(bytes, 0), Ok(v) if v == WOFF_SIGNATURE)
}

struct TableEntry {
    tag: u32,
    offset: u32,
    comp_length: u32,
    orig_length: u32,
    orig_checksum: u32,
}

/// Transcode a WOFF container into raw embeddable sfnt bytes.
///
/// Fails with [`Error::FontFormat`] on a signature mismatch, a truncated
/// directory, or table data that does not decompress to its declared
/// original length. No partial output is ever produced.
pub fn transcode(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::FontFormat(format!(
            "container too short: {} bytes",
            bytes.len()
        )));
    }
    let signature = read_u32(bytes, 0)?;
    if signature != WOFF_SIGNATURE {
        return Err(Error::FontFormat(format!(
            "bad container signature {signature:#010x}"
        )));
    }

    let flavor = read_u32(bytes, 4)?;
    let num_tables = read_u16(bytes, 12)? as usize;
    if num_tables == 0 {
        return Err(Error::FontFormat("container holds no tables".to_string()));
    }

    let mut entries = Vec::with_capacity(num_tables);
    for i in 0..num_tables {
        let base = HEADER_LEN + i * DIR_ENTRY_LEN;
        entries.push(TableEntry {
            tag: read_u32(bytes, base)?,
            offset: read_u32(bytes, base + 4)?,
            comp_length: read_u32(bytes, base + 8)?,
            orig_length: read_u32(bytes, base + 12)?,
            orig_checksum: read_u32(bytes, base + 16)?,
        });
    }

    // sfnt offset table: searchRange/entrySelector/rangeShift derive from
    // the largest power of two not exceeding the table count.
    let mut max_pow2 = 1u16;
    let mut entry_selector = 0u16;
    while (max_pow2 << 1) as usize <= num_tables {
        max_pow2 <<= 1;
        entry_selector += 1;
    }
    let search_range = max_pow2 * 16;
    let range_shift = num_tables as u16 * 16 - search_range;

    let mut out = Vec::new();
    out.extend_from_slice(&flavor.to_be_bytes());
    out.extend_from_slice(&(num_tables as u16).to_be_bytes());
    out.extend_from_slice(&search_range.to_be_bytes());
    out.extend_from_slice(&entry_selector.to_be_bytes());
    out.extend_from_slice(&range_shift.to_be_bytes());

    // Directory placeholder; patched once table offsets are known.
    let dir_start = out.len();
    out.resize(dir_start + num_tables * 16, 0);

    let mut data_offset = out.len();
    for (i, entry) in entries.iter().enumerate() {
        let data = table_data(bytes, entry)?;

        // Running offset, 4-byte aligned; pad with zeros.
        while out.len() % 4 != 0 {
            out.push(0);
            data_offset += 1;
        }
        out.extend_from_slice(&data);

        let dir = dir_start + i * 16;
        out[dir..dir + 4].copy_from_slice(&entry.tag.to_be_bytes());
        out[dir + 4..dir + 8].copy_from_slice(&entry.orig_checksum.to_be_bytes());
        out[dir + 8..dir + 12].copy_from_slice(&(data_offset as u32).to_be_bytes());
        out[dir + 12..dir + 16].copy_from_slice(&entry.orig_length.to_be_bytes());

        data_offset += data.len();
    }

    Ok(out)
}

/// Extract one table's decompressed bytes from the container.
fn table_data(bytes: &[u8], entry: &TableEntry) -> Result<Vec<u8>> {
    let start = entry.offset as usize;
    let end = start
        .checked_add(entry.comp_length as usize)
        .ok_or_else(|| Error::FontFormat("table extent overflows".to_string()))?;
    let raw = bytes
        .get(start..end)
        .ok_or_else(|| Error::FontFormat(format!("table {:#010x} out of bounds", entry.tag)))?;

    // A table is stored deflated only when that made it smaller.
    if entry.comp_length < entry.orig_length {
        let mut data = Vec::with_capacity(entry.orig_length as usize);
        ZlibDecoder::new(raw)
            .read_to_end(&mut data)
            .map_err(|e| Error::FontFormat(format!("table inflate failed: {e}")))?;
        if data.len() != entry.orig_length as usize {
            return Err(Error::FontFormat(format!(
                "table {:#010x} inflated to {} bytes, directory says {}",
                entry.tag,
                data.len(),
                entry.orig_length
            )));
        }
        Ok(data)
    } else {
        Ok(raw.to_vec())
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| Error::FontFormat(format!("truncated at byte {at}")))
}

fn read_u16(bytes: &[u8], at: usize) -> Result<u16> {
    bytes
        .get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| Error::FontFormat(format!("truncated at byte {at}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    /// Build a minimal WOFF container around the given (tag, data) tables,
    /// compressing each table only when that makes it smaller.
    fn build_woff(tables: &[(u32, Vec<u8>)]) -> Vec<u8> {
        let mut dir = Vec::new();
        let mut payload = Vec::new();
        let data_start = HEADER_LEN + tables.len() * DIR_ENTRY_LEN;

        for (tag, data) in tables {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(data).unwrap();
            let compressed = enc.finish().unwrap();
            let stored = if compressed.len() < data.len() {
                compressed
            } else {
                data.clone()
            };

            dir.extend_from_slice(&tag.to_be_bytes());
            dir.extend_from_slice(&((data_start + payload.len()) as u32).to_be_bytes());
            dir.extend_from_slice(&(stored.len() as u32).to_be_bytes());
            dir.extend_from_slice(&(data.len() as u32).to_be_bytes());
            dir.extend_from_slice(&0xDEAD_BEEFu32.to_be_bytes());
            payload.extend_from_slice(&stored);
        }

        let mut out = Vec::new();
        out.extend_from_slice(&WOFF_SIGNATURE.to_be_bytes());
        out.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // flavor
        out.extend_from_slice(&0u32.to_be_bytes()); // length (unused here)
        out.extend_from_slice(&(tables.len() as u16).to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // reserved
        out.resize(HEADER_LEN, 0);
        out.extend_from_slice(&dir);
        out.extend_from_slice(&payload);
        out
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = build_woff(&[(u32::from_be_bytes(*b"cmap"), vec![1, 2, 3, 4])]);
        bytes[0] = b'X';
        match transcode(&bytes) {
            Err(Error::FontFormat(_)) => {}
            other => panic!("expected FontFormat, got {other:?}"),
        }
    }

    #[test]
    fn rejects_truncated_container() {
        assert!(matches!(transcode(&[0u8; 10]), Err(Error::FontFormat(_))));
    }

    #[test]
    fn roundtrip_preserves_table_lengths() {
        // One highly compressible table, one that stays stored raw.
        let glyf = vec![7u8; 4096];
        let cmap = vec![0, 1, 2, 3, 4, 5, 6];
        let woff = build_woff(&[
            (u32::from_be_bytes(*b"glyf"), glyf.clone()),
            (u32::from_be_bytes(*b"cmap"), cmap.clone()),
        ]);

        let sfnt = transcode(&woff).unwrap();

        // Offset table header.
        assert_eq!(&sfnt[0..4], &0x0001_0000u32.to_be_bytes());
        assert_eq!(u16::from_be_bytes([sfnt[4], sfnt[5]]), 2);
        let search_range = u16::from_be_bytes([sfnt[6], sfnt[7]]);
        let entry_selector = u16::from_be_bytes([sfnt[8], sfnt[9]]);
        let range_shift = u16::from_be_bytes([sfnt[10], sfnt[11]]);
        assert_eq!(search_range, 32);
        assert_eq!(entry_selector, 1);
        assert_eq!(range_shift, 0);

        // Each directory entry points at data of the original length.
        for i in 0..2 {
            let dir = 12 + i * 16;
            let offset =
                u32::from_be_bytes([sfnt[dir + 8], sfnt[dir + 9], sfnt[dir + 10], sfnt[dir + 11]])
                    as usize;
            let length =
                u32::from_be_bytes([sfnt[dir + 12], sfnt[dir + 13], sfnt[dir + 14], sfnt[dir + 15]])
                    as usize;
            assert_eq!(offset % 4, 0, "table data must be 4-byte aligned");
            let expected: &[u8] = if i == 0 { &glyf } else { &cmap };
            assert_eq!(length, expected.len());
            assert_eq!(&sfnt[offset..offset + length], expected);
        }
    }

    #[test]
    fn sniffs_signature() {
        assert!(is_woff(&build_woff(&[(1, vec![0u8; 8])])));
        assert!(!is_woff(b"OTTO rest"));
        assert!(!is_woff(b"wO"));
    }
}
