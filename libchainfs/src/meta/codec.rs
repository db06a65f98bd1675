//! Binary layout of the metadata region.
//!
//! Records are written in slot order, directory first:
//!
//! ```text
//! entry (15 bytes): name[11] NUL-padded | size: i16 BE | first_link: i16 BE
//! node  (4 bytes):  data_block: i16 BE  | next: i16 BE
//! ```
//!
//! 16 entries + 64 nodes = 496 bytes, zero-padded to 4 whole blocks.

use super::{ChainNode, FileEntry, LinkId, MetaTables};
use crate::error::{FsError, Result};
use crate::layout::{
    ENTRY_RECORD_LEN, MAX_BLOCKS, MAX_FILE_ENTRIES, METADATA_LEN, METADATA_REGION_LEN, NAME_LEN,
    NODE_RECORD_LEN,
};

/// On-disk sentinel for "no link", "free node" and "end of chain".
const NONE: i16 = -1;

/// Encode both tables into a buffer of exactly `METADATA_REGION_LEN` bytes.
pub fn encode(tables: &MetaTables) -> Vec<u8> {
    let mut buf = Vec::with_capacity(METADATA_REGION_LEN);
    for slot in &tables.dir.slots {
        encode_entry(&mut buf, slot.as_ref());
    }
    for node in &tables.chain.nodes {
        let (data_block, next) = match *node {
            ChainNode::Free => (NONE, NONE),
            ChainNode::Used { data_block, next } => (data_block as i16, link_to_raw(next)),
        };
        buf.extend_from_slice(&data_block.to_be_bytes());
        buf.extend_from_slice(&next.to_be_bytes());
    }
    debug_assert_eq!(buf.len(), METADATA_LEN);
    buf.resize(METADATA_REGION_LEN, 0);
    buf
}

fn encode_entry(buf: &mut Vec<u8>, entry: Option<&FileEntry>) {
    let mut name = [0u8; NAME_LEN];
    let (size, first) = match entry {
        Some(e) => {
            let bytes = e.name.as_bytes();
            let n = bytes.len().min(NAME_LEN);
            name[..n].copy_from_slice(&bytes[..n]);
            (e.size as i16, link_to_raw(e.first_link))
        }
        None => (0, NONE),
    };
    buf.extend_from_slice(&name);
    buf.extend_from_slice(&size.to_be_bytes());
    buf.extend_from_slice(&first.to_be_bytes());
}

fn link_to_raw(link: Option<LinkId>) -> i16 {
    link.map_or(NONE, |l| l as i16)
}

/// Decode a metadata region. `buf` must be exactly `METADATA_REGION_LEN` bytes.
pub fn decode(buf: &[u8]) -> Result<MetaTables> {
    if buf.len() != METADATA_REGION_LEN {
        return Err(FsError::InvalidArgument(format!(
            "metadata region must be {METADATA_REGION_LEN} bytes, got {}",
            buf.len()
        )));
    }
    let (entries, rest) = buf.split_at(MAX_FILE_ENTRIES * ENTRY_RECORD_LEN);
    let nodes = &rest[..MAX_BLOCKS * NODE_RECORD_LEN];

    let mut tables = MetaTables::default();
    for (slot, record) in entries.chunks_exact(ENTRY_RECORD_LEN).enumerate() {
        tables.dir.slots[slot] = decode_entry(slot, record)?;
    }
    for (idx, record) in nodes.chunks_exact(NODE_RECORD_LEN).enumerate() {
        let data_block = read_i16(&record[0..2]);
        if data_block < 0 {
            continue;
        }
        if data_block as usize >= MAX_BLOCKS {
            return Err(FsError::CorruptMetadata(format!(
                "node {idx} points at data block {data_block}"
            )));
        }
        let next = raw_to_link(read_i16(&record[2..4]))
            .map_err(|raw| FsError::CorruptMetadata(format!("node {idx} has next link {raw}")))?;
        tables.chain.nodes[idx] = ChainNode::Used {
            data_block: data_block as u16,
            next,
        };
    }
    Ok(tables)
}

fn decode_entry(slot: usize, record: &[u8]) -> Result<Option<FileEntry>> {
    let name = String::from_utf8_lossy(&record[..NAME_LEN]);
    let name = name.trim_matches(|c: char| c == '\0' || c.is_ascii_whitespace());
    if name.is_empty() {
        return Ok(None);
    }
    let size = read_i16(&record[NAME_LEN..NAME_LEN + 2]);
    if size < 0 {
        return Err(FsError::CorruptMetadata(format!(
            "entry {slot} ({name}) has negative size {size}"
        )));
    }
    let first_link = raw_to_link(read_i16(&record[NAME_LEN + 2..NAME_LEN + 4])).map_err(|raw| {
        FsError::CorruptMetadata(format!("entry {slot} ({name}) has first link {raw}"))
    })?;
    Ok(Some(FileEntry {
        name: name.to_string(),
        size: size as u16,
        first_link,
    }))
}

fn raw_to_link(raw: i16) -> std::result::Result<Option<LinkId>, i16> {
    match raw {
        NONE => Ok(None),
        r if r >= 0 && (r as usize) < MAX_BLOCKS => Ok(Some(r as LinkId)),
        r => Err(r),
    }
}

fn read_i16(bytes: &[u8]) -> i16 {
    i16::from_be_bytes([bytes[0], bytes[1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MetaTables {
        let mut tables = MetaTables::default();
        tables.dir.slots[0] = Some(FileEntry {
            name: "a.txt".into(),
            size: 300,
            first_link: Some(0),
        });
        tables.dir.slots[3] = Some(FileEntry::new("empty"));
        tables.chain.nodes[0] = ChainNode::Used {
            data_block: 0,
            next: Some(1),
        };
        tables.chain.nodes[1] = ChainNode::Used {
            data_block: 1,
            next: Some(5),
        };
        tables.chain.nodes[5] = ChainNode::Used {
            data_block: 5,
            next: None,
        };
        tables
    }

    #[test]
    fn test_empty_tables_layout() {
        let buf = encode(&MetaTables::default());
        assert_eq!(buf.len(), 512);
        // Free entry: zero name, size 0, first link -1.
        assert_eq!(&buf[..15], &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff]);
        // Free node: -1, -1.
        assert_eq!(&buf[240..244], &[0xff; 4]);
        assert!(buf[496..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_entry_and_node_byte_layout() {
        let buf = encode(&sample());
        assert_eq!(&buf[..5], b"a.txt");
        assert_eq!(&buf[5..11], &[0u8; 6]);
        assert_eq!(&buf[11..13], &300i16.to_be_bytes());
        assert_eq!(&buf[13..15], &[0, 0]);
        // node 1 -> next 5
        let node1 = 240 + 4;
        assert_eq!(&buf[node1..node1 + 4], &[0, 1, 0, 5]);
        // node 5 -> end
        let node5 = 240 + 5 * 4;
        assert_eq!(&buf[node5..node5 + 4], &[0, 5, 0xff, 0xff]);
    }

    #[test]
    fn test_decode_restores_tables() {
        let tables = sample();
        assert_eq!(decode(&encode(&tables)).unwrap(), tables);
    }

    #[test]
    fn test_decode_trims_padded_names() {
        let mut buf = encode(&MetaTables::default());
        buf[..11].copy_from_slice(b"notes      ");
        buf[13..15].copy_from_slice(&NONE.to_be_bytes());
        let tables = decode(&buf).unwrap();
        assert_eq!(tables.dir.slots[0].as_ref().unwrap().name, "notes");
    }

    #[test]
    fn test_blank_name_is_free_slot() {
        let mut buf = encode(&MetaTables::default());
        buf[..11].copy_from_slice(b"           ");
        buf[11..13].copy_from_slice(&42i16.to_be_bytes());
        assert!(decode(&buf).unwrap().dir.slots[0].is_none());
    }

    #[test]
    fn test_decode_rejects_out_of_range_links() {
        let mut buf = encode(&sample());
        buf[13..15].copy_from_slice(&64i16.to_be_bytes());
        assert!(matches!(decode(&buf), Err(FsError::CorruptMetadata(_))));

        let mut buf = encode(&sample());
        let node0 = 240;
        buf[node0..node0 + 2].copy_from_slice(&100i16.to_be_bytes());
        assert!(matches!(decode(&buf), Err(FsError::CorruptMetadata(_))));
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert!(matches!(
            decode(&[0u8; 496]),
            Err(FsError::InvalidArgument(_))
        ));
    }
}
