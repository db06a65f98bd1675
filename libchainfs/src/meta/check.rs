use super::{ChainNode, LinkId, MetaTables};
use crate::error::{FsError, Result};
use crate::layout::required_blocks;
use std::collections::HashSet;

impl MetaTables {
    /// Verify the invariants that tie the directory to the chain table.
    ///
    /// `capacity` is the number of chain nodes whose data block exists in the
    /// container. Returns the first violation found as `CorruptMetadata`.
    pub fn check(&self, capacity: usize) -> Result<()> {
        let mut names = HashSet::new();
        let mut owned: u64 = 0;

        for (slot, entry) in self.dir.slots.iter().enumerate() {
            let Some(entry) = entry else { continue };
            if !names.insert(entry.name.as_str()) {
                return Err(corrupt(format!("name {} appears twice", entry.name)));
            }

            let links = self.chain.walk(entry.first_link)?;
            if links.is_empty() {
                if entry.size != 0 {
                    return Err(corrupt(format!(
                        "entry {slot} ({}) has size {} but no blocks",
                        entry.name, entry.size
                    )));
                }
                continue;
            }
            let expected = required_blocks(entry.size as usize);
            if links.len() != expected {
                return Err(corrupt(format!(
                    "entry {slot} ({}) has {} blocks for {} bytes, expected {expected}",
                    entry.name,
                    links.len(),
                    entry.size
                )));
            }
            for link in links {
                let bit = 1u64 << link.link;
                if owned & bit != 0 {
                    return Err(corrupt(format!(
                        "node {} is shared by more than one file",
                        link.link
                    )));
                }
                owned |= bit;
            }
        }

        for (idx, node) in self.chain.nodes.iter().enumerate() {
            let ChainNode::Used { data_block, .. } = *node else {
                continue;
            };
            if data_block as usize != idx {
                return Err(corrupt(format!(
                    "node {idx} maps to data block {data_block}"
                )));
            }
            if idx >= capacity {
                return Err(corrupt(format!(
                    "node {idx} is beyond the container's {capacity} data blocks"
                )));
            }
            if owned & (1u64 << idx) == 0 {
                return Err(corrupt(format!("node {idx} is used but owned by no file")));
            }
        }
        Ok(())
    }
}

impl MetaTables {
    /// Free every used node that no file's chain reaches and return the freed
    /// indices.
    ///
    /// A write that failed after claiming its nodes can leave such nodes on
    /// disk. Nothing is freed while any chain fails to walk, so `check` still
    /// reports the broken chain.
    pub fn reclaim_orphans(&mut self) -> Vec<LinkId> {
        let mut owned: u64 = 0;
        for entry in self.dir.slots.iter().flatten() {
            let Ok(links) = self.chain.walk(entry.first_link) else {
                return Vec::new();
            };
            for link in links {
                owned |= 1u64 << link.link;
            }
        }

        let mut reclaimed = Vec::new();
        for (idx, node) in self.chain.nodes.iter_mut().enumerate() {
            if node.is_used() && owned & (1u64 << idx) == 0 {
                *node = ChainNode::Free;
                reclaimed.push(idx as LinkId);
            }
        }
        reclaimed
    }
}

fn corrupt(msg: String) -> FsError {
    FsError::CorruptMetadata(msg)
}
