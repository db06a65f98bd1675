//! Block allocation and chain management
//!
//! Responsibilities:
//! - Find free chain nodes (lowest index first) and link them into a new chain.
//! - Walk an existing chain from its head, refusing cycles and dangling links.
//! - Release a chain's nodes back to the free pool.
//!
//! Data movement lives in the submodules:
//! - `writer`: spread a payload over a chain's data blocks
//! - `reader`: gather a file's bytes back from its chain

pub mod reader;
pub mod writer;

pub use reader::ChainReader;
pub use writer::ChainWriter;

use crate::error::{FsError, Result};
use crate::layout::MAX_BLOCKS;
use crate::meta::{ChainNode, ChainTable, LinkId};

/// One resolved link of a file's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink {
    pub link: LinkId,
    pub data_block: u16,
}

impl ChainTable {
    /// Free nodes usable in a container with `capacity` data blocks, in index order.
    pub fn free_nodes(&self, capacity: usize) -> impl Iterator<Item = LinkId> + '_ {
        self.nodes
            .iter()
            .take(capacity)
            .enumerate()
            .filter(|(_, node)| !node.is_used())
            .map(|(idx, _)| idx as LinkId)
    }

    pub fn free_count(&self, capacity: usize) -> usize {
        self.free_nodes(capacity).count()
    }

    /// Claim `required` free nodes and link them into a chain.
    ///
    /// Nothing is modified unless all nodes can be claimed. Each node's data
    /// block is its own index.
    pub fn allocate(&mut self, required: usize, capacity: usize) -> Result<Vec<ChainLink>> {
        let picked: Vec<LinkId> = self.free_nodes(capacity).take(required).collect();
        if picked.len() < required {
            return Err(FsError::InsufficientSpace {
                required,
                available: self.free_count(capacity),
            });
        }
        let links = picked
            .iter()
            .enumerate()
            .map(|(i, &link)| {
                self.nodes[link as usize] = ChainNode::Used {
                    data_block: link,
                    next: picked.get(i + 1).copied(),
                };
                ChainLink {
                    link,
                    data_block: link,
                }
            })
            .collect();
        Ok(links)
    }

    /// Resolve the chain starting at `first`.
    ///
    /// Fails with `CorruptMetadata` if the chain revisits a node, runs into a
    /// free node, or leaves the table.
    pub fn walk(&self, first: Option<LinkId>) -> Result<Vec<ChainLink>> {
        let mut links = Vec::new();
        let mut seen: u64 = 0;
        let mut cur = first;
        while let Some(link) = cur {
            let idx = link as usize;
            if idx >= MAX_BLOCKS {
                return Err(FsError::CorruptMetadata(format!(
                    "chain link {link} is outside the table"
                )));
            }
            if seen & (1u64 << idx) != 0 {
                return Err(FsError::CorruptMetadata(format!(
                    "chain revisits node {link}"
                )));
            }
            seen |= 1u64 << idx;
            match self.nodes[idx] {
                ChainNode::Used { data_block, next } => {
                    links.push(ChainLink { link, data_block });
                    cur = next;
                }
                ChainNode::Free => {
                    return Err(FsError::CorruptMetadata(format!(
                        "chain reaches free node {link}"
                    )));
                }
            }
        }
        Ok(links)
    }

    /// Return every node of `links` to the free pool.
    pub fn release(&mut self, links: &[ChainLink]) {
        for link in links {
            self.nodes[link.link as usize] = ChainNode::Free;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_lowest_index_first() {
        let mut table = ChainTable::default();
        table.nodes[1] = ChainNode::Used {
            data_block: 1,
            next: None,
        };
        let links = table.allocate(3, MAX_BLOCKS).unwrap();
        let ids: Vec<_> = links.iter().map(|l| l.link).collect();
        assert_eq!(ids, vec![0, 2, 3]);
        assert_eq!(
            table.nodes[0],
            ChainNode::Used {
                data_block: 0,
                next: Some(2)
            }
        );
        assert_eq!(
            table.nodes[3],
            ChainNode::Used {
                data_block: 3,
                next: None
            }
        );
        assert_eq!(table.walk(Some(0)).unwrap(), links);
    }

    #[test]
    fn test_allocate_is_all_or_nothing() {
        let mut table = ChainTable::default();
        table.allocate(60, MAX_BLOCKS).unwrap();
        let before = table.clone();
        let err = table.allocate(5, MAX_BLOCKS).unwrap_err();
        assert!(matches!(
            err,
            FsError::InsufficientSpace {
                required: 5,
                available: 4
            }
        ));
        assert_eq!(table, before);
    }

    #[test]
    fn test_allocate_respects_capacity() {
        let mut table = ChainTable::default();
        assert_eq!(table.free_count(10), 10);
        assert!(table.allocate(11, 10).is_err());
        let links = table.allocate(10, 10).unwrap();
        assert!(links.iter().all(|l| l.link < 10));
    }

    #[test]
    fn test_release_frees_nodes() {
        let mut table = ChainTable::default();
        let links = table.allocate(4, MAX_BLOCKS).unwrap();
        assert_eq!(table.free_count(MAX_BLOCKS), MAX_BLOCKS - 4);
        table.release(&links);
        assert_eq!(table.free_count(MAX_BLOCKS), MAX_BLOCKS);
    }

    #[test]
    fn test_walk_empty_chain() {
        assert!(ChainTable::default().walk(None).unwrap().is_empty());
    }

    #[test]
    fn test_walk_detects_cycle() {
        let mut table = ChainTable::default();
        table.nodes[0] = ChainNode::Used {
            data_block: 0,
            next: Some(1),
        };
        table.nodes[1] = ChainNode::Used {
            data_block: 1,
            next: Some(0),
        };
        assert!(matches!(
            table.walk(Some(0)),
            Err(FsError::CorruptMetadata(_))
        ));
    }

    #[test]
    fn test_walk_detects_dangling_link() {
        let mut table = ChainTable::default();
        table.nodes[0] = ChainNode::Used {
            data_block: 0,
            next: Some(9),
        };
        assert!(matches!(
            table.walk(Some(0)),
            Err(FsError::CorruptMetadata(_))
        ));
    }
}
