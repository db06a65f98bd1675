//! Directory and chain tables
//!
//! Both tables are fixed-capacity arenas: 16 directory slots and 64 chain
//! nodes. A slot's free/used state is part of the slot itself, and the "next"
//! relation between chain nodes is an index into the chain table.
//!
//! Submodules:
//! - `codec`: fixed-width big-endian encoding of both tables
//! - `check`: verification of the cross-table invariants and orphan reclaim

mod check;
mod codec;

pub use codec::{decode, encode};

use crate::layout::{MAX_BLOCKS, MAX_FILE_ENTRIES};

/// Index of a node in the chain table.
pub type LinkId = u16;

/// An occupied directory slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u16,
    pub first_link: Option<LinkId>,
}

impl FileEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            first_link: None,
        }
    }
}

/// One slot of the chain table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChainNode {
    #[default]
    Free,
    Used {
        /// Data-region block holding this link's bytes.
        data_block: u16,
        next: Option<LinkId>,
    },
}

impl ChainNode {
    pub fn is_used(&self) -> bool {
        matches!(self, Self::Used { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirTable {
    pub(crate) slots: [Option<FileEntry>; MAX_FILE_ENTRIES],
}

impl Default for DirTable {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainTable {
    pub(crate) nodes: [ChainNode; MAX_BLOCKS],
}

impl Default for ChainTable {
    fn default() -> Self {
        Self {
            nodes: [ChainNode::Free; MAX_BLOCKS],
        }
    }
}

/// Full in-memory snapshot of the metadata region.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetaTables {
    pub dir: DirTable,
    pub chain: ChainTable,
}
