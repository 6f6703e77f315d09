//! Chunked index-linked storage for grammar components
//!
//! Declarations and content-spec nodes live in fixed-size chunks addressed
//! by typed integer handles. Growing the arena never moves existing chunks,
//! only the chunk table, whose capacity doubles on overflow.

use std::fmt;
use std::marker::PhantomData;

use crate::error::{Error, Result};

/// log2 of the number of slots per chunk
pub const CHUNK_SHIFT: usize = 8;
/// Number of slots per chunk
pub const CHUNK_SIZE: usize = 1 << CHUNK_SHIFT;
const CHUNK_MASK: usize = CHUNK_SIZE - 1;
const INITIAL_CHUNK_TABLE: usize = 4;

/// Typed handle into a [`ChunkedArena`]
pub trait ArenaIndex: Copy + Eq + fmt::Debug {
    /// Build a handle from a raw slot number
    fn from_raw(raw: u32) -> Self;
    /// Raw slot number
    fn raw(self) -> u32;
}

macro_rules! arena_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Slot number as usize
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl ArenaIndex for $name {
            fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

arena_index!(
    /// Handle of a content-spec node
    ContentSpecIndex
);
arena_index!(
    /// Handle of an element declaration
    ElementIndex
);
arena_index!(
    /// Handle of an attribute declaration
    AttributeIndex
);
arena_index!(
    /// Handle of an identity constraint
    IdentityIndex
);

/// Growable arena of fixed-size chunks
#[derive(Clone)]
pub struct ChunkedArena<I: ArenaIndex, T> {
    chunks: Vec<Vec<T>>,
    len: usize,
    _index: PhantomData<I>,
}

impl<I: ArenaIndex, T> ChunkedArena<I, T> {
    /// Create an empty arena
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            len: 0,
            _index: PhantomData,
        }
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the arena is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of allocated chunks
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Capacity of the chunk table
    pub fn chunk_table_capacity(&self) -> usize {
        self.chunks.capacity()
    }

    /// Append a value and return its handle.
    ///
    /// Fails with [`Error::Capacity`] when the chunk table or a new chunk
    /// cannot be allocated, or when the handle space is exhausted.
    pub fn push(&mut self, value: T) -> Result<I> {
        let raw = u32::try_from(self.len)
            .map_err(|_| Error::Capacity("arena handle space exhausted".to_string()))?;
        let chunk = self.len >> CHUNK_SHIFT;

        if chunk == self.chunks.len() {
            if self.chunks.len() == self.chunks.capacity() {
                let additional = self.chunks.capacity().max(INITIAL_CHUNK_TABLE);
                self.chunks
                    .try_reserve_exact(additional)
                    .map_err(|e| Error::Capacity(format!("chunk table growth failed: {}", e)))?;
            }
            let mut block = Vec::new();
            block
                .try_reserve_exact(CHUNK_SIZE)
                .map_err(|e| Error::Capacity(format!("chunk allocation failed: {}", e)))?;
            self.chunks.push(block);
        }

        self.chunks[chunk].push(value);
        self.len += 1;
        Ok(I::from_raw(raw))
    }

    /// Get the value behind a handle
    pub fn get(&self, index: I) -> Option<&T> {
        let raw = index.raw() as usize;
        self.chunks
            .get(raw >> CHUNK_SHIFT)
            .and_then(|chunk| chunk.get(raw & CHUNK_MASK))
    }

    /// Get the value behind a handle mutably
    pub fn get_mut(&mut self, index: I) -> Option<&mut T> {
        let raw = index.raw() as usize;
        self.chunks
            .get_mut(raw >> CHUNK_SHIFT)
            .and_then(|chunk| chunk.get_mut(raw & CHUNK_MASK))
    }

    /// Get the value behind a handle, reporting a dangling handle as an
    /// internal error
    pub fn require(&self, index: I) -> Result<&T> {
        self.get(index)
            .ok_or_else(|| Error::Internal(format!("dangling arena handle {:?}", index)))
    }

    /// Iterate handles and values in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.chunks
            .iter()
            .flat_map(|chunk| chunk.iter())
            .enumerate()
            .map(|(raw, value)| (I::from_raw(raw as u32), value))
    }
}

impl<I: ArenaIndex, T> Default for ChunkedArena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaIndex, T: fmt::Debug> fmt::Debug for ChunkedArena<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
