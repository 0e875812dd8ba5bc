//! Backing Arena (spec §4.1): an auto-growing mapped-memory region with
//! handle/address translation and a growth-retry wrapper around allocation
//! failures.
//!
//! Grounded on `original_source/include/osm_store.h`'s
//! `perform_mmap_operation`/`managed_external_buffer` pair, reworked into
//! safe Rust: instead of raw pointers that `grow` can invalidate, callers
//! only ever hold [`Handle`] (a byte offset), which survives growth by
//! construction.

use crate::error::StoreError;
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Default initial arena size (spec §4.1).
pub const DEFAULT_INITIAL_SIZE: u64 = 1 << 30;
/// Growth becomes additive rather than multiplicative once the arena
/// crosses this size.
const DOUBLING_CAP: u64 = 8 * (1 << 30);
/// Number of failed growth attempts after which `OutOfSpace` is fatal.
const MAX_GROWTH_ATTEMPTS: u32 = 8;

/// An opaque, stable reference into the arena. Survives `grow`; does not
/// survive `clear`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    pub fn offset(self) -> u64 {
        self.0
    }

    /// Reconstructs a handle from a previously observed offset, for callers
    /// (e.g. the persistence layer) that round-trip handles through a
    /// different storage medium instead of minting them via [`Arena::alloc`].
    pub fn from_offset(offset: u64) -> Handle {
        Handle(offset)
    }
}

enum Backing {
    Heap(Vec<u8>),
    File {
        file: std::fs::File,
        mmap: MmapMut,
        path: PathBuf,
    },
}

/// The backing arena. Bump-allocates byte regions and grows on demand
/// under the protocol described in spec §4.1.
pub struct Arena {
    backing: Backing,
    len: u64,
    capacity: u64,
}

impl Arena {
    /// Creates a heap-backed arena.
    pub fn new_heap(initial_size: u64) -> Arena {
        Arena {
            backing: Backing::Heap(vec![0u8; initial_size as usize]),
            len: 0,
            capacity: initial_size,
        }
    }

    /// Creates a file-backed arena. The file is created empty and
    /// truncated to `initial_size`; it is truncated further on growth.
    pub fn new_file(path: &Path, initial_size: u64) -> Result<Arena, StoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(initial_size)?;
        let mmap = unsafe { MmapOptions::new().len(initial_size as usize).map_mut(&file)? };
        Ok(Arena {
            backing: Backing::File {
                file,
                mmap,
                path: path.to_path_buf(),
            },
            len: 0,
            capacity: initial_size,
        })
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.len
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn as_slice(&self) -> &[u8] {
        match &self.backing {
            Backing::Heap(v) => v,
            Backing::File { mmap, .. } => mmap,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.backing {
            Backing::Heap(v) => v,
            Backing::File { mmap, .. } => mmap,
        }
    }

    /// Reserves `additional` bytes past the current high-water mark,
    /// growing the arena if necessary, up to `MAX_GROWTH_ATTEMPTS` times.
    pub fn ensure_capacity(&mut self, additional: u64) -> Result<(), StoreError> {
        let mut attempts = 0;
        while self.len.checked_add(additional).map_or(true, |needed| needed > self.capacity) {
            if attempts >= MAX_GROWTH_ATTEMPTS {
                return Err(StoreError::OutOfSpace(attempts));
            }
            self.grow()?;
            attempts += 1;
        }
        Ok(())
    }

    fn grow(&mut self) -> Result<(), StoreError> {
        let increment = if self.capacity < DOUBLING_CAP {
            self.capacity.max(1)
        } else {
            DOUBLING_CAP
        };
        let new_capacity = self.capacity + increment;
        match &mut self.backing {
            Backing::Heap(v) => {
                v.resize(new_capacity as usize, 0);
            }
            Backing::File { file, path, .. } => {
                file.set_len(new_capacity)?;
                file.seek(SeekFrom::Start(0))?;
                let mmap = unsafe { MmapOptions::new().len(new_capacity as usize).map_mut(&*file)? };
                self.backing = Backing::File {
                    file: OpenOptions::new().read(true).write(true).open(&path)?,
                    mmap,
                    path: path.clone(),
                };
            }
        }
        self.capacity = new_capacity;
        Ok(())
    }

    /// Bump-allocates `bytes.len()` bytes, writes `bytes` into them, and
    /// returns a [`Handle`] to the start of the region. Growth happens
    /// transparently via [`ensure_capacity`](Self::ensure_capacity); root
    /// handles held by callers are unaffected since `Handle` is an offset,
    /// not a pointer ("reopen" is a no-op in this representation).
    pub fn alloc(&mut self, bytes: &[u8]) -> Result<Handle, StoreError> {
        self.ensure_capacity(bytes.len() as u64)?;
        let offset = self.len;
        let start = offset as usize;
        let end = start + bytes.len();
        self.as_mut_slice()[start..end].copy_from_slice(bytes);
        self.len += bytes.len() as u64;
        Ok(Handle(offset))
    }

    /// Reads back `len` bytes starting at `handle`.
    pub fn read(&self, handle: Handle, len: usize) -> &[u8] {
        let start = handle.offset() as usize;
        &self.as_slice()[start..start + len]
    }

    /// Flushes a file-backed arena to disk. No-op for heap-backed arenas.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if let Backing::File { mmap, .. } = &mut self.backing {
            mmap.flush()?;
        }
        Ok(())
    }
}

impl Write for Arena {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.alloc(buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Arena::flush(self).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    }
}
