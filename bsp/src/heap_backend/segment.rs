//! Memory-mapped persistent heap segment
//!
//! A heap is a single fixed-size file mapped once per session:
//!
//! ```text
//! [SegmentHeader 64B][DirectoryEntry 72B x slots][objects, 8-byte aligned ...]
//! ```
//!
//! Allocation is bump-only and never reuses space, and the mapping never
//! moves, so slices borrowed from a `&PersistentHeap` stay valid for as long
//! as the heap handle lives.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use bsp_core::validation::{align_to_8, validate_magic_bytes, validate_name};
use bsp_core::{BinsparseError, Result};
use bytemuck::{Pod, Zeroable};
use hashbrown::HashSet;
use memmap2::{Mmap, MmapMut};

use crate::config::HeapConfig;
use crate::io_error;

/// Magic bytes at the start of every heap file
pub const SEGMENT_MAGIC: [u8; 4] = *b"BSPH";

/// Layout version of the segment
pub const SEGMENT_VERSION: u32 = 1;

/// Longest object name, in bytes
pub const MAX_NAME_LEN: usize = 47;

/// Directory kind of string objects
pub const KIND_STRING: u32 = 1;

/// Fixed header at offset 0
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SegmentHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub capacity: u64,
    pub directory_offset: u64,
    pub directory_slots: u64,
    /// Bump pointer
    pub next_free: u64,
    pub reserved: [u8; 24],
}

impl SegmentHeader {
    pub const SIZE: usize = 64;
}

/// One named object
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DirectoryEntry {
    /// NUL-padded UTF-8
    pub name: [u8; 48],
    pub kind: u32,
    pub in_use: u32,
    pub offset: u64,
    pub size: u64,
}

impl DirectoryEntry {
    pub const SIZE: usize = 72;

    fn name(&self) -> &str {
        let end = self.name.iter().position(|b| *b == 0).unwrap_or(self.name.len());
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }
}

const _: () = assert!(size_of::<SegmentHeader>() == SegmentHeader::SIZE);
const _: () = assert!(size_of::<DirectoryEntry>() == DirectoryEntry::SIZE);

/// Plain-data object that can be stored under a name
pub trait HeapObject: Pod {
    /// Directory kind, checked on lookup
    const KIND: u32;
}

/// Directory listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub name: String,
    pub kind: u32,
    pub offset: u64,
    pub size: u64,
}

enum Mapping {
    Writable(MmapMut),
    ReadOnly(Mmap),
}

/// A reopenable, memory-mapped heap of named objects
///
/// Handles are single-threaded (`!Sync`). Concurrent mutation of the same
/// file from several handles or processes is not coordinated here.
pub struct PersistentHeap {
    path: PathBuf,
    location: String,
    mapping: Mapping,
    base: NonNull<u8>,
    len: usize,
    attached: RefCell<HashSet<u64>>,
}

impl std::fmt::Debug for PersistentHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentHeap")
            .field("path", &self.path)
            .field("len", &self.len)
            .field("writable", &self.is_writable())
            .finish()
    }
}

fn encode_name(name: &str) -> Result<[u8; 48]> {
    validate_name(name, MAX_NAME_LEN)?;
    let mut out = [0u8; 48];
    out[..name.len()].copy_from_slice(name.as_bytes());
    Ok(out)
}

impl PersistentHeap {
    /// Create a new heap file; fails with `AccessConflict` if it exists
    pub fn create<P: AsRef<Path>>(path: P, config: &HeapConfig) -> Result<Self> {
        let path = path.as_ref();
        let location = path.display().to_string();

        let slots = config.directory_slots as u64;
        let data_start = align_to_8(SegmentHeader::SIZE + config.directory_slots * DirectoryEntry::SIZE) as u64;
        if slots == 0 || config.capacity <= data_start {
            return Err(BinsparseError::invalid_argument(format!(
                "heap capacity {} cannot hold {} directory slots",
                config.capacity, config.directory_slots
            )));
        }
        if usize::try_from(config.capacity).is_err() {
            return Err(BinsparseError::invalid_argument(format!(
                "heap capacity {} exceeds the address space",
                config.capacity
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => BinsparseError::access_conflict(
                    location.as_str(),
                    "heap file already exists and create is create-only",
                ),
                _ => io_error(&location, e),
            })?;
        file.set_len(config.capacity)
            .map_err(|e| io_error(&location, e))?;

        // SAFETY: the file was just created by us and is not shared yet
        let mut mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|e| io_error(&location, e))?;
        let header = SegmentHeader {
            magic: SEGMENT_MAGIC,
            version: SEGMENT_VERSION,
            capacity: config.capacity,
            directory_offset: SegmentHeader::SIZE as u64,
            directory_slots: slots,
            next_free: data_start,
            reserved: [0; 24],
        };
        mmap[..SegmentHeader::SIZE].copy_from_slice(bytemuck::bytes_of(&header));

        tracing::debug!(
            path = %location,
            capacity = config.capacity,
            slots,
            "created persistent heap"
        );
        Self::from_mapping(path, location, Mapping::Writable(mmap))
    }

    /// Open an existing heap for reading and writing
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let location = path.display().to_string();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| io_error(&location, e))?;
        // SAFETY: concurrent modification by other processes is a caller error
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|e| io_error(&location, e))?;
        Self::from_mapping(path, location, Mapping::Writable(mmap))
    }

    /// Open an existing heap without write access; every mutation fails
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let location = path.display().to_string();
        let file = File::open(path).map_err(|e| io_error(&location, e))?;
        // SAFETY: concurrent modification by other processes is a caller error
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| io_error(&location, e))?;
        Self::from_mapping(path, location, Mapping::ReadOnly(mmap))
    }

    /// Delete a heap file; returns false if it did not exist
    pub fn remove<P: AsRef<Path>>(path: P) -> Result<bool> {
        let path = path.as_ref();
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(path.display().to_string(), e)),
        }
    }

    fn from_mapping(path: &Path, location: String, mut mapping: Mapping) -> Result<Self> {
        let (ptr, len) = match &mut mapping {
            Mapping::Writable(m) => (m.as_mut_ptr(), m.len()),
            Mapping::ReadOnly(m) => (m.as_ptr() as *mut u8, m.len()),
        };
        let base = NonNull::new(ptr).ok_or_else(|| {
            BinsparseError::io(location.as_str(), "memory map returned a null address")
        })?;

        let heap = Self {
            path: path.to_path_buf(),
            location,
            mapping,
            base,
            len,
            attached: RefCell::new(HashSet::new()),
        };
        heap.validate_layout()?;
        Ok(heap)
    }

    fn validate_layout(&self) -> Result<()> {
        if self.len < SegmentHeader::SIZE {
            return Err(BinsparseError::length_mismatch(
                self.location.as_str(),
                "header",
                SegmentHeader::SIZE,
                self.len,
            ));
        }
        let header = self.header()?;
        validate_magic_bytes(&self.location, &header.magic, &SEGMENT_MAGIC)?;

        let inconsistent = |expected: String, actual: String| BinsparseError::InconsistentFile {
            location: self.location.clone(),
            array: "header".into(),
            expected,
            actual,
        };
        if header.version != SEGMENT_VERSION {
            return Err(inconsistent(
                format!("segment version {SEGMENT_VERSION}"),
                header.version.to_string(),
            ));
        }
        if header.capacity != self.len as u64 {
            return Err(inconsistent(
                format!("capacity {}", self.len),
                header.capacity.to_string(),
            ));
        }
        let directory_end = header
            .directory_slots
            .checked_mul(DirectoryEntry::SIZE as u64)
            .and_then(|size| size.checked_add(header.directory_offset));
        match directory_end {
            Some(end) if end <= header.next_free && header.next_free <= header.capacity => Ok(()),
            _ => Err(inconsistent(
                "directory and bump pointer within capacity".into(),
                format!(
                    "{} slots at {}, next free {}",
                    header.directory_slots, header.directory_offset, header.next_free
                ),
            )),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.mapping, Mapping::Writable(_))
    }

    /// Total size of the heap file
    pub fn capacity(&self) -> u64 {
        self.len as u64
    }

    /// Bytes handed out so far, header and directory included
    pub fn used(&self) -> Result<u64> {
        Ok(self.header()?.next_free)
    }

    pub(crate) fn location(&self) -> &str {
        &self.location
    }

    fn header(&self) -> Result<SegmentHeader> {
        self.read_pod(0)
    }

    fn ensure_writable(&self) -> Result<()> {
        if !self.is_writable() {
            return Err(BinsparseError::access_conflict(
                self.location.as_str(),
                "heap is open read-only",
            ));
        }
        Ok(())
    }

    fn range(&self, offset: u64, len: u64) -> Result<(usize, usize)> {
        let end = offset.checked_add(len).filter(|end| *end <= self.len as u64);
        match end {
            Some(end) => Ok((offset as usize, end as usize)),
            None => Err(BinsparseError::InconsistentFile {
                location: self.location.clone(),
                array: "segment".into(),
                expected: format!("range within {} bytes", self.len),
                actual: format!("offset {offset}, length {len}"),
            }),
        }
    }

    fn bytes(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let (start, end) = self.range(offset, len)?;
        // SAFETY: the range lies inside the mapping, which lives as long as self
        Ok(unsafe { std::slice::from_raw_parts(self.base.as_ptr().add(start), end - start) })
    }

    pub(crate) fn read_pod<T: Pod>(&self, offset: u64) -> Result<T> {
        Ok(bytemuck::pod_read_unaligned(self.bytes(offset, size_of::<T>() as u64)?))
    }

    pub(crate) fn write_bytes(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        let (start, _) = self.range(offset, data.len() as u64)?;
        // SAFETY: destination is inside a writable mapping; callers never pass a
        // source that overlaps the destination
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.base.as_ptr().add(start), data.len());
        }
        Ok(())
    }

    pub(crate) fn write_pod<T: Pod>(&self, offset: u64, value: &T) -> Result<()> {
        self.write_bytes(offset, bytemuck::bytes_of(value))
    }

    /// Typed view of `len` elements at `offset`
    pub(crate) fn slice_at<T: Pod>(&self, offset: u64, len: usize) -> Result<&[T]> {
        let byte_len = (len as u64).saturating_mul(size_of::<T>() as u64);
        let bytes = self.bytes(offset, byte_len)?;
        bytemuck::try_cast_slice(bytes).map_err(|e| BinsparseError::InconsistentFile {
            location: self.location.clone(),
            array: "segment".into(),
            expected: format!("aligned {}", std::any::type_name::<T>()),
            actual: format!("{e:?} at offset {offset}"),
        })
    }

    /// Mutable typed view of `len` elements at `offset`
    ///
    /// # Safety
    ///
    /// The caller must hold the only handle to this region (see
    /// [`attach`](Self::attach)) and must not create overlapping views while
    /// the returned slice is alive.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slice_at_mut<T: Pod>(&self, offset: u64, len: usize) -> Result<&mut [T]> {
        self.ensure_writable()?;
        let byte_len = (len as u64).saturating_mul(size_of::<T>() as u64);
        let (start, _) = self.range(offset, byte_len)?;
        let ptr = self.base.as_ptr().add(start);
        if (ptr as usize) % std::mem::align_of::<T>() != 0 {
            return Err(BinsparseError::invalid_argument(format!(
                "offset {offset} is not aligned for {}",
                std::any::type_name::<T>()
            )));
        }
        Ok(std::slice::from_raw_parts_mut(ptr as *mut T, len))
    }

    /// Bump-allocate `size` bytes at an 8-byte boundary
    pub(crate) fn allocate(&self, size: u64) -> Result<u64> {
        self.ensure_writable()?;
        let mut header = self.header()?;
        let offset = align_to_8(header.next_free as usize) as u64;
        let end = offset
            .checked_add(size)
            .filter(|end| *end <= header.capacity)
            .ok_or(BinsparseError::CapacityExceeded {
                requested: size,
                available: header.capacity.saturating_sub(offset),
            })?;
        header.next_free = end;
        self.write_pod(0, &header)?;
        tracing::trace!(offset, size, "heap allocation");
        Ok(offset)
    }

    fn entry(&self, slot: u64) -> Result<DirectoryEntry> {
        let header = self.header()?;
        self.read_pod(header.directory_offset + slot * DirectoryEntry::SIZE as u64)
    }

    fn write_entry(&self, slot: u64, entry: &DirectoryEntry) -> Result<()> {
        let header = self.header()?;
        self.write_pod(
            header.directory_offset + slot * DirectoryEntry::SIZE as u64,
            entry,
        )
    }

    fn lookup(&self, name: &str) -> Result<Option<(u64, DirectoryEntry)>> {
        let key = encode_name(name)?;
        let slots = self.header()?.directory_slots;
        for slot in 0..slots {
            let entry = self.entry(slot)?;
            if entry.in_use != 0 && entry.name == key {
                return Ok(Some((slot, entry)));
            }
        }
        Ok(None)
    }

    fn insert_entry(&self, name: &str, kind: u32, offset: u64, size: u64) -> Result<()> {
        let key = encode_name(name)?;
        let slots = self.header()?.directory_slots;
        for slot in 0..slots {
            if self.entry(slot)?.in_use == 0 {
                let entry = DirectoryEntry {
                    name: key,
                    kind,
                    in_use: 1,
                    offset,
                    size,
                };
                return self.write_entry(slot, &entry);
            }
        }
        Err(BinsparseError::CapacityExceeded {
            requested: DirectoryEntry::SIZE as u64,
            available: 0,
        })
    }

    fn ensure_absent(&self, name: &str) -> Result<()> {
        self.ensure_writable()?;
        if self.lookup(name)?.is_some() {
            return Err(BinsparseError::access_conflict(
                format!("{}:{name}", self.location),
                "object already exists",
            ));
        }
        Ok(())
    }

    pub fn contains_name(&self, name: &str) -> Result<bool> {
        Ok(self.lookup(name)?.is_some())
    }

    pub fn object_info(&self, name: &str) -> Result<Option<ObjectInfo>> {
        Ok(self.lookup(name)?.map(|(_, entry)| ObjectInfo {
            name: name.to_string(),
            kind: entry.kind,
            offset: entry.offset,
            size: entry.size,
        }))
    }

    /// Every live object, in directory order
    pub fn objects(&self) -> Result<Vec<ObjectInfo>> {
        let slots = self.header()?.directory_slots;
        let mut out = Vec::new();
        for slot in 0..slots {
            let entry = self.entry(slot)?;
            if entry.in_use != 0 {
                out.push(ObjectInfo {
                    name: entry.name().to_string(),
                    kind: entry.kind,
                    offset: entry.offset,
                    size: entry.size,
                });
            }
        }
        Ok(out)
    }

    /// Store `value` under `name`; fails with `AccessConflict` if the name
    /// is taken. Returns the object's offset.
    pub fn construct<T: HeapObject>(&self, name: &str, value: &T) -> Result<u64> {
        self.ensure_absent(name)?;
        let size = size_of::<T>() as u64;
        let offset = self.allocate(size)?;
        self.write_pod(offset, value)?;
        self.insert_entry(name, T::KIND, offset, size)?;
        Ok(offset)
    }

    /// Copy of the object stored under `name`
    pub fn find<T: HeapObject>(&self, name: &str) -> Result<Option<T>> {
        let Some((_, entry)) = self.lookup(name)? else {
            return Ok(None);
        };
        if entry.kind != T::KIND || entry.size != size_of::<T>() as u64 {
            return Err(BinsparseError::InconsistentFile {
                location: self.location.clone(),
                array: name.to_string(),
                expected: format!("object kind {} of {} bytes", T::KIND, size_of::<T>()),
                actual: format!("object kind {} of {} bytes", entry.kind, entry.size),
            });
        }
        self.read_pod(entry.offset).map(Some)
    }

    pub fn construct_str(&self, name: &str, value: &str) -> Result<()> {
        self.ensure_absent(name)?;
        let offset = self.allocate(value.len() as u64)?;
        self.write_bytes(offset, value.as_bytes())?;
        self.insert_entry(name, KIND_STRING, offset, value.len() as u64)
    }

    /// Zero-copy view of a stored string
    pub fn find_str(&self, name: &str) -> Result<Option<&str>> {
        let Some((_, entry)) = self.lookup(name)? else {
            return Ok(None);
        };
        if entry.kind != KIND_STRING {
            return Err(BinsparseError::InconsistentFile {
                location: self.location.clone(),
                array: name.to_string(),
                expected: "string object".into(),
                actual: format!("object kind {}", entry.kind),
            });
        }
        let bytes = self.bytes(entry.offset, entry.size)?;
        std::str::from_utf8(bytes)
            .map(Some)
            .map_err(|e| BinsparseError::InconsistentFile {
                location: self.location.clone(),
                array: name.to_string(),
                expected: "UTF-8 text".into(),
                actual: e.to_string(),
            })
    }

    /// Give the object `from` the name `to`, unlinking any object already
    /// called `to`. Only the directory changes, so this never allocates.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.ensure_writable()?;
        let key = encode_name(to)?;
        let (slot, mut entry) = self
            .lookup(from)?
            .ok_or_else(|| BinsparseError::missing_object(self.location.as_str(), from))?;
        if from != to {
            self.destroy(to)?;
        }
        entry.name = key;
        self.write_entry(slot, &entry)
    }

    /// Unlink `name`; its space is not reclaimed. Returns false if absent.
    pub fn destroy(&self, name: &str) -> Result<bool> {
        self.ensure_writable()?;
        match self.lookup(name)? {
            Some((slot, mut entry)) => {
                entry.in_use = 0;
                self.write_entry(slot, &entry)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn flush(&self) -> Result<()> {
        match &self.mapping {
            Mapping::Writable(m) => m.flush().map_err(|e| io_error(&self.location, e)),
            Mapping::ReadOnly(_) => Ok(()),
        }
    }

    /// Whether `[ptr, ptr + len)` lies inside this heap's mapping
    pub fn contains(&self, ptr: *const u8, len: usize) -> bool {
        let start = self.base.as_ptr() as usize;
        let addr = ptr as usize;
        addr >= start
            && addr
                .checked_add(len)
                .is_some_and(|end| end <= start + self.len)
    }

    /// Offset of `ptr` from the start of the mapping, if it points into it
    pub(crate) fn offset_of(&self, ptr: *const u8) -> Option<u64> {
        (ptr as usize)
            .checked_sub(self.base.as_ptr() as usize)
            .filter(|offset| *offset <= self.len)
            .map(|offset| offset as u64)
    }

    /// Register the only live handle to the object at `offset`
    pub(crate) fn attach(&self, offset: u64) -> Result<()> {
        if !self.attached.borrow_mut().insert(offset) {
            return Err(BinsparseError::access_conflict(
                format!("{}@{offset}", self.location),
                "object is already attached to a live handle",
            ));
        }
        Ok(())
    }

    pub(crate) fn detach(&self, offset: u64) {
        self.attached.borrow_mut().remove(&offset);
    }
}

impl Drop for PersistentHeap {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(path = %self.location, error = %e, "failed to flush persistent heap");
        }
    }
}
