//! Buffer payloads moved between pads.
//!
//! A [`Buffer`] is a cheap, reference-counted handle: cloning it bumps a
//! count, dropping it releases one. Pads take buffers by value, so a call
//! that fails early simply drops its argument and the caller's count is
//! restored. [`Buffer::ref_count`] exposes the count for tests and
//! diagnostics.

use bitflags::bitflags;
use bytes::Bytes;
use std::sync::Arc;

bitflags! {
    /// Flags describing buffer properties.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferFlags: u32 {
        /// The buffer starts a new, discontinuous stretch of data.
        const DISCONT = 1 << 0;
        /// The buffer is a sync point (keyframe equivalent).
        const SYNC_POINT = 1 << 1;
        /// The buffer is corrupted or incomplete.
        const CORRUPTED = 1 << 2;
        /// The buffer carries no data, only marks a gap.
        const GAP = 1 << 3;
        /// The buffer must be decoded but not rendered.
        const DECODE_ONLY = 1 << 4;
    }
}

/// Timing and position metadata attached to a buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferMeta {
    /// Presentation timestamp in nanoseconds.
    pub pts: Option<u64>,
    /// Decode timestamp in nanoseconds.
    pub dts: Option<u64>,
    /// Duration in nanoseconds.
    pub duration: Option<u64>,
    /// Media-specific offset (byte offset for pulled data).
    pub offset: Option<u64>,
    /// Property flags.
    pub flags: BufferFlags,
}

#[derive(Debug, Clone)]
struct BufferInner {
    data: Bytes,
    meta: BufferMeta,
}

/// A reference-counted, immutable-by-default media buffer.
#[derive(Clone)]
pub struct Buffer {
    inner: Arc<BufferInner>,
}

impl Buffer {
    /// Create a buffer owning `data`.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::with_meta(data, BufferMeta::default())
    }

    /// Create a buffer from a static slice without copying.
    pub fn from_static(data: &'static [u8]) -> Self {
        Self::from_bytes(Bytes::from_static(data))
    }

    /// Create a buffer with explicit metadata.
    pub fn with_meta(data: impl Into<Bytes>, meta: BufferMeta) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                data: data.into(),
                meta,
            }),
        }
    }

    /// Create an empty buffer.
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// Payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner.data
    }

    /// Payload as a shared `Bytes` handle.
    pub fn bytes(&self) -> Bytes {
        self.inner.data.clone()
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }

    /// Metadata of this buffer.
    pub fn meta(&self) -> &BufferMeta {
        &self.inner.meta
    }

    /// Mutable metadata, copying the buffer first if it is shared.
    pub fn meta_mut(&mut self) -> &mut BufferMeta {
        &mut Arc::make_mut(&mut self.inner).meta
    }

    /// Presentation timestamp.
    pub fn pts(&self) -> Option<u64> {
        self.inner.meta.pts
    }

    /// Media offset.
    pub fn offset(&self) -> Option<u64> {
        self.inner.meta.offset
    }

    /// Number of live handles to this buffer.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether this is the only handle to the buffer.
    pub fn is_writable(&self) -> bool {
        self.ref_count() == 1
    }

    /// Whether two handles refer to the same buffer.
    pub fn ptr_eq(&self, other: &Buffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len())
            .field("pts", &self.inner.meta.pts)
            .field("offset", &self.inner.meta.offset)
            .field("flags", &self.inner.meta.flags)
            .finish()
    }
}

/// Buffers compare equal when payload and metadata match.
impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.inner.data == other.inner.data && self.inner.meta == other.inner.meta)
    }
}

impl Eq for Buffer {}

/// An ordered group of buffers pushed as a single item.
#[derive(Debug, Clone, Default)]
pub struct BufferList {
    buffers: Vec<Buffer>,
}

impl BufferList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a buffer.
    pub fn push(&mut self, buffer: Buffer) {
        self.buffers.push(buffer);
    }

    /// Number of buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Iterate over the buffers.
    pub fn iter(&self) -> std::slice::Iter<'_, Buffer> {
        self.buffers.iter()
    }

    /// Total payload size of all buffers.
    pub fn total_size(&self) -> usize {
        self.buffers.iter().map(Buffer::len).sum()
    }
}

impl FromIterator<Buffer> for BufferList {
    fn from_iter<I: IntoIterator<Item = Buffer>>(iter: I) -> Self {
        Self {
            buffers: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for BufferList {
    type Item = Buffer;
    type IntoIter = std::vec::IntoIter<Buffer>;

    fn into_iter(self) -> Self::IntoIter {
        self.buffers.into_iter()
    }
}
