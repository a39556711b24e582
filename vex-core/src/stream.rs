//! The typed stream: the central datum of the engine (`spec.md` §3.1).
//!
//! Every node consumes and produces [`TypedStream`]s. A stream is either
//! owned (single writer, heap-backed, freed on last handle release) or a
//! `ref_const` borrow (immediately committed, never owns its content).

use crate::error::{logic_error, Error, ErrorCode, Result};
use bitflags::bitflags;
use std::cell::RefCell;
use std::rc::Rc;

/// The closed set of stream types (`spec.md` §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// Opaque byte run, element width always 1.
    Serial,
    /// Fixed-width opaque records.
    Struct,
    /// Fixed-width little-endian integers with arithmetic meaning.
    Numeric,
    /// Variable-length byte runs, one 32-bit length per element.
    String,
}

bitflags! {
    /// A set of acceptable [`StreamType`]s, used to declare a node input
    /// port's acceptance mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeMask: u8 {
        /// Accepts `Serial`.
        const SERIAL = 0b0001;
        /// Accepts `Struct`.
        const STRUCT = 0b0010;
        /// Accepts `Numeric`.
        const NUMERIC = 0b0100;
        /// Accepts `String`.
        const STRING = 0b1000;
    }
}

impl StreamType {
    /// Recover a `StreamType` from its wire tag, as written by `as u8`.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(StreamType::Serial),
            1 => Some(StreamType::Struct),
            2 => Some(StreamType::Numeric),
            3 => Some(StreamType::String),
            _ => None,
        }
    }
}

impl TypeMask {
    /// The mask containing only `ty`.
    pub fn of(ty: StreamType) -> Self {
        match ty {
            StreamType::Serial => TypeMask::SERIAL,
            StreamType::Struct => TypeMask::STRUCT,
            StreamType::Numeric => TypeMask::NUMERIC,
            StreamType::String => TypeMask::STRING,
        }
    }

    /// Whether `ty` is accepted by this mask.
    pub fn accepts(self, ty: StreamType) -> bool {
        self.contains(Self::of(ty))
    }
}

/// Sparse mapping from small integer key to integer value, carried on a
/// stream to pass user tags (e.g. a column identifier) between
/// components. Preserved across reference operations; erased by codecs
/// unless explicitly propagated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntMetadata(std::collections::BTreeMap<u16, i64>);

impl IntMetadata {
    /// An empty metadata map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`.
    pub fn set(&mut self, key: u16, value: i64) {
        self.0.insert(key, value);
    }

    /// Get the value for `key`, if present.
    pub fn get(&self, key: u16) -> Option<i64> {
        self.0.get(&key).copied()
    }

    /// Iterate over all (key, value) pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, i64)> + '_ {
        self.0.iter().map(|(&k, &v)| (k, v))
    }
}

#[derive(Debug)]
enum Content {
    /// Owned, heap-backed buffer. Dropped (and freed) with the last handle.
    Owned(Vec<u8>),
    /// Borrowed view into memory the stream does not own.
    Ref(*const u8, usize),
}

// SAFETY: `Ref` variants are only constructed from `&[u8]` slices whose
// borrow outlives the `TypedStream`; the type's API never exposes the raw
// pointer and all reads go through bounds-checked slice construction.
unsafe impl Send for Content {}

#[derive(Debug)]
struct Inner {
    ty: StreamType,
    width: usize,
    count: usize,
    content: Content,
    lengths: Vec<u32>,
    metadata: IntMetadata,
    committed: bool,
    capacity_elements: usize,
}

/// A reference-counted typed stream handle (`spec.md` §3.1, §4.C).
///
/// Cloning a `TypedStream` shares the underlying buffer (`retain` in the
/// spec's vocabulary); there is exactly one writer at a time by
/// construction, since only the original owner can call mutating methods
/// before `commit`.
#[derive(Debug, Clone)]
pub struct TypedStream {
    inner: Rc<RefCell<Inner>>,
}

impl TypedStream {
    /// Create an empty, uncommitted, owned stream of the given type and
    /// element width (`spec.md` §4.C `create`).
    pub fn create(ty: StreamType, width: usize) -> Result<Self> {
        validate_width(ty, width)?;
        Ok(Self {
            inner: Rc::new(RefCell::new(Inner {
                ty,
                width,
                count: 0,
                content: Content::Owned(Vec::new()),
                lengths: Vec::new(),
                metadata: IntMetadata::new(),
                committed: false,
                capacity_elements: 0,
            })),
        })
    }

    /// Reserve capacity for `capacity_in_elements` elements (owned streams
    /// only). Idempotent: reserving a smaller capacity than already held
    /// is a no-op.
    pub fn reserve(&self, capacity_in_elements: usize) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.committed {
            return Err(logic_error("cannot reserve on a committed stream"));
        }
        let Content::Owned(buf) = &mut inner.content else {
            return Err(Error::new(
                ErrorCode::InvalidRequest,
                "cannot reserve capacity on a ref stream",
            ));
        };
        let width = inner.width;
        if capacity_in_elements > inner.capacity_elements {
            if inner.ty != StreamType::String {
                let target_bytes = capacity_in_elements * width.max(1);
                if target_bytes > buf.len() {
                    buf.reserve(target_bytes - buf.len());
                }
            }
            inner.capacity_elements = capacity_in_elements;
        }
        Ok(())
    }

    /// Create an immediately-committed borrowed stream over `data`
    /// (`spec.md` §4.C `ref_const`). The caller must ensure `data` outlives
    /// every use of the returned stream; Rust cannot express that lifetime
    /// through `Rc`, so this is the one place the contract is the caller's
    /// responsibility, mirroring the C API this crate's wire format mirrors.
    pub fn ref_const(data: &[u8], ty: StreamType, width: usize, count: usize) -> Result<Self> {
        validate_width(ty, width)?;
        let expected = width.max(1) * count;
        if data.len() < expected {
            return Err(Error::new(
                ErrorCode::SrcSizeTooSmall,
                format!("ref_const expected {expected} bytes, got {}", data.len()),
            ));
        }
        Ok(Self {
            inner: Rc::new(RefCell::new(Inner {
                ty,
                width,
                count,
                content: Content::Ref(data.as_ptr(), expected),
                lengths: Vec::new(),
                metadata: IntMetadata::new(),
                committed: true,
                capacity_elements: count,
            })),
        })
    }

    /// Transition an owned stream from uncommitted to committed, declaring
    /// its final element count. Fails if `count` exceeds reserved capacity.
    pub fn commit(&self, count: usize) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.committed {
            return Err(logic_error("stream is already committed"));
        }
        if count > inner.capacity_elements && inner.ty != StreamType::String {
            return Err(Error::new(
                ErrorCode::InvalidRequest,
                format!(
                    "commit count {count} exceeds reserved capacity {}",
                    inner.capacity_elements
                ),
            ));
        }
        if inner.ty == StreamType::String && inner.lengths.len() != count {
            return Err(Error::new(
                ErrorCode::InvalidRequest,
                format!(
                    "commit count {count} does not match {} recorded string lengths",
                    inner.lengths.len()
                ),
            ));
        }
        inner.count = count;
        inner.committed = true;
        Ok(())
    }

    /// String type only: append one element length, growing the lengths
    /// array. Must be called before `commit`.
    pub fn append_to_string_lengths(&self, len: u32) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.committed {
            return Err(logic_error("cannot write to a committed stream"));
        }
        if inner.ty != StreamType::String {
            return Err(Error::new(
                ErrorCode::InvalidRequest,
                "append_to_string_lengths requires a String stream",
            ));
        }
        inner.lengths.push(len);
        Ok(())
    }

    /// Set an integer metadata entry.
    pub fn int_metadata_set(&self, key: u16, value: i64) {
        self.inner.borrow_mut().metadata.set(key, value);
    }

    /// Get an integer metadata entry.
    pub fn int_metadata_get(&self, key: u16) -> Option<i64> {
        self.inner.borrow().metadata.get(key)
    }

    /// All integer metadata entries, in key order.
    pub fn int_metadata(&self) -> IntMetadata {
        self.inner.borrow().metadata.clone()
    }

    /// This stream's type.
    pub fn ty(&self) -> StreamType {
        self.inner.borrow().ty
    }

    /// Element width in bytes (meaningless for `String`, see
    /// [`TypedStream::string_lengths`]).
    pub fn width(&self) -> usize {
        self.inner.borrow().width
    }

    /// Number of logical elements. Zero until committed.
    pub fn num_elements(&self) -> usize {
        self.inner.borrow().count
    }

    /// Whether this stream has been committed and is safe to read.
    pub fn is_committed(&self) -> bool {
        self.inner.borrow().committed
    }

    /// Total content-buffer byte size.
    pub fn byte_size(&self) -> usize {
        let inner = self.inner.borrow();
        match &inner.content {
            Content::Owned(buf) => buf.len(),
            Content::Ref(_, len) => *len,
        }
    }

    /// String-type length array (one 32-bit length per element).
    pub fn string_lengths(&self) -> Vec<u32> {
        self.inner.borrow().lengths.clone()
    }

    /// Read the raw content bytes. Panics if called on an uncommitted
    /// stream — the executor enforces commit-before-read by construction
    /// (`spec.md` §4.C invariant), so this is a programmer error, not a
    /// recoverable one.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let inner = self.inner.borrow();
        assert!(inner.committed, "read of uncommitted stream");
        match &inner.content {
            Content::Owned(buf) => f(buf),
            // SAFETY: `Content::Ref` is only constructed in `ref_const`
            // from a live `&[u8]` of exactly `len` bytes, and the stream's
            // API gives no way to extend that lifetime past the caller's.
            Content::Ref(ptr, len) => f(unsafe { std::slice::from_raw_parts(*ptr, *len) }),
        }
    }

    /// Append raw bytes to an owned, uncommitted stream's content buffer.
    pub fn write_bytes(&self, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.committed {
            return Err(logic_error("cannot write to a committed stream"));
        }
        match &mut inner.content {
            Content::Owned(buf) => {
                buf.extend_from_slice(data);
                Ok(())
            }
            Content::Ref(..) => Err(Error::new(
                ErrorCode::InvalidRequest,
                "cannot write to a ref stream",
            )),
        }
    }

    /// Deep copy `src`'s content, lengths, and metadata into a freshly
    /// created owned stream of the same type/width.
    pub fn copy(src: &TypedStream) -> Result<TypedStream> {
        let dst = TypedStream::create(src.ty(), src.width())?;
        src.with_bytes(|bytes| dst.write_bytes(bytes))?;
        for len in src.string_lengths() {
            dst.append_to_string_lengths(len)?;
        }
        dst.reserve(src.num_elements())?;
        dst.commit(src.num_elements())?;
        for (k, v) in src.int_metadata().iter() {
            dst.int_metadata_set(k, v);
        }
        Ok(dst)
    }

    /// Number of strong handles sharing this stream's buffer.
    pub fn refcount(&self) -> usize {
        Rc::strong_count(&self.inner)
    }
}

fn validate_width(ty: StreamType, width: usize) -> Result<()> {
    match ty {
        StreamType::Serial if width != 1 => Err(Error::new(
            ErrorCode::InvalidRequest,
            "serial streams must have element width 1",
        )),
        StreamType::Numeric if ![1, 2, 4, 8].contains(&width) => Err(Error::new(
            ErrorCode::InvalidRequest,
            "numeric streams must have width 1, 2, 4, or 8",
        )),
        StreamType::Struct if width == 0 => Err(Error::new(
            ErrorCode::InvalidRequest,
            "struct streams must have a positive element width",
        )),
        _ => Ok(()),
    }
}
