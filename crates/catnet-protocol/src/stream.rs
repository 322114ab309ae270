//! Length-delimited binary streams over a growable byte buffer.
//!
//! [`ByteWriter`] appends values to a `Vec<u8>`; [`ByteReader`] walks a
//! buffer with a cursor that only ever moves forward. Both own their buffer
//! and hand it back through `into_inner`, so one allocation can serve many
//! encode/decode cycles.
//!
//! # Layout
//!
//! ```text
//! fixed-width value : size_of::<T>() bytes, native byte order
//! string / bytes    : [length: usize, native order][raw bytes]
//! ```
//!
//! Native byte order keeps encoding a plain copy, at the cost of
//! portability: two hosts with different endianness cannot exchange
//! messages. The length prefix is likewise platform-word sized.

use crate::StreamError;

/// A plain-old-data value with a fixed-width byte representation.
///
/// Only types implementing this trait can be passed to
/// [`ByteWriter::write`] and [`ByteReader::read`]; anything else is
/// rejected at compile time. Implementations exist for every integer and
/// float primitive, `bool`, `char` and fixed-size arrays of `Fixed` values.
///
/// `decode` is handed exactly [`SIZE`](Self::SIZE) bytes and returns `None`
/// if they are not a valid bit pattern for the type.
pub trait Fixed: Copy {
    /// Number of bytes in the encoded form.
    const SIZE: usize;

    /// Appends the native-order bytes of `self` to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Rebuilds a value from its native-order bytes.
    fn decode(bytes: &[u8]) -> Option<Self>;
}

macro_rules! impl_fixed_for_numbers {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Fixed for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn encode(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_ne_bytes());
                }

                fn decode(bytes: &[u8]) -> Option<Self> {
                    bytes.try_into().ok().map(<$ty>::from_ne_bytes)
                }
            }
        )*
    };
}

impl_fixed_for_numbers!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
);

impl Fixed for bool {
    const SIZE: usize = 1;

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0] => Some(false),
            [1] => Some(true),
            _ => None,
        }
    }
}

impl Fixed for char {
    const SIZE: usize = 4;

    fn encode(&self, out: &mut Vec<u8>) {
        u32::from(*self).encode(out);
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        u32::decode(bytes).and_then(char::from_u32)
    }
}

impl<T: Fixed, const N: usize> Fixed for [T; N] {
    const SIZE: usize = T::SIZE * N;

    fn encode(&self, out: &mut Vec<u8>) {
        for item in self {
            item.encode(out);
        }
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        let items: Vec<T> = (0..N)
            .map(|i| bytes.get(i * T::SIZE..(i + 1) * T::SIZE).and_then(T::decode))
            .collect::<Option<_>>()?;
        items.try_into().ok()
    }
}

// ---------------------------------------------------------------------------
// ByteWriter
// ---------------------------------------------------------------------------

/// An append-only binary encoder.
///
/// Writes never fail; the buffer grows as needed. Call
/// [`flush`](Self::flush) to start a new message while keeping the
/// allocation.
///
/// ```rust
/// use catnet_protocol::{ByteReader, ByteWriter};
///
/// let mut writer = ByteWriter::new();
/// writer.write(7u32);
/// writer.write_str("meow");
///
/// let mut reader = ByteReader::new(writer.into_inner());
/// assert_eq!(reader.read::<u32>().unwrap(), 7);
/// assert_eq!(reader.read_string().unwrap(), "meow");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Takes ownership of `buf`; new writes are appended after its contents.
    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    /// Appends the fixed-width encoding of `value`.
    pub fn write<T: Fixed>(&mut self, value: T) {
        value.encode(&mut self.buf);
    }

    /// Appends a length-prefixed byte string. The prefix counts bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    /// Appends a length-prefixed UTF-8 string, without a terminator.
    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Reserves capacity for at least `additional` more bytes.
    pub fn reserve(&mut self, additional: usize) {
        self.buf.reserve(additional);
    }

    /// Discards the contents but keeps the allocation.
    pub fn flush(&mut self) {
        self.buf.clear();
    }

    /// Drops everything after the first `len` bytes.
    pub fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Allocated capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// The encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Exchanges the internal buffer with `other` without copying.
    pub fn swap_buffer(&mut self, other: &mut Vec<u8>) {
        std::mem::swap(&mut self.buf, other);
    }

    /// Returns the buffer, giving up the writer.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

// ---------------------------------------------------------------------------
// ByteReader
// ---------------------------------------------------------------------------

/// A bounds-checked binary decoder.
///
/// The cursor starts at zero and only moves forward. A read either
/// consumes exactly the bytes of the value it returns, or fails and
/// consumes nothing; the reader never panics on malformed input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteReader {
    buf: Vec<u8>,
    pos: usize,
}

impl ByteReader {
    /// Takes ownership of `buf` and positions the cursor at its start.
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf, pos: 0 }
    }

    /// Copies `bytes` into a new reader.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }

    /// Current cursor offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes between the cursor and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Total number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if the buffer holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The full buffer, including bytes already consumed.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Reserves capacity for at least `additional` more bytes.
    pub fn reserve(&mut self, additional: usize) {
        self.buf.reserve(additional);
    }

    /// Discards the contents and rewinds, keeping the allocation.
    pub fn flush(&mut self) {
        self.buf.clear();
        self.pos = 0;
    }

    /// Returns the buffer, giving up the reader.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Reads one fixed-width value.
    ///
    /// # Errors
    /// [`StreamError::OutOfBounds`] if fewer than `T::SIZE` bytes remain,
    /// [`StreamError::InvalidValue`] if the bytes are not a valid `T`.
    pub fn read<T: Fixed>(&mut self) -> Result<T, StreamError> {
        let bytes = self.peek(T::SIZE)?;
        let value = T::decode(bytes).ok_or(StreamError::InvalidValue {
            type_name: std::any::type_name::<T>(),
            position: self.pos,
        })?;
        self.pos += T::SIZE;
        Ok(value)
    }

    /// Reads a length-prefixed byte string.
    ///
    /// On failure the cursor is restored to where it was before the
    /// length prefix, even if the prefix itself was readable.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, StreamError> {
        let start = self.pos;
        let len: usize = self.read()?;
        match self.peek(len) {
            Ok(bytes) => {
                let bytes = bytes.to_vec();
                self.pos += len;
                Ok(bytes)
            }
            Err(e) => {
                self.pos = start;
                Err(e)
            }
        }
    }

    /// Reads a length-prefixed UTF-8 string.
    ///
    /// Fails as a whole, with the cursor restored, on truncation or
    /// invalid UTF-8.
    pub fn read_string(&mut self) -> Result<String, StreamError> {
        let start = self.pos;
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|_| {
            self.pos = start;
            StreamError::InvalidUtf8 { position: start }
        })
    }

    /// Borrows the next `len` bytes without advancing.
    fn peek(&self, len: usize) -> Result<&[u8], StreamError> {
        let available = self.remaining();
        if len > available {
            return Err(StreamError::OutOfBounds {
                position: self.pos,
                requested: len,
                available,
            });
        }
        Ok(&self.buf[self.pos..self.pos + len])
    }
}

// =========================================================================
// Tests
// =========================================================================
