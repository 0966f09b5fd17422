//! A little-endian binary codec for saved scenes and asset caches.
//!
//! Every multi-byte value is stored little-endian regardless of the host.
//! Strings and byte strings are prefixed with their length as a `u32`,
//! and slices with their element count as a `u32`.

use std::io::{self, Read, Write};
use std::string::FromUtf8Error;

use xias::Xias;

#[cfg(test)]
mod tests;

/// The default limit of a length prefix accepted by [`BinaryReader`].
pub const DEFAULT_LENGTH_LIMIT: u32 = 16 << 20;

/// Errors from encoding or decoding.
#[derive(Debug, thiserror::Error)]
pub enum BinaryError {
    /// The underlying stream failed.
    #[error("i/o error: {0}")]
    Io(#[source] io::Error),
    /// The input ended in the middle of a value.
    #[error("input ended unexpectedly")]
    Truncated,
    /// A string is not valid UTF-8.
    #[error("string is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),
    /// A length prefix exceeds the limit of the reader, or a value is too long to encode.
    #[error("length exceeds the limit of {0}")]
    LengthTooLarge(u32),
    /// A field holds a value that is not valid for its type.
    #[error("invalid value {value} for {ty}")]
    InvalidValue {
        /// The decoded type.
        ty:    &'static str,
        /// The raw value.
        value: u64,
    },
}

impl From<io::Error> for BinaryError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::Truncated,
            _ => Self::Io(err),
        }
    }
}

/// A fixed-size primitive with a little-endian representation.
pub trait Wire: Sized {
    /// Writes the value.
    fn write_to(&self, writer: &mut impl Write) -> io::Result<()>;

    /// Reads a value.
    fn read_from(reader: &mut impl Read) -> Result<Self, BinaryError>;
}

macro_rules! impl_wire {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Wire for $ty {
                fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
                    writer.write_all(&self.to_le_bytes())
                }

                fn read_from(reader: &mut impl Read) -> Result<Self, BinaryError> {
                    let mut bytes = [0; std::mem::size_of::<$ty>()];
                    reader.read_exact(&mut bytes)?;
                    Ok(<$ty>::from_le_bytes(bytes))
                }
            }
        )*
    };
}

impl_wire!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl Wire for bool {
    fn write_to(&self, writer: &mut impl Write) -> io::Result<()> { u8::from(*self).write_to(writer) }

    fn read_from(reader: &mut impl Read) -> Result<Self, BinaryError> {
        match u8::read_from(reader)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(BinaryError::InvalidValue { ty: "bool", value: value.into() }),
        }
    }
}

/// A value that can be written to a [`BinaryWriter`].
pub trait Encode {
    /// Writes the value.
    fn encode<W: Write>(&self, writer: &mut BinaryWriter<W>) -> Result<(), BinaryError>;
}

/// A value that can be read from a [`BinaryReader`].
pub trait Decode: Sized {
    /// Reads a value.
    fn decode<R: Read>(reader: &mut BinaryReader<R>) -> Result<Self, BinaryError>;
}

impl<T: Wire> Encode for T {
    fn encode<W: Write>(&self, writer: &mut BinaryWriter<W>) -> Result<(), BinaryError> {
        writer.write(self)
    }
}

impl<T: Wire> Decode for T {
    fn decode<R: Read>(reader: &mut BinaryReader<R>) -> Result<Self, BinaryError> { reader.read() }
}

impl Encode for String {
    fn encode<W: Write>(&self, writer: &mut BinaryWriter<W>) -> Result<(), BinaryError> {
        writer.write_str(self)
    }
}

impl Decode for String {
    fn decode<R: Read>(reader: &mut BinaryReader<R>) -> Result<Self, BinaryError> {
        reader.read_string()
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode<W: Write>(&self, writer: &mut BinaryWriter<W>) -> Result<(), BinaryError> {
        writer.write_slice(self)
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode<R: Read>(reader: &mut BinaryReader<R>) -> Result<Self, BinaryError> {
        reader.read_vec()
    }
}

/// Writes values to a byte sink.
pub struct BinaryWriter<W> {
    inner:   W,
    written: usize,
}

impl<W: Write> BinaryWriter<W> {
    /// Wraps a sink.
    pub fn new(inner: W) -> Self { Self { inner, written: 0 } }

    /// Number of bytes written so far.
    pub fn written(&self) -> usize { self.written }

    /// Unwraps the sink.
    pub fn into_inner(self) -> W { self.inner }

    /// Writes a primitive.
    pub fn write<T: Wire>(&mut self, value: &T) -> Result<(), BinaryError> {
        value.write_to(&mut self.inner)?;
        self.written += std::mem::size_of::<T>();
        Ok(())
    }

    fn write_len(&mut self, len: usize) -> Result<(), BinaryError> {
        let len = u32::try_from(len).map_err(|_| BinaryError::LengthTooLarge(u32::MAX))?;
        self.write(&len)
    }

    /// Writes raw bytes prefixed with their length.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), BinaryError> {
        self.write_len(bytes.len())?;
        self.inner.write_all(bytes)?;
        self.written += bytes.len();
        Ok(())
    }

    /// Writes a UTF-8 string prefixed with its length in bytes.
    pub fn write_str(&mut self, value: &str) -> Result<(), BinaryError> { self.write_bytes(value.as_bytes()) }

    /// Writes a slice prefixed with its element count.
    pub fn write_slice<T: Encode>(&mut self, values: &[T]) -> Result<(), BinaryError> {
        self.write_len(values.len())?;
        for value in values {
            value.encode(self)?;
        }
        Ok(())
    }

    /// Writes a composite value.
    pub fn encode<T: Encode + ?Sized>(&mut self, value: &T) -> Result<(), BinaryError> {
        value.encode(self)
    }

    /// Flushes the sink.
    pub fn flush(&mut self) -> Result<(), BinaryError> { Ok(self.inner.flush()?) }
}

/// Reads values from a byte source.
pub struct BinaryReader<R> {
    inner:        R,
    length_limit: u32,
}

impl<R: Read> BinaryReader<R> {
    /// Wraps a source, accepting lengths up to [`DEFAULT_LENGTH_LIMIT`].
    pub fn new(inner: R) -> Self { Self::with_length_limit(inner, DEFAULT_LENGTH_LIMIT) }

    /// Wraps a source with a custom limit on length prefixes.
    pub fn with_length_limit(inner: R, length_limit: u32) -> Self { Self { inner, length_limit } }

    /// Unwraps the source.
    pub fn into_inner(self) -> R { self.inner }

    /// Reads a primitive.
    pub fn read<T: Wire>(&mut self) -> Result<T, BinaryError> { T::read_from(&mut self.inner) }

    fn read_len(&mut self) -> Result<usize, BinaryError> {
        let len: u32 = self.read()?;
        if len > self.length_limit {
            return Err(BinaryError::LengthTooLarge(self.length_limit));
        }
        Ok(len.small_int())
    }

    /// Reads length-prefixed raw bytes.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, BinaryError> {
        let len = self.read_len()?;
        let mut bytes = vec![0; len];
        self.inner.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, BinaryError> {
        let bytes = self.read_bytes()?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Reads a count-prefixed list.
    pub fn read_vec<T: Decode>(&mut self) -> Result<Vec<T>, BinaryError> {
        let len = self.read_len()?;
        // the count is untrusted
        let mut values = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            values.push(T::decode(self)?);
        }
        Ok(values)
    }

    /// Reads a composite value.
    pub fn decode<T: Decode>(&mut self) -> Result<T, BinaryError> { T::decode(self) }
}
