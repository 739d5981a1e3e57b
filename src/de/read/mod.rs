//! Abstract reading from slices (propagating lifetime) or any other
//! `impl BufRead`/`impl Read` behind the same interface
//!
//! The deserializer is implemented generically on this.

use super::{DeError, Error};

use integer_encoding::{VarInt, VarIntReader};

/// Default cap for a single `bytes`/`string` read (1 MiB)
///
/// Hostile input could otherwise advertise absurd lengths and trigger
/// unbounded allocation before any content check.
pub const DEFAULT_MAX_BYTE_SLICE_SIZE: usize = 1024 * 1024;

/// Abstracts reading from slices or any other `impl BufRead` behind the same
/// interface
///
/// The deserializer is implemented generically on this.
pub trait Read: std::io::Read + Sized + private::Sealed {
	/// Read an integer of type `I` from the underlying buffer using varint
	/// encoding
	///
	/// Note that Avro uses signed (zig-zag) integers all the time, so there
	/// is seldom use-case for unsigned integers here.
	fn read_varint<I>(&mut self) -> Result<I, DeError>
	where
		I: VarInt;

	/// Read a buffer of size `N` from the underlying buffer, returning it as
	/// an array
	///
	/// This is a convenience method because the deserializer often needs
	/// fixed-size buffers to immediately turn them into values.
	fn read_const_size_buf<const N: usize>(&mut self) -> Result<[u8; N], DeError> {
		let mut buf = [0u8; N];
		self.read_exact(&mut buf).map_err(DeError::io)?;
		Ok(buf)
	}

	/// The cap enforced on any single length-delimited read
	fn max_byte_slice_size(&self) -> usize;
}

/// Abstracts reading from slices (propagating lifetime) or any other `impl
/// Read` behind the same interface
///
/// The deserializer is implemented generically on this.
pub trait ReadSlice<'de>: Read {
	/// Read a slice of `n` bytes from the underlying buffer, and pass it to
	/// the visitor to turn it into a value
	fn read_slice<V>(&mut self, n: usize, read_visitor: V) -> Result<V::Value, DeError>
	where
		V: ReadVisitor<'de>;
}

mod private {
	pub trait Sealed {}
}

fn check_byte_slice_size(n: usize, max: usize) -> Result<(), DeError> {
	if n > max {
		Err(DeError::custom(format_args!(
			"Refusing to read a bytes/string value of {n} bytes: larger than the \
				configured maximum of {max} - this is probably due to malformed data",
		)))
	} else {
		Ok(())
	}
}

/// Implements `Read<'de>` reading from `&'de [u8]`
pub struct SliceRead<'de> {
	slice: &'de [u8],
	/// Cap for a single `bytes`/`string` value
	///
	/// Default is [`DEFAULT_MAX_BYTE_SLICE_SIZE`].
	pub max_byte_slice_size: usize,
}
impl<'de> SliceRead<'de> {
	/// Construct a `SliceRead` from a `&'de [u8]`
	pub fn new(slice: &'de [u8]) -> Self {
		Self {
			slice,
			max_byte_slice_size: DEFAULT_MAX_BYTE_SLICE_SIZE,
		}
	}
}
impl private::Sealed for SliceRead<'_> {}
impl<'de> Read for SliceRead<'de> {
	fn read_varint<I>(&mut self) -> Result<I, DeError>
	where
		I: VarInt,
	{
		match I::decode_var(self.slice) {
			None => Err(DeError::new(
				"All bytes have MSB set when decoding varint (Reached EOF)",
			)),
			Some((val, read)) => {
				self.slice = &self.slice[read..];
				Ok(val)
			}
		}
	}

	fn max_byte_slice_size(&self) -> usize {
		self.max_byte_slice_size
	}
}
impl<'de> ReadSlice<'de> for SliceRead<'de> {
	fn read_slice<V>(&mut self, n: usize, visitor: V) -> Result<V::Value, DeError>
	where
		V: ReadVisitor<'de>,
	{
		check_byte_slice_size(n, self.max_byte_slice_size)?;
		if n > self.slice.len() {
			Err(DeError::unexpected_eof())
		} else {
			let (just_read, end) = self.slice.split_at(n);
			self.slice = end;
			visitor.visit_borrowed(just_read)
		}
	}
}
impl std::io::Read for SliceRead<'_> {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		self.slice.read(buf)
	}
	fn read_vectored(&mut self, bufs: &mut [std::io::IoSliceMut<'_>]) -> std::io::Result<usize> {
		self.slice.read_vectored(bufs)
	}
}
impl std::io::BufRead for SliceRead<'_> {
	fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
		self.slice.fill_buf()
	}

	fn consume(&mut self, amt: usize) {
		self.slice.consume(amt)
	}
}

/// Implements `Read<'de>` reading from any `impl BufRead`
pub struct ReaderRead<R> {
	reader: R,
	scratch: Vec<u8>,
	/// Cap for a single `bytes`/`string` value
	///
	/// This is a safeguard for malformed data.
	///
	/// Default is [`DEFAULT_MAX_BYTE_SLICE_SIZE`].
	///
	/// See the [`de`](crate::de) module documentation for an example of how
	/// to set this.
	pub max_byte_slice_size: usize,
}
impl<R: std::io::Read> private::Sealed for ReaderRead<R> {}
impl<R: std::io::BufRead> ReaderRead<R> {
	/// Construct a `ReaderRead` from an `impl BufRead`
	///
	/// If you only have an `impl Read`, wrap it in a
	/// [`BufReader`](std::io::BufReader) first.
	pub fn new(reader: R) -> Self {
		Self {
			reader,
			scratch: Vec::new(),
			max_byte_slice_size: DEFAULT_MAX_BYTE_SLICE_SIZE,
		}
	}
}
impl<R> ReaderRead<R> {
	/// Consume the `ReaderRead` and return the inner reader
	pub fn into_inner(self) -> R {
		self.reader
	}
}
impl<R: std::io::BufRead> Read for ReaderRead<R> {
	fn read_varint<I>(&mut self) -> Result<I, DeError>
	where
		I: VarInt,
	{
		use std::io::BufRead;
		// Try to decode in one go from the buffer slice.
		// On buffer refill boundaries, that may fail, so we fall back to the
		// more general `read_varint` method that reads byte by byte (that's
		// slightly sub-optimal but also will trigger extremely rarely).
		match I::decode_var(self.fill_buf().map_err(DeError::io)?) {
			None => <Self as VarIntReader>::read_varint(self).map_err(DeError::io),
			Some((val, read)) => {
				self.consume(read);
				Ok(val)
			}
		}
	}

	fn max_byte_slice_size(&self) -> usize {
		self.max_byte_slice_size
	}
}
impl<'de, R: std::io::BufRead> ReadSlice<'de> for ReaderRead<R> {
	fn read_slice<V>(&mut self, n: usize, read_visitor: V) -> Result<V::Value, DeError>
	where
		V: ReadVisitor<'de>,
	{
		check_byte_slice_size(n, self.max_byte_slice_size)?;
		let buffer = self.reader.fill_buf().map_err(DeError::io)?;
		match buffer.get(0..n) {
			Some(slice) => {
				let produced = read_visitor.visit(slice)?;
				self.reader.consume(n);
				Ok(produced)
			}
			None => {
				if n > self.scratch.len() {
					self.scratch.resize(n, 0);
				}
				let scratch = &mut self.scratch[..n];
				self.reader.read_exact(scratch).map_err(DeError::io)?;
				read_visitor.visit(scratch)
			}
		}
	}
}
impl<R: std::io::Read> std::io::Read for ReaderRead<R> {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		self.reader.read(buf)
	}
	fn read_vectored(&mut self, bufs: &mut [std::io::IoSliceMut<'_>]) -> std::io::Result<usize> {
		self.reader.read_vectored(bufs)
	}
}
impl<R: std::io::BufRead> std::io::BufRead for ReaderRead<R> {
	fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
		self.reader.fill_buf()
	}

	fn consume(&mut self, amt: usize) {
		self.reader.consume(amt)
	}
}

/// Largely internal trait for `Read` usage (probably don't use this directly)
///
/// This is what can be passed to [`ReadSlice::read_slice`] to obtain either
/// owned or borrowed values depending on whether we're reading from a slice
/// or an arbitrary impl `Read`.
pub trait ReadVisitor<'de>: Sized {
	/// The value that this `Visitor` generates
	type Value;
	/// How to construct the `Value` from a short-lived slice
	fn visit(self, bytes: &[u8]) -> Result<Self::Value, DeError>;
	/// How to construct the `Value` from a borrowed slice
	fn visit_borrowed(self, bytes: &'de [u8]) -> Result<Self::Value, DeError> {
		self.visit(bytes)
	}
}

impl<'de, F, V> ReadVisitor<'de> for F
where
	F: FnOnce(&[u8]) -> Result<V, DeError>,
{
	type Value = V;
	fn visit(self, bytes: &[u8]) -> Result<Self::Value, DeError> {
		self(bytes)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn byte_slice_size_is_bounded() {
		let mut read = SliceRead::new(&[1, 2, 3]);
		read.max_byte_slice_size = 2;
		let err = read.read_slice(3, |_: &[u8]| Ok(())).unwrap_err();
		assert!(err.to_string().contains("larger than the configured maximum"));
	}

	#[test]
	fn varint_zig_zag_boundaries() {
		// (value, zig-zag varint encoding)
		let cases: &[(i64, &[u8])] = &[
			(0, &[0x00]),
			(-1, &[0x01]),
			(1, &[0x02]),
			(-63, &[0x7d]),
			(63, &[0x7e]),
			(-64, &[0x7f]),
			(64, &[0x80, 0x01]),
			(i32::MAX as i64, &[0xfe, 0xff, 0xff, 0xff, 0x0f]),
			(i32::MAX as i64 + 1, &[0x80, 0x80, 0x80, 0x80, 0x10]),
			(-(i32::MAX as i64) - 1, &[0xff, 0xff, 0xff, 0xff, 0x0f]),
			(
				i64::MAX,
				&[0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01],
			),
			(
				i64::MIN,
				&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01],
			),
		];
		for &(value, encoded) in cases {
			let mut read = SliceRead::new(encoded);
			let decoded: i64 = Read::read_varint(&mut read).unwrap();
			assert_eq!(decoded, value, "decoding {encoded:x?}");

			let mut buf = [0u8; 10];
			let n = integer_encoding::VarInt::encode_var(value, &mut buf);
			assert_eq!(&buf[..n], encoded, "encoding {value}");
		}
	}
}
