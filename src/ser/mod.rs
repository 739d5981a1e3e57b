//! Defines everything necessary for avro serialization
//!
//! # For advanced usage
//!
//! You typically want to use top-level functions such as
//! [`to_datum`](crate::to_datum) but access to this may be necessary for
//! more advanced usage.
//!
//! This gives manual access to the type that implements
//! [`serde::Serializer`], and to the writer-side configuration:
//! - [`SerializerConfig::block_length`]: how many array/map items go in each
//!   output block (default 100)
//! - [`SerializerConfig::write_block_size_header`]: whether blocks advertise
//!   their byte size so that readers can skip them (default `true`; both
//!   forms are valid on the wire)
//!
//! Such usage would go as follows:
//! ```
//! let schema: avro_datum::Schema = r#"
//! {
//! 	"namespace": "test",
//! 	"type": "record",
//! 	"name": "Test",
//! 	"fields": [{ "name": "field", "type": "string" }]
//! }
//! "#
//! .parse()
//! .expect("Failed to parse schema");
//!
//! #[derive(serde_derive::Serialize, Debug, PartialEq)]
//! struct Test<'a> {
//! 	field: &'a str,
//! }
//!
//! // Build the struct that will generally serve through serialization
//! let serializer_config = &mut avro_datum::ser::SerializerConfig::new(&schema);
//! let mut serializer_state =
//! 	avro_datum::ser::SerializerState::from_writer(Vec::new(), serializer_config);
//!
//! // It's not the `&mut SerializerState` that implements
//! // `serde::Serializer` directly: that is `DatumSerializer`, built through
//! // `SerializerState::serializer`
//! serde::Serialize::serialize(&Test { field: "foo" }, serializer_state.serializer())
//! 	.expect("Failed to serialize");
//! let serialized = serializer_state.into_writer();
//!
//! assert_eq!(serialized, &[6, 102, 111, 111]);
//!
//! // reuse config & output buffer across serializations for ideal
//! // performance
//! let mut serializer_state = avro_datum::ser::SerializerState::from_writer(
//! 	{
//! 		let mut buf = serialized;
//! 		buf.clear();
//! 		buf
//! 	},
//! 	serializer_config,
//! );
//!
//! serde::Serialize::serialize(&Test { field: "bar" }, serializer_state.serializer())
//! 	.expect("Failed to serialize");
//! let serialized = serializer_state.into_writer();
//!
//! assert_eq!(serialized, &[6, b'b', b'a', b'r']);
//! ```

mod error;
mod serializer;

pub use {error::SerError, serializer::*};

use crate::schema::frozen::Schema;

use {integer_encoding::VarIntWriter, serde::ser::*, std::io::Write};

/// Default number of items per output block for arrays and maps
pub const DEFAULT_BLOCK_LENGTH: usize = 100;

/// All configuration and state necessary for the serialization to run
///
/// Notably holds the writer and a `&mut` [`SerializerConfig`].
///
/// Does not implement [`Serializer`] directly (use
/// [`.serializer`](Self::serializer) to obtain that).
pub struct SerializerState<'c, 's, W> {
	pub(crate) writer: W,
	/// Storing these here for reuse so that we can bypass the allocation,
	/// and statistically obtain buffers that are already the proper length
	/// (since we have used them for previous records)
	pub(crate) config: &'c mut SerializerConfig<'s>,
}

/// Schema + writer knobs + serialization buffers
///
/// Reusing the same `SerializerConfig` across serializations is ideal for
/// performance, as it allows the buffers to be reused to avoid allocations.
pub struct SerializerConfig<'s> {
	pub(crate) buffers: Buffers,
	pub(crate) schema: &'s Schema,
	/// Number of array/map items written per output block
	///
	/// Default is [`DEFAULT_BLOCK_LENGTH`].
	pub block_length: usize,
	/// Whether each non-empty block advertises its byte size
	///
	/// When `true` (the default) blocks are framed as
	/// `[-count, byte_size, items…]`, which lets readers skip whole blocks;
	/// when `false` they are framed as `[count, items…]`. Both forms are
	/// valid on the wire and both are always readable.
	pub write_block_size_header: bool,
}

impl<'s> SerializerConfig<'s> {
	/// Build a new `SerializerConfig` with a given `schema`, default options
	/// and empty serialization buffers
	pub fn new(schema: &'s Schema) -> Self {
		Self {
			schema,
			block_length: DEFAULT_BLOCK_LENGTH,
			write_block_size_header: true,
			buffers: Buffers::default(),
		}
	}

	/// Get the schema that was used when creating this `SerializerConfig`
	pub fn schema(&self) -> &'s Schema {
		self.schema
	}
}

impl<'c, 's, W: Write> SerializerState<'c, 's, W> {
	/// Build a `SerializerState` from a writer and a `SerializerConfig`
	///
	/// This contains all that's needed to perform serialization. Note that
	/// the resulting `SerializerState` does not implement
	/// [`serde::Serializer`] directly: use [`SerializerState::serializer`]
	/// to obtain a `DatumSerializer` that does.
	pub fn from_writer(writer: W, serializer_config: &'c mut SerializerConfig<'s>) -> Self {
		Self {
			writer,
			config: serializer_config,
		}
	}

	/// Obtain the actual [`serde::Serializer`] for this `SerializerState`
	pub fn serializer<'r>(&'r mut self) -> DatumSerializer<'r, 'c, 's, W> {
		DatumSerializer {
			node: self.config.schema.root(),
			state: self,
		}
	}

	pub(crate) fn serializer_at<'r>(
		&'r mut self,
		node: &'s crate::schema::frozen::Node,
	) -> DatumSerializer<'r, 'c, 's, W> {
		DatumSerializer { node, state: self }
	}

	pub(crate) fn write_length_delimited(&mut self, data: &[u8]) -> Result<(), SerError> {
		self.writer
			.write_varint::<i64>(data.len().try_into().map_err(|_| {
				SerError::new(
					"Buffer len does not fit i64 for encoding as length-delimited field size",
				)
			})?)
			.map_err(SerError::io)?;
		self.writer.write_all(data).map_err(SerError::io)
	}
}

impl<W> SerializerState<'_, '_, W> {
	/// Get writer back
	pub fn into_writer(self) -> W {
		self.writer
	}

	/// Get writer by reference
	///
	/// This may be useful to observe the state of the inner buffer, notably
	/// when re-using a `SerializerState` to write multiple objects.
	pub fn writer(&self) -> &W {
		&self.writer
	}

	/// Get writer by mutable reference
	///
	/// This may be useful to clear the inner buffer, when re-using a
	/// `SerializerState`.
	pub fn writer_mut(&mut self) -> &mut W {
		&mut self.writer
	}
}

/// Buffers used during serialization, for reuse across serializations
///
/// In order to avoid allocating even when field reordering or block framing
/// is necessary we preserve the allocations from one record or block to
/// another (even across serializations).
#[derive(Default)]
pub(crate) struct Buffers {
	pub(crate) field_reordering_buffers: Vec<Vec<u8>>,
	pub(crate) block_buffers: Vec<Vec<u8>>,
}
