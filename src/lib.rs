//! # Getting started
//!
//! A schema-driven Avro datum codec: parse a schema once, then encode and
//! decode binary datums against it, either through [`serde`] for types
//! known at compile time or through the dynamic [`value::Value`] /
//! [`registry::TypeRegistry`] path.
//!
//! ```
//! let schema: avro_datum::Schema = r#"
//! {
//! 	"type": "record",
//! 	"name": "simple",
//! 	"namespace": "org.example.avro",
//! 	"fields": [
//! 		{ "name": "a", "type": "long" },
//! 		{ "name": "b", "type": "string" }
//! 	]
//! }
//! "#
//! .parse()
//! .expect("Failed to parse schema");
//!
//! #[derive(serde_derive::Serialize, serde_derive::Deserialize, Debug, PartialEq)]
//! struct Simple<'a> {
//! 	a: i64,
//! 	b: &'a str,
//! }
//!
//! let rust_value = Simple { a: 27, b: "foo" };
//! let avro_datum = &[0x36, 0x06, b'f', b'o', b'o'];
//!
//! // Avro datum deserialization
//! assert_eq!(
//! 	avro_datum::from_datum_slice::<Simple>(avro_datum, &schema)
//! 		.expect("Failed to deserialize"),
//! 	rust_value
//! );
//!
//! // Avro datum serialization
//! assert_eq!(
//! 	avro_datum::to_datum(
//! 		&rust_value,
//! 		Vec::new(),
//! 		&mut avro_datum::ser::SerializerConfig::new(&schema)
//! 	)
//! 	.expect("Failed to serialize"),
//! 	avro_datum
//! );
//! ```
//!
//! # Schema identity
//!
//! Schemas canonicalize and fingerprint
//! ([SHA-256](schema::SchemaMut::sha256_fingerprint),
//! [MD5](schema::SchemaMut::md5_fingerprint), and
//! [CRC-64-AVRO](schema::SchemaMut::rabin_fingerprint)); the SHA-256 digest
//! of the canonical form is the identity used for codec caching.
//!
//! # Dynamic typing
//!
//! When the application types are not known at compile time, datums decode
//! to [`value::Value`] trees, or to registered Rust types through a
//! [`registry::TypeRegistry`] (see the [`registry`] module documentation).

pub mod de;
pub mod registry;
pub mod schema;
pub mod ser;
pub mod value;

pub use schema::Schema;

/// Deserialize from an avro "datum" (raw data, no headers...) slice
///
/// This is zero-alloc.
///
/// Your structure may contain `&'a str`s that will end up pointing directly
/// into this slice for ideal performance.
pub fn from_datum_slice<'a, T>(slice: &'a [u8], schema: &Schema) -> Result<T, de::DeError>
where
	T: serde::Deserialize<'a>,
{
	serde::Deserialize::deserialize(de::DeserializerState::from_slice(slice, schema).deserializer())
}

/// Deserialize from an avro "datum" (raw data, no headers...) `impl BufRead`
///
/// If you only have an `impl Read`, wrap it in a
/// [`BufReader`](std::io::BufReader) first.
///
/// If deserializing from a slice, a `Vec`, ... prefer using
/// [`from_datum_slice`], as it will be more performant and enable you to
/// borrow `&str`s from the original slice.
pub fn from_datum_reader<R, T>(reader: R, schema: &Schema) -> Result<T, de::DeError>
where
	T: serde::de::DeserializeOwned,
	R: std::io::BufRead,
{
	serde::Deserialize::deserialize(
		de::DeserializerState::from_reader(reader, schema).deserializer(),
	)
}

/// Serialize an avro "datum" (raw data, no headers...)
///
/// to the provided writer
///
/// [`SerializerConfig`](ser::SerializerConfig) can be built from a schema:
/// ```
/// # use avro_datum::{ser, Schema};
/// let schema: Schema = r#""int""#.parse().unwrap();
/// let serializer_config = &mut ser::SerializerConfig::new(&schema);
///
/// let mut serialized: Vec<u8> = avro_datum::to_datum_vec(&3, serializer_config).unwrap();
/// assert_eq!(serialized, &[6]);
///
/// // reuse config and output buffer across serializations for ideal performance
/// serialized.clear();
/// let serialized = avro_datum::to_datum(&4, serialized, serializer_config).unwrap();
/// assert_eq!(serialized, &[8]);
/// ```
pub fn to_datum<T, W>(
	value: &T,
	writer: W,
	serializer_config: &mut ser::SerializerConfig<'_>,
) -> Result<W, ser::SerError>
where
	T: serde::Serialize + ?Sized,
	W: std::io::Write,
{
	let mut serializer_state = ser::SerializerState::from_writer(writer, serializer_config);
	serde::Serialize::serialize(value, serializer_state.serializer())?;
	Ok(serializer_state.into_writer())
}

/// Serialize an avro "datum" (raw data, no headers...)
///
/// to a newly allocated Vec
///
/// Note that unless you would otherwise allocate a new `Vec` anyway, it
/// will be more efficient to use [`to_datum`] instead.
///
/// See [`to_datum`] for more details.
pub fn to_datum_vec<T>(
	value: &T,
	serializer_config: &mut ser::SerializerConfig<'_>,
) -> Result<Vec<u8>, ser::SerError>
where
	T: serde::Serialize + ?Sized,
{
	to_datum(value, Vec::new(), serializer_config)
}
