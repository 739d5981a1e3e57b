//! Dynamic typing: the resolver registry and the codec cache
//!
//! The typed serde codecs are monomorphized per application type, which
//! covers every call site that knows its types at compile time. The
//! remaining surface is the dynamically-typed one: a value decoded as
//! [`Box<dyn Any>`], with the concrete Rust type picked at runtime by
//! looking the schema's type name up in a [`TypeRegistry`].
//!
//! A registered codec is a pair of monomorphized encode/decode functions
//! behind fn pointers ([`AnyCodec`]); binding one to a schema is memoized by
//! `(schema SHA-256 fingerprint, TypeId)` in a [`CodecCache`].

use crate::{
	de::{read::SliceRead, DeError, DeserializerState},
	schema::frozen::{Node, Schema},
	ser::{SerError, SerializerConfig, SerializerState},
	value::{read_value, write_value, Value},
};

use serde::de::Error as _;

use std::{
	any::{Any, TypeId},
	collections::HashMap,
	sync::RwLock,
};

type DecodeFn = for<'s, 'de> fn(
	&mut DeserializerState<'s, SliceRead<'de>>,
	&'s Node,
) -> Result<Box<dyn Any>, DeError>;

type EncodeFn =
	for<'c, 's> fn(&dyn Any, &mut SerializerState<'c, 's, Vec<u8>>, &'s Node) -> Result<(), SerError>;

/// A type-erased encoder/decoder pair for one concrete Rust type
///
/// The functions are monomorphized at [`AnyCodec::of`] time; the struct
/// itself is two fn pointers plus the type's identity, so it is `Copy` and
/// safe to share.
#[derive(Clone, Copy)]
pub struct AnyCodec {
	type_id: TypeId,
	decode: DecodeFn,
	encode: EncodeFn,
}

impl AnyCodec {
	/// The codec for a concrete type
	pub fn of<T>() -> Self
	where
		T: serde::Serialize + serde::de::DeserializeOwned + Any,
	{
		Self {
			type_id: TypeId::of::<T>(),
			decode: decode_erased::<T>,
			encode: encode_erased::<T>,
		}
	}

	/// The identity of the type this codec materializes
	pub fn type_id(&self) -> TypeId {
		self.type_id
	}
}

fn decode_erased<'s, 'de, T>(
	state: &mut DeserializerState<'s, SliceRead<'de>>,
	node: &'s Node,
) -> Result<Box<dyn Any>, DeError>
where
	T: serde::de::DeserializeOwned + Any,
{
	let value: T = serde::Deserialize::deserialize(state.deserializer_at(node))?;
	Ok(Box::new(value))
}

fn encode_erased<'c, 's, T>(
	value: &dyn Any,
	state: &mut SerializerState<'c, 's, Vec<u8>>,
	node: &'s Node,
) -> Result<(), SerError>
where
	T: serde::Serialize + Any,
{
	let value = value
		.downcast_ref::<T>()
		.ok_or_else(|| SerError::new("Value's runtime type does not match the resolved codec"))?;
	serde::Serialize::serialize(value, state.serializer_at(node))
}

/// Maps canonical type names to prototypes used to materialize values
/// during dynamically-typed decode
///
/// Lookups succeed by full name (for named schemas), by the
/// possibly-`.<logical-type>`-suffixed primitive names (`"string"`,
/// `"long.timestamp-micros"`, ...), or by the synthetic names
/// `array:<elemName>` and `map:<valName>`.
#[derive(Default)]
pub struct TypeRegistry {
	by_name: HashMap<String, AnyCodec>,
	names_by_type: HashMap<TypeId, String>,
	/// Fail instead of degrading to [`Value`] when a union branch cannot be
	/// resolved
	pub union_resolution_error: bool,
	/// Attempt resolution even when only some of a union's branches are
	/// registered
	///
	/// When `false` and `union_resolution_error` is set, a union is only
	/// considered resolvable when every branch is registered.
	pub partial_union_type_resolution: bool,
}

impl TypeRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Associate a canonical name with a type, used to materialize values
	/// during dynamically-typed decode (and to resolve union branches on
	/// encode)
	pub fn register<T>(&mut self, name: impl Into<String>)
	where
		T: serde::Serialize + serde::de::DeserializeOwned + Any,
	{
		let name = name.into();
		self.names_by_type.insert(TypeId::of::<T>(), name.clone());
		self.by_name.insert(name, AnyCodec::of::<T>());
	}

	/// The codec registered under `name`, if any
	pub fn lookup(&self, name: &str) -> Option<&AnyCodec> {
		self.by_name.get(name)
	}

	/// The name under which this runtime type was registered, if any
	pub fn name_of(&self, type_id: TypeId) -> Option<&str> {
		self.names_by_type.get(&type_id).map(String::as_str)
	}

	fn all_branches_registered(&self, union: &crate::schema::frozen::Union) -> bool {
		union
			.type_names
			.iter()
			.all(|name| name == "null" || self.by_name.contains_key(name))
	}
}

/// Decode one datum from a slice, materializing registry-resolved types
///
/// Unregistered primitives materialize their natural Rust types (`i32`,
/// `i64`, `String`, ...); unregistered named types, arrays and maps degrade
/// to [`Value`] unless
/// [`union_resolution_error`](TypeRegistry::union_resolution_error) makes
/// unresolvable unions hard errors.
pub fn decode_any(
	slice: &[u8],
	schema: &Schema,
	registry: &TypeRegistry,
) -> Result<Box<dyn Any>, DeError> {
	let mut state = DeserializerState::from_slice(slice, schema);
	decode_any_node(&mut state, schema.root(), registry)
}

fn decode_any_node<'s, 'de>(
	state: &mut DeserializerState<'s, SliceRead<'de>>,
	node: &'s Node,
	registry: &TypeRegistry,
) -> Result<Box<dyn Any>, DeError> {
	if let Node::Union(union) = node {
		if registry.union_resolution_error
			&& !registry.partial_union_type_resolution
			&& !registry.all_branches_registered(union)
		{
			return Err(DeError::new(
				"Union has unregistered branches and partial union type resolution is disabled",
			));
		}
		let discriminant: i64 = crate::de::read::Read::read_varint(&mut state.reader)?;
		let branch: usize = discriminant
			.try_into()
			.map_err(|e| DeError::custom(format_args!("Invalid discriminant in stream: {e}")))?;
		let (&variant_key, type_name) = union
			.variants
			.get(branch)
			.zip(union.type_names.get(branch))
			.ok_or_else(|| DeError::new("Could not find union discriminant in schema"))?;
		let variant_node = state.config().schema.node(variant_key);
		return match registry.lookup(type_name) {
			Some(codec) => (codec.decode)(state, variant_node),
			None => {
				if registry.union_resolution_error {
					Err(DeError::custom(format_args!(
						"No type registered for union branch {type_name:?}"
					)))
				} else {
					// Best-effort degrade
					decode_any_node(state, variant_node, registry)
				}
			}
		};
	}
	if let Some(codec) = resolution_name(state.config().schema, node)
		.as_deref()
		.and_then(|name| registry.lookup(name))
	{
		return (codec.decode)(state, node);
	}
	Ok(match node {
		Node::Null => {
			let value: () = serde::Deserialize::deserialize(state.deserializer_at(node))?;
			Box::new(value)
		}
		Node::Boolean => box_native::<bool>(state, node)?,
		Node::Int | Node::Date | Node::TimeMillis => box_native::<i32>(state, node)?,
		Node::Long | Node::TimeMicros | Node::TimestampMillis | Node::TimestampMicros => {
			box_native::<i64>(state, node)?
		}
		Node::Float => box_native::<f32>(state, node)?,
		Node::Double => box_native::<f64>(state, node)?,
		Node::String | Node::Uuid => box_native::<String>(state, node)?,
		// Everything else (bytes, named types, arrays, maps) degrades to
		// the dynamic value tree
		_ => Box::new(read_value(state, node, 0)?),
	})
}

fn box_native<'s, 'de, T>(
	state: &mut DeserializerState<'s, SliceRead<'de>>,
	node: &'s Node,
) -> Result<Box<dyn Any>, DeError>
where
	T: serde::de::DeserializeOwned + Any,
{
	let value: T = serde::Deserialize::deserialize(state.deserializer_at(node))?;
	Ok(Box::new(value))
}

/// Encode a dynamically-typed value against the configured schema
pub fn encode_any(
	value: &dyn Any,
	registry: &TypeRegistry,
	config: &mut SerializerConfig<'_>,
) -> Result<Vec<u8>, SerError> {
	let mut state = SerializerState::from_writer(Vec::new(), config);
	let root = state.config.schema.root();
	encode_any_node(value, &mut state, root, registry)?;
	Ok(state.into_writer())
}

fn encode_any_node<'c, 's>(
	value: &dyn Any,
	state: &mut SerializerState<'c, 's, Vec<u8>>,
	node: &'s Node,
	registry: &TypeRegistry,
) -> Result<(), SerError> {
	// The dynamic value tree always encodes structurally
	if let Some(dynamic) = value.downcast_ref::<Value>() {
		return write_value(state, node, dynamic);
	}
	if let Node::Union(union) = node {
		if registry.union_resolution_error
			&& !registry.partial_union_type_resolution
			&& !registry.all_branches_registered(union)
		{
			return Err(SerError::new(
				"Union has unregistered branches and partial union type resolution is disabled",
			));
		}
		// The value's runtime type must be registered under a name that
		// matches one of the branches
		let resolved = registry.name_of(value.type_id()).and_then(|name| {
			union
				.type_names
				.iter()
				.position(|type_name| type_name == name)
		});
		return match resolved {
			Some(branch) => {
				use integer_encoding::VarIntWriter;
				state
					.writer_mut()
					.write_varint(branch as i64)
					.map_err(SerError::io)?;
				let variant_node = state.config.schema.node(union.variants[branch]);
				let codec = registry
					.lookup(&union.type_names[branch])
					.expect("name was resolved from the registry");
				(codec.encode)(value, state, variant_node)
			}
			None => Err(SerError::new(
				"Could not resolve the value's runtime type to any union branch - \
					register it in the TypeRegistry under the branch's type name",
			)),
		};
	}
	match registry.name_of(value.type_id()).and_then(|n| registry.lookup(n)) {
		Some(codec) => (codec.encode)(value, state, node),
		// Unregistered values may still encode if they are native
		// primitives
		None => encode_native(value, state, node),
	}
}

fn encode_native<'c, 's>(
	value: &dyn Any,
	state: &mut SerializerState<'c, 's, Vec<u8>>,
	node: &'s Node,
) -> Result<(), SerError> {
	macro_rules! try_downcast {
		($($ty: ty,)*) => {
			$(
				if let Some(v) = value.downcast_ref::<$ty>() {
					return serde::Serialize::serialize(v, state.serializer_at(node));
				}
			)*
		};
	}
	try_downcast! {
		bool, i32, i64, f32, f64, String, (),
	}
	Err(SerError::new(
		"Value's runtime type is not registered and is not a native primitive",
	))
}

/// The registry key a schema node resolves through
fn resolution_name(schema: &Schema, node: &Node) -> Option<String> {
	Some(match node {
		Node::Record(record) => record.name.fully_qualified_name().to_owned(),
		Node::Enum(enum_) => enum_.name.fully_qualified_name().to_owned(),
		Node::Fixed(fixed) => fixed.name.fully_qualified_name().to_owned(),
		Node::Decimal(decimal) => match &decimal.repr {
			crate::schema::frozen::DecimalRepr::Fixed(fixed) => {
				fixed.name.fully_qualified_name().to_owned()
			}
			crate::schema::frozen::DecimalRepr::Bytes => "bytes.decimal".to_owned(),
		},
		Node::Array(items) => format!("array:{}", type_name(schema, schema.node(*items))),
		Node::Map(values) => format!("map:{}", type_name(schema, schema.node(*values))),
		Node::Null => "null".to_owned(),
		Node::Boolean => "boolean".to_owned(),
		Node::Int => "int".to_owned(),
		Node::Long => "long".to_owned(),
		Node::Float => "float".to_owned(),
		Node::Double => "double".to_owned(),
		Node::Bytes => "bytes".to_owned(),
		Node::String => "string".to_owned(),
		Node::Uuid => "string.uuid".to_owned(),
		Node::Date => "int.date".to_owned(),
		Node::TimeMillis => "int.time-millis".to_owned(),
		Node::TimeMicros => "long.time-micros".to_owned(),
		Node::TimestampMillis => "long.timestamp-millis".to_owned(),
		Node::TimestampMicros => "long.timestamp-micros".to_owned(),
		Node::Duration => "duration".to_owned(),
		Node::Union(_) => return None,
	})
}

fn type_name(schema: &Schema, node: &Node) -> String {
	resolution_name(schema, node).unwrap_or_else(|| "union".to_owned())
}

/// Memoizes schema-bound codecs by `(schema SHA-256 fingerprint, TypeId)`
///
/// Encoders and decoders are kept in separate maps. Writes are last-write-
/// wins: two threads binding the same key concurrently both succeed, one
/// result simply replaces the other (they are interchangeable). With
/// [`disable_caching`](Self::disable_caching) set, every call rebuilds
/// fresh.
#[derive(Default)]
pub struct CodecCache {
	/// Force fresh codec build per call
	pub disable_caching: bool,
	encoders: RwLock<HashMap<([u8; 32], TypeId), AnyCodec>>,
	decoders: RwLock<HashMap<([u8; 32], TypeId), AnyCodec>>,
}

impl CodecCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// The decoder for `(schema, T)`, memoized
	pub fn decoder_for<T>(&self, schema: &Schema) -> AnyCodec
	where
		T: serde::Serialize + serde::de::DeserializeOwned + Any,
	{
		Self::get_or_build::<T>(&self.decoders, schema, self.disable_caching)
	}

	/// The encoder for `(schema, T)`, memoized
	pub fn encoder_for<T>(&self, schema: &Schema) -> AnyCodec
	where
		T: serde::Serialize + serde::de::DeserializeOwned + Any,
	{
		Self::get_or_build::<T>(&self.encoders, schema, self.disable_caching)
	}

	fn get_or_build<T>(
		map: &RwLock<HashMap<([u8; 32], TypeId), AnyCodec>>,
		schema: &Schema,
		disable_caching: bool,
	) -> AnyCodec
	where
		T: serde::Serialize + serde::de::DeserializeOwned + Any,
	{
		if disable_caching {
			return AnyCodec::of::<T>();
		}
		let key = (*schema.sha256_fingerprint(), TypeId::of::<T>());
		if let Some(codec) = map
			.read()
			.expect("codec cache lock should not be poisoned")
			.get(&key)
		{
			return *codec;
		}
		let codec = AnyCodec::of::<T>();
		map.write()
			.expect("codec cache lock should not be poisoned")
			.insert(key, codec);
		codec
	}

	/// Decode a datum slice into `T` through the memoized decoder
	pub fn decode<T>(&self, slice: &[u8], schema: &Schema) -> Result<T, DeError>
	where
		T: serde::Serialize + serde::de::DeserializeOwned + Any,
	{
		let codec = self.decoder_for::<T>(schema);
		let mut state = DeserializerState::from_slice(slice, schema);
		let root = schema.root();
		let boxed = (codec.decode)(&mut state, root)?;
		Ok(*boxed
			.downcast::<T>()
			.expect("codec was built for this exact type"))
	}

	/// Encode a value through the memoized encoder
	pub fn encode<T>(&self, value: &T, config: &mut SerializerConfig<'_>) -> Result<Vec<u8>, SerError>
	where
		T: serde::Serialize + serde::de::DeserializeOwned + Any,
	{
		let codec = self.encoder_for::<T>(config.schema());
		let mut state = SerializerState::from_writer(Vec::new(), config);
		let root = state.config.schema.root();
		(codec.encode)(value, &mut state, root)?;
		Ok(state.into_writer())
	}
}
