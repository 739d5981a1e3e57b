mod types;

use types::*;

use super::*;

use crate::schema::frozen::Node;

/// Can't be instantiated directly - has to be constructed from a
/// [`DeserializerState`]
pub struct DatumDeserializer<'r, 's, R> {
	pub(super) state: &'r mut DeserializerState<'s, R>,
	pub(super) node: &'s Node,
	pub(super) allowed_depth: AllowedDepth,
}

/// Remaining depth budget for this deserialization
///
/// Recursive schemas are legal (through conditional paths), so the
/// deserializer bounds its recursion explicitly instead of hoping for the
/// best with regards to stack overflows.
#[derive(Clone, Copy)]
pub(crate) struct AllowedDepth {
	depth: usize,
}

impl AllowedDepth {
	pub(crate) fn new(depth: usize) -> Self {
		Self { depth }
	}

	pub(crate) fn dec(self) -> Result<Self, DeError> {
		match self.depth.checked_sub(1) {
			Some(depth) => Ok(Self { depth }),
			None => Err(DeError::new(
				"Datum is deeper than the configured maximum depth",
			)),
		}
	}
}

impl<'de, R: ReadSlice<'de>> Deserializer<'de> for DatumDeserializer<'_, '_, R> {
	type Error = DeError;

	fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		match *self.node {
			Node::Null => visitor.visit_unit(),
			Node::Boolean => read_bool(self.state, visitor),
			Node::Int => visitor.visit_i32(self.state.read_varint()?),
			Node::Long => visitor.visit_i64(self.state.read_varint()?),
			Node::Float => {
				visitor.visit_f32(f32::from_le_bytes(self.state.read_const_size_buf()?))
			}
			Node::Double => {
				visitor.visit_f64(f64::from_le_bytes(self.state.read_const_size_buf()?))
			}
			Node::Bytes => read_length_delimited(self.state, BytesVisitor(visitor)),
			Node::String => read_length_delimited(self.state, StringVisitor(visitor)),
			Node::Array(items) => {
				let items = self.state.config.schema.node(items);
				visitor.visit_seq(ArraySeqAccess {
					element_schema: items,
					block_reader: BlockReader::new(self.state, self.allowed_depth.dec()?),
				})
			}
			Node::Map(values) => {
				let values = self.state.config.schema.node(values);
				visitor.visit_map(MapMapAccess {
					element_schema: values,
					block_reader: BlockReader::new(self.state, self.allowed_depth.dec()?),
				})
			}
			Node::Union(ref union) => Self {
				node: read_union_variant(self.state, union)?.1,
				state: self.state,
				allowed_depth: self.allowed_depth.dec()?,
			}
			.deserialize_any(visitor),
			Node::Record(ref record) => {
				// NB: infinite recursion is prevented here by the
				// zero-sized-cycle check at schema construction plus the
				// allowed_depth budget
				visitor.visit_map(RecordMapAccess {
					fields: record.fields.iter(),
					current: None,
					state: self.state,
					allowed_depth: self.allowed_depth.dec()?,
				})
			}
			Node::Enum(ref enum_) => {
				visitor.visit_str(read_enum_symbol(self.state, &enum_.symbols)?)
			}
			Node::Fixed(ref fixed) => self.state.read_slice(fixed.size, BytesVisitor(visitor)),
			Node::Decimal(ref decimal) => {
				read_decimal(self.state, decimal, VisitorHint::Str, visitor)
			}
			Node::Uuid => read_length_delimited(self.state, StringVisitor(visitor)),
			Node::Date => visitor.visit_i32(self.state.read_varint()?),
			Node::TimeMillis => visitor.visit_i32(self.state.read_varint()?),
			Node::TimeMicros => visitor.visit_i64(self.state.read_varint()?),
			Node::TimestampMillis => visitor.visit_i64(self.state.read_varint()?),
			Node::TimestampMicros => visitor.visit_i64(self.state.read_varint()?),
			Node::Duration => visitor.visit_map(DurationMapAndSeqAccess {
				duration_buf: &self.state.read_const_size_buf::<12>()?,
			}),
		}
	}

	serde::forward_to_deserialize_any! {
		bool i8 i16 i32 u8 u16 u32 f32 char
		unit unit_struct
	}

	fn deserialize_newtype_struct<V>(
		self,
		_: &'static str,
		visitor: V,
	) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		visitor.visit_newtype_struct(self)
	}

	fn deserialize_u64<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		// Allow deserializing discriminants without making the string lookup
		// for enums
		match *self.node {
			Node::Enum(_) => {
				let discriminant: i64 = self.state.read_varint()?;
				visitor.visit_u64(discriminant.try_into().map_err(|e| {
					DeError::custom(format_args!("Got negative enum discriminant: {e}"))
				})?)
			}
			Node::Decimal(ref decimal) => {
				read_decimal(self.state, decimal, VisitorHint::U64, visitor)
			}
			_ => self.deserialize_any(visitor),
		}
	}

	fn deserialize_i64<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		match *self.node {
			Node::Long => visitor.visit_i64(self.state.read_varint()?),
			Node::Decimal(ref decimal) => {
				read_decimal(self.state, decimal, VisitorHint::I64, visitor)
			}
			_ => self.deserialize_any(visitor),
		}
	}

	fn deserialize_u128<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		match *self.node {
			Node::Decimal(ref decimal) => {
				read_decimal(self.state, decimal, VisitorHint::U128, visitor)
			}
			_ => self.deserialize_any(visitor),
		}
	}

	fn deserialize_i128<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		match *self.node {
			Node::Decimal(ref decimal) => {
				read_decimal(self.state, decimal, VisitorHint::I128, visitor)
			}
			_ => self.deserialize_any(visitor),
		}
	}

	fn deserialize_f64<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		match *self.node {
			Node::Double => {
				visitor.visit_f64(f64::from_le_bytes(self.state.read_const_size_buf()?))
			}
			Node::Decimal(ref decimal) => {
				read_decimal(self.state, decimal, VisitorHint::F64, visitor)
			}
			_ => self.deserialize_any(visitor),
		}
	}

	fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		// If we get hinted on str, we may attempt to deserialize byte arrays
		// as utf-8 encoded strings
		match *self.node {
			Node::String | Node::Bytes => read_length_delimited(self.state, StringVisitor(visitor)),
			Node::Fixed(ref fixed) => self.state.read_slice(fixed.size, StringVisitor(visitor)),
			_ => self.deserialize_any(visitor),
		}
	}

	fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		self.deserialize_str(visitor)
	}

	fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		match *self.node {
			Node::Bytes => read_length_delimited(self.state, BytesVisitor(visitor)),
			Node::Duration => self.state.read_slice(12, BytesVisitor(visitor)),
			_ => self.deserialize_any(visitor),
		}
	}

	fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		self.deserialize_bytes(visitor)
	}

	fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		match *self.node {
			Node::Null => visitor.visit_none(),
			Node::Union(ref union) => {
				let (variant_idx, variant_node) = read_union_variant(self.state, union)?;
				if union.null_variant == Some(variant_idx) {
					visitor.visit_none()
				} else {
					// An `Option` target really matches a *nullable* union
					// (two branches, one null), but a value of any other
					// union decodes into `Some` just fine
					visitor.visit_some(DatumDeserializer {
						state: self.state,
						node: variant_node,
						allowed_depth: self.allowed_depth.dec()?,
					})
				}
			}
			_ => visitor.visit_some(self),
		}
	}

	fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		match *self.node {
			Node::Array(items) => {
				let items = self.state.config.schema.node(items);
				visitor.visit_seq(ArraySeqAccess {
					element_schema: items,
					block_reader: BlockReader::new(self.state, self.allowed_depth.dec()?),
				})
			}
			Node::Duration => visitor.visit_seq(DurationMapAndSeqAccess {
				duration_buf: &self.state.read_const_size_buf::<12>()?,
			}),
			_ => self.deserialize_any(visitor),
		}
	}

	fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		// Allows deserializing Duration as (u32, u32, u32)
		match *self.node {
			Node::Duration if len == 3 => visitor.visit_seq(DurationMapAndSeqAccess {
				duration_buf: &self.state.read_const_size_buf::<12>()?,
			}),
			_ => self.deserialize_seq(visitor),
		}
	}

	fn deserialize_tuple_struct<V>(
		self,
		_: &'static str,
		len: usize,
		visitor: V,
	) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		self.deserialize_tuple(len, visitor)
	}

	fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		self.deserialize_any(visitor)
	}

	fn deserialize_struct<V>(
		self,
		_: &'static str,
		_: &'static [&'static str],
		visitor: V,
	) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		self.deserialize_map(visitor)
	}

	fn deserialize_enum<V>(
		self,
		_: &'static str,
		_: &'static [&'static str],
		visitor: V,
	) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		match *self.node {
			// Unions decode through the branch type name: the target type
			// declares which branch it holds
			Node::Union(ref union) => {
				let (variant_idx, variant_node) = read_union_variant(self.state, union)?;
				visitor.visit_enum(SchemaTypeNameEnumAccess {
					type_name: &union.type_names[variant_idx],
					variant_node,
					state: self.state,
					allowed_depth: self.allowed_depth.dec()?,
				})
			}
			// Enum symbols decode as unit variants
			Node::Enum(ref enum_) => visitor.visit_enum(value::StrDeserializer::new(
				read_enum_symbol(self.state, &enum_.symbols)?,
			)),
			// Anything else may still serve as a unit variant identifier
			// (e.g. deserializing a string into a fieldless enum)
			_ => visitor.visit_enum(UnitVariantEnumAccess {
				state: self.state,
				node: self.node,
				allowed_depth: self.allowed_depth,
			}),
		}
	}

	fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		match *self.node {
			Node::Int => visitor.visit_u64({
				let val: i32 = self.state.read_varint()?;
				val.try_into()
					.map_err(|_| DeError::new("Failed to convert i32 to u64 for enum identifier"))?
			}),
			Node::Long => visitor.visit_u64({
				let val: i64 = self.state.read_varint()?;
				val.try_into()
					.map_err(|_| DeError::new("Failed to convert i64 to u64 for enum identifier"))?
			}),
			_ => self.deserialize_any(visitor),
		}
	}

	fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		// The main thing we can skip here for performance is utf8 decoding
		// of strings. We still need to drive the deserializer mostly
		// normally to properly advance the reader.
		match *self.node {
			Node::String => read_length_delimited(self.state, BytesVisitor(visitor)),
			_ => self.deserialize_any(visitor),
		}
	}
}

/// [`EnumAccess`] where the variant is picked by the union branch type name
pub(super) struct SchemaTypeNameEnumAccess<'r, 's, R> {
	state: &'r mut DeserializerState<'s, R>,
	type_name: &'s str,
	variant_node: &'s Node,
	allowed_depth: AllowedDepth,
}

impl<'de, 'r, 's, R: ReadSlice<'de>> EnumAccess<'de> for SchemaTypeNameEnumAccess<'r, 's, R> {
	type Error = DeError;
	type Variant = SchemaTypeNameVariantAccess<'r, 's, R>;

	fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant), Self::Error>
	where
		V: DeserializeSeed<'de>,
	{
		Ok((
			seed.deserialize(value::StrDeserializer::new(self.type_name))?,
			SchemaTypeNameVariantAccess {
				state: self.state,
				variant_node: self.variant_node,
				allowed_depth: self.allowed_depth,
			},
		))
	}
}

pub(super) struct SchemaTypeNameVariantAccess<'r, 's, R> {
	state: &'r mut DeserializerState<'s, R>,
	variant_node: &'s Node,
	allowed_depth: AllowedDepth,
}

impl<'r, 's, R> SchemaTypeNameVariantAccess<'r, 's, R> {
	fn deserializer(self) -> DatumDeserializer<'r, 's, R> {
		DatumDeserializer {
			state: self.state,
			node: self.variant_node,
			allowed_depth: self.allowed_depth,
		}
	}
}

impl<'de, R: ReadSlice<'de>> VariantAccess<'de> for SchemaTypeNameVariantAccess<'_, '_, R> {
	type Error = DeError;

	fn unit_variant(self) -> Result<(), Self::Error> {
		// The wire value still needs to be consumed
		serde::de::IgnoredAny::deserialize(self.deserializer())?;
		Ok(())
	}

	fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, Self::Error>
	where
		T: DeserializeSeed<'de>,
	{
		seed.deserialize(self.deserializer())
	}

	fn tuple_variant<V>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		self.deserializer().deserialize_tuple(len, visitor)
	}

	fn struct_variant<V>(
		self,
		fields: &'static [&'static str],
		visitor: V,
	) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		self.deserializer().deserialize_struct("", fields, visitor)
	}
}

/// [`EnumAccess`] where the value itself (a string, an enum symbol, an
/// int...) is the variant identifier, with no inner value
pub(super) struct UnitVariantEnumAccess<'r, 's, R> {
	state: &'r mut DeserializerState<'s, R>,
	node: &'s Node,
	allowed_depth: AllowedDepth,
}

impl<'de, R: ReadSlice<'de>> EnumAccess<'de> for UnitVariantEnumAccess<'_, '_, R> {
	type Error = DeError;
	type Variant = private::UnitOnly;

	fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant), Self::Error>
	where
		V: DeserializeSeed<'de>,
	{
		seed.deserialize(DatumDeserializer {
			state: self.state,
			node: self.node,
			allowed_depth: self.allowed_depth,
		})
		.map(|value| (value, private::UnitOnly))
	}
}

// Inspired from serde's:

mod private {
	use super::*;

	pub(in super::super) struct UnitOnly;

	impl<'de> VariantAccess<'de> for UnitOnly {
		type Error = DeError;

		fn unit_variant(self) -> Result<(), Self::Error> {
			Ok(())
		}

		fn newtype_variant_seed<T>(self, _seed: T) -> Result<T::Value, Self::Error>
		where
			T: DeserializeSeed<'de>,
		{
			Err(Error::invalid_type(
				Unexpected::UnitVariant,
				&"newtype variant",
			))
		}

		fn tuple_variant<V>(self, _len: usize, _visitor: V) -> Result<V::Value, Self::Error>
		where
			V: Visitor<'de>,
		{
			Err(Error::invalid_type(
				Unexpected::UnitVariant,
				&"tuple variant",
			))
		}

		fn struct_variant<V>(
			self,
			_fields: &'static [&'static str],
			_visitor: V,
		) -> Result<V::Value, Self::Error>
		where
			V: Visitor<'de>,
		{
			Err(Error::invalid_type(
				Unexpected::UnitVariant,
				&"struct variant",
			))
		}
	}
}
