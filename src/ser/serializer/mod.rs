mod blocks;
mod decimal;
mod extractors;
mod seq_or_tuple;
mod struct_or_map;

use super::*;

use crate::schema::frozen::{Decimal, DecimalRepr, Node, Union, ValueShape};

use {
	blocks::BlockWriter, seq_or_tuple::SerializeAsArrayOrDuration,
	struct_or_map::SerializeAsRecordOrMapOrDuration,
};

pub(crate) use decimal::{
	serialize as decimal_serialize, write_fixed_decimal as decimal_write_fixed,
};

/// Can't be instantiated directly - has to be constructed from a
/// [`SerializerState`]
pub struct DatumSerializer<'r, 'c, 's, W> {
	pub(super) state: &'r mut SerializerState<'c, 's, W>,
	pub(super) node: &'s Node,
}

impl<'r, 'c, 's, W: Write> Serializer for DatumSerializer<'r, 'c, 's, W> {
	type Ok = ();
	type Error = SerError;

	type SerializeSeq = SerializeAsArrayOrDuration<'r, 'c, 's, W>;
	type SerializeTuple = SerializeAsArrayOrDuration<'r, 'c, 's, W>;
	type SerializeTupleStruct = SerializeAsArrayOrDuration<'r, 'c, 's, W>;
	type SerializeTupleVariant = SerializeAsArrayOrDuration<'r, 'c, 's, W>;
	type SerializeMap = SerializeAsRecordOrMapOrDuration<'r, 'c, 's, W>;
	type SerializeStruct = SerializeAsRecordOrMapOrDuration<'r, 'c, 's, W>;
	type SerializeStructVariant = SerializeAsRecordOrMapOrDuration<'r, 'c, 's, W>;

	fn serialize_bool(self, v: bool) -> Result<Self::Ok, Self::Error> {
		match self.node {
			Node::Boolean => self
				.state
				.writer
				.write_all(&[v as u8])
				.map_err(SerError::io),
			Node::Union(union) => {
				self.serialize_union_unnamed(union, ValueShape::Boolean, |ser| {
					ser.serialize_bool(v)
				})
			}
			_ => Err(SerError::custom(format_args!(
				"Could not serialize bool to {:?}",
				self.node
			))),
		}
	}

	fn serialize_i8(self, v: i8) -> Result<Self::Ok, Self::Error> {
		self.serialize_integer(v)
	}

	fn serialize_i16(self, v: i16) -> Result<Self::Ok, Self::Error> {
		self.serialize_integer(v)
	}

	fn serialize_i32(self, v: i32) -> Result<Self::Ok, Self::Error> {
		self.serialize_integer(v)
	}

	fn serialize_i64(self, v: i64) -> Result<Self::Ok, Self::Error> {
		self.serialize_integer(v)
	}

	fn serialize_i128(self, v: i128) -> Result<Self::Ok, Self::Error> {
		self.serialize_integer(v)
	}

	fn serialize_u8(self, v: u8) -> Result<Self::Ok, Self::Error> {
		self.serialize_integer(v)
	}

	fn serialize_u16(self, v: u16) -> Result<Self::Ok, Self::Error> {
		self.serialize_integer(v)
	}

	fn serialize_u32(self, v: u32) -> Result<Self::Ok, Self::Error> {
		self.serialize_integer(v)
	}

	fn serialize_u64(self, v: u64) -> Result<Self::Ok, Self::Error> {
		self.serialize_integer(v)
	}

	fn serialize_u128(self, v: u128) -> Result<Self::Ok, Self::Error> {
		self.serialize_integer(v)
	}

	fn serialize_f32(self, v: f32) -> Result<Self::Ok, Self::Error> {
		match self.node {
			Node::Float => self
				.state
				.writer
				.write_all(&v.to_le_bytes())
				.map_err(SerError::io),
			// Widening f32 to double is lossless
			Node::Double => self
				.state
				.writer
				.write_all(&(v as f64).to_le_bytes())
				.map_err(SerError::io),
			Node::Union(union) => {
				self.serialize_union_unnamed(union, ValueShape::Float32, |ser| {
					ser.serialize_f32(v)
				})
			}
			_ => Err(SerError::custom(format_args!(
				"Could not serialize f32 to {:?}",
				self.node
			))),
		}
	}

	fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
		match self.node {
			Node::Double => self
				.state
				.writer
				.write_all(&v.to_le_bytes())
				.map_err(SerError::io),
			Node::Float => self
				.state
				.writer
				.write_all(&(v as f32).to_le_bytes())
				.map_err(SerError::io),
			Node::Decimal(decimal) => {
				let rust_decimal: rust_decimal::Decimal = num_traits::FromPrimitive::from_f64(v)
					.ok_or_else(|| {
						SerError::new(
							"f64 cannot be converted to decimal for serialization as Decimal",
						)
					})?;
				decimal::serialize(self.state, decimal, rust_decimal)
			}
			Node::Union(union) => {
				self.serialize_union_unnamed(union, ValueShape::Float64, |ser| {
					ser.serialize_f64(v)
				})
			}
			_ => Err(SerError::custom(format_args!(
				"Could not serialize f64 to {:?}",
				self.node
			))),
		}
	}

	fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
		self.serialize_str(v.encode_utf8(&mut [0u8; 4]))
	}

	fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
		match self.node {
			Node::String | Node::Bytes | Node::Uuid => self.state.write_length_delimited(v.as_bytes()),
			Node::Enum(enum_) => {
				let discriminant = enum_.per_name_lookup.get(v).copied().ok_or_else(|| {
					SerError::custom(format_args!(
						"Failed to find matching enum symbol for {v:?} in {enum_:?}"
					))
				})?;
				self.state
					.writer
					.write_varint::<i64>(discriminant.try_into().map_err(|_| {
						SerError::new("Number does not fit i64 for encoding as Enum discriminant")
					})?)
					.map_err(SerError::io)?;
				Ok(())
			}
			Node::Fixed(fixed) => {
				if fixed.size != v.len() {
					Err(SerError::new(
						"Can't serialize str as Fixed: str's len does not match Fixed's size",
					))
				} else {
					self.state
						.writer
						.write_all(v.as_bytes())
						.map_err(SerError::io)
				}
			}
			Node::Decimal(decimal) => {
				let rust_decimal: rust_decimal::Decimal = v.parse().map_err(|parse_err| {
					SerError::custom(format_args!(
						"str cannot be converted to decimal for serialization as Decimal: {}",
						parse_err
					))
				})?;
				decimal::serialize(self.state, decimal, rust_decimal)
			}
			Node::Union(union) => {
				self.serialize_union_unnamed(union, ValueShape::Text, |ser| {
					ser.serialize_str(v)
				})
			}
			_ => Err(SerError::custom(format_args!(
				"Could not serialize str to {:?}",
				self.node
			))),
		}
	}

	fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
		match self.node {
			Node::Bytes | Node::String => self.state.write_length_delimited(v),
			Node::Fixed(fixed) => {
				if fixed.size != v.len() {
					Err(SerError::new(
						"Can't serialize &[u8] as Fixed: slice's len does not match Fixed's size",
					))
				} else {
					self.state.writer.write_all(v).map_err(SerError::io)
				}
			}
			Node::Duration => {
				// In that case we assume that it's the raw value. This is
				// the most efficient way to deserialize it then re-serialize
				// it if you're not doing anything else with it.
				if v.len() != 12 {
					Err(SerError::new(
						"&[u8] can be serialized as Duration, but only if it's of length 12",
					))
				} else {
					self.state.writer.write_all(v).map_err(SerError::io)
				}
			}
			Node::Union(union) => {
				self.serialize_union_unnamed(union, ValueShape::Bytes, |ser| {
					ser.serialize_bytes(v)
				})
			}
			_ => Err(SerError::custom(format_args!(
				"Could not serialize bytes to {:?}",
				self.node
			))),
		}
	}

	fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
		self.serialize_unit()
	}

	fn serialize_some<T: ?Sized>(self, value: &T) -> Result<Self::Ok, Self::Error>
	where
		T: Serialize,
	{
		// If there are union lookups to do, they can be performed directly
		// by the functions that serialize the value
		value.serialize(self)
	}

	fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
		match self.node {
			Node::Null => Ok(()),
			Node::Union(union) => {
				self.serialize_union_unnamed(union, ValueShape::Null, |_| Ok(()))
			}
			_ => Err(SerError::custom(format_args!(
				"Could not serialize unit to {:?}",
				self.node
			))),
		}
	}

	fn serialize_unit_struct(self, name: &'static str) -> Result<Self::Ok, Self::Error> {
		match self.node {
			Node::Null => Ok(()),
			Node::String | Node::Bytes | Node::Enum(_) => self.serialize_str(name),
			Node::Union(union) => {
				self.serialize_union_unnamed(union, ValueShape::Identifier, |ser| {
					ser.serialize_unit_struct(name)
				})
			}
			_ => Err(SerError::custom(format_args!(
				"Could not serialize unit struct to {:?}",
				self.node
			))),
		}
	}

	fn serialize_unit_variant(
		self,
		name: &'static str,
		variant_index: u32,
		variant: &'static str,
	) -> Result<Self::Ok, Self::Error> {
		match self.node {
			Node::Null if variant == "Null" || variant == "null" => Ok(()),
			Node::String | Node::Bytes | Node::Enum(_) => self.serialize_str(variant),
			Node::Union(union) => match union.per_type_lookup.named(variant) {
				Some((discriminant, variant_key)) => {
					self.state
						.writer
						.write_varint(discriminant)
						.map_err(SerError::io)?;
					DatumSerializer {
						node: self.state.config.schema.node(variant_key),
						state: self.state,
					}
					.serialize_unit_variant(name, variant_index, variant)
				}
				None => {
					self.serialize_union_unnamed(union, ValueShape::Identifier, |ser| {
						ser.serialize_unit_variant(name, variant_index, variant)
					})
				}
			},
			_ => Err(SerError::custom(format_args!(
				"Could not serialize unit variant to {:?}",
				self.node
			))),
		}
	}

	fn serialize_newtype_struct<T: ?Sized>(
		self,
		name: &'static str,
		value: &T,
	) -> Result<Self::Ok, Self::Error>
	where
		T: Serialize,
	{
		self.serialize_lookup_union_variant_by_name(name, |serializer| value.serialize(serializer))
	}

	fn serialize_newtype_variant<T: ?Sized>(
		self,
		_name: &'static str,
		_variant_index: u32,
		variant: &'static str,
		value: &T,
	) -> Result<Self::Ok, Self::Error>
	where
		T: Serialize,
	{
		self.serialize_lookup_union_variant_by_name(variant, |serializer| {
			value.serialize(serializer)
		})
	}

	fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
		match *self.node {
			Node::Array(items) => Ok(SerializeAsArrayOrDuration::array(
				BlockWriter::new(self.state),
				items,
			)),
			Node::Duration => {
				if len.map_or(false, |l| l != 3) {
					Err(seq_or_tuple::duration_seq_len_incorrect())
				} else {
					Ok(SerializeAsArrayOrDuration::duration(self.state))
				}
			}
			Node::Union(ref union) => self.serialize_union_unnamed(
				union,
				ValueShape::Sequence,
				|ser| ser.serialize_seq(len),
			),
			_ => Err(SerError::custom(format_args!(
				"Could not serialize sequence, tuple or tuple struct to {:?}",
				self.node
			))),
		}
	}

	fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
		self.serialize_seq(Some(len))
	}

	fn serialize_tuple_struct(
		self,
		_name: &'static str,
		len: usize,
	) -> Result<Self::SerializeTupleStruct, Self::Error> {
		self.serialize_seq(Some(len))
	}

	fn serialize_tuple_variant(
		self,
		_name: &'static str,
		_variant_index: u32,
		variant: &'static str,
		len: usize,
	) -> Result<Self::SerializeTupleVariant, Self::Error> {
		self.serialize_lookup_union_variant_by_name(variant, |serializer| {
			serializer.serialize_seq(Some(len))
		})
	}

	fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
		match *self.node {
			Node::Record(ref record) => {
				Ok(SerializeAsRecordOrMapOrDuration::record(self.state, record))
			}
			Node::Map(values) => Ok(SerializeAsRecordOrMapOrDuration::map(self.state, values)),
			Node::Duration => {
				if len.map_or(false, |l| l != 3) {
					return Err(struct_or_map::duration_fields_incorrect());
				}
				Ok(SerializeAsRecordOrMapOrDuration::duration(self.state))
			}
			Node::Union(ref union) => {
				self.serialize_union_unnamed(union, ValueShape::MapLike, |ser| {
					ser.serialize_map(len)
				})
			}
			_ => Err(SerError::custom(format_args!(
				"Could not serialize map to {:?}",
				self.node
			))),
		}
	}

	fn serialize_struct(
		self,
		name: &'static str,
		len: usize,
	) -> Result<Self::SerializeStruct, Self::Error> {
		self.serialize_struct_or_struct_variant(name, len)
	}

	fn serialize_struct_variant(
		self,
		_name: &'static str,
		_variant_index: u32,
		variant: &'static str,
		len: usize,
	) -> Result<Self::SerializeStructVariant, Self::Error> {
		self.serialize_struct_or_struct_variant(variant, len)
	}
}

impl<'r, 'c, 's, W: Write> DatumSerializer<'r, 'c, 's, W> {
	fn serialize_union_unnamed<O>(
		self,
		union: &'s Union,
		shape: ValueShape,
		with_serializer: impl FnOnce(Self) -> Result<O, SerError>,
	) -> Result<O, SerError> {
		match union.per_type_lookup.by_shape(shape) {
			None => Err(SerError::custom(format_args!(
				"Could not serialize {:?} to {:?} - \
					if you need to explicit a variant because it can't be figured out \
					automatically, consider using an enum or newtype struct to \
					serialize this field",
				shape, self.node
			))),
			Some((discriminant, variant_key)) => {
				self.state
					.writer
					.write_varint(discriminant)
					.map_err(SerError::io)?;
				with_serializer(Self {
					node: self.state.config.schema.node(variant_key),
					state: self.state,
				})
			}
		}
	}

	fn serialize_integer<N>(self, num: N) -> Result<(), SerError>
	where
		N: TryInto<i64> + TryInto<i32> + TryInto<i128> + Copy,
	{
		match self.node {
			Node::Int | Node::Date | Node::TimeMillis => {
				self.state
					.writer
					.write_varint::<i32>(num.try_into().map_err(|_| {
						SerError::new("Number does not fit i32 for encoding as Int")
					})?)
					.map_err(SerError::io)?;
				Ok(())
			}
			Node::Long | Node::TimestampMillis | Node::TimestampMicros | Node::TimeMicros => {
				self.state
					.writer
					.write_varint::<i64>(num.try_into().map_err(|_| {
						SerError::new("Number does not fit i64 for encoding as Long")
					})?)
					.map_err(SerError::io)?;
				Ok(())
			}
			// Integers widen along the promotion chain
			Node::Float => {
				let n: i128 = num.try_into().map_err(|_| {
					SerError::new("Number does not fit i128 for encoding as Float")
				})?;
				self.state
					.writer
					.write_all(&(n as f32).to_le_bytes())
					.map_err(SerError::io)
			}
			Node::Double => {
				let n: i128 = num.try_into().map_err(|_| {
					SerError::new("Number does not fit i128 for encoding as Double")
				})?;
				self.state
					.writer
					.write_all(&(n as f64).to_le_bytes())
					.map_err(SerError::io)
			}
			Node::Decimal(decimal) => {
				let n: i128 = num.try_into().map_err(|_| {
					SerError::new("Number does not fit i128 for encoding as Decimal")
				})?;
				let scaled = 10i128
					.checked_pow(decimal.scale)
					.and_then(|pow| n.checked_mul(pow))
					.ok_or_else(|| {
						SerError::new(
							"Integer to be encoded as decimal, multiplied by 10^scale \
								is too large to fit in an i128. This is unsupported.",
						)
					})?;
				let bytes = scaled.to_be_bytes();
				match &decimal.repr {
					DecimalRepr::Bytes => {
						let start = decimal::redundant_sign_bytes(&bytes);
						let trimmed = &bytes[start..];
						self.state
							.writer
							.write_varint::<i64>(trimmed.len() as i64)
							.map_err(SerError::io)?;
						self.state.writer.write_all(trimmed).map_err(SerError::io)
					}
					DecimalRepr::Fixed(fixed) => {
						decimal::write_fixed_decimal(self.state, &bytes, fixed.size)
					}
				}
			}
			Node::Enum(_) => {
				self.state
					.writer
					.write_varint::<i64>(num.try_into().map_err(|_| {
						SerError::new("Number does not fit i64 for encoding as Enum discriminant")
					})?)
					.map_err(SerError::io)?;
				Ok(())
			}
			Node::Union(union) => self.serialize_union_unnamed(
				union,
				match std::mem::size_of::<N>() {
					4 => ValueShape::Int32,
					8 => ValueShape::Int64,
					_ => ValueShape::IntAny,
				},
				|ser| ser.serialize_integer(num),
			),
			_ => Err(SerError::custom(format_args!(
				"Could not serialize integer to {:?}",
				self.node
			))),
		}
	}

	fn serialize_lookup_union_variant_by_name<O>(
		self,
		variant_name: &str,
		f: impl FnOnce(DatumSerializer<'r, 'c, 's, W>) -> Result<O, SerError>,
	) -> Result<O, SerError> {
		match self.node {
			Node::Union(union) => match union.per_type_lookup.named(variant_name) {
				None => {
					// Variant name doesn't hint us, fallback to trying to
					// deduce from serialized type
					f(self)
				}
				Some((discriminant, variant_key)) => {
					self.state
						.writer
						.write_varint(discriminant)
						.map_err(SerError::io)?;
					f(DatumSerializer {
						node: self.state.config.schema.node(variant_key),
						state: self.state,
					})
				}
			},
			_ => f(self),
		}
	}

	fn serialize_struct_or_struct_variant(
		self,
		variant_or_struct_name: &str,
		len: usize,
	) -> Result<SerializeAsRecordOrMapOrDuration<'r, 'c, 's, W>, SerError> {
		self.serialize_lookup_union_variant_by_name(variant_or_struct_name, |serializer| {
			match *serializer.node {
				Node::Record(ref record) => Ok(SerializeAsRecordOrMapOrDuration::record(
					serializer.state,
					record,
				)),
				Node::Map(values) => Ok(SerializeAsRecordOrMapOrDuration::map(
					serializer.state,
					values,
				)),
				Node::Duration => {
					if len != 3 {
						return Err(struct_or_map::duration_fields_incorrect());
					}
					Ok(SerializeAsRecordOrMapOrDuration::duration(serializer.state))
				}
				Node::Union(ref union) => serializer.serialize_union_unnamed(
					union,
					ValueShape::MapLike,
					|ser| ser.serialize_struct_or_struct_variant(variant_or_struct_name, len),
				),
				_ => Err(SerError::custom(format_args!(
					"Could not serialize struct to {:?}",
					serializer.node
				))),
			}
		})
	}
}
