//! The per-shape decoding building blocks the [`DatumDeserializer`] plugs
//! together

use super::*;

use crate::{
	schema::frozen::{Decimal, DecimalRepr, FieldAction, RecordField, Union},
	value::ValueDeserializer,
};

use std::num::NonZeroUsize;

pub(super) fn read_bool<'de, R, V>(
	state: &mut DeserializerState<'_, R>,
	visitor: V,
) -> Result<V::Value, DeError>
where
	R: ReadSlice<'de>,
	V: Visitor<'de>,
{
	visitor.visit_bool(state.read_slice(1, |s: &[u8]| match s[0] {
		0 => Ok(false),
		1 => Ok(true),
		other => Err(DeError::custom(format_args!(
			"Invalid byte value when deserializing boolean: {:?}",
			other
		))),
	})?)
}

pub(super) fn read_len<'de, R>(state: &mut DeserializerState<'_, R>) -> Result<usize, DeError>
where
	R: ReadSlice<'de>,
{
	let len: i64 = state.read_varint()?;
	len.try_into()
		.map_err(|e| DeError::custom(format_args!("Invalid length in stream: {e}")))
}

pub(super) fn read_length_delimited<'de, R, V>(
	state: &mut DeserializerState<'_, R>,
	visitor: V,
) -> Result<V::Value, DeError>
where
	R: ReadSlice<'de>,
	V: ReadVisitor<'de>,
{
	let len = read_len(state)?;
	state.read_slice(len, visitor)
}

pub(super) struct StringVisitor<V>(pub(super) V);
impl<'de, V: Visitor<'de>> ReadVisitor<'de> for StringVisitor<V> {
	type Value = V::Value;
	fn visit(self, bytes: &[u8]) -> Result<Self::Value, DeError> {
		self.0.visit_str(std::str::from_utf8(bytes).map_err(|e| {
			DeError::custom(format_args!("String is not valid utf-8: {e}"))
		})?)
	}
	fn visit_borrowed(self, bytes: &'de [u8]) -> Result<Self::Value, DeError> {
		self.0
			.visit_borrowed_str(std::str::from_utf8(bytes).map_err(|e| {
				DeError::custom(format_args!("String is not valid utf-8: {e}"))
			})?)
	}
}

pub(super) struct BytesVisitor<V>(pub(super) V);
impl<'de, V: Visitor<'de>> ReadVisitor<'de> for BytesVisitor<V> {
	type Value = V::Value;
	fn visit(self, bytes: &[u8]) -> Result<Self::Value, DeError> {
		self.0.visit_bytes(bytes)
	}
	fn visit_borrowed(self, bytes: &'de [u8]) -> Result<Self::Value, DeError> {
		self.0.visit_borrowed_bytes(bytes)
	}
}

pub(super) fn read_discriminant<'de, R>(
	state: &mut DeserializerState<'_, R>,
) -> Result<usize, DeError>
where
	R: ReadSlice<'de>,
{
	let discriminant: i64 = state.read_varint()?;
	discriminant
		.try_into()
		.map_err(|e| DeError::custom(format_args!("Invalid discriminant in stream: {e}")))
}

/// Read a union branch index and resolve the corresponding node
pub(super) fn read_union_variant<'de, 's, R>(
	state: &mut DeserializerState<'s, R>,
	union: &'s Union,
) -> Result<(usize, &'s Node), DeError>
where
	R: ReadSlice<'de>,
{
	let discriminant = read_discriminant(state)?;
	match union.variants.get(discriminant) {
		None => Err(DeError::new("Could not find union discriminant in schema")),
		Some(&variant_key) => Ok((discriminant, state.config.schema.node(variant_key))),
	}
}

pub(super) fn read_enum_symbol<'de, 's, R>(
	state: &mut DeserializerState<'s, R>,
	symbols: &'s [String],
) -> Result<&'s str, DeError>
where
	R: ReadSlice<'de>,
{
	let discriminant = read_discriminant(state)?;
	match symbols.get(discriminant) {
		None => Err(DeError::new("Could not find enum discriminant in schema")),
		Some(symbol) => Ok(symbol),
	}
}

fn read_block_len<'de, R>(state: &mut DeserializerState<'_, R>) -> Result<Option<NonZeroUsize>, DeError>
where
	R: ReadSlice<'de>,
{
	let len: i64 = state.read_varint()?;
	let res;
	if len < 0 {
		// res = -len, properly handling i64::MIN
		res = u64::from_ne_bytes(len.to_ne_bytes()).wrapping_neg();
		// A negative count is followed by the block's size in bytes (meant
		// for skipping); we decode sequentially so that value is dropped.
		// Since we don't use it, decode as u64 instead of i64 (skip zigzag
		// decoding).
		let _: u64 = state.read_varint()?;
	} else {
		res = len as u64;
	}
	res.try_into()
		.map_err(|e| DeError::custom(format_args!("Invalid array length in stream: {e}")))
		.map(NonZeroUsize::new)
}

/// Drives the two block forms (`[n, items…, 0]` and `[-n, byte_size,
/// items…, 0]`) behind a simple `has_more` interface
pub(super) struct BlockReader<'r, 's, R> {
	current_block_len: usize,
	n_read: usize,
	pub(super) state: &'r mut DeserializerState<'s, R>,
	pub(super) allowed_depth: AllowedDepth,
}
impl<'r, 's, R> BlockReader<'r, 's, R> {
	pub(super) fn new(state: &'r mut DeserializerState<'s, R>, allowed_depth: AllowedDepth) -> Self {
		Self {
			state,
			allowed_depth,
			current_block_len: 0,
			n_read: 0,
		}
	}
	fn has_more<'de>(&mut self) -> Result<bool, DeError>
	where
		R: ReadSlice<'de>,
	{
		self.current_block_len = match self.current_block_len.checked_sub(1) {
			None => {
				let new_len = read_block_len(self.state)?;
				match new_len {
					None => return Ok(false),
					Some(new_len) => {
						let l = new_len.get();
						let n_read = self.n_read.saturating_add(l);
						if n_read > self.state.config.max_slice_alloc_size {
							return Err(DeError::new(
								"Exceeding maximum allowed sequence size while deserializing",
							));
						}
						self.n_read = n_read;
						l
					}
				}
			}
			Some(new_len) => new_len,
		};
		Ok(true)
	}
}

pub(super) struct ArraySeqAccess<'r, 's, R> {
	pub(super) block_reader: BlockReader<'r, 's, R>,
	pub(super) element_schema: &'s Node,
}
impl<'de, R: ReadSlice<'de>> SeqAccess<'de> for ArraySeqAccess<'_, '_, R> {
	type Error = DeError;

	fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
	where
		T: DeserializeSeed<'de>,
	{
		if !self.block_reader.has_more()? {
			return Ok(None);
		}
		Ok(Some(seed.deserialize(DatumDeserializer {
			node: self.element_schema,
			state: &mut *self.block_reader.state,
			allowed_depth: self.block_reader.allowed_depth,
		})?))
	}
}

pub(super) struct MapMapAccess<'r, 's, R> {
	pub(super) block_reader: BlockReader<'r, 's, R>,
	pub(super) element_schema: &'s Node,
}
impl<'de, R: ReadSlice<'de>> MapAccess<'de> for MapMapAccess<'_, '_, R> {
	type Error = DeError;

	fn next_key_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
	where
		T: DeserializeSeed<'de>,
	{
		if !self.block_reader.has_more()? {
			return Ok(None);
		}
		// Map keys are always strings
		Ok(Some(seed.deserialize(MapKeyDeserializer {
			state: &mut *self.block_reader.state,
		})?))
	}

	fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
	where
		V: DeserializeSeed<'de>,
	{
		seed.deserialize(DatumDeserializer {
			node: self.element_schema,
			state: &mut *self.block_reader.state,
			allowed_depth: self.block_reader.allowed_depth,
		})
	}
}

struct MapKeyDeserializer<'r, 's, R> {
	state: &'r mut DeserializerState<'s, R>,
}
impl<'de, R: ReadSlice<'de>> Deserializer<'de> for MapKeyDeserializer<'_, '_, R> {
	type Error = DeError;

	fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		read_length_delimited(self.state, StringVisitor(visitor))
	}

	serde::forward_to_deserialize_any! {
		bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
		bytes byte_buf option unit unit_struct newtype_struct seq tuple
		tuple_struct map struct enum identifier ignored_any
	}
}

/// Record decoding: fields come in declaration order, except that fields
/// marked [`FieldAction::Skip`] are read and discarded without surfacing,
/// and fields marked [`FieldAction::SetDefault`] surface their parse-time
/// default without touching the wire
pub(super) struct RecordMapAccess<'r, 's, R> {
	pub(super) state: &'r mut DeserializerState<'s, R>,
	pub(super) fields: std::slice::Iter<'s, RecordField>,
	pub(super) current: Option<&'s RecordField>,
	pub(super) allowed_depth: AllowedDepth,
}

impl<'de, R: ReadSlice<'de>> MapAccess<'de> for RecordMapAccess<'_, '_, R> {
	type Error = DeError;

	fn next_key_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
	where
		T: DeserializeSeed<'de>,
	{
		for field in self.fields.by_ref() {
			match field.action {
				FieldAction::Skip => {
					let node = self.state.config.schema.node(field.schema);
					serde::de::IgnoredAny::deserialize(DatumDeserializer {
						state: &mut *self.state,
						node,
						allowed_depth: self.allowed_depth,
					})?;
				}
				FieldAction::None | FieldAction::SetDefault => {
					self.current = Some(field);
					return seed
						.deserialize(value::StrDeserializer::new(field.name.as_str()))
						.map(Some);
				}
			}
		}
		Ok(None)
	}

	fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
	where
		V: DeserializeSeed<'de>,
	{
		let field = self
			.current
			.take()
			.expect("next_value_seed called before next_key_seed");
		match field.action {
			FieldAction::SetDefault => seed.deserialize(ValueDeserializer::new(
				field
					.default
					.as_ref()
					.expect("SetDefault implies a default, checked at freeze time"),
			)),
			_ => {
				let node = self.state.config.schema.node(field.schema);
				seed.deserialize(DatumDeserializer {
					node,
					state: &mut *self.state,
					allowed_depth: self.allowed_depth,
				})
			}
		}
	}
}

/// A `duration` is three little-endian u32s: months, days, milliseconds
pub(super) struct DurationMapAndSeqAccess<'a> {
	pub(super) duration_buf: &'a [u8],
}

impl<'de> SeqAccess<'de> for DurationMapAndSeqAccess<'_> {
	type Error = DeError;

	fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
	where
		T: DeserializeSeed<'de>,
	{
		if self.duration_buf.is_empty() {
			return Ok(None);
		}
		let (le_bytes, rest) = self.duration_buf.split_at(4);
		self.duration_buf = rest;
		let value = u32::from_le_bytes(le_bytes.try_into().expect("we just split at 4"));
		seed.deserialize(value::U32Deserializer::new(value)).map(Some)
	}

	fn size_hint(&self) -> Option<usize> {
		Some(self.duration_buf.len() / 4)
	}
}

impl<'de> MapAccess<'de> for DurationMapAndSeqAccess<'_> {
	type Error = DeError;

	fn next_key_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
	where
		T: DeserializeSeed<'de>,
	{
		if self.duration_buf.is_empty() {
			return Ok(None);
		}
		let field_name = match self.duration_buf.len() {
			12 => "months",
			8 => "days",
			4 => "milliseconds",
			_ => unreachable!("buf advances four bytes at a time from twelve"),
		};
		seed.deserialize(value::StrDeserializer::new(field_name)).map(Some)
	}

	fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
	where
		V: DeserializeSeed<'de>,
	{
		let (le_bytes, rest) = self.duration_buf.split_at(4);
		self.duration_buf = rest;
		let value = u32::from_le_bytes(le_bytes.try_into().expect("we just split at 4"));
		seed.deserialize(value::U32Deserializer::new(value))
	}
}

#[derive(PartialEq, Eq)]
pub(super) enum VisitorHint {
	Str,
	U64,
	I64,
	U128,
	I128,
	F64,
}

/// Decimals are the scaled integer in two's-complement big-endian, over
/// `bytes` (length-delimited) or a `fixed`
pub(super) fn read_decimal<'de, R, V>(
	state: &mut DeserializerState<'_, R>,
	decimal: &Decimal,
	hint: VisitorHint,
	visitor: V,
) -> Result<V::Value, DeError>
where
	R: ReadSlice<'de>,
	V: Visitor<'de>,
{
	use rust_decimal::prelude::ToPrimitive as _;

	let size = match &decimal.repr {
		DecimalRepr::Bytes => read_len(state)?,
		DecimalRepr::Fixed(fixed) => fixed.size,
	};
	let mut buf = [0u8; 16];
	let start = buf.len().checked_sub(size).ok_or_else(|| {
		DeError::custom(format_args!(
			"Decimals of size larger than 16 are not supported (got size {size})"
		))
	})?;
	std::io::Read::read_exact(&mut state.reader, &mut buf[start..]).map_err(DeError::io)?;
	if buf.get(start).map_or(false, |&v| v & 0x80 != 0) {
		// Negative number in two's-complement: sign-extend to the full width
		for v in &mut buf[0..start] {
			*v = 0xFF;
		}
	}
	let unscaled = i128::from_be_bytes(buf);
	let scale = decimal.scale;
	if scale == 0 {
		match hint {
			VisitorHint::U64 => {
				if let Ok(v) = unscaled.try_into() {
					return visitor.visit_u64(v);
				} else if unscaled < 0 {
					return visitor.visit_i128(unscaled);
				}
			}
			VisitorHint::I64 => {
				return if let Ok(v) = unscaled.try_into() {
					visitor.visit_i64(v)
				} else {
					visitor.visit_i128(unscaled)
				};
			}
			VisitorHint::U128 => {
				return if let Ok(v) = unscaled.try_into() {
					visitor.visit_u128(v)
				} else {
					visitor.visit_i128(unscaled)
				};
			}
			VisitorHint::I128 => {
				return visitor.visit_i128(unscaled);
			}
			VisitorHint::Str | VisitorHint::F64 => {}
		}
	}
	let decimal = rust_decimal::Decimal::try_from_i128_with_scale(unscaled, scale)
		.map_err(|e| DeError::custom(format_args!("Could not parse decimal from i128: {e}")))?;
	if hint == VisitorHint::F64 {
		if let Some(float) = decimal.to_f64() {
			return visitor.visit_f64(float);
		}
	}
	serde::Serialize::serialize(&decimal, SerializeToVisitorStr(visitor, std::marker::PhantomData))
}

/// `rust_decimal`'s `serde-with-str` serialize impl renders without
/// allocating, so we route it straight into the `Visitor` provided by the
/// original `Deserialize` impl
struct SerializeToVisitorStr<'de, V: Visitor<'de>>(V, std::marker::PhantomData<&'de ()>);

impl<'de, V: Visitor<'de>> serde::Serializer for SerializeToVisitorStr<'de, V> {
	type Ok = V::Value;
	type Error = DeError;

	fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
		self.0.visit_str(v)
	}

	serde_serializer_quick_unsupported::serializer_unsupported! {
		err = (DeError::new("rust_decimal::Decimal should only serialize as str"));
		bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char bytes none some unit unit_struct
		unit_variant newtype_struct newtype_variant seq tuple tuple_struct tuple_variant map struct
		struct_variant i128 u128
	}
}
