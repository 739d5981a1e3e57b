//! A [`serde::Deserializer`] over an in-memory [`Value`]
//!
//! This is how fields marked to decode from their schema default get
//! materialized into application types without touching the wire, and how
//! registered types get built from already-decoded dynamic values.

use super::Value;

use crate::de::DeError;

use serde::de::*;

/// Deserializes any `T: Deserialize` from a borrowed [`Value`]
#[derive(Clone, Copy)]
pub struct ValueDeserializer<'a> {
	value: &'a Value,
}

impl<'a> ValueDeserializer<'a> {
	pub fn new(value: &'a Value) -> Self {
		Self { value }
	}
}

impl<'de, 'a> Deserializer<'de> for ValueDeserializer<'a> {
	type Error = DeError;

	fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		match self.value {
			Value::Null => visitor.visit_unit(),
			Value::Boolean(v) => visitor.visit_bool(*v),
			Value::Int(v) | Value::Date(v) | Value::TimeMillis(v) => visitor.visit_i32(*v),
			Value::Long(v)
			| Value::TimeMicros(v)
			| Value::TimestampMillis(v)
			| Value::TimestampMicros(v) => visitor.visit_i64(*v),
			Value::Float(v) => visitor.visit_f32(*v),
			Value::Double(v) => visitor.visit_f64(*v),
			Value::Bytes(bytes) | Value::Fixed(bytes) => visitor.visit_bytes(bytes),
			Value::String(s) | Value::Enum(s) | Value::Uuid(s) => visitor.visit_str(s),
			Value::Array(values) => visitor.visit_seq(SeqValueAccess { values: values.iter() }),
			Value::Map(entries) => visitor.visit_map(MapValueAccess {
				entries: entries.iter().map(|(k, v)| (k.as_str(), v)),
				pending: None,
			}),
			Value::Record(fields) => visitor.visit_map(MapValueAccess {
				entries: fields.iter().map(|(k, v)| (k.as_str(), v)),
				pending: None,
			}),
			// Transparent: the wrapper only matters for deserialize_enum /
			// deserialize_option
			Value::Union(union_value) => {
				ValueDeserializer::new(&union_value.value).deserialize_any(visitor)
			}
			Value::Decimal(decimal) => visitor.visit_string(decimal.to_string()),
			Value::Duration(duration) => visitor.visit_seq(SeqU32Access {
				values: [duration.months, duration.days, duration.milliseconds],
				next: 0,
			}),
		}
	}

	fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		match self.value {
			Value::Null => visitor.visit_none(),
			Value::Union(union_value) => match &union_value.value {
				Value::Null => visitor.visit_none(),
				inner => visitor.visit_some(ValueDeserializer::new(inner)),
			},
			_ => visitor.visit_some(self),
		}
	}

	fn deserialize_enum<V>(
		self,
		_name: &'static str,
		_variants: &'static [&'static str],
		visitor: V,
	) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		match self.value {
			Value::Enum(symbol) => visitor.visit_enum(value::StrDeserializer::new(symbol)),
			Value::String(s) => visitor.visit_enum(value::StrDeserializer::new(s)),
			Value::Union(union_value) => visitor.visit_enum(UnionValueEnumAccess {
				type_name: &union_value.type_name,
				value: &union_value.value,
			}),
			_ => self.deserialize_any(visitor),
		}
	}

	fn deserialize_newtype_struct<V>(
		self,
		_name: &'static str,
		visitor: V,
	) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		visitor.visit_newtype_struct(self)
	}

	serde::forward_to_deserialize_any! {
		bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
		bytes byte_buf unit unit_struct seq tuple
		tuple_struct map struct identifier ignored_any
	}
}

struct SeqValueAccess<'a> {
	values: std::slice::Iter<'a, Value>,
}

impl<'de, 'a> SeqAccess<'de> for SeqValueAccess<'a> {
	type Error = DeError;

	fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
	where
		T: DeserializeSeed<'de>,
	{
		match self.values.next() {
			None => Ok(None),
			Some(value) => seed.deserialize(ValueDeserializer::new(value)).map(Some),
		}
	}

	fn size_hint(&self) -> Option<usize> {
		Some(self.values.len())
	}
}

struct SeqU32Access {
	values: [u32; 3],
	next: usize,
}

impl<'de> SeqAccess<'de> for SeqU32Access {
	type Error = DeError;

	fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
	where
		T: DeserializeSeed<'de>,
	{
		match self.values.get(self.next) {
			None => Ok(None),
			Some(&v) => {
				self.next += 1;
				seed.deserialize(value::U32Deserializer::new(v)).map(Some)
			}
		}
	}
}

struct MapValueAccess<'a, I> {
	entries: I,
	pending: Option<&'a Value>,
}

impl<'de, 'a, I> MapAccess<'de> for MapValueAccess<'a, I>
where
	I: Iterator<Item = (&'a str, &'a Value)>,
{
	type Error = DeError;

	fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
	where
		K: DeserializeSeed<'de>,
	{
		match self.entries.next() {
			None => Ok(None),
			Some((key, value)) => {
				self.pending = Some(value);
				seed.deserialize(value::StrDeserializer::new(key)).map(Some)
			}
		}
	}

	fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
	where
		V: DeserializeSeed<'de>,
	{
		let value = self
			.pending
			.take()
			.expect("next_value_seed called before next_key_seed");
		seed.deserialize(ValueDeserializer::new(value))
	}
}

struct UnionValueEnumAccess<'a> {
	type_name: &'a str,
	value: &'a Value,
}

impl<'de, 'a> EnumAccess<'de> for UnionValueEnumAccess<'a> {
	type Error = DeError;
	type Variant = UnionValueVariantAccess<'a>;

	fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant), Self::Error>
	where
		V: DeserializeSeed<'de>,
	{
		Ok((
			seed.deserialize(value::StrDeserializer::new(self.type_name))?,
			UnionValueVariantAccess { value: self.value },
		))
	}
}

struct UnionValueVariantAccess<'a> {
	value: &'a Value,
}

impl<'de, 'a> VariantAccess<'de> for UnionValueVariantAccess<'a> {
	type Error = DeError;

	fn unit_variant(self) -> Result<(), Self::Error> {
		Ok(())
	}

	fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, Self::Error>
	where
		T: DeserializeSeed<'de>,
	{
		seed.deserialize(ValueDeserializer::new(self.value))
	}

	fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		ValueDeserializer::new(self.value).deserialize_any(visitor)
	}

	fn struct_variant<V>(
		self,
		_fields: &'static [&'static str],
		visitor: V,
	) -> Result<V::Value, Self::Error>
	where
		V: Visitor<'de>,
	{
		ValueDeserializer::new(self.value).deserialize_any(visitor)
	}
}
