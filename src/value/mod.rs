//! Schema-driven dynamic values
//!
//! [`Value`] is the codec-agnostic tree representation of any Avro datum.
//! It is what field defaults coerce into at parse time, what the generic
//! decode path materializes when no application type is registered for a
//! schema, and what the generic encode path accepts.

mod de;
mod read;
mod write;

pub use {
	de::ValueDeserializer,
	read::{read_datum, read_datum_slice},
	write::{write_datum, write_datum_vec},
};

pub(crate) use {read::read_value, write::write_value};

use std::collections::HashMap;

/// A dynamically-typed Avro datum
///
/// Logical types get their own variants, mirroring how the frozen schema
/// collapses them: a decoded datum tells apart e.g. a plain `long` from a
/// `timestamp-micros`.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	Null,
	Boolean(bool),
	Int(i32),
	Long(i64),
	Float(f32),
	Double(f64),
	Bytes(Vec<u8>),
	String(String),
	/// Elements all follow the schema's `items`
	Array(Vec<Value>),
	/// Keys are always strings
	Map(HashMap<String, Value>),
	/// Fields in schema declaration order
	Record(Vec<(String, Value)>),
	/// The symbol (not its index)
	Enum(String),
	/// Exactly `size` bytes
	Fixed(Vec<u8>),
	/// A union value, remembering which branch it came from
	Union(Box<UnionValue>),
	Decimal(rust_decimal::Decimal),
	/// 36-character hyphenated canonical form
	Uuid(String),
	/// Days since 1970-01-01
	Date(i32),
	/// Milliseconds since midnight
	TimeMillis(i32),
	/// Microseconds since midnight
	TimeMicros(i64),
	/// Milliseconds since the unix epoch UTC
	TimestampMillis(i64),
	/// Microseconds since the unix epoch UTC
	TimestampMicros(i64),
	Duration(Duration),
}

/// A [`Value`] decoded from (or destined to) a specific union branch
#[derive(Clone, Debug, PartialEq)]
pub struct UnionValue {
	/// Zero-based position of the branch in the union
	pub branch: usize,
	/// The branch's type name (resolution key)
	pub type_name: String,
	pub value: Value,
}

/// The `duration` logical type: months, days and milliseconds as three
/// independent unsigned counters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Duration {
	pub months: u32,
	pub days: u32,
	pub milliseconds: u32,
}

impl Value {
	/// The single-entry map form of a union value, keyed by the branch type
	/// name
	///
	/// This is the container shape for dynamically-typed unions: the entry
	/// key tells which branch the value belongs to. Returns `None` for
	/// non-union values.
	pub fn into_keyed_map(self) -> Option<HashMap<String, Value>> {
		match self {
			Value::Union(union_value) => {
				let mut map = HashMap::with_capacity(1);
				map.insert(union_value.type_name, union_value.value);
				Some(map)
			}
			_ => None,
		}
	}

	/// Strip the union wrapper, if any
	pub fn into_union_inner(self) -> Value {
		match self {
			Value::Union(union_value) => union_value.value,
			other => other,
		}
	}

	/// Render as the JSON shape used for schema defaults
	///
	/// Bytes and fixed render as (lossy) strings, unions render as their
	/// bare branch value, which is how the textual schema format spells
	/// these defaults.
	pub(crate) fn to_default_json(&self) -> serde_json::Value {
		match self {
			Value::Null => serde_json::Value::Null,
			Value::Boolean(b) => (*b).into(),
			Value::Int(v) | Value::Date(v) | Value::TimeMillis(v) => (*v).into(),
			Value::Long(v)
			| Value::TimeMicros(v)
			| Value::TimestampMillis(v)
			| Value::TimestampMicros(v) => (*v).into(),
			Value::Float(v) => (*v).into(),
			Value::Double(v) => (*v).into(),
			Value::Bytes(bytes) | Value::Fixed(bytes) => {
				String::from_utf8_lossy(bytes).into_owned().into()
			}
			Value::String(s) | Value::Enum(s) | Value::Uuid(s) => s.clone().into(),
			Value::Array(values) => {
				serde_json::Value::Array(values.iter().map(Value::to_default_json).collect())
			}
			Value::Map(entries) => serde_json::Value::Object(
				entries
					.iter()
					.map(|(k, v)| (k.clone(), v.to_default_json()))
					.collect(),
			),
			Value::Record(fields) => serde_json::Value::Object(
				fields
					.iter()
					.map(|(k, v)| (k.clone(), v.to_default_json()))
					.collect(),
			),
			Value::Union(union_value) => union_value.value.to_default_json(),
			Value::Decimal(decimal) => decimal.to_string().into(),
			Value::Duration(duration) => serde_json::Value::Array(vec![
				duration.months.into(),
				duration.days.into(),
				duration.milliseconds.into(),
			]),
		}
	}
}
