//! Schema-driven decoding into [`Value`]s

use super::{Duration, UnionValue, Value};

use crate::{
	de::{
		read::{ReadSlice, ReaderRead},
		DeError, DeserializerState,
	},
	schema::frozen::{DecimalRepr, FieldAction, Node, Schema},
};

use serde::de::Error as _;

/// Decode one datum from an `impl BufRead` into a [`Value`]
///
/// A stream that is already exhausted when the datum starts decodes to
/// `Ok(None)` (this is how a reader consumes a stream of concatenated
/// datums until the end); a stream that ends in the middle of a datum is an
/// error.
pub fn read_datum<R>(reader: R, schema: &Schema) -> Result<Option<Value>, DeError>
where
	R: std::io::BufRead,
{
	let mut reader_read = ReaderRead::new(reader);
	if std::io::BufRead::fill_buf(&mut reader_read)
		.map_err(DeError::io)?
		.is_empty()
	{
		return Ok(None);
	}
	let mut state = DeserializerState::new(reader_read, schema);
	read_value(&mut state, schema.root(), 0).map(Some)
}

/// Decode one datum from a slice into a [`Value`]
pub fn read_datum_slice(slice: &[u8], schema: &Schema) -> Result<Value, DeError> {
	let mut state = DeserializerState::from_slice(slice, schema);
	read_value(&mut state, schema.root(), 0)
}

pub(crate) fn read_value<'de, 's, R>(
	state: &mut DeserializerState<'s, R>,
	node: &'s Node,
	depth: usize,
) -> Result<Value, DeError>
where
	R: ReadSlice<'de>,
{
	if depth > state.config().allowed_depth {
		return Err(DeError::new(
			"Datum is deeper than the configured maximum depth",
		));
	}
	Ok(match *node {
		Node::Null => Value::Null,
		Node::Boolean => {
			Value::Boolean(state.read_slice(1, |s: &[u8]| match s[0] {
				0 => Ok(false),
				1 => Ok(true),
				other => Err(DeError::custom(format_args!(
					"Invalid byte value when deserializing boolean: {:?}",
					other
				))),
			})?)
		}
		Node::Int => Value::Int(state.read_varint()?),
		Node::Long => Value::Long(state.read_varint()?),
		Node::Float => Value::Float(f32::from_le_bytes(state.read_const_size_buf()?)),
		Node::Double => Value::Double(f64::from_le_bytes(state.read_const_size_buf()?)),
		Node::Bytes => Value::Bytes(read_length_delimited(state)?),
		Node::String => Value::String(read_string(state)?),
		Node::Array(items) => {
			let items = state.config().schema.node(items);
			let mut values = Vec::new();
			read_blocks(state, |state| {
				values.push(read_value(state, items, depth + 1)?);
				Ok(())
			})?;
			Value::Array(values)
		}
		Node::Map(map_values) => {
			let map_values = state.config().schema.node(map_values);
			let mut entries = std::collections::HashMap::new();
			read_blocks(state, |state| {
				let key = read_string(state)?;
				let value = read_value(state, map_values, depth + 1)?;
				entries.insert(key, value);
				Ok(())
			})?;
			Value::Map(entries)
		}
		Node::Union(ref union) => {
			let discriminant: i64 = state.read_varint()?;
			let branch: usize = discriminant
				.try_into()
				.map_err(|e| DeError::custom(format_args!("Invalid discriminant in stream: {e}")))?;
			let &variant_key = union
				.variants
				.get(branch)
				.ok_or_else(|| DeError::new("Could not find union discriminant in schema"))?;
			let variant_node = state.config().schema.node(variant_key);
			Value::Union(Box::new(UnionValue {
				branch,
				type_name: union.type_names[branch].clone(),
				value: read_value(state, variant_node, depth + 1)?,
			}))
		}
		Node::Record(ref record) => {
			let mut fields = Vec::with_capacity(record.fields.len());
			for field in &record.fields {
				let field_node = state.config().schema.node(field.schema);
				match field.action {
					FieldAction::Skip => {
						// Read and discard, so the stream stays aligned
						let _ = read_value(state, field_node, depth + 1)?;
					}
					FieldAction::SetDefault => {
						let default = field
							.default
							.as_ref()
							.expect("SetDefault implies a default, checked at freeze time");
						fields.push((field.name.clone(), default.clone()));
					}
					FieldAction::None => {
						fields.push((field.name.clone(), read_value(state, field_node, depth + 1)?));
					}
				}
			}
			Value::Record(fields)
		}
		Node::Enum(ref enum_) => {
			let discriminant: i64 = state.read_varint()?;
			let symbol = usize::try_from(discriminant)
				.ok()
				.and_then(|idx| enum_.symbols.get(idx))
				.ok_or_else(|| DeError::new("Could not find enum discriminant in schema"))?;
			Value::Enum(symbol.clone())
		}
		Node::Fixed(ref fixed) => {
			Value::Fixed(state.read_slice(fixed.size, |bytes: &[u8]| Ok(bytes.to_owned()))?)
		}
		Node::Decimal(ref decimal) => {
			let size = match &decimal.repr {
				DecimalRepr::Bytes => {
					let len: i64 = state.read_varint()?;
					len.try_into().map_err(|e| {
						DeError::custom(format_args!("Invalid length in stream: {e}"))
					})?
				}
				DecimalRepr::Fixed(fixed) => fixed.size,
			};
			let mut buf = [0u8; 16];
			let start = buf.len().checked_sub(size).ok_or_else(|| {
				DeError::custom(format_args!(
					"Decimals of size larger than 16 are not supported (got size {size})"
				))
			})?;
			std::io::Read::read_exact(&mut state.reader, &mut buf[start..])
				.map_err(DeError::io)?;
			if buf.get(start).map_or(false, |&v| v & 0x80 != 0) {
				for v in &mut buf[0..start] {
					*v = 0xFF;
				}
			}
			let unscaled = i128::from_be_bytes(buf);
			Value::Decimal(
				rust_decimal::Decimal::try_from_i128_with_scale(unscaled, decimal.scale).map_err(
					|e| DeError::custom(format_args!("Could not parse decimal from i128: {e}")),
				)?,
			)
		}
		Node::Uuid => Value::Uuid(read_string(state)?),
		Node::Date => Value::Date(state.read_varint()?),
		Node::TimeMillis => Value::TimeMillis(state.read_varint()?),
		Node::TimeMicros => Value::TimeMicros(state.read_varint()?),
		Node::TimestampMillis => Value::TimestampMillis(state.read_varint()?),
		Node::TimestampMicros => Value::TimestampMicros(state.read_varint()?),
		Node::Duration => {
			let buf = state.read_const_size_buf::<12>()?;
			Value::Duration(Duration {
				months: u32::from_le_bytes(buf[0..4].try_into().expect("slice is 4 bytes")),
				days: u32::from_le_bytes(buf[4..8].try_into().expect("slice is 4 bytes")),
				milliseconds: u32::from_le_bytes(buf[8..12].try_into().expect("slice is 4 bytes")),
			})
		}
	})
}

fn read_length_delimited<'de, R>(state: &mut DeserializerState<'_, R>) -> Result<Vec<u8>, DeError>
where
	R: ReadSlice<'de>,
{
	let len: i64 = state.read_varint()?;
	let len: usize = len
		.try_into()
		.map_err(|e| DeError::custom(format_args!("Invalid length in stream: {e}")))?;
	state.read_slice(len, |bytes: &[u8]| Ok(bytes.to_owned()))
}

fn read_string<'de, R>(state: &mut DeserializerState<'_, R>) -> Result<String, DeError>
where
	R: ReadSlice<'de>,
{
	let len: i64 = state.read_varint()?;
	let len: usize = len
		.try_into()
		.map_err(|e| DeError::custom(format_args!("Invalid length in stream: {e}")))?;
	state.read_slice(len, |bytes: &[u8]| {
		std::str::from_utf8(bytes)
			.map(str::to_owned)
			.map_err(|e| DeError::custom(format_args!("String is not valid utf-8: {e}")))
	})
}

/// Drive both block forms until the zero-count terminator
fn read_blocks<'de, 's, R>(
	state: &mut DeserializerState<'s, R>,
	mut read_element: impl FnMut(&mut DeserializerState<'s, R>) -> Result<(), DeError>,
) -> Result<(), DeError>
where
	R: ReadSlice<'de>,
{
	let mut total: usize = 0;
	loop {
		let count: i64 = state.read_varint()?;
		if count == 0 {
			return Ok(());
		}
		let count: u64 = if count < 0 {
			// Negative count: the block advertises its byte size next
			let _byte_size: u64 = state.read_varint()?;
			u64::from_ne_bytes(count.to_ne_bytes()).wrapping_neg()
		} else {
			count as u64
		};
		let count: usize = count
			.try_into()
			.map_err(|e| DeError::custom(format_args!("Invalid array length in stream: {e}")))?;
		total = total.saturating_add(count);
		if total > state.config().max_slice_alloc_size {
			return Err(DeError::new(
				"Exceeding maximum allowed sequence size while deserializing",
			));
		}
		for _ in 0..count {
			read_element(state)?;
		}
	}
}
