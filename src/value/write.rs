//! Schema-driven encoding of [`Value`]s

use super::{UnionValue, Value};

use crate::{
	schema::frozen::{DecimalRepr, Node, Schema, Union},
	ser::{SerError, SerializerConfig, SerializerState},
};

use {integer_encoding::VarIntWriter, serde::ser::Error as _, std::io::Write};

/// Encode a [`Value`] as an avro datum to the provided writer
pub fn write_datum<W>(
	value: &Value,
	writer: W,
	config: &mut SerializerConfig<'_>,
) -> Result<W, SerError>
where
	W: Write,
{
	let mut state = SerializerState::from_writer(writer, config);
	let root = state.config.schema.root();
	write_value(&mut state, root, value)?;
	Ok(state.into_writer())
}

/// Encode a [`Value`] as an avro datum to a newly allocated `Vec`
pub fn write_datum_vec(value: &Value, config: &mut SerializerConfig<'_>) -> Result<Vec<u8>, SerError> {
	write_datum(value, Vec::new(), config)
}

pub(crate) fn write_value<'s, W>(
	state: &mut SerializerState<'_, 's, W>,
	node: &'s Node,
	value: &Value,
) -> Result<(), SerError>
where
	W: Write,
{
	let schema: &'s Schema = state.config.schema;
	let mismatch = || {
		SerError::custom(format_args!(
			"Value {:?} does not match {:?} schema",
			value, node
		))
	};
	match *node {
		Node::Null => match value.unwrapped() {
			Value::Null => Ok(()),
			_ => Err(mismatch()),
		},
		Node::Boolean => match value.unwrapped() {
			Value::Boolean(b) => state.writer.write_all(&[*b as u8]).map_err(SerError::io),
			_ => Err(mismatch()),
		},
		Node::Int | Node::Date | Node::TimeMillis => {
			let v: i32 = value.as_i32().ok_or_else(mismatch)?;
			state.writer.write_varint(v).map_err(SerError::io)?;
			Ok(())
		}
		Node::Long | Node::TimeMicros | Node::TimestampMillis | Node::TimestampMicros => {
			let v: i64 = value.as_i64().ok_or_else(mismatch)?;
			state.writer.write_varint(v).map_err(SerError::io)?;
			Ok(())
		}
		Node::Float => {
			let v = value.as_f64().ok_or_else(mismatch)?;
			state
				.writer
				.write_all(&(v as f32).to_le_bytes())
				.map_err(SerError::io)
		}
		Node::Double => {
			let v = value.as_f64().ok_or_else(mismatch)?;
			state.writer.write_all(&v.to_le_bytes()).map_err(SerError::io)
		}
		Node::Bytes => match value.unwrapped() {
			Value::Bytes(bytes) | Value::Fixed(bytes) => state.write_length_delimited(bytes),
			Value::String(s) => state.write_length_delimited(s.as_bytes()),
			_ => Err(mismatch()),
		},
		Node::String | Node::Uuid => match value.unwrapped() {
			Value::String(s) | Value::Enum(s) | Value::Uuid(s) => {
				state.write_length_delimited(s.as_bytes())
			}
			_ => Err(mismatch()),
		},
		Node::Array(items) => match value.unwrapped() {
			Value::Array(values) => {
				let items = schema.node(items);
				write_blocks(state, values.len(), |state, idx| {
					write_value(state, items, &values[idx])
				})
			}
			_ => Err(mismatch()),
		},
		Node::Map(map_values) => match value.unwrapped() {
			Value::Map(entries) => {
				let map_values = schema.node(map_values);
				let entries: Vec<(&String, &Value)> = entries.iter().collect();
				write_blocks(state, entries.len(), |state, idx| {
					let (key, entry_value) = entries[idx];
					state.write_length_delimited(key.as_bytes())?;
					write_value(state, map_values, entry_value)
				})
			}
			_ => Err(mismatch()),
		},
		Node::Union(ref union) => write_union(state, union, value),
		Node::Record(ref record) => {
			let value = value.unwrapped();
			let find_value = |field_name: &str| -> Option<&Value> {
				match value {
					Value::Record(fields) => fields
						.iter()
						.find(|(name, _)| name == field_name)
						.map(|(_, v)| v),
					Value::Map(entries) => entries.get(field_name),
					_ => None,
				}
			};
			if !matches!(value, Value::Record(_) | Value::Map(_)) {
				return Err(mismatch());
			}
			for field in &record.fields {
				let field_node = schema.node(field.schema);
				match find_value(&field.name).or(field.default.as_ref()) {
					Some(field_value) => write_value(state, field_node, field_value)?,
					None => {
						return Err(SerError::custom(format_args!(
							"Missing field {:?} in record value, \
								and the schema provides no default for it",
							field.name
						)))
					}
				}
			}
			Ok(())
		}
		Node::Enum(ref enum_) => match value.unwrapped() {
			Value::Enum(symbol) | Value::String(symbol) => {
				let discriminant =
					enum_.per_name_lookup.get(symbol).copied().ok_or_else(|| {
						SerError::custom(format_args!(
							"Failed to find matching enum symbol for {symbol:?} in {enum_:?}"
						))
					})?;
				state
					.writer
					.write_varint(discriminant as i64)
					.map_err(SerError::io)?;
				Ok(())
			}
			_ => Err(mismatch()),
		},
		Node::Fixed(ref fixed) => match value.unwrapped() {
			Value::Fixed(bytes) | Value::Bytes(bytes) => {
				if bytes.len() != fixed.size {
					Err(SerError::custom(format_args!(
						"Fixed value of {} bytes does not match fixed size {}",
						bytes.len(),
						fixed.size
					)))
				} else {
					state.writer.write_all(bytes).map_err(SerError::io)
				}
			}
			_ => Err(mismatch()),
		},
		Node::Decimal(ref decimal) => match value.unwrapped() {
			Value::Decimal(rust_decimal) => {
				crate::ser::decimal_serialize(state, decimal, *rust_decimal)
			}
			Value::Int(v) => {
				crate::ser::decimal_serialize(state, decimal, rust_decimal::Decimal::from(*v))
			}
			Value::Long(v) => {
				crate::ser::decimal_serialize(state, decimal, rust_decimal::Decimal::from(*v))
			}
			Value::Bytes(bytes) => match &decimal.repr {
				// Already the raw two's-complement form
				DecimalRepr::Bytes => state.write_length_delimited(bytes),
				DecimalRepr::Fixed(fixed) => {
					crate::ser::decimal_write_fixed(state, bytes, fixed.size)
				}
			},
			_ => Err(mismatch()),
		},
		Node::Duration => match value.unwrapped() {
			Value::Duration(duration) => {
				let mut buf = [0u8; 12];
				buf[0..4].copy_from_slice(&duration.months.to_le_bytes());
				buf[4..8].copy_from_slice(&duration.days.to_le_bytes());
				buf[8..12].copy_from_slice(&duration.milliseconds.to_le_bytes());
				state.writer.write_all(&buf).map_err(SerError::io)
			}
			Value::Fixed(bytes) | Value::Bytes(bytes) if bytes.len() == 12 => {
				state.writer.write_all(bytes).map_err(SerError::io)
			}
			_ => Err(mismatch()),
		},
	}
}

fn write_union<'s, W>(
	state: &mut SerializerState<'_, 's, W>,
	union: &'s Union,
	value: &Value,
) -> Result<(), SerError>
where
	W: Write,
{
	let schema: &'s Schema = state.config.schema;
	let write_branch = |state: &mut SerializerState<'_, 's, W>,
	                    branch: usize,
	                    value: &Value|
	 -> Result<(), SerError> {
		state
			.writer
			.write_varint(branch as i64)
			.map_err(SerError::io)?;
		write_value(state, schema.node(union.variants[branch]), value)
	};
	match value {
		// Explicit branch: trust it, after validating it against the schema
		Value::Union(union_value) => {
			let UnionValue {
				branch,
				type_name,
				value: inner,
			} = &**union_value;
			let branch = if union.type_names.get(*branch).map(String::as_str)
				== Some(type_name.as_str())
			{
				*branch
			} else {
				union
					.type_names
					.iter()
					.position(|name| name == type_name)
					.ok_or_else(|| {
						SerError::custom(format_args!(
							"Union value branch {type_name:?} is not a branch of {union:?}"
						))
					})?
			};
			write_branch(state, branch, inner)
		}
		Value::Null => {
			let branch = union
				.null_variant
				.ok_or_else(|| SerError::new("Union has no null branch for a null value"))?;
			write_branch(state, branch, value)
		}
		// The single-entry container form, keyed by branch type name
		Value::Map(entries) if entries.len() == 1 => {
			let (key, inner) = entries.iter().next().expect("len was just checked");
			match union.type_names.iter().position(|name| name == key) {
				Some(branch) => write_branch(state, branch, inner),
				// Fall back to matching a map branch by shape
				None => {
					let branch = find_branch_by_shape(schema, union, value).ok_or_else(|| {
						SerError::custom(format_args!(
							"Could not resolve union branch for map keyed {key:?} in {union:?}"
						))
					})?;
					write_branch(state, branch, value)
				}
			}
		}
		// Last resort: first branch whose shape accepts the value
		other => {
			let branch = find_branch_by_shape(schema, union, other).ok_or_else(|| {
				SerError::custom(format_args!(
					"Could not resolve union branch for {other:?} in {union:?}"
				))
			})?;
			write_branch(state, branch, other)
		}
	}
}

fn find_branch_by_shape(schema: &Schema, union: &Union, value: &Value) -> Option<usize> {
	union.variants.iter().position(|&variant| {
		let node = schema.node(variant);
		match value {
			Value::Null => matches!(node, Node::Null),
			Value::Boolean(_) => matches!(node, Node::Boolean),
			Value::Int(_) => matches!(node, Node::Int | Node::Long | Node::Float | Node::Double),
			Value::Long(_) => matches!(node, Node::Long | Node::Double),
			Value::Float(_) => matches!(node, Node::Float | Node::Double),
			Value::Double(_) => matches!(node, Node::Double),
			Value::Bytes(_) => matches!(node, Node::Bytes),
			Value::String(_) => matches!(node, Node::String),
			Value::Array(_) => matches!(node, Node::Array(_)),
			Value::Map(_) => matches!(node, Node::Map(_) | Node::Record(_)),
			Value::Record(_) => matches!(node, Node::Record(_)),
			Value::Enum(_) => matches!(node, Node::Enum(_)),
			Value::Fixed(_) => matches!(node, Node::Fixed(_)),
			Value::Decimal(_) => matches!(node, Node::Decimal(_)),
			Value::Uuid(_) => matches!(node, Node::Uuid | Node::String),
			Value::Date(_) => matches!(node, Node::Date | Node::Int),
			Value::TimeMillis(_) => matches!(node, Node::TimeMillis | Node::Int),
			Value::TimeMicros(_) => matches!(node, Node::TimeMicros | Node::Long),
			Value::TimestampMillis(_) => matches!(node, Node::TimestampMillis | Node::Long),
			Value::TimestampMicros(_) => matches!(node, Node::TimestampMicros | Node::Long),
			Value::Duration(_) => matches!(node, Node::Duration),
			Value::Union(_) => false,
		}
	})
}

/// Frame `len` elements into wire blocks, honoring the configured block
/// length and size-header knobs
fn write_blocks<'c, 's, W>(
	state: &mut SerializerState<'c, 's, W>,
	len: usize,
	mut write_element: impl FnMut(&mut SerializerState<'_, 's, Vec<u8>>, usize) -> Result<(), SerError>,
) -> Result<(), SerError>
where
	W: Write,
{
	let block_length = state.config.block_length.max(1);
	let mut scratch = state.config.buffers.block_buffers.pop().unwrap_or_default();
	let mut idx = 0;
	while idx < len {
		let count = block_length.min(len - idx);
		let mut buf_state = SerializerState {
			writer: std::mem::take(&mut scratch),
			config: &mut *state.config,
		};
		let mut res = Ok(());
		for i in idx..idx + count {
			res = write_element(&mut buf_state, i);
			if res.is_err() {
				break;
			}
		}
		scratch = buf_state.into_writer();
		res?;
		if state.config.write_block_size_header {
			state
				.writer
				.write_varint(-(count as i64))
				.map_err(SerError::io)?;
			state
				.writer
				.write_varint(scratch.len() as i64)
				.map_err(SerError::io)?;
		} else {
			state
				.writer
				.write_varint(count as i64)
				.map_err(SerError::io)?;
		}
		state.writer.write_all(&scratch).map_err(SerError::io)?;
		scratch.clear();
		idx += count;
	}
	state.writer.write_varint(0i32).map_err(SerError::io)?;
	state.config.buffers.block_buffers.push(scratch);
	Ok(())
}

impl Value {
	/// See through the union wrapper
	fn unwrapped(&self) -> &Value {
		match self {
			Value::Union(union_value) => &union_value.value,
			other => other,
		}
	}

	fn as_i32(&self) -> Option<i32> {
		match *self.unwrapped() {
			Value::Int(v) | Value::Date(v) | Value::TimeMillis(v) => Some(v),
			Value::Long(v) => v.try_into().ok(),
			_ => None,
		}
	}

	fn as_i64(&self) -> Option<i64> {
		match *self.unwrapped() {
			Value::Int(v) | Value::Date(v) | Value::TimeMillis(v) => Some(v.into()),
			Value::Long(v)
			| Value::TimeMicros(v)
			| Value::TimestampMillis(v)
			| Value::TimestampMicros(v) => Some(v),
			_ => None,
		}
	}

	fn as_f64(&self) -> Option<f64> {
		match *self.unwrapped() {
			Value::Int(v) => Some(v.into()),
			Value::Long(v) => Some(v as f64),
			Value::Float(v) => Some(v.into()),
			Value::Double(v) => Some(v),
			_ => None,
		}
	}
}
