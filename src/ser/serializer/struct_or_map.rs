use super::*;

use crate::schema::frozen::{Record, SchemaKey};

/// What structs and maps may serialize into: a record, a string-keyed map,
/// or a duration given as months/days/milliseconds
pub struct SerializeAsRecordOrMapOrDuration<'r, 'c, 's, W> {
	kind: Kind<'r, 'c, 's, W>,
}

enum Kind<'r, 'c, 's, W> {
	Record(KindRecord<'r, 'c, 's, W>),
	Map {
		block_writer: BlockWriter<'r, 'c, 's, W>,
		values: &'s Node,
		pending_key: Option<String>,
	},
	Duration {
		state: &'r mut SerializerState<'c, 's, W>,
		values: [u32; 3],
		gotten_values: u8,
		pending_field: Option<extractors::DurationFieldName>,
	},
}

struct KindRecord<'r, 'c, 's, W> {
	state: &'r mut SerializerState<'c, 's, W>,
	record: &'s Record,
	/// Fields up to here (exclusive) have been written to the writer
	current_idx: usize,
	/// Out-of-order fields are serialized into pooled buffers, flushed as
	/// the gap closes
	buffers: Vec<Option<Vec<u8>>>,
	/// For the `SerializeMap` flow, the field picked by the last key
	pending_field: Option<usize>,
}

impl<'r, 'c, 's, W: Write> SerializeAsRecordOrMapOrDuration<'r, 'c, 's, W> {
	pub(super) fn record(state: &'r mut SerializerState<'c, 's, W>, record: &'s Record) -> Self {
		Self {
			kind: Kind::Record(KindRecord {
				state,
				record,
				current_idx: 0,
				buffers: Vec::new(),
				pending_field: None,
			}),
		}
	}

	pub(super) fn map(state: &'r mut SerializerState<'c, 's, W>, values: SchemaKey) -> Self {
		let values = state.config.schema.node(values);
		Self {
			kind: Kind::Map {
				block_writer: BlockWriter::new(state),
				values,
				pending_key: None,
			},
		}
	}

	pub(super) fn duration(state: &'r mut SerializerState<'c, 's, W>) -> Self {
		Self {
			kind: Kind::Duration {
				state,
				values: [0; 3],
				gotten_values: 0,
				pending_field: None,
			},
		}
	}

	fn field<T: ?Sized>(&mut self, key: &str, value: &T) -> Result<(), SerError>
	where
		T: Serialize,
	{
		match &mut self.kind {
			Kind::Record(kind_record) => {
				let field_idx = kind_record.field_idx(key)?;
				kind_record.serialize_field_value(field_idx, value)
			}
			Kind::Map {
				block_writer,
				values,
				..
			} => {
				let values = *values;
				block_writer.element(|buf_state| {
					buf_state.write_length_delimited(key.as_bytes())?;
					value.serialize(DatumSerializer {
						state: buf_state,
						node: values,
					})
				})
			}
			Kind::Duration {
				values,
				gotten_values,
				..
			} => serialize_duration_field(
				values,
				gotten_values,
				extractors::DurationFieldName::from_str(key)?,
				value,
			),
		}
	}

	fn end_inner(self) -> Result<(), SerError> {
		match self.kind {
			Kind::Record(kind_record) => kind_record.end(),
			Kind::Map {
				mut block_writer, ..
			} => block_writer.end(),
			Kind::Duration {
				state,
				values,
				gotten_values,
				..
			} => {
				if gotten_values != 0b111 {
					return Err(duration_fields_incorrect());
				}
				let [months, days, milliseconds] = values;
				let mut buf = [0u8; 12];
				buf[0..4].copy_from_slice(&months.to_le_bytes());
				buf[4..8].copy_from_slice(&days.to_le_bytes());
				buf[8..12].copy_from_slice(&milliseconds.to_le_bytes());
				state.writer.write_all(&buf).map_err(SerError::io)
			}
		}
	}
}

impl<'r, 'c, 's, W: Write> KindRecord<'r, 'c, 's, W> {
	fn field_idx(&self, field_name: &str) -> Result<usize, SerError> {
		match self.record.per_name_lookup.get(field_name) {
			None => Err(SerError::custom(format_args!(
				"Attempting to serialize field that doesn't exist in record: {field_name}"
			))),
			Some(&field_idx) => Ok(field_idx),
		}
	}

	fn serialize_field_value<T: ?Sized>(
		&mut self,
		field_idx: usize,
		value: &T,
	) -> Result<(), SerError>
	where
		T: Serialize,
	{
		use std::cmp::Ordering;
		let field_schema = self
			.state
			.config
			.schema
			.node(self.record.fields[field_idx].schema);
		match field_idx.cmp(&self.current_idx) {
			Ordering::Less => Err(serializing_same_field_name_twice(
				&self.record.fields[field_idx].name,
			)),
			Ordering::Equal => {
				// Fast case: fields come in declaration order so we don't
				// need to buffer
				value.serialize(DatumSerializer {
					state: &mut *self.state,
					node: field_schema,
				})?;
				self.current_idx += 1;
				self.flush_closed_gap()
			}
			Ordering::Greater => {
				if self.buffers.len() <= field_idx {
					self.buffers.resize_with(field_idx + 1, || None);
				}
				if self.buffers[field_idx].is_some() {
					return Err(serializing_same_field_name_twice(
						&self.record.fields[field_idx].name,
					));
				}
				let mut buf_serializer_state = SerializerState {
					writer: self
						.state
						.config
						.buffers
						.field_reordering_buffers
						.pop()
						.unwrap_or_default(),
					config: &mut *self.state.config,
				};
				let res = value.serialize(DatumSerializer {
					state: &mut buf_serializer_state,
					node: field_schema,
				});
				// Put buffer in place even on failure so the allocation is
				// not lost
				self.buffers[field_idx] = Some(buf_serializer_state.into_writer());
				res
			}
		}
	}

	/// Write any buffered fields that directly follow the last written one
	fn flush_closed_gap(&mut self) -> Result<(), SerError> {
		while let Some(mut already_serialized) = self
			.buffers
			.get_mut(self.current_idx)
			.and_then(|opt| opt.take())
		{
			self.state
				.writer
				.write_all(&already_serialized)
				.map_err(SerError::io)?;
			already_serialized.clear();
			self.state
				.config
				.buffers
				.field_reordering_buffers
				.push(already_serialized);
			self.current_idx += 1;
		}
		Ok(())
	}

	fn end(mut self) -> Result<(), SerError> {
		while self.current_idx < self.record.fields.len() {
			if let Some(mut already_serialized) = self
				.buffers
				.get_mut(self.current_idx)
				.and_then(|opt| opt.take())
			{
				self.state
					.writer
					.write_all(&already_serialized)
					.map_err(SerError::io)?;
				already_serialized.clear();
				self.state
					.config
					.buffers
					.field_reordering_buffers
					.push(already_serialized);
				self.current_idx += 1;
				continue;
			}
			// The field was never provided by the `Serialize` impl: fill
			// from the schema default if there is one, tolerate always-null
			// and optional fields, error otherwise
			let field = &self.record.fields[self.current_idx];
			let field_schema = self.state.config.schema.node(field.schema);
			match (&field.default, field_schema) {
				(Some(default), _) => {
					crate::value::write_value(self.state, field_schema, default)?;
				}
				(None, Node::Null) => {}
				(None, Node::Union(union)) => {
					match union.per_type_lookup.by_shape(ValueShape::Null) {
						Some((discriminant, _)) => {
							self.state
								.writer
								.write_varint(discriminant)
								.map_err(SerError::io)?;
						}
						None => return Err(missing_field(&field.name)),
					}
				}
				_ => return Err(missing_field(&field.name)),
			}
			self.current_idx += 1;
		}
		debug_assert!(self.buffers.iter().all(|opt| opt.is_none()));
		Ok(())
	}
}

fn serialize_duration_field<T>(
	values: &mut [u32; 3],
	gotten_values: &mut u8,
	duration_field: extractors::DurationFieldName,
	value: &T,
) -> Result<(), SerError>
where
	T: Serialize + ?Sized,
{
	let bit = 1u8 << (duration_field as u8);
	if *gotten_values & bit != 0 {
		return Err(SerError::custom(format_args!(
			"{duration_field} is getting serialized twice for serialization as Duration",
		)));
	}
	values[duration_field as usize] = value.serialize(extractors::ExtractU32ForDuration)?;
	*gotten_values |= bit;
	Ok(())
}

fn missing_field(field_name: &str) -> SerError {
	SerError::custom(format_args!(
		"Missing field {field_name:?} in record, and the schema provides no default for it"
	))
}

fn serializing_same_field_name_twice(field_name: &str) -> SerError {
	SerError::custom(format_args!(
		"Attempting to serialize field with same field_name \
			twice in record (field_name: {field_name:?})"
	))
}

pub(super) fn duration_fields_incorrect() -> SerError {
	SerError::new(
		"A struct or map can indeed be serialized as Duration, but only if its \
			fields are months/days/milliseconds",
	)
}

impl<'r, 'c, 's, W: Write> SerializeStruct for SerializeAsRecordOrMapOrDuration<'r, 'c, 's, W> {
	type Ok = ();
	type Error = SerError;

	fn serialize_field<T: ?Sized>(
		&mut self,
		key: &'static str,
		value: &T,
	) -> Result<(), Self::Error>
	where
		T: Serialize,
	{
		self.field(key, value)
	}

	fn end(self) -> Result<Self::Ok, Self::Error> {
		self.end_inner()
	}
}

impl<'r, 'c, 's, W: Write> SerializeStructVariant
	for SerializeAsRecordOrMapOrDuration<'r, 'c, 's, W>
{
	type Ok = ();
	type Error = SerError;

	fn serialize_field<T: ?Sized>(
		&mut self,
		key: &'static str,
		value: &T,
	) -> Result<(), Self::Error>
	where
		T: Serialize,
	{
		self.field(key, value)
	}

	fn end(self) -> Result<Self::Ok, Self::Error> {
		self.end_inner()
	}
}

impl<'r, 'c, 's, W: Write> SerializeMap for SerializeAsRecordOrMapOrDuration<'r, 'c, 's, W> {
	type Ok = ();
	type Error = SerError;

	fn serialize_key<T: ?Sized>(&mut self, key: &T) -> Result<(), Self::Error>
	where
		T: Serialize,
	{
		match &mut self.kind {
			Kind::Record(kind_record) => {
				let key = key.serialize(extractors::ExtractKeyString)?;
				kind_record.pending_field = Some(kind_record.field_idx(&key)?);
				Ok(())
			}
			Kind::Map { pending_key, .. } => {
				*pending_key = Some(key.serialize(extractors::ExtractKeyString)?);
				Ok(())
			}
			Kind::Duration { pending_field, .. } => {
				*pending_field = Some(key.serialize(extractors::ExtractFieldNameForDuration)?);
				Ok(())
			}
		}
	}

	fn serialize_value<T: ?Sized>(&mut self, value: &T) -> Result<(), Self::Error>
	where
		T: Serialize,
	{
		match &mut self.kind {
			Kind::Record(kind_record) => {
				let field_idx = kind_record
					.pending_field
					.take()
					.ok_or_else(|| SerError::new("serialize_value called before serialize_key"))?;
				kind_record.serialize_field_value(field_idx, value)
			}
			Kind::Map {
				block_writer,
				values,
				pending_key,
			} => {
				let key = pending_key
					.take()
					.ok_or_else(|| SerError::new("serialize_value called before serialize_key"))?;
				let values = *values;
				block_writer.element(|buf_state| {
					buf_state.write_length_delimited(key.as_bytes())?;
					value.serialize(DatumSerializer {
						state: buf_state,
						node: values,
					})
				})
			}
			Kind::Duration {
				values,
				gotten_values,
				pending_field,
				..
			} => {
				let duration_field = pending_field
					.take()
					.ok_or_else(|| SerError::new("serialize_value called before serialize_key"))?;
				serialize_duration_field(values, gotten_values, duration_field, value)
			}
		}
	}

	fn end(self) -> Result<Self::Ok, Self::Error> {
		self.end_inner()
	}
}
