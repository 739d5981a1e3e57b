use super::*;

use crate::schema::frozen::SchemaKey;

/// What sequences, tuples and tuple structs may serialize into: a blocked
/// array, or a duration given as three u32s
pub struct SerializeAsArrayOrDuration<'r, 'c, 's, W> {
	kind: Kind<'r, 'c, 's, W>,
}

enum Kind<'r, 'c, 's, W> {
	Array {
		block_writer: BlockWriter<'r, 'c, 's, W>,
		items: &'s Node,
	},
	Duration {
		state: &'r mut SerializerState<'c, 's, W>,
		values: [u32; 3],
		n_values: usize,
	},
}

impl<'r, 'c, 's, W: Write> SerializeAsArrayOrDuration<'r, 'c, 's, W> {
	pub(super) fn array(block_writer: BlockWriter<'r, 'c, 's, W>, items: SchemaKey) -> Self {
		let items = block_writer.state.config.schema.node(items);
		Self {
			kind: Kind::Array {
				block_writer,
				items,
			},
		}
	}

	pub(super) fn duration(state: &'r mut SerializerState<'c, 's, W>) -> Self {
		Self {
			kind: Kind::Duration {
				state,
				values: [0; 3],
				n_values: 0,
			},
		}
	}

	fn serialize_element_inner<T: ?Sized>(&mut self, value: &T) -> Result<(), SerError>
	where
		T: Serialize,
	{
		match &mut self.kind {
			Kind::Array {
				block_writer,
				items,
			} => {
				let items = *items;
				block_writer.element(|buf_state| {
					value.serialize(DatumSerializer {
						state: buf_state,
						node: items,
					})
				})
			}
			Kind::Duration {
				values,
				n_values,
				..
			} => {
				let slot = values
					.get_mut(*n_values)
					.ok_or_else(duration_seq_len_incorrect)?;
				*slot = value.serialize(extractors::ExtractU32ForDuration)?;
				*n_values += 1;
				Ok(())
			}
		}
	}

	fn end_inner(mut self) -> Result<(), SerError> {
		match &mut self.kind {
			Kind::Array { block_writer, .. } => block_writer.end(),
			Kind::Duration {
				state,
				values,
				n_values,
			} => {
				if *n_values != 3 {
					return Err(duration_seq_len_incorrect());
				}
				let [months, days, milliseconds] = *values;
				let mut buf = [0u8; 12];
				buf[0..4].copy_from_slice(&months.to_le_bytes());
				buf[4..8].copy_from_slice(&days.to_le_bytes());
				buf[8..12].copy_from_slice(&milliseconds.to_le_bytes());
				state.writer.write_all(&buf).map_err(SerError::io)
			}
		}
	}
}

pub(super) fn duration_seq_len_incorrect() -> SerError {
	SerError::new(
		"A sequence, tuple or tuple struct can indeed be serialized as Duration, \
			but only if it has exactly 3 u32 elements (months, days, milliseconds)",
	)
}

macro_rules! impl_serialize_seq_traits {
	($($trait_: ident $fn_name: ident,)*) => {
		$(
			impl<'r, 'c, 's, W: Write> $trait_ for SerializeAsArrayOrDuration<'r, 'c, 's, W> {
				type Ok = ();
				type Error = SerError;

				fn $fn_name<T: ?Sized>(&mut self, value: &T) -> Result<(), Self::Error>
				where
					T: Serialize,
				{
					self.serialize_element_inner(value)
				}

				fn end(self) -> Result<Self::Ok, Self::Error> {
					self.end_inner()
				}
			}
		)*
	};
}

impl_serialize_seq_traits! {
	SerializeSeq serialize_element,
	SerializeTuple serialize_element,
	SerializeTupleStruct serialize_field,
	SerializeTupleVariant serialize_field,
}
