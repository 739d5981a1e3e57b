//! Canonical textual form, the input to fingerprinting
//!
//! This follows the Avro "Parsing Canonical Form" transformation, extended to
//! preserve `logicalType` (with `precision`/`scale`, the latter omitted when
//! zero) and the `sqlType` marker, since those carry codec-relevant meaning.

use crate::schema::{
	safe::{self as s, LogicalType, RegularType, SchemaKey, SchemaMut},
	SchemaError,
};

use std::fmt::Write;

impl SchemaMut {
	/// Obtain the canonical form of the schema
	///
	/// This is the normalized JSON representation whose digest is the
	/// schema's stable identity. Note that, strictly copying the reference
	/// implementation, no JSON escaping is performed, so for the (invalid)
	/// names that would require escaping this may not be valid JSON.
	pub fn canonical_form(&self) -> Result<String, SchemaError> {
		let mut out = String::new();
		self.write_canonical_form(&mut out)?;
		Ok(out)
	}

	/// Write the canonical form of the schema into any [`std::fmt::Write`]
	///
	/// This is how digests get fed without materializing the string.
	pub fn write_canonical_form<W: Write>(&self, writer: W) -> Result<(), SchemaError> {
		let mut state = WriteCanonicalFormState {
			w: ErrorConversionWriter(writer),
			named_type_written: vec![false; self.nodes.len()],
		};
		state.write_canonical_form(self, self.root)
	}
}

impl std::fmt::Display for SchemaMut {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.write_canonical_form(f).map_err(|_| std::fmt::Error)
	}
}

struct WriteCanonicalFormState<W> {
	w: ErrorConversionWriter<W>,
	named_type_written: Vec<bool>,
}

impl<W: Write> WriteCanonicalFormState<W> {
	fn write_canonical_form(
		&mut self,
		schema: &SchemaMut,
		key: SchemaKey,
	) -> Result<(), SchemaError> {
		let node = schema
			.nodes
			.get(key.idx)
			.ok_or_else(|| SchemaError::new("SchemaKey refers to non-existing node"))?;

		let mut first_time = true;
		// Named types are written in full only once, then referenced by name
		let should_not_write_only_name = |name: &crate::schema::Name,
		                                  state: &mut WriteCanonicalFormState<W>|
		 -> Result<bool, SchemaError> {
			Ok(match &mut state.named_type_written[key.idx] {
				b @ false => {
					*b = true;
					true
				}
				true => {
					state.w.write_char('"')?;
					state.w.write_str(name.fully_qualified_name())?;
					state.w.write_char('"')?;
					false
				}
			})
		};

		match node.type_ {
			ref primitive @ (RegularType::Null
			| RegularType::Boolean
			| RegularType::Int
			| RegularType::Long
			| RegularType::Float
			| RegularType::Double
			| RegularType::Bytes
			| RegularType::String) => {
				let name = match primitive {
					RegularType::Null => "null",
					RegularType::Boolean => "boolean",
					RegularType::Int => "int",
					RegularType::Long => "long",
					RegularType::Float => "float",
					RegularType::Double => "double",
					RegularType::Bytes => "bytes",
					RegularType::String => "string",
					_ => unreachable!(),
				};
				if node.logical_type.is_none() && node.sql_type.is_none() {
					// A primitive with no attributes is a bare string
					self.w.write_char('"')?;
					self.w.write_str(name)?;
					self.w.write_char('"')?;
				} else {
					self.w.write_str("{\"type\":\"")?;
					self.w.write_str(name)?;
					self.w.write_char('"')?;
					self.write_attributes(node)?;
					self.w.write_char('}')?;
				}
			}
			RegularType::Union(ref union) => {
				self.w.write_char('[')?;
				for &variant in &union.variants {
					if !first_time {
						self.w.write_char(',')?;
					} else {
						first_time = false;
					}
					self.write_canonical_form(schema, variant)?;
				}
				self.w.write_char(']')?;
			}
			RegularType::Array(ref array) => {
				self.w.write_str("{\"type\":\"array\",\"items\":")?;
				self.write_canonical_form(schema, array.items)?;
				self.write_attributes(node)?;
				self.w.write_char('}')?;
			}
			RegularType::Map(ref map) => {
				self.w.write_str("{\"type\":\"map\",\"values\":")?;
				self.write_canonical_form(schema, map.values)?;
				self.write_attributes(node)?;
				self.w.write_char('}')?;
			}
			RegularType::Enum(ref enum_) => {
				if should_not_write_only_name(&enum_.name, self)? {
					self.w.write_str("{\"name\":\"")?;
					self.w.write_str(enum_.name.fully_qualified_name())?;
					self.w.write_str("\",\"type\":\"enum\",\"symbols\":[")?;
					for enum_symbol in enum_.symbols.iter() {
						if !first_time {
							self.w.write_char(',')?;
						} else {
							first_time = false;
						}
						self.w.write_char('"')?;
						self.w.write_str(enum_symbol)?;
						self.w.write_char('"')?;
					}
					self.w.write_char(']')?;
					self.w.write_char('}')?;
				}
			}
			RegularType::Fixed(ref fixed) => {
				if should_not_write_only_name(&fixed.name, self)? {
					self.w.write_str("{\"name\":\"")?;
					self.w.write_str(fixed.name.fully_qualified_name())?;
					self.w.write_str("\",\"type\":\"fixed\",\"size\":")?;
					write!(self.w.0, "{}", fixed.size).map_err(convert_error)?;
					self.write_attributes(node)?;
					self.w.write_char('}')?;
				}
			}
			RegularType::Record(ref record) => {
				if should_not_write_only_name(&record.name, self)? {
					self.w.write_str("{\"name\":\"")?;
					self.w.write_str(record.name.fully_qualified_name())?;
					// An error is encoded exactly like the equivalent record,
					// so they canonicalize (and fingerprint) identically
					self.w.write_str("\",\"type\":\"record\",\"fields\":[")?;
					for field in record.fields.iter() {
						if !first_time {
							self.w.write_char(',')?;
						} else {
							first_time = false;
						}
						self.w.write_str("{\"name\":\"")?;
						self.w.write_str(&field.name)?;
						self.w.write_str("\",\"type\":")?;
						self.write_canonical_form(schema, field.type_)?;
						self.w.write_char('}')?;
					}
					self.w.write_str("]}")?;
				}
			}
		}
		Ok(())
	}

	/// The `logicalType`/`precision`/`scale`/`sqlType` tail of an object form
	fn write_attributes(&mut self, node: &s::SchemaNode) -> Result<(), SchemaError> {
		if let Some(logical_type) = &node.logical_type {
			self.w.write_str(",\"logicalType\":\"")?;
			self.w.write_str(logical_type.as_str())?;
			self.w.write_char('"')?;
			if let LogicalType::Decimal(decimal) = logical_type {
				self.w.write_str(",\"precision\":")?;
				write!(self.w.0, "{}", decimal.precision).map_err(convert_error)?;
				if decimal.scale != 0 {
					self.w.write_str(",\"scale\":")?;
					write!(self.w.0, "{}", decimal.scale).map_err(convert_error)?;
				}
			}
		}
		if let Some(sql_type) = &node.sql_type {
			self.w.write_str(",\"sqlType\":\"")?;
			self.w.write_str(sql_type)?;
			self.w.write_char('"')?;
		}
		Ok(())
	}
}

/// Convert errors from `std::fmt::Write` to `SchemaError`
/// in order to be able to use `?` in `WriteCanonicalFormState`
struct ErrorConversionWriter<W>(W);
impl<W: Write> ErrorConversionWriter<W> {
	#[inline]
	fn write_char(&mut self, c: char) -> Result<(), SchemaError> {
		self.0.write_char(c).map_err(convert_error)
	}
	#[inline]
	fn write_str(&mut self, s: &str) -> Result<(), SchemaError> {
		self.0.write_str(s).map_err(convert_error)
	}
}
fn convert_error(e: std::fmt::Error) -> SchemaError {
	SchemaError::msg(format_args!(
		"Error writing schema parsing canonical form: {}",
		e,
	))
}
