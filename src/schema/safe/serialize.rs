//! Re-generation of the schema JSON from the graph
//!
//! Used when the original document is not available anymore (multi-document
//! parsing, programmatically built or edited graphs).

use super::*;

use {serde::ser::*, std::cell::RefCell};

impl SchemaMut {
	pub(crate) fn serialize_to_json(&self) -> Result<String, SchemaError> {
		serde_json::to_string(self).map_err(SchemaError::serde_json)
	}
}

impl Serialize for SchemaMut {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		SerializeSchema {
			schema: self,
			named_type_written: &RefCell::new(vec![false; self.nodes.len()]),
			key: self.root,
		}
		.serialize(serializer)
	}
}

struct SerializeSchema<'a, K> {
	schema: &'a SchemaMut,
	/// Named types serialize their full definition once, then by reference,
	/// which is also what keeps cyclic schemas from recursing forever
	named_type_written: &'a RefCell<Vec<bool>>,
	key: K,
}

impl<'a, K> SerializeSchema<'a, K> {
	fn serializable<NK>(&self, key: NK) -> SerializeSchema<'a, NK> {
		SerializeSchema {
			schema: self.schema,
			named_type_written: self.named_type_written,
			key,
		}
	}
}

impl Serialize for SerializeSchema<'_, SchemaKey> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let node = self
			.schema
			.nodes
			.get(self.key.idx)
			.ok_or_else(|| S::Error::custom("SchemaKey refers to non-existing node"))?;

		let plain = node.logical_type.is_none()
			&& node.sql_type.is_none()
			&& node.properties.is_empty();

		let attributes = |map: &mut S::SerializeMap| -> Result<(), S::Error> {
			if let Some(logical_type) = &node.logical_type {
				map.serialize_entry("logicalType", logical_type.as_str())?;
				if let LogicalType::Decimal(decimal) = logical_type {
					map.serialize_entry("precision", &decimal.precision)?;
					if decimal.scale != 0 {
						map.serialize_entry("scale", &decimal.scale)?;
					}
				}
			}
			if let Some(sql_type) = &node.sql_type {
				map.serialize_entry("sqlType", sql_type)?;
			}
			for (property, value) in &node.properties {
				map.serialize_entry(property, value)?;
			}
			Ok(())
		};
		let aliases = |map: &mut S::SerializeMap, aliases: &[crate::schema::Name]| {
			if aliases.is_empty() {
				Ok(())
			} else {
				map.serialize_entry(
					"aliases",
					&aliases
						.iter()
						.map(|a| a.fully_qualified_name())
						.collect::<Vec<_>>(),
				)
			}
		};
		let already_written = || {
			let mut written = self.named_type_written.borrow_mut();
			let first_time = !written[self.key.idx];
			written[self.key.idx] = true;
			!first_time
		};

		match &node.type_ {
			primitive @ (RegularType::Null
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
				if plain {
					serializer.serialize_str(name)
				} else {
					let mut map = serializer.serialize_map(None)?;
					map.serialize_entry("type", name)?;
					attributes(&mut map)?;
					map.end()
				}
			}
			RegularType::Array(array) => {
				let mut map = serializer.serialize_map(None)?;
				map.serialize_entry("type", "array")?;
				map.serialize_entry("items", &self.serializable(array.items))?;
				attributes(&mut map)?;
				map.end()
			}
			RegularType::Map(map_type) => {
				let mut map = serializer.serialize_map(None)?;
				map.serialize_entry("type", "map")?;
				map.serialize_entry("values", &self.serializable(map_type.values))?;
				attributes(&mut map)?;
				map.end()
			}
			RegularType::Union(union) => {
				let mut seq = serializer.serialize_seq(Some(union.variants.len()))?;
				for &union_variant_key in &union.variants {
					seq.serialize_element(&self.serializable(union_variant_key))?;
				}
				seq.end()
			}
			RegularType::Record(record) => {
				if already_written() {
					serializer.serialize_str(record.name.fully_qualified_name())
				} else {
					let mut map = serializer.serialize_map(None)?;
					map.serialize_entry("name", record.name.fully_qualified_name())?;
					map.serialize_entry("type", if record.error { "error" } else { "record" })?;
					aliases(&mut map, &record.aliases)?;
					if let Some(doc) = &record.doc {
						map.serialize_entry("doc", doc)?;
					}
					map.serialize_entry("fields", &self.serializable(record.fields.as_slice()))?;
					attributes(&mut map)?;
					map.end()
				}
			},
			RegularType::Enum(enum_) => {
				if already_written() {
					serializer.serialize_str(enum_.name.fully_qualified_name())
				} else {
					let mut map = serializer.serialize_map(None)?;
					map.serialize_entry("name", enum_.name.fully_qualified_name())?;
					map.serialize_entry("type", "enum")?;
					aliases(&mut map, &enum_.aliases)?;
					map.serialize_entry("symbols", &enum_.symbols)?;
					if let Some(default) = &enum_.default {
						map.serialize_entry("default", default)?;
					}
					attributes(&mut map)?;
					map.end()
				}
			},
			RegularType::Fixed(fixed) => {
				if already_written() {
					serializer.serialize_str(fixed.name.fully_qualified_name())
				} else {
					let mut map = serializer.serialize_map(None)?;
					map.serialize_entry("name", fixed.name.fully_qualified_name())?;
					map.serialize_entry("type", "fixed")?;
					aliases(&mut map, &fixed.aliases)?;
					map.serialize_entry("size", &fixed.size)?;
					attributes(&mut map)?;
					map.end()
				}
			},
		}
	}
}

impl Serialize for SerializeSchema<'_, &[Field]> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut seq = serializer.serialize_seq(Some(self.key.len()))?;
		for field in self.key {
			seq.serialize_element(&self.serializable(field))?;
		}
		seq.end()
	}
}

impl Serialize for SerializeSchema<'_, &Field> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(None)?;
		map.serialize_entry("name", &self.key.name)?;
		map.serialize_entry("type", &self.serializable(self.key.type_))?;
		if let Some(default) = &self.key.default {
			map.serialize_entry("default", &default.to_default_json())?;
		}
		if self.key.order != FieldOrder::Ascending {
			map.serialize_entry("order", self.key.order.as_str())?;
		}
		if !self.key.aliases.is_empty() {
			map.serialize_entry("aliases", &self.key.aliases)?;
		}
		if let Some(doc) = &self.key.doc {
			map.serialize_entry("doc", doc)?;
		}
		for (property, value) in &self.key.properties {
			map.serialize_entry(property, value)?;
		}
		map.end()
	}
}
