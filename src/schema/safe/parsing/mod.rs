mod raw;

use crate::schema::{is_valid_name, safe::*, Name, SchemaError};

use std::collections::HashMap;

const LATE_NAME_LOOKUP_REMAP_BIT: usize = 1usize << (usize::BITS - 1);

impl std::str::FromStr for SchemaMut {
	type Err = SchemaError;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut parser = Parser::new();
		parser.parse_str(s)?;
		let mut schema = parser.into_schema()?;
		schema.schema_json = Some(
			String::from_utf8({
				// Sanitize & minify json, preserving all keys.
				let mut serializer = serde_json::Serializer::new(Vec::new());
				serde_transcode::transcode(
					&mut serde_json::Deserializer::from_str(s),
					&mut serializer,
				)
				.map_err(SchemaError::serde_json)?;
				serializer.into_inner()
			})
			.map_err(|e| {
				SchemaError::msg(format_args!(
					"serde_json should not emit invalid UTF-8 but got {e}"
				))
			})?,
		);
		Ok(schema)
	}
}

/// Incremental schema parser, holding named definitions across documents
///
/// Every named schema encountered while parsing is registered under its full
/// name and all of its aliases, so a later document may reference types
/// defined by an earlier one. [`into_schema`](Self::into_schema) returns the
/// whole graph, rooted at the last parsed document's root.
///
/// ```
/// let mut parser = avro_datum::schema::Parser::new();
/// parser
/// 	.parse_str(r#"{"type": "fixed", "name": "ns.Id", "size": 8}"#)
/// 	.unwrap();
/// parser
/// 	.parse_str(r#"{"type": "array", "items": "ns.Id"}"#)
/// 	.unwrap();
/// let schema = parser.into_schema().unwrap();
/// assert!(matches!(
/// 	schema.root().type_,
/// 	avro_datum::schema::RegularType::Array(_)
/// ));
/// ```
pub struct Parser {
	nodes: Vec<SchemaNode>,
	names: HashMap<NameKey, usize>,
	last_root: Option<SchemaKey>,
}

impl Default for Parser {
	fn default() -> Self {
		Self::new()
	}
}

impl Parser {
	/// Construct an empty parser
	pub fn new() -> Self {
		Self {
			nodes: Vec::new(),
			names: HashMap::new(),
			last_root: None,
		}
	}

	/// Parse one schema document, registering its named types
	///
	/// Returns the key of the document's root node.
	pub fn parse_str(&mut self, s: &str) -> Result<SchemaKey, SchemaError> {
		let raw_schema: raw::SchemaNode =
			serde_json::from_str(s).map_err(SchemaError::serde_json)?;

		let document_start = self.nodes.len();
		let mut state = DocumentState {
			parser: self,
			unresolved_names: Vec::new(),
			pending_defaults: Vec::new(),
		};
		let root = state.register_node(&raw_schema, None)?;
		let unresolved_names = std::mem::take(&mut state.unresolved_names);
		let pending_defaults = std::mem::take(&mut state.pending_defaults);

		// Support for unordered name definitions (within this document, or
		// against any previously parsed document)
		let root = self.resolve_late_names(document_start, root, unresolved_names)?;

		// Defaults can only be coerced once every reference is resolved
		let raw_defaults: super::default_value::RawDefaults<'_> = pending_defaults
			.iter()
			.map(|pending| ((pending.node_idx, pending.field_idx), &pending.json))
			.collect();
		for pending in &pending_defaults {
			let field_type = match &self.nodes[pending.node_idx].type_ {
				RegularType::Record(record) => record.fields[pending.field_idx].type_,
				_ => unreachable!("pending defaults only registered on records"),
			};
			let coerced =
				super::default_value::coerce(&self.nodes, field_type, &pending.json, &raw_defaults)
					.map_err(|e| {
						SchemaError::msg(format_args!(
							"Invalid default for field {:?}: {}",
							match &self.nodes[pending.node_idx].type_ {
								RegularType::Record(record) => {
									record.fields[pending.field_idx].name.as_str()
								}
								_ => unreachable!(),
							},
							e
						))
					})?;
			match &mut self.nodes[pending.node_idx].type_ {
				RegularType::Record(record) => {
					record.fields[pending.field_idx].default = Some(coerced)
				}
				_ => unreachable!(),
			}
		}

		self.validate_unions(document_start)?;

		self.last_root = Some(root);
		Ok(root)
	}

	/// Finish parsing, returning the graph rooted at the last document's root
	pub fn into_schema(self) -> Result<SchemaMut, SchemaError> {
		let root = self
			.last_root
			.ok_or_else(|| SchemaError::new("No schema document was parsed"))?;
		let schema = SchemaMut {
			nodes: self.nodes,
			root,
			schema_json: None,
		};
		schema
			.check_for_cycles()
			.map_err(|e: UnconditionalCycle| SchemaError::display(e))?;
		Ok(schema)
	}

	fn resolve_late_names(
		&mut self,
		document_start: usize,
		root: SchemaKey,
		unresolved_names: Vec<NameKey>,
	) -> Result<SchemaKey, SchemaError> {
		if unresolved_names.is_empty() {
			return Ok(root);
		}
		let resolved_names: Vec<SchemaKey> = unresolved_names
			.into_iter()
			.map(|name| {
				self.names
					.get(&name)
					.ok_or_else(|| {
						SchemaError::msg(format_args!(
							"The Schema contains an unknown reference: {}",
							name
						))
					})
					.map(|&idx| SchemaKey { idx })
			})
			.collect::<Result<_, _>>()?;
		let fix_key = |key: &mut SchemaKey| {
			if key.idx & LATE_NAME_LOOKUP_REMAP_BIT != 0 {
				*key = resolved_names[key.idx ^ LATE_NAME_LOOKUP_REMAP_BIT];
			}
		};
		for schema_node in &mut self.nodes[document_start..] {
			match &mut schema_node.type_ {
				RegularType::Array(Array { items: key }) | RegularType::Map(Map { values: key }) => {
					fix_key(key)
				}
				RegularType::Union(union) => union.variants.iter_mut().for_each(fix_key),
				RegularType::Record(record) => {
					record.fields.iter_mut().for_each(|f| fix_key(&mut f.type_))
				}
				RegularType::Null
				| RegularType::Boolean
				| RegularType::Int
				| RegularType::Long
				| RegularType::Float
				| RegularType::Double
				| RegularType::Bytes
				| RegularType::String
				| RegularType::Enum(_)
				| RegularType::Fixed(_) => {}
			}
		}
		let mut root = root;
		fix_key(&mut root);
		Ok(root)
	}

	/// Union invariants can only be checked once references are resolved
	fn validate_unions(&self, document_start: usize) -> Result<(), SchemaError> {
		for node in &self.nodes[document_start..] {
			if let RegularType::Union(union) = &node.type_ {
				let mut seen = std::collections::HashSet::with_capacity(union.variants.len());
				for &variant in &union.variants {
					let variant_node = self
						.nodes
						.get(variant.idx)
						.ok_or_else(|| SchemaError::new("Union branch refers to unknown node"))?;
					if matches!(variant_node.type_, RegularType::Union(_)) {
						return Err(SchemaError::new("Unions may not immediately contain unions"));
					}
					let type_name = union_branch_type_name(&self.nodes, variant)
						.ok_or_else(|| SchemaError::new("Union branch refers to unknown node"))?;
					if !seen.insert(type_name.clone()) {
						return Err(SchemaError::msg(format_args!(
							"Union contains duplicate branch type name {:?}",
							type_name
						)));
					}
				}
			}
		}
		Ok(())
	}
}

struct DocumentState<'p> {
	parser: &'p mut Parser,
	unresolved_names: Vec<NameKey>,
	pending_defaults: Vec<PendingDefault>,
}

struct PendingDefault {
	node_idx: usize,
	field_idx: usize,
	json: serde_json::Value,
}

impl DocumentState<'_> {
	fn register_node(
		&mut self,
		raw_schema: &raw::SchemaNode<'_>,
		enclosing_namespace: Option<&str>,
	) -> Result<SchemaKey, SchemaError> {
		Ok(match *raw_schema {
			raw::SchemaNode::Type(type_) => {
				let idx = self.parser.nodes.len();
				self.parser.nodes.push(SchemaNode::new(match type_ {
					raw::Type::Null => RegularType::Null,
					raw::Type::Boolean => RegularType::Boolean,
					raw::Type::Int => RegularType::Int,
					raw::Type::Long => RegularType::Long,
					raw::Type::Float => RegularType::Float,
					raw::Type::Double => RegularType::Double,
					raw::Type::Bytes => RegularType::Bytes,
					raw::Type::String => RegularType::String,
					complex_type @ (raw::Type::Array
					| raw::Type::Map
					| raw::Type::Record
					| raw::Type::Error
					| raw::Type::Enum
					| raw::Type::Fixed) => {
						return Err(SchemaError::msg(format_args!(
							"Expected primitive type name, but got {:?} as type which is a complex \
								type, so should be in an object.",
							complex_type
						)))
					}
				}));
				SchemaKey { idx }
			}
			raw::SchemaNode::Object(ref object) => {
				self.register_object(object, enclosing_namespace)?
			}
			raw::SchemaNode::Union(ref union_schemas) => {
				let idx = self.parser.nodes.len();
				// Reserve the spot for us
				self.parser.nodes.push(SchemaNode::new(RegularType::Null));
				let new_node = SchemaNode::new(RegularType::Union(Union {
					variants: union_schemas
						.iter()
						.map(|schema| self.register_node(schema, enclosing_namespace))
						.collect::<Result<_, _>>()?,
				}));
				self.parser.nodes[idx] = new_node;
				SchemaKey { idx }
			}
			raw::SchemaNode::Ref(ref reference) => {
				// This is supposed to be the fullname of a previously defined
				// named type. We also tolerate definitions that only come
				// later in the document.
				let name_key = NameKey::parse(reference, enclosing_namespace);
				match self.parser.names.get(&name_key) {
					Some(&idx) => SchemaKey { idx },
					None => {
						let idx = self.unresolved_names.len();
						self.unresolved_names.push(name_key);
						SchemaKey {
							idx: idx | LATE_NAME_LOOKUP_REMAP_BIT,
						}
					}
				}
			}
		})
	}

	fn register_object(
		&mut self,
		object: &raw::SchemaNodeObject<'_>,
		enclosing_namespace: Option<&str>,
	) -> Result<SchemaKey, SchemaError> {
		let idx = self.parser.nodes.len();

		let name_key = match object.name {
			Some(ref name) => Some(self.name_key_for_definition(
				name,
				object.namespace.as_deref(),
				enclosing_namespace,
			)?),
			None => None,
		};
		let name = |type_: raw::Type| match &name_key {
			None => Err(SchemaError::msg(format_args!(
				"Missing name for type {:?}",
				type_
			))),
			Some(name_key) => Ok(name_key.clone()),
		};

		// Handle {"type": {"type": "string"}} (an object with an inner type
		// and nothing else is a valid representation), as well as
		// {"type": "SomeDefinedName"}.
		if let inner_type @ (raw::SchemaNode::Object(_) | raw::SchemaNode::Ref(_)) = &object.type_ {
			return if object_has_only_type_and_namespace(object) {
				self.register_node(
					inner_type,
					name_key
						.as_ref()
						.and_then(|n| n.namespace.as_deref())
						.or(enclosing_namespace),
				)
			} else {
				Err(SchemaError::new(
					"Got unnecessarily-nested type, but local object properties are set \
						- those would be ignored",
				))
			};
		}

		// {"type": ["null", "long"], ...}: inline union definition
		if let raw::SchemaNode::Union(ref union_schemas) = object.type_ {
			// Reserve the spot for us
			self.parser.nodes.push(SchemaNode::new(RegularType::Null));
			let variants = union_schemas
				.iter()
				.map(|schema| self.register_node(schema, enclosing_namespace))
				.collect::<Result<_, _>>()?;
			let mut node = SchemaNode::new(RegularType::Union(Union { variants }));
			node.properties = object.properties.clone();
			self.parser.nodes[idx] = node;
			return Ok(SchemaKey { idx });
		}

		let type_ = match object.type_ {
			raw::SchemaNode::Type(t) => t,
			_ => unreachable!("non-Type shapes handled above"),
		};

		// Register name -> node idx (and all aliases) before parsing fields,
		// so that fields may cyclically reference this very type.
		if let (
			Some(name_key),
			raw::Type::Record | raw::Type::Error | raw::Type::Enum | raw::Type::Fixed,
		) = (&name_key, type_)
		{
			self.register_name(name_key.clone(), idx)?;
			if let Some(aliases) = &object.aliases {
				for alias in aliases {
					let alias_key = NameKey::parse(alias, name_key.namespace.as_deref());
					if !alias_key.is_valid() {
						return Err(SchemaError::msg(format_args!(
							"Invalid alias: {:?}",
							alias
						)));
					}
					self.register_name(alias_key, idx)?;
				}
			}
		}

		// Reserve the spot for us
		self.parser.nodes.push(SchemaNode::new(RegularType::Null));

		macro_rules! required {
			($name: ident) => {
				match &object.$name {
					Some(v) => v,
					_ => {
						return Err(SchemaError::msg(format_args!(
							concat!("Missing field `", stringify!($name), "` on type {:?}"),
							type_
						)));
					}
				}
			};
		}

		let regular_type = match type_ {
			raw::Type::Array => RegularType::Array(Array {
				items: self.register_node(required!(items), enclosing_namespace)?,
			}),
			raw::Type::Map => RegularType::Map(Map {
				values: self.register_node(required!(values), enclosing_namespace)?,
			}),
			raw::Type::Enum => {
				let name_key = name(type_)?;
				let symbols: Vec<String> = required!(symbols)
					.iter()
					.map(|s| (**s).to_owned())
					.collect();
				if symbols.is_empty() {
					return Err(SchemaError::msg(format_args!(
						"Enum {} must have at least one symbol",
						name_key
					)));
				}
				let mut seen = std::collections::HashSet::with_capacity(symbols.len());
				for symbol in &symbols {
					if !is_valid_name(symbol) {
						return Err(SchemaError::msg(format_args!(
							"Invalid symbol {:?} in enum {}",
							symbol, name_key
						)));
					}
					if !seen.insert(symbol.as_str()) {
						return Err(SchemaError::msg(format_args!(
							"Duplicate symbol {:?} in enum {}",
							symbol, name_key
						)));
					}
				}
				let default = match &object.default {
					None => None,
					Some(serde_json::Value::String(default)) => {
						if !symbols.iter().any(|s| s == default) {
							return Err(SchemaError::msg(format_args!(
								"Default symbol {:?} does not appear in enum {}",
								default, name_key
							)));
						}
						Some(default.clone())
					}
					Some(_) => {
						return Err(SchemaError::msg(format_args!(
							"Default of enum {} must be a string",
							name_key
						)))
					}
				};
				RegularType::Enum(Enum {
					name: name_key.to_name(),
					aliases: self.alias_names(object, &name_key),
					doc: object.doc.as_deref().map(str::to_owned),
					symbols,
					default,
				})
			}
			raw::Type::Fixed => {
				let name_key = name(type_)?;
				RegularType::Fixed(Fixed {
					name: name_key.to_name(),
					aliases: self.alias_names(object, &name_key),
					doc: object.doc.as_deref().map(str::to_owned),
					size: *required!(size),
				})
			}
			raw::Type::Record | raw::Type::Error => {
				let name_key = name(type_)?;
				let fields = required!(fields)
					.iter()
					.enumerate()
					.map(|(field_idx, field)| {
						if !is_valid_name(&field.name) {
							return Err(SchemaError::msg(format_args!(
								"Invalid field name {:?} in record {}",
								field.name, name_key
							)));
						}
						if let Some(json) = &field.default {
							self.pending_defaults.push(PendingDefault {
								node_idx: idx,
								field_idx,
								json: json.clone(),
							});
						}
						Ok(Field {
							name: (*field.name).to_owned(),
							type_: self
								.register_node(&field.type_, name_key.namespace.as_deref())?,
							default: None,
							order: match field.order.as_deref() {
								None | Some("ascending") => FieldOrder::Ascending,
								Some("descending") => FieldOrder::Descending,
								Some("ignore") => FieldOrder::Ignore,
								Some(other) => {
									return Err(SchemaError::msg(format_args!(
										"Invalid field order {:?} on field {:?}",
										other, field.name
									)))
								}
							},
							aliases: field
								.aliases
								.iter()
								.flatten()
								.map(|a| (**a).to_owned())
								.collect(),
							doc: field.doc.as_deref().map(str::to_owned),
							action: FieldAction::None,
							properties: field.properties.clone(),
						})
					})
					.collect::<Result<_, SchemaError>>()?;
				RegularType::Record(Record {
					name: name_key.to_name(),
					aliases: self.alias_names(object, &name_key),
					doc: object.doc.as_deref().map(str::to_owned),
					fields,
					error: matches!(type_, raw::Type::Error),
				})
			}
			raw::Type::Null
			| raw::Type::Boolean
			| raw::Type::Int
			| raw::Type::Long
			| raw::Type::Float
			| raw::Type::Double
			| raw::Type::Bytes
			| raw::Type::String => match type_ {
				raw::Type::Null => RegularType::Null,
				raw::Type::Boolean => RegularType::Boolean,
				raw::Type::Int => RegularType::Int,
				raw::Type::Long => RegularType::Long,
				raw::Type::Float => RegularType::Float,
				raw::Type::Double => RegularType::Double,
				raw::Type::Bytes => RegularType::Bytes,
				raw::Type::String => RegularType::String,
				_ => unreachable!(),
			},
		};

		let logical_type = match &object.logical_type {
			None => None,
			Some(logical_type) => Some(self.parse_logical_type(
				logical_type,
				object,
				&regular_type,
			)?),
		};

		self.parser.nodes[idx] = SchemaNode {
			type_: regular_type,
			logical_type,
			sql_type: object.sql_type.as_deref().map(str::to_owned),
			properties: object.properties.clone(),
		};
		Ok(SchemaKey { idx })
	}

	fn parse_logical_type(
		&self,
		logical_type: &str,
		object: &raw::SchemaNodeObject<'_>,
		regular_type: &RegularType,
	) -> Result<LogicalType, SchemaError> {
		Ok(match logical_type {
			"decimal" => {
				let precision = match object.precision {
					Some(v) => v,
					None => {
						return Err(SchemaError::new(
							"Missing field `precision` on logical type decimal",
						))
					}
				};
				let scale = object.scale.unwrap_or(0);
				if precision == 0 {
					return Err(SchemaError::new("Decimal precision must be greater than 0"));
				}
				if scale as usize > precision {
					return Err(SchemaError::msg(format_args!(
						"Decimal scale ({scale}) must not exceed precision ({precision})"
					)));
				}
				if let RegularType::Fixed(fixed) = regular_type {
					let max_precision = max_decimal_precision_for_fixed(fixed.size);
					if precision > max_precision {
						return Err(SchemaError::msg(format_args!(
							"Decimal precision {} does not fit in fixed of size {} \
								(maximum is {})",
							precision, fixed.size, max_precision
						)));
					}
				}
				LogicalType::Decimal(Decimal { precision, scale })
			}
			"uuid" => LogicalType::Uuid,
			"date" => LogicalType::Date,
			"time-millis" => LogicalType::TimeMillis,
			"time-micros" => LogicalType::TimeMicros,
			"timestamp-millis" => LogicalType::TimestampMillis,
			"timestamp-micros" => LogicalType::TimestampMicros,
			"duration" => {
				match regular_type {
					RegularType::Fixed(fixed) if fixed.size == 12 => {}
					RegularType::Fixed(fixed) => {
						return Err(SchemaError::msg(format_args!(
							"Duration logical type requires fixed of size 12, got {}",
							fixed.size
						)))
					}
					// On other types the annotation carries no meaning, but
					// it is preserved like any unknown logical type
					_ => {}
				}
				LogicalType::Duration
			}
			unknown => LogicalType::Unknown(unknown.to_owned()),
		})
	}

	fn name_key_for_definition(
		&self,
		name: &str,
		namespace: Option<&str>,
		enclosing_namespace: Option<&str>,
	) -> Result<NameKey, SchemaError> {
		let name_key = if let Some((namespace, name)) = name.rsplit_once('.') {
			// A dotted name is fully qualified and overrides any namespace
			NameKey {
				namespace: Some(namespace).filter(|s| !s.is_empty()).map(str::to_owned),
				name: name.to_owned(),
			}
		} else {
			NameKey {
				namespace: match namespace {
					// An explicit empty string indicates the null namespace
					Some(namespace) => Some(namespace).filter(|s| !s.is_empty()).map(str::to_owned),
					None => enclosing_namespace.map(str::to_owned),
				},
				name: name.to_owned(),
			}
		};
		if !name_key.is_valid() {
			return Err(SchemaError::msg(format_args!("Invalid name: {}", name_key)));
		}
		Ok(name_key)
	}

	fn register_name(&mut self, name_key: NameKey, idx: usize) -> Result<(), SchemaError> {
		if self.parser.names.insert(name_key.clone(), idx).is_some() {
			return Err(SchemaError::msg(format_args!(
				"The Schema contains duplicate definitions for {}",
				name_key
			)));
		}
		Ok(())
	}

	fn alias_names(&self, object: &raw::SchemaNodeObject<'_>, name_key: &NameKey) -> Vec<Name> {
		object
			.aliases
			.iter()
			.flatten()
			.map(|alias| {
				NameKey::parse(alias, name_key.namespace.as_deref()).to_name()
			})
			.collect()
	}
}

fn object_has_only_type_and_namespace(object: &raw::SchemaNodeObject<'_>) -> bool {
	matches!(
		object,
		raw::SchemaNodeObject {
			type_: _,
			name: _,
			namespace: _,
			logical_type: None,
			aliases: None,
			doc: None,
			fields: None,
			symbols: None,
			default: None,
			items: None,
			values: None,
			size: None,
			precision: None,
			scale: None,
			sql_type: None,
			properties,
		} if properties.is_empty()
	)
}

#[derive(PartialEq, Eq, Hash, Clone)]
struct NameKey {
	namespace: Option<String>,
	name: String,
}

impl NameKey {
	/// Resolve a textual reference or alias against an enclosing namespace
	fn parse(reference: &str, enclosing_namespace: Option<&str>) -> Self {
		if let Some((namespace, name)) = reference.rsplit_once('.') {
			NameKey {
				namespace: Some(namespace).filter(|s| !s.is_empty()).map(str::to_owned),
				name: name.to_owned(),
			}
		} else {
			NameKey {
				namespace: enclosing_namespace.map(str::to_owned),
				name: reference.to_owned(),
			}
		}
	}

	fn is_valid(&self) -> bool {
		is_valid_name(&self.name)
			&& self
				.namespace
				.as_deref()
				.map_or(true, |ns| ns.split('.').all(is_valid_name))
	}

	fn to_name(&self) -> Name {
		match &self.namespace {
			None => Name::from_fully_qualified_name(self.name.clone()),
			Some(namespace) => {
				Name::from_fully_qualified_name(format!("{}.{}", namespace, self.name))
			}
		}
	}
}

impl std::fmt::Display for NameKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match &self.namespace {
			None => self.name.fmt(f),
			Some(namespace) => write!(f, "{}.{}", namespace, self.name),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::max_decimal_precision_for_fixed;

	#[test]
	fn fixed_decimal_capacity() {
		// 1 byte: two's complement holds ±127 -> 2 digits
		assert_eq!(max_decimal_precision_for_fixed(1), 2);
		// 4 bytes: ±(2^31 - 1) ~ 2.1e9 -> 9 digits
		assert_eq!(max_decimal_precision_for_fixed(4), 9);
		// 8 bytes: ±(2^63 - 1) ~ 9.2e18 -> 18 digits
		assert_eq!(max_decimal_precision_for_fixed(8), 18);
	}
}
