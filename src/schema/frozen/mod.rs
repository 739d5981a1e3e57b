//! The immutable, fully pre-computed schema used by the serializer and
//! deserializer
//!
//! Freezing a [`SchemaMut`](crate::schema::SchemaMut) collapses logical
//! types into dedicated node variants, resolves the canonical form and
//! fingerprints, and pre-computes the lookup tables that make the codec hot
//! path cheap (field name -> index, enum symbol -> discriminant, union
//! branch lookup per shape and per type name).
//!
//! Nodes live in an index arena and reference each other through
//! [`SchemaKey`]s, so a possibly-cyclic schema graph needs no reference
//! cycles: walking a child is an array index through the owning [`Schema`].

mod per_type_lookup;

pub(crate) use per_type_lookup::{PerTypeLookup, ValueShape};

use crate::{
	schema::{
		safe::{self, union_branch_type_name, max_decimal_precision_for_fixed},
		fingerprint::Rabin,
		Name, SchemaError,
	},
	value::Value,
};

use std::{collections::HashMap, sync::OnceLock};

pub(crate) use safe::{FieldAction, SchemaKey};

/// Main schema type, opaque immutable representation of an Avro schema
///
/// This is the fully pre-computed form used by the serializer and
/// deserializer. It can only be built through
/// [its editable counterpart](crate::schema::SchemaMut) (via
/// [`.freeze()`](crate::schema::SchemaMut::freeze) or [`TryFrom`]), or
/// parsed directly from a `&str`.
pub struct Schema {
	nodes: Vec<Node>,
	root: usize,
	canonical_form: String,
	rabin: [u8; 8],
	/// Computed at most once, on demand
	sha256: OnceLock<[u8; 32]>,
	schema_json: String,
}

impl Schema {
	pub(crate) fn root(&self) -> &Node {
		// A frozen schema always has at least the root node
		&self.nodes[self.root]
	}

	pub(crate) fn node(&self, key: SchemaKey) -> &Node {
		// All keys in a frozen schema were bounds-checked at freeze time
		&self.nodes[key.idx]
	}

	/// Obtain the JSON for this schema
	pub fn json(&self) -> &str {
		&self.schema_json
	}

	/// Obtain the canonical form of this schema
	pub fn canonical_form(&self) -> &str {
		&self.canonical_form
	}

	/// The CRC-64-AVRO (Rabin) fingerprint of the schema, as little-endian
	/// bytes
	pub fn rabin_fingerprint(&self) -> &[u8; 8] {
		&self.rabin
	}

	/// The SHA-256 fingerprint of the schema
	///
	/// This is the schema's stable identity, notably used for codec caching.
	/// It is computed on first use, at most once.
	pub fn sha256_fingerprint(&self) -> &[u8; 32] {
		self.sha256.get_or_init(|| {
			use digest::Digest as _;
			let mut sha256 = sha2::Sha256::new();
			sha256.update(self.canonical_form.as_bytes());
			sha256.finalize().into()
		})
	}
}

/// A node of a frozen [`Schema`]
///
/// Logical types are collapsed into their own variants here: the codecs
/// dispatch on exactly one tag.
#[derive(Debug)]
pub(crate) enum Node {
	Null,
	Boolean,
	Int,
	Long,
	Float,
	Double,
	Bytes,
	String,
	Array(SchemaKey),
	Map(SchemaKey),
	Union(Union),
	Record(Record),
	Enum(Enum),
	Fixed(Fixed),
	Decimal(Decimal),
	Uuid,
	Date,
	TimeMillis,
	TimeMicros,
	TimestampMillis,
	TimestampMicros,
	Duration,
}

/// Component of a [`Node`]
pub(crate) struct Union {
	pub(crate) variants: Vec<SchemaKey>,
	/// Branch type names, in branch order: the full name for named branches,
	/// the primitive type string (`.<logical-type>`-suffixed if annotated)
	/// otherwise
	pub(crate) type_names: Vec<String>,
	/// Position of the `null` branch, when there is one
	///
	/// With exactly two branches this makes the union *nullable*, the shape
	/// `Option` maps onto.
	pub(crate) null_variant: Option<usize>,
	pub(crate) per_type_lookup: PerTypeLookup,
}

impl std::fmt::Debug for Union {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		// Skip per_type_lookup for readability
		f.debug_struct("Union")
			.field("type_names", &self.type_names)
			.finish()
	}
}

/// Component of a [`Node`]
pub(crate) struct Record {
	pub(crate) name: Name,
	pub(crate) fields: Vec<RecordField>,
	pub(crate) per_name_lookup: HashMap<String, usize>,
}

impl std::fmt::Debug for Record {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Record")
			.field("name", &self.name)
			.field(
				"fields",
				&self
					.fields
					.iter()
					.map(|f| f.name.as_str())
					.collect::<Vec<_>>(),
			)
			.finish()
	}
}

/// Component of a [`Node`]
#[derive(Debug)]
pub(crate) struct RecordField {
	pub(crate) name: String,
	pub(crate) schema: SchemaKey,
	/// Coerced at parse time, used for decode-time default fill
	pub(crate) default: Option<Value>,
	pub(crate) action: FieldAction,
}

/// Component of a [`Node`]
pub(crate) struct Enum {
	pub(crate) name: Name,
	pub(crate) symbols: Vec<String>,
	pub(crate) per_name_lookup: HashMap<String, usize>,
}

impl std::fmt::Debug for Enum {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Enum")
			.field("name", &self.name)
			.field("symbols", &self.symbols)
			.finish()
	}
}

/// Component of a [`Node`]
#[derive(Clone, Debug)]
pub(crate) struct Fixed {
	pub(crate) name: Name,
	pub(crate) size: usize,
}

/// Component of a [`Node`]
#[derive(Clone, Debug)]
pub(crate) struct Decimal {
	/// Kept for diagnostics; the wire format carries no precision
	pub(crate) _precision: usize,
	pub(crate) scale: u32,
	pub(crate) repr: DecimalRepr,
}

#[derive(Clone, Debug)]
pub(crate) enum DecimalRepr {
	Bytes,
	Fixed(Fixed),
}

impl TryFrom<safe::SchemaMut> for Schema {
	type Error = SchemaError;
	fn try_from(safe: safe::SchemaMut) -> Result<Self, SchemaError> {
		let n_nodes = safe.nodes().len();
		if n_nodes == 0 {
			return Err(SchemaError::new(
				"Schema must have at least one node (the root)",
			));
		}
		let root = safe.root_key().idx();
		if root >= n_nodes {
			return Err(SchemaError::new("Schema root refers to non-existing node"));
		}

		let canonical_form = safe.canonical_form()?;
		let rabin = {
			use digest::Update as _;
			let mut rabin = Rabin::default();
			rabin.update(canonical_form.as_bytes());
			rabin.sum_le()
		};
		let schema_json = match safe.schema_json {
			Some(ref json) => json.clone(),
			None => safe.serialize_to_json()?,
		};

		let check_key = |key: SchemaKey| -> Result<SchemaKey, SchemaError> {
			if key.idx() >= n_nodes {
				Err(SchemaError::msg(format_args!(
					"SchemaKey index {} is out of bounds (len: {})",
					key.idx(),
					n_nodes
				)))
			} else {
				Ok(key)
			}
		};

		// Union branch type names are derived from the editable form, before
		// logical types get collapsed
		let mut union_type_names: HashMap<usize, Vec<String>> = HashMap::new();
		for (idx, node) in safe.nodes().iter().enumerate() {
			if let safe::RegularType::Union(union) = &node.type_ {
				let mut type_names = Vec::with_capacity(union.variants.len());
				for &variant in &union.variants {
					check_key(variant)?;
					if matches!(
						safe.nodes()[variant.idx()].type_,
						safe::RegularType::Union(_)
					) {
						return Err(SchemaError::new("Unions may not immediately contain unions"));
					}
					let type_name = union_branch_type_name(safe.nodes(), variant)
						.expect("key was just bounds-checked");
					if type_names.contains(&type_name) {
						return Err(SchemaError::msg(format_args!(
							"Union contains duplicate branch type name {:?}",
							type_name
						)));
					}
					type_names.push(type_name);
				}
				union_type_names.insert(idx, type_names);
			}
		}

		let mut nodes = Vec::with_capacity(n_nodes);
		for (idx, safe_node) in safe.nodes.into_iter().enumerate() {
			let frozen_fixed = |fixed: &safe::Fixed| Fixed {
				name: fixed.name.clone(),
				size: fixed.size,
			};
			let safe::SchemaNode {
				logical_type,
				type_,
				..
			} = safe_node;
			let new_node = match (&logical_type, type_) {
				(Some(safe::LogicalType::Decimal(decimal)), safe::RegularType::Bytes) => {
					Node::Decimal(Decimal {
						_precision: decimal.precision,
						scale: decimal.scale,
						repr: DecimalRepr::Bytes,
					})
				}
				(Some(safe::LogicalType::Decimal(decimal)), safe::RegularType::Fixed(fixed)) => {
					let max_precision = max_decimal_precision_for_fixed(fixed.size);
					if decimal.precision > max_precision {
						return Err(SchemaError::msg(format_args!(
							"Decimal precision {} does not fit in fixed of size {} \
								(maximum is {})",
							decimal.precision, fixed.size, max_precision
						)));
					}
					Node::Decimal(Decimal {
						_precision: decimal.precision,
						scale: decimal.scale,
						repr: DecimalRepr::Fixed(frozen_fixed(&fixed)),
					})
				}
				(Some(safe::LogicalType::Uuid), safe::RegularType::String) => Node::Uuid,
				(Some(safe::LogicalType::Date), safe::RegularType::Int) => Node::Date,
				(Some(safe::LogicalType::TimeMillis), safe::RegularType::Int) => Node::TimeMillis,
				(Some(safe::LogicalType::TimeMicros), safe::RegularType::Long) => Node::TimeMicros,
				(Some(safe::LogicalType::TimestampMillis), safe::RegularType::Long) => {
					Node::TimestampMillis
				}
				(Some(safe::LogicalType::TimestampMicros), safe::RegularType::Long) => {
					Node::TimestampMicros
				}
				(Some(safe::LogicalType::Duration), safe::RegularType::Fixed(fixed))
					if fixed.size == 12 =>
				{
					Node::Duration
				}
				// Any other logical type annotation carries no codec meaning
				(_, regular_type) => match regular_type {
					safe::RegularType::Null => Node::Null,
					safe::RegularType::Boolean => Node::Boolean,
					safe::RegularType::Int => Node::Int,
					safe::RegularType::Long => Node::Long,
					safe::RegularType::Float => Node::Float,
					safe::RegularType::Double => Node::Double,
					safe::RegularType::Bytes => Node::Bytes,
					safe::RegularType::String => Node::String,
					safe::RegularType::Array(array) => Node::Array(check_key(array.items)?),
					safe::RegularType::Map(map) => Node::Map(check_key(map.values)?),
					safe::RegularType::Union(union) => {
						let type_names = union_type_names
							.remove(&idx)
							.expect("type names were computed for every union");
						let null_variant = type_names.iter().position(|name| name == "null");
						Node::Union(Union {
							null_variant,
							variants: union
								.variants
								.into_iter()
								.map(check_key)
								.collect::<Result<_, _>>()?,
							type_names,
							// Can't be initialized just yet because other
							// nodes may not have been built
							per_type_lookup: PerTypeLookup::placeholder(),
						})
					}
					safe::RegularType::Record(record) => {
						let mut fields = Vec::with_capacity(record.fields.len());
						for field in record.fields {
							if field.action == FieldAction::SetDefault && field.default.is_none() {
								return Err(SchemaError::msg(format_args!(
									"Field {:?} is marked to decode from its default \
										but carries no default",
									field.name
								)));
							}
							fields.push(RecordField {
								name: field.name,
								schema: check_key(field.type_)?,
								default: field.default,
								action: field.action,
							});
						}
						Node::Record(Record {
							per_name_lookup: fields
								.iter()
								.enumerate()
								.map(|(i, f)| (f.name.clone(), i))
								.collect(),
							fields,
							name: record.name,
						})
					}
					safe::RegularType::Enum(enum_) => Node::Enum(Enum {
						per_name_lookup: enum_
							.symbols
							.iter()
							.enumerate()
							.map(|(i, s)| (s.clone(), i))
							.collect(),
						symbols: enum_.symbols,
						name: enum_.name,
					}),
					safe::RegularType::Fixed(fixed) => Node::Fixed(frozen_fixed(&fixed)),
				},
			};
			nodes.push(new_node);
		}

		// Now that all nodes are built, the union per-type lookup tables can
		// read any of them
		let lookups: Vec<(usize, PerTypeLookup)> = nodes
			.iter()
			.enumerate()
			.filter_map(|(idx, node)| match node {
				Node::Union(union) => Some((
					idx,
					PerTypeLookup::new(&nodes, &union.variants, &union.type_names),
				)),
				_ => None,
			})
			.collect();
		for (idx, lookup) in lookups {
			match &mut nodes[idx] {
				Node::Union(union) => union.per_type_lookup = lookup,
				_ => unreachable!(),
			}
		}

		Ok(Self {
			nodes,
			root,
			canonical_form,
			rabin,
			sha256: OnceLock::new(),
			schema_json,
		})
	}
}

impl std::fmt::Debug for Schema {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(self.root(), f)
	}
}
