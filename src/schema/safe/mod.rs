//! Defines a fully-editable counterpart of the [`Schema`](crate::Schema) that
//! is used for its initialization

mod canonical_form;
mod check_for_cycles;
mod default_value;
mod parsing;
mod serialize;

use super::{Name, SchemaError};

pub use check_for_cycles::UnconditionalCycle;
pub use parsing::Parser;

use std::collections::BTreeMap;

/// Free-form schema properties, preserved verbatim from the schema JSON
///
/// Reserved keys (`type`, `name`, `fields`, ...) never end up in here.
pub type Properties = BTreeMap<String, serde_json::Value>;

/// An editable representation of an Avro schema
///
/// In there, references to other nodes are represented as [`SchemaKey`], which
/// allow to index into [`SchemaMut`].
///
/// It is useful to implement it this way because, due to how referencing via
/// [Names](https://avro.apache.org/docs/current/specification/#names) works in Avro,
/// the most performant representation of an Avro schema is not a tree but a
/// possibly-cyclic general directed graph.
#[derive(Clone, Debug)]
pub struct SchemaMut {
	pub(super) nodes: Vec<SchemaNode>,
	/// Which node is the root of the schema
	///
	/// Typically the first registered node, but parsing several documents
	/// against a shared [`Parser`] may leave the root elsewhere.
	pub(super) root: SchemaKey,
	pub(super) schema_json: Option<String>,
}

impl SchemaMut {
	/// Obtain the underlying graph storage
	pub fn nodes(&self) -> &[SchemaNode] {
		&self.nodes
	}

	/// Obtain the underlying graph storage mutably
	///
	/// This loses the original JSON: if obtaining it again, it will be
	/// re-generated from the graph and will lose all non-stored fields
	/// (`doc`, custom properties, ...).
	pub fn nodes_mut(&mut self) -> &mut Vec<SchemaNode> {
		self.schema_json = None;
		&mut self.nodes
	}

	/// The key of the root node of the schema
	pub fn root_key(&self) -> SchemaKey {
		self.root
	}

	/// Obtain the root of the schema
	///
	/// # Panics
	/// If the root key does not point into the `nodes`. This can only happen
	/// if you have updated the graph through [`nodes_mut`](Self::nodes_mut).
	pub fn root(&self) -> &SchemaNode {
		self.nodes.get(self.root.idx).expect(
			"Schema root should point to an existing node - have you updated it \
				in such a way that it no longer does?",
		)
	}

	/// Initialize a [`SchemaMut`] from a set of nodes
	///
	/// The first node (index `0`) is the root of the schema.
	pub fn from_nodes(nodes: Vec<SchemaNode>) -> Self {
		Self {
			nodes,
			root: SchemaKey::from_idx(0),
			schema_json: None,
		}
	}

	/// Turn this [`SchemaMut`] into a [`Schema`](crate::Schema)
	///
	/// [`Schema`](crate::Schema) is necessary for use with the serializer and
	/// deserializer.
	///
	/// This will fail if the schema is invalid (e.g. incorrect [`SchemaKey`],
	/// duplicate union branch type names, zero-sized cycle, ...).
	pub fn freeze(self) -> Result<super::Schema, SchemaError> {
		self.try_into()
	}

	/// Try to get the node at the given [`SchemaKey`]
	///
	/// (or return `None` if the key is invalid)
	pub fn get(&self, key: SchemaKey) -> Option<&SchemaNode> {
		self.nodes.get(key.idx)
	}
}

/// The location of a node in a [`SchemaMut`]
///
/// This can be used to [`Index`](std::ops::Index) into the [`SchemaMut`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaKey {
	pub(crate) idx: usize,
}

impl SchemaKey {
	/// Construct a new SchemaKey
	///
	/// This is expected to be an index in the [`nodes`](SchemaMut::nodes_mut)
	/// `Vec` of a [`SchemaMut`].
	pub const fn from_idx(idx: usize) -> Self {
		Self { idx }
	}
	/// Obtain the index in the [`nodes`](SchemaMut::nodes) `Vec` of a
	/// [`SchemaMut`] that this [`SchemaKey`] points to.
	pub const fn idx(self) -> usize {
		self.idx
	}
}
impl std::ops::Index<SchemaKey> for SchemaMut {
	type Output = SchemaNode;
	fn index(&self, key: SchemaKey) -> &Self::Output {
		&self.nodes[key.idx]
	}
}
impl std::fmt::Debug for SchemaKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(&self.idx, f)
	}
}

/// A node of an avro schema, stored in a [`SchemaMut`]
///
/// In there, references to other nodes are represented as [`SchemaKey`], which
/// allow to index into [`SchemaMut`].
#[derive(Clone, Debug)]
pub struct SchemaNode {
	/// The underlying regular type of this node
	pub type_: RegularType,
	/// Logical type that the avro type is annotated with, if any
	pub logical_type: Option<LogicalType>,
	/// The `sqlType` extension, preserved in canonical form
	///
	/// Only meaningful on `string` nodes.
	pub sql_type: Option<String>,
	/// Any non-reserved properties of the node, preserved verbatim
	pub properties: Properties,
}

impl SchemaNode {
	/// Build a new [`SchemaNode`] from the given regular type, with no logical
	/// type and no properties
	///
	/// This is equivalent to `type_.into()`.
	pub fn new(type_: RegularType) -> Self {
		type_.into()
	}

	/// Build a new [`SchemaNode`] from the given regular type and logical type
	pub fn with_logical_type(type_: RegularType, logical_type: LogicalType) -> Self {
		Self {
			type_,
			logical_type: Some(logical_type),
			sql_type: None,
			properties: Properties::new(),
		}
	}
}

/// A primitive or complex type of an avro schema, stored in a [`SchemaNode`]
#[derive(Clone, Debug)]
pub enum RegularType {
	/// A `null` Avro schema.
	Null,
	/// A `boolean` Avro schema.
	Boolean,
	/// An `int` Avro schema.
	Int,
	/// A `long` Avro schema.
	Long,
	/// A `float` Avro schema.
	Float,
	/// A `double` Avro schema.
	Double,
	/// A `bytes` Avro schema: a sequence of 8-bit unsigned bytes.
	Bytes,
	/// A `string` Avro schema: a unicode character sequence.
	String,
	/// An `array` Avro schema. All elements share the `items` schema.
	Array(Array),
	/// A `map` Avro schema. Keys are assumed to be strings; all values share
	/// the `values` schema.
	Map(Map),
	/// A `union` Avro schema.
	///
	/// No branch may itself be a union, and the branch type names must be
	/// unique within the union.
	Union(Union),
	/// A `record` (or `error`) Avro schema.
	Record(Record),
	/// An `enum` Avro schema.
	Enum(Enum),
	/// A `fixed` Avro schema.
	Fixed(Fixed),
}

impl RegularType {
	/// If the type is a named type, returns the name of the type
	pub fn name(&self) -> Option<&Name> {
		match self {
			RegularType::Record(record) => Some(&record.name),
			RegularType::Enum(enum_) => Some(&enum_.name),
			RegularType::Fixed(fixed) => Some(&fixed.name),
			_ => None,
		}
	}

	/// If the type is a named type, returns its aliases
	pub fn aliases(&self) -> &[Name] {
		match self {
			RegularType::Record(record) => &record.aliases,
			RegularType::Enum(enum_) => &enum_.aliases,
			RegularType::Fixed(fixed) => &fixed.aliases,
			_ => &[],
		}
	}
}

/// Component of a [`SchemaMut`]
#[derive(Clone, Debug)]
pub struct Array {
	/// The key (in the [`SchemaMut`]) of the schema of each item that will be
	/// in the array
	pub items: SchemaKey,
}
impl Array {
	/// `items` is the key of the schema of each item of the array
	pub fn new(items: SchemaKey) -> Self {
		Self { items }
	}
}

/// Component of a [`SchemaMut`]
///
/// An Avro map is a collection of key-value pairs, where the keys are assumed
/// to be strings.
#[derive(Clone, Debug)]
pub struct Map {
	/// The key (in the [`SchemaMut`]) of the schema of each value that will be
	/// in the map
	pub values: SchemaKey,
}
impl Map {
	/// `values` is the key of the schema of each value of the map
	pub fn new(values: SchemaKey) -> Self {
		Self { values }
	}
}

/// Component of a [`SchemaMut`]
#[derive(Clone, Debug)]
pub struct Union {
	/// The keys (in the [`SchemaMut`]) of the schemas of each branch that
	/// this Avro *union* supports
	pub variants: Vec<SchemaKey>,
}
impl Union {
	/// `variants` is the keys of the schemas of each branch of the union
	pub fn new(variants: Vec<SchemaKey>) -> Self {
		Self { variants }
	}
}

/// Component of a [`SchemaMut`]
///
/// An avro `record` is ~equivalent to a Rust struct. An `error` is a record
/// with the [`error`](Record::error) flag set.
#[derive(Clone, Debug)]
pub struct Record {
	/// The name of the record (including namespace)
	pub name: Name,
	/// Aliases under which the record is also registered
	pub aliases: Vec<Name>,
	/// Documentation, not carried into the canonical form
	pub doc: Option<String>,
	/// The ordered list of fields in this *record*
	pub fields: Vec<Field>,
	/// Whether this record was declared with `"type": "error"`
	pub error: bool,
}
impl Record {
	/// `name` is the name of the record (including namespace), and `fields`
	/// is its ordered list of fields
	pub fn new(name: Name, fields: Vec<Field>) -> Self {
		Self {
			name,
			aliases: Vec::new(),
			doc: None,
			fields,
			error: false,
		}
	}
}

/// Component of a [`SchemaMut`]: a single field of a [`Record`]
#[derive(Clone, Debug)]
pub struct Field {
	/// Name of the field (must match `[A-Za-z_][A-Za-z0-9_]*`)
	pub name: String,
	/// The key (in the [`SchemaMut`]) of the schema of the type of this field
	pub type_: SchemaKey,
	/// The field default, already coerced against the field schema
	///
	/// `None` means "no default provided", which is distinct from
	/// `Some(Value::Null)` ("the default is the value null").
	pub default: Option<crate::value::Value>,
	/// Sort order attributed to this field
	pub order: FieldOrder,
	/// Aliases of this field
	pub aliases: Vec<String>,
	/// Documentation, not carried into the canonical form
	pub doc: Option<String>,
	/// What the decoder should do with this field instead of decoding it
	/// normally
	pub action: FieldAction,
	/// Any non-reserved properties of the field, preserved verbatim
	pub properties: Properties,
}
impl Field {
	/// `type_` is the key (in the [`SchemaMut`]) of the schema of the type of
	/// this field
	pub fn new(name: impl Into<String>, type_: SchemaKey) -> Self {
		Self {
			name: name.into(),
			type_,
			default: None,
			order: FieldOrder::Ascending,
			aliases: Vec::new(),
			doc: None,
			action: FieldAction::None,
			properties: Properties::new(),
		}
	}
}

/// Sort order of a [`Field`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FieldOrder {
	/// The default order (omitted from canonical form)
	#[default]
	Ascending,
	/// Reverse order
	Descending,
	/// The field does not participate in ordering
	Ignore,
}

impl FieldOrder {
	/// The name of the order, as it appears in the schema JSON
	pub fn as_str(self) -> &'static str {
		match self {
			FieldOrder::Ascending => "ascending",
			FieldOrder::Descending => "descending",
			FieldOrder::Ignore => "ignore",
		}
	}
}

/// Per-field decoder action
///
/// Regular parsing always produces [`FieldAction::None`]; the other variants
/// are set when preparing a schema for decoding data whose writer lacked (or
/// had extra) fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FieldAction {
	/// Decode the field from the wire normally
	#[default]
	None,
	/// Read the field from the wire and discard it
	Skip,
	/// Do not touch the wire: materialize the field's default value
	///
	/// Freezing fails if the field carries no default.
	SetDefault,
}

/// Component of a [`SchemaMut`]
///
/// This is the ~equivalent of a Rust `enum` where none of the variants would
/// hold any inner value. (e.g. `enum Foo { Bar, Baz }`)
#[derive(Clone, Debug)]
pub struct Enum {
	/// The name of the enum (including namespace)
	pub name: Name,
	/// Aliases under which the enum is also registered
	pub aliases: Vec<Name>,
	/// Documentation, not carried into the canonical form
	pub doc: Option<String>,
	/// All the symbols of the enum (e.g. `["Bar", "Baz"]`)
	pub symbols: Vec<String>,
	/// Default symbol, if any (must appear in `symbols`)
	pub default: Option<String>,
}
impl Enum {
	/// `name` is the name of the enum (including namespace), and `symbols` is
	/// its list of symbols
	pub fn new(name: Name, symbols: Vec<String>) -> Self {
		Self {
			name,
			aliases: Vec::new(),
			doc: None,
			symbols,
			default: None,
		}
	}
}

/// Component of a [`SchemaMut`]
#[derive(Clone, Debug)]
pub struct Fixed {
	/// The name of the *fixed* type, including the namespace
	pub name: Name,
	/// Aliases under which the fixed is also registered
	pub aliases: Vec<Name>,
	/// Documentation, not carried into the canonical form
	pub doc: Option<String>,
	/// The size in bytes of the *fixed* type
	pub size: usize,
}
impl Fixed {
	/// `name` is name of the *fixed* type, including the namespace, `size` is
	/// the size in bytes of the fixed type
	pub fn new(name: Name, size: usize) -> Self {
		Self {
			name,
			aliases: Vec::new(),
			doc: None,
			size,
		}
	}
}

/// Logical type
///
/// <https://avro.apache.org/docs/current/specification/#logical-types>
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogicalType {
	/// Arbitrary-precision decimal numbers, over `bytes` or `fixed`
	///
	/// `scale` defaults to 0 and is an integer greater than or equal to 0 and
	/// `precision` is an integer greater than 0.
	Decimal(Decimal),
	/// A universally unique identifier, annotating a `string`
	Uuid,
	/// Number of days since the unix epoch, annotating an `int`
	Date,
	/// Time of day in milliseconds after midnight, annotating an `int`
	TimeMillis,
	/// Time of day in microseconds after midnight, annotating a `long`
	TimeMicros,
	/// Milliseconds after the unix epoch UTC, annotating a `long`
	TimestampMillis,
	/// Microseconds after the unix epoch UTC, annotating a `long`
	TimestampMicros,
	/// An amount of time defined by months, days and milliseconds, annotating
	/// a `fixed` of size 12
	Duration,
	/// A logical type that is not known or not handled in any particular way
	/// by this library
	///
	/// This holds the string that is used in the schema JSON to refer to the
	/// logical type. Prefer matching via [`as_str`](Self::as_str), as logical
	/// types of this variant may become known variants in later releases.
	Unknown(String),
}

/// Component of a [`SchemaMut`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decimal {
	/// Number of significant digits in the number
	pub precision: usize,
	/// Number of digits to the right of the decimal point
	pub scale: u32,
}
impl Decimal {
	/// `precision` is the number of significant digits, `scale` the number of
	/// digits to the right of the decimal point
	pub fn new(precision: usize, scale: u32) -> Self {
		Self { precision, scale }
	}
}

impl LogicalType {
	/// The name of the logical type, as it appears in the schema JSON
	///
	/// For example, the `Decimal` logical type is named `decimal`.
	pub fn as_str(&self) -> &str {
		match self {
			LogicalType::Decimal(_) => "decimal",
			LogicalType::Uuid => "uuid",
			LogicalType::Date => "date",
			LogicalType::TimeMillis => "time-millis",
			LogicalType::TimeMicros => "time-micros",
			LogicalType::TimestampMillis => "timestamp-millis",
			LogicalType::TimestampMicros => "timestamp-micros",
			LogicalType::Duration => "duration",
			LogicalType::Unknown(name) => name,
		}
	}
}

/// Largest decimal precision that fits a two's-complement integer of `size`
/// bytes: ⌊log10(2) · (8·size − 1)⌋
pub(crate) fn max_decimal_precision_for_fixed(size: usize) -> usize {
	(((8 * size) as f64 - 1.0) * 2f64.log10()).floor() as usize
}

/// The type name under which a union branch is keyed
///
/// Named branches key by their full name; other branches by the primitive or
/// complex type string, suffixed with `.<logical-type>` when the branch
/// carries a logical type.
pub(crate) fn union_branch_type_name(nodes: &[SchemaNode], key: SchemaKey) -> Option<String> {
	let node = nodes.get(key.idx)?;
	Some(match &node.type_ {
		RegularType::Record(record) => record.name.fully_qualified_name().to_owned(),
		RegularType::Enum(enum_) => enum_.name.fully_qualified_name().to_owned(),
		RegularType::Fixed(fixed) => fixed.name.fully_qualified_name().to_owned(),
		other => {
			let base = match other {
				RegularType::Null => "null",
				RegularType::Boolean => "boolean",
				RegularType::Int => "int",
				RegularType::Long => "long",
				RegularType::Float => "float",
				RegularType::Double => "double",
				RegularType::Bytes => "bytes",
				RegularType::String => "string",
				RegularType::Array(_) => "array",
				RegularType::Map(_) => "map",
				RegularType::Union(_) => "union",
				RegularType::Record(_) | RegularType::Enum(_) | RegularType::Fixed(_) => {
					unreachable!("named types handled above")
				}
			};
			match &node.logical_type {
				Some(logical_type) => format!("{}.{}", base, logical_type.as_str()),
				None => base.to_owned(),
			}
		}
	})
}

impl From<RegularType> for SchemaNode {
	fn from(regular_type: RegularType) -> Self {
		Self {
			type_: regular_type,
			logical_type: None,
			sql_type: None,
			properties: Properties::new(),
		}
	}
}

macro_rules! impl_froms_for_regular_type {
	($($variant: ident)*) => {
		$(
			impl From<$variant> for RegularType {
				fn from(variant: $variant) -> Self {
					Self::$variant(variant)
				}
			}
			impl From<$variant> for SchemaNode {
				fn from(variant: $variant) -> Self {
					SchemaNode::new(RegularType::$variant(variant))
				}
			}
		)*
	};
}
impl_froms_for_regular_type! { Array Map Union Record Enum Fixed }
