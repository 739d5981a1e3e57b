//! Pre-computed resolution of union branches at serialization time
//!
//! A value reaching a union either names its branch (newtype/variant name,
//! looked up in [`per_name`](PerTypeLookup::named)) or only exposes its
//! shape through the serializer entry point it comes in by. For the latter,
//! each [`ValueShape`] resolves to at most one branch, decided once when the
//! schema is frozen.
//!
//! Shape slots are filled by scanning preference tiers: within a shape, the
//! first tier containing a matching branch wins, and a tier matching more
//! than one branch resolves to nothing (the value must then name its branch
//! explicitly). Numeric tiers follow the type-promotion order of the Avro
//! specification (`int` → `long` → `float` → `double`); the remaining
//! orders put the lossless, most-direct representation first and
//! length-constrained or transcoding targets last.

use super::{Node, SchemaKey};

use std::collections::HashMap;

/// The shape a value presents to the serializer when it does not name its
/// union branch
///
/// Each variant corresponds to one (or more) entry points of
/// [`serde::Serializer`].
#[derive(Debug, Clone, Copy)]
pub(crate) enum ValueShape {
	/// `serialize_unit` / `serialize_none`
	Null,
	/// `serialize_bool`
	Boolean,
	/// Integers of at most 32 bits
	Int32,
	/// 64-bit integers
	Int64,
	/// Integers of any other width (8, 16, 128 bits)
	IntAny,
	/// `serialize_f32`
	Float32,
	/// `serialize_f64`
	Float64,
	/// `serialize_str` / `serialize_char`
	Text,
	/// `serialize_bytes`
	Bytes,
	/// Sequences, tuples and tuple structs
	Sequence,
	/// Maps, structs and struct variants
	MapLike,
	/// Unit structs and unit variants: a bare name with no payload
	Identifier,
}

pub(crate) struct PerTypeLookup {
	per_name: HashMap<String, (i64, SchemaKey)>,
	null: Option<(i64, SchemaKey)>,
	boolean: Option<(i64, SchemaKey)>,
	int32: Option<(i64, SchemaKey)>,
	int64: Option<(i64, SchemaKey)>,
	int_any: Option<(i64, SchemaKey)>,
	float32: Option<(i64, SchemaKey)>,
	float64: Option<(i64, SchemaKey)>,
	text: Option<(i64, SchemaKey)>,
	bytes: Option<(i64, SchemaKey)>,
	sequence: Option<(i64, SchemaKey)>,
	map_like: Option<(i64, SchemaKey)>,
	identifier: Option<(i64, SchemaKey)>,
}

/// A preference tier: the branch kinds that are equally acceptable for a
/// shape at that preference level
type Tier = &'static [BranchKind];

#[derive(PartialEq, Eq, Clone, Copy)]
enum BranchKind {
	Null,
	Boolean,
	/// `int` and the logical types it backs (`date`, `time-millis`)
	IntBacked,
	/// `long` and the logical types it backs (times and timestamps)
	LongBacked,
	Float,
	Double,
	Bytes,
	String,
	Uuid,
	Array,
	Map,
	Record,
	Enum,
	Fixed,
	Duration,
}

fn branch_kind(node: &Node) -> Option<BranchKind> {
	Some(match node {
		Node::Null => BranchKind::Null,
		Node::Boolean => BranchKind::Boolean,
		Node::Int | Node::Date | Node::TimeMillis => BranchKind::IntBacked,
		Node::Long | Node::TimeMicros | Node::TimestampMillis | Node::TimestampMicros => {
			BranchKind::LongBacked
		}
		Node::Float => BranchKind::Float,
		Node::Double => BranchKind::Double,
		Node::Bytes => BranchKind::Bytes,
		Node::String => BranchKind::String,
		Node::Uuid => BranchKind::Uuid,
		Node::Array(_) => BranchKind::Array,
		Node::Map(_) => BranchKind::Map,
		Node::Record(_) => BranchKind::Record,
		Node::Enum(_) => BranchKind::Enum,
		Node::Fixed(_) => BranchKind::Fixed,
		Node::Duration => BranchKind::Duration,
		// Decimals hold no implicit shape slot: the scale makes silent
		// coercion from plain numbers or strings too easy to get wrong, so
		// they are only reachable by branch name. Nested unions are not
		// reachable at all.
		Node::Decimal(_) | Node::Union(_) => return None,
	})
}

// Numeric tiers follow the Avro promotion chain; a 64-bit integer skips the
// narrower `int`, and an implicit f64 -> float narrowing is never picked.
const NULL_TIERS: &[Tier] = &[&[BranchKind::Null]];
const BOOLEAN_TIERS: &[Tier] = &[&[BranchKind::Boolean]];
const INT32_TIERS: &[Tier] = &[
	&[BranchKind::IntBacked],
	&[BranchKind::LongBacked],
	&[BranchKind::Float],
	&[BranchKind::Double],
];
const INT64_TIERS: &[Tier] = &[
	&[BranchKind::LongBacked],
	&[BranchKind::Float],
	&[BranchKind::Double],
];
const INT_ANY_TIERS: &[Tier] = &[
	&[BranchKind::IntBacked, BranchKind::LongBacked],
	&[BranchKind::Double],
	&[BranchKind::Float],
];
const FLOAT32_TIERS: &[Tier] = &[&[BranchKind::Float], &[BranchKind::Double]];
const FLOAT64_TIERS: &[Tier] = &[&[BranchKind::Double]];
// Text goes to the direct string representations first; `string` and `uuid`
// are indistinguishable from the value alone, so having both is ambiguous.
// Enum symbols are still text, raw bytes a transcoding, fixed additionally
// length-constrained.
const TEXT_TIERS: &[Tier] = &[
	&[BranchKind::String, BranchKind::Uuid],
	&[BranchKind::Enum],
	&[BranchKind::Bytes],
	&[BranchKind::Fixed],
];
// Whether a byte slice fits a `fixed` only becomes known from its length,
// so `bytes` and `fixed` tie.
const BYTES_TIERS: &[Tier] = &[
	&[BranchKind::Bytes, BranchKind::Fixed],
	&[BranchKind::String],
	&[BranchKind::Duration],
];
const SEQUENCE_TIERS: &[Tier] = &[&[BranchKind::Array], &[BranchKind::Duration]];
// A struct maps onto a record and a map onto a map, but serde cannot tell
// us which one the value was, so a union carrying both is ambiguous.
const MAP_LIKE_TIERS: &[Tier] = &[
	&[BranchKind::Record, BranchKind::Map],
	&[BranchKind::Duration],
];
// A payload-less name is nearest an enum symbol; `null` ignores the name
// entirely, and the string/bytes fallbacks spell the name out.
const IDENTIFIER_TIERS: &[Tier] = &[
	&[BranchKind::Enum],
	&[BranchKind::Null],
	&[BranchKind::String],
	&[BranchKind::Bytes],
];

impl PerTypeLookup {
	pub(crate) fn placeholder() -> Self {
		Self {
			per_name: Default::default(),
			null: None,
			boolean: None,
			int32: None,
			int64: None,
			int_any: None,
			float32: None,
			float64: None,
			text: None,
			bytes: None,
			sequence: None,
			map_like: None,
			identifier: None,
		}
	}

	/// The branch a value of the given shape implicitly resolves to, if the
	/// union has exactly one reasonable candidate
	pub(crate) fn by_shape(&self, shape: ValueShape) -> Option<(i64, SchemaKey)> {
		match shape {
			ValueShape::Null => self.null,
			ValueShape::Boolean => self.boolean,
			ValueShape::Int32 => self.int32,
			ValueShape::Int64 => self.int64,
			ValueShape::IntAny => self.int_any,
			ValueShape::Float32 => self.float32,
			ValueShape::Float64 => self.float64,
			ValueShape::Text => self.text,
			ValueShape::Bytes => self.bytes,
			ValueShape::Sequence => self.sequence,
			ValueShape::MapLike => self.map_like,
			ValueShape::Identifier => self.identifier,
		}
	}

	/// The branch registered under a resolution key: a branch type name, or
	/// the bare/full name of a named branch
	pub(crate) fn named(&self, name: &str) -> Option<(i64, SchemaKey)> {
		self.per_name.get(name).copied()
	}

	pub(crate) fn new(
		nodes: &[Node],
		variants: &[SchemaKey],
		type_names: &[String],
	) -> PerTypeLookup {
		let kinds: Vec<Option<BranchKind>> = variants
			.iter()
			.map(|&variant| branch_kind(&nodes[variant.idx()]))
			.collect();

		let resolve = |tiers: &[Tier]| -> Option<(i64, SchemaKey)> {
			for &tier in tiers {
				let mut found = None;
				for (discriminant, (&schema_key, kind)) in
					variants.iter().zip(&kinds).enumerate()
				{
					let kind = match *kind {
						Some(kind) => kind,
						None => continue,
					};
					if !tier.contains(&kind) {
						continue;
					}
					if found.is_some() {
						// Two candidates at the same preference level: the
						// value has to name its branch
						return None;
					}
					found = Some((discriminant as i64, schema_key));
				}
				if found.is_some() {
					return found;
				}
			}
			None
		};

		let mut per_name = HashMap::new();
		for (discriminant, (&schema_key, type_name)) in
			variants.iter().zip(type_names).enumerate()
		{
			let discriminant = discriminant as i64;
			// The resolution key always works...
			per_name.insert(type_name.clone(), (discriminant, schema_key));
			// ...and named branches also resolve by their bare and full
			// names
			if let Some(name) = match &nodes[schema_key.idx()] {
				Node::Record(record) => Some(&record.name),
				Node::Enum(enum_) => Some(&enum_.name),
				Node::Fixed(fixed) => Some(&fixed.name),
				Node::Decimal(super::Decimal {
					repr: super::DecimalRepr::Fixed(fixed),
					..
				}) => Some(&fixed.name),
				_ => None,
			} {
				per_name.insert(name.name().to_owned(), (discriminant, schema_key));
				per_name.insert(
					name.fully_qualified_name().to_owned(),
					(discriminant, schema_key),
				);
			}
		}

		PerTypeLookup {
			per_name,
			null: resolve(NULL_TIERS),
			boolean: resolve(BOOLEAN_TIERS),
			int32: resolve(INT32_TIERS),
			int64: resolve(INT64_TIERS),
			int_any: resolve(INT_ANY_TIERS),
			float32: resolve(FLOAT32_TIERS),
			float64: resolve(FLOAT64_TIERS),
			text: resolve(TEXT_TIERS),
			bytes: resolve(BYTES_TIERS),
			sequence: resolve(SEQUENCE_TIERS),
			map_like: resolve(MAP_LIKE_TIERS),
			identifier: resolve(IDENTIFIER_TIERS),
		}
	}
}
