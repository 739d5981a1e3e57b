//! Raw, shape-level mirror of the schema JSON
//!
//! This is what `serde_json` deserializes into before the graph gets built.
//! Unknown keys are collected verbatim so that they can be preserved as
//! properties on the constructed nodes.

use serde::de::*;

use std::{borrow::Cow, collections::BTreeMap};

pub(super) enum SchemaNode<'a> {
	Type(Type),
	Ref(Cow<'a, str>),
	Object(Box<SchemaNodeObject<'a>>),
	Union(Vec<SchemaNode<'a>>),
}

#[derive(Clone, Copy, Debug)]
pub(super) enum Type {
	// Primitive types
	Null,
	Boolean,
	Int,
	Long,
	Float,
	Double,
	Bytes,
	String,
	// Complex types
	Array,
	Map,
	Record,
	Error,
	Enum,
	Fixed,
}

#[derive(serde_derive::Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound = "'a: 'de, 'de: 'a")]
pub(super) struct SchemaNodeObject<'a> {
	/// If there is a logical type, this can be a primitive type or type
	/// object but not a complex type; if there is none it must be a complex
	/// type.
	#[serde(rename = "type")]
	pub(super) type_: SchemaNode<'a>,
	pub(super) logical_type: Option<Cow<'a, str>>,
	/// For named types
	pub(super) name: Option<Cow<'a, str>>,
	/// For named types
	pub(super) namespace: Option<Cow<'a, str>>,
	/// For named types
	pub(super) aliases: Option<Vec<Cow<'a, str>>>,
	pub(super) doc: Option<Cow<'a, str>>,
	/// For record type
	pub(super) fields: Option<Vec<Field<'a>>>,
	/// For enum type
	pub(super) symbols: Option<Vec<Cow<'a, str>>>,
	/// For enum type (must appear in `symbols`)
	#[serde(default, deserialize_with = "value_even_if_null")]
	pub(super) default: Option<serde_json::Value>,
	/// For array type
	pub(super) items: Option<SchemaNode<'a>>,
	/// For map type
	pub(super) values: Option<SchemaNode<'a>>,
	/// For fixed type
	pub(super) size: Option<usize>,
	/// For decimal logical type
	pub(super) precision: Option<usize>,
	/// For decimal logical type
	pub(super) scale: Option<u32>,
	/// `sqlType` extension on string primitives
	pub(super) sql_type: Option<Cow<'a, str>>,
	/// Everything else, preserved verbatim
	#[serde(flatten)]
	pub(super) properties: BTreeMap<String, serde_json::Value>,
}

#[derive(serde_derive::Deserialize)]
#[serde(bound = "'a: 'de, 'de: 'a")]
pub(super) struct Field<'a> {
	#[serde(borrow)]
	pub(super) name: Cow<'a, str>,
	#[serde(rename = "type")]
	pub(super) type_: SchemaNode<'a>,
	/// `None` is "no default provided"; an explicit `null` default
	/// deserializes to `Some(Value::Null)`
	#[serde(default, deserialize_with = "value_even_if_null")]
	pub(super) default: Option<serde_json::Value>,
	pub(super) order: Option<Cow<'a, str>>,
	pub(super) aliases: Option<Vec<Cow<'a, str>>>,
	pub(super) doc: Option<Cow<'a, str>>,
	/// Everything else, preserved verbatim
	#[serde(flatten)]
	pub(super) properties: BTreeMap<String, serde_json::Value>,
}

/// `Option<serde_json::Value>` would turn an explicit `null` into `None`,
/// losing the distinction with an absent key
fn value_even_if_null<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
	D: Deserializer<'de>,
{
	serde_json::Value::deserialize(deserializer).map(Some)
}

impl<'de> Deserialize<'de> for SchemaNode<'de> {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		struct SchemaNodeVisitor<'de>(std::marker::PhantomData<&'de ()>);
		impl<'de> Visitor<'de> for SchemaNodeVisitor<'de> {
			type Value = SchemaNode<'de>;

			fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
				write!(
					formatter,
					"A string (type) or an object with a `type` field or an array (union)"
				)
			}

			fn visit_unit<E>(self) -> Result<Self::Value, E>
			where
				E: Error,
			{
				Ok(SchemaNode::Type(Type::Null))
			}

			fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
			where
				A: MapAccess<'de>,
			{
				// That's an object.
				Ok(SchemaNode::Object(Deserialize::deserialize(
					serde::de::value::MapAccessDeserializer::new(map),
				)?))
			}

			fn visit_seq<A>(self, seq: A) -> Result<Self::Value, A::Error>
			where
				A: SeqAccess<'de>,
			{
				// That's a union.
				Ok(SchemaNode::Union(Deserialize::deserialize(
					serde::de::value::SeqAccessDeserializer::new(seq),
				)?))
			}

			fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
			where
				E: Error,
			{
				// That's a type right away, or a ref.
				Ok(match parse_type(v) {
					Some(type_) => SchemaNode::Type(type_),
					None => SchemaNode::Ref(v.to_owned().into()),
				})
			}

			fn visit_borrowed_str<E>(self, v: &'de str) -> Result<Self::Value, E>
			where
				E: Error,
			{
				Ok(match parse_type(v) {
					Some(type_) => SchemaNode::Type(type_),
					None => SchemaNode::Ref(v.into()),
				})
			}

			fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
			where
				E: Error,
			{
				Ok(match parse_type(&v) {
					Some(type_) => SchemaNode::Type(type_),
					None => SchemaNode::Ref(v.into()),
				})
			}
		}
		deserializer.deserialize_any(SchemaNodeVisitor(std::marker::PhantomData))
	}
}

fn parse_type(s: &str) -> Option<Type> {
	Some(match s {
		"null" => Type::Null,
		"boolean" => Type::Boolean,
		"int" => Type::Int,
		"long" => Type::Long,
		"float" => Type::Float,
		"double" => Type::Double,
		"bytes" => Type::Bytes,
		"string" => Type::String,
		"array" => Type::Array,
		"map" => Type::Map,
		"record" => Type::Record,
		"error" => Type::Error,
		"enum" => Type::Enum,
		"fixed" => Type::Fixed,
		_ => return None,
	})
}
