//! Parse-time validation and coercion of field defaults
//!
//! A default is validated exactly once, when the schema document is parsed,
//! and stored on the field as an already-coerced [`Value`].

use crate::{
	schema::{safe::*, SchemaError},
	value::{UnionValue, Value},
};

use std::collections::HashMap;

/// Raw defaults of fields that have not been coerced yet, keyed by
/// `(record node index, field index)`
///
/// A record-typed default falls through to the defaults of the record's own
/// fields, which within a single document may not have been coerced yet, so
/// coercion reads the raw form from here.
pub(super) type RawDefaults<'a> = HashMap<(usize, usize), &'a serde_json::Value>;

const MAX_COERCION_DEPTH: u32 = 64;

pub(super) fn coerce(
	nodes: &[SchemaNode],
	key: SchemaKey,
	json: &serde_json::Value,
	raw_defaults: &RawDefaults<'_>,
) -> Result<Value, SchemaError> {
	coerce_inner(nodes, key, json, raw_defaults, 0)
}

fn coerce_inner(
	nodes: &[SchemaNode],
	key: SchemaKey,
	json: &serde_json::Value,
	raw_defaults: &RawDefaults<'_>,
	depth: u32,
) -> Result<Value, SchemaError> {
	if depth > MAX_COERCION_DEPTH {
		return Err(SchemaError::new(
			"Default value coercion recurses too deeply (self-referential default?)",
		));
	}
	let node = nodes
		.get(key.idx)
		.ok_or_else(|| SchemaError::new("Default value refers to unknown node"))?;
	let mismatch = || {
		SchemaError::msg(format_args!(
			"Default value {} is not assignment-compatible with {:?} schema",
			json, node.type_
		))
	};
	Ok(match &node.type_ {
		RegularType::Null => match json {
			serde_json::Value::Null => Value::Null,
			_ => return Err(mismatch()),
		},
		RegularType::Boolean => match json {
			serde_json::Value::Bool(b) => Value::Boolean(*b),
			_ => return Err(mismatch()),
		},
		RegularType::Int => Value::Int(
			integral_default(json)
				.and_then(|i| i32::try_from(i).ok())
				.ok_or_else(mismatch)?,
		),
		RegularType::Long => Value::Long(integral_default(json).ok_or_else(mismatch)?),
		RegularType::Float => match json.as_f64() {
			Some(f) => Value::Float(f as f32),
			None => return Err(mismatch()),
		},
		RegularType::Double => match json.as_f64() {
			Some(f) => Value::Double(f),
			None => return Err(mismatch()),
		},
		RegularType::String => match json.as_str() {
			Some(s) => Value::String(s.to_owned()),
			None => return Err(mismatch()),
		},
		RegularType::Bytes => match json.as_str() {
			Some(s) => Value::Bytes(s.as_bytes().to_owned()),
			None => return Err(mismatch()),
		},
		RegularType::Enum(enum_) => match json.as_str() {
			Some(s) if enum_.symbols.iter().any(|symbol| symbol == s) => {
				Value::Enum(s.to_owned())
			}
			_ => return Err(mismatch()),
		},
		RegularType::Fixed(fixed) => match json.as_str() {
			Some(s) if s.len() == fixed.size => Value::Fixed(s.as_bytes().to_owned()),
			_ => return Err(mismatch()),
		},
		RegularType::Array(array) => match json {
			serde_json::Value::Array(items) => Value::Array(
				items
					.iter()
					.map(|item| coerce_inner(nodes, array.items, item, raw_defaults, depth + 1))
					.collect::<Result<_, _>>()?,
			),
			_ => return Err(mismatch()),
		},
		RegularType::Map(map) => match json {
			serde_json::Value::Object(entries) => Value::Map(
				entries
					.iter()
					.map(|(k, v)| {
						Ok((
							k.clone(),
							coerce_inner(nodes, map.values, v, raw_defaults, depth + 1)?,
						))
					})
					.collect::<Result<_, SchemaError>>()?,
			),
			_ => return Err(mismatch()),
		},
		RegularType::Record(record) => match json {
			serde_json::Value::Object(entries) => Value::Record(
				record
					.fields
					.iter()
					.enumerate()
					.map(|(field_idx, field)| {
						let value = match entries.get(&field.name) {
							Some(v) => {
								coerce_inner(nodes, field.type_, v, raw_defaults, depth + 1)?
							}
							// Fall through to the field's own default
							None => match (
								&field.default,
								raw_defaults.get(&(key.idx, field_idx)),
							) {
								(Some(already_coerced), _) => already_coerced.clone(),
								(None, Some(raw)) => coerce_inner(
									nodes,
									field.type_,
									raw,
									raw_defaults,
									depth + 1,
								)?,
								(None, None) => {
									return Err(SchemaError::msg(format_args!(
										"Record default is missing field {:?} \
											which has no default of its own",
										field.name
									)))
								}
							},
						};
						Ok((field.name.clone(), value))
					})
					.collect::<Result<_, SchemaError>>()?,
			),
			_ => return Err(mismatch()),
		},
		// A union default is always interpreted against the first branch
		RegularType::Union(union) => {
			let first = *union
				.variants
				.first()
				.ok_or_else(|| SchemaError::new("Union has no branches"))?;
			let type_name = union_branch_type_name(nodes, first)
				.ok_or_else(|| SchemaError::new("Union branch refers to unknown node"))?;
			Value::Union(Box::new(UnionValue {
				branch: 0,
				type_name,
				value: coerce_inner(nodes, first, json, raw_defaults, depth + 1)?,
			}))
		}
	})
}

/// JSON has no integer type, so integer defaults may arrive float-shaped.
/// They are accepted only when integral and in range.
fn integral_default(json: &serde_json::Value) -> Option<i64> {
	if !json.is_number() {
		return None;
	}
	match json.as_i64() {
		Some(i) => Some(i),
		None => {
			let f = json.as_f64()?;
			(f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
				.then_some(f as i64)
		}
	}
}
