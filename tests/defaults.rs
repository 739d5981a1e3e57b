//! Parse-time validation and coercion of field defaults, and default fill on
//! the encode path

use avro_datum::{
	schema::{RegularType, SchemaMut},
	ser::SerializerConfig,
	value::Value,
	Schema,
};

use pretty_assertions::assert_eq;

fn field_default(schema: &SchemaMut, field: usize) -> Option<Value> {
	match &schema.root().type_ {
		RegularType::Record(record) => record.fields[field].default.clone(),
		other => panic!("expected record, got {other:?}"),
	}
}

fn record_schema(field: &str) -> Result<SchemaMut, avro_datum::schema::SchemaError> {
	format!(r#"{{"type": "record", "name": "R", "fields": [{field}]}}"#).parse()
}

#[test]
fn absent_and_null_defaults_are_distinct() {
	let no_default = record_schema(r#"{"name": "f", "type": ["null", "int"]}"#).unwrap();
	assert_eq!(field_default(&no_default, 0), None);

	let null_default =
		record_schema(r#"{"name": "f", "type": ["null", "int"], "default": null}"#).unwrap();
	match field_default(&null_default, 0) {
		Some(Value::Union(union_value)) => {
			assert_eq!(union_value.branch, 0);
			assert_eq!(union_value.value, Value::Null);
		}
		other => panic!("expected union-wrapped null default, got {other:?}"),
	}
}

#[test]
fn union_defaults_validate_against_the_first_branch() {
	// Branch 0 is null: a string default cannot coerce
	assert!(record_schema(r#"{"name": "f", "type": ["null", "string"], "default": "x"}"#).is_err());
	// Branch 0 is string: fine
	let schema =
		record_schema(r#"{"name": "f", "type": ["string", "null"], "default": "x"}"#).unwrap();
	match field_default(&schema, 0) {
		Some(Value::Union(union_value)) => {
			assert_eq!(union_value.branch, 0);
			assert_eq!(union_value.type_name, "string");
			assert_eq!(union_value.value, Value::String("x".to_owned()));
		}
		other => panic!("expected union default, got {other:?}"),
	}
}

#[test]
fn integer_defaults_tolerate_integral_floats_only() {
	// JSON has no integer type, so 2.0 is accepted
	let schema = record_schema(r#"{"name": "f", "type": "int", "default": 2.0}"#).unwrap();
	assert_eq!(field_default(&schema, 0), Some(Value::Int(2)));
	// 2.5 is not silently truncated
	assert!(record_schema(r#"{"name": "f", "type": "int", "default": 2.5}"#).is_err());
	// Out of i32 range
	assert!(record_schema(r#"{"name": "f", "type": "int", "default": 4294967296}"#).is_err());
	// In i64 range
	let schema =
		record_schema(r#"{"name": "f", "type": "long", "default": 4294967296}"#).unwrap();
	assert_eq!(field_default(&schema, 0), Some(Value::Long(4294967296)));
}

#[test]
fn bytes_and_fixed_defaults_come_from_strings() {
	let schema = record_schema(r#"{"name": "f", "type": "bytes", "default": "ab"}"#).unwrap();
	assert_eq!(field_default(&schema, 0), Some(Value::Bytes(b"ab".to_vec())));

	let schema = record_schema(
		r#"{"name": "f", "type": {"type": "fixed", "name": "F", "size": 2}, "default": "ab"}"#,
	)
	.unwrap();
	assert_eq!(field_default(&schema, 0), Some(Value::Fixed(b"ab".to_vec())));

	// Fixed default of the wrong width
	assert!(record_schema(
		r#"{"name": "f", "type": {"type": "fixed", "name": "F", "size": 2}, "default": "abc"}"#,
	)
	.is_err());
}

#[test]
fn enum_defaults_must_be_a_symbol() {
	assert!(record_schema(
		r#"{"name": "f", "type": {"type": "enum", "name": "E", "symbols": ["A"]}, "default": "B"}"#,
	)
	.is_err());
	let schema = record_schema(
		r#"{"name": "f", "type": {"type": "enum", "name": "E", "symbols": ["A"]}, "default": "A"}"#,
	)
	.unwrap();
	assert_eq!(field_default(&schema, 0), Some(Value::Enum("A".to_owned())));
}

#[test]
fn composite_defaults_recurse() {
	let schema = record_schema(
		r#"{"name": "f", "type": {"type": "array", "items": "int"}, "default": [1, 2]}"#,
	)
	.unwrap();
	assert_eq!(
		field_default(&schema, 0),
		Some(Value::Array(vec![Value::Int(1), Value::Int(2)]))
	);

	assert!(record_schema(
		r#"{"name": "f", "type": {"type": "array", "items": "int"}, "default": ["no"]}"#,
	)
	.is_err());

	let schema = record_schema(
		r#"{"name": "f", "type": {"type": "map", "values": "boolean"}, "default": {"on": true}}"#,
	)
	.unwrap();
	assert_eq!(
		field_default(&schema, 0),
		Some(Value::Map(
			[("on".to_owned(), Value::Boolean(true))].into_iter().collect()
		))
	);
}

#[test]
fn record_defaults_fall_through_to_field_defaults() {
	let schema: SchemaMut = r#"
	{
		"type": "record",
		"name": "Outer",
		"fields": [
			{
				"name": "inner",
				"type": {
					"type": "record",
					"name": "Inner",
					"fields": [
						{ "name": "x", "type": "int" },
						{ "name": "y", "type": "int", "default": 7 }
					]
				},
				"default": { "x": 1 }
			}
		]
	}"#
	.parse()
	.unwrap();
	assert_eq!(
		field_default(&schema, 0),
		Some(Value::Record(vec![
			("x".to_owned(), Value::Int(1)),
			("y".to_owned(), Value::Int(7)),
		]))
	);
}

#[test]
fn record_default_missing_a_defaultless_field_is_rejected() {
	let schema = r#"
	{
		"type": "record",
		"name": "Outer",
		"fields": [
			{
				"name": "inner",
				"type": {
					"type": "record",
					"name": "Inner",
					"fields": [{ "name": "x", "type": "int" }]
				},
				"default": {}
			}
		]
	}"#;
	assert!(schema.parse::<SchemaMut>().is_err());
}

#[test]
fn skipped_struct_fields_fill_from_schema_defaults_on_encode() {
	let schema: Schema = r#"
	{
		"type": "record",
		"name": "R",
		"fields": [
			{ "name": "a", "type": "long" },
			{ "name": "b", "type": "string", "default": "fallback" }
		]
	}"#
	.parse()
	.unwrap();

	#[derive(serde_derive::Serialize)]
	struct R {
		a: i64,
		#[serde(skip_serializing_if = "Option::is_none")]
		b: Option<String>,
	}

	let encoded =
		avro_datum::to_datum_vec(&R { a: 27, b: None }, &mut SerializerConfig::new(&schema))
			.unwrap();

	#[derive(serde_derive::Deserialize, Debug, PartialEq)]
	struct Decoded {
		a: i64,
		b: String,
	}
	assert_eq!(
		avro_datum::from_datum_slice::<Decoded>(&encoded, &schema).unwrap(),
		Decoded {
			a: 27,
			b: "fallback".to_owned()
		}
	);
}
