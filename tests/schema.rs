use avro_datum::{
	schema::{FieldOrder, Parser, RegularType, SchemaMut},
	Schema,
};

use pretty_assertions::assert_eq;

#[test]
fn forbids_zero_sized_cycles() {
	let schema = r#"
	{
		"type": "record",
		"name": "A",
		"fields": [
			{
				"name": "a",
				"type": {
					"type": "record",
					"name": "B",
					"fields": [
						{
							"name": "b",
							"type": "A"
						}
					]
				}
			}
		]
	}"#;
	assert_eq!(
		schema.parse::<Schema>().unwrap_err().to_string(),
		"The schema contains a record that ends up always containing itself"
	);
}

#[test]
fn conditional_self_reference_is_fine() {
	let schema: Schema = r#"
	{
		"type": "record",
		"name": "LinkedList",
		"fields": [
			{ "name": "value", "type": "long" },
			{ "name": "next", "type": ["null", "LinkedList"] }
		]
	}"#
	.parse()
	.unwrap();
	let _ = schema;
}

#[test]
fn dotted_name_overrides_namespace() {
	let schema: SchemaMut = r#"
	{
		"type": "record",
		"name": "other.ns.Rec",
		"namespace": "ignored",
		"fields": [{ "name": "f", "type": "int" }]
	}"#
	.parse()
	.unwrap();
	match &schema.root().type_ {
		RegularType::Record(record) => {
			assert_eq!(record.name.fully_qualified_name(), "other.ns.Rec");
			assert_eq!(record.name.namespace(), Some("other.ns"));
			assert_eq!(record.name.name(), "Rec");
		}
		other => panic!("expected record, got {other:?}"),
	}
}

#[test]
fn empty_namespace_means_null_namespace() {
	let schema: SchemaMut = r#"
	{
		"type": "fixed",
		"name": "Id",
		"namespace": "",
		"size": 4
	}"#
	.parse()
	.unwrap();
	match &schema.root().type_ {
		RegularType::Fixed(fixed) => {
			assert_eq!(fixed.name.namespace(), None);
			assert_eq!(fixed.name.fully_qualified_name(), "Id");
		}
		other => panic!("expected fixed, got {other:?}"),
	}
}

#[test]
fn fields_inherit_record_namespace() {
	let schema: SchemaMut = r#"
	{
		"type": "record",
		"name": "Outer",
		"namespace": "ns",
		"fields": [
			{
				"name": "inner",
				"type": { "type": "enum", "name": "Inner", "symbols": ["A"] }
			},
			{ "name": "again", "type": "Inner" }
		]
	}"#
	.parse()
	.unwrap();
	match &schema.root().type_ {
		RegularType::Record(record) => {
			let inner = &schema[record.fields[0].type_];
			match &inner.type_ {
				RegularType::Enum(enum_) => {
					assert_eq!(enum_.name.fully_qualified_name(), "ns.Inner")
				}
				other => panic!("expected enum, got {other:?}"),
			}
			// The bare reference resolved against the record's namespace
			assert_eq!(record.fields[0].type_, record.fields[1].type_);
		}
		other => panic!("expected record, got {other:?}"),
	}
}

#[test]
fn invalid_names_are_rejected() {
	for schema in [
		r#"{ "type": "record", "name": "1leading", "fields": [] }"#,
		r#"{ "type": "record", "name": "white space", "fields": [] }"#,
		r#"{ "type": "record", "name": "a..b", "fields": [] }"#,
		r#"{ "type": "record", "name": "ok", "fields": [{ "name": "1bad", "type": "int" }] }"#,
		r#"{ "type": "enum", "name": "E", "symbols": ["1bad"] }"#,
	] {
		assert!(schema.parse::<SchemaMut>().is_err(), "should reject {schema}");
	}
}

#[test]
fn duplicate_definitions_are_rejected() {
	let schema = r#"
	{
		"type": "record",
		"name": "A",
		"fields": [
			{ "name": "x", "type": { "type": "fixed", "name": "F", "size": 2 } },
			{ "name": "y", "type": { "type": "fixed", "name": "F", "size": 2 } }
		]
	}"#;
	assert!(schema
		.parse::<SchemaMut>()
		.unwrap_err()
		.to_string()
		.contains("duplicate definitions"));
}

#[test]
fn later_mentions_resolve_to_the_first_definition() {
	let schema: SchemaMut = r#"
	{
		"type": "record",
		"name": "A",
		"fields": [
			{ "name": "x", "type": { "type": "fixed", "name": "F", "size": 2 } },
			{ "name": "y", "type": "F" }
		]
	}"#
	.parse()
	.unwrap();
	match &schema.root().type_ {
		RegularType::Record(record) => {
			assert_eq!(record.fields[0].type_, record.fields[1].type_)
		}
		other => panic!("expected record, got {other:?}"),
	}
}

#[test]
fn union_validation() {
	// Same primitive twice
	assert!(r#"["int", "int"]"#.parse::<SchemaMut>().is_err());
	// Logical types make primitives distinct
	assert!(r#"["long", {"type": "long", "logicalType": "timestamp-millis"}]"#
		.parse::<SchemaMut>()
		.is_ok());
	// Two named types with distinct names are fine
	assert!(r#"[
		{"type": "fixed", "name": "A", "size": 1},
		{"type": "fixed", "name": "B", "size": 1}
	]"#
	.parse::<SchemaMut>()
	.is_ok());
	// Nested unions are not
	assert!(r#"["null", ["int", "string"]]"#.parse::<SchemaMut>().is_err());
}

#[test]
fn enum_validation() {
	assert!(r#"{"type": "enum", "name": "E", "symbols": []}"#
		.parse::<SchemaMut>()
		.is_err());
	assert!(r#"{"type": "enum", "name": "E", "symbols": ["A", "A"]}"#
		.parse::<SchemaMut>()
		.is_err());
	assert!(
		r#"{"type": "enum", "name": "E", "symbols": ["A", "B"], "default": "C"}"#
			.parse::<SchemaMut>()
			.is_err()
	);
	let schema: SchemaMut =
		r#"{"type": "enum", "name": "E", "symbols": ["A", "B"], "default": "B"}"#
			.parse()
			.unwrap();
	match &schema.root().type_ {
		RegularType::Enum(enum_) => assert_eq!(enum_.default.as_deref(), Some("B")),
		other => panic!("expected enum, got {other:?}"),
	}
}

#[test]
fn decimal_validation() {
	assert!(
		r#"{"type": "bytes", "logicalType": "decimal", "precision": 0, "scale": 0}"#
			.parse::<SchemaMut>()
			.is_err()
	);
	assert!(
		r#"{"type": "bytes", "logicalType": "decimal", "precision": 2, "scale": 3}"#
			.parse::<SchemaMut>()
			.is_err()
	);
	// fixed(2) holds at most 4 digits
	assert!(
		r#"{"type": "fixed", "name": "F", "size": 2, "logicalType": "decimal", "precision": 5}"#
			.parse::<SchemaMut>()
			.is_err()
	);
	assert!(
		r#"{"type": "fixed", "name": "F", "size": 2, "logicalType": "decimal", "precision": 4}"#
			.parse::<SchemaMut>()
			.is_ok()
	);
	// duration must annotate fixed(12)
	assert!(
		r#"{"type": "fixed", "name": "F", "size": 11, "logicalType": "duration"}"#
			.parse::<SchemaMut>()
			.is_err()
	);
}

#[test]
fn aliases_resolve() {
	let schema: SchemaMut = r#"
	{
		"type": "record",
		"name": "ns.A",
		"aliases": ["Old", "other.Legacy"],
		"fields": [
			{ "name": "x", "type": "ns.Old" },
			{ "name": "y", "type": "other.Legacy" }
		]
	}"#
	.parse()
	.unwrap();
	match &schema.root().type_ {
		RegularType::Record(record) => {
			assert_eq!(record.fields[0].type_, schema.root_key());
			assert_eq!(record.fields[1].type_, schema.root_key());
			assert_eq!(record.aliases.len(), 2);
			// A simple alias inherits the record's namespace
			assert_eq!(record.aliases[0].fully_qualified_name(), "ns.Old");
			assert_eq!(record.aliases[1].fully_qualified_name(), "other.Legacy");
		}
		other => panic!("expected record, got {other:?}"),
	}
}

#[test]
fn field_order_and_properties_are_preserved() {
	let schema: SchemaMut = r#"
	{
		"type": "record",
		"name": "R",
		"custom-prop": {"answer": 42},
		"fields": [
			{ "name": "a", "type": "int", "order": "descending", "weight": 3 },
			{ "name": "b", "type": "int", "order": "ignore" },
			{ "name": "c", "type": "int" }
		]
	}"#
	.parse()
	.unwrap();
	let root = schema.root();
	assert_eq!(
		root.properties.get("custom-prop"),
		Some(&serde_json::json!({"answer": 42}))
	);
	match &root.type_ {
		RegularType::Record(record) => {
			assert_eq!(record.fields[0].order, FieldOrder::Descending);
			assert_eq!(
				record.fields[0].properties.get("weight"),
				Some(&serde_json::json!(3))
			);
			assert_eq!(record.fields[1].order, FieldOrder::Ignore);
			assert_eq!(record.fields[2].order, FieldOrder::Ascending);
		}
		other => panic!("expected record, got {other:?}"),
	}
	assert!(r#"
	{
		"type": "record",
		"name": "R",
		"fields": [{ "name": "a", "type": "int", "order": "sideways" }]
	}"#
	.parse::<SchemaMut>()
	.is_err());
}

#[test]
fn multi_document_parsing() {
	let mut parser = Parser::new();
	parser
		.parse_str(r#"{"type": "enum", "name": "ns.Color", "symbols": ["RED", "BLUE"]}"#)
		.unwrap();
	parser
		.parse_str(
			r#"
			{
				"type": "record",
				"name": "ns.Paint",
				"fields": [{ "name": "color", "type": "ns.Color" }]
			}"#,
		)
		.unwrap();
	let schema = parser.into_schema().unwrap();
	// The last document's root wins
	match &schema.root().type_ {
		RegularType::Record(record) => {
			assert_eq!(record.name.fully_qualified_name(), "ns.Paint")
		}
		other => panic!("expected record, got {other:?}"),
	}
	let frozen: Schema = schema.freeze().unwrap();
	let _ = frozen;
}

#[test]
fn multi_document_unknown_reference_fails() {
	let mut parser = Parser::new();
	assert!(parser
		.parse_str(
			r#"
			{
				"type": "record",
				"name": "ns.Paint",
				"fields": [{ "name": "color", "type": "ns.Color" }]
			}"#,
		)
		.unwrap_err()
		.to_string()
		.contains("unknown reference"));
}

#[test]
fn missing_required_keys() {
	assert!(r#"{"type": "record", "name": "R"}"#.parse::<SchemaMut>().is_err());
	assert!(r#"{"type": "array"}"#.parse::<SchemaMut>().is_err());
	assert!(r#"{"type": "map"}"#.parse::<SchemaMut>().is_err());
	assert!(r#"{"type": "fixed", "name": "F"}"#.parse::<SchemaMut>().is_err());
	assert!(r#"{"type": "enum", "name": "E"}"#.parse::<SchemaMut>().is_err());
}

#[test]
fn error_type_is_a_record() {
	let schema: SchemaMut = r#"
	{
		"type": "error",
		"name": "Oops",
		"fields": [{ "name": "message", "type": "string" }]
	}"#
	.parse()
	.unwrap();
	match &schema.root().type_ {
		RegularType::Record(record) => assert!(record.error),
		other => panic!("expected record, got {other:?}"),
	}
	// Errors canonicalize as records, so the fingerprints agree
	let record_twin: SchemaMut = r#"
	{
		"type": "record",
		"name": "Oops",
		"fields": [{ "name": "message", "type": "string" }]
	}"#
	.parse()
	.unwrap();
	assert_eq!(
		schema.canonical_form().unwrap(),
		record_twin.canonical_form().unwrap()
	);
}
