use avro_datum::{schema::SchemaMut, Schema};

use pretty_assertions::assert_eq;

#[test]
fn primitives_render_bare() {
	for name in ["null", "boolean", "int", "long", "float", "double", "bytes", "string"] {
		let schema: SchemaMut = format!("{name:?}").parse().unwrap();
		assert_eq!(schema.canonical_form().unwrap(), format!("{name:?}"));
	}
}

#[test]
fn record_canonical_form_strips_attributes() {
	let schema: SchemaMut = r#"
	{
		"type": "record",
		"namespace": "org.example.avro",
		"name": "simple",
		"doc": "docs are stripped",
		"aliases": ["old"],
		"custom": true,
		"fields": [
			{ "name": "a", "type": "long", "doc": "stripped too", "order": "descending" },
			{ "name": "b", "type": "string" }
		]
	}"#
	.parse()
	.unwrap();
	assert_eq!(
		schema.canonical_form().unwrap(),
		r#"{"name":"org.example.avro.simple","type":"record","fields":[{"name":"a","type":"long"},{"name":"b","type":"string"}]}"#
	);
}

#[test]
fn canonical_form_is_insensitive_to_key_order() {
	let a: SchemaMut = r#"{"type": "record", "name": "R", "fields": [{"name": "f", "type": "int"}]}"#
		.parse()
		.unwrap();
	let b: SchemaMut = r#"{"fields": [{"type": "int", "name": "f"}], "name": "R", "type": "record"}"#
		.parse()
		.unwrap();
	assert_eq!(a.canonical_form().unwrap(), b.canonical_form().unwrap());
	assert_eq!(
		a.sha256_fingerprint().unwrap(),
		b.sha256_fingerprint().unwrap()
	);
}

#[test]
fn named_types_render_in_full_only_once() {
	let schema: SchemaMut = r#"
	{
		"type": "record",
		"name": "Node",
		"fields": [
			{ "name": "value", "type": "int" },
			{ "name": "next", "type": ["null", "Node"] }
		]
	}"#
	.parse()
	.unwrap();
	assert_eq!(
		schema.canonical_form().unwrap(),
		r#"{"name":"Node","type":"record","fields":[{"name":"value","type":"int"},{"name":"next","type":["null","Node"]}]}"#
	);
}

#[test]
fn logical_types_and_sql_type_are_preserved() {
	let decimal: SchemaMut =
		r#"{"type": "bytes", "logicalType": "decimal", "precision": 4, "scale": 2}"#
			.parse()
			.unwrap();
	assert_eq!(
		decimal.canonical_form().unwrap(),
		r#"{"type":"bytes","logicalType":"decimal","precision":4,"scale":2}"#
	);

	// Scale is omitted when zero
	let decimal_scale_zero: SchemaMut =
		r#"{"type": "bytes", "logicalType": "decimal", "precision": 4, "scale": 0}"#
			.parse()
			.unwrap();
	assert_eq!(
		decimal_scale_zero.canonical_form().unwrap(),
		r#"{"type":"bytes","logicalType":"decimal","precision":4}"#
	);

	let date: SchemaMut = r#"{"type": "int", "logicalType": "date"}"#.parse().unwrap();
	assert_eq!(
		date.canonical_form().unwrap(),
		r#"{"type":"int","logicalType":"date"}"#
	);

	let json_string: SchemaMut = r#"{"type": "string", "sqlType": "JSON"}"#.parse().unwrap();
	assert_eq!(
		json_string.canonical_form().unwrap(),
		r#"{"type":"string","sqlType":"JSON"}"#
	);

	let duration: SchemaMut =
		r#"{"type": "fixed", "name": "f", "size": 12, "logicalType": "duration"}"#
			.parse()
			.unwrap();
	assert_eq!(
		duration.canonical_form().unwrap(),
		r#"{"name":"f","type":"fixed","size":12,"logicalType":"duration"}"#
	);
}

#[test]
fn parsing_the_canonical_form_is_a_fixpoint() {
	let schema: SchemaMut = r#"
	{
		"type": "record",
		"namespace": "ns",
		"name": "R",
		"fields": [
			{ "name": "xs", "type": { "type": "array", "items": "ns.R" } },
			{ "name": "tags", "type": { "type": "map", "values": "string" } },
			{ "name": "id", "type": { "type": "fixed", "name": "Id", "size": 8 } },
			{ "name": "when", "type": { "type": "long", "logicalType": "timestamp-micros" } }
		]
	}"#
	.parse()
	.unwrap();
	let canonical = schema.canonical_form().unwrap();
	let reparsed: SchemaMut = canonical.parse().unwrap();
	assert_eq!(reparsed.canonical_form().unwrap(), canonical);
	assert_eq!(
		reparsed.sha256_fingerprint().unwrap(),
		schema.sha256_fingerprint().unwrap()
	);
}

#[test]
fn null_schema_reference_fingerprints() {
	let null_schema: SchemaMut = r#""null""#.parse().unwrap();
	assert_eq!(null_schema.canonical_form().unwrap(), "\"null\"");

	let sha256 = null_schema.sha256_fingerprint().unwrap();
	assert_eq!(
		&sha256[..8],
		&[0x63, 0xdd, 0x24, 0xe7, 0xcc, 0x25, 0x8f, 0x8a]
	);

	let rabin = null_schema.rabin_fingerprint().unwrap();
	assert_eq!(i64::from_le_bytes(rabin), 7195948357588979594);

	// The digest interface is uniform across hashers
	let md5 = null_schema.md5_fingerprint().unwrap();
	assert_eq!(md5, null_schema.md5_fingerprint().unwrap());
	let generic: [u8; 32] = null_schema.fingerprint::<sha2::Sha256>().unwrap().into();
	assert_eq!(generic, sha256);
}

#[test]
fn frozen_schema_exposes_fingerprints() {
	let schema_mut: SchemaMut = r#""null""#.parse().unwrap();
	let frozen: Schema = r#""null""#.parse().unwrap();
	assert_eq!(frozen.canonical_form(), "\"null\"");
	assert_eq!(
		frozen.sha256_fingerprint(),
		&schema_mut.sha256_fingerprint().unwrap()
	);
	assert_eq!(
		i64::from_le_bytes(*frozen.rabin_fingerprint()),
		7195948357588979594
	);
}
