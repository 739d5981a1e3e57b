use avro_datum::{
	schema::{FieldAction, RegularType, SchemaMut},
	ser::SerializerConfig,
	value::{read_datum, read_datum_slice, write_datum_vec, Duration, Value},
	Schema,
};

use {lazy_static::lazy_static, pretty_assertions::assert_eq};

lazy_static! {
	static ref EVENT_SCHEMA: Schema = r#"
	{
		"type": "record",
		"name": "Event",
		"fields": [
			{ "name": "id", "type": { "type": "string", "logicalType": "uuid" } },
			{ "name": "seq", "type": "long" },
			{ "name": "tags", "type": { "type": "map", "values": "string" } },
			{ "name": "samples", "type": { "type": "array", "items": "double" } },
			{ "name": "kind", "type": { "type": "enum", "name": "Kind", "symbols": ["A", "B"] } },
			{ "name": "payload", "type": ["null", "bytes"] }
		]
	}"#
	.parse()
	.unwrap();
}

fn event_value() -> Value {
	Value::Record(vec![
		(
			"id".to_owned(),
			Value::Uuid("f81d4fae-7dec-11d0-a765-00a0c91e6bf6".to_owned()),
		),
		("seq".to_owned(), Value::Long(42)),
		(
			"tags".to_owned(),
			Value::Map(
				[("env".to_owned(), Value::String("prod".to_owned()))]
					.into_iter()
					.collect(),
			),
		),
		(
			"samples".to_owned(),
			Value::Array(vec![Value::Double(0.5), Value::Double(-1.5)]),
		),
		("kind".to_owned(), Value::Enum("B".to_owned())),
		("payload".to_owned(), Value::Null),
	])
}

#[test]
fn value_round_trip() {
	let value = event_value();
	let encoded = write_datum_vec(&value, &mut SerializerConfig::new(&EVENT_SCHEMA)).unwrap();
	let decoded = read_datum_slice(&encoded, &EVENT_SCHEMA).unwrap();

	// The decoded union remembers its branch
	match &decoded {
		Value::Record(fields) => {
			assert_eq!(
				fields[5].1,
				Value::Union(Box::new(avro_datum::value::UnionValue {
					branch: 0,
					type_name: "null".to_owned(),
					value: Value::Null,
				}))
			);
		}
		other => panic!("expected record, got {other:?}"),
	}

	// Re-encoding the decoded tree is byte-identical
	let re_encoded =
		write_datum_vec(&decoded, &mut SerializerConfig::new(&EVENT_SCHEMA)).unwrap();
	assert_eq!(re_encoded, encoded);
}

#[test]
fn logical_values_round_trip() {
	for (schema, value) in [
		(
			r#"{"type": "int", "logicalType": "date"}"#,
			Value::Date(19000),
		),
		(
			r#"{"type": "long", "logicalType": "timestamp-micros"}"#,
			Value::TimestampMicros(1234567890123456),
		),
		(
			r#"{"type": "bytes", "logicalType": "decimal", "precision": 4, "scale": 2}"#,
			Value::Decimal("346.80".parse().unwrap()),
		),
		(
			r#"{"type": "fixed", "name": "f", "size": 12, "logicalType": "duration"}"#,
			Value::Duration(Duration {
				months: 1,
				days: 2,
				milliseconds: 3,
			}),
		),
	] {
		let schema: Schema = schema.parse().unwrap();
		let encoded = write_datum_vec(&value, &mut SerializerConfig::new(&schema)).unwrap();
		assert_eq!(read_datum_slice(&encoded, &schema).unwrap(), value);
	}
}

#[test]
fn decimal_value_wire_format() {
	let schema: Schema = r#"{"type": "bytes", "logicalType": "decimal", "precision": 4, "scale": 2}"#
		.parse()
		.unwrap();
	let encoded = write_datum_vec(
		&Value::Decimal("346.8".parse().unwrap()),
		&mut SerializerConfig::new(&schema),
	)
	.unwrap();
	assert_eq!(encoded, [0x06, 0x00, 0x87, 0x78]);
}

#[test]
fn datum_stream_reads_until_eof() {
	let schema: Schema = r#""long""#.parse().unwrap();
	let config = &mut SerializerConfig::new(&schema);
	let mut stream = Vec::new();
	stream = avro_datum::to_datum(&27i64, stream, config).unwrap();
	stream = avro_datum::to_datum(&-27i64, stream, config).unwrap();

	let mut reader = &stream[..];
	let mut decoded = Vec::new();
	// EOF at a datum boundary is a clean end of stream
	while let Some(value) = read_datum(&mut reader, &schema).unwrap() {
		decoded.push(value);
	}
	assert_eq!(decoded, [Value::Long(27), Value::Long(-27)]);
}

#[test]
fn eof_mid_datum_is_an_error() {
	let schema: Schema = r#""string""#.parse().unwrap();
	// Advertises 3 bytes, provides 1
	let mut reader: &[u8] = &[0x06, 0x66];
	assert!(read_datum(&mut reader, &schema).is_err());
}

#[test]
fn skip_action_discards_the_field() {
	let writer_schema: Schema = r#"
	{
		"type": "record",
		"name": "R",
		"fields": [
			{ "name": "dropped", "type": "string" },
			{ "name": "kept", "type": "long" }
		]
	}"#
	.parse()
	.unwrap();
	let encoded = write_datum_vec(
		&Value::Record(vec![
			("dropped".to_owned(), Value::String("noise".to_owned())),
			("kept".to_owned(), Value::Long(7)),
		]),
		&mut SerializerConfig::new(&writer_schema),
	)
	.unwrap();

	// Same schema, with the first field marked to be read-and-discarded
	let mut reader_schema: SchemaMut = r#"
	{
		"type": "record",
		"name": "R",
		"fields": [
			{ "name": "dropped", "type": "string" },
			{ "name": "kept", "type": "long" }
		]
	}"#
	.parse()
	.unwrap();
	let root = reader_schema.root_key();
	match &mut reader_schema.nodes_mut()[root.idx()].type_ {
		RegularType::Record(record) => record.fields[0].action = FieldAction::Skip,
		other => panic!("expected record, got {other:?}"),
	}
	let reader_schema: Schema = reader_schema.freeze().unwrap();

	assert_eq!(
		read_datum_slice(&encoded, &reader_schema).unwrap(),
		Value::Record(vec![("kept".to_owned(), Value::Long(7))])
	);

	// The typed path tolerates the skip the same way
	#[derive(serde_derive::Deserialize, Debug, PartialEq)]
	struct Kept {
		kept: i64,
	}
	assert_eq!(
		avro_datum::from_datum_slice::<Kept>(&encoded, &reader_schema).unwrap(),
		Kept { kept: 7 }
	);
}

#[test]
fn default_action_fills_without_reading_the_wire() {
	// The writer only wrote `a`
	let writer_schema: Schema = r#"
	{
		"type": "record",
		"name": "R",
		"fields": [{ "name": "a", "type": "long" }]
	}"#
	.parse()
	.unwrap();
	let encoded = write_datum_vec(
		&Value::Record(vec![("a".to_owned(), Value::Long(27))]),
		&mut SerializerConfig::new(&writer_schema),
	)
	.unwrap();

	// The reader also expects `b`, marked to fill from its default
	let mut reader_schema: SchemaMut = r#"
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
	let root = reader_schema.root_key();
	match &mut reader_schema.nodes_mut()[root.idx()].type_ {
		RegularType::Record(record) => record.fields[1].action = FieldAction::SetDefault,
		other => panic!("expected record, got {other:?}"),
	}
	let reader_schema: Schema = reader_schema.freeze().unwrap();

	assert_eq!(
		read_datum_slice(&encoded, &reader_schema).unwrap(),
		Value::Record(vec![
			("a".to_owned(), Value::Long(27)),
			("b".to_owned(), Value::String("fallback".to_owned())),
		])
	);

	// And on the typed path, through the same schema
	#[derive(serde_derive::Deserialize, Debug, PartialEq)]
	struct R {
		a: i64,
		b: String,
	}
	assert_eq!(
		avro_datum::from_datum_slice::<R>(&encoded, &reader_schema).unwrap(),
		R {
			a: 27,
			b: "fallback".to_owned()
		}
	);
}

#[test]
fn marking_a_field_without_default_fails_to_freeze() {
	let mut schema: SchemaMut = r#"
	{
		"type": "record",
		"name": "R",
		"fields": [{ "name": "a", "type": "long" }]
	}"#
	.parse()
	.unwrap();
	let root = schema.root_key();
	match &mut schema.nodes_mut()[root.idx()].type_ {
		RegularType::Record(record) => record.fields[0].action = FieldAction::SetDefault,
		other => panic!("expected record, got {other:?}"),
	}
	assert!(schema.freeze().is_err());
}

#[test]
fn record_value_missing_field_uses_schema_default() {
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
	let encoded = write_datum_vec(
		&Value::Record(vec![("a".to_owned(), Value::Long(1))]),
		&mut SerializerConfig::new(&schema),
	)
	.unwrap();
	match read_datum_slice(&encoded, &schema).unwrap() {
		Value::Record(fields) => {
			assert_eq!(fields[1].1, Value::String("fallback".to_owned()))
		}
		other => panic!("expected record, got {other:?}"),
	}
}
