use avro_datum::{from_datum_slice, ser::SerializerConfig, to_datum_vec, Schema};

use pretty_assertions::assert_eq;

fn encode<T: serde::Serialize + ?Sized>(value: &T, schema: &Schema) -> Vec<u8> {
	to_datum_vec(value, &mut SerializerConfig::new(schema)).expect("Failed to serialize")
}

fn round_trip<T>(value: &T, schema: &Schema) -> T
where
	T: serde::Serialize + serde::de::DeserializeOwned,
{
	let encoded = encode(value, schema);
	from_datum_slice(&encoded, schema).expect("Failed to deserialize")
}

macro_rules! primitive_round_trips {
	($($name: ident: $schema: literal $ty: ty => $value: expr,)*) => {
		paste::paste! {
			$(
				#[test]
				fn [<round_trip_ $name>]() {
					let schema: Schema = $schema.parse().unwrap();
					let value: $ty = $value;
					assert_eq!(round_trip(&value, &schema), value);
				}
			)*
		}
	};
}

primitive_round_trips! {
	boolean: r#""boolean""# bool => true,
	int: r#""int""# i32 => 1234,
	int_negative: r#""int""# i32 => -1234,
	long: r#""long""# i64 => 9007199254740993,
	float: r#""float""# f32 => 1234.5,
	double: r#""double""# f64 => -1234.5e10,
	string: r#""string""# String => "adsfasdf09809dsf-=adsf".to_owned(),
	long_min: r#""long""# i64 => i64::MIN,
	long_max: r#""long""# i64 => i64::MAX,
}

#[test]
fn simple_record_wire_format() {
	let schema: Schema = r#"
	{
		"type": "record",
		"name": "simple",
		"namespace": "org.example.avro",
		"fields": [
			{ "name": "a", "type": "long" },
			{ "name": "b", "type": "string" }
		]
	}"#
	.parse()
	.unwrap();

	#[derive(serde_derive::Serialize, serde_derive::Deserialize, Debug, PartialEq)]
	struct Simple {
		a: i64,
		b: String,
	}

	let value = Simple {
		a: 27,
		b: "foo".to_owned(),
	};
	let encoded = encode(&value, &schema);
	assert_eq!(encoded, [0x36, 0x06, 0x66, 0x6F, 0x6F]);
	assert_eq!(from_datum_slice::<Simple>(&encoded, &schema).unwrap(), value);
}

#[test]
fn record_fields_reorder_to_declaration_order() {
	let schema: Schema = r#"
	{
		"type": "record",
		"name": "simple",
		"fields": [
			{ "name": "a", "type": "long" },
			{ "name": "b", "type": "string" }
		]
	}"#
	.parse()
	.unwrap();

	// Serializes b before a
	#[derive(serde_derive::Serialize)]
	struct Reversed {
		b: String,
		a: i64,
	}

	let encoded = encode(
		&Reversed {
			b: "foo".to_owned(),
			a: 27,
		},
		&schema,
	);
	assert_eq!(encoded, [0x36, 0x06, 0x66, 0x6F, 0x6F]);
}

#[test]
fn nullable_union_pointer_form() {
	let null_first: Schema = r#"["null", "string"]"#.parse().unwrap();
	assert_eq!(
		encode(&Some("foo".to_owned()), &null_first),
		[0x02, 0x06, 0x66, 0x6F, 0x6F]
	);
	assert_eq!(encode(&None::<String>, &null_first), [0x00]);
	assert_eq!(
		from_datum_slice::<Option<String>>(&[0x02, 0x06, 0x66, 0x6F, 0x6F], &null_first).unwrap(),
		Some("foo".to_owned())
	);
	assert_eq!(
		from_datum_slice::<Option<String>>(&[0x00], &null_first).unwrap(),
		None
	);

	// The null branch index depends on its position in the union
	let null_second: Schema = r#"["string", "null"]"#.parse().unwrap();
	assert_eq!(encode(&None::<String>, &null_second), [0x02]);
	assert_eq!(
		from_datum_slice::<Option<String>>(&[0x02], &null_second).unwrap(),
		None
	);
}

#[test]
fn array_block_forms() {
	let schema: Schema = r#"{"type": "array", "items": "int"}"#.parse().unwrap();

	// Default: one block with a byte-size header
	let encoded = encode(&[27, 28], &schema);
	assert_eq!(encoded, [0x03, 0x04, 0x36, 0x38, 0x00]);
	assert_eq!(from_datum_slice::<Vec<i32>>(&encoded, &schema).unwrap(), [27, 28]);

	// Without the size header
	let mut config = SerializerConfig::new(&schema);
	config.write_block_size_header = false;
	let encoded = avro_datum::to_datum_vec(&[27, 28], &mut config).unwrap();
	assert_eq!(encoded, [0x04, 0x36, 0x38, 0x00]);
	assert_eq!(from_datum_slice::<Vec<i32>>(&encoded, &schema).unwrap(), [27, 28]);

	// Splitting into blocks of one
	let mut config = SerializerConfig::new(&schema);
	config.block_length = 1;
	let encoded = avro_datum::to_datum_vec(&[27, 28], &mut config).unwrap();
	assert_eq!(encoded, [0x01, 0x02, 0x36, 0x01, 0x02, 0x38, 0x00]);
	assert_eq!(from_datum_slice::<Vec<i32>>(&encoded, &schema).unwrap(), [27, 28]);

	// Empty array is just the terminator
	assert_eq!(encode(&Vec::<i32>::new(), &schema), [0x00]);
}

#[test]
fn map_round_trip() {
	let schema: Schema = r#"{"type": "map", "values": "long"}"#.parse().unwrap();
	let value: std::collections::HashMap<String, i64> = [
		("a".to_owned(), 1i64),
		("b".to_owned(), 3),
		("c".to_owned(), 2),
	]
	.into_iter()
	.collect();
	assert_eq!(round_trip(&value, &schema), value);
}

#[test]
fn enum_round_trip() {
	let schema: Schema = r#"{"type": "enum", "name": "Test", "symbols": ["A", "B"]}"#
		.parse()
		.unwrap();

	#[derive(serde_derive::Serialize, serde_derive::Deserialize, Debug, PartialEq)]
	enum Test {
		A,
		B,
	}

	assert_eq!(encode(&Test::B, &schema), [0x02]);
	assert_eq!(round_trip(&Test::A, &schema), Test::A);
	// Out-of-range discriminant
	assert!(from_datum_slice::<Test>(&[0x04], &schema).is_err());
}

#[test]
fn fixed_round_trip() {
	let schema: Schema = r#"{"type": "fixed", "name": "Test", "size": 4}"#.parse().unwrap();

	#[derive(serde_derive::Serialize, serde_derive::Deserialize, Debug, PartialEq)]
	struct Holder(#[serde(with = "serde_bytes")] Vec<u8>);

	let value = Holder(b"ABCD".to_vec());
	assert_eq!(encode(&value, &schema), b"ABCD");
	assert_eq!(round_trip(&value, &schema), value);

	// Size mismatch is an encode error
	assert!(
		avro_datum::to_datum_vec(
			&Holder(b"ABC".to_vec()),
			&mut SerializerConfig::new(&schema)
		)
		.is_err()
	);
}

#[test]
fn bytes_round_trip() {
	let schema: Schema = r#""bytes""#.parse().unwrap();

	#[derive(serde_derive::Serialize, serde_derive::Deserialize, Debug, PartialEq)]
	struct Holder(#[serde(with = "serde_bytes")] Vec<u8>);

	let value = Holder(b"12345abcd".to_vec());
	assert_eq!(encode(&value, &schema), b"\x1212345abcd");
	assert_eq!(round_trip(&value, &schema), value);
}

#[test]
fn bytes_decimal_wire_format() {
	let schema: Schema = r#"{"type": "bytes", "logicalType": "decimal", "precision": 4, "scale": 2}"#
		.parse()
		.unwrap();
	let value: rust_decimal::Decimal = "346.8".parse().unwrap();
	let encoded = encode(&value, &schema);
	assert_eq!(encoded, [0x06, 0x00, 0x87, 0x78]);
	assert_eq!(
		from_datum_slice::<rust_decimal::Decimal>(&encoded, &schema).unwrap(),
		"346.80".parse::<rust_decimal::Decimal>().unwrap()
	);
}

#[test]
fn fixed_decimal_padding() {
	let schema: Schema =
		r#"{"type": "fixed", "name": "f", "size": 4, "logicalType": "decimal", "precision": 9, "scale": 2}"#
			.parse()
			.unwrap();

	// Positive numerators shorter than the fixed size are left-padded with
	// 0x00
	let encoded = encode(&"1".parse::<rust_decimal::Decimal>().unwrap(), &schema);
	assert_eq!(encoded, [0x00, 0x00, 0x00, 0x64]);

	// Negative numerators are sign-extended with 0xFF
	let encoded = encode(&"-1".parse::<rust_decimal::Decimal>().unwrap(), &schema);
	assert_eq!(encoded, [0xFF, 0xFF, 0xFF, 0x9C]);
}

#[test]
fn fixed_decimal_overflow_errors() {
	let schema: Schema =
		r#"{"type": "fixed", "name": "f", "size": 1, "logicalType": "decimal", "precision": 2}"#
			.parse()
			.unwrap();
	// 500 does not fit one two's-complement byte
	assert!(avro_datum::to_datum_vec(
		&"500".parse::<rust_decimal::Decimal>().unwrap(),
		&mut SerializerConfig::new(&schema)
	)
	.is_err());
}

#[test]
fn duration_wire_format() {
	let schema: Schema = r#"{"type": "fixed", "name": "f", "size": 12, "logicalType": "duration"}"#
		.parse()
		.unwrap();

	#[derive(serde_derive::Serialize, serde_derive::Deserialize, Debug, PartialEq)]
	struct Duration {
		months: u32,
		days: u32,
		milliseconds: u32,
	}

	let value = Duration {
		months: 1,
		days: 2,
		milliseconds: 3,
	};
	let encoded = encode(&value, &schema);
	assert_eq!(
		encoded,
		[0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00]
	);
	assert_eq!(round_trip(&value, &schema), value);

	// Tuple targets work too
	let as_tuple: (u32, u32, u32) = from_datum_slice(&encoded, &schema).unwrap();
	assert_eq!(as_tuple, (1, 2, 3));
}

#[test]
fn timestamps_and_dates_are_plain_integers_on_the_wire() {
	let schema: Schema = r#"{"type": "long", "logicalType": "timestamp-micros"}"#
		.parse()
		.unwrap();
	assert_eq!(round_trip(&1234567890123456i64, &schema), 1234567890123456);

	let schema: Schema = r#"{"type": "int", "logicalType": "date"}"#.parse().unwrap();
	assert_eq!(encode(&19000, &schema), encode(&19000, &r#""int""#.parse().unwrap()));
}

#[test]
fn uuid_round_trip() {
	let schema: Schema = r#"{"type": "string", "logicalType": "uuid"}"#.parse().unwrap();
	let value = "f81d4fae-7dec-11d0-a765-00a0c91e6bf6".to_owned();
	assert_eq!(round_trip(&value, &schema), value);
}

#[test]
fn oversized_byte_slice_is_refused() {
	let schema: Schema = r#""string""#.parse().unwrap();
	// Advertises a 20-byte string
	let mut datum = vec![40u8];
	datum.extend_from_slice(&[b'x'; 20]);

	let mut reader = avro_datum::de::read::ReaderRead::new(&datum[..]);
	reader.max_byte_slice_size = 10;
	let mut state = avro_datum::de::DeserializerState::with_config(
		reader,
		avro_datum::de::DeserializerConfig::new(&schema),
	);
	let result: Result<String, _> = serde::Deserialize::deserialize(state.deserializer());
	assert!(result.unwrap_err().to_string().contains("larger than the configured maximum"));
}

#[test]
fn eof_mid_value_is_an_error() {
	let schema: Schema = r#""string""#.parse().unwrap();
	// Advertises 3 bytes but only provides 2
	let err = from_datum_slice::<String>(&[0x06, 0x66, 0x6F], &schema).unwrap_err();
	assert!(err.to_string().contains("end of slice"));
}

#[test]
fn reader_and_slice_agree() -> anyhow::Result<()> {
	let schema: Schema = r#"{"type": "array", "items": "string"}"#.parse()?;
	let value = vec!["a".to_owned(), "bc".to_owned(), "def".to_owned()];
	let encoded = encode(&value, &schema);
	let from_slice: Vec<String> = from_datum_slice(&encoded, &schema)?;
	let from_reader: Vec<String> = avro_datum::from_datum_reader(&encoded[..], &schema)?;
	assert_eq!(from_slice, from_reader);
	Ok(())
}
