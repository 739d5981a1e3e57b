use avro_datum::{
	from_datum_slice,
	registry::{decode_any, encode_any, CodecCache, TypeRegistry},
	ser::SerializerConfig,
	to_datum_vec,
	value::{read_datum_slice, Value},
	Schema,
};

use pretty_assertions::assert_eq;

/// Branch type names are the variant identifiers, so a Rust enum can state
/// explicitly which branch it holds
#[derive(serde_derive::Serialize, serde_derive::Deserialize, Debug, PartialEq)]
enum IntOrString {
	#[serde(rename = "int")]
	Int(i32),
	#[serde(rename = "string")]
	String(String),
}

#[test]
fn union_as_enum_round_trip() {
	let schema: Schema = r#"["int", "string"]"#.parse().unwrap();

	let config = &mut SerializerConfig::new(&schema);
	let encoded = to_datum_vec(&IntOrString::Int(4), config).unwrap();
	assert_eq!(encoded, [0x00, 0x08]);
	assert_eq!(
		from_datum_slice::<IntOrString>(&encoded, &schema).unwrap(),
		IntOrString::Int(4)
	);

	let encoded = to_datum_vec(&IntOrString::String("foo".to_owned()), config).unwrap();
	assert_eq!(encoded, [0x02, 0x06, 0x66, 0x6F, 0x6F]);
	assert_eq!(
		from_datum_slice::<IntOrString>(&encoded, &schema).unwrap(),
		IntOrString::String("foo".to_owned())
	);
}

#[test]
fn named_branches_key_by_full_name() {
	let schema: Schema = r#"[
		"null",
		{
			"type": "record",
			"name": "ns.Point",
			"fields": [
				{ "name": "x", "type": "int" },
				{ "name": "y", "type": "int" }
			]
		}
	]"#
	.parse()
	.unwrap();

	#[derive(serde_derive::Serialize, serde_derive::Deserialize, Debug, PartialEq)]
	struct Point {
		x: i32,
		y: i32,
	}

	#[derive(serde_derive::Serialize, serde_derive::Deserialize, Debug, PartialEq)]
	enum NullOrPoint {
		#[serde(rename = "null")]
		Null,
		#[serde(rename = "ns.Point")]
		Point(Point),
	}

	let config = &mut SerializerConfig::new(&schema);
	let value = NullOrPoint::Point(Point { x: 1, y: -1 });
	let encoded = to_datum_vec(&value, config).unwrap();
	assert_eq!(encoded, [0x02, 0x02, 0x01]);
	assert_eq!(from_datum_slice::<NullOrPoint>(&encoded, &schema).unwrap(), value);

	let encoded = to_datum_vec(&NullOrPoint::Null, config).unwrap();
	assert_eq!(encoded, [0x00]);
	assert_eq!(
		from_datum_slice::<NullOrPoint>(&encoded, &schema).unwrap(),
		NullOrPoint::Null
	);
}

#[test]
fn logical_branches_carry_the_suffix() {
	let schema: Schema = r#"["long", {"type": "long", "logicalType": "timestamp-millis"}]"#
		.parse()
		.unwrap();

	#[derive(serde_derive::Serialize, serde_derive::Deserialize, Debug, PartialEq)]
	enum LongOrTimestamp {
		#[serde(rename = "long")]
		Long(i64),
		#[serde(rename = "long.timestamp-millis")]
		Timestamp(i64),
	}

	let config = &mut SerializerConfig::new(&schema);
	let encoded = to_datum_vec(&LongOrTimestamp::Timestamp(100), config).unwrap();
	assert_eq!(encoded, [0x02, 0xC8, 0x01]);
	assert_eq!(
		from_datum_slice::<LongOrTimestamp>(&encoded, &schema).unwrap(),
		LongOrTimestamp::Timestamp(100)
	);
}

#[test]
fn keyed_map_form_of_unions() {
	let schema: Schema = r#"["int", "string"]"#.parse().unwrap();

	// Decode side: the union value converts to a single-entry map keyed by
	// the branch type name
	let value = read_datum_slice(&[0x02, 0x06, 0x66, 0x6F, 0x6F], &schema).unwrap();
	let keyed = value.into_keyed_map().unwrap();
	assert_eq!(keyed.len(), 1);
	assert_eq!(keyed["string"], Value::String("foo".to_owned()));

	// Encode side: a single-entry map keyed by a branch type name picks
	// that branch
	let mut keyed = std::collections::HashMap::new();
	keyed.insert("int".to_owned(), Value::Int(4));
	let encoded = avro_datum::value::write_datum_vec(
		&Value::Map(keyed),
		&mut SerializerConfig::new(&schema),
	)
	.unwrap();
	assert_eq!(encoded, [0x00, 0x08]);
}

#[test]
fn implicit_resolution_follows_numeric_promotion() {
	// No int branch: a 32-bit integer promotes along int -> long -> float
	// -> double and lands on the only numeric branch
	let schema: Schema = r#"["null", "double"]"#.parse().unwrap();
	let encoded = to_datum_vec(&3i32, &mut SerializerConfig::new(&schema)).unwrap();
	assert_eq!(encoded, [0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x08, 0x40]);

	// An f32 prefers float over double when both are reachable
	let schema: Schema = r#"["double", "float"]"#.parse().unwrap();
	let encoded = to_datum_vec(&1.5f32, &mut SerializerConfig::new(&schema)).unwrap();
	assert_eq!(encoded, [0x02, 0x00, 0x00, 0xC0, 0x3F]);
}

#[test]
fn ambiguous_or_lossy_branches_require_explicit_naming() {
	// An i8 could go to either int or long; neither is preferable, so the
	// value has to name its branch
	let schema: Schema = r#"["int", "long"]"#.parse().unwrap();
	assert!(to_datum_vec(&5i8, &mut SerializerConfig::new(&schema)).is_err());

	// An f64 is never implicitly narrowed to a float branch
	let schema: Schema = r#"["null", "float"]"#.parse().unwrap();
	assert!(to_datum_vec(&1.5f64, &mut SerializerConfig::new(&schema)).is_err());

	// Decimal branches are only reachable by name
	let schema: Schema =
		r#"["null", {"type": "bytes", "logicalType": "decimal", "precision": 4, "scale": 2}]"#
			.parse()
			.unwrap();
	assert!(to_datum_vec(
		&"346.8".parse::<rust_decimal::Decimal>().unwrap(),
		&mut SerializerConfig::new(&schema)
	)
	.is_err());
}

#[derive(serde_derive::Serialize, serde_derive::Deserialize, Debug, PartialEq)]
struct Point {
	x: i32,
	y: i32,
}

fn point_schema() -> Schema {
	r#"[
		"null",
		{
			"type": "record",
			"name": "ns.Point",
			"fields": [
				{ "name": "x", "type": "int" },
				{ "name": "y", "type": "int" }
			]
		}
	]"#
	.parse()
	.unwrap()
}

#[test]
fn registry_materializes_registered_types() {
	let schema = point_schema();
	let mut registry = TypeRegistry::new();
	registry.register::<Point>("ns.Point");

	// [branch 1, x=1, y=-1]
	let decoded = decode_any(&[0x02, 0x02, 0x01], &schema, &registry).unwrap();
	let point = decoded.downcast_ref::<Point>().unwrap();
	assert_eq!(point, &Point { x: 1, y: -1 });

	// Encode resolves the runtime type back to the branch
	let config = &mut SerializerConfig::new(&schema);
	let encoded = encode_any(&Point { x: 1, y: -1 }, &registry, config).unwrap();
	assert_eq!(encoded, [0x02, 0x02, 0x01]);
}

#[test]
fn registry_degrades_to_value_by_default() {
	let schema = point_schema();
	let registry = TypeRegistry::new();

	let decoded = decode_any(&[0x02, 0x02, 0x01], &schema, &registry).unwrap();
	let value = decoded.downcast_ref::<Value>().unwrap();
	assert_eq!(
		*value,
		Value::Record(vec![
			("x".to_owned(), Value::Int(1)),
			("y".to_owned(), Value::Int(-1)),
		])
	);
}

#[test]
fn union_resolution_error_makes_unresolvable_unions_hard_errors() {
	let schema = point_schema();
	let mut registry = TypeRegistry::new();
	registry.union_resolution_error = true;
	registry.partial_union_type_resolution = true;

	assert!(decode_any(&[0x02, 0x02, 0x01], &schema, &registry)
		.unwrap_err()
		.to_string()
		.contains("No type registered"));

	// Registering the branch fixes it
	registry.register::<Point>("ns.Point");
	assert!(decode_any(&[0x02, 0x02, 0x01], &schema, &registry).is_ok());
}

#[test]
fn strict_resolution_requires_every_branch() {
	let schema: Schema = r#"["int", "string"]"#.parse().unwrap();
	let mut registry = TypeRegistry::new();
	registry.union_resolution_error = true;
	registry.partial_union_type_resolution = false;
	registry.register::<i32>("int");

	// "string" is not registered, so even an int datum is refused
	assert!(decode_any(&[0x00, 0x08], &schema, &registry)
		.unwrap_err()
		.to_string()
		.contains("partial union type resolution is disabled"));

	registry.register::<String>("string");
	let decoded = decode_any(&[0x00, 0x08], &schema, &registry).unwrap();
	assert_eq!(decoded.downcast_ref::<i32>(), Some(&4));
}

#[test]
fn registry_synthetic_names() {
	let schema: Schema = r#"
	{
		"type": "array",
		"items": {
			"type": "record",
			"name": "ns.Point",
			"fields": [
				{ "name": "x", "type": "int" },
				{ "name": "y", "type": "int" }
			]
		}
	}"#
	.parse()
	.unwrap();
	let mut registry = TypeRegistry::new();
	registry.register::<Vec<Point>>("array:ns.Point");

	// [block of 2, (1,2), (3,4), end]
	let datum = avro_datum::to_datum_vec(
		&vec![Point { x: 1, y: 2 }, Point { x: 3, y: 4 }],
		&mut SerializerConfig::new(&schema),
	)
	.unwrap();
	let decoded = decode_any(&datum, &schema, &registry).unwrap();
	assert_eq!(
		decoded.downcast_ref::<Vec<Point>>(),
		Some(&vec![Point { x: 1, y: 2 }, Point { x: 3, y: 4 }])
	);
}

#[test]
fn codec_cache_round_trips_and_memoizes() {
	let schema: Schema = r#"
	{
		"type": "record",
		"name": "ns.Point",
		"fields": [
			{ "name": "x", "type": "int" },
			{ "name": "y", "type": "int" }
		]
	}"#
	.parse()
	.unwrap();

	let cache = CodecCache::new();
	let config = &mut SerializerConfig::new(&schema);
	let encoded = cache.encode(&Point { x: 1, y: -1 }, config).unwrap();
	assert_eq!(encoded, [0x02, 0x01]);
	let decoded: Point = cache.decode(&encoded, &schema).unwrap();
	assert_eq!(decoded, Point { x: 1, y: -1 });

	// Same (fingerprint, type) key on both calls
	let first = cache.decoder_for::<Point>(&schema);
	let second = cache.decoder_for::<Point>(&schema);
	assert_eq!(first.type_id(), second.type_id());

	let mut uncached = CodecCache::new();
	uncached.disable_caching = true;
	let decoded: Point = uncached.decode(&encoded, &schema).unwrap();
	assert_eq!(decoded, Point { x: 1, y: -1 });
}
