//! Serialization of `rust_decimal::Decimal` values as Avro decimals
//!
//! The wire form is the unscaled integer (numerator scaled by 10^scale) in
//! two's-complement big-endian, length-delimited over `bytes` or padded to
//! the exact width over `fixed`.

use super::*;

pub(crate) fn serialize<'c, 's, W>(
	state: &mut SerializerState<'c, 's, W>,
	decimal: &Decimal,
	mut rust_decimal: rust_decimal::Decimal,
) -> Result<(), SerError>
where
	W: Write,
{
	// Scale to the schema's expectation; `rescale` rounds half-even, which
	// is the rounding the wire format specifies
	rust_decimal.rescale(decimal.scale);
	if rust_decimal.scale() != decimal.scale {
		return Err(SerError::new(
			"Decimal number cannot be scaled to fit in schema scale \
				with a 96 bit mantissa (number or scale too large)",
		));
	}
	let buf: [u8; 16] = rust_decimal.mantissa().to_be_bytes();
	match &decimal.repr {
		DecimalRepr::Bytes => {
			let start = redundant_sign_bytes(&buf);
			let trimmed = &buf[start..];
			state
				.writer
				.write_varint::<i64>(trimmed.len() as i64)
				.map_err(SerError::io)?;
			state.writer.write_all(trimmed).map_err(SerError::io)
		}
		DecimalRepr::Fixed(fixed) => write_fixed_decimal(state, &buf, fixed.size),
	}
}

/// How many leading bytes can be dropped from a two's-complement big-endian
/// integer without altering the number
///
/// For nonnegative numbers these are `0x00` bytes followed by a byte whose
/// MSB is 0; for negative numbers `0xFF` bytes followed by a byte whose MSB
/// is 1.
pub(crate) fn redundant_sign_bytes(buf: &[u8]) -> usize {
	let mut can_truncate = 0;
	if buf[0] & 0x80 == 0 {
		// Nonnegative number
		while buf.get(can_truncate).map_or(false, |&v| v == 0x00) {
			can_truncate += 1;
		}
		// Zero still serializes as one 0x00 byte: some other decoders choke
		// on empty bytes
		if can_truncate != 0 && buf.get(can_truncate).map_or(true, |&v| v & 0x80 != 0) {
			can_truncate -= 1;
		}
	} else {
		// Negative number
		while buf.get(can_truncate).map_or(false, |&v| v == 0xFF) {
			can_truncate += 1;
		}
		if can_truncate != 0 && buf.get(can_truncate).map_or(true, |&v| v & 0x80 == 0) {
			can_truncate -= 1;
		}
	}
	can_truncate
}

/// Write a two's-complement big-endian integer into exactly `size` bytes:
/// left-padded with the sign byte when shorter, refused when it would not
/// fit
pub(crate) fn write_fixed_decimal<'c, 's, W>(
	state: &mut SerializerState<'c, 's, W>,
	buf: &[u8],
	size: usize,
) -> Result<(), SerError>
where
	W: Write,
{
	match buf.len().checked_sub(size) {
		Some(start) => {
			// Truncating: every dropped byte must be a redundant sign byte
			let can_truncate = redundant_sign_bytes(buf);
			// redundant_sign_bytes keeps one byte for zero, but padding down
			// to the sign byte alone is still exact
			let all_redundant = buf.iter().all(|&v| v == 0x00) || buf.iter().all(|&v| v == 0xFF);
			if can_truncate < start && !(all_redundant && size > 0) {
				return Err(SerError::custom(format_args!(
					"Decimal number does not fit in `fixed` field size \
						(fixed size: {size}, required: {})",
					buf.len() - can_truncate
				)));
			}
			if size == 0 && !buf.iter().all(|&v| v == 0x00) {
				return Err(SerError::new(
					"Non-zero decimal number can not be serialized \
						as a fixed size decimal with size 0",
				));
			}
			state.writer.write_all(&buf[start..]).map_err(SerError::io)
		}
		None => {
			// Sign-extend to the fixed width: 0x00 for nonnegative, 0xFF
			// for negative
			let pad: u8 = if buf[0] & 0x80 == 0 { 0x00 } else { 0xFF };
			for _ in buf.len()..size {
				state.writer.write_all(&[pad]).map_err(SerError::io)?;
			}
			state.writer.write_all(buf).map_err(SerError::io)
		}
	}
}
