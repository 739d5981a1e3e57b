//! Schema fingerprinting: digests over the canonical form
//!
//! All fingerprints are digests of the canonical form bytes, behind the
//! [`digest`] crate's uniform interface. SHA-256 is the identity used for
//! codec caching; MD5 and CRC-64-AVRO (the Rabin fingerprint) are provided
//! for interoperability.

use crate::schema::{SchemaError, SchemaMut};

pub use {md5::Md5, sha2::Sha256};

impl SchemaMut {
	/// Digest the canonical form of the schema with any [`digest::Digest`]
	///
	/// ```
	/// let schema: avro_datum::schema::SchemaMut = r#""null""#.parse().unwrap();
	/// let sha256 = schema.fingerprint::<sha2::Sha256>().unwrap();
	/// assert_eq!(&sha256[..4], &[0x63, 0xdd, 0x24, 0xe7]);
	/// ```
	pub fn fingerprint<D: digest::Digest + digest::Update>(&self) -> Result<digest::Output<D>, SchemaError> {
		let mut writer = DigestFmtAdapter(D::new());
		self.write_canonical_form(&mut writer)?;
		Ok(writer.0.finalize())
	}

	/// SHA-256 of the canonical form: the schema's stable identity
	pub fn sha256_fingerprint(&self) -> Result<[u8; 32], SchemaError> {
		Ok(self.fingerprint::<Sha256>()?.into())
	}

	/// MD5 of the canonical form
	pub fn md5_fingerprint(&self) -> Result<[u8; 16], SchemaError> {
		Ok(self.fingerprint::<Md5>()?.into())
	}

	/// CRC-64-AVRO (Rabin) of the canonical form, as little-endian bytes
	///
	/// This is the byte order used by avro single object encoding.
	pub fn rabin_fingerprint(&self) -> Result<[u8; 8], SchemaError> {
		let mut rabin = Rabin::default();
		self.write_canonical_form(&mut rabin)?;
		Ok(rabin.sum_le())
	}
}

/// Feeds `fmt::Write` (what the canonical form writer produces) into any
/// `digest::Update`
struct DigestFmtAdapter<D>(D);
impl<D: digest::Update> std::fmt::Write for DigestFmtAdapter<D> {
	fn write_str(&mut self, s: &str) -> std::fmt::Result {
		self.0.update(s.as_bytes());
		Ok(())
	}
}

/// The CRC-64-AVRO fingerprint described in
/// [schema_fingerprints](https://avro.apache.org/docs/current/specification/#schema_fingerprints)
///
/// Implements the [`digest`] traits so that it is usable wherever the
/// cryptographic digests are.
#[derive(Clone)]
pub struct Rabin {
	result: i64,
}

impl Default for Rabin {
	fn default() -> Self {
		Rabin { result: EMPTY64 }
	}
}

impl Rabin {
	fn write(&mut self, data: &[u8]) {
		for b in data {
			self.result =
				(self.result >> 8) ^ fp_table()[((self.result ^ *b as i64) & 0xFF) as usize];
		}
	}

	/// The little-endian encoding of the Rabin hash, used by avro
	/// [single object encoding](https://avro.apache.org/docs/current/specification/#single-object-encoding)
	pub fn sum_le(&self) -> [u8; 8] {
		self.result.to_le_bytes()
	}

	/// The big-endian encoding of the Rabin hash
	pub fn sum_be(&self) -> [u8; 8] {
		self.result.to_be_bytes()
	}
}

impl std::fmt::Write for Rabin {
	fn write_str(&mut self, s: &str) -> std::fmt::Result {
		self.write(s.as_bytes());
		Ok(())
	}
}

impl digest::Update for Rabin {
	fn update(&mut self, data: &[u8]) {
		self.write(data);
	}
}
impl digest::OutputSizeUser for Rabin {
	type OutputSize = digest::consts::U8;
}
impl digest::FixedOutput for Rabin {
	fn finalize_into(self, out: &mut digest::Output<Self>) {
		out.copy_from_slice(&self.sum_le());
	}
}
impl digest::HashMarker for Rabin {}
impl digest::Reset for Rabin {
	fn reset(&mut self) {
		self.result = EMPTY64;
	}
}

const EMPTY64: i64 = -4513414715797952619;

fn fp_table() -> &'static [i64; 256] {
	static FP_TABLE: std::sync::OnceLock<[i64; 256]> = std::sync::OnceLock::new();
	FP_TABLE.get_or_init(|| {
		let mut fp_table: [i64; 256] = [0; 256];
		for i in 0..256 {
			let mut fp: i64 = i;
			for _ in 0..8 {
				fp = (fp >> 1) ^ (EMPTY64 & -(fp & 1));
			}
			fp_table[i as usize] = fp;
		}
		fp_table
	})
}

#[cfg(test)]
mod tests {
	use {super::Rabin, pretty_assertions::assert_eq, std::fmt::Write};

	#[test]
	fn rabin_reference_values() {
		let data: &[(&str, i64)] = &[
			(r#""null""#, 7195948357588979594),
			(r#""boolean""#, -6970731678124411036),
			(
				r#"{"name":"foo","type":"fixed","size":15}"#,
				1756455273707447556,
			),
			(
				r#"{"name":"PigValue","type":"record","fields":[{"name":"value","type":["null","int","long","PigValue"]}]}"#,
				-1759257747318642341,
			),
		];

		for (s, fp) in data {
			let mut hasher = Rabin::default();
			hasher.write_str(s).unwrap();
			assert_eq!(i64::from_le_bytes(hasher.sum_le()), *fp);
			assert_eq!(i64::from_be_bytes(hasher.sum_be()), *fp);
		}
	}
}
