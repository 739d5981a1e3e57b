//! Navigate, modify and initialize the [`Schema`]

mod error;
pub mod fingerprint;
pub(crate) mod frozen;
mod safe;

pub use {error::SchemaError, frozen::Schema, safe::*};

impl std::str::FromStr for Schema {
	type Err = SchemaError;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let safe_schema: safe::SchemaMut = s.parse()?;
		safe_schema.try_into()
	}
}

/// Schema component for named nodes of a [`SchemaMut`]
///
/// This holds both the "name" and the "namespace".
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name {
	fully_qualified_name: String,
	namespace_delimiter_idx: Option<usize>,
}

impl std::fmt::Debug for Name {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(&self.fully_qualified_name, f)
	}
}

impl std::fmt::Display for Name {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Display::fmt(&self.fully_qualified_name, f)
	}
}

impl Name {
	/// The rightmost component of the fully qualified name
	///
	/// e.g. in `a.b.c` it's `c`
	pub fn name(&self) -> &str {
		match self.namespace_delimiter_idx {
			None => &self.fully_qualified_name,
			Some(delimiter_idx) => &self.fully_qualified_name[delimiter_idx + 1..],
		}
	}

	/// The namespace component of the fully qualified name
	///
	/// e.g. in `a.b.c` it's `a.b`
	pub fn namespace(&self) -> Option<&str> {
		self.namespace_delimiter_idx
			.map(|idx| &self.fully_qualified_name[..idx])
	}

	/// The fully qualified name
	///
	/// e.g. in `a.b.c` it's `a.b.c`
	pub fn fully_qualified_name(&self) -> &str {
		&self.fully_qualified_name
	}

	/// Build a [`Name`] from a fully qualified name
	///
	/// If the name contains a dot, everything up to the last dot is the
	/// namespace, consistently with how references are resolved when parsing.
	/// A leading dot is stripped, denoting the null namespace.
	pub fn from_fully_qualified_name(fully_qualified_name: impl Into<String>) -> Self {
		fn non_generic_inner(mut fully_qualified_name: String) -> Name {
			Name {
				namespace_delimiter_idx: match fully_qualified_name.rfind('.') {
					Some(0) => {
						// ".x" parses as {namespace: None, name: "x"}
						fully_qualified_name.remove(0);
						None
					}
					other => other,
				},
				fully_qualified_name,
			}
		}
		non_generic_inner(fully_qualified_name.into())
	}

	/// Whether every dot-separated component of the fully qualified name is a
	/// valid Avro name (`[A-Za-z_][A-Za-z0-9_]*`)
	pub fn is_valid(&self) -> bool {
		self.fully_qualified_name.split('.').all(is_valid_name)
	}
}

/// Whether `s` matches `[A-Za-z_][A-Za-z0-9_]*`
pub(crate) fn is_valid_name(s: &str) -> bool {
	let mut chars = s.chars();
	match chars.next() {
		Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
		_ => return false,
	}
	chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn name_components() {
		let name = Name::from_fully_qualified_name("org.example.Thing");
		assert_eq!(name.name(), "Thing");
		assert_eq!(name.namespace(), Some("org.example"));
		assert_eq!(name.fully_qualified_name(), "org.example.Thing");
		assert!(name.is_valid());

		let bare = Name::from_fully_qualified_name("Thing");
		assert_eq!(bare.name(), "Thing");
		assert_eq!(bare.namespace(), None);
	}

	#[test]
	fn name_validity() {
		assert!(is_valid_name("_private"));
		assert!(is_valid_name("a1"));
		assert!(!is_valid_name("1a"));
		assert!(!is_valid_name(""));
		assert!(!is_valid_name("white space"));
		assert!(!Name::from_fully_qualified_name("org..Thing").is_valid());
	}
}
