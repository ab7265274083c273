//! Validated PostgreSQL identifiers and fully qualified queue names.
//!
//! Queue and schema names are accepted verbatim or rejected; they are never
//! auto-corrected. A name is valid when it is non-empty, at most
//! [`MAX_IDENTIFIER_LENGTH`] bytes long and starts with an ASCII letter or an
//! underscore. Every SQL statement interpolates names through
//! [`quote_identifier`], so validation is about predictable naming rather
//! than injection safety.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::define_domain_error;

/// PostgreSQL identifier limit (`NAMEDATALEN - 1`).
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Separator between schema and queue inside an [`Fqn`].
pub const FQN_SEPARATOR: char = '.';

define_domain_error! {
    /// Reasons a name was rejected.
    pub enum IdentifierError {
        /// The identifier was empty.
        Empty {
            /// Which identifier was being validated.
            kind: &'static str,
        } => "{kind} must not be empty",
        /// The identifier exceeds the PostgreSQL limit.
        TooLong {
            /// Which identifier was being validated.
            kind: &'static str,
            /// Length of the rejected value in bytes.
            length: usize,
        } => "{kind} is {length} bytes long; PostgreSQL identifiers are limited to 63",
        /// The identifier does not start with a letter or underscore.
        InvalidStart {
            /// Which identifier was being validated.
            kind: &'static str,
            /// The rejected value.
            value: String,
        } => "{kind} '{value}' must start with a letter or underscore",
        /// A fully qualified name lacked the schema separator.
        MissingSeparator {
            /// The rejected value.
            value: String,
        } => "invalid FQN format: '{value}' (expected schema.queue)",
    }
}

/// Return `true` when `value` is an acceptable queue or schema name.
///
/// # Examples
///
/// ```
/// use pgq::domain::is_valid_identifier;
///
/// assert!(is_valid_identifier("valid_queue"));
/// assert!(!is_valid_identifier("123queue"));
/// ```
#[must_use]
pub fn is_valid_identifier(value: &str) -> bool {
    check_identifier("identifier", value).is_ok()
}

fn check_identifier(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
    let Some(first) = value.chars().next() else {
        return Err(IdentifierError::empty(kind));
    };
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(IdentifierError::too_long(kind, value.len()));
    }
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(IdentifierError::invalid_start(kind, value));
    }
    Ok(())
}

/// Quote `value` for interpolation into SQL as an identifier.
///
/// The value is wrapped in double quotes, embedded quotes are doubled and
/// NUL bytes are dropped, so quoting never fails.
///
/// # Examples
///
/// ```
/// use pgq::domain::quote_identifier;
///
/// assert_eq!(quote_identifier("events"), "\"events\"");
/// assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
/// ```
#[must_use]
pub fn quote_identifier(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars().filter(|ch| *ch != '\0') {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Clip `value` to at most `max_bytes` without splitting a character.
///
/// PostgreSQL clips over-long identifiers the same way, so names derived
/// here match what the catalog will report.
#[must_use]
pub fn truncate_identifier(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value.get(..end).unwrap_or(value)
}

macro_rules! identifier_newtype {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and construct the name.
            ///
            /// # Errors
            ///
            /// Returns [`IdentifierError`] when the value is empty, too long
            /// or starts with a character other than a letter or underscore.
            pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
                let raw = value.into();
                check_identifier($kind, &raw)?;
                Ok(Self(raw))
            }

            /// Borrow the raw, unquoted name.
            #[must_use]
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            /// Render the name as a quoted SQL identifier.
            #[must_use]
            pub fn quoted(&self) -> String {
                quote_identifier(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdentifierError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = IdentifierError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl FromStr for $name {
            type Err = IdentifierError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::new(value)
            }
        }
    };
}

identifier_newtype!(
    /// Name of a queue table.
    QueueName,
    "queue name"
);

identifier_newtype!(
    /// Name of the schema holding a queue table.
    SchemaName,
    "schema name"
);

impl SchemaName {
    /// The `public` schema, used when a definition names no schema.
    #[must_use]
    pub fn public() -> Self {
        Self(String::from("public"))
    }
}

impl Default for SchemaName {
    fn default() -> Self {
        Self::public()
    }
}

/// Fully qualified `schema.queue` name identifying a queue.
///
/// The FQN is the identity key used in every operation and every error. It is
/// also the key pg_partman uses for its `part_config` rows, which is why it
/// is rendered unquoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fqn(String);

impl Fqn {
    /// Compose an FQN from a schema and a queue name.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgq::domain::{Fqn, QueueName, SchemaName};
    ///
    /// let schema = SchemaName::new("public").expect("valid schema");
    /// let name = QueueName::new("test_queue").expect("valid queue");
    /// assert_eq!(Fqn::new(&schema, &name).as_str(), "public.test_queue");
    /// ```
    #[must_use]
    pub fn new(schema: &SchemaName, name: &QueueName) -> Self {
        Self(format!("{schema}{FQN_SEPARATOR}{name}"))
    }

    /// Wrap an already composed string without checking it.
    ///
    /// Use [`Fqn::split`] or [`Fqn::parse`] to inspect the parts.
    #[must_use]
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Split at the first separator into raw schema and queue parts.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::MissingSeparator`] when the value is empty
    /// or has no separator.
    pub fn split(&self) -> Result<(&str, &str), IdentifierError> {
        self.0
            .split_once(FQN_SEPARATOR)
            .ok_or_else(|| IdentifierError::missing_separator(self.0.as_str()))
    }

    /// Split and validate both parts into typed names.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the separator is missing or either
    /// part fails name validation.
    pub fn parse(&self) -> Result<(SchemaName, QueueName), IdentifierError> {
        let (schema, name) = self.split()?;
        Ok((SchemaName::new(schema)?, QueueName::new(name)?))
    }

    /// Borrow the raw FQN.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Fqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fqn {
    type Err = IdentifierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let fqn = Self::from_raw(value);
        fqn.parse()?;
        Ok(fqn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("valid_queue", true)]
    #[case("queue123", true)]
    #[case("_queue", true)]
    #[case("Queue", true)]
    #[case("", false)]
    #[case("123queue", false)]
    #[case("-queue", false)]
    fn identifier_validity(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(is_valid_identifier(value), expected, "{value:?}");
    }

    #[rstest]
    fn identifier_limit_is_63_bytes() {
        let at_limit = "q".repeat(MAX_IDENTIFIER_LENGTH);
        let over_limit = "q".repeat(MAX_IDENTIFIER_LENGTH + 1);

        assert!(QueueName::new(at_limit).is_ok());
        assert_eq!(
            QueueName::new(over_limit).expect_err("64 bytes is too long"),
            IdentifierError::too_long("queue name", 64_usize)
        );
    }

    #[rstest]
    fn nul_bytes_are_rejected_by_the_leading_character_rule() {
        let value = "\0".repeat(64);
        assert!(!is_valid_identifier(&value));
        assert!(!is_valid_identifier("\0queue"));
    }

    #[rstest]
    fn split_is_a_left_inverse_of_new() {
        let schema = SchemaName::new("public").expect("schema");
        let name = QueueName::new("test_queue").expect("queue");

        let fqn = Fqn::new(&schema, &name);
        assert_eq!(fqn.as_str(), "public.test_queue");
        assert_eq!(fqn.split().expect("split"), ("public", "test_queue"));
        assert_eq!(fqn.parse().expect("parse"), (schema, name));
    }

    #[rstest]
    #[case("invalid")]
    #[case("")]
    fn split_without_separator_fails(#[case] raw: &str) {
        let error = Fqn::from_raw(raw).split().expect_err("separator missing");
        assert_eq!(error, IdentifierError::missing_separator(raw));
    }

    #[rstest]
    fn from_str_validates_both_parts() {
        assert!("public.events".parse::<Fqn>().is_ok());
        assert!("public.1events".parse::<Fqn>().is_err());
        assert!(".events".parse::<Fqn>().is_err());
    }

    #[rstest]
    fn quoting_doubles_embedded_quotes_and_drops_nul() {
        assert_eq!(quote_identifier("a\"b\0c"), "\"a\"\"bc\"");
    }

    #[rstest]
    fn truncation_respects_character_boundaries() {
        let value = format!("{}é", "a".repeat(62));
        assert_eq!(value.len(), 64);
        assert_eq!(truncate_identifier(&value, MAX_IDENTIFIER_LENGTH), "a".repeat(62));
        assert_eq!(truncate_identifier("short", MAX_IDENTIFIER_LENGTH), "short");
    }

    #[rstest]
    fn names_deserialize_through_validation() {
        let name: QueueName = serde_json::from_str("\"events\"").expect("valid");
        assert_eq!(name.as_str(), "events");
        assert!(serde_json::from_str::<QueueName>("\"9events\"").is_err());
    }
}
