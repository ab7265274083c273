//! Custom secondary indexes: naming, catalog parsing and structural equality.
//!
//! Generated names must be reproducible bit for bit across runs, otherwise a
//! reconciliation would see every unnamed index as drifted. The algorithm is:
//!
//! 1. start with the table name;
//! 2. clean each column expression (drop `(`, `)`, `'`, `"`; turn `->>`,
//!    `->` and spaces into `_`) and clip it to 20 bytes;
//! 3. join the parts with `_`, then append `_<type>` for non-btree indexes;
//! 4. append `_` plus the first 8 hex characters of the SHA-256 of the
//!    original, comma-joined column list, then `_idx`;
//! 5. clip the result to 63 bytes.
//!
//! Changing the hash renames every generated index, so treat it as a
//! breaking change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::define_domain_error;
use super::identifier::{MAX_IDENTIFIER_LENGTH, truncate_identifier};

const MAX_COLUMN_PART_LENGTH: usize = 20;
const HASH_HEX_LENGTH: usize = 8;

define_domain_error! {
    /// Errors raised while parsing an index access method.
    pub enum IndexTypeError {
        /// The access method is not one this crate manages.
        Unknown {
            /// The rejected value.
            value: String,
        } => "unknown index type '{value}' (expected btree, gin, gist, hash or brin)",
    }
}

/// Index access method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    /// B-tree, PostgreSQL's default. Never spelled out in generated names
    /// or DDL.
    #[default]
    Btree,
    /// Generalised inverted index.
    Gin,
    /// Generalised search tree.
    Gist,
    /// Hash index.
    Hash,
    /// Block range index.
    Brin,
}

impl IndexType {
    /// Every supported access method.
    pub const ALL: [Self; 5] = [Self::Btree, Self::Gin, Self::Gist, Self::Hash, Self::Brin];

    /// Lowercase SQL keyword for the access method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Btree => "btree",
            Self::Gin => "gin",
            Self::Gist => "gist",
            Self::Hash => "hash",
            Self::Brin => "brin",
        }
    }

    /// Whether this is the implicit default method.
    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Btree)
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexType {
    type Err = IndexTypeError;

    /// Parse a method name; the empty string means btree.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Ok(Self::Btree);
        }
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| IndexTypeError::unknown(value))
    }
}

/// A secondary index on a queue table beyond the four standard ones.
///
/// `columns` is ordered; order is part of the index identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomIndex {
    /// Explicit index name; generated from the definition when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Column expressions, in index order.
    pub columns: Vec<String>,
    /// Access method.
    #[serde(default, rename = "type")]
    pub index_type: IndexType,
    /// Partial-index predicate; `None` or blank indexes every row.
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
}

impl CustomIndex {
    /// Unnamed btree index over `columns`.
    #[must_use]
    pub fn on<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            index_type: IndexType::Btree,
            predicate: None,
        }
    }

    /// Set an explicit name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the access method.
    #[must_use]
    pub const fn using(mut self, index_type: IndexType) -> Self {
        self.index_type = index_type;
        self
    }

    /// Make the index partial.
    #[must_use]
    pub fn filtered(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    /// The explicit name, ignoring blank values.
    ///
    /// Names longer than 63 bytes are clipped the way PostgreSQL clips
    /// them, so a long name matches what the catalog reports.
    #[must_use]
    pub fn explicit_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(|name| truncate_identifier(name, MAX_IDENTIFIER_LENGTH))
    }

    /// The explicit name, or the generated one for `table`.
    #[must_use]
    pub fn resolved_name(&self, table: &str) -> String {
        self.explicit_name().map_or_else(
            || generate_index_name(table, &self.columns, self.index_type),
            str::to_owned,
        )
    }

    /// Copy of the index with its name pinned for `table`.
    #[must_use]
    pub fn with_resolved_name(&self, table: &str) -> Self {
        Self {
            name: Some(self.resolved_name(table)),
            ..self.clone()
        }
    }

    /// The predicate, ignoring blank values.
    #[must_use]
    pub fn predicate(&self) -> Option<&str> {
        self.predicate
            .as_deref()
            .map(str::trim)
            .filter(|predicate| !predicate.is_empty())
    }

    /// Structural equality used to decide between keep and drop/recreate.
    ///
    /// Names are compared first. Then access method, predicate and the
    /// ordered column list must all match. Predicates are compared after
    /// trimming whitespace and redundant enclosing parentheses, since the
    /// catalog wraps every predicate it reports in one pair.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        if self.explicit_name() != other.explicit_name() {
            return false;
        }
        self.index_type == other.index_type
            && self.predicate().map(strip_enclosing_parens)
                == other.predicate().map(strip_enclosing_parens)
            && self.columns == other.columns
    }
}

/// Deterministic name for an unnamed index.
///
/// # Examples
///
/// ```
/// use pgq::domain::{IndexType, generate_index_name};
///
/// let name = generate_index_name("events", &["created_at".to_owned()], IndexType::Btree);
/// assert!(name.starts_with("events_created_at_"));
/// assert!(name.ends_with("_idx"));
/// assert_eq!(name.len(), "events_created_at_".len() + 8 + "_idx".len());
/// ```
#[must_use]
pub fn generate_index_name(table: &str, columns: &[String], index_type: IndexType) -> String {
    let mut parts = Vec::with_capacity(columns.len() + 1);
    parts.push(table.to_owned());
    parts.extend(columns.iter().map(|column| {
        let clean = clean_column(column);
        truncate_identifier(&clean, MAX_COLUMN_PART_LENGTH).to_owned()
    }));

    let mut name = parts.join("_");
    if !index_type.is_default() {
        name.push('_');
        name.push_str(index_type.as_str());
    }

    let digest = Sha256::digest(columns.join(",").as_bytes());
    let hash = hex::encode(digest);
    name.push('_');
    name.push_str(hash.get(..HASH_HEX_LENGTH).unwrap_or(&hash));
    name.push_str("_idx");

    truncate_identifier(&name, MAX_IDENTIFIER_LENGTH).to_owned()
}

// Single left-to-right pass; removals never join characters into a new
// operator token.
fn clean_column(column: &str) -> String {
    let mut clean = String::with_capacity(column.len());
    let mut rest = column;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("->>").or_else(|| rest.strip_prefix("->")) {
            clean.push('_');
            rest = tail;
            continue;
        }
        let mut chars = rest.chars();
        match chars.next() {
            Some('(' | ')' | '\'' | '"') | None => {}
            Some(' ') => clean.push('_'),
            Some(other) => clean.push(other),
        }
        rest = chars.as_str();
    }
    clean
}

/// Rebuild a [`CustomIndex`] from `pg_get_indexdef` output.
///
/// The access method comes from ` USING <method> ` (btree when absent).
/// Any ` WHERE ` clause (matched case-insensitively) is split off first and
/// becomes the predicate; the column list is what lies between the first
/// `(` after the access method and the last `)` of the remainder, split on
/// `, `.
///
/// # Examples
///
/// ```
/// use pgq::domain::{IndexType, parse_index_definition};
///
/// let index = parse_index_definition(
///     "jobs_tenant_idx",
///     "CREATE INDEX jobs_tenant_idx ON public.jobs USING gin (metadata) WHERE (processed_at IS NULL)",
/// );
///
/// assert_eq!(index.index_type, IndexType::Gin);
/// assert_eq!(index.columns, vec!["metadata".to_owned()]);
/// assert_eq!(index.predicate.as_deref(), Some("(processed_at IS NULL)"));
/// ```
#[must_use]
pub fn parse_index_definition(name: &str, definition: &str) -> CustomIndex {
    let index_type = IndexType::ALL
        .into_iter()
        .find(|kind| definition.contains(&format!(" USING {} ", kind.as_str())))
        .unwrap_or_default();

    let (head, predicate) = match find_case_insensitive(definition, " WHERE ") {
        Some(position) => (
            definition.get(..position).unwrap_or(definition),
            definition
                .get(position + " WHERE ".len()..)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_owned),
        ),
        None => (definition, None),
    };

    let search_from = head.find(" USING ").unwrap_or(0);
    let columns = head
        .get(search_from..)
        .and_then(|tail| tail.find('(').map(|offset| search_from + offset))
        .zip(head.rfind(')'))
        .filter(|(start, end)| end > start)
        .and_then(|(start, end)| head.get(start + 1..end))
        .map(|list| list.split(", ").map(str::to_owned).collect())
        .unwrap_or_default();

    CustomIndex {
        name: Some(name.to_owned()),
        columns,
        index_type,
        predicate,
    }
}

fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_uppercase().find(&needle.to_ascii_uppercase())
}

fn strip_enclosing_parens(predicate: &str) -> &str {
    let mut current = predicate.trim();
    while let Some(inner) = current
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        if !parens_balanced(inner) {
            break;
        }
        current = inner.trim();
    }
    current
}

fn parens_balanced(text: &str) -> bool {
    let mut depth: usize = 0;
    for ch in text.chars() {
        match ch {
            '(' => depth += 1,
            ')' => match depth.checked_sub(1) {
                Some(next) => depth = next,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}
