//! Identifier rules and naming conventions.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, Result};

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

fn table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("static regex"))
}

/// Validate a property key or column name.
pub fn check_identifier(name: &str) -> Result<()> {
    if identifier_re().is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

/// Validate a table name. Tables are lower-case so that names derived from
/// relation keys always match.
pub fn check_table(name: &str) -> Result<()> {
    if table_re().is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

/// Split a key at capital-letter boundaries: `ownUserList` -> `own`, `User`, `List`.
pub fn split_words(key: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in key.char_indices() {
        if i > 0 && c.is_ascii_uppercase() {
            parts.push(&key[start..i]);
            start = i;
        }
    }
    if start < key.len() {
        parts.push(&key[start..]);
    }
    parts
}

/// Name of the column holding a reference to `table`.
pub fn foreign_key(table: &str) -> String {
    format!("{table}_id")
}

/// Name of the junction table linking `owner` to `foreign`.
pub fn junction(owner: &str, foreign: &str) -> String {
    format!("{owner}_{foreign}")
}

/// Key columns of the junction linking `owner` to `foreign`.
///
/// A table linked to itself needs two distinct columns, so the foreign side
/// becomes `<table>2_id`.
pub fn junction_columns(owner: &str, foreign: &str) -> (String, String) {
    if owner == foreign {
        (foreign_key(owner), format!("{foreign}2_id"))
    } else {
        (foreign_key(owner), foreign_key(foreign))
    }
}
