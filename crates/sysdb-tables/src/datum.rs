//! Helpers for validating rows written to system tables

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use sysdb_common::{AdminError, AdminResult, DEFAULT_PRIMARY_KEY, Datum, NameString};

/// The primary key of a row, if it has one
pub fn row_id(row: &Datum) -> Option<&Datum> {
    row.get(DEFAULT_PRIMARY_KEY)
}

pub fn as_object(row: &Datum) -> AdminResult<&Map<String, Value>> {
    row.as_object()
        .ok_or_else(|| AdminError::invalid(format!("Expected an object, got {}.", row)))
}

/// Reject keys outside `allowed`
pub fn check_keys(obj: &Map<String, Value>, allowed: &[&str]) -> AdminResult<()> {
    let unexpected: Vec<&str> = obj
        .keys()
        .map(String::as_str)
        .filter(|key| !allowed.contains(key))
        .collect();
    if unexpected.is_empty() {
        Ok(())
    } else {
        Err(AdminError::invalid(format!(
            "Unexpected key(s) `{}`.",
            unexpected.join("`, `")
        )))
    }
}

/// The row being written must carry the key it is written at
pub fn check_primary_key(obj: &Map<String, Value>, pkey: &Datum) -> AdminResult<()> {
    match obj.get(DEFAULT_PRIMARY_KEY) {
        Some(id) if id == pkey => Ok(()),
        Some(_) => Err(AdminError::invalid(
            "The change you're trying to make to the primary key is not allowed.",
        )),
        None => Err(AdminError::invalid(format!(
            "Expected a field named `{}`.",
            DEFAULT_PRIMARY_KEY
        ))),
    }
}

pub fn require<'a>(obj: &'a Map<String, Value>, key: &str) -> AdminResult<&'a Value> {
    obj.get(key)
        .ok_or_else(|| AdminError::invalid(format!("Expected a field named `{}`.", key)))
}

pub fn expect_str<'a>(value: &'a Value, key: &str) -> AdminResult<&'a str> {
    value.as_str().ok_or_else(|| {
        AdminError::invalid(format!("Expected a string for `{}`, got {}.", key, value))
    })
}

pub fn expect_name(value: &Value, key: &str) -> AdminResult<NameString> {
    NameString::new(expect_str(value, key)?).map_err(AdminError::invalid)
}

pub fn expect_uuid(value: &Value, key: &str) -> AdminResult<Uuid> {
    let s = expect_str(value, key)?;
    Uuid::parse_str(s)
        .map_err(|_| AdminError::invalid(format!("Expected a UUID for `{}`, got \"{}\".", key, s)))
}

pub fn timestamp(time: &DateTime<Utc>) -> Datum {
    Value::String(time.to_rfc3339())
}
