//! Parsers for operator-supplied values. Each returns a typed value or a
//! recoverable `InvalidInput` error so the caller can ask again.

use crate::error::Error;
use crate::model::CollectionId;

const MAX_DEVICE_NAME_LEN: usize = 63;

pub fn parse_collection_id(raw: &str) -> Result<CollectionId, Error> {
    CollectionId::parse(raw)
}

pub fn parse_child_count(raw: &str) -> Result<usize, Error> {
    match raw.trim().parse::<usize>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(Error::InvalidInput(format!(
            "'{}' is not a positive whole number",
            raw.trim()
        ))),
    }
}

/// A single DNS label: letters, digits and hyphens, not starting or ending with a hyphen.
pub fn parse_device_name(raw: &str) -> Result<String, Error> {
    let name = raw.trim();
    let valid = !name.is_empty()
        && name.len() <= MAX_DEVICE_NAME_LEN
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(name.to_string())
    } else {
        Err(Error::InvalidInput(format!("'{}' is not a device name", name)))
    }
}

/// Parse a device list: one name per line or separated by commas/whitespace,
/// `#` starts a comment. Repeated names (ignoring case) keep their first position.
pub fn parse_device_list(text: &str) -> Result<Vec<String>, Error> {
    let mut names: Vec<String> = Vec::new();
    for line in text.lines() {
        let content = line.split('#').next().unwrap_or_default();
        for token in content.split(|c: char| c == ',' || c.is_whitespace()) {
            if token.is_empty() {
                continue;
            }
            let name = parse_device_name(token)?;
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                names.push(name);
            }
        }
    }
    Ok(names)
}
