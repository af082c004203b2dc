//! Length-prefixed key encoding for LMDB storage.
//!
//! String parts are encoded as `[len:u16 BE][bytes]`, so any bytes are allowed
//! and no escaping is needed. Numeric ids are appended as 8 big-endian bytes,
//! which keeps LMDB's lexicographic order equal to numeric order.
//!
//! - name index: `[guard][name]`
//! - principal association: `[principal_type][principal_id:8][target_id:8]`

use crate::error::{Error, Result};

/// Build a length-prefixed key from parts
pub fn build_key(parts: &[&str]) -> Result<Vec<u8>> {
    let total_len: usize = parts.iter().map(|p| 2 + p.len()).sum();
    let mut key = Vec::with_capacity(total_len + 16);
    for part in parts {
        let len = u16::try_from(part.len())
            .map_err(|_| Error::Storage(format!("key part too long ({} bytes)", part.len())))?;
        key.extend_from_slice(&len.to_be_bytes());
        key.extend_from_slice(part.as_bytes());
    }
    Ok(key)
}

/// Parse a key made only of string parts. Returns `None` on malformed input.
pub fn parse_key(bytes: &[u8]) -> Option<Vec<&str>> {
    let mut parts = Vec::with_capacity(2);
    let mut i = 0;
    while i < bytes.len() {
        let (part, next) = read_part(bytes, i)?;
        parts.push(part);
        i = next;
    }
    Some(parts)
}

fn read_part(bytes: &[u8], at: usize) -> Option<(&str, usize)> {
    let len_bytes: [u8; 2] = bytes.get(at..at + 2)?.try_into().ok()?;
    let len = u16::from_be_bytes(len_bytes) as usize;
    let start = at + 2;
    let raw = bytes.get(start..start + len)?;
    Some((std::str::from_utf8(raw).ok()?, start + len))
}

fn read_u64(bytes: &[u8], at: usize) -> Option<u64> {
    let raw: [u8; 8] = bytes.get(at..at + 8)?.try_into().ok()?;
    Some(u64::from_be_bytes(raw))
}

// ============================================================================
// Name index (guard, name)
// ============================================================================

#[inline]
pub fn name_key(guard: &str, name: &str) -> Result<Vec<u8>> {
    build_key(&[guard, name])
}

/// Parse a name key (or a row value with the same layout) into `(guard, name)`
pub fn parse_name(bytes: &[u8]) -> Option<(&str, &str)> {
    match parse_key(bytes)?.as_slice() {
        [guard, name] => Some((*guard, *name)),
        _ => None,
    }
}

// ============================================================================
// Principal associations (principal_type, principal_id, target_id)
// ============================================================================

/// Prefix covering every principal of a type
#[inline]
pub fn principal_type_prefix(principal_type: &str) -> Result<Vec<u8>> {
    build_key(&[principal_type])
}

/// Prefix covering every association of one principal
pub fn principal_prefix(principal_type: &str, id: u64) -> Result<Vec<u8>> {
    let mut k = principal_type_prefix(principal_type)?;
    k.extend_from_slice(&id.to_be_bytes());
    Ok(k)
}

pub fn association_key(principal_type: &str, id: u64, target: u64) -> Result<Vec<u8>> {
    let mut k = principal_prefix(principal_type, id)?;
    k.extend_from_slice(&target.to_be_bytes());
    Ok(k)
}

/// Parse an association key into `(principal_type, principal_id, target_id)`
pub fn parse_association(bytes: &[u8]) -> Option<(&str, u64, u64)> {
    let (principal_type, at) = read_part(bytes, 0)?;
    if bytes.len() != at + 16 {
        return None;
    }
    Some((principal_type, read_u64(bytes, at)?, read_u64(bytes, at + 8)?))
}
