//! Normalized references to groups and permissions.
//!
//! Callers may name a group by its name, its id or the row itself, alone, as a
//! list, or as a `"a|b"` pipe string. Everything is funneled into
//! [`Reference`] / [`RefList`] at the boundary so the engine resolves one shape.

use crate::constants::PIPE;
use crate::model::{Group, Permission};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference<T> {
    Name(String),
    Id(u64),
    Value(T),
}

pub type GroupRef = Reference<Group>;
pub type PermissionRef = Reference<Permission>;

impl<T> Reference<T> {
    /// An empty name stands for "nothing" and is skipped by assign/sync
    pub fn is_blank(&self) -> bool {
        matches!(self, Reference::Name(n) if n.trim().is_empty())
    }
}

impl<T> From<&str> for Reference<T> {
    fn from(name: &str) -> Self {
        Reference::Name(name.to_string())
    }
}

impl<T> From<String> for Reference<T> {
    fn from(name: String) -> Self {
        Reference::Name(name)
    }
}

impl<T> From<&String> for Reference<T> {
    fn from(name: &String) -> Self {
        Reference::Name(name.clone())
    }
}

impl<T> From<u64> for Reference<T> {
    fn from(id: u64) -> Self {
        Reference::Id(id)
    }
}

impl From<Group> for GroupRef {
    fn from(g: Group) -> Self {
        Reference::Value(g)
    }
}

impl From<&Group> for GroupRef {
    fn from(g: &Group) -> Self {
        Reference::Value(g.clone())
    }
}

impl From<Permission> for PermissionRef {
    fn from(p: Permission) -> Self {
        Reference::Value(p)
    }
}

impl From<&Permission> for PermissionRef {
    fn from(p: &Permission) -> Self {
        Reference::Value(p.clone())
    }
}

/// A flattened list of references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefList<T>(pub Vec<Reference<T>>);

impl<T> RefList<T> {
    pub fn new() -> Self {
        RefList(Vec::new())
    }

    /// Split a pipe string into names.
    ///
    /// A leading `'` or `"` is stripped from both ends first (`"'a|b'"`, `"'a|b"`),
    /// each entry is trimmed and empty entries are dropped.
    pub fn parse(s: &str) -> Self {
        RefList(split_pipe(s).into_iter().map(Reference::Name).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reference<T>> {
        self.0.iter()
    }

    pub fn push(&mut self, r: impl Into<Reference<T>>) {
        self.0.push(r.into());
    }

    /// Append another list (variadic call sites flatten through this)
    pub fn extend(&mut self, other: RefList<T>) {
        self.0.extend(other.0);
    }

    /// Display labels, as used in authorization error details
    pub fn labels(&self) -> Vec<String>
    where
        T: Labeled,
    {
        self.0
            .iter()
            .map(|r| match r {
                Reference::Name(n) => n.clone(),
                Reference::Id(id) => id.to_string(),
                Reference::Value(v) => v.label().to_string(),
            })
            .collect()
    }
}

impl<T> Default for RefList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntoIterator for RefList<T> {
    type Item = Reference<T>;
    type IntoIter = std::vec::IntoIter<Reference<T>>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<T> From<Reference<T>> for RefList<T> {
    fn from(r: Reference<T>) -> Self {
        RefList(vec![r])
    }
}

/// A single string is a pipe list when it contains `|`, otherwise one name
impl<T> From<&str> for RefList<T> {
    fn from(s: &str) -> Self {
        if s.contains(PIPE) {
            RefList::parse(s)
        } else {
            RefList(vec![Reference::Name(s.to_string())])
        }
    }
}

impl<T> From<String> for RefList<T> {
    fn from(s: String) -> Self {
        RefList::from(s.as_str())
    }
}

impl<T> From<u64> for RefList<T> {
    fn from(id: u64) -> Self {
        RefList(vec![Reference::Id(id)])
    }
}

impl From<Group> for RefList<Group> {
    fn from(g: Group) -> Self {
        RefList(vec![Reference::Value(g)])
    }
}

impl From<&Group> for RefList<Group> {
    fn from(g: &Group) -> Self {
        RefList(vec![Reference::Value(g.clone())])
    }
}

impl From<Permission> for RefList<Permission> {
    fn from(p: Permission) -> Self {
        RefList(vec![Reference::Value(p)])
    }
}

impl From<&Permission> for RefList<Permission> {
    fn from(p: &Permission) -> Self {
        RefList(vec![Reference::Value(p.clone())])
    }
}

impl<T, R: Into<Reference<T>>> From<Vec<R>> for RefList<T> {
    fn from(v: Vec<R>) -> Self {
        RefList(v.into_iter().map(Into::into).collect())
    }
}

impl<T, R: Into<Reference<T>> + Clone> From<&[R]> for RefList<T> {
    fn from(v: &[R]) -> Self {
        RefList(v.iter().cloned().map(Into::into).collect())
    }
}

impl<T, R: Into<Reference<T>>, const N: usize> From<[R; N]> for RefList<T> {
    fn from(v: [R; N]) -> Self {
        RefList(v.into_iter().map(Into::into).collect())
    }
}

impl<T> FromIterator<Reference<T>> for RefList<T> {
    fn from_iter<I: IntoIterator<Item = Reference<T>>>(iter: I) -> Self {
        RefList(iter.into_iter().collect())
    }
}

/// Rows that can be shown by name in diagnostics
pub trait Labeled {
    fn label(&self) -> &str;
}

impl Labeled for Group {
    fn label(&self) -> &str {
        &self.name
    }
}

impl Labeled for Permission {
    fn label(&self) -> &str {
        &self.name
    }
}

pub(crate) fn split_pipe(s: &str) -> Vec<String> {
    let s = s.trim();
    // a leading quote is stripped from both ends, whether or not it is closed
    let inner = match s.chars().next() {
        Some(quote @ ('\'' | '"')) if s.len() > 2 => s.trim_matches(quote),
        _ => s,
    };
    inner
        .split(PIPE)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
