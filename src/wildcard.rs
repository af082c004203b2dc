//! Dot-segment wildcard permissions.
//!
//! `posts.*` implies `posts`, `posts.create` and `posts.edit.123`.
//! `articles.*.test` implies `articles.42.test` and nothing longer.
//! A segment is either a literal or exactly `*`; `po*` is a literal.

use crate::constants::{PART_DELIMITER, WILDCARD_TOKEN};
use crate::model::Permission;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Any,
}

/// A parsed permission pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardPattern {
    segments: Vec<Segment>,
}

impl WildcardPattern {
    /// Returns `None` for empty input or empty segments (`a..b`, `.a`, `a.`)
    pub fn parse(pattern: &str) -> Option<Self> {
        if pattern.is_empty() {
            return None;
        }
        let mut segments = Vec::new();
        for part in pattern.split(PART_DELIMITER) {
            if part.is_empty() {
                return None;
            }
            segments.push(if part == WILDCARD_TOKEN {
                Segment::Any
            } else {
                Segment::Literal(part.to_string())
            });
        }
        Some(WildcardPattern { segments })
    }

    /// Does this pattern grant `requested`?
    pub fn implies(&self, requested: &str) -> bool {
        if requested.is_empty() {
            return false;
        }
        let parts: Vec<&str> = requested.split(PART_DELIMITER).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return false;
        }

        let last = self.segments.len() - 1;
        for (i, seg) in self.segments.iter().enumerate() {
            let trailing_any = i == last && *seg == Segment::Any;
            match parts.get(i) {
                // trailing `*` swallows whatever is left, including nothing
                _ if trailing_any => return true,
                None => return false,
                Some(part) => {
                    if let Segment::Literal(lit) = seg {
                        if lit != part {
                            return false;
                        }
                    }
                }
            }
        }
        parts.len() == self.segments.len()
    }
}

/// True when `pattern` grants `requested`. Invalid patterns grant nothing.
pub fn pattern_implies(pattern: &str, requested: &str) -> bool {
    WildcardPattern::parse(pattern).is_some_and(|p| p.implies(requested))
}

/// Check `requested` against held permissions of `guard` only.
///
/// Stops at the first pattern that grants it.
pub fn matches<'a, I>(held: I, requested: &str, guard: &str) -> bool
where
    I: IntoIterator<Item = &'a Permission>,
{
    held.into_iter()
        .filter(|p| p.guard_name == guard)
        .any(|p| pattern_implies(&p.name, requested))
}
