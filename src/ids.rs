//! Identifier generation — unbounded base-32 counters
//!
//! Ids are strings over the alphabet `A..Z 2..7`, least significant digit
//! first: `A, B, …, Z, 2, …, 7, AA, BA, …`. Counters never wrap, so a
//! generator that has observed every loaded id can never hand out a
//! duplicate.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Opaque identifier of a node, graph, or slice
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

pub type NodeId = EntityId;
pub type GraphId = EntityId;

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A single monotonically increasing counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdCounter {
    /// Digits, least significant first
    digits: Vec<u8>,
}

impl Default for IdCounter {
    fn default() -> Self {
        Self { digits: vec![b'A'] }
    }
}

impl IdCounter {
    /// Parse a counter value; `None` if the text is not a valid id
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() || !text.bytes().all(Self::is_digit) {
            return None;
        }
        Some(Self {
            digits: text.as_bytes().to_vec(),
        })
    }

    fn is_digit(c: u8) -> bool {
        c.is_ascii_uppercase() || (b'2'..=b'7').contains(&c)
    }

    /// Digits `2..7` sort after `Z`
    fn rank(c: u8) -> u32 {
        if c < b'A' {
            c as u32 + b'Z' as u32
        } else {
            c as u32
        }
    }

    pub fn current(&self) -> String {
        // digits are ASCII by construction
        self.digits.iter().map(|&c| c as char).collect()
    }

    fn increment(&mut self) {
        let mut i = 0;
        loop {
            if i == self.digits.len() {
                self.digits.push(b'A');
                return;
            }
            match self.digits[i] {
                b'Z' => {
                    self.digits[i] = b'2';
                    return;
                }
                b'7' => {
                    self.digits[i] = b'A';
                    i += 1;
                }
                c => {
                    self.digits[i] = c + 1;
                    return;
                }
            }
        }
    }

    /// Return the current value and advance
    pub fn next_value(&mut self) -> String {
        let value = self.current();
        self.increment();
        value
    }

    /// Advance past an externally produced id so it is never reissued
    pub fn observe(&mut self, text: &str) {
        if let Some(seen) = Self::parse(text) {
            if seen >= *self {
                *self = seen;
                self.increment();
            }
        }
    }
}

impl PartialOrd for IdCounter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IdCounter {
    fn cmp(&self, other: &Self) -> Ordering {
        self.digits.len().cmp(&other.digits.len()).then_with(|| {
            self.digits
                .iter()
                .rev()
                .map(|&c| Self::rank(c))
                .cmp(other.digits.iter().rev().map(|&c| Self::rank(c)))
        })
    }
}

/// Independent counters for every kind of entity
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    nodes: IdCounter,
    graphs: IdCounter,
    slices: IdCounter,
    unique_tags: IdCounter,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_node(&mut self) -> NodeId {
        EntityId(self.nodes.next_value())
    }

    pub fn next_graph(&mut self) -> GraphId {
        EntityId(self.graphs.next_value())
    }

    pub fn next_slice(&mut self) -> EntityId {
        EntityId(self.slices.next_value())
    }

    /// Fresh value for a unique-tag parameter
    pub fn next_unique_tag(&mut self) -> String {
        format!("u{}", self.unique_tags.next_value())
    }

    pub fn observe_node(&mut self, id: &NodeId) {
        self.nodes.observe(id.as_str());
    }

    pub fn observe_graph(&mut self, id: &GraphId) {
        self.graphs.observe(id.as_str());
    }

    pub fn observe_slice(&mut self, id: &EntityId) {
        self.slices.observe(id.as_str());
    }

    pub fn observe_unique_tag(&mut self, value: &str) {
        if let Some(digits) = value.strip_prefix('u') {
            self.unique_tags.observe(digits);
        }
    }
}
