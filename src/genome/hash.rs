//! Structural hashing, equality, and diversity messages
//!
//! Hashes are djb2 over 64 bits, folded bottom-up. A node contributes its
//! macro, its data values, and the offsets of its inner labels. Outer label
//! targets, unique tags, and self references never enter a hash, so clones
//! that differ only there hash alike.

use super::container::Genome;
use super::edge::LabelKind;
use super::node::MacroNode;
use super::section_graph::SectionGraph;
use super::slice::Slice;
use super::subgraph::SubsectionGraph;
use crate::context::EngineConfig;
use crate::grammar::ParameterKind;
use std::collections::HashMap;
use std::ops::{AddAssign, SubAssign};

pub const HASH_SEED: u64 = 5381;

pub fn djb_bytes(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash = (hash << 5).wrapping_add(hash) ^ b as u64;
    }
    hash
}

pub fn djb_str(hash: u64, text: &str) -> u64 {
    djb_bytes(hash, text.as_bytes())
}

/// Fold a 64-bit value, least significant byte first
pub fn djb_u64(hash: u64, value: u64) -> u64 {
    djb_bytes(hash, &value.to_le_bytes())
}

/// What the hash is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashPurpose {
    /// Exact values; used for equality
    Genotype,
    /// Float values bucketed into the given number of quanta; used for
    /// diversity
    Entropy(u32),
}

/// Offset of every inner label, in parameter order
fn inner_offsets(node: &MacroNode, slice: Option<(&Slice, usize)>) -> Vec<Option<isize>> {
    node.edges()
        .iter()
        .filter(|e| e.kind() == LabelKind::Inner)
        .map(|edge| match (edge.target(), slice) {
            (Some(target), Some((slice, position))) => slice.offset(position, target),
            _ => edge.hint().and_then(|h| h.offset),
        })
        .collect()
}

fn node_hash(node: &MacroNode, slice: Option<(&Slice, usize)>, purpose: HashPurpose) -> u64 {
    let def = node.def();
    let mut hash = djb_str(HASH_SEED, &def.path);
    let mut offsets = inner_offsets(node, slice).into_iter();
    for param in &def.parameters {
        match &param.kind {
            ParameterKind::Data(ty) => {
                let value = node.tag(&param.name).map(|t| t.value.as_str()).unwrap_or("");
                let text = match purpose {
                    HashPurpose::Genotype => value.to_string(),
                    HashPurpose::Entropy(quanta) => ty.quantize(value, quanta),
                };
                hash = djb_str(hash, &format!("{}={}", param.name, text));
            }
            ParameterKind::InnerLabel(_) => {
                let text = match offsets.next().flatten() {
                    Some(offset) => format!("{}@{}", param.name, offset),
                    None => format!("{}@?", param.name),
                };
                hash = djb_str(hash, &text);
            }
            ParameterKind::OuterLabel { .. } | ParameterKind::UniqueTag | ParameterKind::SelfRef => {}
        }
    }
    hash
}

/// Same macro, same data values, same inner offsets
fn same_node(a: &MacroNode, a_slice: Option<(&Slice, usize)>, b: &MacroNode, b_slice: Option<(&Slice, usize)>) -> bool {
    if a.def().path != b.def().path {
        return false;
    }
    for param in &a.def().parameters {
        if let ParameterKind::Data(_) = param.kind {
            if a.tag(&param.name).map(|t| &t.value) != b.tag(&param.name).map(|t| &t.value) {
                return false;
            }
        }
    }
    inner_offsets(a, a_slice) == inner_offsets(b, b_slice)
}

impl Slice {
    pub fn node_hash(&self, position: usize, purpose: HashPurpose) -> u64 {
        node_hash(self.node(position), Some((self, position)), purpose)
    }
}

impl SubsectionGraph {
    pub fn hash(&self, purpose: HashPurpose) -> u64 {
        let slice = self.slice();
        (0..slice.len()).fold(HASH_SEED, |h, p| djb_u64(h, slice.node_hash(p, purpose)))
    }

    fn same_structure(&self, other: &Self) -> bool {
        let (a, b) = (self.slice(), other.slice());
        self.def().section == other.def().section
            && self.def().name == other.def().name
            && a.len() == b.len()
            && (0..a.len()).all(|p| same_node(a.node(p), Some((a, p)), b.node(p), Some((b, p))))
    }

    /// Hash comparison first, full structural comparison on a match
    pub fn equals(&self, other: &Self) -> bool {
        self.hash(HashPurpose::Genotype) == other.hash(HashPurpose::Genotype) && self.same_structure(other)
    }
}

impl SectionGraph {
    pub fn hash(&self, purpose: HashPurpose) -> u64 {
        let mut hash = djb_u64(HASH_SEED, node_hash(self.prologue(), None, purpose));
        for subgraph in self.subgraphs() {
            hash = djb_u64(hash, subgraph.hash(purpose));
        }
        djb_u64(hash, node_hash(self.epilogue(), None, purpose))
    }

    fn same_structure(&self, other: &Self) -> bool {
        self.def().name == other.def().name
            && same_node(self.prologue(), None, other.prologue(), None)
            && same_node(self.epilogue(), None, other.epilogue(), None)
            && self.subgraphs().len() == other.subgraphs().len()
            && self
                .subgraphs()
                .iter()
                .zip(other.subgraphs())
                .all(|(a, b)| a.same_structure(b))
    }

    pub fn equals(&self, other: &Self) -> bool {
        self.hash(HashPurpose::Genotype) == other.hash(HashPurpose::Genotype) && self.same_structure(other)
    }
}

impl Genome {
    pub fn hash(&self, purpose: HashPurpose) -> u64 {
        let mut hash = djb_u64(HASH_SEED, node_hash(self.prologue(), None, purpose));
        for section in self.sections() {
            hash = djb_u64(hash, section.hash(purpose));
        }
        djb_u64(hash, node_hash(self.epilogue(), None, purpose))
    }

    pub fn equals(&self, other: &Self) -> bool {
        if self.hash(HashPurpose::Genotype) != other.hash(HashPurpose::Genotype) {
            return false;
        }
        self.grammar().name == other.grammar().name
            && same_node(self.prologue(), None, other.prologue(), None)
            && same_node(self.epilogue(), None, other.epilogue(), None)
            && self.sections().len() == other.sections().len()
            && self
                .sections()
                .iter()
                .zip(other.sections())
                .all(|(a, b)| a.same_structure(b))
    }

    /// Diversity symbols of this individual
    ///
    /// Per section, one sequence of subgraph hashes and one of node hashes,
    /// each expanded into positional symbols and n-grams.
    pub fn diversity_message(&self, config: &EngineConfig) -> Message {
        let purpose = HashPurpose::Entropy(config.entropy_quanta);
        let mut message = Message::new();
        for section in self.sections() {
            let subgraphs: Vec<u64> = section.subgraphs().iter().map(|g| g.hash(purpose)).collect();
            let nodes: Vec<u64> = section
                .subgraphs()
                .iter()
                .flat_map(|g| {
                    let slice = g.slice();
                    (0..slice.len()).map(move |p| slice.node_hash(p, purpose))
                })
                .collect();
            message.extend_sequence(&subgraphs, config.max_ngram);
            message.extend_sequence(&nodes, config.max_ngram);
        }
        message
    }
}

/// A multiset of symbols
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    symbols: HashMap<u64, u64>,
    total: u64,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: u64) {
        *self.symbols.entry(symbol).or_insert(0) += 1;
        self.total += 1;
    }

    /// Positional symbols plus every n-gram up to `max_ngram`
    pub fn extend_sequence(&mut self, sequence: &[u64], max_ngram: usize) {
        for (i, &h) in sequence.iter().enumerate() {
            self.insert(djb_u64(h, i as u64));
        }
        for n in 2..=max_ngram {
            for window in sequence.windows(n) {
                let gram = window[1..].iter().fold(window[0], |h, &x| djb_u64(h, x));
                self.insert(gram);
            }
        }
    }

    pub fn from_sequence(sequence: &[u64], max_ngram: usize) -> Self {
        let mut message = Self::new();
        message.extend_sequence(sequence, max_ngram);
        message
    }

    /// Number of symbols, duplicates counted
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn distinct(&self) -> usize {
        self.symbols.len()
    }

    pub fn count(&self, symbol: u64) -> u64 {
        self.symbols.get(&symbol).copied().unwrap_or(0)
    }

    /// Shannon entropy in nats
    pub fn entropy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let total = self.total as f64;
        -self
            .symbols
            .values()
            .map(|&n| {
                let p = n as f64 / total;
                p * p.ln()
            })
            .sum::<f64>()
    }

    /// Entropy lost if `individual` were taken out of this population
    pub fn delta_entropy(&self, individual: &Message) -> f64 {
        let mut rest = self.clone();
        rest -= individual;
        self.entropy() - rest.entropy()
    }
}

impl AddAssign<&Message> for Message {
    fn add_assign(&mut self, other: &Message) {
        for (&symbol, &n) in &other.symbols {
            *self.symbols.entry(symbol).or_insert(0) += n;
        }
        self.total += other.total;
    }
}

impl SubAssign<&Message> for Message {
    fn sub_assign(&mut self, other: &Message) {
        for (&symbol, &n) in &other.symbols {
            if let Some(mine) = self.symbols.get_mut(&symbol) {
                let removed = n.min(*mine);
                *mine -= removed;
                self.total -= removed;
                if *mine == 0 {
                    self.symbols.remove(&symbol);
                }
            }
        }
    }
}
