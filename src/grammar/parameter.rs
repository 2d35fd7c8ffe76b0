//! Parameter — typed slots of a macro
//!
//! Data parameters produce tag values. Structural parameters produce edges
//! (inner/outer labels) or identity values (unique tags, self references).

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A named slot in a macro definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(flatten)]
    pub kind: ParameterKind,
}

/// What a parameter holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterKind {
    /// A value drawn from a data type
    Data(DataType),
    /// Reference to another node of the same subsection graph
    InnerLabel(InnerLabelFlags),
    /// Reference to the prologue of a subsection graph anywhere in the genome
    OuterLabel { targets: Vec<LabelTarget> },
    /// A value never shared with any other node
    UniqueTag,
    /// The node's own identifier
    SelfRef,
}

impl ParameterKind {
    pub fn is_label(&self) -> bool {
        matches!(self, Self::InnerLabel(_) | Self::OuterLabel { .. })
    }
}

/// Which targets an inner label may point to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InnerLabelFlags {
    /// The subsection prologue
    pub prologue: bool,
    /// The subsection epilogue
    pub epilogue: bool,
    /// The source node itself
    pub itself: bool,
    /// Body nodes before the source
    pub backward: bool,
    /// Body nodes after the source
    pub forward: bool,
}

impl Default for InnerLabelFlags {
    fn default() -> Self {
        Self {
            prologue: false,
            epilogue: false,
            itself: false,
            backward: false,
            forward: true,
        }
    }
}

impl InnerLabelFlags {
    /// Whether `target` is a legal destination for a label on `source`
    /// inside a bounded slice of `len` nodes
    pub fn admits(&self, source: usize, target: usize, len: usize) -> bool {
        if target >= len {
            return false;
        }
        if target == source {
            return self.itself;
        }
        if target == 0 {
            return self.prologue;
        }
        if target == len - 1 {
            return self.epilogue;
        }
        if target < source {
            self.backward
        } else {
            self.forward
        }
    }
}

/// A subsection an outer label may point into
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelTarget {
    pub section: String,
    pub subsection: String,
}

/// Value domains of data parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataType {
    /// Integer in `[min, max)`
    Integer { min: i64, max: i64 },
    /// Float in `[min, max)`
    Float { min: f64, max: f64 },
    /// One of a fixed list
    Constant { values: Vec<String> },
    /// Bit string; `-` positions are random, others fixed
    BitArray { pattern: String },
    /// A permutation of all values joined by a delimiter
    Combinatorial { values: Vec<String>, delimiter: String },
    /// Value of an environment variable at construction time
    Environment { variable: String },
}

impl DataType {
    pub fn randomize<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        match self {
            DataType::Integer { min, max } => rng.gen_range(*min..*max).to_string(),
            DataType::Float { min, max } => rng.gen_range(*min..*max).to_string(),
            DataType::Constant { values } => values.choose(rng).cloned().unwrap_or_default(),
            DataType::BitArray { pattern } => pattern
                .chars()
                .map(|c| match c {
                    '-' => {
                        if rng.gen_bool(0.5) {
                            '1'
                        } else {
                            '0'
                        }
                    }
                    fixed => fixed,
                })
                .collect(),
            DataType::Combinatorial { values, delimiter } => {
                let mut shuffled = values.clone();
                shuffled.shuffle(rng);
                shuffled.join(delimiter)
            }
            DataType::Environment { variable } => std::env::var(variable).unwrap_or_default(),
        }
    }

    pub fn validate(&self, value: &str) -> bool {
        match self {
            DataType::Integer { min, max } => value
                .parse::<i64>()
                .map(|v| v >= *min && v < *max)
                .unwrap_or(false),
            DataType::Float { min, max } => value
                .parse::<f64>()
                .map(|v| v >= *min && v < *max)
                .unwrap_or(false),
            DataType::Constant { values } => values.iter().any(|v| v == value),
            DataType::BitArray { pattern } => {
                value.len() == pattern.len()
                    && pattern.chars().zip(value.chars()).all(|(p, v)| match p {
                        '-' => v == '0' || v == '1',
                        fixed => v == fixed,
                    })
            }
            DataType::Combinatorial { values, delimiter } => {
                if delimiter.is_empty() {
                    return values.iter().any(|v| v == value);
                }
                value.split(delimiter.as_str()).all(|t| values.iter().any(|v| v == t))
            }
            DataType::Environment { .. } => true,
        }
    }

    /// Bucketed rendering of a value, so near-identical floats hash alike
    pub fn quantize(&self, value: &str, quanta: u32) -> String {
        match self {
            DataType::Float { min, max } if quanta > 0 && max > min => {
                let quantum = (max - min) / quanta as f64;
                match value.parse::<f64>() {
                    Ok(v) => format!("{}", (v / quantum).floor() as i64),
                    Err(_) => value.to_string(),
                }
            }
            _ => value.to_string(),
        }
    }

    /// Describe why the type definition itself is unusable
    pub(crate) fn check(&self) -> Option<String> {
        match self {
            DataType::Integer { min, max } if min >= max => {
                Some(format!("integer range [{min}, {max}) is empty"))
            }
            DataType::Float { min, max } if !(min < max) => {
                Some(format!("float range [{min}, {max}) is empty"))
            }
            DataType::Constant { values } | DataType::Combinatorial { values, .. }
                if values.is_empty() =>
            {
                Some("no values declared".to_string())
            }
            DataType::BitArray { pattern }
                if pattern.is_empty() || !pattern.chars().all(|c| matches!(c, '0' | '1' | '-')) =>
            {
                Some(format!("bit pattern '{pattern}' must use only 0, 1 and -"))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_parameter_json_shape() {
        let json = r#"[
            {"name": "n", "kind": "data", "type": "integer", "min": 0, "max": 4},
            {"name": "to", "kind": "inner_label", "backward": true, "forward": false},
            {"name": "fn", "kind": "outer_label", "targets": [{"section": "lib", "subsection": "func"}]},
            {"name": "u", "kind": "unique_tag"},
            {"name": "me", "kind": "self_ref"}
        ]"#;
        let params: Vec<Parameter> = serde_json::from_str(json).unwrap();
        assert_eq!(params[0].kind, ParameterKind::Data(DataType::Integer { min: 0, max: 4 }));
        match &params[1].kind {
            ParameterKind::InnerLabel(flags) => {
                assert!(flags.backward);
                assert!(!flags.forward);
                assert!(!flags.epilogue);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(params[2].kind.is_label());
        assert_eq!(params[3].kind, ParameterKind::UniqueTag);
        assert_eq!(params[4].kind, ParameterKind::SelfRef);
    }

    #[test]
    fn test_randomize_validates() {
        let mut rng = StdRng::seed_from_u64(11);
        let types = vec![
            DataType::Integer { min: -3, max: 3 },
            DataType::Float { min: 0.0, max: 1.0 },
            DataType::Constant { values: vec!["r0".into(), "r1".into()] },
            DataType::BitArray { pattern: "1-0-".into() },
            DataType::Combinatorial {
                values: vec!["a".into(), "b".into(), "c".into()],
                delimiter: ",".into(),
            },
        ];
        for ty in &types {
            for _ in 0..50 {
                let value = ty.randomize(&mut rng);
                assert!(ty.validate(&value), "{value} rejected by {ty:?}");
            }
        }
    }

    #[test]
    fn test_integer_upper_bound_is_exclusive() {
        let ty = DataType::Integer { min: 0, max: 2 };
        assert!(ty.validate("1"));
        assert!(!ty.validate("2"));
        assert!(!ty.validate("x"));
    }

    #[test]
    fn test_bit_array_fixed_positions() {
        let ty = DataType::BitArray { pattern: "1-".into() };
        assert!(ty.validate("10"));
        assert!(!ty.validate("00"));
        assert!(!ty.validate("1"));
    }

    #[test]
    fn test_quantize_float() {
        let ty = DataType::Float { min: 0.0, max: 42.0 };
        assert_eq!(ty.quantize("3.2", 42), "3");
        assert_eq!(ty.quantize("3.9", 42), "3");
        let int = DataType::Integer { min: 0, max: 10 };
        assert_eq!(int.quantize("7", 42), "7");
    }

    #[test]
    fn test_inner_flags() {
        let forward = InnerLabelFlags { epilogue: true, ..InnerLabelFlags::default() };
        // P B1 B2 B3 E
        assert!(forward.admits(1, 2, 5));
        assert!(forward.admits(1, 4, 5));
        assert!(!forward.admits(2, 1, 5));
        assert!(!forward.admits(2, 2, 5));
        assert!(!forward.admits(2, 0, 5));
        assert!(!forward.admits(2, 5, 5));
    }

    #[test]
    fn test_check_rejects_empty_ranges() {
        assert!(DataType::Integer { min: 3, max: 3 }.check().is_some());
        assert!(DataType::Float { min: 1.0, max: 0.5 }.check().is_some());
        assert!(DataType::BitArray { pattern: "1x".into() }.check().is_some());
        assert!(DataType::Integer { min: 0, max: 3 }.check().is_none());
    }
}
