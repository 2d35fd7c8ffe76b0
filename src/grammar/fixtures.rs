//! Grammars shared by the test suites

use super::Grammar;
use std::sync::Arc;

/// One subsection of one to three `branch` macros, each with two
/// forward-only, epilogue-valid inner labels
pub fn scenario_a() -> Arc<Grammar> {
    Grammar::from_json(
        r#"{
            "name": "scenario-a",
            "sections": [{
                "name": "main",
                "subsections": [{
                    "name": "body",
                    "min_macros": 1, "max_macros": 3,
                    "average_macros": 2.0, "sigma": 0.5,
                    "macros": [{
                        "id": "branch",
                        "parameters": [
                            {"name": "then", "kind": "inner_label", "forward": true, "epilogue": true},
                            {"name": "else", "kind": "inner_label", "forward": true, "epilogue": true}
                        ],
                        "expression": ["br ", {"param": "then"}, ", ", {"param": "else"}, "\n"]
                    }]
                }]
            }]
        }"#,
    )
    .expect("scenario-a grammar")
}

/// A small assembly-like language: a `main` section of straight-line code
/// with jumps and calls, and a `funcs` section of two or three functions
pub fn program() -> Arc<Grammar> {
    Grammar::from_json(
        r#"{
            "name": "program",
            "prologue": {"expression": ["; begin\n"]},
            "epilogue": {"expression": ["; end\n"]},
            "sections": [
                {
                    "name": "main",
                    "prologue": {"expression": ["main:\n"]},
                    "epilogue": {"expression": ["halt\n"]},
                    "subsections": [{
                        "name": "code",
                        "min_macros": 3, "max_macros": 8,
                        "average_macros": 5.0, "sigma": 1.5,
                        "epilogue": {"expression": ["nop\n"]},
                        "macros": [
                            {
                                "id": "add", "weight": 3.0,
                                "parameters": [
                                    {"name": "dst", "kind": "data", "type": "constant", "values": ["r0", "r1", "r2"]},
                                    {"name": "val", "kind": "data", "type": "integer", "min": 0, "max": 100}
                                ],
                                "expression": ["add ", {"param": "dst"}, ", ", {"param": "val"}, "\n"]
                            },
                            {
                                "id": "scale",
                                "parameters": [
                                    {"name": "dst", "kind": "data", "type": "constant", "values": ["r0", "r1", "r2"]},
                                    {"name": "k", "kind": "data", "type": "float", "min": 0.0, "max": 1.0}
                                ],
                                "expression": ["mul ", {"param": "dst"}, ", ", {"param": "k"}, "\n"]
                            },
                            {
                                "id": "jmp",
                                "parameters": [
                                    {"name": "to", "kind": "inner_label", "forward": true, "epilogue": true}
                                ],
                                "expression": ["jmp ", {"param": "to"}, "\n"]
                            },
                            {
                                "id": "loop",
                                "parameters": [
                                    {"name": "to", "kind": "inner_label", "forward": false, "backward": true, "prologue": true}
                                ],
                                "expression": ["jnz ", {"param": "to"}, "\n"]
                            },
                            {
                                "id": "call",
                                "parameters": [
                                    {"name": "fn", "kind": "outer_label", "targets": [{"section": "funcs", "subsection": "func"}]}
                                ],
                                "expression": ["call ", {"param": "fn"}, "\n"]
                            },
                            {
                                "id": "mark", "weight": 0.5,
                                "parameters": [
                                    {"name": "u", "kind": "unique_tag"},
                                    {"name": "me", "kind": "self_ref"}
                                ],
                                "expression": ["; mark ", {"param": "u"}, " at ", {"param": "me"}, "\n"]
                            }
                        ]
                    }]
                },
                {
                    "name": "funcs",
                    "subsections": [{
                        "name": "func",
                        "min_instances": 2, "max_instances": 3,
                        "min_macros": 1, "max_macros": 3,
                        "epilogue": {"expression": ["ret\n"]},
                        "macros": [
                            {
                                "id": "inc",
                                "parameters": [{"name": "r", "kind": "data", "type": "constant", "values": ["r0", "r1"]}],
                                "expression": ["inc ", {"param": "r"}, "\n"]
                            },
                            {
                                "id": "dec",
                                "parameters": [{"name": "r", "kind": "data", "type": "constant", "values": ["r0", "r1"]}],
                                "expression": ["dec ", {"param": "r"}, "\n"]
                            }
                        ]
                    }]
                }
            ]
        }"#,
    )
    .expect("program grammar")
}

/// `calls` call nodes in `main`, two functions each accepting one caller
pub fn capped(calls: usize) -> Arc<Grammar> {
    let json = format!(
        r#"{{
            "name": "capped",
            "sections": [
                {{
                    "name": "main",
                    "subsections": [{{
                        "name": "code",
                        "min_macros": {calls}, "max_macros": {calls},
                        "macros": [{{
                            "id": "call",
                            "parameters": [
                                {{"name": "fn", "kind": "outer_label", "targets": [{{"section": "funcs", "subsection": "func"}}]}}
                            ],
                            "expression": ["call ", {{"param": "fn"}}, "\n"]
                        }}]
                    }}]
                }},
                {{
                    "name": "funcs",
                    "subsections": [{{
                        "name": "func",
                        "min_instances": 2, "max_instances": 2,
                        "min_macros": 1, "max_macros": 1,
                        "max_references": 1,
                        "macros": [{{
                            "id": "inc",
                            "parameters": [{{"name": "r", "kind": "data", "type": "constant", "values": ["r0", "r1"]}}],
                            "expression": ["inc ", {{"param": "r"}}, "\n"]
                        }}]
                    }}]
                }}
            ]
        }}"#
    );
    Grammar::from_json(&json).expect("capped grammar")
}

/// Fixed-size straight-line code for slice editing: every body node is an
/// `op` with a forward/backward inner label and an integer operand
pub fn editing(min: usize, max: usize) -> Arc<Grammar> {
    let json = format!(
        r#"{{
            "name": "editing",
            "sections": [{{
                "name": "main",
                "subsections": [{{
                    "name": "code",
                    "min_macros": {min}, "max_macros": {max},
                    "sigma": 0.0,
                    "macros": [{{
                        "id": "op",
                        "parameters": [
                            {{"name": "v", "kind": "data", "type": "integer", "min": 0, "max": 1000}},
                            {{"name": "to", "kind": "inner_label", "forward": true, "backward": true, "epilogue": true}}
                        ],
                        "expression": ["op ", {{"param": "v"}}, " ", {{"param": "to"}}, "\n"]
                    }}]
                }}]
            }}]
        }}"#
    );
    Grammar::from_json(&json).expect("editing grammar")
}

/// One call in `main` whose target subsection is rendered inline
pub fn expanded() -> Arc<Grammar> {
    Grammar::from_json(
        r#"{
            "name": "expanded",
            "label_format": "{}:",
            "sections": [
                {
                    "name": "main",
                    "subsections": [{
                        "name": "code",
                        "min_macros": 1, "max_macros": 1,
                        "macros": [{
                            "id": "call",
                            "parameters": [
                                {"name": "fn", "kind": "outer_label", "targets": [{"section": "lib", "subsection": "inline"}]}
                            ],
                            "expression": ["call ", {"param": "fn"}, "\n"]
                        }]
                    }]
                },
                {
                    "name": "lib",
                    "subsections": [{
                        "name": "inline",
                        "expand": true,
                        "max_references": 1,
                        "min_macros": 1, "max_macros": 1,
                        "macros": [{"id": "inc", "expression": ["inc"]}]
                    }]
                }
            ]
        }"#,
    )
    .expect("expanded grammar")
}
