//! Binary-level tests of the `compilation` subcommand, backed by an oracle
//! reader of the d4 output format that recounts the models of the emitted
//! file and asserts the decomposability and determinism of its nodes.

use assert_cmd::{assert::Assert, Command};
use predicates::prelude::predicate;
use std::io::Write;
use tempfile::NamedTempFile;

fn create_tempfile(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn create_command(input_file: &NamedTempFile, additional_args: &[&str]) -> Assert {
    Command::cargo_bin("sharpdnnf_rs")
        .unwrap()
        .args([
            "compilation",
            "--logging-level",
            "off",
            "-i",
            input_file.path().as_os_str().to_str().unwrap(),
        ])
        .args(additional_args)
        .assert()
}

fn compile_to_string(instance: &str) -> String {
    let input = create_tempfile(instance);
    let output = NamedTempFile::new().unwrap();
    let output_path = output.path().as_os_str().to_str().unwrap().to_owned();
    create_command(&input, &["--output", &output_path]).success();
    std::fs::read_to_string(output.path()).unwrap()
}

#[test]
fn test_compilation_counts_like_the_counter() {
    let file = create_tempfile("p cnf 3 2\n1 2 0\n-1 3 0\n");
    let assert = create_command(&file, &[]);
    assert.success().stdout(predicate::eq("s 4\n"));
    std::mem::drop(file);
}

#[test]
fn test_compilation_unsat_yields_false_leaf() {
    let text = compile_to_string("p cnf 1 2\n1 0\n-1 0\n");
    assert!(text.lines().any(|l| l.starts_with("f ")));
    let graph = OracleGraph::parse(&text);
    assert_eq!(0, graph.count(1));
}

#[test]
fn test_compilation_queries() {
    let file = create_tempfile("p cnf 3 2\n1 2 0\n-1 3 0\n");
    let assert = Command::cargo_bin("sharpdnnf_rs")
        .unwrap()
        .args([
            "compilation",
            "--logging-level",
            "off",
            "--query",
            "-i",
            file.path().as_os_str().to_str().unwrap(),
        ])
        .write_stdin("d 1 0\nm -1 -2 -3 0\nm 1 0\n")
        .assert();
    assert
        .success()
        .stdout(predicate::eq("s SAT\ns 0\ns 2\n"));
    std::mem::drop(file);
}

#[test]
fn test_compilation_roundtrip() {
    let instances: &[(&str, usize, u128)] = &[
        ("p cnf 3 2\n1 2 0\n-1 3 0\n", 3, 4),
        ("p cnf 4 2\n1 2 0\n3 4 0\n", 4, 9),
        ("p cnf 2 0\n", 2, 4),
        ("p cnf 3 3\n1 2 3 0\n-1 -2 0\n-2 -3 0\n", 3, 4),
        (
            "p cnf 5 4\n1 2 0\n-2 3 0\n3 4 5 0\n-5 1 0\n",
            5,
            13,
        ),
    ];
    for (instance, n_vars, expected) in instances {
        let text = compile_to_string(instance);
        let graph = OracleGraph::parse(&text);
        assert_eq!(*expected, graph.count(*n_vars), "on {instance}");
    }
}

#[test]
fn test_certified_output_has_flags() {
    let input = create_tempfile("p cnf 2 2\n1 2 0\n-1 2 0\n");
    let output = NamedTempFile::new().unwrap();
    let trace = NamedTempFile::new().unwrap();
    let output_path = output.path().as_os_str().to_str().unwrap().to_owned();
    let trace_path = trace.path().as_os_str().to_str().unwrap().to_owned();
    create_command(
        &input,
        &["--output", &output_path, "--trace", &trace_path],
    )
    .success();
    let text = std::fs::read_to_string(output.path()).unwrap();
    // the certified root header carries the marker 1
    assert!(text.starts_with("o 1 1 "));
    std::mem::drop(input);
}

/// A minimal reader of the d4 output format, used as an independent check of
/// the writer: it recounts the models with the involved-variables rule and
/// asserts the structural properties of the nodes.
struct OracleGraph {
    nodes: Vec<OracleNode>,
    edges: Vec<(usize, Vec<i64>)>,
}

enum OracleNode {
    And(Vec<usize>),
    Or(Vec<usize>),
    True,
    False,
}

impl OracleGraph {
    fn parse(text: &str) -> Self {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for line in text.lines() {
            let words: Vec<&str> = line.split_whitespace().collect();
            match words[0] {
                "o" => nodes.push(OracleNode::Or(Vec::new())),
                "a" => nodes.push(OracleNode::And(Vec::new())),
                "t" => nodes.push(OracleNode::True),
                "f" => nodes.push(OracleNode::False),
                _ => {
                    let source: usize = words[0].parse().unwrap();
                    let target: usize = words[1].parse().unwrap();
                    let lits: Vec<i64> = words[2..words.len() - 1]
                        .iter()
                        .map(|w| w.parse().unwrap())
                        .collect();
                    assert_eq!("0", words[words.len() - 1]);
                    let edge_index = edges.len();
                    edges.push((target - 1, lits));
                    match &mut nodes[source - 1] {
                        OracleNode::Or(v) | OracleNode::And(v) => v.push(edge_index),
                        _ => panic!("an edge leaves a leaf"),
                    }
                }
            }
        }
        Self { nodes, edges }
    }

    fn count(&self, n_vars: usize) -> u128 {
        let (models, mask) = self.count_node(0);
        models << (n_vars - mask.count_ones() as usize)
    }

    /// Returns the model count of the node over its involved variables,
    /// together with the bit mask of these variables.
    fn count_node(&self, index: usize) -> (u128, u64) {
        match &self.nodes[index] {
            OracleNode::True => (1, 0),
            OracleNode::False => (0, 0),
            OracleNode::And(children) => {
                let mut models = 1u128;
                let mut mask = 0u64;
                for &e in children {
                    let (child_models, child_mask) = self.count_edge(e);
                    // decomposability: children do not share variables
                    assert_eq!(0, mask & child_mask, "a non-decomposable AND node");
                    models *= child_models;
                    mask |= child_mask;
                }
                (models, mask)
            }
            OracleNode::Or(children) => {
                assert!(children.len() <= 2, "an OR node with more than two branches");
                if children.len() == 2 {
                    self.assert_deterministic(children[0], children[1]);
                }
                let with_masks: Vec<(u128, u64)> =
                    children.iter().map(|&e| self.count_edge(e)).collect();
                let union = with_masks.iter().fold(0u64, |acc, (_, m)| acc | m);
                let models = with_masks
                    .iter()
                    .map(|(c, m)| c << (union.count_ones() - m.count_ones()))
                    .sum();
                (models, union)
            }
        }
    }

    fn count_edge(&self, edge: usize) -> (u128, u64) {
        let (target, lits) = &self.edges[edge];
        let (models, mut mask) = self.count_node(*target);
        // a forced literal involves its variable but leaves the count unchanged
        for l in lits {
            let bit = 1u64 << (l.unsigned_abs() - 1);
            assert_eq!(0, mask & bit, "a branch forces a variable of its child");
            mask |= bit;
        }
        (models, mask)
    }

    /// Two branches of a decision node assume complementary literals.
    fn assert_deterministic(&self, e1: usize, e2: usize) {
        let lits1 = &self.edges[e1].1;
        let lits2 = &self.edges[e2].1;
        let conflicting = lits1
            .iter()
            .any(|l1| lits2.iter().any(|l2| *l1 == -*l2));
        assert!(
            conflicting || lits1.is_empty() || lits2.is_empty(),
            "a non-deterministic OR node"
        );
    }
}
