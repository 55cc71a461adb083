//! Flow equation system
//!
//! One unknown per candidate path plus one slack per node. For each node `i`
//! with coverage `c_i` and touching paths `P_i`:
//!
//! ```text
//!   Σ_{p ∈ P_i} x_p - s_i <=  c_i
//!  -Σ_{p ∈ P_i} x_p - s_i <= -c_i
//! ```
//!
//! so `s_i >= |Σ x_p - c_i|`, and the objective maximizes `-Σ s_i`.

use crate::core::data_structures::KmerCount;
use crate::core::rational::Rational;
use crate::solver::simplex::Simplex;
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
struct NodeEquation {
    count: KmerCount,
    paths: Vec<usize>,
}

/// Per-node flow constraints over a fixed number of candidate paths
#[derive(Debug, Clone)]
pub struct EquationSystem {
    nb_paths: usize,
    nodes: BTreeMap<usize, NodeEquation>,
}

impl EquationSystem {
    pub fn new(nb_paths: usize) -> Self {
        Self {
            nb_paths,
            nodes: BTreeMap::new(),
        }
    }

    pub fn nb_paths(&self) -> usize {
        self.nb_paths
    }

    pub fn nb_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Declare a node and its observed coverage
    pub fn set_count(&mut self, node: usize, count: KmerCount) {
        self.nodes.entry(node).or_default().count = count;
    }

    /// Record that `path` goes through `node`
    pub fn add_path(&mut self, node: usize, path: usize) {
        let paths = &mut self.nodes.entry(node).or_default().paths;
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    fn build(&self) -> Option<Simplex> {
        let nb_nodes = self.nodes.len();
        let nb_variables = self.nb_paths + nb_nodes;
        let mut simplex = Simplex::new(2 * nb_nodes, nb_variables);

        let mut objective = vec![0i64; nb_variables];
        for slack in objective.iter_mut().skip(self.nb_paths) {
            *slack = -1;
        }
        simplex.set_objective(&objective).ok()?;

        for (i, equation) in self.nodes.values().enumerate() {
            let mut upper = vec![0i64; nb_variables];
            let mut lower = vec![0i64; nb_variables];
            for &path in equation.paths.iter().filter(|&&p| p < self.nb_paths) {
                upper[path] = 1;
                lower[path] = -1;
            }
            upper[self.nb_paths + i] = -1;
            lower[self.nb_paths + i] = -1;
            let count = equation.count as i64;
            simplex.add_constraint(2 * i, &upper, count).ok()?;
            simplex.add_constraint(2 * i + 1, &lower, -count).ok()?;
        }
        simplex.set_slack_base();
        Some(simplex)
    }

    /// Integer flow of every path (floor of the LP value); all zero when no
    /// consistent flow exists
    pub fn solve(&self) -> Vec<KmerCount> {
        let none = vec![0; self.nb_paths];
        if self.nb_paths == 0 || self.nodes.is_empty() {
            return none;
        }
        let Some(mut simplex) = self.build() else {
            warn!("Could not build the flow system");
            return none;
        };
        match simplex.optimize() {
            Ok(optimum) if optimum.is_finite() => {
                debug!(
                    "Flow system solved: {} paths, {} nodes, deviation {}",
                    self.nb_paths,
                    self.nodes.len(),
                    -optimum
                );
                (0..self.nb_paths)
                    .map(|i| flow_value(simplex.value(i)))
                    .collect()
            }
            Ok(optimum) => {
                warn!("No consistent flow found (optimum {})", optimum);
                none
            }
            Err(e) => {
                warn!("Flow system failed: {}", e);
                none
            }
        }
    }

    /// Total absolute deviation between node coverage and assigned flow
    pub fn deviation(&self, values: &[KmerCount]) -> u64 {
        self.nodes
            .values()
            .map(|equation| {
                let flow: u64 = equation
                    .paths
                    .iter()
                    .filter_map(|&p| values.get(p))
                    .map(|&v| v as u64)
                    .sum();
                flow.abs_diff(equation.count as u64)
            })
            .sum()
    }
}

fn flow_value(value: Rational) -> KmerCount {
    value
        .floor()
        .and_then(|v| KmerCount::try_from(v.max(0)).ok())
        .unwrap_or(0)
}
