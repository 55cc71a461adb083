//! Two-Phase Tableau Simplex
//! =========================
//!
//! Maximization over an explicit tableau of exact rationals:
//! - Row 0 holds the objective, `A[0][0]` accumulates `-z`
//! - Rows `1..=m` hold the constraints, each with its own slack column
//! - Entering variable: first column with a positive reduced cost
//! - Leaving variable: minimum ratio over rows with a basic variable, first found wins
//! - Phase 1 adds one artificial column when a right-hand side is negative
//!
//! Infeasible problems yield NaN, unbounded ones +infinity. Arithmetic
//! overflow is the only hard error.

use crate::core::rational::Rational;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimplexError {
    #[error("Rational overflow while pivoting on ({row}, {column})")]
    Overflow { row: usize, column: usize },

    #[error("Dimension mismatch: expected {expected} coefficients, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("Row {row} is out of range (tableau has {rows} constraints)")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("No optimum after {iterations} pivots")]
    IterationLimit { iterations: usize },
}

/// Dense simplex tableau
#[derive(Debug, Clone)]
pub struct Simplex {
    lin: usize,
    col: usize,
    coeffs: Vec<Rational>,
    /// Basic column of each row, 0 when the row has none
    base_of_line: Vec<usize>,
    /// Row of each basic column, 0 when the column is not basic
    line_of_base: Vec<usize>,
}

impl Simplex {
    /// Tableau for `nb_constraints` rows over `nb_variables` structural variables
    pub fn new(nb_constraints: usize, nb_variables: usize) -> Self {
        let lin = nb_constraints + 1;
        let col = nb_constraints + nb_variables + 1;
        Self {
            lin,
            col,
            coeffs: vec![Rational::ZERO; lin * col],
            base_of_line: vec![0; lin],
            line_of_base: vec![0; col],
        }
    }

    fn nb_variables(&self) -> usize {
        self.col - self.lin
    }

    fn coeff(&self, l: usize, c: usize) -> Rational {
        self.coeffs[l * self.col + c]
    }

    fn set_coeff(&mut self, l: usize, c: usize, value: Rational) {
        self.coeffs[l * self.col + c] = value;
    }

    /// Objective coefficients, one per structural variable
    pub fn set_objective(&mut self, objective: &[i64]) -> Result<(), SimplexError> {
        let n = self.nb_variables();
        if objective.len() != n {
            return Err(SimplexError::Dimension {
                expected: n,
                actual: objective.len(),
            });
        }
        for (c, &value) in objective.iter().enumerate() {
            self.set_coeff(0, c + 1, Rational::from(value));
        }
        Ok(())
    }

    /// Constraint `line · x <= bound` stored in row `index + 1` with its slack
    pub fn add_constraint(
        &mut self,
        index: usize,
        line: &[i64],
        bound: i64,
    ) -> Result<(), SimplexError> {
        let n = self.nb_variables();
        if line.len() != n {
            return Err(SimplexError::Dimension {
                expected: n,
                actual: line.len(),
            });
        }
        let row = index + 1;
        if row >= self.lin {
            return Err(SimplexError::RowOutOfRange {
                row: index,
                rows: self.lin - 1,
            });
        }
        for (c, &value) in line.iter().enumerate() {
            self.set_coeff(row, c + 1, Rational::from(value));
        }
        self.set_coeff(row, 0, Rational::from(bound));
        self.set_coeff(row, row + n, Rational::ONE);
        Ok(())
    }

    /// Make every slack variable basic
    pub fn set_slack_base(&mut self) {
        let n = self.nb_variables();
        for l in 1..self.lin {
            self.set_base(l, l + n);
        }
    }

    fn set_base(&mut self, l: usize, c: usize) {
        let previous = self.base_of_line[l];
        if previous != 0 {
            self.line_of_base[previous] = 0;
        }
        self.line_of_base[c] = l;
        self.base_of_line[l] = c;
    }

    fn enter(&self) -> Option<usize> {
        (1..self.col).find(|&c| self.coeff(0, c) > Rational::ZERO)
    }

    fn ratio(&self, l: usize, c: usize) -> Rational {
        let a = self.coeff(l, c);
        if self.base_of_line[l] == 0 || a <= Rational::ZERO {
            Rational::INFINITY
        } else {
            self.coeff(l, 0) / a
        }
    }

    fn constline(&self, c: usize) -> Option<usize> {
        let mut min = Rational::INFINITY;
        let mut line = None;
        for l in 1..self.lin {
            let value = self.ratio(l, c);
            if value < min {
                min = value;
                line = Some(l);
            }
        }
        line
    }

    fn pivot(&mut self, pl: usize, pc: usize) -> Result<(), SimplexError> {
        let overflow = SimplexError::Overflow {
            row: pl,
            column: pc,
        };
        let pivot = self.coeff(pl, pc);
        for c in 0..self.col {
            let value = self
                .coeff(pl, c)
                .checked_div(&pivot)
                .ok_or_else(|| overflow.clone())?;
            self.set_coeff(pl, c, value);
        }
        for l in 0..self.lin {
            if l == pl {
                continue;
            }
            let alpha = self.coeff(l, pc);
            if alpha.is_zero() {
                continue;
            }
            for c in 0..self.col {
                let value = alpha
                    .checked_mul(&self.coeff(pl, c))
                    .and_then(|product| self.coeff(l, c).checked_sub(&product))
                    .ok_or_else(|| overflow.clone())?;
                self.set_coeff(l, c, value);
            }
        }
        self.set_base(pl, pc);
        Ok(())
    }

    fn iteration_limit(&self) -> usize {
        50 * (self.lin + self.col)
    }

    /// Phase 2 on a feasible tableau
    fn solve(&mut self) -> Result<Rational, SimplexError> {
        let limit = self.iteration_limit();
        for _ in 0..limit {
            let Some(pc) = self.enter() else {
                return Ok(-self.coeff(0, 0));
            };
            let Some(pl) = self.constline(pc) else {
                warn!("Unbounded linear program (column {})", pc);
                return Ok(Rational::INFINITY);
            };
            self.pivot(pl, pc)?;
        }
        Err(SimplexError::IterationLimit { iterations: limit })
    }

    /// Phase 1: restore a feasible basis, `false` if none exists
    fn init(&mut self) -> Result<bool, SimplexError> {
        let mut min = Rational::INFINITY;
        let mut minline = 0;
        for l in 1..self.lin {
            let b = self.coeff(l, 0);
            if b < min {
                min = b;
                minline = l;
            }
        }
        if min >= Rational::ZERO {
            return Ok(true);
        }

        // Auxiliary tableau: one extra row carrying the original objective,
        // one extra column for the artificial variable x0 (maximize -x0)
        let (lin, col) = (self.lin, self.col);
        let mut aux = Simplex::new(lin, col - lin);
        let artificial = col;
        aux.set_coeff(0, artificial, -Rational::ONE);
        for c in 0..col {
            aux.set_coeff(lin, c, self.coeff(0, c));
        }
        for l in 1..lin {
            for c in 0..col {
                aux.set_coeff(l, c, self.coeff(l, c));
            }
            aux.set_coeff(l, artificial, -Rational::ONE);
        }
        for l in 1..lin {
            aux.set_base(l, l + col - lin);
        }
        aux.pivot(minline, artificial)?;
        let value = aux.solve()?;
        if value < Rational::ZERO {
            return Ok(false);
        }

        // x0 may remain basic at level zero; swap it for any non-basic column
        let row = aux.line_of_base[artificial];
        if row > 0 {
            if let Some(c) = (1..col)
                .find(|&c| aux.line_of_base[c] == 0 && !aux.coeff(row, c).is_zero())
            {
                aux.pivot(row, c)?;
            }
        }

        for c in 0..col {
            self.set_coeff(0, c, aux.coeff(lin, c));
        }
        for l in 1..lin {
            for c in 0..col {
                self.set_coeff(l, c, aux.coeff(l, c));
            }
        }
        self.base_of_line.iter_mut().for_each(|b| *b = 0);
        self.line_of_base.iter_mut().for_each(|l| *l = 0);
        for l in 1..lin {
            let base = aux.base_of_line[l];
            if base != 0 && base < col {
                self.set_base(l, base);
            }
        }
        debug!("Phase 1 restored a feasible basis");
        Ok(true)
    }

    /// Optimum of the program: NaN when infeasible, +infinity when unbounded
    pub fn optimize(&mut self) -> Result<Rational, SimplexError> {
        if self.init()? {
            self.solve()
        } else {
            warn!("Infeasible linear program");
            Ok(Rational::NAN)
        }
    }

    /// Value of structural variable `i` in the current basis
    pub fn value(&self, i: usize) -> Rational {
        let c = i + 1;
        match self.line_of_base.get(c) {
            Some(&l) if l != 0 => self.coeff(l, 0),
            _ => Rational::ZERO,
        }
    }
}
