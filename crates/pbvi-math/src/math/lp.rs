//! A small dense linear-program solver.
//!
//! Maximizes `c·x` subject to rows `a·x (≤ | = | ≥) b` with `x ≥ 0`, via the
//! two-phase simplex method with Bland's rule. The programs solved in this
//! workspace are tiny (rows and variables both on the order of the state
//! count), so a dense tableau wins over anything sparse.

const PIVOT_TOLERANCE: f64 = 1e-9;
const FEASIBILITY_TOLERANCE: f64 = 1e-7;
// Bland's rule terminates on its own; the cap guards arithmetic corner cases.
const MAX_PIVOTS: usize = 10_000;

/// Relation between a constraint row's left side and its bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessEq,
    Equal,
    GreaterEq,
}

/// Outcome of solving a linear program.
#[derive(Debug, Clone, PartialEq)]
pub enum LpOutcome {
    /// A finite optimum exists.
    Optimal { objective: f64, solution: Vec<f64> },
    /// No point satisfies every row.
    Infeasible,
    /// The objective grows without bound over the feasible region.
    Unbounded,
}

/// Builder for a maximization program over non-negative variables.
#[derive(Debug, Clone)]
pub struct LinearProgram {
    variables: usize,
    objective: Vec<f64>,
    rows: Vec<(Vec<f64>, Relation, f64)>,
}

impl LinearProgram {
    /// Program over `variables` non-negative unknowns with a zero objective.
    pub fn new(variables: usize) -> Self {
        Self {
            variables,
            objective: vec![0.0; variables],
            rows: Vec::new(),
        }
    }

    /// Sets the objective coefficients (maximized).
    pub fn set_objective(&mut self, coefficients: &[f64]) {
        debug_assert_eq!(coefficients.len(), self.variables);
        self.objective.copy_from_slice(coefficients);
    }

    /// Adds the row `coefficients · x (relation) bound`.
    pub fn add_row(&mut self, coefficients: &[f64], relation: Relation, bound: f64) {
        debug_assert_eq!(coefficients.len(), self.variables);
        self.rows.push((coefficients.to_vec(), relation, bound));
    }

    /// Runs the two-phase simplex method.
    pub fn solve(&self) -> LpOutcome {
        let mut tableau = Tableau::build(self);
        if !tableau.phase_one() {
            return LpOutcome::Infeasible;
        }
        tableau.drop_artificials();
        match tableau.phase_two(&self.objective) {
            Step::Optimal => LpOutcome::Optimal {
                objective: tableau.objective_value(),
                solution: tableau.solution(),
            },
            Step::Unbounded => LpOutcome::Unbounded,
        }
    }
}

enum Step {
    Optimal,
    Unbounded,
}

/// Dense simplex tableau. Column layout: structural variables, then slack and
/// surplus columns in row order, then artificial columns; the last slot of
/// every row is its right-hand side. Right-hand sides stay non-negative
/// throughout.
struct Tableau {
    rows: Vec<Vec<f64>>,
    cost: Vec<f64>,
    basis: Vec<usize>,
    columns: usize,
    structural: usize,
    artificial_start: usize,
}

impl Tableau {
    fn build(program: &LinearProgram) -> Self {
        // Rows with negative bounds are negated first so every right-hand
        // side starts non-negative.
        let normalized: Vec<(Vec<f64>, Relation, f64)> = program
            .rows
            .iter()
            .map(|(coefficients, relation, bound)| {
                if *bound < 0.0 {
                    let flipped = coefficients.iter().map(|c| -c).collect();
                    let relation = match relation {
                        Relation::LessEq => Relation::GreaterEq,
                        Relation::GreaterEq => Relation::LessEq,
                        Relation::Equal => Relation::Equal,
                    };
                    (flipped, relation, -bound)
                } else {
                    (coefficients.clone(), *relation, *bound)
                }
            })
            .collect();

        let structural = program.variables;
        let mut slack = 0;
        let mut artificial = 0;
        for (_, relation, _) in &normalized {
            match relation {
                Relation::LessEq => slack += 1,
                Relation::GreaterEq => {
                    slack += 1;
                    artificial += 1;
                }
                Relation::Equal => artificial += 1,
            }
        }
        let artificial_start = structural + slack;
        let columns = artificial_start + artificial;

        let mut rows = Vec::with_capacity(normalized.len());
        let mut basis = Vec::with_capacity(normalized.len());
        let mut next_slack = structural;
        let mut next_artificial = artificial_start;
        for (coefficients, relation, bound) in &normalized {
            let mut row = vec![0.0; columns + 1];
            row[..structural].copy_from_slice(coefficients);
            match relation {
                Relation::LessEq => {
                    row[next_slack] = 1.0;
                    basis.push(next_slack);
                    next_slack += 1;
                }
                Relation::GreaterEq => {
                    row[next_slack] = -1.0;
                    next_slack += 1;
                    row[next_artificial] = 1.0;
                    basis.push(next_artificial);
                    next_artificial += 1;
                }
                Relation::Equal => {
                    row[next_artificial] = 1.0;
                    basis.push(next_artificial);
                    next_artificial += 1;
                }
            }
            row[columns] = *bound;
            rows.push(row);
        }

        Self {
            rows,
            cost: vec![0.0; columns + 1],
            basis,
            columns,
            structural,
            artificial_start,
        }
    }

    /// Rebuilds the reduced-cost row `z_j - c_j` for the objective `c`
    /// (padded with zeros past `c.len()`); the right-hand slot becomes the
    /// current objective value.
    fn price(&mut self, c: &[f64]) {
        let coefficient = |j: usize| if j < c.len() { c[j] } else { 0.0 };
        for j in 0..=self.columns {
            let mut z = 0.0;
            for (i, row) in self.rows.iter().enumerate() {
                z += coefficient(self.basis[i]) * row[j];
            }
            self.cost[j] = z - if j < self.columns { coefficient(j) } else { 0.0 };
        }
    }

    /// Pivots until no reduced cost is negative. Entering column: lowest
    /// index with negative reduced cost (Bland). Leaving row: smallest
    /// ratio, ties broken toward the smallest basic column index.
    fn iterate(&mut self) -> Step {
        for _ in 0..MAX_PIVOTS {
            let entering = (0..self.columns).find(|&j| self.cost[j] < -PIVOT_TOLERANCE);
            let Some(entering) = entering else {
                return Step::Optimal;
            };
            let mut leaving: Option<(usize, f64)> = None;
            for (i, row) in self.rows.iter().enumerate() {
                let coefficient = row[entering];
                if coefficient > PIVOT_TOLERANCE {
                    let ratio = row[self.columns] / coefficient;
                    let better = match leaving {
                        None => true,
                        Some((current, best)) => {
                            ratio < best - PIVOT_TOLERANCE
                                || (ratio < best + PIVOT_TOLERANCE
                                    && self.basis[i] < self.basis[current])
                        }
                    };
                    if better {
                        leaving = Some((i, ratio));
                    }
                }
            }
            let Some((pivot_row, _)) = leaving else {
                return Step::Unbounded;
            };
            self.pivot(pivot_row, entering);
        }
        Step::Optimal
    }

    fn pivot(&mut self, pivot_row: usize, entering: usize) {
        let scale = self.rows[pivot_row][entering];
        for x in self.rows[pivot_row].iter_mut() {
            *x /= scale;
        }
        let pivot = self.rows[pivot_row].clone();
        for (i, row) in self.rows.iter_mut().enumerate() {
            if i == pivot_row {
                continue;
            }
            let factor = row[entering];
            if factor != 0.0 {
                for (x, p) in row.iter_mut().zip(&pivot) {
                    *x -= factor * p;
                }
            }
        }
        let factor = self.cost[entering];
        if factor != 0.0 {
            for (x, p) in self.cost.iter_mut().zip(&pivot) {
                *x -= factor * p;
            }
        }
        self.basis[pivot_row] = entering;
    }

    /// Maximizes the negated sum of artificial variables. Returns false when
    /// some artificial mass remains, i.e. the program is infeasible.
    fn phase_one(&mut self) -> bool {
        if self.artificial_start == self.columns {
            // Slack-only start is already a feasible basis.
            return true;
        }
        let mut c = vec![0.0; self.columns];
        for slot in &mut c[self.artificial_start..] {
            *slot = -1.0;
        }
        self.price(&c);
        if let Step::Unbounded = self.iterate() {
            return false;
        }
        self.cost[self.columns] > -FEASIBILITY_TOLERANCE
    }

    /// Pivots leftover artificials out of the basis (their value is zero
    /// after a feasible phase one), drops rows that turn out redundant, and
    /// truncates the artificial columns.
    fn drop_artificials(&mut self) {
        let mut i = 0;
        while i < self.rows.len() {
            if self.basis[i] >= self.artificial_start {
                let entering =
                    (0..self.artificial_start).find(|&j| self.rows[i][j].abs() > PIVOT_TOLERANCE);
                match entering {
                    Some(j) => self.pivot(i, j),
                    None => {
                        self.rows.remove(i);
                        self.basis.remove(i);
                        continue;
                    }
                }
            }
            i += 1;
        }
        for row in &mut self.rows {
            let rhs = row[self.columns];
            row.truncate(self.artificial_start);
            row.push(rhs);
        }
        let rhs = self.cost[self.columns];
        self.cost.truncate(self.artificial_start);
        self.cost.push(rhs);
        self.columns = self.artificial_start;
    }

    fn phase_two(&mut self, objective: &[f64]) -> Step {
        self.price(objective);
        self.iterate()
    }

    fn objective_value(&self) -> f64 {
        self.cost[self.columns]
    }

    fn solution(&self) -> Vec<f64> {
        let mut x = vec![0.0; self.structural];
        for (i, &column) in self.basis.iter().enumerate() {
            if column < self.structural {
                x[column] = self.rows[i][self.columns];
            }
        }
        x
    }
}
