//! Dense conditional and utility tables.
//!
//! # Index convention
//!
//! Parents are kept in arc declaration order. A full parent assignment
//! `[i1..ik]` over cardinalities `[c1..ck]` maps to the combination index
//! `Σ ij * Π c(j+1..k)`: row-major, the last parent varies fastest. The
//! flattened offset of a row is `combination * width`, where `width` is the
//! node's own cardinality (1 for utility tables). The node's own labels are
//! therefore the innermost axis.
//!
//! `fill_uniform`, `set_slice`, `get_distribution` and the inference fast
//! path all go through the same stride vector, so population and lookup can
//! never disagree.

use std::sync::Arc;

use sa_common::{TableError, MAX_TABLE_ENTRIES};
use sa_math::{is_distribution, stable_sum};

use super::variable::Variable;

/// Flattened table attached to a chance or utility node.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    node: Arc<Variable>,
    parents: Vec<Arc<Variable>>,
    strides: Vec<usize>,
    combinations: usize,
    values: Vec<f64>,
}

/// Rows whose sum left the tolerance band.
#[derive(Debug, Clone, PartialEq)]
pub struct RowDefect {
    /// Combination index of the row.
    pub combination: usize,
    /// Parent labels of the row, in parent order.
    pub labels: Vec<String>,
    pub sum: f64,
}

impl Table {
    /// Allocate a zero-filled table for `node` conditioned on `parents`.
    ///
    /// Fails with [`TableError::TooLarge`] when the flattened size would
    /// exceed [`MAX_TABLE_ENTRIES`].
    pub fn allocate(node: Arc<Variable>, parents: Vec<Arc<Variable>>) -> Result<Self, TableError> {
        let too_large = || TableError::TooLarge {
            table: node.name().to_string(),
            limit: MAX_TABLE_ENTRIES,
        };
        let mut strides = vec![0; parents.len()];
        let mut stride = 1usize;
        for (slot, parent) in strides.iter_mut().zip(parents.iter()).rev() {
            *slot = stride;
            stride = stride
                .checked_mul(parent.cardinality())
                .filter(|&n| n <= MAX_TABLE_ENTRIES)
                .ok_or_else(too_large)?;
        }
        let combinations = stride;
        let len = combinations
            .checked_mul(node.cardinality())
            .filter(|&n| n <= MAX_TABLE_ENTRIES)
            .ok_or_else(too_large)?;
        Ok(Self {
            node,
            parents,
            strides,
            combinations,
            values: vec![0.0; len],
        })
    }

    pub fn node(&self) -> &Arc<Variable> {
        &self.node
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// Parents in index order.
    pub fn parents(&self) -> &[Arc<Variable>] {
        &self.parents
    }

    /// Values per row: the node cardinality, or 1 for a utility table.
    pub fn width(&self) -> usize {
        self.node.cardinality()
    }

    /// Number of parent combinations (rows).
    pub fn combinations(&self) -> usize {
        self.combinations
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw flattened values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Whether this table holds scalar payoffs rather than distributions.
    pub fn is_utility(&self) -> bool {
        self.node.is_numeric()
    }

    /// Row at a combination index.
    pub fn row(&self, combination: usize) -> Option<&[f64]> {
        let width = self.width();
        let start = combination.checked_mul(width)?;
        self.values.get(start..start + width)
    }

    /// Replace every value at once, in flattened order.
    pub fn set_values(&mut self, values: Vec<f64>) -> Result<(), TableError> {
        if values.len() != self.values.len() {
            return Err(self.shape_mismatch(self.values.len(), values.len()));
        }
        self.values = values;
        Ok(())
    }

    /// Replicate `distribution` into every row.
    pub fn fill_uniform(&mut self, distribution: &[f64]) -> Result<(), TableError> {
        let width = self.width();
        if distribution.len() != width {
            return Err(self.shape_mismatch(width, distribution.len()));
        }
        for row in self.values.chunks_exact_mut(width) {
            row.copy_from_slice(distribution);
        }
        Ok(())
    }

    /// Write `values` into every row matching a (possibly partial) parent
    /// assignment.
    ///
    /// Unconstrained parents are broadcast over. A key repeated in the
    /// assignment takes its last label. Returns the number of rows written,
    /// which is the product of the unconstrained parents' cardinalities.
    pub fn set_slice<'a, I>(&mut self, assignment: I, values: &[f64]) -> Result<usize, TableError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let width = self.width();
        if values.len() != width {
            return Err(self.shape_mismatch(width, values.len()));
        }
        let fixed = self.resolve(assignment)?;
        let rows = self.matching_rows(&fixed);
        for &combination in &rows {
            let start = combination * width;
            self.values[start..start + width].copy_from_slice(values);
        }
        Ok(rows.len())
    }

    /// Set the payoff of every row matching a parent assignment.
    pub fn set_utility<'a, I>(&mut self, assignment: I, value: f64) -> Result<usize, TableError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        if !self.is_utility() {
            return Err(TableError::NoTable {
                node: self.name().to_string(),
            });
        }
        self.set_slice(assignment, &[value])
    }

    /// Exact lookup of the row for a full parent assignment.
    pub fn get_distribution<'a, I>(&self, assignment: I) -> Result<&[f64], TableError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let fixed = self.resolve(assignment)?;
        let missing: Vec<String> = fixed
            .iter()
            .zip(self.parents.iter())
            .filter(|(slot, _)| slot.is_none())
            .map(|(_, parent)| parent.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(TableError::IncompleteAssignment {
                table: self.name().to_string(),
                missing,
            });
        }
        let indices: Vec<usize> = fixed.into_iter().flatten().collect();
        let combination = self.combination_index(&indices)?;
        self.row(combination).ok_or(TableError::IndexOutOfRange {
            variable: self.name().to_string(),
            index: combination,
            cardinality: self.combinations,
        })
    }

    /// Payoff for a full parent assignment of a utility table.
    pub fn get_utility<'a, I>(&self, assignment: I) -> Result<f64, TableError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let row = self.get_distribution(assignment)?;
        Ok(row[0])
    }

    /// Combination index of a full vector of parent label indices.
    pub fn combination_index(&self, indices: &[usize]) -> Result<usize, TableError> {
        if indices.len() != self.parents.len() {
            return Err(self.shape_mismatch(self.parents.len(), indices.len()));
        }
        let mut combination = 0;
        for ((&index, parent), stride) in indices.iter().zip(&self.parents).zip(&self.strides) {
            if index >= parent.cardinality() {
                return Err(TableError::IndexOutOfRange {
                    variable: parent.name().to_string(),
                    index,
                    cardinality: parent.cardinality(),
                });
            }
            combination += index * stride;
        }
        Ok(combination)
    }

    /// Inverse of [`Table::combination_index`].
    pub fn index_to_combination(&self, combination: usize) -> Result<Vec<usize>, TableError> {
        if combination >= self.combinations {
            return Err(TableError::IndexOutOfRange {
                variable: self.name().to_string(),
                index: combination,
                cardinality: self.combinations,
            });
        }
        Ok(self
            .parents
            .iter()
            .zip(&self.strides)
            .map(|(parent, stride)| (combination / stride) % parent.cardinality())
            .collect())
    }

    /// Parent labels of a combination, in parent order.
    pub fn combination_labels(&self, combination: usize) -> Result<Vec<String>, TableError> {
        let indices = self.index_to_combination(combination)?;
        indices
            .iter()
            .zip(&self.parents)
            .map(|(&i, parent)| parent.index_to_label(i).map(str::to_string))
            .collect()
    }

    /// True when every row is a distribution within `epsilon`.
    ///
    /// Utility tables are never normalized; for them this checks finiteness.
    pub fn normalize_check(&self, epsilon: f64) -> bool {
        if self.is_utility() {
            return self.values.iter().all(|v| v.is_finite());
        }
        self.values
            .chunks_exact(self.width())
            .all(|row| is_distribution(row, epsilon))
    }

    /// Rows of a chance table that are not distributions within `epsilon`.
    pub fn unnormalized_rows(&self, epsilon: f64) -> Vec<RowDefect> {
        if self.is_utility() {
            return Vec::new();
        }
        self.values
            .chunks_exact(self.width())
            .enumerate()
            .filter(|(_, row)| !is_distribution(row, epsilon))
            .map(|(combination, row)| RowDefect {
                combination,
                labels: self.combination_labels(combination).unwrap_or_default(),
                sum: stable_sum(row),
            })
            .collect()
    }

    /// Row for a model-wide assignment indexed by variable slot.
    ///
    /// `assignment[v]` must hold the label index of every parent `v`.
    pub(crate) fn row_at(&self, assignment: &[usize]) -> &[f64] {
        let combination: usize = self
            .parents
            .iter()
            .zip(&self.strides)
            .map(|(parent, stride)| assignment[parent.id().index()] * stride)
            .sum();
        let start = combination * self.width();
        &self.values[start..start + self.width()]
    }

    fn resolve<'a, I>(&self, assignment: I) -> Result<Vec<Option<usize>>, TableError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut fixed = vec![None; self.parents.len()];
        for (name, label) in assignment {
            let position = self
                .parents
                .iter()
                .position(|p| p.name() == name)
                .ok_or_else(|| TableError::UnknownVariable {
                    table: self.name().to_string(),
                    variable: name.to_string(),
                })?;
            fixed[position] = Some(self.parents[position].label_to_index(label)?);
        }
        Ok(fixed)
    }

    fn matching_rows(&self, fixed: &[Option<usize>]) -> Vec<usize> {
        let base: usize = fixed
            .iter()
            .zip(&self.strides)
            .filter_map(|(slot, stride)| slot.map(|i| i * stride))
            .sum();
        let free: Vec<(usize, usize)> = fixed
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(pos, _)| (self.parents[pos].cardinality(), self.strides[pos]))
            .collect();

        let mut rows = Vec::new();
        let mut counter = vec![0usize; free.len()];
        loop {
            let offset: usize = counter
                .iter()
                .zip(&free)
                .map(|(&c, &(_, stride))| c * stride)
                .sum();
            rows.push(base + offset);

            // Odometer increment, last free parent fastest.
            let mut pos = free.len();
            loop {
                if pos == 0 {
                    return rows;
                }
                pos -= 1;
                counter[pos] += 1;
                if counter[pos] < free[pos].0 {
                    break;
                }
                counter[pos] = 0;
            }
        }
    }

    fn shape_mismatch(&self, expected: usize, actual: usize) -> TableError {
        TableError::ShapeMismatch {
            table: self.name().to_string(),
            expected,
            actual,
        }
    }
}
