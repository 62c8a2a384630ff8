//! Growable per-synapse storage
//!
//! Every per-synapse column and the synaptic state matrix are backed by
//! these buffers. They grow monotonically: resize-with-preserve and bulk
//! append are the only mutating shape operations, matching the engine's
//! no-deletion contract. Growth may reallocate, so references taken before
//! an append must be treated as stale.

use core::ops::{Deref, DerefMut};

use crate::error::{CoreError, Result};

/// A contiguous buffer supporting resize-with-preserve and bulk append
#[derive(Debug, Clone, Default)]
pub struct DynArray<T: Copy> {
    data: Vec<T>,
}

impl<T: Copy> DynArray<T> {
    /// Create an empty array
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Create an array of `len` copies of `fill`
    pub fn with_len(len: usize, fill: T) -> Self {
        Self {
            data: vec![fill; len],
        }
    }

    /// Extend by `n` elements, each initialized to `fill`; existing
    /// elements are preserved
    pub fn grow_by(&mut self, n: usize, fill: T) {
        self.data.resize(self.data.len() + n, fill);
    }

    /// Append a batch of values
    pub fn extend_from(&mut self, values: &[T]) {
        self.data.extend_from_slice(values);
    }

    /// Current element count
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the array holds no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// View as a slice
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// View as a mutable slice
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Copy> Deref for DynArray<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T: Copy> DerefMut for DynArray<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

/// Named synaptic variables: one row per variable, one column per synapse.
///
/// The variable set is fixed at construction; the column count grows with
/// the synapse count, new columns taking each row's default value.
#[derive(Debug, Clone)]
pub struct StateMatrix {
    names: Vec<String>,
    defaults: Vec<f32>,
    rows: Vec<DynArray<f32>>,
    cols: usize,
}

impl StateMatrix {
    /// Create a matrix with the given variables and per-variable defaults,
    /// zero synapses wide
    pub fn new(variables: &[(String, f32)]) -> Result<Self> {
        let mut names = Vec::with_capacity(variables.len());
        let mut defaults = Vec::with_capacity(variables.len());
        for (name, default) in variables {
            if names.contains(name) {
                return Err(CoreError::invalid_model(format!(
                    "duplicate synaptic variable '{}'",
                    name
                )));
            }
            names.push(name.clone());
            defaults.push(*default);
        }
        let rows = vec![DynArray::new(); names.len()];
        Ok(Self {
            names,
            defaults,
            rows,
            cols: 0,
        })
    }

    /// Number of variables (rows)
    pub fn num_vars(&self) -> usize {
        self.names.len()
    }

    /// Number of synapses (columns)
    pub fn num_cols(&self) -> usize {
        self.cols
    }

    /// Variable names, in declaration order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Row index of a variable
    pub fn row_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Default value of a variable row
    pub fn default_of(&self, row: usize) -> f32 {
        self.defaults[row]
    }

    /// Append `n` columns, initialized to each row's default
    pub fn widen(&mut self, n: usize) {
        for (row, default) in self.rows.iter_mut().zip(&self.defaults) {
            row.grow_by(n, *default);
        }
        self.cols += n;
    }

    /// Read one cell
    pub fn value(&self, row: usize, col: usize) -> f32 {
        self.rows[row][col]
    }

    /// Write one cell
    pub fn set_value(&mut self, row: usize, col: usize, value: f32) {
        self.rows[row][col] = value;
    }

    /// View one variable's values across all synapses
    pub fn row(&self, row: usize) -> &[f32] {
        &self.rows[row]
    }

    /// Mutable view of one variable's values
    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        &mut self.rows[row]
    }
}
