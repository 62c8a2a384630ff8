//! Neuron selectors and connectivity forms
//!
//! A [`Selector`] names a subset of one population; a [`Connect`] form says
//! how to wire the selected presynaptic and postsynaptic subsets together.
//! Both are resolved and validated by the engine before any synapse is
//! appended, so a bad selector never leaves a partial batch behind.

use std::ops::Range;

use crate::error::{CoreError, Result};

/// A subset of a population
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Every neuron in the population
    All,
    /// One neuron
    Single(u32),
    /// A contiguous index range, end exclusive
    Range(Range<u32>),
    /// An explicit index list, in the order given
    List(Vec<u32>),
}

impl Selector {
    /// Resolve to concrete indices, validating every id against the
    /// population size
    pub fn resolve(&self, size: usize) -> Result<Vec<u32>> {
        match self {
            Selector::All => Ok((0..size as u32).collect()),
            Selector::Single(idx) => {
                check(*idx, size)?;
                Ok(vec![*idx])
            }
            Selector::Range(range) => {
                if range.start < range.end {
                    check(range.end - 1, size)?;
                }
                Ok(range.clone().collect())
            }
            Selector::List(indices) => {
                for &idx in indices {
                    check(idx, size)?;
                }
                Ok(indices.clone())
            }
        }
    }
}

impl From<u32> for Selector {
    fn from(idx: u32) -> Self {
        Selector::Single(idx)
    }
}

impl From<Range<u32>> for Selector {
    fn from(range: Range<u32>) -> Self {
        Selector::Range(range)
    }
}

impl From<Vec<u32>> for Selector {
    fn from(indices: Vec<u32>) -> Self {
        Selector::List(indices)
    }
}

fn check(idx: u32, size: usize) -> Result<()> {
    if (idx as usize) < size {
        Ok(())
    } else {
        Err(CoreError::index_out_of_range(idx, size))
    }
}

/// How to wire the selected pre and post subsets together
#[derive(Debug, Clone, PartialEq)]
pub enum Connect {
    /// One synapse per (pre, post) pair
    All,
    /// `k` synapses per (pre, post) pair
    Count(u32),
    /// One Bernoulli(p) draw per (pre, post) pair
    Probability(f32),
    /// A textual expression over `i` (presynaptic id) and `j` (postsynaptic
    /// id); boolean-valued expressions act as a mask, float-valued ones as a
    /// per-pair connection probability
    Expression(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_resolves_to_every_index() {
        assert_eq!(Selector::All.resolve(3).unwrap(), vec![0, 1, 2]);
        assert!(Selector::All.resolve(0).unwrap().is_empty());
    }

    #[test]
    fn test_single_bounds() {
        assert_eq!(Selector::Single(2).resolve(3).unwrap(), vec![2]);
        assert!(matches!(
            Selector::Single(3).resolve(3),
            Err(CoreError::IndexOutOfRange { index: 3, bound: 3 })
        ));
    }

    #[test]
    fn test_range_bounds() {
        assert_eq!(Selector::Range(1..4).resolve(4).unwrap(), vec![1, 2, 3]);
        assert!(Selector::Range(1..5).resolve(4).is_err());
        assert!(Selector::Range(2..2).resolve(1).unwrap().is_empty());
    }

    #[test]
    fn test_list_preserves_order() {
        assert_eq!(
            Selector::List(vec![2, 0, 2]).resolve(3).unwrap(),
            vec![2, 0, 2]
        );
        assert!(Selector::List(vec![0, 9]).resolve(3).is_err());
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Selector::from(5u32), Selector::Single(5));
        assert_eq!(Selector::from(0u32..2), Selector::Range(0..2));
        assert_eq!(Selector::from(vec![1u32]), Selector::List(vec![1]));
    }
}
