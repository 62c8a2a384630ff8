//! Connectivity store
//!
//! Flat per-synapse arrays plus per-neuron adjacency lists. Synapses are
//! identified by their append order; the store only ever grows, so a
//! synapse id stays valid for the lifetime of the store.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::dynarray::{DynArray, StateMatrix};
use crate::error::{CoreError, Result};
use crate::index::IndexWidth;

/// Per-neuron synapse list; most neurons have few synapses, so small
/// lists stay inline
pub type SynapseList = SmallVec<[u32; 8]>;

/// Summary counters for a store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    /// Total synapse count
    pub num_synapses: usize,
    /// Presynaptic population size
    pub source_size: usize,
    /// Postsynaptic population size
    pub target_size: usize,
    /// Largest outgoing synapse list
    pub max_out_degree: usize,
    /// Largest incoming synapse list
    pub max_in_degree: usize,
    /// Width policy chosen for presynaptic ids
    pub pre_width: IndexWidth,
    /// Width policy chosen for postsynaptic ids
    pub post_width: IndexWidth,
}

/// Growable synapse table between a source and a target population.
///
/// Each synapse row holds its presynaptic id, postsynaptic id, a forward
/// and a backward delay in whole steps, and one column in the synaptic
/// state matrix. Adjacency lists map each neuron to the synapses it
/// originates (outgoing) or terminates (incoming), kept consistent with
/// the flat arrays by [`ConnectivityStore::append`].
#[derive(Debug, Clone)]
pub struct ConnectivityStore {
    source_size: usize,
    target_size: usize,
    pre_ids: DynArray<u32>,
    post_ids: DynArray<u32>,
    delay_pre: DynArray<i16>,
    delay_post: DynArray<i16>,
    state: StateMatrix,
    outgoing: Vec<SynapseList>,
    incoming: Vec<SynapseList>,
    pre_width: IndexWidth,
    post_width: IndexWidth,
}

impl ConnectivityStore {
    /// Create an empty store between populations of the given sizes
    pub fn new(
        source_size: usize,
        target_size: usize,
        variables: &[(String, f32)],
    ) -> Result<Self> {
        Ok(Self {
            source_size,
            target_size,
            pre_ids: DynArray::new(),
            post_ids: DynArray::new(),
            delay_pre: DynArray::new(),
            delay_post: DynArray::new(),
            state: StateMatrix::new(variables)?,
            outgoing: vec![SynapseList::new(); source_size],
            incoming: vec![SynapseList::new(); target_size],
            pre_width: IndexWidth::for_count(source_size),
            post_width: IndexWidth::for_count(target_size),
        })
    }

    /// Number of synapses
    pub fn len(&self) -> usize {
        self.pre_ids.len()
    }

    /// Whether the store holds no synapses
    pub fn is_empty(&self) -> bool {
        self.pre_ids.is_empty()
    }

    /// Presynaptic population size
    pub fn source_size(&self) -> usize {
        self.source_size
    }

    /// Postsynaptic population size
    pub fn target_size(&self) -> usize {
        self.target_size
    }

    /// Presynaptic neuron id of each synapse
    pub fn pre_ids(&self) -> &[u32] {
        &self.pre_ids
    }

    /// Postsynaptic neuron id of each synapse
    pub fn post_ids(&self) -> &[u32] {
        &self.post_ids
    }

    /// Forward (pre-to-post) delay of each synapse, in steps
    pub fn delays_pre(&self) -> &[i16] {
        &self.delay_pre
    }

    /// Backward (post-to-pre) delay of each synapse, in steps
    pub fn delays_post(&self) -> &[i16] {
        &self.delay_post
    }

    /// Set the forward delay of one synapse, in steps
    pub fn set_delay_pre(&mut self, synapse: u32, steps: i16) -> Result<()> {
        let idx = self.check_synapse(synapse)?;
        self.delay_pre[idx] = steps;
        Ok(())
    }

    /// Set the backward delay of one synapse, in steps
    pub fn set_delay_post(&mut self, synapse: u32, steps: i16) -> Result<()> {
        let idx = self.check_synapse(synapse)?;
        self.delay_post[idx] = steps;
        Ok(())
    }

    /// Set the forward delay of every synapse, in steps
    pub fn fill_delays_pre(&mut self, steps: i16) {
        self.delay_pre.as_mut_slice().fill(steps);
    }

    /// Set the backward delay of every synapse, in steps
    pub fn fill_delays_post(&mut self, steps: i16) {
        self.delay_post.as_mut_slice().fill(steps);
    }

    /// Synapses originating at a source neuron
    pub fn outgoing(&self, neuron: u32) -> &[u32] {
        &self.outgoing[neuron as usize]
    }

    /// Synapses terminating at a target neuron
    pub fn incoming(&self, neuron: u32) -> &[u32] {
        &self.incoming[neuron as usize]
    }

    /// All outgoing adjacency lists, indexed by source neuron
    pub fn outgoing_lists(&self) -> &[SynapseList] {
        &self.outgoing
    }

    /// All incoming adjacency lists, indexed by target neuron
    pub fn incoming_lists(&self) -> &[SynapseList] {
        &self.incoming
    }

    /// The synaptic state matrix
    pub fn state(&self) -> &StateMatrix {
        &self.state
    }

    /// Mutable synaptic state matrix
    pub fn state_mut(&mut self) -> &mut StateMatrix {
        &mut self.state
    }

    /// One synaptic variable's values, by name
    pub fn variable(&self, name: &str) -> Option<&[f32]> {
        self.state.row_index(name).map(|row| self.state.row(row))
    }

    /// Mutable view of one synaptic variable's values, by name
    pub fn variable_mut(&mut self, name: &str) -> Option<&mut [f32]> {
        match self.state.row_index(name) {
            Some(row) => Some(self.state.row_mut(row)),
            None => None,
        }
    }

    /// Disjoint borrows of the id arrays and the state matrix, for rule
    /// execution which reads ids while writing state
    pub(crate) fn split_for_rules(&mut self) -> (&[u32], &[u32], &mut StateMatrix) {
        (&self.pre_ids, &self.post_ids, &mut self.state)
    }

    /// Append a batch of synapses.
    ///
    /// `pre` and `post` must have equal length; every id is validated
    /// against its population size before any structure is touched, so a
    /// failed append leaves the store unchanged. New synapses take delay 0
    /// and each state variable's default. Callers that already know how the
    /// new synapses group by neuron may pass `pre_groups` / `post_groups`
    /// (neuron id to positions within this batch, each position list in
    /// batch order); missing groupings are derived here.
    pub fn append(
        &mut self,
        pre: &[u32],
        post: &[u32],
        pre_groups: Option<BTreeMap<u32, Vec<u32>>>,
        post_groups: Option<BTreeMap<u32, Vec<u32>>>,
    ) -> Result<()> {
        if pre.len() != post.len() {
            return Err(CoreError::invalid_connectivity(format!(
                "batch length mismatch: {} presynaptic vs {} postsynaptic ids",
                pre.len(),
                post.len()
            )));
        }
        if pre.is_empty() {
            return Ok(());
        }
        for &id in pre {
            if id as usize >= self.source_size {
                return Err(CoreError::index_out_of_range(id, self.source_size));
            }
        }
        for &id in post {
            if id as usize >= self.target_size {
                return Err(CoreError::index_out_of_range(id, self.target_size));
            }
        }

        let base = self.pre_ids.len() as u32;
        let n = pre.len();

        self.pre_ids.extend_from(pre);
        self.post_ids.extend_from(post);
        self.delay_pre.grow_by(n, 0);
        self.delay_post.grow_by(n, 0);
        self.state.widen(n);

        let pre_groups = pre_groups.unwrap_or_else(|| group_by_id(pre));
        let post_groups = post_groups.unwrap_or_else(|| group_by_id(post));
        for (neuron, positions) in pre_groups {
            let list = &mut self.outgoing[neuron as usize];
            list.extend(positions.iter().map(|&p| base + p));
        }
        for (neuron, positions) in post_groups {
            let list = &mut self.incoming[neuron as usize];
            list.extend(positions.iter().map(|&p| base + p));
        }

        log::debug!(
            "appended {} synapses (total {}, widths {}/{})",
            n,
            self.len(),
            self.pre_width,
            self.post_width
        );
        Ok(())
    }

    /// Summary counters
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            num_synapses: self.len(),
            source_size: self.source_size,
            target_size: self.target_size,
            max_out_degree: self.outgoing.iter().map(|l| l.len()).max().unwrap_or(0),
            max_in_degree: self.incoming.iter().map(|l| l.len()).max().unwrap_or(0),
            pre_width: self.pre_width,
            post_width: self.post_width,
        }
    }

    fn check_synapse(&self, synapse: u32) -> Result<usize> {
        if (synapse as usize) < self.len() {
            Ok(synapse as usize)
        } else {
            Err(CoreError::index_out_of_range(synapse, self.len()))
        }
    }
}

/// Partition batch positions by id, preserving within-id batch order
fn group_by_id(ids: &[u32]) -> BTreeMap<u32, Vec<u32>> {
    let mut groups: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for (pos, &id) in ids.iter().enumerate() {
        groups.entry(id).or_default().push(pos as u32);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight_var() -> Vec<(String, f32)> {
        vec![("w".to_string(), 1.0)]
    }

    #[test]
    fn test_append_grows_everything() {
        let mut store = ConnectivityStore::new(3, 4, &weight_var()).unwrap();
        store.append(&[0, 0, 2], &[1, 3, 1], None, None).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.pre_ids(), &[0, 0, 2]);
        assert_eq!(store.post_ids(), &[1, 3, 1]);
        assert_eq!(store.delays_pre(), &[0, 0, 0]);
        assert_eq!(store.variable("w").unwrap(), &[1.0, 1.0, 1.0]);

        assert_eq!(store.outgoing(0), &[0, 1]);
        assert_eq!(store.outgoing(2), &[2]);
        assert_eq!(store.incoming(1), &[0, 2]);
        assert_eq!(store.incoming(3), &[1]);
    }

    #[test]
    fn test_second_append_offsets_ids() {
        let mut store = ConnectivityStore::new(2, 2, &weight_var()).unwrap();
        store.append(&[0], &[1], None, None).unwrap();
        store.append(&[0, 1], &[0, 1], None, None).unwrap();

        // synapse ids continue past the first batch
        assert_eq!(store.outgoing(0), &[0, 1]);
        assert_eq!(store.outgoing(1), &[2]);
        assert_eq!(store.incoming(1), &[0, 2]);
    }

    #[test]
    fn test_empty_append_is_noop() {
        let mut store = ConnectivityStore::new(2, 2, &weight_var()).unwrap();
        store.append(&[], &[], None, None).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut store = ConnectivityStore::new(2, 2, &weight_var()).unwrap();
        let result = store.append(&[0, 1], &[0], None, None);
        assert!(matches!(result, Err(CoreError::InvalidConnectivity { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn test_out_of_range_append_is_atomic() {
        let mut store = ConnectivityStore::new(2, 2, &weight_var()).unwrap();
        store.append(&[0], &[0], None, None).unwrap();

        let result = store.append(&[1, 1], &[0, 2], None, None);
        assert!(matches!(
            result,
            Err(CoreError::IndexOutOfRange { index: 2, bound: 2 })
        ));
        // failed batch left nothing behind
        assert_eq!(store.len(), 1);
        assert!(store.outgoing(1).is_empty());
    }

    #[test]
    fn test_precomputed_groups_match_derived() {
        let pre = [1u32, 0, 1];
        let post = [0u32, 1, 1];
        let mut derived = ConnectivityStore::new(2, 2, &weight_var()).unwrap();
        derived.append(&pre, &post, None, None).unwrap();

        let mut supplied = ConnectivityStore::new(2, 2, &weight_var()).unwrap();
        supplied
            .append(
                &pre,
                &post,
                Some(group_by_id(&pre)),
                Some(group_by_id(&post)),
            )
            .unwrap();

        assert_eq!(derived.outgoing_lists(), supplied.outgoing_lists());
        assert_eq!(derived.incoming_lists(), supplied.incoming_lists());
    }

    #[test]
    fn test_group_by_id_preserves_order() {
        let groups = group_by_id(&[3, 1, 3, 3, 1]);
        assert_eq!(groups[&3], vec![0, 2, 3]);
        assert_eq!(groups[&1], vec![1, 4]);
    }

    #[test]
    fn test_delay_setters() {
        let mut store = ConnectivityStore::new(2, 2, &weight_var()).unwrap();
        store.append(&[0, 1], &[1, 0], None, None).unwrap();
        store.set_delay_pre(1, 5).unwrap();
        assert_eq!(store.delays_pre(), &[0, 5]);

        assert!(store.set_delay_pre(2, 1).is_err());
    }

    #[test]
    fn test_stats() {
        let mut store = ConnectivityStore::new(300, 2, &weight_var()).unwrap();
        store.append(&[0, 0, 299], &[0, 1, 0], None, None).unwrap();
        let stats = store.stats();
        assert_eq!(stats.num_synapses, 3);
        assert_eq!(stats.max_out_degree, 2);
        assert_eq!(stats.max_in_degree, 2);
        assert_eq!(stats.pre_width, IndexWidth::U16);
        assert_eq!(stats.post_width, IndexWidth::U8);
    }
}
