//! Delayed event routing
//!
//! Spikes fan out to synapse ids and sit in a circular schedule until
//! their per-synapse delay elapses. The queue is a ring of slots, one per
//! step of the delay horizon; the cursor's slot holds the events due now.

use crate::store::SynapseList;

/// Anything that yields due synapse events step by step.
///
/// One step of the engine is: route newly fired spikes in, [`peek`] the
/// due set, apply rules, then [`advance`].
///
/// [`peek`]: EventRouter::peek
/// [`advance`]: EventRouter::advance
pub trait EventRouter {
    /// Synapse events due at the current step, in insertion order
    fn peek(&self) -> &[u32];

    /// Discard the current slot and move to the next step
    fn advance(&mut self);
}

/// Ring-buffer spike queue with per-synapse integer delays.
///
/// The ring has `max_delay + 1` slots so that a delay of `max_delay` lands
/// exactly one slot behind the cursor. Delays outside `[0, max_delay]` are
/// clamped into the horizon rather than rejected; a delay of zero delivers
/// within the same step's peek.
#[derive(Debug, Clone)]
pub struct SpikeQueue {
    slots: Vec<Vec<u32>>,
    cursor: usize,
    max_delay: u16,
}

impl SpikeQueue {
    /// Create a queue able to hold delays up to `max_delay` steps
    pub fn new(max_delay: u16) -> Self {
        Self {
            slots: vec![Vec::new(); max_delay as usize + 1],
            cursor: 0,
            max_delay,
        }
    }

    /// Delay horizon in steps
    pub fn max_delay(&self) -> u16 {
        self.max_delay
    }

    /// Fan fired neurons out to their synapses and schedule each at its
    /// delay.
    ///
    /// `adjacency` maps a neuron id to its synapse list and `delays` holds
    /// one delay per synapse, both as kept by the connectivity store.
    pub fn enqueue(&mut self, fired: &[u32], adjacency: &[SynapseList], delays: &[i16]) {
        let horizon = self.slots.len();
        for &neuron in fired {
            for &synapse in &adjacency[neuron as usize] {
                let delay = delays[synapse as usize]
                    .clamp(0, self.max_delay as i16) as usize;
                let slot = (self.cursor + delay) % horizon;
                self.slots[slot].push(synapse);
            }
        }
    }

    /// Total events waiting across all slots
    pub fn pending(&self) -> usize {
        self.slots.iter().map(|s| s.len()).sum()
    }

    /// Drop all scheduled events and rewind the cursor
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
        self.cursor = 0;
    }
}

impl EventRouter for SpikeQueue {
    fn peek(&self) -> &[u32] {
        &self.slots[self.cursor]
    }

    fn advance(&mut self) {
        self.slots[self.cursor].clear();
        self.cursor = (self.cursor + 1) % self.slots.len();
    }
}
