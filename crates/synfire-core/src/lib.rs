//! Synaptic connectivity, delayed event routing, and update-rule execution
//! for discrete-time spiking-network simulation.
//!
//! The engine sits between two neuron [`Population`]s. A growable
//! [`ConnectivityStore`] holds per-synapse state as flat arrays plus
//! per-neuron adjacency lists; a ring-buffer [`SpikeQueue`] routes spikes
//! to synapses after per-synapse integer delays; compiled [`UpdateRule`]s
//! run against each due synapse, with presynaptic conflicts resolved so a
//! rule fires once per distinct target per step.
//!
//! # Example
//!
//! ```
//! use synfire_core::{
//!     Connect, NeuronGroup, Selector, SynapseModel, Synapses, SynapsesConfig,
//! };
//!
//! # fn main() -> synfire_core::Result<()> {
//! let mut source = NeuronGroup::new(10);
//! let mut target = NeuronGroup::new(10).with_variable("v", 0.0);
//!
//! let config = SynapsesConfig::new(SynapseModel::new().variable("w", 0.5))
//!     .with_on_pre("v += w");
//! let mut synapses = Synapses::new(&source, &target, config)?;
//! synapses.connect(Selector::All, Selector::All, Connect::Probability(0.2))?;
//!
//! source.set_fired(&[3])?;
//! synapses.update(&mut source, &mut target)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod clock;
pub mod connect;
pub mod dynarray;
pub mod error;
pub mod index;
pub mod population;
pub mod queue;
pub mod rules;
pub mod store;
pub mod synapses;

pub use clock::Clock;
pub use connect::{Connect, Selector};
pub use dynarray::{DynArray, StateMatrix};
pub use error::{CoreError, Result};
pub use index::IndexWidth;
pub use population::{NeuronGroup, Population};
pub use queue::{EventRouter, SpikeQueue};
pub use rules::{ConflictMode, RuleDirection, UpdateRule};
pub use store::{ConnectivityStore, StoreStats, SynapseList};
pub use synapses::{SynapseModel, Synapses, SynapsesConfig};

/// Crate version, from the workspace manifest
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
