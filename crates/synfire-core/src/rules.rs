//! Update-rule compilation and execution
//!
//! A rule is a small program run against one synapse at a time. Compilation
//! resolves every identifier once, to a state-matrix row, a linked-population
//! variable, or a builtin; execution binds fresh array references each step
//! so growth between steps is always observed.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

use synfire_expr::{Program, Scope};

use crate::dynarray::StateMatrix;
use crate::error::{CoreError, Result};
use crate::population::Population;
use crate::store::ConnectivityStore;

/// Which spike stream a rule listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleDirection {
    /// Triggered by source-population spikes; linked variables index the
    /// target population through `post_ids`
    Presynaptic,
    /// Triggered by target-population spikes; linked variables index the
    /// source population through `pre_ids`
    Postsynaptic,
}

/// How simultaneous events converging on one neuron are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictMode {
    /// Apply the rule once per distinct linked neuron per step; duplicate
    /// events are consumed without a second application
    Resolved,
    /// Apply the rule to every due synapse in order; the caller asserts the
    /// due set never converges on one neuron
    Direct,
}

/// What a rule identifier resolves to
#[derive(Debug, Clone, PartialEq)]
enum Binding {
    /// Row in the synaptic state matrix
    Synaptic(usize),
    /// Named variable of the linked population
    Linked(String),
    /// Current simulation time in milliseconds (`t`)
    Time,
    /// Number of due events this step (`n`)
    EventCount,
}

/// A compiled update rule, bound to a direction and conflict mode
#[derive(Debug, Clone)]
pub struct UpdateRule {
    program: Program,
    direction: RuleDirection,
    mode: ConflictMode,
    bindings: HashMap<String, Binding>,
    writes_linked: bool,
}

impl UpdateRule {
    /// Compile a program against the synaptic state matrix and the linked
    /// population's variable names.
    ///
    /// Identifiers resolving to neither side, and assignments to the
    /// builtins `t` or `n`, are rejected here rather than at step time.
    pub fn new(
        program: Program,
        direction: RuleDirection,
        mode: ConflictMode,
        state: &StateMatrix,
        linked_vars: &[String],
    ) -> Result<Self> {
        let mut bindings = HashMap::new();
        for name in program.identifiers() {
            let binding = match name.as_str() {
                "t" => Binding::Time,
                "n" => Binding::EventCount,
                _ => {
                    if let Some(row) = state.row_index(&name) {
                        Binding::Synaptic(row)
                    } else if linked_vars.iter().any(|v| v == &name) {
                        Binding::Linked(name.clone())
                    } else {
                        return Err(CoreError::rule_compilation(format!(
                            "unknown identifier '{}' (not a synaptic or linked variable)",
                            name
                        )));
                    }
                }
            };
            bindings.insert(name, binding);
        }
        for target in program.targets() {
            if matches!(
                bindings.get(&target),
                Some(Binding::Time) | Some(Binding::EventCount)
            ) {
                return Err(CoreError::rule_compilation(format!(
                    "cannot assign to builtin '{}'",
                    target
                )));
            }
        }
        let writes_linked = program
            .targets()
            .iter()
            .any(|t| matches!(bindings.get(t), Some(Binding::Linked(_))));
        Ok(Self {
            program,
            direction,
            mode,
            bindings,
            writes_linked,
        })
    }

    /// Parse rule text and compile it
    pub fn parse(
        text: &str,
        direction: RuleDirection,
        mode: ConflictMode,
        state: &StateMatrix,
        linked_vars: &[String],
    ) -> Result<Self> {
        let program = synfire_expr::parse_program(text)?;
        Self::new(program, direction, mode, state, linked_vars)
    }

    /// Direction this rule is attached to
    pub fn direction(&self) -> RuleDirection {
        self.direction
    }

    /// Conflict handling mode
    pub fn mode(&self) -> ConflictMode {
        self.mode
    }

    /// Whether any statement writes a linked-population variable
    pub fn writes_linked(&self) -> bool {
        self.writes_linked
    }

    /// Run the rule over the due synapse set.
    ///
    /// `linked` is the population on the far side of the rule's direction.
    /// Evaluation failure aborts the step with no rollback of statements
    /// already applied.
    pub fn run(
        &self,
        due: &[u32],
        store: &mut ConnectivityStore,
        linked: &mut dyn Population,
        t_ms: f32,
        rng: &mut StdRng,
    ) -> Result<()> {
        if due.is_empty() {
            return Ok(());
        }
        let (pre_ids, post_ids, state) = store.split_for_rules();
        let linked_ids = match self.direction {
            RuleDirection::Presynaptic => post_ids,
            RuleDirection::Postsynaptic => pre_ids,
        };
        let mut scope = ExecScope {
            bindings: &self.bindings,
            state,
            linked_ids,
            linked,
            synapse: 0,
            t_ms,
            event_count: due.len() as f32,
            rng,
        };

        match self.mode {
            ConflictMode::Resolved => {
                // Worklist over the due set: each pass keeps one synapse per
                // distinct linked neuron and defers the rest. A neuron's rule
                // fires on its first-occurrence synapse only; later passes
                // consume that neuron's duplicates without reapplying.
                let mut remaining: Vec<u32> = due.to_vec();
                let mut updated: HashSet<u32> = HashSet::new();
                while !remaining.is_empty() {
                    let mut seen: HashSet<u32> = HashSet::new();
                    let mut deferred = Vec::new();
                    for &synapse in &remaining {
                        let neuron = linked_ids[synapse as usize];
                        if seen.insert(neuron) {
                            if updated.insert(neuron) {
                                scope.apply(&self.program, synapse, t_ms)?;
                            }
                        } else {
                            deferred.push(synapse);
                        }
                    }
                    remaining = deferred;
                }
            }
            ConflictMode::Direct => {
                if self.writes_linked {
                    debug_assert!(
                        distinct_targets(due, linked_ids),
                        "direct-mode rule writes linked variables but the due \
                         set converges on one neuron"
                    );
                }
                for &synapse in due {
                    scope.apply(&self.program, synapse, t_ms)?;
                }
            }
        }
        Ok(())
    }
}

fn distinct_targets(due: &[u32], linked_ids: &[u32]) -> bool {
    let mut seen = HashSet::new();
    due.iter().all(|&s| seen.insert(linked_ids[s as usize]))
}

/// Per-step evaluation scope: one synapse at a time over the state matrix
/// and the linked population's arrays
struct ExecScope<'a> {
    bindings: &'a HashMap<String, Binding>,
    state: &'a mut StateMatrix,
    linked_ids: &'a [u32],
    linked: &'a mut dyn Population,
    synapse: usize,
    t_ms: f32,
    event_count: f32,
    rng: &'a mut StdRng,
}

impl ExecScope<'_> {
    fn apply(&mut self, program: &Program, synapse: u32, t_ms: f32) -> Result<()> {
        self.synapse = synapse as usize;
        program
            .run(self)
            .map_err(|e| CoreError::rule_execution(t_ms, e.to_string()))
    }

    fn linked_index(&self) -> usize {
        self.linked_ids[self.synapse] as usize
    }
}

impl Scope for ExecScope<'_> {
    fn load(&mut self, name: &str) -> Option<f32> {
        match self.bindings.get(name)? {
            Binding::Synaptic(row) => Some(self.state.value(*row, self.synapse)),
            Binding::Linked(var) => {
                let idx = self.linked_index();
                self.linked.variable(var).map(|values| values[idx])
            }
            Binding::Time => Some(self.t_ms),
            Binding::EventCount => Some(self.event_count),
        }
    }

    fn store(&mut self, name: &str, value: f32) -> bool {
        match self.bindings.get(name) {
            Some(Binding::Synaptic(row)) => {
                self.state.set_value(*row, self.synapse, value);
                true
            }
            Some(Binding::Linked(var)) => {
                let idx = self.linked_index();
                match self.linked.variable_mut(var) {
                    Some(values) => {
                        values[idx] = value;
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }

    fn call(&mut self, name: &str, _args: &[f32]) -> Option<f32> {
        match name {
            "rand" => Some(self.rng.gen::<f32>()),
            "randn" => Some(self.rng.sample::<f32, _>(StandardNormal)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::NeuronGroup;
    use rand::SeedableRng;

    fn store_with(pre: &[u32], post: &[u32], vars: &[(&str, f32)]) -> ConnectivityStore {
        let vars: Vec<(String, f32)> = vars.iter().map(|(n, d)| (n.to_string(), *d)).collect();
        let sources = pre.iter().max().map(|&m| m as usize + 1).unwrap_or(1);
        let targets = post.iter().max().map(|&m| m as usize + 1).unwrap_or(1);
        let mut store = ConnectivityStore::new(sources, targets, &vars).unwrap();
        store.append(pre, post, None, None).unwrap();
        store
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_unknown_identifier_rejected_at_compile() {
        let store = store_with(&[0], &[0], &[("w", 1.0)]);
        let result = UpdateRule::parse(
            "v += ghost",
            RuleDirection::Presynaptic,
            ConflictMode::Resolved,
            store.state(),
            &["v".to_string()],
        );
        assert!(matches!(result, Err(CoreError::RuleCompilation { .. })));
    }

    #[test]
    fn test_builtin_assignment_rejected() {
        let store = store_with(&[0], &[0], &[("w", 1.0)]);
        let result = UpdateRule::parse(
            "t = 0",
            RuleDirection::Presynaptic,
            ConflictMode::Resolved,
            store.state(),
            &[],
        );
        assert!(matches!(result, Err(CoreError::RuleCompilation { .. })));
    }

    #[test]
    fn test_presynaptic_rule_writes_target_variable() {
        let mut store = store_with(&[0, 0], &[0, 1], &[("w", 2.0)]);
        let mut target = NeuronGroup::new(2).with_variable("v", 0.0);
        let rule = UpdateRule::parse(
            "v += w",
            RuleDirection::Presynaptic,
            ConflictMode::Resolved,
            store.state(),
            &target.variable_names(),
        )
        .unwrap();

        rule.run(&[0, 1], &mut store, &mut target, 0.0, &mut rng())
            .unwrap();
        assert_eq!(target.variable("v").unwrap(), &[2.0, 2.0]);
    }

    #[test]
    fn test_resolved_mode_fires_once_per_target() {
        // six due synapses landing on targets [3,5,3,7,5,3]
        let mut store = store_with(
            &[0, 0, 0, 0, 0, 0],
            &[3, 5, 3, 7, 5, 3],
            &[("w", 1.0)],
        );
        let mut target = NeuronGroup::new(8).with_variable("counter", 0.0);
        let rule = UpdateRule::parse(
            "counter += 1",
            RuleDirection::Presynaptic,
            ConflictMode::Resolved,
            store.state(),
            &target.variable_names(),
        )
        .unwrap();

        rule.run(&[0, 1, 2, 3, 4, 5], &mut store, &mut target, 0.0, &mut rng())
            .unwrap();
        let counter = target.variable("counter").unwrap();
        assert_eq!(counter[3], 1.0);
        assert_eq!(counter[5], 1.0);
        assert_eq!(counter[7], 1.0);
        assert_eq!(counter.iter().sum::<f32>(), 3.0);
    }

    #[test]
    fn test_resolved_mode_still_reaches_every_synapse_variable() {
        // synapse-local writes happen once per distinct target, using the
        // first-occurrence synapse's context
        let mut store = store_with(&[0, 0, 0], &[1, 1, 2], &[("w", 0.0)]);
        let mut target = NeuronGroup::new(3).with_variable("v", 0.0);
        let rule = UpdateRule::parse(
            "w += 1\nv += 1",
            RuleDirection::Presynaptic,
            ConflictMode::Resolved,
            store.state(),
            &target.variable_names(),
        )
        .unwrap();
        rule.run(&[0, 1, 2], &mut store, &mut target, 0.0, &mut rng())
            .unwrap();
        assert_eq!(store.variable("w").unwrap(), &[1.0, 0.0, 1.0]);
        assert_eq!(target.variable("v").unwrap(), &[0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_direct_mode_applies_every_event() {
        let mut store = store_with(&[0, 0, 0], &[0, 1, 2], &[("apre", 0.0)]);
        let mut target = NeuronGroup::new(3);
        let rule = UpdateRule::parse(
            "apre += 1",
            RuleDirection::Presynaptic,
            ConflictMode::Direct,
            store.state(),
            &[],
        )
        .unwrap();
        rule.run(&[0, 1, 2], &mut store, &mut target, 0.0, &mut rng())
            .unwrap();
        assert_eq!(store.variable("apre").unwrap(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_postsynaptic_rule_indexes_through_pre_ids() {
        let mut store = store_with(&[1, 2], &[0, 0], &[("w", 0.0)]);
        let mut source = NeuronGroup::new(3).with_variable("trace", 5.0);
        let rule = UpdateRule::parse(
            "w = trace",
            RuleDirection::Postsynaptic,
            ConflictMode::Direct,
            store.state(),
            &source.variable_names(),
        )
        .unwrap();
        rule.run(&[0, 1], &mut store, &mut source, 0.0, &mut rng())
            .unwrap();
        assert_eq!(store.variable("w").unwrap(), &[5.0, 5.0]);
    }

    #[test]
    fn test_time_and_count_builtins() {
        let mut store = store_with(&[0, 0], &[0, 1], &[("last", 0.0), ("seen", 0.0)]);
        let mut target = NeuronGroup::new(2);
        let rule = UpdateRule::parse(
            "last = t\nseen = n",
            RuleDirection::Presynaptic,
            ConflictMode::Direct,
            store.state(),
            &[],
        )
        .unwrap();
        rule.run(&[0, 1], &mut store, &mut target, 12.5, &mut rng())
            .unwrap();
        assert_eq!(store.variable("last").unwrap(), &[12.5, 12.5]);
        assert_eq!(store.variable("seen").unwrap(), &[2.0, 2.0]);
    }

    #[test]
    fn test_empty_due_set_is_noop() {
        let mut store = store_with(&[0], &[0], &[("w", 1.0)]);
        let mut target = NeuronGroup::new(1).with_variable("v", 0.0);
        let rule = UpdateRule::parse(
            "v += w",
            RuleDirection::Presynaptic,
            ConflictMode::Resolved,
            store.state(),
            &target.variable_names(),
        )
        .unwrap();
        rule.run(&[], &mut store, &mut target, 0.0, &mut rng())
            .unwrap();
        assert_eq!(target.variable("v").unwrap(), &[0.0]);
    }

    #[test]
    fn test_rand_is_deterministic_per_seed() {
        let mut store = store_with(&[0], &[0], &[("w", 0.0)]);
        let mut target = NeuronGroup::new(1);
        let rule = UpdateRule::parse(
            "w = rand()",
            RuleDirection::Presynaptic,
            ConflictMode::Direct,
            store.state(),
            &[],
        )
        .unwrap();

        rule.run(&[0], &mut store, &mut target, 0.0, &mut rng())
            .unwrap();
        let first = store.variable("w").unwrap()[0];
        assert!(first >= 0.0 && first < 1.0);

        rule.run(&[0], &mut store, &mut target, 0.0, &mut rng())
            .unwrap();
        assert_eq!(store.variable("w").unwrap()[0], first);
    }
}
