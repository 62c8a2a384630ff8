//! The synapse engine
//!
//! [`Synapses`] owns the connectivity store, the spike routers, and the
//! compiled update rules. Populations are borrowed per step, never owned,
//! so the engine composes with any neuron model implementing
//! [`Population`].

use std::collections::BTreeMap;

use rand::distributions::{Bernoulli, Distribution};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use synfire_expr::{parse_expression, parse_program, AssignOp, Expr, Program, Scope, Stmt};

use crate::clock::Clock;
use crate::connect::{Connect, Selector};
use crate::error::{CoreError, Result};
use crate::population::Population;
use crate::queue::{EventRouter, SpikeQueue};
use crate::rules::{ConflictMode, RuleDirection, UpdateRule};
use crate::store::{ConnectivityStore, StoreStats};

/// Variable name auto-registered when a rule measures time since the
/// previous event
const LASTUPDATE: &str = "lastupdate";

/// Synaptic state declaration: named per-synapse variables with defaults
#[derive(Debug, Clone, Default)]
pub struct SynapseModel {
    variables: Vec<(String, f32)>,
}

impl SynapseModel {
    /// A model with no variables
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a per-synapse variable with a default value
    pub fn variable(mut self, name: impl Into<String>, default: f32) -> Self {
        self.variables.push((name.into(), default));
        self
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct SynapsesConfig {
    /// Synaptic state declaration
    pub model: SynapseModel,
    /// Rule run when a presynaptic spike arrives
    pub on_pre: Option<String>,
    /// Rule run when a postsynaptic spike arrives
    pub on_post: Option<String>,
    /// Conflict handling for the presynaptic rule
    pub pre_mode: ConflictMode,
    /// Delay horizon in steps, for both directions
    pub max_delay: u16,
    /// Step size in milliseconds
    pub dt_ms: f32,
    /// Seed for `rand()` / `randn()` and the probabilistic connect forms
    pub seed: u64,
}

impl Default for SynapsesConfig {
    fn default() -> Self {
        Self {
            model: SynapseModel::new(),
            on_pre: None,
            on_post: None,
            pre_mode: ConflictMode::Resolved,
            max_delay: 0,
            dt_ms: 0.1,
            seed: 42,
        }
    }
}

impl SynapsesConfig {
    /// Configuration with the given model and otherwise default settings
    pub fn new(model: SynapseModel) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }

    /// Set the presynaptic rule text
    pub fn with_on_pre(mut self, rule: impl Into<String>) -> Self {
        self.on_pre = Some(rule.into());
        self
    }

    /// Set the postsynaptic rule text
    pub fn with_on_post(mut self, rule: impl Into<String>) -> Self {
        self.on_post = Some(rule.into());
        self
    }

    /// Set the presynaptic conflict mode
    pub fn with_pre_mode(mut self, mode: ConflictMode) -> Self {
        self.pre_mode = mode;
        self
    }

    /// Set the delay horizon in steps
    pub fn with_max_delay(mut self, steps: u16) -> Self {
        self.max_delay = steps;
        self
    }

    /// Set the step size in milliseconds
    pub fn with_dt_ms(mut self, dt_ms: f32) -> Self {
        self.dt_ms = dt_ms;
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Synaptic connectivity and event propagation between two populations.
///
/// Construction compiles the rules against the declared synaptic state and
/// the populations' variable names; population sizes are fixed from that
/// point on. Synapses are added through the `connect_*` methods and never
/// removed.
#[derive(Debug)]
pub struct Synapses {
    store: ConnectivityStore,
    clock: Clock,
    pre_queue: SpikeQueue,
    post_queue: Option<SpikeQueue>,
    pre_rule: Option<UpdateRule>,
    post_rule: Option<UpdateRule>,
    rng: StdRng,
}

impl Synapses {
    /// Build an engine between `source` and `target`.
    ///
    /// Rule text is parsed and compiled here; a rule referencing
    /// `lastupdate` auto-registers that synaptic variable (default `-1e6`)
    /// and every rule then records `lastupdate = t` after its own
    /// statements.
    pub fn new(
        source: &dyn Population,
        target: &dyn Population,
        config: SynapsesConfig,
    ) -> Result<Self> {
        let mut variables = config.model.variables.clone();
        for (name, _) in &variables {
            if name == "t" || name == "n" {
                return Err(CoreError::invalid_model(format!(
                    "variable name '{}' collides with a rule builtin",
                    name
                )));
            }
        }

        let mut pre_program = match &config.on_pre {
            Some(text) => Some(parse_program(text)?),
            None => None,
        };
        let mut post_program = match &config.on_post {
            Some(text) => Some(parse_program(text)?),
            None => None,
        };

        let uses_lastupdate = [&pre_program, &post_program]
            .iter()
            .any(|p| p.as_ref().map(|p| p.references(LASTUPDATE)).unwrap_or(false));
        if uses_lastupdate {
            if !variables.iter().any(|(n, _)| n == LASTUPDATE) {
                variables.push((LASTUPDATE.to_string(), -1.0e6));
            }
            for program in [&mut pre_program, &mut post_program].into_iter().flatten() {
                append_lastupdate(program);
            }
        }

        let store = ConnectivityStore::new(source.size(), target.size(), &variables)?;

        let pre_rule = match pre_program {
            Some(program) => Some(UpdateRule::new(
                program,
                RuleDirection::Presynaptic,
                config.pre_mode,
                store.state(),
                &target.variable_names(),
            )?),
            None => None,
        };
        let post_rule = match post_program {
            Some(program) => Some(UpdateRule::new(
                program,
                RuleDirection::Postsynaptic,
                ConflictMode::Direct,
                store.state(),
                &source.variable_names(),
            )?),
            None => None,
        };

        let post_queue = post_rule
            .is_some()
            .then(|| SpikeQueue::new(config.max_delay));

        log::info!(
            "synapse engine: {} -> {} neurons, rules pre={} post={}, horizon {} steps",
            source.size(),
            target.size(),
            pre_rule.is_some(),
            post_rule.is_some(),
            config.max_delay
        );

        Ok(Self {
            store,
            clock: Clock::new(config.dt_ms),
            pre_queue: SpikeQueue::new(config.max_delay),
            post_queue,
            pre_rule,
            post_rule,
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// Number of synapses
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether no synapses exist yet
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// The connectivity store
    pub fn store(&self) -> &ConnectivityStore {
        &self.store
    }

    /// The simulation clock
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// One synaptic variable's values, by name
    pub fn variable(&self, name: &str) -> Option<&[f32]> {
        self.store.variable(name)
    }

    /// Mutable view of one synaptic variable's values
    pub fn variable_mut(&mut self, name: &str) -> Option<&mut [f32]> {
        self.store.variable_mut(name)
    }

    /// Set the forward (pre-to-post) delay of one synapse, in steps
    pub fn set_delay(&mut self, synapse: u32, steps: i16) -> Result<()> {
        self.store.set_delay_pre(synapse, steps)
    }

    /// Set the forward delay of every synapse, in steps
    pub fn set_delays(&mut self, steps: i16) {
        self.store.fill_delays_pre(steps);
    }

    /// Set the backward (post-to-pre) delay of one synapse, in steps
    pub fn set_delay_post(&mut self, synapse: u32, steps: i16) -> Result<()> {
        self.store.set_delay_post(synapse, steps)
    }

    /// Set the backward delay of every synapse, in steps
    pub fn set_delays_post(&mut self, steps: i16) {
        self.store.fill_delays_post(steps);
    }

    /// Summary counters for the store
    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Wire the selected subsets together per the given form
    pub fn connect(
        &mut self,
        pre: impl Into<Selector>,
        post: impl Into<Selector>,
        form: Connect,
    ) -> Result<()> {
        let pre_sel = pre.into().resolve(self.store.source_size())?;
        let post_sel = post.into().resolve(self.store.target_size())?;

        match form {
            Connect::All => self.connect_full(&pre_sel, &post_sel, 1),
            Connect::Count(0) => Err(CoreError::unsupported(
                "connecting with count 0 (synapse deletion)",
            )),
            Connect::Count(k) => self.connect_full(&pre_sel, &post_sel, k),
            Connect::Probability(p) => {
                if !(0.0..=1.0).contains(&p) {
                    return Err(CoreError::invalid_connectivity(format!(
                        "connection probability {} outside [0, 1]",
                        p
                    )));
                }
                let coin = Bernoulli::new(p as f64)
                    .map_err(|e| CoreError::invalid_connectivity(e.to_string()))?;
                self.connect_where(&pre_sel, &post_sel, |_, _, rng| coin.sample(rng))
            }
            Connect::Expression(text) => {
                let expr = parse_expression(&text)?;
                let as_mask = expr.is_boolean();
                let mut failure = None;
                let result = self.connect_where(&pre_sel, &post_sel, |i, j, rng| {
                    if failure.is_some() {
                        return false;
                    }
                    let mut scope = PairScope {
                        i: i as f32,
                        j: j as f32,
                        rng,
                    };
                    match expr.eval(&mut scope) {
                        Ok(value) => {
                            if as_mask {
                                value != 0.0
                            } else {
                                scope.rng.gen::<f32>() < value
                            }
                        }
                        Err(e) => {
                            failure = Some(e);
                            false
                        }
                    }
                });
                match failure {
                    Some(e) => Err(e.into()),
                    None => result,
                }
            }
        }
    }

    /// For each selected presynaptic neuron, connect to exactly `degree`
    /// distinct postsynaptic targets drawn without replacement from the
    /// postsynaptic selection
    pub fn connect_random(
        &mut self,
        pre: impl Into<Selector>,
        post: impl Into<Selector>,
        degree: usize,
    ) -> Result<()> {
        let pre_sel = pre.into().resolve(self.store.source_size())?;
        let post_sel = post.into().resolve(self.store.target_size())?;
        if degree > post_sel.len() {
            return Err(CoreError::invalid_connectivity(format!(
                "degree {} exceeds postsynaptic selection of {}",
                degree,
                post_sel.len()
            )));
        }

        let mut pre_ids = Vec::with_capacity(pre_sel.len() * degree);
        let mut post_ids = Vec::with_capacity(pre_sel.len() * degree);
        for &i in &pre_sel {
            let picks = rand::seq::index::sample(&mut self.rng, post_sel.len(), degree);
            for pos in picks {
                pre_ids.push(i);
                post_ids.push(post_sel[pos]);
            }
        }
        let pre_groups = contiguous_groups(&pre_sel, degree);
        self.store
            .append(&pre_ids, &post_ids, Some(pre_groups), None)
    }

    /// Append a raw batch of synapses, one per (pre, post) pair.
    ///
    /// This is the primitive every `connect` form lowers to, exposed for
    /// callers that compute their own pairings. Ids are validated against
    /// the population sizes; a failed batch appends nothing.
    pub fn create_synapses(&mut self, pre: &[u32], post: &[u32]) -> Result<()> {
        self.store.append(pre, post, None, None)
    }

    /// Synapse removal is rejected by design
    pub fn disconnect(&mut self) -> Result<()> {
        Err(CoreError::unsupported("synapse deletion"))
    }

    /// Dense connectivity-matrix assignment is rejected by design; use the
    /// `connect` forms, which only ever add synapses
    pub fn connect_dense(&mut self, _matrix: &[bool]) -> Result<()> {
        Err(CoreError::unsupported("dense connectivity matrix assignment"))
    }

    /// Run one simulation step.
    ///
    /// Phase order is contractual: newly fired presynaptic spikes are
    /// routed and the due presynaptic events applied before the
    /// postsynaptic phase runs; the clock advances last.
    pub fn update(
        &mut self,
        source: &mut dyn Population,
        target: &mut dyn Population,
    ) -> Result<()> {
        let t_ms = self.clock.now_ms();

        self.pre_queue
            .enqueue(source.fired(), self.store.outgoing_lists(), self.store.delays_pre());
        if let Some(rule) = &self.pre_rule {
            let due = self.pre_queue.peek();
            if !due.is_empty() {
                log::trace!("t={}ms: {} presynaptic events due", t_ms, due.len());
                rule.run(due, &mut self.store, target, t_ms, &mut self.rng)?;
            }
        }
        self.pre_queue.advance();

        if let (Some(rule), Some(queue)) = (&self.post_rule, &mut self.post_queue) {
            queue.enqueue(target.fired(), self.store.incoming_lists(), self.store.delays_post());
            let due = queue.peek();
            if !due.is_empty() {
                log::trace!("t={}ms: {} postsynaptic events due", t_ms, due.len());
                rule.run(due, &mut self.store, source, t_ms, &mut self.rng)?;
            }
            queue.advance();
        }

        self.clock.tick();
        Ok(())
    }

    fn connect_full(&mut self, pre_sel: &[u32], post_sel: &[u32], k: u32) -> Result<()> {
        let per_pre = post_sel.len() * k as usize;
        let mut pre_ids = Vec::with_capacity(pre_sel.len() * per_pre);
        let mut post_ids = Vec::with_capacity(pre_sel.len() * per_pre);
        for &i in pre_sel {
            for &j in post_sel {
                for _ in 0..k {
                    pre_ids.push(i);
                    post_ids.push(j);
                }
            }
        }
        let pre_groups = contiguous_groups(pre_sel, per_pre);
        self.store
            .append(&pre_ids, &post_ids, Some(pre_groups), None)
    }

    fn connect_where<F>(&mut self, pre_sel: &[u32], post_sel: &[u32], mut keep: F) -> Result<()>
    where
        F: FnMut(u32, u32, &mut StdRng) -> bool,
    {
        let mut pre_ids = Vec::new();
        let mut post_ids = Vec::new();
        for &i in pre_sel {
            for &j in post_sel {
                if keep(i, j, &mut self.rng) {
                    pre_ids.push(i);
                    post_ids.push(j);
                }
            }
        }
        self.store.append(&pre_ids, &post_ids, None, None)
    }
}

/// Batch grouping for pre-contiguous orderings: each selected neuron owns
/// the next `per_pre` batch positions
fn contiguous_groups(pre_sel: &[u32], per_pre: usize) -> BTreeMap<u32, Vec<u32>> {
    let mut groups: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for (slot, &i) in pre_sel.iter().enumerate() {
        let start = (slot * per_pre) as u32;
        groups
            .entry(i)
            .or_default()
            .extend(start..start + per_pre as u32);
    }
    groups
}

fn append_lastupdate(program: &mut Program) {
    program.stmts.push(Stmt {
        target: LASTUPDATE.to_string(),
        op: AssignOp::Set,
        value: Expr::Variable("t".to_string()),
    });
}

/// Scope for connectivity predicates: `i` and `j` plus the random builtins
struct PairScope<'a> {
    i: f32,
    j: f32,
    rng: &'a mut StdRng,
}

impl Scope for PairScope<'_> {
    fn load(&mut self, name: &str) -> Option<f32> {
        match name {
            "i" => Some(self.i),
            "j" => Some(self.j),
            _ => None,
        }
    }

    fn store(&mut self, _name: &str, _value: f32) -> bool {
        false
    }

    fn call(&mut self, name: &str, _args: &[f32]) -> Option<f32> {
        match name {
            "rand" => Some(self.rng.gen::<f32>()),
            "randn" => Some(self.rng.sample::<f32, _>(rand_distr::StandardNormal)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::NeuronGroup;

    fn engine(sources: usize, targets: usize) -> (Synapses, NeuronGroup, NeuronGroup) {
        let source = NeuronGroup::new(sources);
        let target = NeuronGroup::new(targets).with_variable("v", 0.0);
        let config = SynapsesConfig::new(SynapseModel::new().variable("w", 1.0))
            .with_on_pre("v += w");
        let synapses = Synapses::new(&source, &target, config).unwrap();
        (synapses, source, target)
    }

    #[test]
    fn test_count_form_cardinality() {
        let (mut syn, _, _) = engine(3, 4);
        syn.connect(Selector::All, Selector::All, Connect::Count(2))
            .unwrap();
        assert_eq!(syn.len(), 3 * 4 * 2);
        // each pre adjacency grows by n*k, each post by m*k
        for i in 0..3 {
            assert_eq!(syn.store().outgoing(i).len(), 4 * 2);
        }
        for j in 0..4 {
            assert_eq!(syn.store().incoming(j).len(), 3 * 2);
        }
    }

    #[test]
    fn test_count_form_pre_contiguous_order() {
        let (mut syn, _, _) = engine(2, 2);
        syn.connect(Selector::All, Selector::All, Connect::All)
            .unwrap();
        assert_eq!(syn.store().pre_ids(), &[0, 0, 1, 1]);
        assert_eq!(syn.store().post_ids(), &[0, 1, 0, 1]);
        assert_eq!(syn.store().outgoing(0), &[0, 1]);
        assert_eq!(syn.store().outgoing(1), &[2, 3]);
    }

    #[test]
    fn test_count_zero_rejected() {
        let (mut syn, _, _) = engine(2, 2);
        let result = syn.connect(Selector::All, Selector::All, Connect::Count(0));
        assert!(matches!(result, Err(CoreError::Unsupported { .. })));
    }

    #[test]
    fn test_empty_selection_is_noop() {
        let (mut syn, _, _) = engine(3, 3);
        syn.connect(Selector::List(vec![]), Selector::All, Connect::All)
            .unwrap();
        assert!(syn.is_empty());
    }

    #[test]
    fn test_probability_extremes() {
        let (mut syn, _, _) = engine(4, 4);
        syn.connect(Selector::All, Selector::All, Connect::Probability(0.0))
            .unwrap();
        assert!(syn.is_empty());
        syn.connect(Selector::All, Selector::All, Connect::Probability(1.0))
            .unwrap();
        assert_eq!(syn.len(), 16);

        let result = syn.connect(Selector::All, Selector::All, Connect::Probability(1.5));
        assert!(matches!(result, Err(CoreError::InvalidConnectivity { .. })));
    }

    #[test]
    fn test_expression_mask_diagonal() {
        let (mut syn, _, _) = engine(5, 5);
        syn.connect(
            Selector::All,
            Selector::All,
            Connect::Expression("i == j".to_string()),
        )
        .unwrap();
        assert_eq!(syn.len(), 5);
        assert_eq!(syn.store().pre_ids(), syn.store().post_ids());
    }

    #[test]
    fn test_expression_unknown_identifier_fails() {
        let (mut syn, _, _) = engine(2, 2);
        let result = syn.connect(
            Selector::All,
            Selector::All,
            Connect::Expression("i == k".to_string()),
        );
        assert!(result.is_err());
        assert!(syn.is_empty());
    }

    #[test]
    fn test_connect_random_exact_degree() {
        let (mut syn, _, _) = engine(6, 10);
        syn.connect_random(Selector::All, Selector::All, 3).unwrap();
        assert_eq!(syn.len(), 6 * 3);
        for i in 0..6 {
            let targets: std::collections::HashSet<u32> = syn
                .store()
                .outgoing(i)
                .iter()
                .map(|&s| syn.store().post_ids()[s as usize])
                .collect();
            assert_eq!(targets.len(), 3);
        }
    }

    #[test]
    fn test_connect_random_degree_too_large() {
        let (mut syn, _, _) = engine(2, 3);
        let result = syn.connect_random(Selector::All, Selector::All, 4);
        assert!(matches!(result, Err(CoreError::InvalidConnectivity { .. })));
    }

    #[test]
    fn test_out_of_range_selector_appends_nothing() {
        let (mut syn, _, _) = engine(3, 3);
        let result = syn.connect(Selector::Single(3), Selector::All, Connect::All);
        assert!(matches!(
            result,
            Err(CoreError::IndexOutOfRange { index: 3, bound: 3 })
        ));
        assert!(syn.is_empty());
    }

    #[test]
    fn test_disconnect_unsupported() {
        let (mut syn, _, _) = engine(2, 2);
        assert!(matches!(
            syn.disconnect(),
            Err(CoreError::Unsupported { .. })
        ));
        assert!(matches!(
            syn.connect_dense(&[true, false, false, true]),
            Err(CoreError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_create_synapses_raw_batch() {
        let (mut syn, _, _) = engine(3, 3);
        syn.create_synapses(&[0, 2], &[1, 1]).unwrap();
        assert_eq!(syn.len(), 2);
        assert_eq!(syn.store().pre_ids(), &[0, 2]);
        assert_eq!(syn.store().incoming(1), &[0, 1]);

        let result = syn.create_synapses(&[0], &[3]);
        assert!(matches!(
            result,
            Err(CoreError::IndexOutOfRange { index: 3, bound: 3 })
        ));
        assert_eq!(syn.len(), 2);
    }

    #[test]
    fn test_post_delay_setters() {
        let (mut syn, _, _) = engine(2, 2);
        syn.connect(Selector::All, Selector::All, Connect::All)
            .unwrap();
        syn.set_delays_post(3);
        assert_eq!(syn.store().delays_post(), &[3, 3, 3, 3]);
        syn.set_delay_post(1, 0).unwrap();
        assert_eq!(syn.store().delays_post(), &[3, 0, 3, 3]);
        assert!(syn.set_delay_post(4, 1).is_err());
        // forward delays untouched
        assert_eq!(syn.store().delays_pre(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_update_applies_pre_rule() {
        let (mut syn, mut source, mut target) = engine(2, 2);
        syn.connect(Selector::All, Selector::All, Connect::All)
            .unwrap();
        source.set_fired(&[0]).unwrap();
        syn.update(&mut source, &mut target).unwrap();
        assert_eq!(target.variable("v").unwrap(), &[1.0, 1.0]);
        assert_eq!(syn.clock().step(), 1);
    }

    #[test]
    fn test_lastupdate_auto_registered() {
        let source = NeuronGroup::new(1);
        let mut target = NeuronGroup::new(1).with_variable("v", 0.0);
        let config = SynapsesConfig::new(SynapseModel::new().variable("w", 1.0))
            .with_on_pre("v += w * exp((lastupdate - t) * 0.1)")
            .with_dt_ms(1.0);
        let mut syn = Synapses::new(&source, &target, config).unwrap();
        syn.connect(Selector::All, Selector::All, Connect::All)
            .unwrap();
        assert_eq!(syn.variable(LASTUPDATE).unwrap(), &[-1.0e6]);

        let mut source = source;
        source.set_fired(&[0]).unwrap();
        syn.update(&mut source, &mut target).unwrap();
        // rule ran at t=0 and recorded it
        assert_eq!(syn.variable(LASTUPDATE).unwrap(), &[0.0]);
    }

    #[test]
    fn test_builtin_variable_name_rejected() {
        let source = NeuronGroup::new(1);
        let target = NeuronGroup::new(1);
        let config = SynapsesConfig::new(SynapseModel::new().variable("t", 0.0));
        let result = Synapses::new(&source, &target, config);
        assert!(matches!(result, Err(CoreError::InvalidModel { .. })));
    }
}
