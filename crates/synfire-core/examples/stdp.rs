//! Pair-based STDP between two small populations.
//!
//! Run with `cargo run --example stdp`, or with
//! `--features logging` and `RUST_LOG=debug` to watch the engine work.

use synfire_core::{
    Connect, NeuronGroup, Selector, SynapseModel, Synapses, SynapsesConfig,
};

fn main() -> synfire_core::Result<()> {
    #[cfg(feature = "logging")]
    env_logger::init();

    let mut source = NeuronGroup::new(20);
    let mut target = NeuronGroup::new(20).with_variable("v", 0.0);

    let config = SynapsesConfig::new(
        SynapseModel::new()
            .variable("w", 0.3)
            .variable("apre", 0.0)
            .variable("apost", 0.0),
    )
    .with_on_pre("v += w\napre += 0.01\nw = clip(w + apost, 0, 1)")
    .with_on_post("apost -= 0.0105\nw = clip(w + apre, 0, 1)")
    .with_dt_ms(1.0)
    .with_seed(1);

    let mut synapses = Synapses::new(&source, &target, config)?;
    synapses.connect(Selector::All, Selector::All, Connect::Probability(0.2))?;
    println!("connected: {} synapses", synapses.len());

    for step in 0..100u32 {
        // source neurons fire in a rolling pattern; targets echo a step later
        source.set_fired(&[step % 20])?;
        if step > 0 {
            target.set_fired(&[(step - 1) % 20])?;
        }
        synapses.update(&mut source, &mut target)?;
    }

    let weights = synapses.variable("w").unwrap_or(&[]);
    let mean = weights.iter().sum::<f32>() / weights.len().max(1) as f32;
    println!(
        "after {} steps: mean weight {:.4}, {:?}",
        synapses.clock().step(),
        mean,
        synapses.stats()
    );
    Ok(())
}
