//! Effects Chain
//!
//! Effect processors are independent of each other and of the voice layer:
//! each owns a persistent `{input, output}` node pair and whatever internal
//! nodes its algorithm needs. [`EffectsManager`] is the ordered registry that
//! wires them into one serial chain.
//!
//! Re-initializing an effect disconnects every owned edge before wiring
//! again, so structural changes (like a phaser stage-count change) never
//! leave dangling cables behind. Cables into `input` and out of `output` are
//! the chain's and survive re-initialization. An effect rebuilt after a
//! teardown gets a new port pair, which the manager splices back in.

mod analyzer;
mod chorus;
mod compressor;
mod delay;
mod distortion;
mod eq;
mod flanger;
mod phaser;
mod reverb;
mod tremolo;

pub use analyzer::{clamp_fft_size, clamp_smoothing, AnalyzerConfig, Oscilloscope, SpectrumAnalyzer};
pub use chorus::{Chorus, ChorusConfig, ChorusVoice, CHORUS_BASE_DELAYS};
pub use compressor::{Compressor, CompressorConfig};
pub use delay::{DelayConfig, DelayEffect};
pub use distortion::{make_distortion_curve, Distortion, DistortionConfig, DISTORTION_CURVE_SAMPLES};
pub use eq::{EqConfig, ParametricEq, EQ_BANDS};
pub use flanger::{Flanger, FlangerConfig};
pub use phaser::{Phaser, PhaserConfig};
pub use reverb::{generate_impulse, Reverb, ReverbConfig};
pub use tremolo::{Tremolo, TremoloConfig};

use crate::error::{Result, SynthError};
use crate::graph::{NodeHandle, NodeId, ParamRef, PortRef, SignalGraph, Target};
use crate::nodes::{Gain, IN, OUT};
use crate::port::{AsAny, AudioNode};
use serde::{Deserialize, Serialize};

/// Effect grouping for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectCategory {
    Dynamics,
    Distortion,
    Modulation,
    Time,
    Filter,
    Analysis,
}

/// Registry entry describing an effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectMetadata {
    /// Unique within a manager
    pub id: String,
    pub name: String,
    /// Chain position; lower runs earlier
    pub order: i32,
    pub category: EffectCategory,
}

impl EffectMetadata {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        order: i32,
        category: EffectCategory,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            order,
            category,
        }
    }
}

/// The port pair an effect exposes to the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectNodes {
    pub input: NodeId,
    pub output: NodeId,
}

impl EffectNodes {
    /// Where the chain feeds the effect
    pub fn input_port(&self) -> PortRef {
        PortRef {
            node: self.input,
            port: IN,
        }
    }

    /// Where the chain continues from the effect
    pub fn output_port(&self) -> PortRef {
        PortRef {
            node: self.output,
            port: OUT,
        }
    }

    /// Inner side of the input node, for wiring the effect body
    pub(crate) fn send(&self) -> PortRef {
        PortRef {
            node: self.input,
            port: OUT,
        }
    }

    /// Inner side of the output node, for wiring the effect body
    pub(crate) fn ret(&self) -> PortRef {
        PortRef {
            node: self.output,
            port: IN,
        }
    }
}

/// An effect processor
pub trait Effect: AsAny + Send {
    /// Build (or rebuild) the effect's nodes and return its port pair
    fn initialize(&mut self, graph: &mut SignalGraph) -> Result<EffectNodes>;

    /// Pull current parameter values and apply them at the current time
    fn update(&mut self, graph: &mut SignalGraph) -> Result<()>;

    fn nodes(&self) -> Option<EffectNodes>;

    fn is_initialized(&self) -> bool {
        self.nodes().is_some()
    }

    /// Remove every node the effect owns
    fn teardown(&mut self, graph: &mut SignalGraph);

    /// Current configuration, for snapshotting
    fn config_value(&self) -> serde_json::Value;
}

/// Persistent input/output gains plus the internal nodes of one effect
#[derive(Debug, Default)]
pub(crate) struct NodeGroup {
    io: Option<EffectNodes>,
    internal: Vec<NodeId>,
}

impl NodeGroup {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Prepare for wiring: create the port pair on first use, otherwise drop
    /// every internal node and every cable leaving `input`
    pub(crate) fn reset(&mut self, graph: &mut SignalGraph, name: &str) -> EffectNodes {
        graph.remove_all(self.internal.drain(..));
        match self.io {
            Some(io) if graph.contains(io.input) && graph.contains(io.output) => {
                graph.disconnect_outputs(io.input);
                io
            }
            _ => {
                let input = graph.add(format!("{}_in", name), Gain::new(1.0));
                let output = graph.add(format!("{}_out", name), Gain::new(1.0));
                let io = EffectNodes {
                    input: input.id(),
                    output: output.id(),
                };
                self.io = Some(io);
                io
            }
        }
    }

    pub(crate) fn add<M: AudioNode + 'static>(
        &mut self,
        graph: &mut SignalGraph,
        name: impl Into<String>,
        module: M,
    ) -> NodeHandle {
        let handle = graph.add(name, module);
        self.internal.push(handle.id());
        handle
    }

    pub(crate) fn io(&self) -> Option<EffectNodes> {
        self.io
    }

    pub(crate) fn internal(&self) -> &[NodeId] {
        &self.internal
    }

    pub(crate) fn teardown(&mut self, graph: &mut SignalGraph) {
        graph.remove_all(self.internal.drain(..));
        if let Some(io) = self.io.take() {
            graph.remove_all([io.input, io.output]);
        }
    }
}

/// Gain parameter of a [`Gain`] node
pub(crate) fn gain_of(node: NodeId) -> ParamRef {
    ParamRef {
        node,
        param: Gain::GAIN,
    }
}

/// Start a source node now
pub(crate) fn start_now(graph: &mut SignalGraph, node: NodeId) {
    let now = graph.current_time();
    graph.start(node, now);
}

struct Registered {
    metadata: EffectMetadata,
    effect: Box<dyn Effect>,
}

/// Ordered registry of effects, frozen once the chain is wired
#[derive(Default)]
pub struct EffectsManager {
    effects: Vec<Registered>,
    initialized: bool,
    /// Chain endpoints, kept for splicing rebuilt effects back in
    chain: Option<(PortRef, Target)>,
}

impl EffectsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an effect.
    ///
    /// Fails if the id is taken or the chain is already initialized.
    pub fn register<E: Effect + 'static>(&mut self, effect: E, metadata: EffectMetadata) -> Result<()> {
        self.register_boxed(Box::new(effect), metadata)
    }

    pub fn register_boxed(&mut self, effect: Box<dyn Effect>, metadata: EffectMetadata) -> Result<()> {
        if self.initialized {
            return Err(SynthError::RegistrationAfterFinalize(metadata.id));
        }
        if self.contains(&metadata.id) {
            return Err(SynthError::DuplicateEffectId(metadata.id));
        }
        self.effects.push(Registered { metadata, effect });
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.effects.iter().any(|e| e.metadata.id == id)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    fn ordered_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.effects.len()).collect();
        // stable: equal orders keep registration order
        indices.sort_by_key(|&i| self.effects[i].metadata.order);
        indices
    }

    /// Metadata sorted ascending by `order`, ties in registration order
    pub fn effects_by_order(&self) -> Vec<&EffectMetadata> {
        self.ordered_indices()
            .into_iter()
            .map(|i| &self.effects[i].metadata)
            .collect()
    }

    /// Same ordering as [`effects_by_order`](Self::effects_by_order), filtered
    pub fn effects_by_category(&self, category: EffectCategory) -> Vec<&EffectMetadata> {
        self.effects_by_order()
            .into_iter()
            .filter(|m| m.category == category)
            .collect()
    }

    /// Initialize every effect and wire `source → effects… → destination`.
    ///
    /// With no effects registered the source is connected straight through.
    pub fn initialize(
        &mut self,
        graph: &mut SignalGraph,
        source: PortRef,
        destination: impl Into<Target>,
    ) -> Result<()> {
        if self.initialized {
            return Err(SynthError::AlreadyInitialized);
        }
        let destination = destination.into();

        let mut previous = source;
        for i in self.ordered_indices() {
            let nodes = self.effects[i].effect.initialize(graph)?;
            graph.connect(previous, nodes.input_port())?;
            previous = nodes.output_port();
        }
        graph.connect(previous, destination)?;

        self.chain = Some((source, destination));
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn metadata(&self, id: &str) -> Option<&EffectMetadata> {
        self.effects
            .iter()
            .find(|e| e.metadata.id == id)
            .map(|e| &e.metadata)
    }

    pub fn get(&self, id: &str) -> Option<&dyn Effect> {
        self.effects
            .iter()
            .find(|e| e.metadata.id == id)
            .map(|e| e.effect.as_ref())
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut dyn Effect> {
        match self.effects.iter_mut().find(|e| e.metadata.id == id) {
            Some(e) => Some(e.effect.as_mut()),
            None => None,
        }
    }

    /// Downcast a registered effect to its concrete type
    pub fn effect<T: Effect + 'static>(&self, id: &str) -> Option<&T> {
        self.get(id).and_then(|e| e.as_any().downcast_ref::<T>())
    }

    pub fn effect_mut<T: Effect + 'static>(&mut self, id: &str) -> Option<&mut T> {
        self.get_mut(id)
            .and_then(|e| e.as_any_mut().downcast_mut::<T>())
    }

    /// Pull parameters into every initialized effect
    pub fn update_all(&mut self, graph: &mut SignalGraph) -> Result<()> {
        for entry in &mut self.effects {
            if entry.effect.is_initialized() {
                entry.effect.update(graph)?;
            }
        }
        Ok(())
    }

    /// Rebuild one effect in place.
    ///
    /// Chain connections survive when the effect kept its port pair. An
    /// effect that was torn down comes back with a new pair, which is
    /// spliced between its nearest initialized neighbours.
    pub fn reinitialize(&mut self, graph: &mut SignalGraph, id: &str) -> Result<()> {
        let index = self
            .effects
            .iter()
            .position(|e| e.metadata.id == id)
            .ok_or_else(|| SynthError::UnknownEffect(id.to_string()))?;

        let before = self.effects[index].effect.nodes();
        let nodes = self.effects[index].effect.initialize(graph)?;
        let Some((source, destination)) = self.chain else {
            return Ok(());
        };
        if before == Some(nodes) {
            return Ok(());
        }

        let order = self.ordered_indices();
        let position = order.iter().position(|&i| i == index).unwrap_or(0);
        let upstream = order[..position]
            .iter()
            .rev()
            .find_map(|&i| self.effects[i].effect.nodes())
            .map_or(source, |n| n.output_port());
        let downstream = order[position + 1..]
            .iter()
            .find_map(|&i| self.effects[i].effect.nodes())
            .map_or(destination, |n| Target::from(n.input_port()));

        graph.disconnect_between(upstream.node, downstream.node());
        graph.connect(upstream, nodes.input_port())?;
        graph.connect(nodes.output_port(), downstream)?;
        Ok(())
    }

    /// `id → config` for every effect
    pub fn configs(&self) -> serde_json::Map<String, serde_json::Value> {
        self.effects
            .iter()
            .map(|e| (e.metadata.id.clone(), e.effect.config_value()))
            .collect()
    }
}
