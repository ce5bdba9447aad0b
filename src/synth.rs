//! Synth
//!
//! The top-level engine: voices mix into a shared bus, the bus runs through
//! the effects chain, and the chain feeds the master gain.
//!
//! ```text
//! voices ─► voice bus ─► compressor ─► … ─► reverb ─► taps ─► master ─► destination
//! ```
//!
//! Every call happens on the owning (control) thread. Parameter changes are
//! pulled from the shared [`ParameterSource`](crate::config::ParameterSource)
//! when [`Synth::update_parameters`] runs and scheduled at the current time.

use crate::config::{ParameterSink, ParameterSource, SharedSink, SharedSource};
use crate::effects::{
    Chorus, Compressor, DelayEffect, Distortion, Effect, EffectCategory, EffectMetadata,
    EffectsManager, Flanger, Oscilloscope, ParametricEq, Phaser, Reverb, SpectrumAnalyzer, Tremolo,
};
use crate::error::{Result, SynthError};
use crate::graph::{NodeId, ParamRef, SignalGraph, RENDER_QUANTUM};
use crate::lfo::{lfo_count, LfoModule};
use crate::nodes::Gain;
use crate::noise::NoiseModule;
use crate::port::Frame;
use crate::settings::{MasterConfig, SynthSettings};
use crate::voice::{midi_to_frequency, VoiceKey, VoiceManager};
use std::sync::Arc;

/// Registry id of each built-in effect
pub mod effect_ids {
    pub const COMPRESSOR: &str = "compressor";
    pub const DISTORTION: &str = "distortion";
    pub const EQ: &str = "eq";
    pub const CHORUS: &str = "chorus";
    pub const FLANGER: &str = "flanger";
    pub const PHASER: &str = "phaser";
    pub const TREMOLO: &str = "tremolo";
    pub const DELAY: &str = "delay";
    pub const REVERB: &str = "reverb";
    pub const SPECTRUM: &str = "spectrum";
    pub const OSCILLOSCOPE: &str = "oscilloscope";
}

/// Built-in effects in registration order, with their chain positions.
///
/// Dynamics run first so later stages see a levelled signal; the taps sit
/// last so they show what reaches the master gain.
fn default_effects(source: &SharedSource, seed: Option<u64>) -> Vec<(Box<dyn Effect>, EffectMetadata)> {
    use effect_ids::*;

    let reverb = match seed {
        Some(seed) => Reverb::with_seed(source.clone(), seed),
        None => Reverb::new(source.clone()),
    };
    let meta = |id: &str, name: &str, order: i32, category: EffectCategory| {
        EffectMetadata::new(id, name, order, category)
    };
    let s = || source.clone();

    vec![
        (
            Box::new(Compressor::new(s())) as Box<dyn Effect>,
            meta(COMPRESSOR, "Compressor", 10, EffectCategory::Dynamics),
        ),
        (
            Box::new(Distortion::new(s())),
            meta(DISTORTION, "Distortion", 20, EffectCategory::Distortion),
        ),
        (
            Box::new(ParametricEq::new(s())),
            meta(EQ, "Parametric EQ", 30, EffectCategory::Filter),
        ),
        (
            Box::new(Chorus::new(s())),
            meta(CHORUS, "Chorus", 40, EffectCategory::Modulation),
        ),
        (
            Box::new(Flanger::new(s())),
            meta(FLANGER, "Flanger", 50, EffectCategory::Modulation),
        ),
        (
            Box::new(Phaser::new(s())),
            meta(PHASER, "Phaser", 60, EffectCategory::Modulation),
        ),
        (
            Box::new(Tremolo::new(s())),
            meta(TREMOLO, "Tremolo", 70, EffectCategory::Modulation),
        ),
        (
            Box::new(DelayEffect::new(s())),
            meta(DELAY, "Delay", 80, EffectCategory::Time),
        ),
        (Box::new(reverb), meta(REVERB, "Reverb", 90, EffectCategory::Time)),
        (
            Box::new(SpectrumAnalyzer::new(s())),
            meta(SPECTRUM, "Spectrum", 900, EffectCategory::Analysis),
        ),
        (
            Box::new(Oscilloscope::new(s())),
            meta(OSCILLOSCOPE, "Oscilloscope", 910, EffectCategory::Analysis),
        ),
    ]
}

pub struct Synth {
    graph: SignalGraph,
    source: SharedSource,
    sink: SharedSink,
    voices: VoiceManager,
    lfos: Vec<LfoModule>,
    /// Replaced LFOs still wired into releasing or sounding voices
    retired_lfos: Vec<LfoModule>,
    effects: EffectsManager,
    voice_bus: NodeId,
    master: NodeId,
}

impl Synth {
    /// Build an engine reading from, and importing into, `store`
    pub fn new<S>(sample_rate: f64, store: Arc<S>) -> Result<Self>
    where
        S: ParameterSource + ParameterSink + 'static,
    {
        Self::build(sample_rate, store.clone(), store, None)
    }

    /// Deterministic noise and reverb impulses for reproducible renders
    pub fn with_seed<S>(sample_rate: f64, store: Arc<S>, seed: u64) -> Result<Self>
    where
        S: ParameterSource + ParameterSink + 'static,
    {
        Self::build(sample_rate, store.clone(), store, Some(seed))
    }

    fn build(sample_rate: f64, source: SharedSource, sink: SharedSink, seed: Option<u64>) -> Result<Self> {
        let mut graph = SignalGraph::new(sample_rate);
        let master_config = MasterConfig::read(source.as_ref());

        let voice_bus = graph.add("voice_bus", Gain::new(1.0));
        let master = graph.add("master", Gain::new(master_config.master_volume));
        let destination = graph.destination().in_("in");
        graph.connect(master.out("out"), destination)?;

        let mut effects = EffectsManager::new();
        for (effect, metadata) in default_effects(&source, seed) {
            effects.register_boxed(effect, metadata)?;
        }
        effects.initialize(&mut graph, voice_bus.out("out"), master.in_("in"))?;

        let noise = match seed {
            Some(seed) => NoiseModule::with_seed(source.clone(), seed.wrapping_add(1)),
            None => NoiseModule::new(source.clone()),
        };
        let voices = VoiceManager::with_noise(source.clone(), voice_bus.in_("in"), noise);

        let mut synth = Self {
            graph,
            source,
            sink,
            voices,
            lfos: Vec::new(),
            retired_lfos: Vec::new(),
            effects,
            voice_bus: voice_bus.id(),
            master: master.id(),
        };
        synth.build_lfos()?;
        Ok(synth)
    }

    fn build_lfos(&mut self) -> Result<()> {
        self.retired_lfos.append(&mut self.lfos);
        self.release_retired_lfos();
        let count = lfo_count(self.source.as_ref());
        self.lfos = (0..count)
            .map(|i| LfoModule::new(self.source.clone(), i))
            .collect();
        for lfo in &mut self.lfos {
            lfo.build(&mut self.graph)?;
        }
        Ok(())
    }

    /// Drop retired LFOs once no voice reads from them
    fn release_retired_lfos(&mut self) {
        let graph = &mut self.graph;
        self.retired_lfos.retain_mut(|lfo| {
            if lfo.is_referenced(graph) {
                return true;
            }
            lfo.teardown(graph);
            false
        });
    }

    pub fn sample_rate(&self) -> f64 {
        self.graph.sample_rate()
    }

    pub fn current_time(&self) -> f64 {
        self.graph.current_time()
    }

    /// Start a note now
    pub fn note_on(&mut self, key: VoiceKey, frequency: f64, velocity: f64) -> Result<()> {
        let now = self.graph.current_time();
        self.note_on_at(key, frequency, velocity, now)
    }

    pub fn note_on_at(&mut self, key: VoiceKey, frequency: f64, velocity: f64, time: f64) -> Result<()> {
        self.voices
            .note_on(&mut self.graph, key, frequency, velocity, time, &self.lfos)
    }

    /// Start a note keyed and tuned by its MIDI note number
    pub fn note_on_midi(&mut self, note: u8, velocity: f64) -> Result<()> {
        self.note_on(note as VoiceKey, midi_to_frequency(note as f64), velocity)
    }

    /// Release a note now; returns when its sources stop
    pub fn note_off(&mut self, key: VoiceKey) -> Option<f64> {
        let now = self.graph.current_time();
        self.note_off_at(key, now)
    }

    pub fn note_off_at(&mut self, key: VoiceKey, time: f64) -> Option<f64> {
        self.voices.note_off(&mut self.graph, key, time)
    }

    /// Silence every voice immediately
    pub fn panic(&mut self) {
        self.voices.stop_all(&mut self.graph);
        self.release_retired_lfos();
    }

    /// Render into `output`, reaping finished voices once per quantum
    pub fn process(&mut self, output: &mut [Frame]) {
        for chunk in output.chunks_mut(RENDER_QUANTUM) {
            self.voices.collect_finished(&mut self.graph);
            self.release_retired_lfos();
            self.graph.process(chunk);
        }
    }

    pub fn render(&mut self, frames: usize) -> Vec<Frame> {
        let mut output = vec![Frame::SILENCE; frames];
        self.process(&mut output);
        output
    }

    /// Pull every live parameter and schedule it at the current time.
    ///
    /// A changed LFO count rebuilds the LFOs; sounding voices keep the
    /// modulation they were built with until they are reaped. Reverb decay is not applied here,
    /// see [`regenerate_reverb`](Self::regenerate_reverb).
    pub fn update_parameters(&mut self) -> Result<()> {
        if lfo_count(self.source.as_ref()) != self.lfos.len() {
            self.build_lfos()?;
        } else {
            for lfo in &self.lfos {
                lfo.update(&mut self.graph);
            }
        }

        self.effects.update_all(&mut self.graph)?;

        let volume = MasterConfig::read(self.source.as_ref()).master_volume;
        self.graph.set_value_now(
            ParamRef {
                node: self.master,
                param: Gain::GAIN,
            },
            volume,
        );
        Ok(())
    }

    /// Rebuild the reverb impulse from the current decay
    pub fn regenerate_reverb(&mut self) {
        if let Some(reverb) = self.effects.effect_mut::<Reverb>(effect_ids::REVERB) {
            reverb.regenerate_impulse(&mut self.graph);
        }
    }

    /// Remove an effect's nodes; the chain is open until it is rebuilt
    pub fn teardown_effect(&mut self, id: &str) -> Result<()> {
        let effect = self
            .effects
            .get_mut(id)
            .ok_or_else(|| SynthError::UnknownEffect(id.to_string()))?;
        effect.teardown(&mut self.graph);
        Ok(())
    }

    /// Rebuild an effect and splice it back into the chain
    pub fn reinitialize_effect(&mut self, id: &str) -> Result<()> {
        self.effects.reinitialize(&mut self.graph, id)
    }

    /// Snapshot of the current parameter values
    pub fn export_settings(&self) -> SynthSettings {
        SynthSettings::from_source(self.source.as_ref())
    }

    /// Write `settings` into the parameter store and apply them
    pub fn import_settings(&mut self, settings: &SynthSettings) -> Result<()> {
        settings.apply_to(self.sink.as_ref());
        self.update_parameters()?;
        self.regenerate_reverb();
        Ok(())
    }

    /// Number of sounding voices
    pub fn voice_count(&self) -> usize {
        self.voices.voice_count()
    }

    pub fn has_voice(&self, key: VoiceKey) -> bool {
        self.voices.has_voice(key)
    }

    /// Latest spectrum frame, if anything was rendered since the last poll
    pub fn poll_spectrum(&mut self) -> Option<Vec<f32>> {
        self.effects
            .effect_mut::<SpectrumAnalyzer>(effect_ids::SPECTRUM)
            .and_then(|s| s.poll(&mut self.graph))
    }

    /// Latest waveform snapshot, if anything was rendered since the last poll
    pub fn poll_oscilloscope(&mut self) -> Option<Vec<f32>> {
        self.effects
            .effect_mut::<Oscilloscope>(effect_ids::OSCILLOSCOPE)
            .and_then(|s| s.poll(&mut self.graph))
    }

    pub fn graph(&self) -> &SignalGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SignalGraph {
        &mut self.graph
    }

    pub fn voices(&self) -> &VoiceManager {
        &self.voices
    }

    pub fn effects(&self) -> &EffectsManager {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectsManager {
        &mut self.effects
    }

    pub fn lfos(&self) -> &[LfoModule] {
        &self.lfos
    }

    /// Replaced LFOs kept alive for voices that still use them
    pub fn retired_lfo_count(&self) -> usize {
        self.retired_lfos.len()
    }

    pub fn voice_bus(&self) -> NodeId {
        self.voice_bus
    }

    pub fn master(&self) -> NodeId {
        self.master
    }
}
