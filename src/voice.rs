//! Voice Management
//!
//! This module composes the leaf modules into sounding notes.
//!
//! # Lifecycle
//!
//! A voice is *sounding* from note-on until note-off, then *releasing* until
//! its scheduled stop time, then gone. Note-off removes the key from the
//! active map immediately: map membership says nothing about audibility.
//! Releasing voices are reaped by [`VoiceManager::collect_finished`].
//!
//! # Per-voice graph
//!
//! ```text
//! oscillators ─► level ─┐
//!                       ├─► filter ─► voice gain ─► output bus
//! noise ─► noise level ─┘
//! ```
//!
//! Filter and pitch LFO busses are combined per voice and wired into the
//! filter cutoff and every oscillator's detune.

use crate::config::{read_bool, SharedSource};
use crate::envelope::EnvelopeModule;
use crate::error::Result;
use crate::filter::{FilterInstance, FilterModule};
use crate::graph::{NodeId, ParamRef, PortRef, SignalGraph, Target};
use crate::lfo::LfoModule;
use crate::modulation::{combine_lfos, ModulationBus};
use crate::nodes::{Gain, IN, OUT};
use crate::noise::{NoiseModule, NoiseSource};
use crate::oscillator::{OscillatorBank, OscillatorSet};
use std::collections::HashMap;

/// Caller-supplied note identifier (MIDI note, key code, ...)
pub type VoiceKey = u32;

/// Peak amplitude of a full-velocity voice
pub const VOICE_HEADROOM: f64 = 0.3;

/// Convert a (fractional) MIDI note number to Hz, A4 = 69 = 440 Hz
#[inline]
pub fn midi_to_frequency(note: f64) -> f64 {
    440.0 * 2.0_f64.powf((note - 69.0) / 12.0)
}

/// One sounding note and every node it owns
#[derive(Debug, Clone)]
pub struct Voice {
    pub key: VoiceKey,
    pub frequency: f64,
    /// 0.0 to 1.0
    pub velocity: f64,
    pub oscillators: OscillatorSet,
    pub noise: Option<NoiseSource>,
    pub filter: FilterInstance,
    pub gain: NodeId,
    pub filter_bus: Option<ModulationBus>,
    pub pitch_bus: Option<ModulationBus>,
    pub started_at: f64,
}

impl Voice {
    /// Amplitude envelope target
    pub fn gain_param(&self) -> ParamRef {
        ParamRef {
            node: self.gain,
            param: Gain::GAIN,
        }
    }

    /// Scheduled sources: oscillators, noise player and filter envelope carrier
    pub fn sources(&self) -> Vec<NodeId> {
        let mut sources = self.oscillators.oscillators.clone();
        sources.extend(self.noise.map(|n| n.source));
        sources.push(self.filter.env_source);
        sources
    }

    /// Every node created for this voice
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.oscillators.nodes().collect();
        if let Some(noise) = self.noise {
            nodes.extend([noise.source, noise.gain]);
        }
        nodes.extend(self.filter.nodes());
        nodes.push(self.gain);
        nodes.extend(self.filter_bus.and_then(|b| b.mixer));
        nodes.extend(self.pitch_bus.and_then(|b| b.mixer));
        nodes
    }
}

/// Owns every voice; allocates on note-on, releases on note-off
pub struct VoiceManager {
    source: SharedSource,
    oscillators: OscillatorBank,
    filter: FilterModule,
    envelope: EnvelopeModule,
    noise: NoiseModule,
    output: Target,
    voices: HashMap<VoiceKey, Voice>,
    releasing: Vec<(Voice, f64)>,
}

impl VoiceManager {
    /// Voices are mixed into `output`
    pub fn new(source: SharedSource, output: impl Into<Target>) -> Self {
        let noise = NoiseModule::new(source.clone());
        Self::with_noise(source, output, noise)
    }

    pub fn with_noise(source: SharedSource, output: impl Into<Target>, noise: NoiseModule) -> Self {
        Self {
            oscillators: OscillatorBank::new(source.clone()),
            filter: FilterModule::new(source.clone()),
            envelope: EnvelopeModule::new(source.clone(), "envelope"),
            noise,
            source,
            output: output.into(),
            voices: HashMap::new(),
            releasing: Vec::new(),
        }
    }

    pub fn is_polyphonic(&self) -> bool {
        read_bool(self.source.as_ref(), "master.polyphonic", true)
    }

    pub fn oscillator_bank(&self) -> &OscillatorBank {
        &self.oscillators
    }

    pub fn filter_module(&self) -> &FilterModule {
        &self.filter
    }

    pub fn envelope(&self) -> &EnvelopeModule {
        &self.envelope
    }

    pub fn noise_module(&self) -> &NoiseModule {
        &self.noise
    }

    /// Start a note.
    ///
    /// In mono mode every sounding voice is released first. Retriggering a
    /// key that is still sounding releases its previous voice.
    pub fn note_on(
        &mut self,
        graph: &mut SignalGraph,
        key: VoiceKey,
        frequency: f64,
        velocity: f64,
        time: f64,
        lfos: &[LfoModule],
    ) -> Result<()> {
        if !self.is_polyphonic() {
            for k in self.keys() {
                self.note_off(graph, k, time);
            }
        } else if self.voices.contains_key(&key) {
            self.note_off(graph, key, time);
        }

        let velocity = velocity.clamp(0.0, 1.0);
        let filter_sources: Vec<PortRef> = lfos.iter().filter_map(LfoModule::filter_output).collect();
        let pitch_sources: Vec<PortRef> = lfos.iter().filter_map(LfoModule::pitch_output).collect();
        let filter_bus = combine_lfos(graph, &filter_sources)?;
        let pitch_bus = combine_lfos(graph, &pitch_sources)?;

        let filter = self.filter.create_filter(graph, filter_bus.as_ref())?;
        let gain = graph.add("voice_gain", Gain::new(0.0));
        let filter_in = PortRef {
            node: filter.filter,
            port: IN,
        };
        graph.connect(
            PortRef {
                node: filter.filter,
                port: OUT,
            },
            gain.in_("in"),
        )?;
        graph.connect(gain.out("out"), self.output)?;

        let oscillators =
            self.oscillators
                .create_oscillators(graph, frequency, filter_in.into(), pitch_bus.as_ref())?;
        let noise = self.noise.create_noise_source(graph)?;
        if let Some(noise) = noise {
            graph.connect(
                PortRef {
                    node: noise.gain,
                    port: OUT,
                },
                filter_in,
            )?;
            graph.start(noise.source, time);
        }

        self.oscillators.start_oscillators(graph, &oscillators, time);
        self.filter.apply_envelope(graph, &filter, time);

        let voice = Voice {
            key,
            frequency,
            velocity,
            oscillators,
            noise,
            filter,
            gain: gain.id(),
            filter_bus,
            pitch_bus,
            started_at: time,
        };
        self.envelope
            .apply_envelope(graph, voice.gain_param(), time, 0.0, VOICE_HEADROOM * velocity);

        self.voices.insert(key, voice);
        Ok(())
    }

    /// Release a note at `time`.
    ///
    /// Returns the time every source of the voice is scheduled to stop, or
    /// `None` if the key is not sounding. The key leaves the active set now.
    pub fn note_off(&mut self, graph: &mut SignalGraph, key: VoiceKey, time: f64) -> Option<f64> {
        let voice = self.voices.remove(&key)?;

        let amp_release = self
            .envelope
            .apply_release(graph, voice.gain_param(), time, 0.0);
        let filter_release = self.filter.apply_release(graph, &voice.filter, time);
        let stop_at = time + amp_release.max(filter_release);

        for source in voice.sources() {
            graph.stop(source, Some(stop_at));
        }

        self.releasing.push((voice, stop_at));
        Some(stop_at)
    }

    /// Stop every voice immediately, bypassing release
    pub fn stop_all(&mut self, graph: &mut SignalGraph) {
        let sounding = self.voices.drain().map(|(_, v)| v);
        let releasing = self.releasing.drain(..).map(|(v, _)| v);
        for voice in sounding.chain(releasing).collect::<Vec<_>>() {
            for source in voice.sources() {
                graph.stop(source, None);
            }
            graph.remove_all(voice.nodes());
        }
    }

    /// Remove the nodes of releasing voices whose stop time has passed.
    ///
    /// Returns the number of voices reaped.
    pub fn collect_finished(&mut self, graph: &mut SignalGraph) -> usize {
        let now = graph.current_time();
        let (done, pending): (Vec<_>, Vec<_>) = self
            .releasing
            .drain(..)
            .partition(|(_, stop_at)| *stop_at <= now);
        self.releasing = pending;

        for (voice, _) in &done {
            graph.remove_all(voice.nodes());
        }
        done.len()
    }

    /// Number of sounding (not releasing) voices
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn has_voice(&self, key: VoiceKey) -> bool {
        self.voices.contains_key(&key)
    }

    pub fn voice(&self, key: VoiceKey) -> Option<&Voice> {
        self.voices.get(&key)
    }

    /// Sounding keys in ascending order
    pub fn keys(&self) -> Vec<VoiceKey> {
        let mut keys: Vec<VoiceKey> = self.voices.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Voices whose release tail is still scheduled
    pub fn releasing_count(&self) -> usize {
        self.releasing.len()
    }

    /// Stop times of releasing voices, by key
    pub fn releasing(&self) -> impl Iterator<Item = (VoiceKey, f64)> + '_ {
        self.releasing.iter().map(|(v, t)| (v.key, *t))
    }
}
