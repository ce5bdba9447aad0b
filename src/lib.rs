//! # Timbre: Polyphonic Synthesis and Effects Engine
//!
//! `timbre` renders a polyphonic subtractive synthesizer through a chain of
//! studio effects. Everything runs on one explicit signal graph whose node
//! parameters follow sample-accurate automation timelines.
//!
//! ## Architecture
//!
//! The library is organized in three layers:
//!
//! - **Graph** - [`SignalGraph`](graph::SignalGraph) with typed ports, audio-rate
//!   parameter modulation, scheduled sources and delay-aware ordering
//! - **Synthesis** - oscillator banks, envelopes, filters, LFOs and noise, assembled
//!   per note by the [`VoiceManager`](voice::VoiceManager)
//! - **Effects** - an ordered, self-wiring chain of processors managed by the
//!   [`EffectsManager`](effects::EffectsManager)
//!
//! Controls are read by name from a [`ParameterSource`](config::ParameterSource) and
//! snapshot to JSON through [`SynthSettings`](settings::SynthSettings).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use timbre::prelude::*;
//!
//! let store = Arc::new(MapParameterSource::new());
//! store.set("osc.0.waveform", "sawtooth");
//! store.set("filter.cutoff", 1800.0);
//!
//! let mut synth = Synth::new(44100.0, store.clone()).unwrap();
//! synth.note_on_midi(57, 0.8).unwrap();
//! let block = synth.render(512);
//!
//! store.set("reverb.reverbMix", 0.5);
//! synth.update_parameters().unwrap();
//! synth.note_off(57);
//! # let _ = block;
//! ```

pub mod automation;
pub mod buffer;
pub mod config;
pub mod convolution;
pub mod effects;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod graph;
pub mod lfo;
pub mod modulation;
pub mod nodes;
pub mod noise;
pub mod oscillator;
pub mod port;
pub mod settings;
pub mod synth;
pub mod voice;

/// Common imports
pub mod prelude {
    pub use crate::port::{
        AudioNode, Frame, ParamDef, ParamId, PortDef, PortId, PortSpec, SignalKind,
        SourceSchedule,
    };

    pub use crate::automation::{AudioParam, AutomationTimeline, CurveType};

    pub use crate::buffer::AudioBuffer;

    pub use crate::graph::{
        Cable, NodeHandle, NodeId, ParamRef, PortRef, SignalGraph, Target, RENDER_QUANTUM,
    };

    pub use crate::nodes::{
        Analyser, BiquadFilter, BufferSource, ConstantSource, Convolver, Delay, Destination,
        DynamicsCompressor, FilterType, Gain, Oscillator, PeriodicWave, WaveShaper, Waveform,
    };

    pub use crate::config::{
        MapParameterSource, ParamValue, ParameterSink, ParameterSource, SharedSink, SharedSource,
    };

    pub use crate::envelope::{EnvelopeConfig, EnvelopeModule};
    pub use crate::filter::{FilterConfig, FilterModule};
    pub use crate::lfo::{LfoConfig, LfoModule};
    pub use crate::noise::{NoiseConfig, NoiseModule, NoiseType};
    pub use crate::oscillator::{OscillatorBank, OscillatorConfig};
    pub use crate::voice::{midi_to_frequency, VoiceKey, VoiceManager};

    pub use crate::effects::{
        Effect, EffectCategory, EffectMetadata, EffectNodes, EffectsManager,
    };

    pub use crate::settings::{MasterConfig, SynthSettings};
    pub use crate::synth::Synth;

    pub use crate::error::{Result, SynthError};
}

pub use prelude::*;
