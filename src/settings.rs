//! Settings Snapshots
//!
//! [`SynthSettings`] is the structured, serializable shape of every control
//! the engine reads. It is exported from a [`ParameterSource`] and imported
//! into a [`ParameterSink`]; storing it is the caller's business.
//!
//! Exporting, importing into an empty store and exporting again yields an
//! equal snapshot.
//!
//! # Example
//!
//! ```rust,no_run
//! use timbre::config::MapParameterSource;
//! use timbre::settings::SynthSettings;
//!
//! let store = MapParameterSource::new();
//! store.set("filter.cutoff", 900.0);
//!
//! let json = SynthSettings::from_source(&store).to_json().unwrap();
//! let restored = SynthSettings::from_json(&json).unwrap();
//! restored.apply_to(&MapParameterSource::new());
//! ```

use crate::config::{read_bool, read_clamped, ParamValue, ParameterSink, ParameterSource};
use crate::effects::{
    ChorusConfig, CompressorConfig, DelayConfig, DistortionConfig, EqConfig, FlangerConfig,
    PhaserConfig, ReverbConfig, TremoloConfig,
};
use crate::envelope::EnvelopeConfig;
use crate::filter::FilterConfig;
use crate::lfo::{lfo_count, LfoConfig, MAX_LFOS};
use crate::noise::NoiseConfig;
use crate::oscillator::{oscillator_configs, OscillatorConfig, MAX_OSCILLATORS};
use serde::{Deserialize, Serialize};

/// Global voice policy and output level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterConfig {
    pub polyphonic: bool,
    pub master_volume: f64,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            polyphonic: true,
            master_volume: 0.7,
        }
    }
}

impl MasterConfig {
    pub fn read(source: &dyn ParameterSource) -> Self {
        let d = Self::default();
        Self {
            polyphonic: read_bool(source, "master.polyphonic", d.polyphonic),
            master_volume: read_clamped(source, "master.masterVolume", d.master_volume, 0.0, 1.0),
        }
    }
}

/// Snapshot of every engine parameter, grouped as the control surface
/// groups them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthSettings {
    pub master: MasterConfig,
    pub oscillators: Vec<OscillatorConfig>,
    pub envelope: EnvelopeConfig,
    pub filter: FilterConfig,
    pub lfos: Vec<LfoConfig>,
    pub noise: NoiseConfig,
    pub chorus: ChorusConfig,
    pub distortion: DistortionConfig,
    pub compressor: CompressorConfig,
    pub reverb: ReverbConfig,
    pub delay: DelayConfig,
    pub phaser: PhaserConfig,
    pub tremolo: TremoloConfig,
    #[serde(default)]
    pub flanger: FlangerConfig,
    #[serde(default)]
    pub eq: EqConfig,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            master: MasterConfig::default(),
            oscillators: vec![OscillatorConfig::default()],
            envelope: EnvelopeConfig::default(),
            filter: FilterConfig::default(),
            lfos: vec![LfoConfig::default()],
            noise: NoiseConfig::default(),
            chorus: ChorusConfig::default(),
            distortion: DistortionConfig::default(),
            compressor: CompressorConfig::default(),
            reverb: ReverbConfig::default(),
            delay: DelayConfig::default(),
            phaser: PhaserConfig::default(),
            tremolo: TremoloConfig::default(),
            flanger: FlangerConfig::default(),
            eq: EqConfig::default(),
        }
    }
}

/// `prefix.field` pairs for every scalar field of a serialized group
fn group_params<T: Serialize>(prefix: &str, group: &T) -> Vec<(String, ParamValue)> {
    match serde_json::to_value(group) {
        Ok(serde_json::Value::Object(fields)) => fields
            .into_iter()
            .filter_map(|(field, value)| {
                serde_json::from_value::<ParamValue>(value)
                    .ok()
                    .map(|v| (format!("{}.{}", prefix, field), v))
            })
            .collect(),
        _ => Vec::new(),
    }
}

impl SynthSettings {
    /// Read the current value of every parameter
    pub fn from_source(source: &dyn ParameterSource) -> Self {
        Self {
            master: MasterConfig::read(source),
            oscillators: oscillator_configs(source),
            envelope: EnvelopeConfig::read(source, "envelope"),
            filter: FilterConfig::read(source),
            lfos: (0..lfo_count(source))
                .map(|i| LfoConfig::read(source, i))
                .collect(),
            noise: NoiseConfig::read(source),
            chorus: ChorusConfig::read(source),
            distortion: DistortionConfig::read(source),
            compressor: CompressorConfig::read(source),
            reverb: ReverbConfig::read(source),
            delay: DelayConfig::read(source),
            phaser: PhaserConfig::read(source),
            tremolo: TremoloConfig::read(source),
            flanger: FlangerConfig::read(source),
            eq: EqConfig::read(source),
        }
    }

    /// Flatten into `group.field` parameters
    pub fn to_params(&self) -> Vec<(String, ParamValue)> {
        let oscillators = &self.oscillators[..self.oscillators.len().min(MAX_OSCILLATORS)];
        let lfos = &self.lfos[..self.lfos.len().min(MAX_LFOS)];

        let mut params = group_params("master", &self.master);
        params.push(("osc.count".to_string(), (oscillators.len() as f64).into()));
        for (i, osc) in oscillators.iter().enumerate() {
            params.extend(osc.to_params(i));
        }
        params.extend(self.envelope.to_params("envelope"));
        params.extend(self.filter.to_params());
        params.push(("lfo.count".to_string(), (lfos.len() as f64).into()));
        for (i, lfo) in lfos.iter().enumerate() {
            params.extend(lfo.to_params(i));
        }
        params.extend(self.noise.to_params());
        params.extend(group_params("chorus", &self.chorus));
        params.extend(group_params("distortion", &self.distortion));
        params.extend(group_params("compressor", &self.compressor));
        params.extend(group_params("reverb", &self.reverb));
        params.extend(group_params("delay", &self.delay));
        params.extend(group_params("phaser", &self.phaser));
        params.extend(group_params("tremolo", &self.tremolo));
        params.extend(group_params("flanger", &self.flanger));
        params.extend(self.eq.to_params());
        params
    }

    /// Write every parameter into `sink`
    pub fn apply_to(&self, sink: &dyn ParameterSink) {
        for (name, value) in self.to_params() {
            sink.set_parameter(&name, value);
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
