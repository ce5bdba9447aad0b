//! Noise Generation
//!
//! White, pink (Voss–McCartney) and brown (bounded random walk) noise,
//! rendered into a two second looping buffer. The buffer is cached per noise
//! type and shared by every voice playing it; a type change replaces the
//! cached reference and never touches a buffer already handed out.

use crate::buffer::AudioBuffer;
use crate::config::{read_bool, read_clamped, read_enum, ParamValue, ParameterSource, SharedSource};
use crate::error::{Result, SynthError};
use crate::graph::{NodeId, SignalGraph};
use crate::nodes::{BufferSource, Gain};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Length of the looping noise buffer
pub const NOISE_BUFFER_SECONDS: f64 = 2.0;

/// Octave generators in the pink noise approximation
pub const PINK_GENERATORS: usize = 7;

/// Largest brown-walk step per sample
pub const BROWN_STEP: f64 = 0.015;

/// Per-sample leak pulling the brown walk back toward zero
pub const BROWN_DRIFT: f64 = 0.998;

/// Output scale of brown noise; values may exceed unity after scaling
pub const BROWN_GAIN: f64 = 3.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseType {
    #[default]
    White,
    Pink,
    Brown,
}

impl NoiseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseType::White => "white",
            NoiseType::Pink => "pink",
            NoiseType::Brown => "brown",
        }
    }
}

impl FromStr for NoiseType {
    type Err = SynthError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" => Ok(NoiseType::White),
            "pink" => Ok(NoiseType::Pink),
            "brown" | "brownian" => Ok(NoiseType::Brown),
            other => Err(SynthError::InvalidParam(format!("noise type `{}`", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoiseConfig {
    #[serde(rename = "type")]
    pub noise_type: NoiseType,
    pub level: f64,
    pub enabled: bool,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            noise_type: NoiseType::White,
            level: 0.1,
            enabled: false,
        }
    }
}

impl NoiseConfig {
    pub fn read(source: &dyn ParameterSource) -> Self {
        let d = Self::default();
        Self {
            noise_type: read_enum(source, "noise.type", d.noise_type),
            level: read_clamped(source, "noise.level", d.level, 0.0, 1.0),
            enabled: read_bool(source, "noise.enabled", d.enabled),
        }
    }

    pub fn to_params(&self) -> Vec<(String, ParamValue)> {
        vec![
            ("noise.type".to_string(), self.noise_type.as_str().into()),
            ("noise.level".to_string(), self.level.into()),
            ("noise.enabled".to_string(), self.enabled.into()),
        ]
    }
}

/// Independent uniform samples in [-1, 1]
pub fn white_noise<R: Rng>(rng: &mut R, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(-1.0..=1.0)).collect()
}

/// Voss–McCartney pink noise.
///
/// Generator `k` is redrawn when bit `k` of the sample index falls to zero;
/// the output is the mean of all generators.
pub fn pink_noise<R: Rng>(rng: &mut R, len: usize) -> Vec<f32> {
    let mut rows: [f64; PINK_GENERATORS] = std::array::from_fn(|_| rng.gen_range(-1.0..=1.0));
    let mut out = Vec::with_capacity(len);

    for i in 0..len {
        if i > 0 {
            let prev = i - 1;
            for (k, row) in rows.iter_mut().enumerate() {
                let was_set = (prev >> k) & 1 == 1;
                let is_set = (i >> k) & 1 == 1;
                if was_set && !is_set {
                    *row = rng.gen_range(-1.0..=1.0);
                }
            }
        }
        let mean = rows.iter().sum::<f64>() / PINK_GENERATORS as f64;
        out.push(mean as f32);
    }

    out
}

/// Bounded random walk in [-1, 1], before output scaling
pub fn brown_walk<R: Rng>(rng: &mut R, len: usize) -> Vec<f32> {
    let mut last = 0.0_f64;
    (0..len)
        .map(|_| {
            last = ((last + rng.gen_range(-BROWN_STEP..=BROWN_STEP)) * BROWN_DRIFT).clamp(-1.0, 1.0);
            last as f32
        })
        .collect()
}

/// Brown noise: the bounded walk scaled by [`BROWN_GAIN`]
pub fn brown_noise<R: Rng>(rng: &mut R, len: usize) -> Vec<f32> {
    brown_walk(rng, len)
        .into_iter()
        .map(|s| s * BROWN_GAIN as f32)
        .collect()
}

/// A started noise voice: looping buffer player into its level gain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseSource {
    pub source: NodeId,
    pub gain: NodeId,
}

pub struct NoiseModule {
    source: SharedSource,
    cache: Option<(NoiseType, Arc<AudioBuffer>)>,
    rng: StdRng,
}

impl NoiseModule {
    pub fn new(source: SharedSource) -> Self {
        Self {
            source,
            cache: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generation for reproducible renders
    pub fn with_seed(source: SharedSource, seed: u64) -> Self {
        Self {
            source,
            cache: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> NoiseConfig {
        NoiseConfig::read(self.source.as_ref())
    }

    pub fn cached_type(&self) -> Option<NoiseType> {
        self.cache.as_ref().map(|(t, _)| *t)
    }

    /// Buffer for `noise_type`, regenerated only when the type (or the
    /// sample rate) differs from the cached one
    pub fn buffer_for(&mut self, noise_type: NoiseType, sample_rate: f64) -> Arc<AudioBuffer> {
        if let Some((cached, buffer)) = &self.cache {
            if *cached == noise_type && buffer.sample_rate() == sample_rate {
                return buffer.clone();
            }
        }

        let len = (sample_rate * NOISE_BUFFER_SECONDS).round() as usize;
        let data = match noise_type {
            NoiseType::White => white_noise(&mut self.rng, len),
            NoiseType::Pink => pink_noise(&mut self.rng, len),
            NoiseType::Brown => brown_noise(&mut self.rng, len),
        };
        let buffer = Arc::new(AudioBuffer::from_channels(vec![data], sample_rate));
        self.cache = Some((noise_type, buffer.clone()));
        buffer
    }

    /// Looping noise player and level gain, or `None` when noise is disabled.
    ///
    /// The caller connects `gain` onward and starts `source`.
    pub fn create_noise_source(&mut self, graph: &mut SignalGraph) -> Result<Option<NoiseSource>> {
        let config = self.config();
        if !config.enabled {
            return Ok(None);
        }

        let buffer = self.buffer_for(config.noise_type, graph.sample_rate());
        let player = graph.add("noise", BufferSource::new(buffer).looping(true));
        let gain = graph.add("noise_level", Gain::new(config.level));
        graph.connect(player.out("out"), gain.in_("in"))?;

        Ok(Some(NoiseSource {
            source: player.id(),
            gain: gain.id(),
        }))
    }
}
