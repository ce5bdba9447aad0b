//! Layer 1b: Processing Nodes
//!
//! The primitives every synthesis and effect module is wired from. Each node
//! owns a [`PortSpec`] with one audio input `in` (id 0, when it takes input)
//! and one output `out` (id 10); automatable parameters start at id 0.
//!
//! Source nodes (oscillators, constant and buffer sources) are silent until
//! started and after their stop time.

use crate::buffer::AudioBuffer;
use crate::convolution::PartitionedConvolver;
use crate::error::SynthError;
use crate::port::{
    AudioNode, Frame, ParamDef, ParamValues, PortDef, PortId, PortSpec, PortValues, SignalKind,
    SourceSchedule, TickContext,
};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::str::FromStr;
use std::sync::Arc;

/// Port id of every node's audio input
pub const IN: PortId = 0;
/// Port id of every node's output
pub const OUT: PortId = 10;

fn effect_spec(params: Vec<ParamDef>) -> PortSpec {
    PortSpec {
        inputs: vec![PortDef::new(IN, "in", SignalKind::Audio)],
        outputs: vec![PortDef::new(OUT, "out", SignalKind::Audio)],
        params,
    }
}

fn source_spec(params: Vec<ParamDef>) -> PortSpec {
    PortSpec {
        inputs: vec![],
        outputs: vec![PortDef::new(OUT, "out", SignalKind::Audio)],
        params,
    }
}

/// Oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
    Custom,
}

impl Waveform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
            Waveform::Custom => "custom",
        }
    }
}

impl FromStr for Waveform {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sine" => Ok(Waveform::Sine),
            "square" => Ok(Waveform::Square),
            "sawtooth" | "saw" => Ok(Waveform::Sawtooth),
            "triangle" => Ok(Waveform::Triangle),
            "custom" => Ok(Waveform::Custom),
            other => Err(SynthError::InvalidParam(format!("waveform `{}`", other))),
        }
    }
}

/// Biquad filter response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
    Lowshelf,
    Highshelf,
    Peaking,
    Notch,
    Allpass,
}

impl FilterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterType::Lowpass => "lowpass",
            FilterType::Highpass => "highpass",
            FilterType::Bandpass => "bandpass",
            FilterType::Lowshelf => "lowshelf",
            FilterType::Highshelf => "highshelf",
            FilterType::Peaking => "peaking",
            FilterType::Notch => "notch",
            FilterType::Allpass => "allpass",
        }
    }
}

impl FromStr for FilterType {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lowpass" => Ok(FilterType::Lowpass),
            "highpass" => Ok(FilterType::Highpass),
            "bandpass" => Ok(FilterType::Bandpass),
            "lowshelf" => Ok(FilterType::Lowshelf),
            "highshelf" => Ok(FilterType::Highshelf),
            "peaking" => Ok(FilterType::Peaking),
            "notch" => Ok(FilterType::Notch),
            "allpass" => Ok(FilterType::Allpass),
            other => Err(SynthError::InvalidParam(format!("filter type `{}`", other))),
        }
    }
}

/// Gain (VCA)
///
/// Multiplies its input by the `gain` parameter. Also used as a summing
/// point: every cable into `in` is added before the multiplication.
pub struct Gain {
    spec: PortSpec,
}

impl Gain {
    pub const GAIN: u32 = 0;

    pub fn new(gain: f64) -> Self {
        Self {
            spec: effect_spec(vec![ParamDef::new(Self::GAIN, "gain", gain)]),
        }
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl AudioNode for Gain {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(
        &mut self,
        _ctx: &TickContext,
        inputs: &PortValues,
        params: &ParamValues,
        outputs: &mut PortValues,
    ) {
        let gain = params.get_or(Self::GAIN, 1.0);
        outputs.set(OUT, inputs.frame(IN) * gain);
    }

    fn reset(&mut self) {}

    fn set_sample_rate(&mut self, _sample_rate: f64) {}

    fn node_type(&self) -> &'static str {
        "gain"
    }
}

/// Single-cycle waveform defined by Fourier coefficients
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicWave {
    table: Arc<[f64]>,
}

impl PeriodicWave {
    pub const TABLE_SIZE: usize = 2048;

    /// Build from cosine (`real`) and sine (`imag`) coefficients, index 0 is
    /// the DC term and is ignored. Normalized to unit peak unless
    /// `disable_normalization` is set.
    pub fn new(real: &[f64], imag: &[f64], disable_normalization: bool) -> Self {
        let harmonics = real.len().max(imag.len());
        let mut table = vec![0.0; Self::TABLE_SIZE];
        for (i, sample) in table.iter_mut().enumerate() {
            let phase = TAU * i as f64 / Self::TABLE_SIZE as f64;
            for k in 1..harmonics {
                let a = real.get(k).copied().unwrap_or(0.0);
                let b = imag.get(k).copied().unwrap_or(0.0);
                let kp = k as f64 * phase;
                *sample += a * kp.cos() + b * kp.sin();
            }
        }
        if !disable_normalization {
            let peak = table.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
            if peak > 0.0 {
                for s in &mut table {
                    *s /= peak;
                }
            }
        }
        Self {
            table: table.into(),
        }
    }

    /// Sine partials with amplitudes `amplitudes[k - 1]` for harmonic k
    pub fn from_harmonics(amplitudes: &[f64]) -> Self {
        let mut imag = vec![0.0];
        imag.extend_from_slice(amplitudes);
        Self::new(&[], &imag, false)
    }

    /// Bright odd/even harmonic blend, the default custom table
    pub fn bright() -> Self {
        Self::from_harmonics(&[1.0, 0.5, 0.33, 0.25, 0.2, 0.12, 0.08, 0.05])
    }

    /// Linearly interpolated lookup at a phase in [0, 1)
    pub fn sample(&self, phase: f64) -> f64 {
        let pos = phase * Self::TABLE_SIZE as f64;
        let i = pos.floor() as usize % Self::TABLE_SIZE;
        let frac = pos - pos.floor();
        let a = self.table[i];
        let b = self.table[(i + 1) % Self::TABLE_SIZE];
        a + (b - a) * frac
    }
}

/// PolyBLEP residual for band-limiting discontinuities
fn poly_blep(t: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let t = t / dt;
        t + t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + t + t + 1.0
    } else {
        0.0
    }
}

/// Scheduled periodic oscillator
///
/// Output frequency is `frequency * 2^(detune / 1200)`; both are automatable,
/// so a modulation bus connected to `detune` yields vibrato in cents.
pub struct Oscillator {
    waveform: Waveform,
    periodic_wave: Option<PeriodicWave>,
    phase: f64,
    schedule: SourceSchedule,
    spec: PortSpec,
}

impl Oscillator {
    pub const FREQUENCY: u32 = 0;
    pub const DETUNE: u32 = 1;

    pub fn new(waveform: Waveform, frequency: f64) -> Self {
        Self {
            waveform,
            periodic_wave: (waveform == Waveform::Custom).then(PeriodicWave::bright),
            phase: 0.0,
            schedule: SourceSchedule::default(),
            spec: source_spec(vec![
                ParamDef::new(Self::FREQUENCY, "frequency", frequency)
                    .with_range(-100_000.0, 100_000.0),
                ParamDef::new(Self::DETUNE, "detune", 0.0).with_range(-153_600.0, 153_600.0),
            ]),
        }
    }

    pub fn with_periodic_wave(mut self, wave: PeriodicWave) -> Self {
        self.set_periodic_wave(wave);
        self
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        if waveform == Waveform::Custom && self.periodic_wave.is_none() {
            self.periodic_wave = Some(PeriodicWave::bright());
        }
        self.waveform = waveform;
    }

    /// Switches the oscillator to [`Waveform::Custom`]
    pub fn set_periodic_wave(&mut self, wave: PeriodicWave) {
        self.periodic_wave = Some(wave);
        self.waveform = Waveform::Custom;
    }

    fn render(&self, dt: f64) -> f64 {
        let t = self.phase;
        match self.waveform {
            Waveform::Sine => (t * TAU).sin(),
            Waveform::Sawtooth => (2.0 * t - 1.0) - poly_blep(t, dt),
            Waveform::Square => {
                let naive = if t < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(t, dt) - poly_blep((t + 0.5).fract(), dt)
            }
            Waveform::Triangle => 1.0 - 4.0 * (t - 0.5).abs(),
            Waveform::Custom => self.periodic_wave.as_ref().map_or(0.0, |w| w.sample(t)),
        }
    }
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new(Waveform::Sine, 440.0)
    }
}

impl AudioNode for Oscillator {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(
        &mut self,
        ctx: &TickContext,
        _inputs: &PortValues,
        params: &ParamValues,
        outputs: &mut PortValues,
    ) {
        if !self.schedule.is_active(ctx.time) {
            outputs.set(OUT, Frame::SILENCE);
            return;
        }

        let frequency = params.get_or(Self::FREQUENCY, 440.0);
        let detune = params.get_or(Self::DETUNE, 0.0);
        let freq = frequency * 2.0_f64.powf(detune / 1200.0);
        let dt = (freq / ctx.sample_rate).abs().min(0.5);

        let value = self.render(dt);
        outputs.set(OUT, Frame::mono(value));

        self.phase = (self.phase + freq / ctx.sample_rate).rem_euclid(1.0);
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }

    fn set_sample_rate(&mut self, _sample_rate: f64) {}

    fn schedule(&self) -> Option<&SourceSchedule> {
        Some(&self.schedule)
    }

    fn schedule_mut(&mut self) -> Option<&mut SourceSchedule> {
        Some(&mut self.schedule)
    }

    fn node_type(&self) -> &'static str {
        "oscillator"
    }
}

/// Scheduled constant source emitting its `offset` parameter
pub struct ConstantSource {
    schedule: SourceSchedule,
    spec: PortSpec,
}

impl ConstantSource {
    pub const OFFSET: u32 = 0;

    pub fn new(offset: f64) -> Self {
        Self {
            schedule: SourceSchedule::default(),
            spec: source_spec(vec![ParamDef::new(Self::OFFSET, "offset", offset)]),
        }
    }
}

impl Default for ConstantSource {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl AudioNode for ConstantSource {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(
        &mut self,
        ctx: &TickContext,
        _inputs: &PortValues,
        params: &ParamValues,
        outputs: &mut PortValues,
    ) {
        let value = if self.schedule.is_active(ctx.time) {
            params.get_or(Self::OFFSET, 1.0)
        } else {
            0.0
        };
        outputs.set(OUT, Frame::mono(value));
    }

    fn reset(&mut self) {}

    fn set_sample_rate(&mut self, _sample_rate: f64) {}

    fn schedule(&self) -> Option<&SourceSchedule> {
        Some(&self.schedule)
    }

    fn schedule_mut(&mut self) -> Option<&mut SourceSchedule> {
        Some(&mut self.schedule)
    }

    fn node_type(&self) -> &'static str {
        "constant"
    }
}

/// Scheduled playback of a shared [`AudioBuffer`]
///
/// The buffer is resampled to the graph rate with linear interpolation.
/// Mono buffers play on both channels.
pub struct BufferSource {
    buffer: Option<Arc<AudioBuffer>>,
    looping: bool,
    position: f64,
    schedule: SourceSchedule,
    spec: PortSpec,
}

impl BufferSource {
    pub const PLAYBACK_RATE: u32 = 0;

    pub fn new(buffer: Arc<AudioBuffer>) -> Self {
        Self {
            buffer: Some(buffer),
            looping: false,
            position: 0.0,
            schedule: SourceSchedule::default(),
            spec: source_spec(vec![
                ParamDef::new(Self::PLAYBACK_RATE, "playback_rate", 1.0).with_range(0.0, 64.0)
            ]),
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }

    pub fn set_buffer(&mut self, buffer: Arc<AudioBuffer>) {
        self.buffer = Some(buffer);
        self.position = 0.0;
    }
}

impl AudioNode for BufferSource {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(
        &mut self,
        ctx: &TickContext,
        _inputs: &PortValues,
        params: &ParamValues,
        outputs: &mut PortValues,
    ) {
        let buffer = match &self.buffer {
            Some(b) if b.length() > 0 && self.schedule.is_active(ctx.time) => b,
            _ => {
                outputs.set(OUT, Frame::SILENCE);
                return;
            }
        };

        let len = buffer.length();
        if self.position >= len as f64 {
            if self.looping {
                self.position = self.position.rem_euclid(len as f64);
            } else {
                outputs.set(OUT, Frame::SILENCE);
                return;
            }
        }

        let index = self.position.floor() as usize;
        let frac = self.position - index as f64;
        let next = if index + 1 < len {
            index + 1
        } else if self.looping {
            0
        } else {
            index
        };

        let read = |side: usize| {
            let data = buffer.channel_for_output(side);
            let a = data[index] as f64;
            let b = data[next] as f64;
            a + (b - a) * frac
        };
        outputs.set(OUT, Frame::new(read(0), read(1)));

        let rate = params.get_or(Self::PLAYBACK_RATE, 1.0);
        self.position += rate * buffer.sample_rate() / ctx.sample_rate;
    }

    fn reset(&mut self) {
        self.position = 0.0;
    }

    fn set_sample_rate(&mut self, _sample_rate: f64) {}

    fn schedule(&self) -> Option<&SourceSchedule> {
        Some(&self.schedule)
    }

    fn schedule_mut(&mut self) -> Option<&mut SourceSchedule> {
        Some(&mut self.schedule)
    }

    fn node_type(&self) -> &'static str {
        "buffer_source"
    }
}

/// Normalized biquad coefficients (a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoefficients {
    /// Audio EQ Cookbook coefficients; `q` shapes every response type,
    /// `gain_db` applies to peaking and shelving types.
    pub fn compute(
        filter_type: FilterType,
        frequency: f64,
        q: f64,
        gain_db: f64,
        sample_rate: f64,
    ) -> Self {
        let nyquist = sample_rate * 0.5;
        let f0 = frequency.clamp(1.0, nyquist * 0.999);
        let q = q.max(1e-4);
        let w0 = TAU * f0 / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a = 10.0_f64.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match filter_type {
            FilterType::Lowpass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Highpass => {
                let b1 = -(1.0 + cos_w0);
                (-b1 / 2.0, b1, -b1 / 2.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Bandpass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
            FilterType::Notch => (
                1.0,
                -2.0 * cos_w0,
                1.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::Allpass => (
                1.0 - alpha,
                -2.0 * cos_w0,
                1.0 + alpha,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::Peaking => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterType::Lowshelf => {
                let sq = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + sq),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - sq),
                    (a + 1.0) + (a - 1.0) * cos_w0 + sq,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - sq,
                )
            }
            FilterType::Highshelf => {
                let sq = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + sq),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - sq),
                    (a + 1.0) - (a - 1.0) * cos_w0 + sq,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - sq,
                )
            }
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Magnitude response at `frequency`
    pub fn magnitude_at(&self, frequency: f64, sample_rate: f64) -> f64 {
        let w = TAU * frequency / sample_rate;
        let z1 = Complex::new(w.cos(), -w.sin());
        let z2 = z1 * z1;
        let num = Complex::new(self.b0, 0.0) + z1 * self.b1 + z2 * self.b2;
        let den = Complex::new(1.0, 0.0) + z1 * self.a1 + z2 * self.a2;
        (num / den).norm()
    }
}

/// Second-order IIR filter (transposed direct form II, one state per channel)
pub struct BiquadFilter {
    filter_type: FilterType,
    coeffs: BiquadCoefficients,
    cached: Option<(f64, f64, f64, f64)>,
    state: [[f64; 2]; 2],
    spec: PortSpec,
}

impl BiquadFilter {
    pub const FREQUENCY: u32 = 0;
    pub const Q: u32 = 1;
    pub const GAIN: u32 = 2;

    pub fn new(filter_type: FilterType, frequency: f64, q: f64) -> Self {
        Self {
            filter_type,
            coeffs: BiquadCoefficients::default(),
            cached: None,
            state: [[0.0; 2]; 2],
            spec: effect_spec(vec![
                ParamDef::new(Self::FREQUENCY, "frequency", frequency).with_range(0.0, 96_000.0),
                ParamDef::new(Self::Q, "q", q).with_range(1e-4, 1000.0),
                ParamDef::new(Self::GAIN, "gain", 0.0).with_range(-40.0, 40.0),
            ]),
        }
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        if self.filter_type != filter_type {
            self.filter_type = filter_type;
            self.cached = None;
        }
    }

    pub fn coefficients(&self) -> BiquadCoefficients {
        self.coeffs
    }

    fn update_coefficients(&mut self, frequency: f64, q: f64, gain: f64, sample_rate: f64) {
        let key = (frequency, q, gain, sample_rate);
        if self.cached != Some(key) {
            self.coeffs =
                BiquadCoefficients::compute(self.filter_type, frequency, q, gain, sample_rate);
            self.cached = Some(key);
        }
    }
}

impl AudioNode for BiquadFilter {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(
        &mut self,
        ctx: &TickContext,
        inputs: &PortValues,
        params: &ParamValues,
        outputs: &mut PortValues,
    ) {
        self.update_coefficients(
            params.get_or(Self::FREQUENCY, 350.0),
            params.get_or(Self::Q, 1.0),
            params.get_or(Self::GAIN, 0.0),
            ctx.sample_rate,
        );

        let c = self.coeffs;
        let input = inputs.frame(IN);
        let mut out = [0.0; 2];
        for (ch, y) in out.iter_mut().enumerate() {
            let x = input.channel(ch);
            let s = &mut self.state[ch];
            *y = c.b0 * x + s[0];
            s[0] = c.b1 * x - c.a1 * *y + s[1];
            s[1] = c.b2 * x - c.a2 * *y;
        }
        outputs.set(OUT, Frame::new(out[0], out[1]));
    }

    fn reset(&mut self) {
        self.state = [[0.0; 2]; 2];
    }

    fn set_sample_rate(&mut self, _sample_rate: f64) {
        self.cached = None;
    }

    fn node_type(&self) -> &'static str {
        "biquad"
    }
}

/// Variable delay line
///
/// The delayed sample is read before the input is written, so the effective
/// delay is never shorter than one sample and feedback loops through this
/// node are well defined.
pub struct Delay {
    max_delay: f64,
    buffer: Vec<Frame>,
    write: usize,
    spec: PortSpec,
}

impl Delay {
    pub const DELAY_TIME: u32 = 0;

    pub fn new(max_delay: f64) -> Self {
        let max_delay = max_delay.max(0.0);
        let mut delay = Self {
            max_delay,
            buffer: Vec::new(),
            write: 0,
            spec: effect_spec(vec![
                ParamDef::new(Self::DELAY_TIME, "delay_time", 0.0).with_range(0.0, max_delay)
            ]),
        };
        delay.set_sample_rate(44100.0);
        delay
    }

    pub fn max_delay(&self) -> f64 {
        self.max_delay
    }

    fn read(&self, delay_samples: f64) -> Frame {
        let len = self.buffer.len();
        let delay_samples = delay_samples.clamp(1.0, (len - 1) as f64);
        let whole = delay_samples.floor() as usize;
        let frac = delay_samples - whole as f64;
        let a = self.buffer[(self.write + len - whole) % len];
        let b = self.buffer[(self.write + len - whole - 1) % len];
        a * (1.0 - frac) + b * frac
    }
}

impl AudioNode for Delay {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(
        &mut self,
        ctx: &TickContext,
        inputs: &PortValues,
        params: &ParamValues,
        outputs: &mut PortValues,
    ) {
        let delay = params.get_or(Self::DELAY_TIME, 0.0) * ctx.sample_rate;
        outputs.set(OUT, self.read(delay));

        self.buffer[self.write] = inputs.frame(IN);
        self.write = (self.write + 1) % self.buffer.len();
    }

    fn reset(&mut self) {
        self.buffer.iter_mut().for_each(|f| *f = Frame::SILENCE);
        self.write = 0;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        let len = (self.max_delay * sample_rate).ceil() as usize + 3;
        self.buffer = vec![Frame::SILENCE; len];
        self.write = 0;
    }

    fn is_delay_line(&self) -> bool {
        true
    }

    fn node_type(&self) -> &'static str {
        "delay"
    }
}

/// Memoryless transfer-curve lookup
///
/// Input in [-1, 1] is mapped across the curve with linear interpolation;
/// values outside that range take the curve's end points. Without a curve
/// the node passes its input through.
pub struct WaveShaper {
    curve: Option<Arc<[f64]>>,
    spec: PortSpec,
}

impl WaveShaper {
    pub fn new() -> Self {
        Self {
            curve: None,
            spec: effect_spec(vec![]),
        }
    }

    pub fn with_curve(curve: Arc<[f64]>) -> Self {
        let mut shaper = Self::new();
        shaper.set_curve(curve);
        shaper
    }

    pub fn curve(&self) -> Option<&Arc<[f64]>> {
        self.curve.as_ref()
    }

    pub fn set_curve(&mut self, curve: Arc<[f64]>) {
        self.curve = if curve.is_empty() { None } else { Some(curve) };
    }

    /// Apply the curve to a single value
    pub fn shape(&self, x: f64) -> f64 {
        let curve = match &self.curve {
            Some(c) => c,
            None => return x,
        };
        let n = curve.len();
        if n == 1 {
            return curve[0];
        }
        let v = (n - 1) as f64 * 0.5 * (x + 1.0);
        if v <= 0.0 {
            curve[0]
        } else if v >= (n - 1) as f64 {
            curve[n - 1]
        } else {
            let k = v.floor() as usize;
            let f = v - k as f64;
            curve[k] + (curve[k + 1] - curve[k]) * f
        }
    }
}

impl Default for WaveShaper {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for WaveShaper {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(
        &mut self,
        _ctx: &TickContext,
        inputs: &PortValues,
        _params: &ParamValues,
        outputs: &mut PortValues,
    ) {
        let shaped = inputs.frame(IN).map(|x| self.shape(x));
        outputs.set(OUT, shaped);
    }

    fn reset(&mut self) {}

    fn set_sample_rate(&mut self, _sample_rate: f64) {}

    fn node_type(&self) -> &'static str {
        "waveshaper"
    }
}

/// Feed-forward soft-knee compressor with linked stereo detection
pub struct DynamicsCompressor {
    envelope_db: f64,
    spec: PortSpec,
}

impl DynamicsCompressor {
    pub const THRESHOLD: u32 = 0;
    pub const KNEE: u32 = 1;
    pub const RATIO: u32 = 2;
    pub const ATTACK: u32 = 3;
    pub const RELEASE: u32 = 4;

    pub fn new() -> Self {
        Self {
            envelope_db: 0.0,
            spec: effect_spec(vec![
                ParamDef::new(Self::THRESHOLD, "threshold", -24.0).with_range(-100.0, 0.0),
                ParamDef::new(Self::KNEE, "knee", 30.0).with_range(0.0, 40.0),
                ParamDef::new(Self::RATIO, "ratio", 12.0).with_range(1.0, 20.0),
                ParamDef::new(Self::ATTACK, "attack", 0.003).with_range(0.0, 1.0),
                ParamDef::new(Self::RELEASE, "release", 0.25).with_range(0.0, 1.0),
            ]),
        }
    }

    /// Current gain reduction in dB (zero or negative)
    pub fn reduction(&self) -> f64 {
        self.envelope_db
    }

    /// Static gain computer: output level in dB for an input level in dB
    pub fn gain_computer(input_db: f64, threshold: f64, knee: f64, ratio: f64) -> f64 {
        let over = input_db - threshold;
        if knee > 0.0 && 2.0 * over.abs() <= knee {
            let x = over + knee / 2.0;
            input_db + (1.0 / ratio - 1.0) * x * x / (2.0 * knee)
        } else if over > 0.0 {
            threshold + over / ratio
        } else {
            input_db
        }
    }
}

impl Default for DynamicsCompressor {
    fn default() -> Self {
        Self::new()
    }
}

fn time_coefficient(seconds: f64, sample_rate: f64) -> f64 {
    if seconds <= 0.0 {
        0.0
    } else {
        (-1.0 / (seconds * sample_rate)).exp()
    }
}

impl AudioNode for DynamicsCompressor {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(
        &mut self,
        ctx: &TickContext,
        inputs: &PortValues,
        params: &ParamValues,
        outputs: &mut PortValues,
    ) {
        let threshold = params.get_or(Self::THRESHOLD, -24.0);
        let knee = params.get_or(Self::KNEE, 30.0);
        let ratio = params.get_or(Self::RATIO, 12.0).max(1.0);
        let attack = params.get_or(Self::ATTACK, 0.003);
        let release = params.get_or(Self::RELEASE, 0.25);

        let input = inputs.frame(IN);
        let level = input.peak();
        let level_db = if level > 1e-10 {
            20.0 * level.log10()
        } else {
            -200.0
        };

        let target = Self::gain_computer(level_db, threshold, knee, ratio) - level_db;
        let coeff = if target < self.envelope_db {
            time_coefficient(attack, ctx.sample_rate)
        } else {
            time_coefficient(release, ctx.sample_rate)
        };
        self.envelope_db = target + coeff * (self.envelope_db - target);

        let gain = 10.0_f64.powf(self.envelope_db / 20.0);
        outputs.set(OUT, input * gain);
    }

    fn reset(&mut self) {
        self.envelope_db = 0.0;
    }

    fn set_sample_rate(&mut self, _sample_rate: f64) {}

    fn node_type(&self) -> &'static str {
        "compressor"
    }
}

/// Impulse-response reverb node
///
/// Mono impulses are applied to both channels; stereo impulses convolve each
/// input channel with the matching impulse channel. Output lags input by one
/// block of [`PartitionedConvolver::BLOCK_SIZE`] samples.
pub struct Convolver {
    buffer: Option<Arc<AudioBuffer>>,
    normalize: bool,
    engines: Vec<PartitionedConvolver>,
    spec: PortSpec,
}

impl Convolver {
    const GAIN_CALIBRATION: f64 = 0.00125;
    const GAIN_CALIBRATION_SAMPLE_RATE: f64 = 44100.0;
    const MIN_POWER: f64 = 0.000125;

    pub fn new() -> Self {
        Self {
            buffer: None,
            normalize: true,
            engines: Vec::new(),
            spec: effect_spec(vec![]),
        }
    }

    pub fn normalize(&self) -> bool {
        self.normalize
    }

    /// Takes effect on the next [`set_buffer`](Self::set_buffer)
    pub fn set_normalize(&mut self, normalize: bool) {
        self.normalize = normalize;
    }

    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }

    pub fn set_buffer(&mut self, buffer: Arc<AudioBuffer>) {
        let scale = if self.normalize {
            Self::normalization_scale(&buffer)
        } else {
            1.0
        };
        self.engines = (0..2)
            .map(|side| {
                let ir: Vec<f64> = buffer
                    .channel_for_output(side)
                    .iter()
                    .map(|&s| s as f64 * scale)
                    .collect();
                PartitionedConvolver::new(&ir)
            })
            .collect();
        self.buffer = Some(buffer);
    }

    /// Power-based scale applied to the impulse when normalizing
    pub fn normalization_scale(buffer: &AudioBuffer) -> f64 {
        let channels = buffer.number_of_channels();
        let length = buffer.length();
        if length == 0 {
            return 1.0;
        }
        let energy: f64 = (0..channels)
            .flat_map(|ch| buffer.channel(ch).iter())
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        let mut power = (energy / (channels * length) as f64).sqrt();
        if !power.is_finite() || power < Self::MIN_POWER {
            power = Self::MIN_POWER;
        }
        Self::GAIN_CALIBRATION / power * Self::GAIN_CALIBRATION_SAMPLE_RATE
            / buffer.sample_rate()
    }
}

impl Default for Convolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for Convolver {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(
        &mut self,
        _ctx: &TickContext,
        inputs: &PortValues,
        _params: &ParamValues,
        outputs: &mut PortValues,
    ) {
        let input = inputs.frame(IN);
        let out = match self.engines.as_mut_slice() {
            [left, right] => Frame::new(left.process(input.left), right.process(input.right)),
            _ => Frame::SILENCE,
        };
        outputs.set(OUT, out);
    }

    fn reset(&mut self) {
        self.engines.iter_mut().for_each(PartitionedConvolver::reset);
    }

    fn set_sample_rate(&mut self, _sample_rate: f64) {}

    fn node_type(&self) -> &'static str {
        "convolver"
    }
}

/// Passthrough tap exposing time-domain and spectral snapshots
pub struct Analyser {
    fft_size: usize,
    smoothing: f64,
    min_decibels: f64,
    max_decibels: f64,
    history: Vec<f64>,
    write: usize,
    smoothed: Vec<f64>,
    planner: FftPlanner<f64>,
    spec: PortSpec,
}

impl Analyser {
    pub const MIN_FFT_SIZE: usize = 32;
    pub const MAX_FFT_SIZE: usize = 32768;
    pub const DEFAULT_FFT_SIZE: usize = 2048;

    pub fn new() -> Self {
        Self {
            fft_size: Self::DEFAULT_FFT_SIZE,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            history: vec![0.0; Self::MAX_FFT_SIZE],
            write: 0,
            smoothed: vec![0.0; Self::DEFAULT_FFT_SIZE / 2],
            planner: FftPlanner::new(),
            spec: effect_spec(vec![]),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Set the analysis window; rounds up to a power of two within range
    pub fn set_fft_size(&mut self, size: usize) {
        let size = size
            .clamp(Self::MIN_FFT_SIZE, Self::MAX_FFT_SIZE)
            .next_power_of_two();
        if size != self.fft_size {
            self.fft_size = size;
            self.smoothed = vec![0.0; size / 2];
        }
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    pub fn set_smoothing(&mut self, smoothing: f64) {
        self.smoothing = smoothing.clamp(0.0, 1.0);
    }

    pub fn decibel_range(&self) -> (f64, f64) {
        (self.min_decibels, self.max_decibels)
    }

    pub fn set_decibel_range(&mut self, min: f64, max: f64) {
        if min < max {
            self.min_decibels = min;
            self.max_decibels = max;
        }
    }

    /// Most recent `fft_size` samples (downmixed), oldest first
    pub fn time_domain_data(&self) -> Vec<f32> {
        let len = self.history.len();
        let start = (self.write + len - self.fft_size) % len;
        (0..self.fft_size)
            .map(|i| self.history[(start + i) % len] as f32)
            .collect()
    }

    /// Smoothed magnitude spectrum in dB, `fft_size / 2` bins.
    ///
    /// Each call advances the smoothing state.
    pub fn frequency_data(&mut self) -> Vec<f32> {
        let n = self.fft_size;
        let samples = self.time_domain_data();
        let mut spectrum: Vec<Complex<f64>> = samples
            .iter()
            .enumerate()
            .map(|(i, &s)| Complex::new(s as f64 * blackman(i, n), 0.0))
            .collect();

        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut spectrum);

        let tau = self.smoothing;
        self.smoothed
            .iter_mut()
            .zip(spectrum.iter())
            .map(|(prev, bin)| {
                let magnitude = bin.norm() / n as f64;
                *prev = tau * *prev + (1.0 - tau) * magnitude;
                if *prev > 0.0 {
                    (20.0 * prev.log10()) as f32
                } else {
                    f32::NEG_INFINITY
                }
            })
            .collect()
    }

    /// Spectrum scaled to bytes across the decibel range
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let (min, max) = (self.min_decibels, self.max_decibels);
        self.frequency_data()
            .into_iter()
            .map(|db| {
                let scaled = 255.0 * (db as f64 - min) / (max - min);
                scaled.clamp(0.0, 255.0) as u8
            })
            .collect()
    }
}

fn blackman(i: usize, n: usize) -> f64 {
    let a = 0.16;
    let a0 = 0.5 * (1.0 - a);
    let a2 = 0.5 * a;
    let x = i as f64 / n as f64;
    a0 - 0.5 * (TAU * x).cos() + a2 * (2.0 * TAU * x).cos()
}

impl Default for Analyser {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for Analyser {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(
        &mut self,
        _ctx: &TickContext,
        inputs: &PortValues,
        _params: &ParamValues,
        outputs: &mut PortValues,
    ) {
        let input = inputs.frame(IN);
        self.history[self.write] = input.downmix();
        self.write = (self.write + 1) % self.history.len();
        outputs.set(OUT, input);
    }

    fn reset(&mut self) {
        self.history.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
        self.write = 0;
    }

    fn set_sample_rate(&mut self, _sample_rate: f64) {}

    fn node_type(&self) -> &'static str {
        "analyser"
    }
}

/// Final sink of a [`SignalGraph`](crate::graph::SignalGraph)
pub struct Destination {
    spec: PortSpec,
}

impl Destination {
    pub fn new() -> Self {
        Self {
            spec: effect_spec(vec![]),
        }
    }
}

impl Default for Destination {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for Destination {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(
        &mut self,
        _ctx: &TickContext,
        inputs: &PortValues,
        _params: &ParamValues,
        outputs: &mut PortValues,
    ) {
        outputs.set(OUT, inputs.frame(IN));
    }

    fn reset(&mut self) {}

    fn set_sample_rate(&mut self, _sample_rate: f64) {}

    fn node_type(&self) -> &'static str {
        "destination"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ctx(time: f64) -> TickContext {
        TickContext {
            time,
            sample_rate: 44100.0,
        }
    }

    fn params_of(spec: &PortSpec) -> ParamValues {
        let mut params = ParamValues::new();
        for p in &spec.params {
            params.set(p.id, p.default);
        }
        params
    }

    fn run(node: &mut dyn AudioNode, input: &[f64]) -> Vec<Frame> {
        let params = params_of(node.port_spec());
        input
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let mut inputs = PortValues::new();
                inputs.set(IN, Frame::mono(x));
                let mut outputs = PortValues::new();
                node.tick(&ctx(i as f64 / 44100.0), &inputs, &params, &mut outputs);
                outputs.frame(OUT)
            })
            .collect()
    }

    #[test]
    fn test_waveform_parsing() {
        assert_eq!("Sawtooth".parse::<Waveform>().unwrap(), Waveform::Sawtooth);
        assert_eq!("peaking".parse::<FilterType>().unwrap(), FilterType::Peaking);
        assert!("wobble".parse::<Waveform>().is_err());
        assert_eq!(Waveform::Triangle.as_str(), "triangle");
    }

    #[test]
    fn test_oscillator_silent_until_started() {
        let mut osc = Oscillator::new(Waveform::Square, 440.0);
        let out = run(&mut osc, &[0.0; 4]);
        assert!(out.iter().all(|f| *f == Frame::SILENCE));

        osc.schedule_mut().unwrap().start_at(0.0);
        let out = run(&mut osc, &vec![0.0; 441]);
        assert!(out.iter().any(|f| f.left.abs() > 0.5));
    }

    #[test]
    fn test_oscillator_range() {
        for waveform in [
            Waveform::Sine,
            Waveform::Square,
            Waveform::Sawtooth,
            Waveform::Triangle,
            Waveform::Custom,
        ] {
            let mut osc = Oscillator::new(waveform, 220.0);
            osc.schedule_mut().unwrap().start_at(0.0);
            let out = run(&mut osc, &vec![0.0; 2000]);
            for f in out {
                assert!(f.left.abs() <= 1.2, "{:?} out of range: {}", waveform, f.left);
            }
        }
    }

    #[test]
    fn test_periodic_wave_normalized() {
        let wave = PeriodicWave::bright();
        let peak = (0..1000)
            .map(|i| wave.sample(i as f64 / 1000.0).abs())
            .fold(0.0, f64::max);
        assert!(peak <= 1.0 + 1e-9);
        assert!(peak > 0.95);
    }

    #[test]
    fn test_gain_scales_input() {
        let mut gain = Gain::new(0.5);
        let out = run(&mut gain, &[1.0, -2.0]);
        assert_abs_diff_eq!(out[0].left, 0.5);
        assert_abs_diff_eq!(out[1].right, -1.0);
    }

    #[test]
    fn test_delay_minimum_one_sample() {
        let mut delay = Delay::new(1.0);
        let out = run(&mut delay, &[1.0, 0.0, 0.0]);
        assert_abs_diff_eq!(out[0].left, 0.0);
        assert_abs_diff_eq!(out[1].left, 1.0);
        assert_abs_diff_eq!(out[2].left, 0.0);
    }

    #[test]
    fn test_delay_time_in_samples() {
        let mut delay = Delay::new(1.0);
        let mut params = params_of(delay.port_spec());
        params.set(Delay::DELAY_TIME, 10.0 / 44100.0);
        let mut hit = None;
        for i in 0..20 {
            let mut inputs = PortValues::new();
            inputs.set(IN, Frame::mono(if i == 0 { 1.0 } else { 0.0 }));
            let mut outputs = PortValues::new();
            delay.tick(&ctx(0.0), &inputs, &params, &mut outputs);
            if outputs.frame(OUT).left > 0.5 {
                hit = Some(i);
            }
        }
        assert_eq!(hit, Some(10));
    }

    #[test]
    fn test_lowpass_attenuates_high_frequency() {
        let c = BiquadCoefficients::compute(FilterType::Lowpass, 1000.0, 0.707, 0.0, 44100.0);
        assert!((c.magnitude_at(50.0, 44100.0) - 1.0).abs() < 0.01);
        assert!(c.magnitude_at(10000.0, 44100.0) < 0.05);
    }

    #[test]
    fn test_peaking_gain_at_center() {
        let c = BiquadCoefficients::compute(FilterType::Peaking, 1000.0, 1.0, 6.0, 44100.0);
        let db = 20.0 * c.magnitude_at(1000.0, 44100.0).log10();
        assert_abs_diff_eq!(db, 6.0, epsilon = 0.01);
    }

    #[test]
    fn test_allpass_is_flat() {
        let c = BiquadCoefficients::compute(FilterType::Allpass, 1000.0, 0.5, 0.0, 44100.0);
        for f in [100.0, 1000.0, 5000.0] {
            assert_abs_diff_eq!(c.magnitude_at(f, 44100.0), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_waveshaper_mapping() {
        let shaper = WaveShaper::with_curve(Arc::from(vec![-1.0, 0.0, 1.0]));
        assert_abs_diff_eq!(shaper.shape(0.0), 0.0);
        assert_abs_diff_eq!(shaper.shape(0.5), 0.5);
        assert_abs_diff_eq!(shaper.shape(-4.0), -1.0);
        assert_abs_diff_eq!(shaper.shape(4.0), 1.0);
        assert_abs_diff_eq!(WaveShaper::new().shape(0.3), 0.3);
    }

    #[test]
    fn test_compressor_gain_computer() {
        // below knee: unity
        assert_abs_diff_eq!(
            DynamicsCompressor::gain_computer(-60.0, -24.0, 30.0, 12.0),
            -60.0
        );
        // well above knee: ratio applies
        assert_abs_diff_eq!(
            DynamicsCompressor::gain_computer(0.0, -24.0, 6.0, 4.0),
            -18.0
        );
    }

    #[test]
    fn test_compressor_reduces_loud_signal() {
        let mut comp = DynamicsCompressor::new();
        let out = run(&mut comp, &vec![1.0; 4410]);
        assert!(comp.reduction() < -10.0);
        assert!(out.last().unwrap().left < 0.5);
    }

    #[test]
    fn test_constant_source_window() {
        let mut source = ConstantSource::new(0.25);
        source.schedule_mut().unwrap().start_at(0.0);
        let out = run(&mut source, &[0.0; 2]);
        assert_abs_diff_eq!(out[0].left, 0.25);
    }

    #[test]
    fn test_buffer_source_loops() {
        let buffer = Arc::new(AudioBuffer::from_channels(vec![vec![1.0, 2.0, 3.0]], 44100.0));
        let mut source = BufferSource::new(buffer).looping(true);
        source.schedule_mut().unwrap().start_at(0.0);
        let out = run(&mut source, &[0.0; 7]);
        let left: Vec<f64> = out.iter().map(|f| f.left).collect();
        assert_eq!(left, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0]);
        assert_eq!(out[1].right, 2.0);
    }

    #[test]
    fn test_buffer_source_one_shot_ends() {
        let buffer = Arc::new(AudioBuffer::from_channels(vec![vec![1.0, 1.0]], 44100.0));
        let mut source = BufferSource::new(buffer);
        source.schedule_mut().unwrap().start_at(0.0);
        let out = run(&mut source, &[0.0; 4]);
        assert_eq!(out[3], Frame::SILENCE);
    }

    #[test]
    fn test_convolver_identity_impulse() {
        let mut conv = Convolver::new();
        conv.set_normalize(false);
        conv.set_buffer(Arc::new(AudioBuffer::from_channels(
            vec![vec![1.0], vec![0.5]],
            44100.0,
        )));
        let mut input = vec![0.0; 512];
        input[3] = 1.0;
        let out = run(&mut conv, &input);
        let latency = PartitionedConvolver::BLOCK_SIZE;
        assert_abs_diff_eq!(out[3 + latency].left, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out[3 + latency].right, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(out[4 + latency].left, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_convolver_normalization_scale() {
        let buffer = AudioBuffer::from_channels(vec![vec![1.0; 100]], 44100.0);
        assert_abs_diff_eq!(Convolver::normalization_scale(&buffer), 0.00125, epsilon = 1e-12);
    }

    #[test]
    fn test_analyser_spectrum_peak() {
        let mut analyser = Analyser::new();
        analyser.set_fft_size(1024);
        analyser.set_smoothing(0.0);
        let bin = 32;
        let freq = bin as f64 * 44100.0 / 1024.0;
        let input: Vec<f64> = (0..1024)
            .map(|i| (TAU * freq * i as f64 / 44100.0).sin())
            .collect();
        run(&mut analyser, &input);

        assert_eq!(analyser.time_domain_data().len(), 1024);
        let spectrum = analyser.frequency_data();
        assert_eq!(spectrum.len(), 512);
        let peak = spectrum
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        assert_eq!(peak.0, bin);
    }

    #[test]
    fn test_analyser_fft_size_rounds() {
        let mut analyser = Analyser::new();
        analyser.set_fft_size(1000);
        assert_eq!(analyser.fft_size(), 1024);
        analyser.set_fft_size(1);
        assert_eq!(analyser.fft_size(), 32);
        analyser.set_fft_size(1 << 20);
        assert_eq!(analyser.fft_size(), 32768);
    }

    #[test]
    fn test_blackman_window_ends() {
        assert_abs_diff_eq!(blackman(0, 64), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(blackman(32, 64), 1.0, epsilon = 1e-12);
    }
}
