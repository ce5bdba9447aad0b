//! Audio Performance Benchmarks
//!
//! Validates that the engine keeps up with real-time rendering at common
//! sample rates, buffer sizes and polyphony levels.
//!
//! ## Real-Time Audio Constraints
//!
//! A buffer must be rendered before the next one is due:
//!
//! ```text
//! time_budget = buffer_size / sample_rate
//! ```
//!
//! | Sample Rate | Buffer 64  | Buffer 128 | Buffer 256 | Buffer 512 |
//! |-------------|------------|------------|------------|------------|
//! | 44.1 kHz    | 1.45 ms    | 2.90 ms    | 5.80 ms    | 11.61 ms   |
//! | 48 kHz      | 1.33 ms    | 2.67 ms    | 5.33 ms    | 10.67 ms   |
//! | 96 kHz      | 0.67 ms    | 1.33 ms    | 2.67 ms    | 5.33 ms    |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use timbre::convolution::PartitionedConvolver;
use timbre::nodes::{IN, OUT};
use timbre::port::{ParamValues, PortValues, TickContext};
use timbre::prelude::*;

// ============================================================================
// Constants
// ============================================================================

const SAMPLE_RATES: [f64; 3] = [44100.0, 48000.0, 96000.0];
const BUFFER_SIZES: [usize; 4] = [64, 128, 256, 512];
const VOICE_COUNTS: [usize; 4] = [1, 4, 8, 16];

// ============================================================================
// Helper Functions
// ============================================================================

/// Two detuned saws through a resonant filter, with a short reverb
fn bench_store() -> Arc<MapParameterSource> {
    let store = Arc::new(MapParameterSource::new());
    store.set("osc.count", 2.0);
    store.set("osc.0.waveform", "sawtooth");
    store.set("osc.1.waveform", "sawtooth");
    store.set("osc.1.detune", 7.0);
    store.set("filter.resonance", 4.0);
    store.set("reverb.decay", 0.5);
    store
}

fn create_synth(sample_rate: f64, voices: usize) -> Synth {
    let mut synth = Synth::with_seed(sample_rate, bench_store(), 1).unwrap();
    for i in 0..voices {
        synth.note_on_midi(48 + i as u8, 0.8).unwrap();
    }
    synth
}

fn tick_context(sample_rate: f64) -> TickContext {
    TickContext {
        time: 0.0,
        sample_rate,
    }
}

// ============================================================================
// Node Benchmarks
// ============================================================================

fn bench_oscillator(c: &mut Criterion) {
    let mut group = c.benchmark_group("nodes/oscillator");

    for sample_rate in SAMPLE_RATES {
        let sr_name = format!("{}kHz", sample_rate as u32 / 1000);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("tick", &sr_name),
            &sample_rate,
            |b, &sr| {
                let mut osc = Oscillator::new(Waveform::Sawtooth, 220.0);
                osc.set_sample_rate(sr);
                if let Some(schedule) = osc.schedule_mut() {
                    schedule.start_at(0.0);
                }
                let ctx = tick_context(sr);
                let inputs = PortValues::new();
                let mut params = ParamValues::new();
                params.set(Oscillator::FREQUENCY, 220.0);
                let mut outputs = PortValues::new();

                b.iter(|| {
                    osc.tick(&ctx, black_box(&inputs), &params, &mut outputs);
                    outputs.frame(OUT)
                });
            },
        );
    }

    group.finish();
}

fn bench_biquad(c: &mut Criterion) {
    let mut group = c.benchmark_group("nodes/biquad");

    for sample_rate in SAMPLE_RATES {
        let sr_name = format!("{}kHz", sample_rate as u32 / 1000);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("tick", &sr_name),
            &sample_rate,
            |b, &sr| {
                let mut filter = BiquadFilter::new(FilterType::Lowpass, 1200.0, 4.0);
                filter.set_sample_rate(sr);
                let ctx = tick_context(sr);
                let mut inputs = PortValues::new();
                inputs.set(IN, Frame::mono(0.5));
                let mut params = ParamValues::new();
                params.set(BiquadFilter::FREQUENCY, 1200.0);
                params.set(BiquadFilter::Q, 4.0);
                let mut outputs = PortValues::new();

                b.iter(|| {
                    filter.tick(&ctx, black_box(&inputs), &params, &mut outputs);
                    outputs.frame(OUT)
                });
            },
        );
    }

    group.finish();
}

fn bench_convolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("convolution/partitioned");

    for seconds in [0.1, 0.5, 2.0] {
        let len = (44100.0 * seconds) as usize;
        let impulse: Vec<f64> = (0..len)
            .map(|i| (1.0 - i as f64 / len as f64) * if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("sample", len), &impulse, |b, ir| {
            let mut convolver = PartitionedConvolver::new(ir);
            let mut x = 0.0;
            b.iter(|| {
                x = 1.0 - x;
                convolver.process(black_box(x))
            });
        });
    }

    group.finish();
}

// ============================================================================
// Engine Benchmarks
// ============================================================================

fn bench_buffer_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/buffer_processing");

    for buffer_size in BUFFER_SIZES {
        group.throughput(Throughput::Elements(buffer_size as u64));
        group.bench_with_input(
            BenchmarkId::new("4_voices", buffer_size),
            &buffer_size,
            |b, &size| {
                let mut synth = create_synth(44100.0, 4);
                let mut block = vec![Frame::SILENCE; size];
                b.iter(|| {
                    synth.process(black_box(&mut block));
                    block[0]
                });
            },
        );
    }

    group.finish();
}

fn bench_polyphony_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/polyphony");

    for voices in VOICE_COUNTS {
        group.throughput(Throughput::Elements(128));
        group.bench_with_input(
            BenchmarkId::new("render_quantum", voices),
            &voices,
            |b, &n| {
                let mut synth = create_synth(44100.0, n);
                let mut block = vec![Frame::SILENCE; RENDER_QUANTUM];
                b.iter(|| {
                    synth.process(black_box(&mut block));
                    block[0]
                });
            },
        );
    }

    group.finish();
}

fn bench_voice_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/voice_allocation");

    group.bench_function("note_on_off", |b| {
        let mut synth = create_synth(44100.0, 0);
        let mut block = vec![Frame::SILENCE; 64];
        b.iter(|| {
            synth.note_on_midi(60, 0.8).unwrap();
            synth.process(&mut block);
            synth.note_off(60);
            synth.panic();
        });
    });

    group.bench_function("update_parameters", |b| {
        let mut synth = create_synth(44100.0, 4);
        b.iter(|| synth.update_parameters().unwrap());
    });

    group.finish();
}

fn bench_realtime_compliance(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/realtime");

    for sample_rate in SAMPLE_RATES {
        let sr_name = format!("{}kHz_8_voices", sample_rate as u32 / 1000);
        group.throughput(Throughput::Elements(256));
        group.bench_with_input(
            BenchmarkId::new("buffer_256", &sr_name),
            &sample_rate,
            |b, &sr| {
                let mut synth = create_synth(sr, 8);
                let mut block = vec![Frame::SILENCE; 256];
                b.iter(|| {
                    synth.process(black_box(&mut block));
                    block[255]
                });
            },
        );
    }

    group.finish();
}

criterion_group!(nodes, bench_oscillator, bench_biquad, bench_convolution);
criterion_group!(
    engine,
    bench_buffer_processing,
    bench_polyphony_scaling,
    bench_voice_allocation,
    bench_realtime_compliance
);
criterion_main!(nodes, engine);
