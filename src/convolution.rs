//! Partitioned FFT Convolution
//!
//! Uniformly partitioned overlap-save convolution. The impulse response is
//! split into blocks of [`PartitionedConvolver::BLOCK_SIZE`] samples, each
//! transformed once; incoming audio is gathered into blocks and multiplied
//! against every partition through a frequency-domain delay line. Cost per
//! sample is independent of impulse length beyond one complex multiply-add
//! per partition per bin.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Single-channel streaming convolver with one block of latency
pub struct PartitionedConvolver {
    partitions: Vec<Vec<Complex<f64>>>,
    delay_line: Vec<Vec<Complex<f64>>>,
    delay_pos: usize,
    window: Vec<f64>,
    input_block: Vec<f64>,
    output_block: Vec<f64>,
    pos: usize,
    accum: Vec<Complex<f64>>,
    fft: Arc<dyn Fft<f64>>,
    ifft: Arc<dyn Fft<f64>>,
    impulse_len: usize,
}

impl PartitionedConvolver {
    pub const BLOCK_SIZE: usize = 128;
    const FFT_SIZE: usize = Self::BLOCK_SIZE * 2;

    pub fn new(impulse: &[f64]) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(Self::FFT_SIZE);
        let ifft = planner.plan_fft_inverse(Self::FFT_SIZE);

        let count = impulse.len().div_ceil(Self::BLOCK_SIZE).max(1);
        let partitions: Vec<Vec<Complex<f64>>> = (0..count)
            .map(|p| {
                let mut bins = vec![Complex::new(0.0, 0.0); Self::FFT_SIZE];
                let start = p * Self::BLOCK_SIZE;
                let end = (start + Self::BLOCK_SIZE).min(impulse.len());
                for (bin, &h) in bins.iter_mut().zip(impulse[start.min(end)..end].iter()) {
                    bin.re = h;
                }
                fft.process(&mut bins);
                bins
            })
            .collect();

        Self {
            delay_line: vec![vec![Complex::new(0.0, 0.0); Self::FFT_SIZE]; count],
            partitions,
            delay_pos: 0,
            window: vec![0.0; Self::FFT_SIZE],
            input_block: vec![0.0; Self::BLOCK_SIZE],
            output_block: vec![0.0; Self::BLOCK_SIZE],
            pos: 0,
            accum: vec![Complex::new(0.0, 0.0); Self::FFT_SIZE],
            fft,
            ifft,
            impulse_len: impulse.len(),
        }
    }

    /// Length of the impulse response in samples
    pub fn impulse_len(&self) -> usize {
        self.impulse_len
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Push one input sample and pop one output sample
    pub fn process(&mut self, input: f64) -> f64 {
        self.input_block[self.pos] = input;
        let out = self.output_block[self.pos];
        self.pos += 1;
        if self.pos == Self::BLOCK_SIZE {
            self.process_block();
            self.pos = 0;
        }
        out
    }

    fn process_block(&mut self) {
        let b = Self::BLOCK_SIZE;
        let count = self.partitions.len();

        // Slide the overlap-save window by one block
        self.window.copy_within(b.., 0);
        self.window[b..].copy_from_slice(&self.input_block);

        self.delay_pos = (self.delay_pos + count - 1) % count;
        let spectrum = &mut self.delay_line[self.delay_pos];
        for (bin, &x) in spectrum.iter_mut().zip(self.window.iter()) {
            *bin = Complex::new(x, 0.0);
        }
        self.fft.process(spectrum);

        self.accum.iter_mut().for_each(|c| *c = Complex::new(0.0, 0.0));
        for (p, partition) in self.partitions.iter().enumerate() {
            let delayed = &self.delay_line[(self.delay_pos + p) % count];
            for ((acc, x), h) in self.accum.iter_mut().zip(delayed).zip(partition) {
                *acc += x * h;
            }
        }
        self.ifft.process(&mut self.accum);

        let scale = 1.0 / Self::FFT_SIZE as f64;
        for (out, y) in self.output_block.iter_mut().zip(&self.accum[b..]) {
            *out = y.re * scale;
        }
    }

    pub fn reset(&mut self) {
        for spectrum in &mut self.delay_line {
            spectrum.iter_mut().for_each(|c| *c = Complex::new(0.0, 0.0));
        }
        self.window.iter_mut().for_each(|s| *s = 0.0);
        self.input_block.iter_mut().for_each(|s| *s = 0.0);
        self.output_block.iter_mut().for_each(|s| *s = 0.0);
        self.pos = 0;
        self.delay_pos = 0;
    }
}
