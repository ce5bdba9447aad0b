//! Sample Buffers
//!
//! Multi-channel sample storage shared between the control side (which
//! generates noise tables and reverb impulses) and playback nodes. Buffers are
//! handed around as `Arc<AudioBuffer>` and replaced, never mutated, once a
//! node holds them.

/// A block of de-interleaved sample data
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: f64,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Create a silent buffer
    pub fn new(num_channels: usize, length: usize, sample_rate: f64) -> Self {
        Self {
            sample_rate,
            channels: vec![vec![0.0; length]; num_channels.max(1)],
        }
    }

    /// Wrap existing channel data. Channels shorter than the longest one are
    /// padded with silence.
    pub fn from_channels(mut channels: Vec<Vec<f32>>, sample_rate: f64) -> Self {
        if channels.is_empty() {
            channels.push(Vec::new());
        }
        let length = channels.iter().map(Vec::len).max().unwrap_or(0);
        for channel in &mut channels {
            channel.resize(length, 0.0);
        }
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Length in sample frames
    pub fn length(&self) -> usize {
        self.channels[0].len()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.length() as f64 / self.sample_rate
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    /// Channel to use for a stereo output side; mono buffers feed both sides
    pub fn channel_for_output(&self, side: usize) -> &[f32] {
        &self.channels[side.min(self.channels.len() - 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_silent() {
        let buffer = AudioBuffer::new(2, 100, 44100.0);
        assert_eq!(buffer.number_of_channels(), 2);
        assert_eq!(buffer.length(), 100);
        assert!(buffer.channel(1).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_from_channels_pads() {
        let buffer = AudioBuffer::from_channels(vec![vec![1.0; 4], vec![1.0; 2]], 48000.0);
        assert_eq!(buffer.length(), 4);
        assert_eq!(buffer.channel(1), &[1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_duration_and_output_channel() {
        let buffer = AudioBuffer::new(1, 44100, 44100.0);
        assert!((buffer.duration() - 1.0).abs() < 1e-12);
        assert_eq!(buffer.channel_for_output(1).len(), 44100);
    }
}
