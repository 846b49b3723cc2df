//! Conversion of captured frames into recognizer input.

/// Sample rate whisper models expect.
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Down-mix interleaved samples to mono by averaging channels.
pub fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
        .collect()
}

/// Linear interpolation resampling over a stream of buffers.
///
/// The read position and the last input sample carry over from one call to
/// the next, so splitting the input into frames yields the same output as
/// resampling it in one piece.
#[derive(Debug, Clone)]
pub struct StreamResampler {
    to_rate: u32,
    from_rate: u32,
    /// Source index of the next output sample, relative to the start of the
    /// next buffer. Never below -1, where it falls between `last` and the
    /// first sample of the next buffer.
    position: f64,
    last: Option<f32>,
}

impl StreamResampler {
    pub fn new(to_rate: u32) -> Self {
        Self {
            to_rate,
            from_rate: to_rate,
            position: 0.0,
            last: None,
        }
    }

    /// Resample one buffer captured at `from_rate`. A change of input rate
    /// starts the stream over.
    pub fn process(&mut self, samples: &[f32], from_rate: u32) -> Vec<f32> {
        if from_rate != self.from_rate {
            self.from_rate = from_rate;
            self.position = 0.0;
            self.last = None;
        }
        if from_rate == self.to_rate || from_rate == 0 || self.to_rate == 0 {
            return samples.to_vec();
        }
        let Some(&first) = samples.first() else {
            return Vec::new();
        };

        let ratio = from_rate as f64 / self.to_rate as f64;
        let len = samples.len() as f64;
        let mut result = Vec::with_capacity((len / ratio) as usize + 1);

        while self.position < len - 1.0 {
            let (s0, s1, frac) = if self.position < 0.0 {
                let frac = (self.position + 1.0).clamp(0.0, 1.0);
                (self.last.unwrap_or(first), first, frac)
            } else {
                let floor = self.position.floor();
                let i = floor as usize;
                (samples[i], samples[i + 1], self.position - floor)
            };
            result.push((s0 as f64 * (1.0 - frac) + s1 as f64 * frac) as f32);
            self.position += ratio;
        }

        self.position -= len;
        self.last = samples.last().copied();
        result
    }
}
