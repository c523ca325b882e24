//! Core audio data types
//!
//! PCM exchanged between decoder, ring buffer and sink is interleaved signed
//! 16-bit little-endian: one frame is `2 * channels` bytes.

/// Bytes per sample of the interleaved PCM format
pub const BYTES_PER_SAMPLE: usize = 2;

/// Sample layout reported by a decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    /// Samples per second per channel
    pub sample_rate: u32,

    /// Interleaved channel count
    pub channels: u16,
}

impl FormatInfo {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Size of one interleaved frame in bytes
    pub fn bytes_per_frame(&self) -> usize {
        BYTES_PER_SAMPLE * self.channels as usize
    }

    pub fn bytes_per_second(&self) -> f32 {
        (self.sample_rate as usize * self.bytes_per_frame()) as f32
    }

    /// Duration in seconds of `bytes` of PCM in this format
    pub fn bytes_to_secs(&self, bytes: usize) -> f32 {
        let bps = self.bytes_per_second();
        if bps > 0.0 {
            bytes as f32 / bps
        } else {
            0.0
        }
    }

    /// Round a byte count down to a whole number of frames
    pub fn align_to_frame(&self, bytes: usize) -> usize {
        let frame = self.bytes_per_frame().max(1);
        bytes - bytes % frame
    }

    /// A format the playback core can run with
    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0
    }
}

/// One block of decoded PCM
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedChunk {
    /// Interleaved i16 little-endian samples
    pub pcm: Vec<u8>,

    /// Stream time in seconds at the end of this chunk
    pub timecode: f32,
}

impl DecodedChunk {
    pub fn new(pcm: Vec<u8>, timecode: f32) -> Self {
        Self { pcm, timecode }
    }
}

/// Scale interleaved i16 little-endian samples in place.
///
/// Works regardless of channel count since every sample is two bytes. A
/// trailing odd byte is left untouched.
pub fn apply_gain(pcm: &mut [u8], gain: f32) {
    if gain >= 1.0 {
        return;
    }
    for sample in pcm.chunks_exact_mut(BYTES_PER_SAMPLE) {
        let value = i16::from_le_bytes([sample[0], sample[1]]);
        let scaled = (value as f32 * gain) as i16;
        sample.copy_from_slice(&scaled.to_le_bytes());
    }
}

/// Encode i16 samples as little-endian bytes
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sizes() {
        let format = FormatInfo::new(44100, 2);
        assert_eq!(format.bytes_per_frame(), 4);
        assert_eq!(format.bytes_per_second(), 176_400.0);
        assert_eq!(format.bytes_to_secs(176_400), 1.0);
        assert_eq!(format.align_to_frame(10), 8);
        assert!(format.is_valid());
        assert!(!FormatInfo::new(0, 2).is_valid());
    }

    #[test]
    fn test_apply_gain_scales_samples() {
        let mut pcm = samples_to_bytes(&[1000, -1000, 32767, -32768]);
        apply_gain(&mut pcm, 0.5);

        let scaled: Vec<i16> = pcm
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(scaled, vec![500, -500, 16383, -16384]);
    }

    #[test]
    fn test_apply_gain_unity_is_identity() {
        let original = samples_to_bytes(&[123, -456]);
        let mut pcm = original.clone();
        apply_gain(&mut pcm, 1.0);
        assert_eq!(pcm, original);
    }

    #[test]
    fn test_apply_gain_zero_is_silence() {
        let mut pcm = samples_to_bytes(&[123, -456, 789]);
        apply_gain(&mut pcm, 0.0);
        assert!(pcm.iter().all(|&b| b == 0));
    }
}
