//! Audio decoding
//!
//! [`Decoder`] is the seam between the playback core and codec libraries: it
//! yields successive PCM chunks with the stream time they end at. The core
//! never looks inside a codec.
//!
//! [`SymphoniaDecoder`] is the bundled implementation, decoding MP3, FLAC,
//! AAC/MP4, Vorbis and WAV via symphonia and converting every sample format
//! to interleaved i16.

use crate::audio::types::{samples_to_bytes, DecodedChunk, FormatInfo};
use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder as CodecDecoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, warn};

/// Source of timestamped PCM for one stream.
///
/// A decoder is owned by exactly one stream and used from that stream's
/// decode worker thread only.
pub trait Decoder: Send {
    /// Open a media file. `prescan` asks for an exact duration even when the
    /// container does not declare one (may read the whole file).
    fn open(&mut self, path: &Path, prescan: bool) -> Result<()>;

    /// Decode the next chunk. `Ok(None)` marks the end of the stream.
    fn decode(&mut self) -> Result<Option<DecodedChunk>>;

    /// Reposition so that the next chunk starts at `seconds`.
    fn set_position(&mut self, seconds: f32) -> Result<()>;

    /// Total duration in seconds (0 if unknown)
    fn length(&self) -> f32;

    /// PCM layout of the chunks this decoder yields
    fn format_info(&self) -> FormatInfo;
}

/// Open file state of a [`SymphoniaDecoder`]
struct OpenMedia {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn CodecDecoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    info: FormatInfo,
    length: f32,
    /// After an accurate seek: timestamp before which decoded frames are dropped
    skip_until_ts: Option<u64>,
    sample_buf: Option<SampleBuffer<i16>>,
}

/// Symphonia-backed decoder
#[derive(Default)]
pub struct SymphoniaDecoder {
    media: Option<OpenMedia>,
}

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn media(&mut self) -> Result<&mut OpenMedia> {
        self.media
            .as_mut()
            .ok_or_else(|| Error::Decode("Decoder used before open".to_string()))
    }
}

impl OpenMedia {
    fn ts_to_secs(&self, ts: u64) -> f64 {
        match self.time_base {
            Some(tb) => {
                let time = tb.calc_time(ts);
                time.seconds as f64 + time.frac
            }
            None => ts as f64 / self.info.sample_rate as f64,
        }
    }

    /// Number of sample frames spanned by `ts` time-base units
    fn ts_to_frames(&self, ts: u64) -> usize {
        (self.ts_to_secs(ts) * self.info.sample_rate as f64).round() as usize
    }

    /// Read all packets to find the end timestamp, then rewind.
    fn prescan_length(&mut self) -> Result<f32> {
        let mut end_ts = 0u64;
        loop {
            match self.format.next_packet() {
                Ok(packet) => {
                    if packet.track_id() == self.track_id {
                        end_ts = end_ts.max(packet.ts() + packet.dur());
                    }
                }
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    return Err(Error::Open(format!("Prescan failed: {}", e)));
                }
            }
        }
        let length = self.ts_to_secs(end_ts) as f32;
        self.seek(0.0)?;
        Ok(length)
    }

    fn seek(&mut self, seconds: f32) -> Result<()> {
        let seconds = seconds.max(0.0) as f64;
        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::new(seconds.trunc() as u64, seconds.fract()),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| Error::Decode(format!("Seek to {:.3}s failed: {}", seconds, e)))?;

        self.decoder.reset();
        self.skip_until_ts = if seeked.actual_ts < seeked.required_ts {
            Some(seeked.required_ts)
        } else {
            None
        };
        Ok(())
    }
}

impl Decoder for SymphoniaDecoder {
    fn open(&mut self, path: &Path, prescan: bool) -> Result<()> {
        debug!("Opening {} (prescan={})", path.display(), prescan);

        let file = std::fs::File::open(path)
            .map_err(|e| Error::Open(format!("Failed to open file {}: {}", path.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(ext_str) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext_str);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Open(format!("Failed to probe format: {}", e)))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Open("No audio track found".to_string()))?;

        let codec_params = track.codec_params.clone();
        let track_id = track.id;

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| Error::Open("Sample rate not found".to_string()))?;
        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| Error::Open("Channel count not found".to_string()))?;
        let info = FormatInfo::new(sample_rate, channels);

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Open(format!("Failed to create decoder: {}", e)))?;

        let declared_length = codec_params
            .n_frames
            .map(|frames| frames as f32 / sample_rate as f32);

        let mut media = OpenMedia {
            format,
            decoder,
            track_id,
            time_base: codec_params.time_base,
            info,
            length: declared_length.unwrap_or(0.0),
            skip_until_ts: None,
            sample_buf: None,
        };

        if declared_length.is_none() && prescan {
            media.length = media.prescan_length()?;
        }

        debug!(
            "Audio format: sample_rate={}, channels={}, length={:.3}s",
            sample_rate, channels, media.length
        );

        self.media = Some(media);
        Ok(())
    }

    fn decode(&mut self) -> Result<Option<DecodedChunk>> {
        let media = self.media()?;

        loop {
            let packet = match media.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("Reached end of file");
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    // Track list changed mid-stream (chained streams); not supported
                    debug!("Decoder reset required, treating as end of stream");
                    return Ok(None);
                }
                Err(e) => {
                    return Err(Error::Decode(format!("Error reading packet: {}", e)));
                }
            };

            // Skip packets for other tracks
            if packet.track_id() != media.track_id {
                continue;
            }

            let packet_ts = packet.ts();
            let packet_end_ts = packet_ts + packet.dur();

            // Frames preceding an accurate seek target are decoded (codec state
            // depends on them) but not emitted
            let mut drop_packet = false;
            let mut skip_frames = 0;
            if let Some(required) = media.skip_until_ts {
                if packet_end_ts <= required {
                    drop_packet = true;
                } else {
                    if packet_ts < required {
                        skip_frames = media.ts_to_frames(required - packet_ts);
                    }
                    media.skip_until_ts = None;
                }
            }

            let decoded = match media.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt packet: drop it and keep going
                    warn!("Decode error: {}", e);
                    continue;
                }
                Err(e) => return Err(Error::Decode(e.to_string())),
            };

            if drop_packet || decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let frames = decoded.capacity() as u64;
            let needed_samples = decoded.capacity() * spec.channels.count();
            if media
                .sample_buf
                .as_ref()
                .map_or(true, |buf| buf.capacity() < needed_samples)
            {
                media.sample_buf = Some(SampleBuffer::<i16>::new(frames, spec));
            }
            let Some(sample_buf) = media.sample_buf.as_mut() else {
                continue;
            };
            sample_buf.copy_interleaved_ref(decoded);
            let samples = sample_buf.samples();

            let skip_samples = (skip_frames * spec.channels.count()).min(samples.len());
            let pcm = samples_to_bytes(&samples[skip_samples..]);
            let timecode = media.ts_to_secs(packet_end_ts) as f32;
            return Ok(Some(DecodedChunk::new(pcm, timecode)));
        }
    }

    fn set_position(&mut self, seconds: f32) -> Result<()> {
        self.media()?.seek(seconds)
    }

    fn length(&self) -> f32 {
        self.media.as_ref().map(|m| m.length).unwrap_or(0.0)
    }

    fn format_info(&self) -> FormatInfo {
        self.media
            .as_ref()
            .map(|m| m.info)
            .unwrap_or(FormatInfo::new(0, 0))
    }
}
