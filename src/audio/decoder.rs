//! Audio decoding using symphonia
//!
//! Decodes any supported container to mono f32 samples at the analysis rate.
//! Resampling goes through rubato with a linear fallback.

use crate::error::{Result, StemgridError};
use crate::types::AudioBuffer;
use rubato::{FftFixedInOut, Resampler};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Sample rate every analysis stage runs at
pub const ANALYSIS_SAMPLE_RATE: u32 = 22050;

/// Maximum file size we'll attempt to decode (2GB)
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Interleaved samples straight from the container
struct DecodedStream {
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
}

/// Decode an audio file to a mono AudioBuffer at [`ANALYSIS_SAMPLE_RATE`]
pub fn decode(path: &Path) -> Result<AudioBuffer> {
    let stream = read_stream(path)?;
    let mono = to_mono(&stream.samples, stream.channels);

    let samples = if stream.sample_rate != ANALYSIS_SAMPLE_RATE {
        resample(&mono, stream.sample_rate, ANALYSIS_SAMPLE_RATE)
    } else {
        mono
    };

    debug!(
        "Decoded {} samples ({:.2}s) from {}",
        samples.len(),
        samples.len() as f64 / ANALYSIS_SAMPLE_RATE as f64,
        path.display()
    );

    Ok(AudioBuffer::new(samples, ANALYSIS_SAMPLE_RATE))
}

fn decode_error(path: &Path, reason: String) -> StemgridError {
    StemgridError::DecodeError {
        path: path.to_path_buf(),
        reason,
    }
}

fn read_stream(path: &Path) -> Result<DecodedStream> {
    if !path.exists() {
        return Err(StemgridError::FileNotFound(path.to_path_buf()));
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| decode_error(path, format!("Failed to read file metadata: {}", e)))?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(decode_error(
            path,
            format!(
                "File too large ({:.1} GB). Maximum supported size is 2 GB.",
                metadata.len() as f64 / (1024.0 * 1024.0 * 1024.0)
            ),
        ));
    }

    let file = std::fs::File::open(path)
        .map_err(|e| decode_error(path, format!("Failed to open file: {}", e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| decode_error(path, format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| decode_error(path, "No audio tracks found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params.sample_rate.unwrap_or(44100);
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);

    debug!(
        "Decoding: {} @ {}Hz, {} channels",
        path.display(),
        sample_rate,
        channels
    );

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(path, format!("Failed to create decoder: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(decode_error(path, format!("Failed to read packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                trace!("Skipping corrupted frame: {}", e);
                continue;
            }
            Err(e) => return Err(decode_error(path, format!("Decode error: {}", e))),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count().max(1);

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    Ok(DecodedStream {
        samples,
        channels,
        sample_rate,
    })
}

/// Convert interleaved multi-channel audio to mono
fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample a mono signal with rubato's FFT resampler
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    const CHUNK_SIZE: usize = 1024;

    let mut resampler = match FftFixedInOut::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        CHUNK_SIZE,
        1,
    ) {
        Ok(r) => r,
        Err(e) => {
            debug!("Rubato initialization failed ({}), using fallback", e);
            return resample_linear_fallback(samples, from_rate, to_rate);
        }
    };

    let input_frames_per_chunk = resampler.input_frames_next();
    let output_frames_per_chunk = resampler.output_frames_next();

    let ratio = to_rate as f64 / from_rate as f64;
    let mut output = Vec::with_capacity((samples.len() as f64 * ratio).ceil() as usize);

    let mut pos = 0;
    while pos < samples.len() {
        let end = (pos + input_frames_per_chunk).min(samples.len());
        let mut chunk = samples[pos..end].to_vec();

        // Pad the last chunk
        if chunk.len() < input_frames_per_chunk {
            chunk.resize(input_frames_per_chunk, 0.0);
        }

        match resampler.process(&[chunk], None) {
            Ok(resampled) => {
                if let Some(channel) = resampled.first() {
                    let valid = if pos + input_frames_per_chunk > samples.len() {
                        let input_valid = samples.len() - pos;
                        ((input_valid as f64 * ratio).ceil() as usize).min(output_frames_per_chunk)
                    } else {
                        output_frames_per_chunk
                    };
                    output.extend_from_slice(&channel[..valid.min(channel.len())]);
                }
            }
            Err(e) => {
                debug!("Rubato processing error ({}), using fallback for remaining", e);
                output.extend(resample_linear_fallback(&samples[pos..], from_rate, to_rate));
                break;
            }
        }

        pos += input_frames_per_chunk;
    }

    output
}

/// Linear interpolation, used only when rubato refuses the rate pair
fn resample_linear_fallback(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio) as usize;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 * ratio;
            let src_idx = src_pos as usize;
            let frac = (src_pos - src_idx as f64) as f32;
            if src_idx + 1 < samples.len() {
                samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
            } else {
                samples[src_idx.min(samples.len() - 1)]
            }
        })
        .collect()
}
