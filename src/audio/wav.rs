//! WAV reading and writing with hound
//!
//! Stems are read in their stored sample format and written back with the
//! same channel count, rate, bit depth and encoding, so a segment is a
//! bit-exact copy of its span of the source file.

use crate::error::{Result, StemgridError};
use crate::types::{AudioBuffer, FormatInfo, SampleKind, Waveform};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use tracing::debug;

/// A stem file held in its on-disk sample encoding
#[derive(Debug, Clone, PartialEq)]
pub enum StemAudio {
    Int(Waveform<i32>),
    Float(Waveform<f32>),
}

impl StemAudio {
    pub fn sample_rate(&self) -> u32 {
        match self {
            StemAudio::Int(w) => w.sample_rate,
            StemAudio::Float(w) => w.sample_rate,
        }
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        match self {
            StemAudio::Int(w) => w.len(),
            StemAudio::Float(w) => w.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> Option<FormatInfo> {
        match self {
            StemAudio::Int(w) => w.format,
            StemAudio::Float(w) => w.format,
        }
    }
}

fn to_format_info(spec: WavSpec) -> FormatInfo {
    FormatInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        sample_kind: match spec.sample_format {
            SampleFormat::Int => SampleKind::Int,
            SampleFormat::Float => SampleKind::Float,
        },
    }
}

fn to_wav_spec(format: FormatInfo) -> WavSpec {
    WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample,
        sample_format: match format.sample_kind {
            SampleKind::Int => SampleFormat::Int,
            SampleKind::Float => SampleFormat::Float,
        },
    }
}

fn deinterleave<T: Copy>(interleaved: &[T], channels: usize) -> Vec<Vec<T>> {
    let frames = interleaved.len() / channels.max(1);
    let mut out: Vec<Vec<T>> = (0..channels).map(|_| Vec::with_capacity(frames)).collect();
    for frame in interleaved.chunks_exact(channels.max(1)) {
        for (c, &sample) in frame.iter().enumerate() {
            out[c].push(sample);
        }
    }
    out
}

/// Read a WAV file without converting its sample encoding
pub fn read_wav(path: &Path) -> Result<StemAudio> {
    if !path.exists() {
        return Err(StemgridError::FileNotFound(path.to_path_buf()));
    }

    let decode_err = |e: hound::Error| StemgridError::DecodeError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut reader = WavReader::open(path).map_err(decode_err)?;
    let spec = reader.spec();
    let format = to_format_info(spec);
    let channels = spec.channels as usize;

    debug!(
        "Reading WAV {}: {} ch, {} Hz, {} bit {:?}",
        path.display(),
        spec.channels,
        spec.sample_rate,
        spec.bits_per_sample,
        spec.sample_format
    );

    let audio = match spec.sample_format {
        SampleFormat::Int => {
            let interleaved = reader
                .samples::<i32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(decode_err)?;
            StemAudio::Int(
                Waveform::new(deinterleave(&interleaved, channels), spec.sample_rate)
                    .with_format(format),
            )
        }
        SampleFormat::Float => {
            let interleaved = reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(decode_err)?;
            StemAudio::Float(
                Waveform::new(deinterleave(&interleaved, channels), spec.sample_rate)
                    .with_format(format),
            )
        }
    };

    Ok(audio)
}

/// Write integer samples using the waveform's stored format (16-bit PCM if none)
pub fn write_int_wav(path: &Path, waveform: &Waveform<i32>) -> Result<()> {
    let format = waveform.format.unwrap_or(FormatInfo {
        channels: waveform.num_channels() as u16,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 16,
        sample_kind: SampleKind::Int,
    });
    let out_err = |e: hound::Error| StemgridError::OutputError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut writer = WavWriter::create(path, to_wav_spec(format)).map_err(out_err)?;
    for i in 0..waveform.len() {
        for channel in &waveform.channels {
            writer.write_sample(channel[i]).map_err(out_err)?;
        }
    }
    writer.finalize().map_err(out_err)
}

/// Write float samples using the waveform's stored format (32-bit float if none)
pub fn write_float_wav(path: &Path, waveform: &Waveform<f32>) -> Result<()> {
    let format = waveform.format.unwrap_or(FormatInfo {
        channels: waveform.num_channels() as u16,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 32,
        sample_kind: SampleKind::Float,
    });
    let out_err = |e: hound::Error| StemgridError::OutputError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut writer = WavWriter::create(path, to_wav_spec(format)).map_err(out_err)?;
    for i in 0..waveform.len() {
        for channel in &waveform.channels {
            writer.write_sample(channel[i]).map_err(out_err)?;
        }
    }
    writer.finalize().map_err(out_err)
}

pub fn write_wav(path: &Path, audio: &StemAudio) -> Result<()> {
    match audio {
        StemAudio::Int(w) => write_int_wav(path, w),
        StemAudio::Float(w) => write_float_wav(path, w),
    }
}

/// Write an analysis buffer as 16-bit mono PCM (input for external predictors)
pub fn write_mono_pcm16(path: &Path, buffer: &AudioBuffer) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let out_err = |e: hound::Error| StemgridError::OutputError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut writer = WavWriter::create(path, spec).map_err(out_err)?;
    for &s in &buffer.samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(v).map_err(out_err)?;
    }
    writer.finalize().map_err(out_err)
}
