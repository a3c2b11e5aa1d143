//! Writing segments to disk

use super::grid::{BarSegmenter, Segment};
use crate::audio::wav::{write_float_wav, write_int_wav, StemAudio};
use crate::error::{Result, StemgridError};
use crate::naming::segment_file_name;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Write every segment of `audio` as `B<start bar>_<file_name>` in `out_dir`
pub fn write_segments(
    audio: &StemAudio,
    segmenter: &BarSegmenter,
    out_dir: &Path,
    file_name: &str,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir).map_err(|e| StemgridError::output_error(out_dir, e))?;

    let written = match audio {
        StemAudio::Int(w) => write_all(&segmenter.segments(w)?, out_dir, file_name, write_int_wav)?,
        StemAudio::Float(w) => {
            write_all(&segmenter.segments(w)?, out_dir, file_name, write_float_wav)?
        }
    };

    debug!("Wrote {} segments for {}", written.len(), file_name);
    Ok(written)
}

fn write_all<T: Copy>(
    segments: &[Segment<T>],
    out_dir: &Path,
    file_name: &str,
    write: fn(&Path, &crate::types::Waveform<T>) -> Result<()>,
) -> Result<Vec<PathBuf>> {
    segments
        .iter()
        .map(|segment| {
            let path = out_dir.join(segment_file_name(segment.bounds.start_bar, file_name));
            trace!(
                "Segment {} [{}, {}) -> {}",
                segment.bounds.index,
                segment.bounds.start_sample,
                segment.bounds.end_sample,
                path.display()
            );
            write(&path, &segment.waveform)?;
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::read_wav;
    use crate::types::{FormatInfo, SampleKind, Waveform};
    use tempfile::TempDir;

    #[test]
    fn test_segments_written_with_source_format() {
        let dir = TempDir::new().unwrap();
        let format = FormatInfo {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 24,
            sample_kind: SampleKind::Int,
        };
        // 120 BPM at 8 kHz: 16000 samples per bar
        let left: Vec<i32> = (0..40_000).map(|i| (i % 4000) * 100).collect();
        let right: Vec<i32> = left.iter().map(|v| -v).collect();
        let audio = StemAudio::Int(Waveform::new(vec![left, right], 8000).with_format(format));

        let segmenter = BarSegmenter::new(120.0, 1).unwrap();
        let written = write_segments(&audio, &segmenter, dir.path(), "120.00BPM_x-bass.wav").unwrap();

        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["B1_120.00BPM_x-bass.wav", "B2_120.00BPM_x-bass.wav"]);

        let back = read_wav(&written[1]).unwrap();
        assert_eq!(back.format(), Some(format));
        assert_eq!(back.len(), 16_000);
        match back {
            StemAudio::Int(w) => assert_eq!(w.channels[0][0], 0),
            other => panic!("unexpected {:?}", other.format()),
        }
    }

    #[test]
    fn test_short_file_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let audio = StemAudio::Float(Waveform::new(vec![vec![0.0f32; 100]], 8000));
        let segmenter = BarSegmenter::new(120.0, 8).unwrap();
        assert!(write_segments(&audio, &segmenter, dir.path(), "a.wav").unwrap().is_empty());
    }
}
