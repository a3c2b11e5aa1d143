//! Output file naming
//!
//! `<key>_<bpm>BPM_<base>[-<stem>][-drums-<part>].<ext>`, with segment files
//! prefixed `B<start bar>_`. BPM always has two decimals. The key prefix is
//! left out when no key is known.

use crate::types::{DrumPart, StemKind};

pub fn format_bpm(bpm: f64) -> String {
    format!("{:.2}BPM", bpm)
}

/// `8A_128.00BPM` or `128.00BPM`
pub fn tag_prefix(key: Option<&str>, bpm: f64) -> String {
    match key {
        Some(key) if !key.is_empty() => format!("{}_{}", key, format_bpm(bpm)),
        _ => format_bpm(bpm),
    }
}

pub fn track_file_name(key: Option<&str>, bpm: f64, base: &str, ext: &str) -> String {
    if ext.is_empty() {
        return format!("{}_{}", tag_prefix(key, bpm), base);
    }
    format!("{}_{}.{}", tag_prefix(key, bpm), base, ext)
}

pub fn stem_file_name(key: Option<&str>, bpm: f64, base: &str, stem: StemKind, ext: &str) -> String {
    format!("{}_{}-{}.{}", tag_prefix(key, bpm), base, stem.name(), ext)
}

pub fn drum_part_file_name(
    key: Option<&str>,
    bpm: f64,
    base: &str,
    part: DrumPart,
    ext: &str,
) -> String {
    format!("{}_{}-drums-{}.{}", tag_prefix(key, bpm), base, part.name(), ext)
}

pub fn segment_file_name(start_bar: usize, file_name: &str) -> String {
    format!("B{}_{}", start_bar, file_name)
}

/// First `<digits>[.<digits>]BPM` in a file name
pub fn parse_bpm(file_name: &str) -> Option<f64> {
    let bytes = file_name.as_bytes();
    let mut search_from = 0;

    while let Some(pos) = file_name[search_from..].find("BPM") {
        let end = search_from + pos;
        let mut start = end;
        while start > 0 && (bytes[start - 1].is_ascii_digit() || bytes[start - 1] == b'.') {
            start -= 1;
        }

        // Leftmost suffix of the run that reads as digits, optional dot, digits
        let run = &file_name[start..end];
        let number = (0..run.len()).map(|i| &run[i..]).find(|candidate| {
            candidate.as_bytes().first().is_some_and(u8::is_ascii_digit)
                && candidate.matches('.').count() <= 1
        });

        if let Some(bpm) = number.and_then(|n| n.parse::<f64>().ok()) {
            if bpm.is_finite() && bpm > 0.0 {
                return Some(bpm);
            }
        }
        search_from = end + 3;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_name() {
        assert_eq!(
            track_file_name(Some("8A"), 128.0, "Song", "mp3"),
            "8A_128.00BPM_Song.mp3"
        );
        assert_eq!(track_file_name(None, 93.456, "Song", "wav"), "93.46BPM_Song.wav");
        assert_eq!(track_file_name(Some("1B"), 70.0, "Song", ""), "1B_70.00BPM_Song");
    }

    #[test]
    fn test_stem_and_drum_names() {
        assert_eq!(
            stem_file_name(Some("11B"), 120.5, "Track", StemKind::Vocals, "wav"),
            "11B_120.50BPM_Track-vocals.wav"
        );
        assert_eq!(
            drum_part_file_name(Some("2A"), 174.0, "Track", DrumPart::Kick, "wav"),
            "2A_174.00BPM_Track-drums-kick.wav"
        );
    }

    #[test]
    fn test_segment_name() {
        assert_eq!(
            segment_file_name(9, "8A_128.00BPM_Song-bass.wav"),
            "B9_8A_128.00BPM_Song-bass.wav"
        );
    }

    #[test]
    fn test_parse_bpm() {
        assert_eq!(parse_bpm("8A_128.00BPM_Song-bass.wav"), Some(128.0));
        assert_eq!(parse_bpm("99BPM_loop.wav"), Some(99.0));
        assert_eq!(parse_bpm("B9_5A_87.5BPM_x.wav"), Some(87.5));
        assert_eq!(parse_bpm("1.2.3BPM.wav"), Some(2.3));
        assert_eq!(parse_bpm("BPM_only_120BPM.wav"), Some(120.0));
        assert_eq!(parse_bpm("no_tempo.wav"), None);
        assert_eq!(parse_bpm("0BPM.wav"), None);
    }
}
