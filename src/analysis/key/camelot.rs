//! Camelot wheel notation
//!
//! Numbers 1-12 are wheel positions a fifth apart; 'A' is minor, 'B' major.

use crate::types::{KeyCandidate, Mode, PitchClass};

pub fn to_camelot(pitch: PitchClass, mode: Mode) -> &'static str {
    match (pitch, mode) {
        (PitchClass::Gs, Mode::Minor) => "1A",
        (PitchClass::Ds, Mode::Minor) => "2A",
        (PitchClass::As, Mode::Minor) => "3A",
        (PitchClass::F, Mode::Minor) => "4A",
        (PitchClass::C, Mode::Minor) => "5A",
        (PitchClass::G, Mode::Minor) => "6A",
        (PitchClass::D, Mode::Minor) => "7A",
        (PitchClass::A, Mode::Minor) => "8A",
        (PitchClass::E, Mode::Minor) => "9A",
        (PitchClass::B, Mode::Minor) => "10A",
        (PitchClass::Fs, Mode::Minor) => "11A",
        (PitchClass::Cs, Mode::Minor) => "12A",

        (PitchClass::B, Mode::Major) => "1B",
        (PitchClass::Fs, Mode::Major) => "2B",
        (PitchClass::Cs, Mode::Major) => "3B",
        (PitchClass::Gs, Mode::Major) => "4B",
        (PitchClass::Ds, Mode::Major) => "5B",
        (PitchClass::As, Mode::Major) => "6B",
        (PitchClass::F, Mode::Major) => "7B",
        (PitchClass::C, Mode::Major) => "8B",
        (PitchClass::G, Mode::Major) => "9B",
        (PitchClass::D, Mode::Major) => "10B",
        (PitchClass::A, Mode::Major) => "11B",
        (PitchClass::E, Mode::Major) => "12B",
    }
}

/// "A minor", "F# major"
pub fn full_key_name(pitch: PitchClass, mode: Mode) -> String {
    let mode = match mode {
        Mode::Major => "major",
        Mode::Minor => "minor",
    };
    format!("{} {}", pitch.to_standard_notation(), mode)
}

pub fn key_candidate(pitch: PitchClass, mode: Mode, confidence: Option<f64>) -> KeyCandidate {
    KeyCandidate {
        camelot: to_camelot(pitch, mode).to_string(),
        full_name: full_key_name(pitch, mode),
        confidence,
    }
}

/// Normalise a user supplied Camelot code ("8a" -> "8A"); `None` if invalid
pub fn normalize_camelot(code: &str) -> Option<String> {
    let code = code.trim();
    let (split, last) = code.char_indices().last()?;
    let letter = last.to_ascii_uppercase();
    if letter != 'A' && letter != 'B' {
        return None;
    }
    let number: u8 = code[..split].parse().ok()?;
    (1..=12).contains(&number).then(|| format!("{}{}", number, letter))
}

/// Key candidate for a Camelot code given on the command line
pub fn candidate_from_camelot(code: &str) -> Option<KeyCandidate> {
    let camelot = normalize_camelot(code)?;
    const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

    NAMES
        .iter()
        .filter_map(|n| PitchClass::parse(n))
        .flat_map(|p| [(p, Mode::Major), (p, Mode::Minor)])
        .find(|&(p, m)| to_camelot(p, m) == camelot)
        .map(|(p, m)| key_candidate(p, m, None))
}
