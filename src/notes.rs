//! Note naming for the MicroBrute sequencer.
//!
//! The sequencer spans 64 semitones starting at C0, which the device encodes
//! on the wire as `0x30` upward. Rests are `0x7f`.

use lazy_static::lazy_static;
use serde::{Serialize, Serializer};
use snafu::Snafu;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Wire byte for C0, the lowest sequencer note.
pub const NOTE_BASE: u8 = 0x30;

/// Highest note byte the sequencer emits.
pub const NOTE_TOP: u8 = 0x6f;

/// Wire byte for an empty sequencer step.
pub const REST_NOTE: u8 = 0x7f;

/// Number of semitones the sequencer can address.
pub const NOTE_SPAN: u8 = NOTE_TOP - NOTE_BASE + 1;

#[derive(Debug, Snafu, PartialEq)]
pub enum NoteError {
    #[snafu(display("unknown note '{}'", name))]
    UnknownNote { name: String },

    #[snafu(display("note {} outside sequencer range", note))]
    NoteOutOfRange { note: usize },
}

static NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

lazy_static! {
    static ref PITCH_CLASSES: HashMap<&'static str, u8> = {
        let mut map = HashMap::new();
        for (pitch, name) in NOTE_NAMES.iter().enumerate() {
            map.insert(*name, pitch as u8);
        }
        // flat spellings of the black keys
        map.insert("Db", 1);
        map.insert("Eb", 3);
        map.insert("Gb", 6);
        map.insert("Ab", 8);
        map.insert("Bb", 10);
        map
    };
}

/// A note of the sequencer range, as semitones above C0 (0 to 63).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MidiNote {
    pub note: u8,
}

impl fmt::Display for MidiNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            NOTE_NAMES[(self.note % 12) as usize],
            self.note / 12
        )
    }
}

impl FromStr for MidiNote {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, NoteError> {
        let octave_at = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| NoteError::UnknownNote { name: s.to_string() })?;
        let (name, octave) = s.split_at(octave_at);
        let pitch = PITCH_CLASSES
            .get(name)
            .ok_or_else(|| NoteError::UnknownNote { name: s.to_string() })?;
        let octave = usize::from_str(octave).map_err(|_| NoteError::UnknownNote {
            name: s.to_string(),
        })?;
        let note = octave * 12 + *pitch as usize;
        if note >= NOTE_SPAN as usize {
            return NoteOutOfRange { note }.fail();
        }
        Ok(MidiNote { note: note as u8 })
    }
}

impl Serialize for MidiNote {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn note_names_round_trip() {
        for note in 0..NOTE_SPAN {
            let n = MidiNote { note };
            assert_eq!(MidiNote::from_str(&n.to_string()), Ok(n));
        }
    }

    #[test]
    fn c0_is_semitone_zero() {
        assert_eq!(MidiNote::from_str("C0"), Ok(MidiNote { note: 0 }));
        assert_eq!(MidiNote { note: 0 }.to_string(), "C0");
    }

    #[test]
    fn flats_alias_sharps() {
        assert_eq!(
            MidiNote::from_str("Eb2").unwrap(),
            MidiNote::from_str("D#2").unwrap()
        );
    }

    #[test]
    fn out_of_range_note_rejected() {
        assert_eq!(
            MidiNote::from_str("E5"),
            Err(NoteError::NoteOutOfRange { note: 64 })
        );
        assert!(MidiNote::from_str("D#5").is_ok());
    }

    #[test]
    fn garbage_rejected() {
        assert!(MidiNote::from_str("H3").is_err());
        assert!(MidiNote::from_str("C").is_err());
        assert!(MidiNote::from_str("").is_err());
    }
}
