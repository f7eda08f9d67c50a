//! Sequence pattern blocks.
//!
//! A stored sequence is addressed by slot (0 to 7) and byte offset; each
//! message moves a block of at most 32 steps, zero padded on the wire.

use serde::{Serialize, Serializer};
use snafu::ensure;
use std::fmt;
use std::str::FromStr;

use crate::notes::{MidiNote, NoteError, NOTE_BASE, NOTE_SPAN, NOTE_TOP, REST_NOTE};
use crate::sysex::{malformed, MalformedMessage, SysexError, MAX_SEQ_INDEX, MAX_SEQ_LEN};

/// One sequencer step: a playable note or a rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Rest,
    Note(MidiNote),
}

impl Step {
    fn to_wire(self) -> Result<u8, SysexError> {
        match self {
            Step::Rest => Ok(REST_NOTE),
            Step::Note(n) if n.note < NOTE_SPAN => Ok(NOTE_BASE + n.note),
            Step::Note(n) => malformed(format!("note {} above sequencer span", n.note)),
        }
    }

    fn from_wire(byte: u8, step: usize) -> Result<Step, SysexError> {
        match byte {
            REST_NOTE => Ok(Step::Rest),
            NOTE_BASE..=NOTE_TOP => Ok(Step::Note(MidiNote {
                note: byte - NOTE_BASE,
            })),
            _ => malformed(format!("invalid note byte {:02x} at step {}", byte, step)),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Rest => f.write_str("_"),
            Step::Note(n) => n.fmt(f),
        }
    }
}

impl FromStr for Step {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, NoteError> {
        if s == "_" {
            Ok(Step::Rest)
        } else {
            Ok(Step::Note(MidiNote::from_str(s)?))
        }
    }
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One block of a stored sequence. Decoded patterns are owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequencePattern {
    /// Sequence slot on the device, 0 to 7.
    pub index: u8,
    /// Byte offset of this block within the stored sequence.
    pub offset: u8,
    /// Up to 32 steps. Shorter blocks are zero padded on the wire.
    pub steps: Vec<Step>,
}

pub(super) fn encode_pattern(pattern: &SequencePattern, raw: &mut Vec<u8>) -> Result<(), SysexError> {
    ensure!(
        pattern.index <= MAX_SEQ_INDEX,
        MalformedMessage {
            detail: format!("sequence index {} over {}", pattern.index, MAX_SEQ_INDEX),
        }
    );
    ensure!(
        pattern.steps.len() <= MAX_SEQ_LEN,
        MalformedMessage {
            detail: format!(
                "sequence length {:#04x} over {:#04x}",
                pattern.steps.len(),
                MAX_SEQ_LEN
            ),
        }
    );
    raw.push(pattern.index);
    raw.push(pattern.offset);
    raw.push(pattern.steps.len() as u8);
    for step in &pattern.steps {
        raw.push(step.to_wire()?);
    }
    for _padding in pattern.steps.len()..MAX_SEQ_LEN {
        raw.push(0x00);
    }
    Ok(())
}

/// Decode `SEQ_ID SEQ_OFFSET SEQ_LEN NOTES[32]`. Padding past `SEQ_LEN` is
/// not interpreted.
pub(super) fn decode_pattern(raw: &[u8]) -> Result<SequencePattern, SysexError> {
    if raw.len() < 3 + MAX_SEQ_LEN {
        return malformed(format!("short sequence block: {} bytes", raw.len()));
    }
    let index = raw[0];
    if index > MAX_SEQ_INDEX {
        return malformed(format!("sequence index {} over {}", index, MAX_SEQ_INDEX));
    }
    let offset = raw[1];
    let len = raw[2] as usize;
    if len > MAX_SEQ_LEN {
        return malformed(format!(
            "sequence length {:#04x} over {:#04x}",
            len, MAX_SEQ_LEN
        ));
    }
    let mut steps = Vec::with_capacity(len);
    for (step, byte) in raw[3..3 + len].iter().enumerate() {
        steps.push(Step::from_wire(*byte, step)?);
    }
    Ok(SequencePattern {
        index,
        offset,
        steps,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sysex::{decode, encode, SysexMessage};

    fn pattern(index: u8, steps: &[Step]) -> SequencePattern {
        SequencePattern {
            index,
            offset: 0,
            steps: steps.to_vec(),
        }
    }

    fn note(n: u8) -> Step {
        Step::Note(MidiNote { note: n })
    }

    #[test]
    fn update_round_trip() {
        let msg = SysexMessage::SequenceUpdate {
            msg_id: 0x0c,
            pattern: pattern(2, &[note(0), Step::Rest, note(12), note(63)]),
        };
        let raw = encode(&msg).unwrap();
        // header + id/offset/len + full 32 byte note block
        assert_eq!(raw.len(), 4 + 3 + 32);
        assert_eq!(decode(&raw).unwrap(), msg);
    }

    #[test]
    fn update_wire_layout() {
        let msg = SysexMessage::SequenceUpdate {
            msg_id: 0x00,
            pattern: pattern(0, &[note(0), Step::Rest]),
        };
        let raw = encode(&msg).unwrap();
        assert_eq!(&raw[..7], &[0x01, 0x00, 0x23, 0x3a, 0x00, 0x00, 0x02]);
        assert_eq!(raw[7], 0x30); // C0
        assert_eq!(raw[8], 0x7f); // rest
        assert!(raw[9..].iter().all(|b| *b == 0x00));
    }

    #[test]
    fn full_block_has_no_padding() {
        let steps: Vec<Step> = (0..32).map(|n| note(n as u8)).collect();
        let msg = SysexMessage::SequenceUpdate {
            msg_id: 0x01,
            pattern: pattern(7, &steps),
        };
        let raw = encode(&msg).unwrap();
        assert_eq!(raw[6], 0x20);
        assert_eq!(raw.len(), 4 + 3 + 32);
        assert_eq!(decode(&raw).unwrap(), msg);
    }

    #[test]
    fn thirty_three_steps_rejected_at_encode() {
        let steps: Vec<Step> = (0..33).map(|_| Step::Rest).collect();
        let msg = SysexMessage::SequenceUpdate {
            msg_id: 0x01,
            pattern: pattern(0, &steps),
        };
        assert!(matches!(
            encode(&msg),
            Err(SysexError::MalformedMessage { .. })
        ));
    }

    #[test]
    fn reply_round_trip() {
        let msg = SysexMessage::SequenceQueryReply {
            msg_id: 0x22,
            pattern: SequencePattern {
                index: 3,
                offset: 0x20,
                steps: vec![note(7), note(19)],
            },
        };
        let raw = encode(&msg).unwrap();
        assert_eq!(&raw[..3], &[0x01, 0x22, 0x23]);
        assert_eq!(decode(&raw).unwrap(), msg);
    }

    #[test]
    fn note_byte_mapping() {
        assert_eq!(Step::from_wire(0x30, 0).unwrap(), note(0));
        assert_eq!(Step::from_wire(0x7f, 5).unwrap(), Step::Rest);
        assert_eq!(Step::from_wire(0x6f, 0).unwrap(), note(63));
    }

    #[test]
    fn stray_note_byte_is_malformed() {
        // 0x00 padding inside the declared length is invalid
        assert!(matches!(
            Step::from_wire(0x00, 3),
            Err(SysexError::MalformedMessage { .. })
        ));
        assert!(matches!(
            Step::from_wire(0x70, 0),
            Err(SysexError::MalformedMessage { .. })
        ));
        assert!(matches!(
            Step::from_wire(0x2f, 0),
            Err(SysexError::MalformedMessage { .. })
        ));
    }

    #[test]
    fn oversized_wire_length_is_malformed() {
        let mut raw = vec![0x01, 0x00, 0x23, 0x3a, 0x00, 0x00, 0x21];
        raw.extend_from_slice(&[0x7f; 32]);
        assert!(matches!(
            decode(&raw),
            Err(SysexError::MalformedMessage { .. })
        ));
    }

    #[test]
    fn step_text_round_trip() {
        for step in &[Step::Rest, note(0), note(33)] {
            assert_eq!(Step::from_str(&step.to_string()).unwrap(), *step);
        }
    }
}
