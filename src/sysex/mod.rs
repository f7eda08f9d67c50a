//! Codec for the MicroBrute / BeatStep SysEx message family.
//!
//! Payloads here are the vendor body of a SysEx frame; the `f0 00 20 6b ... f7`
//! transport framing is stripped before decode and added after encode by the
//! caller's MIDI stack.
//!
//! MicroBrute payloads open with the `01` device byte followed by a message id
//! byte, then a two byte operation code. BeatStep pad configuration keeps its
//! own `42 02 00` prefix.

pub mod pads;
pub mod sequence;

use serde::Serialize;
use snafu::Snafu;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::sysex::pads::PadControl;
use crate::sysex::sequence::SequencePattern;

/// Leading byte of every MicroBrute payload.
pub const DEVICE_ID: u8 = 0x01;

/// Prefix of BeatStep pad/control payloads.
pub const PAD_PREFIX: [u8; 3] = [0x42, 0x02, 0x00];

/// A sequence block never carries more than 32 steps.
pub const MAX_SEQ_LEN: usize = 0x20;

/// Sequences live in slots 0 to 7.
pub const MAX_SEQ_INDEX: u8 = 0x07;

const SEQ_DATA_OP: [u8; 2] = [0x23, 0x3a];
const SEQ_QUERY_OP: [u8; 2] = [0x03, 0x3b];
const SEQ_REPLY_OP: u8 = 0x23;

const IDENTITY_REPLY_LEN: usize = 13;

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum SysexError {
    /// Structural violation. Fatal to this one message, never to the session.
    #[snafu(display("malformed message: {}", detail))]
    MalformedMessage { detail: String },

    /// Operation code matches no known message. Callers may log and skip.
    #[snafu(display("unknown message id {:02x}", id))]
    UnknownMessageId { id: u8 },
}

pub(crate) fn malformed<T>(detail: impl Into<String>) -> Result<T, SysexError> {
    MalformedMessage {
        detail: detail.into(),
    }
    .fail()
}

/// Which half of the firmware version an identity exchange reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, EnumIter, IntoStaticStr,
)]
pub enum VersionPart {
    #[strum(to_string = "Major", serialize = "major")]
    Major,
    #[strum(to_string = "Minor", serialize = "minor")]
    Minor,
}

impl VersionPart {
    fn msg_id(self) -> u8 {
        match self {
            VersionPart::Major => 0x59,
            VersionPart::Minor => 0x5a,
        }
    }

    fn inquiry_op(self) -> u8 {
        match self {
            VersionPart::Major => 0x37,
            VersionPart::Minor => 0x39,
        }
    }

    fn reply_op(self) -> u8 {
        match self {
            VersionPart::Major => 0x36,
            VersionPart::Minor => 0x38,
        }
    }

    /// Constant byte the device sends ahead of the version value. Carried on
    /// encode, not interpreted on decode.
    fn reply_tag(self) -> u8 {
        match self {
            VersionPart::Major => 0x02,
            VersionPart::Minor => 0x08,
        }
    }
}

/// The closed set of messages the devices exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, IntoStaticStr)]
pub enum SysexMessage {
    IdentityInquiry {
        part: VersionPart,
    },
    IdentityReply {
        part: VersionPart,
        version: u8,
    },
    SequenceUpdate {
        msg_id: u8,
        pattern: SequencePattern,
    },
    SequenceQuery {
        msg_id: u8,
        index: u8,
        offset: u8,
    },
    SequenceQueryReply {
        msg_id: u8,
        pattern: SequencePattern,
    },
    PadControlUpdate {
        control: PadControl,
    },
}

/// Encode a message to its raw payload. Fails only on out of bound fields
/// (sequence slot over 7, more than 32 steps, note above the sequencer span).
pub fn encode(msg: &SysexMessage) -> Result<Vec<u8>, SysexError> {
    match msg {
        SysexMessage::IdentityInquiry { part } => {
            Ok(vec![DEVICE_ID, part.msg_id(), 0x00, part.inquiry_op()])
        }
        SysexMessage::IdentityReply { part, version } => {
            let mut raw = vec![
                DEVICE_ID,
                part.msg_id(),
                0x01,
                part.reply_op(),
                part.reply_tag(),
                *version,
            ];
            raw.resize(IDENTITY_REPLY_LEN, 0x00);
            Ok(raw)
        }
        SysexMessage::SequenceUpdate { msg_id, pattern } => {
            let mut raw = vec![DEVICE_ID, *msg_id, SEQ_DATA_OP[0], SEQ_DATA_OP[1]];
            sequence::encode_pattern(pattern, &mut raw)?;
            Ok(raw)
        }
        SysexMessage::SequenceQuery {
            msg_id,
            index,
            offset,
        } => {
            if *index > MAX_SEQ_INDEX {
                return malformed(format!("sequence index {} over {}", index, MAX_SEQ_INDEX));
            }
            Ok(vec![
                DEVICE_ID,
                *msg_id,
                SEQ_QUERY_OP[0],
                SEQ_QUERY_OP[1],
                *index,
                0x00,
                *offset,
                MAX_SEQ_LEN as u8,
            ])
        }
        SysexMessage::SequenceQueryReply { msg_id, pattern } => {
            let mut raw = vec![DEVICE_ID, *msg_id, SEQ_REPLY_OP];
            sequence::encode_pattern(pattern, &mut raw)?;
            Ok(raw)
        }
        SysexMessage::PadControlUpdate { control } => Ok(pads::encode(control)),
    }
}

/// Decode a raw payload. `MalformedMessage` is fatal to this decode;
/// `UnknownMessageId` means an operation code outside the known family and
/// may be skipped by the caller.
pub fn decode(raw: &[u8]) -> Result<SysexMessage, SysexError> {
    match raw.first() {
        Some(&DEVICE_ID) => decode_device(raw),
        Some(&byte) if byte == PAD_PREFIX[0] => pads::decode(raw),
        Some(&byte) => malformed(format!("bad leading byte {:02x}", byte)),
        None => malformed("empty message"),
    }
}

fn decode_device(raw: &[u8]) -> Result<SysexMessage, SysexError> {
    if raw.len() < 4 {
        return malformed(format!("short message: {} bytes", raw.len()));
    }
    match (raw[1], raw[2], raw[3]) {
        (0x59, 0x00, 0x37) => Ok(SysexMessage::IdentityInquiry {
            part: VersionPart::Major,
        }),
        (0x5a, 0x00, 0x39) => Ok(SysexMessage::IdentityInquiry {
            part: VersionPart::Minor,
        }),
        (0x59, 0x01, 0x36) => decode_identity_reply(VersionPart::Major, raw),
        (0x5a, 0x01, 0x38) => decode_identity_reply(VersionPart::Minor, raw),
        (msg_id, 0x23, 0x3a) => Ok(SysexMessage::SequenceUpdate {
            msg_id,
            pattern: sequence::decode_pattern(&raw[4..])?,
        }),
        (msg_id, 0x03, 0x3b) => decode_sequence_query(msg_id, raw),
        // a reply's byte 3 is the sequence slot, never 0x3a
        (msg_id, 0x23, _) => Ok(SysexMessage::SequenceQueryReply {
            msg_id,
            pattern: sequence::decode_pattern(&raw[3..])?,
        }),
        (_, id, _) => UnknownMessageId { id }.fail(),
    }
}

fn decode_identity_reply(part: VersionPart, raw: &[u8]) -> Result<SysexMessage, SysexError> {
    if raw.len() < IDENTITY_REPLY_LEN {
        return malformed(format!("short identity reply: {} bytes", raw.len()));
    }
    Ok(SysexMessage::IdentityReply {
        part,
        version: raw[5],
    })
}

fn decode_sequence_query(msg_id: u8, raw: &[u8]) -> Result<SysexMessage, SysexError> {
    if raw.len() < 8 {
        return malformed(format!("short sequence query: {} bytes", raw.len()));
    }
    let index = raw[4];
    if index > MAX_SEQ_INDEX {
        return malformed(format!("sequence index {} over {}", index, MAX_SEQ_INDEX));
    }
    if raw[7] as usize > MAX_SEQ_LEN {
        return malformed(format!(
            "sequence length {:#04x} over {:#04x}",
            raw[7], MAX_SEQ_LEN
        ));
    }
    Ok(SysexMessage::SequenceQuery {
        msg_id,
        index,
        offset: raw[6],
    })
}
