//! BeatStep pad/control configuration.
//!
//! A pad control update is a single `(field, control, value)` triple behind
//! the `42 02 00` prefix. Controls `0x70` to `0x7f` address pads 0 to 15.

use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::sysex::{malformed, SysexError, SysexMessage, PAD_PREFIX};

/// Control code of pad 0; pads run from here to `0x7f`.
pub const PAD_CONTROL_BASE: u8 = 0x70;

/// Control code of pad 15.
pub const PAD_CONTROL_TOP: u8 = 0x7f;

/// The field carrying a pad's mode byte.
pub const MODE_FIELD: u8 = 0x01;

/// What a pad does when hit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString, EnumIter, IntoStaticStr,
)]
pub enum PadMode {
    #[strum(to_string = "Off", serialize = "off")]
    Off = 0x00,
    #[strum(to_string = "Mmc", serialize = "mmc")]
    Mmc = 0x01,
    #[strum(to_string = "Switched", serialize = "switched")]
    Switched = 0x02,
    #[strum(to_string = "Note", serialize = "note")]
    Note = 0x09,
    #[strum(to_string = "ProgramChange", serialize = "programchange")]
    ProgramChange = 0x0a,
}

impl PadMode {
    pub fn from_value(value: u8) -> Option<PadMode> {
        PadMode::iter().find(|mode| *mode as u8 == value)
    }
}

/// A single pad or controller configuration byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PadControl {
    pub field: u8,
    pub control: u8,
    pub value: u8,
}

impl PadControl {
    /// Mode update for one pad.
    pub fn for_pad(pad: u8, mode: PadMode) -> Result<PadControl, SysexError> {
        if pad > PAD_CONTROL_TOP - PAD_CONTROL_BASE {
            return malformed(format!("pad index {} over 15", pad));
        }
        Ok(PadControl {
            field: MODE_FIELD,
            control: PAD_CONTROL_BASE + pad,
            value: mode as u8,
        })
    }

    /// Pad index 0 to 15 when the control byte addresses a pad.
    pub fn pad(&self) -> Option<u8> {
        if (PAD_CONTROL_BASE..=PAD_CONTROL_TOP).contains(&self.control) {
            Some(self.control - PAD_CONTROL_BASE)
        } else {
            None
        }
    }

    /// The mode this value selects, when the field is the mode field.
    pub fn mode(&self) -> Option<PadMode> {
        if self.field == MODE_FIELD {
            PadMode::from_value(self.value)
        } else {
            None
        }
    }
}

pub(super) fn encode(control: &PadControl) -> Vec<u8> {
    vec![
        PAD_PREFIX[0],
        PAD_PREFIX[1],
        PAD_PREFIX[2],
        control.field,
        control.control,
        control.value,
    ]
}

pub(super) fn decode(raw: &[u8]) -> Result<SysexMessage, SysexError> {
    if raw.len() < 6 {
        return malformed(format!("short pad control: {} bytes", raw.len()));
    }
    if raw[..3] != PAD_PREFIX {
        return malformed(format!("bad pad prefix {}", hex::encode(&raw[..3])));
    }
    Ok(SysexMessage::PadControlUpdate {
        control: PadControl {
            field: raw[3],
            control: raw[4],
            value: raw[5],
        },
    })
}
