//! SysEx codec and request/reply correlation for the Arturia MicroBrute
//! sequencer protocol and BeatStep pad configuration messages.
//!
//! Transport (MIDI port I/O) is deliberately out of scope: callers feed raw
//! inbound payloads to [`exchange::Correlator::on_reply`] and write encoded
//! payloads out through whatever MIDI stack they already own.

pub mod exchange;
pub mod notes;
pub mod sysex;
