use structopt::StructOpt;
use strum::IntoEnumIterator;

use brutewire::notes::{MidiNote, NOTE_SPAN};
use brutewire::sysex::pads::{PadControl, PadMode};
use brutewire::sysex::sequence::{SequencePattern, Step};
use brutewire::sysex::{self, SysexError, SysexMessage, VersionPart};

use std::error::Error;
use std::str::FromStr;

type Result<T> = std::result::Result<T, Box<dyn Error>>;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "brutewire",
    about = "Encode and decode Arturia MicroBrute / BeatStep SysEx payloads"
)]
struct Brutewire {
    #[structopt(subcommand)]
    subcmd: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Decode hex payloads and print them as YAML
    Decode {
        /// Raw payloads in hex, e.g. "01590136020100000000000000"
        payloads: Vec<String>,
    },
    /// Encode an identity inquiry
    Ident {
        /// Version part to ask for: major or minor
        #[structopt(default_value = "major")]
        part: String,
    },
    /// Sequence upload/download messages
    Seq {
        #[structopt(subcommand)]
        subcmd: Seq,
    },
    /// Encode a pad mode update
    Pad {
        /// Pad index, 0 to 15
        pad: u8,
        /// One of the modes from `list modes`
        mode: String,
    },
    /// List known values
    List {
        #[structopt(subcommand)]
        subcmd: List,
    },
}

#[derive(StructOpt, Debug)]
enum Seq {
    /// Encode a query for one 32 step block
    Get {
        /// Sequence slot, 0 to 7
        index: u8,
        /// Byte offset of the block, 0 or 32
        #[structopt(default_value = "0")]
        offset: u8,
        #[structopt(long, default_value = "0")]
        msg_id: u8,
    },
    /// Encode an update from a comma separated note list, "_" for rest
    Set {
        /// Sequence slot, 0 to 7
        index: u8,
        /// e.g. "C0,_,D#1,G2"
        notes: String,
        #[structopt(default_value = "0")]
        offset: u8,
        #[structopt(long, default_value = "0")]
        msg_id: u8,
    },
}

#[derive(StructOpt, Debug)]
enum List {
    /// Pad modes
    Modes,
    /// The sequencer note range
    Notes,
}

fn main() -> Result<()> {
    env_logger::init();
    let app = Brutewire::from_args();

    match app.subcmd {
        Command::Decode { payloads } => {
            for payload in payloads {
                let raw = hex::decode(payload.replace(' ', ""))?;
                match sysex::decode(&raw) {
                    Ok(msg) => print!("{}", serde_yaml::to_string(&msg)?),
                    Err(err @ SysexError::UnknownMessageId { .. }) => {
                        log::warn!("skipping {}: {}", hex::encode(&raw), err)
                    }
                    Err(err) => return Err(Box::new(err)),
                }
            }
        }
        Command::Ident { part } => {
            let part = VersionPart::from_str(&part)?;
            emit(&SysexMessage::IdentityInquiry { part })?;
        }
        Command::Seq { subcmd } => match subcmd {
            Seq::Get {
                index,
                offset,
                msg_id,
            } => emit(&SysexMessage::SequenceQuery {
                msg_id,
                index,
                offset,
            })?,
            Seq::Set {
                index,
                notes,
                offset,
                msg_id,
            } => {
                let steps = notes
                    .split(',')
                    .filter(|part| !part.is_empty())
                    .map(Step::from_str)
                    .collect::<std::result::Result<Vec<Step>, _>>()?;
                emit(&SysexMessage::SequenceUpdate {
                    msg_id,
                    pattern: SequencePattern {
                        index,
                        offset,
                        steps,
                    },
                })?;
            }
        },
        Command::Pad { pad, mode } => {
            let mode = PadMode::from_str(&mode)?;
            emit(&SysexMessage::PadControlUpdate {
                control: PadControl::for_pad(pad, mode)?,
            })?;
        }
        Command::List { subcmd } => match subcmd {
            List::Modes => {
                for mode in PadMode::iter() {
                    println!("{}", mode);
                }
            }
            List::Notes => {
                for note in 0..NOTE_SPAN {
                    println!("{}", MidiNote { note });
                }
            }
        },
    }
    Ok(())
}

fn emit(msg: &SysexMessage) -> Result<()> {
    println!("{}", hex::encode(sysex::encode(msg)?));
    Ok(())
}
