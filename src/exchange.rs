//! Request/reply correlation for half duplex SysEx exchanges.
//!
//! MIDI SysEx request/reply runs over a shared transport with no framing level
//! correlation, so the pairing lives here: [`Correlator::send`] registers an
//! outstanding request, the transport's receive callback feeds raw payloads to
//! [`Correlator::on_reply`], and [`PendingExchange::wait`] blocks the asking
//! thread until its reply lands or the timeout lapses.
//!
//! There is no retry policy: at most one attempt per exchange, recovery is the
//! caller's call.

use linked_hash_map::LinkedHashMap;
use log::warn;
use snafu::Snafu;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::sysex::{self, SysexError, SysexMessage, VersionPart};

#[derive(Debug, Snafu)]
pub enum ExchangeError {
    #[snafu(display("could not decode reply: {}", source))]
    ReplyDecode { source: SysexError },

    /// The inbound message resolves no pending exchange. Non fatal.
    #[snafu(display("unmatched reply {}", kind))]
    UnmatchedReply { kind: &'static str },

    /// One outstanding request per key at a time.
    #[snafu(display("exchange already pending for {:?}", key))]
    AlreadyPending { key: ExchangeKey },

    /// The message is not a request, or its reply carries no matchable key.
    #[snafu(display("request expects no reply"))]
    NoReplyExpected,

    #[snafu(display("no reply within {:?}", timeout))]
    ExchangeTimedOut { timeout: Duration },
}

/// What a reply must carry to resolve a request: the reply kind, plus the
/// sequence slot for sequence queries. The free running message id byte is
/// not part of the key since the notes never promise the device echoes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKey {
    Identity(VersionPart),
    Sequence(u8),
}

impl ExchangeKey {
    fn for_request(msg: &SysexMessage) -> Option<ExchangeKey> {
        match msg {
            SysexMessage::IdentityInquiry { part } => Some(ExchangeKey::Identity(*part)),
            SysexMessage::SequenceQuery { index, .. } => Some(ExchangeKey::Sequence(*index)),
            _ => None,
        }
    }

    fn for_reply(msg: &SysexMessage) -> Option<ExchangeKey> {
        match msg {
            SysexMessage::IdentityReply { part, .. } => Some(ExchangeKey::Identity(*part)),
            SysexMessage::SequenceQueryReply { pattern, .. } => {
                Some(ExchangeKey::Sequence(pattern.index))
            }
            _ => None,
        }
    }
}

#[derive(Default)]
struct Slot {
    reply: Mutex<Option<SysexMessage>>,
    ready: Condvar,
}

type PendingMap = LinkedHashMap<ExchangeKey, Arc<Slot>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}

/// Pairs outgoing requests with inbound replies. One instance per transport;
/// cloning shares the pending table so the receive side can live on the MIDI
/// callback thread.
#[derive(Clone, Default)]
pub struct Correlator {
    pending: Arc<Mutex<PendingMap>>,
}

impl Correlator {
    pub fn new() -> Self {
        Correlator::default()
    }

    /// Register an outstanding request. The transport write stays with the
    /// caller; this only reserves the reply key.
    pub fn send(&self, request: &SysexMessage) -> Result<PendingExchange, ExchangeError> {
        let key = ExchangeKey::for_request(request).ok_or(ExchangeError::NoReplyExpected)?;
        let mut pending = lock(&self.pending);
        if pending.contains_key(&key) {
            return AlreadyPending { key }.fail();
        }
        let slot = Arc::new(Slot::default());
        pending.insert(key, Arc::clone(&slot));
        Ok(PendingExchange {
            key,
            slot,
            pending: Arc::clone(&self.pending),
        })
    }

    /// Feed one raw inbound payload. Undecodable or unmatched messages are
    /// logged and reported, never fatal to the session.
    pub fn on_reply(&self, raw: &[u8]) -> Result<(), ExchangeError> {
        let msg = sysex::decode(raw).map_err(|source| {
            warn!("skipping inbound {}: {}", hex::encode(raw), source);
            ExchangeError::ReplyDecode { source }
        })?;
        let kind: &'static str = (&msg).into();
        let key = match ExchangeKey::for_reply(&msg) {
            Some(key) => key,
            None => {
                warn!("inbound {} is not a reply", kind);
                return UnmatchedReply { kind }.fail();
            }
        };
        let slot = lock(&self.pending).remove(&key);
        match slot {
            Some(slot) => {
                *lock(&slot.reply) = Some(msg);
                slot.ready.notify_all();
                Ok(())
            }
            None => {
                warn!("unmatched {} for {:?}", kind, key);
                UnmatchedReply { kind }.fail()
            }
        }
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

/// Handle to one outstanding request. Dropping it abandons the exchange; a
/// reply arriving afterwards surfaces as `UnmatchedReply`.
pub struct PendingExchange {
    key: ExchangeKey,
    slot: Arc<Slot>,
    pending: Arc<Mutex<PendingMap>>,
}

impl PendingExchange {
    pub fn key(&self) -> ExchangeKey {
        self.key
    }

    /// Block until the matching reply arrives or the timeout lapses.
    pub fn wait(self, timeout: Duration) -> Result<SysexMessage, ExchangeError> {
        let slot = Arc::clone(&self.slot);
        let deadline = Instant::now() + timeout;
        let mut reply = lock(&slot.reply);
        loop {
            if let Some(msg) = reply.take() {
                return Ok(msg);
            }
            let now = Instant::now();
            if now >= deadline {
                return ExchangeTimedOut { timeout }.fail();
            }
            let (guard, _timed_out) = slot
                .ready
                .wait_timeout(reply, deadline - now)
                .unwrap_or_else(|err| err.into_inner());
            reply = guard;
        }
    }
}

impl Drop for PendingExchange {
    fn drop(&mut self) {
        // deregister unless a newer exchange reused the key
        let mut pending = lock(&self.pending);
        let stale = pending
            .get(&self.key)
            .map(|slot| Arc::ptr_eq(slot, &self.slot))
            .unwrap_or(false);
        if stale {
            pending.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::notes::MidiNote;
    use crate::sysex::sequence::{SequencePattern, Step};
    use std::thread;

    fn seq_query(index: u8) -> SysexMessage {
        SysexMessage::SequenceQuery {
            msg_id: 0x01,
            index,
            offset: 0,
        }
    }

    fn seq_reply(index: u8) -> Vec<u8> {
        sysex::encode(&SysexMessage::SequenceQueryReply {
            msg_id: 0x41,
            pattern: SequencePattern {
                index,
                offset: 0,
                steps: vec![Step::Note(MidiNote { note: 0 }), Step::Rest],
            },
        })
        .unwrap()
    }

    #[test]
    fn matching_reply_resolves() {
        let correlator = Correlator::new();
        let exchange = correlator.send(&seq_query(3)).unwrap();
        correlator.on_reply(&seq_reply(3)).unwrap();
        let reply = exchange.wait(Duration::from_millis(0)).unwrap();
        match reply {
            SysexMessage::SequenceQueryReply { pattern, .. } => assert_eq!(pattern.index, 3),
            other => panic!("unexpected reply {:?}", other),
        }
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn mismatched_sequence_stays_pending() {
        let correlator = Correlator::new();
        let exchange = correlator.send(&seq_query(3)).unwrap();
        let err = correlator.on_reply(&seq_reply(5)).unwrap_err();
        assert!(matches!(err, ExchangeError::UnmatchedReply { .. }));
        assert_eq!(correlator.pending_count(), 1);

        // the right reply still resolves afterwards
        correlator.on_reply(&seq_reply(3)).unwrap();
        exchange.wait(Duration::from_millis(0)).unwrap();
    }

    #[test]
    fn zero_timeout_times_out() {
        let correlator = Correlator::new();
        let exchange = correlator.send(&seq_query(0)).unwrap();
        let err = exchange.wait(Duration::from_millis(0)).unwrap_err();
        assert!(matches!(err, ExchangeError::ExchangeTimedOut { .. }));
        // timed out exchange is deregistered, its late reply goes unmatched
        assert_eq!(correlator.pending_count(), 0);
        assert!(correlator.on_reply(&seq_reply(0)).is_err());
    }

    #[test]
    fn identity_exchange() {
        let correlator = Correlator::new();
        let exchange = correlator
            .send(&SysexMessage::IdentityInquiry {
                part: VersionPart::Major,
            })
            .unwrap();
        correlator
            .on_reply(&[
                0x01, 0x59, 0x01, 0x36, 0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            ])
            .unwrap();
        assert_eq!(
            exchange.wait(Duration::from_millis(0)).unwrap(),
            SysexMessage::IdentityReply {
                part: VersionPart::Major,
                version: 1
            }
        );
    }

    #[test]
    fn reply_from_another_thread_wakes_waiter() {
        let correlator = Correlator::new();
        let exchange = correlator.send(&seq_query(2)).unwrap();
        let rx_side = correlator.clone();
        let feeder = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            rx_side.on_reply(&seq_reply(2)).unwrap();
        });
        let reply = exchange.wait(Duration::from_secs(5)).unwrap();
        assert!(matches!(reply, SysexMessage::SequenceQueryReply { .. }));
        feeder.join().unwrap();
    }

    #[test]
    fn update_expects_no_reply() {
        let correlator = Correlator::new();
        let msg = SysexMessage::SequenceUpdate {
            msg_id: 0,
            pattern: SequencePattern {
                index: 0,
                offset: 0,
                steps: vec![],
            },
        };
        assert!(matches!(
            correlator.send(&msg),
            Err(ExchangeError::NoReplyExpected)
        ));
    }

    #[test]
    fn duplicate_key_rejected() {
        let correlator = Correlator::new();
        let _first = correlator.send(&seq_query(1)).unwrap();
        assert!(matches!(
            correlator.send(&seq_query(1)),
            Err(ExchangeError::AlreadyPending { .. })
        ));
    }

    #[test]
    fn undecodable_reply_is_reported() {
        let correlator = Correlator::new();
        let err = correlator.on_reply(&[0x01, 0x00, 0x55, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::ReplyDecode {
                source: SysexError::UnknownMessageId { id: 0x55 }
            }
        ));
    }

    #[test]
    fn dropped_exchange_deregisters() {
        let correlator = Correlator::new();
        let exchange = correlator.send(&seq_query(4)).unwrap();
        drop(exchange);
        assert_eq!(correlator.pending_count(), 0);
    }
}
