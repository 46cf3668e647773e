//! Ring buffer consumer.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use aya::maps::{MapData, RingBuf};
use log::{debug, warn};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::record::{decode, ExecRecord};

/// Counters kept by the reader.
#[derive(Debug, Default)]
pub struct ReaderStats {
    /// Records decoded and handed to the channel.
    pub forwarded: AtomicU64,
    /// Records that failed to decode.
    pub rejected: AtomicU64,
}

/// What the reader does with each raw record.
pub struct Forwarder {
    tx: mpsc::Sender<ExecRecord>,
    stats: Arc<ReaderStats>,
    resolve_usernames: bool,
}

impl Forwarder {
    pub fn new(
        tx: mpsc::Sender<ExecRecord>,
        stats: Arc<ReaderStats>,
        resolve_usernames: bool,
    ) -> Self {
        Forwarder {
            tx,
            stats,
            resolve_usernames,
        }
    }

    /// Decode one record and send it on, blocking while the channel is
    /// full. Returns `false` once the receiving side is gone.
    pub fn forward(&self, bytes: &[u8]) -> bool {
        let record = match decode(bytes) {
            Ok(record) => record,
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!("dropping undecodable exec record: {}", e);
                return true;
            }
        };

        let record = if self.resolve_usernames {
            record.resolve_username()
        } else {
            record
        };

        if self.tx.blocking_send(record).is_err() {
            debug!("event channel closed, stopping reader");
            return false;
        }
        self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
        true
    }
}

/// Anything the reader can pull raw records from.
pub trait RecordSource {
    /// Hand the next pending record to `f`, or return `None` when nothing
    /// is pending.
    fn with_next<R>(&mut self, f: impl FnOnce(&[u8]) -> R) -> Option<R>;
}

impl RecordSource for RingBuf<MapData> {
    fn with_next<R>(&mut self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        self.next().map(|item| f(&*item))
    }
}

/// Drain `source` until `shutdown` is set or the channel closes, sleeping
/// `poll_interval` whenever it is empty. `shutdown` is checked before every
/// record, not only once the source is empty.
pub fn run_reader<S: RecordSource>(
    source: &mut S,
    forwarder: &Forwarder,
    shutdown: &AtomicBool,
    poll_interval: Duration,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match source.with_next(|bytes| forwarder.forward(bytes)) {
            Some(true) => {}
            Some(false) => return,
            None => std::thread::sleep(poll_interval),
        }
    }
    debug!("reader stopping on shutdown request");
}

/// Run [`run_reader`] over `ring` on a blocking thread.
pub fn spawn_reader(
    mut ring: RingBuf<MapData>,
    forwarder: Forwarder,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        run_reader(&mut ring, &forwarder, &shutdown, poll_interval)
    })
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, thread, time::Instant};

    use super::*;
    use exectrace_common::{ExecEvent, EVENT_VERSION};
    use zerocopy::{FromZeros, IntoBytes};

    fn raw(pid: u32) -> Vec<u8> {
        let mut event = ExecEvent::new_zeroed();
        event.version = EVENT_VERSION;
        event.pid = pid;
        event.as_bytes().to_vec()
    }

    #[test]
    fn forwards_decoded_records() {
        let (tx, mut rx) = mpsc::channel(4);
        let stats = Arc::new(ReaderStats::default());
        let forwarder = Forwarder::new(tx, stats.clone(), false);

        assert!(forwarder.forward(&raw(11)));
        assert!(forwarder.forward(&raw(12)));

        assert_eq!(rx.try_recv().unwrap().pid, 11);
        assert_eq!(rx.try_recv().unwrap().pid, 12);
        assert_eq!(stats.forwarded.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn undecodable_records_are_counted_and_skipped() {
        let (tx, mut rx) = mpsc::channel(4);
        let stats = Arc::new(ReaderStats::default());
        let forwarder = Forwarder::new(tx, stats.clone(), false);

        assert!(forwarder.forward(&[0u8; 12]));
        let mut wrong_version = raw(1);
        wrong_version[0] = 0xff;
        assert!(forwarder.forward(&wrong_version));

        assert!(rx.try_recv().is_err());
        assert_eq!(stats.rejected.load(Ordering::Relaxed), 2);
        assert_eq!(stats.forwarded.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn closed_channel_stops_the_reader() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let forwarder = Forwarder::new(tx, Arc::default(), false);

        assert!(!forwarder.forward(&raw(1)));
    }

    impl RecordSource for VecDeque<Vec<u8>> {
        fn with_next<R>(&mut self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
            self.pop_front().map(|bytes| f(&bytes))
        }
    }

    /// Never runs dry, and raises `shutdown` after `stop_after` records.
    struct Flood {
        served: u32,
        stop_after: u32,
        shutdown: Arc<AtomicBool>,
    }

    impl RecordSource for Flood {
        fn with_next<R>(&mut self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
            self.served += 1;
            if self.served == self.stop_after {
                self.shutdown.store(true, Ordering::Relaxed);
            }
            Some(f(&raw(self.served)))
        }
    }

    #[test]
    fn shutdown_interrupts_a_source_that_never_drains() {
        let (tx, mut rx) = mpsc::channel(64);
        let stats = Arc::new(ReaderStats::default());
        let forwarder = Forwarder::new(tx, stats.clone(), false);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut flood = Flood {
            served: 0,
            stop_after: 5,
            shutdown: shutdown.clone(),
        };

        run_reader(&mut flood, &forwarder, &shutdown, Duration::from_millis(1));

        assert_eq!(flood.served, 5);
        assert_eq!(stats.forwarded.load(Ordering::Relaxed), 5);
        assert_eq!(rx.try_recv().unwrap().pid, 1);
    }

    #[test]
    fn preset_shutdown_reads_nothing() {
        let (tx, mut rx) = mpsc::channel(4);
        let forwarder = Forwarder::new(tx, Arc::default(), false);
        let shutdown = AtomicBool::new(true);
        let mut source: VecDeque<Vec<u8>> = [raw(1), raw(2)].into();

        run_reader(&mut source, &forwarder, &shutdown, Duration::from_millis(1));

        assert_eq!(source.len(), 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn idle_reader_stops_when_shutdown_is_set() {
        let (tx, mut rx) = mpsc::channel(4);
        let forwarder = Forwarder::new(tx, Arc::default(), false);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut source: VecDeque<Vec<u8>> = [raw(9)].into();

        let started = Instant::now();
        let stopper = {
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                shutdown.store(true, Ordering::Relaxed);
            })
        };
        run_reader(&mut source, &forwarder, &shutdown, Duration::from_millis(1));
        stopper.join().unwrap();

        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(source.is_empty());
        assert_eq!(rx.try_recv().unwrap().pid, 9);
    }

    #[test]
    fn reader_returns_once_the_channel_closes() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let forwarder = Forwarder::new(tx, Arc::default(), false);
        let shutdown = AtomicBool::new(false);
        let mut source: VecDeque<Vec<u8>> = [raw(1), raw(2)].into();

        run_reader(&mut source, &forwarder, &shutdown, Duration::from_millis(1));

        assert_eq!(source.len(), 1);
        assert!(!shutdown.load(Ordering::Relaxed));
    }
}
