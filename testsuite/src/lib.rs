//! Hosted, `std::thread`-based scenarios that exercise `mrrb` the way a real
//! embedder would — the hosted analogue of driving an embedded consumer
//! through hardware-in-the-loop.
//!
//! The MRRB itself knows nothing about message framing; it only guarantees
//! byte-stream order and (for BLOCKING readers) no loss. [`Demux`] lives here
//! instead of in the crate under test because framing is entirely a
//! reader-side concern, decoupled from how many `write()` calls it took to
//! deliver a given span of bytes.

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::mem::MaybeUninit;
use std::thread;
use std::time::Duration;

use crossbeam_channel::unbounded;
use mrrb::{HostedPort, Mrrb, Policy, Reader};
use rand::Rng;

/// Reassembles a byte stream framed as repeated
/// `[writer_id: u32 LE][length: u32 LE][payload...]` records into one
/// `Vec<u8>` per `writer_id`, regardless of how the underlying bytes were
/// chunked across individual reads.
#[derive(Default)]
pub struct Demux {
    scratch: Vec<u8>,
    streams: HashMap<u32, Vec<u8>>,
}

impl Demux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.scratch.extend_from_slice(bytes);
        loop {
            if self.scratch.len() < 8 {
                break;
            }
            let writer_id = u32::from_le_bytes(self.scratch[0..4].try_into().unwrap());
            let len = u32::from_le_bytes(self.scratch[4..8].try_into().unwrap()) as usize;
            if self.scratch.len() < 8 + len {
                break;
            }
            let payload = self.scratch[8..8 + len].to_vec();
            self.streams.entry(writer_id).or_default().extend(payload);
            self.scratch.drain(0..8 + len);
        }
    }

    pub fn stream(&self, writer_id: u32) -> &[u8] {
        self.streams.get(&writer_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_len(&self) -> usize {
        self.streams.values().map(Vec::len).sum()
    }
}

/// Encodes one frame: an 8-byte `{writer_id, length}` header followed by
/// `payload`.
pub fn frame(writer_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&writer_id.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// The reference stream a writer with id `writer_id` should produce:
/// `0, 1, 2, .., total-1`, each taken mod 256.
pub fn reference_stream(total: usize) -> Vec<u8> {
    (0..total).map(|i| (i % 256) as u8).collect()
}

/// Parameters for [`run_stress`].
#[derive(Debug, Clone)]
pub struct StressConfig {
    pub writers: u32,
    pub readers: u32,
    pub bytes_per_writer: usize,
    pub chunk_max: usize,
    pub buf_len: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self { writers: 5, readers: 8, bytes_per_writer: 1000, chunk_max: 15, buf_len: 2048 }
    }
}

fn run_writer(mrrb: &Mrrb<'_, u32, HostedPort>, writer_id: u32, bytes_per_writer: usize, chunk_max: usize) {
    let mut rng = rand::thread_rng();
    let mut sent = 0usize;
    while sent < bytes_per_writer {
        let remaining = bytes_per_writer - sent;
        let len = rng.gen_range(1..=chunk_max.min(remaining));
        let payload: Vec<u8> = (sent..sent + len).map(|i| (i % 256) as u8).collect();
        let f = frame(writer_id, &payload);
        let mut offset = 0;
        while offset < f.len() {
            let n = mrrb.write(&f[offset..]).expect("hosted port never fails");
            if n == 0 {
                thread::yield_now();
            }
            offset += n;
        }
        sent += len;
    }
}

/// Runs the multi-writer/multi-reader stress scenario: `cfg.writers`
/// threads each push `cfg.bytes_per_writer` bytes in randomized chunks of at
/// most `cfg.chunk_max`, framed by `{writer_id, length}` headers; each of
/// `cfg.readers` BLOCKING readers (with a randomized completion delay) must
/// reconstruct every writer's stream byte-for-byte. Returns the first
/// mismatch found, if any.
pub fn run_stress(cfg: &StressConfig) -> Result<(), String> {
    let buf: Vec<_> = (0..cfg.buf_len).map(|_| UnsafeCell::new(MaybeUninit::uninit())).collect();
    let channels: Vec<_> = (0..cfg.readers).map(|_| unbounded::<Vec<u8>>()).collect();

    let notifies: Vec<_> = channels
        .iter()
        .map(|(tx, _)| {
            let tx = tx.clone();
            move |_handle: u32, bytes: &[u8]| {
                let _ = tx.send(bytes.to_vec());
            }
        })
        .collect();

    let mut readers: Vec<_> = notifies
        .iter()
        .enumerate()
        .map(|(i, notify)| Reader::new(i as u32, Policy::Blocking, notify, None).unwrap())
        .collect();

    let mrrb = Mrrb::new(&buf, &mut readers, HostedPort::new()).map_err(|e| format!("{e:?}"))?;
    for i in 0..cfg.readers {
        mrrb.reader_enable(i).map_err(|e| format!("{e:?}"))?;
    }

    let expected_total = cfg.writers as usize * cfg.bytes_per_writer;
    let reference = reference_stream(cfg.bytes_per_writer);
    let mrrb_ref = &mrrb;
    let mut mismatch = None;

    thread::scope(|scope| {
        for writer_id in 0..cfg.writers {
            scope.spawn(move || run_writer(mrrb_ref, writer_id, cfg.bytes_per_writer, cfg.chunk_max));
        }

        let consumers: Vec<_> = channels
            .iter()
            .enumerate()
            .map(|(i, (_, rx))| {
                let rx = rx.clone();
                let i = i as u32;
                scope.spawn(move || {
                    let mut rng = rand::thread_rng();
                    let mut demux = Demux::new();
                    while demux.total_len() < expected_total {
                        let Ok(bytes) = rx.recv() else { break };
                        thread::sleep(Duration::from_micros(rng.gen_range(0..2000)));
                        demux.feed(&bytes);
                        if mrrb_ref.read_complete(i).is_err() {
                            break;
                        }
                    }
                    demux
                })
            })
            .collect();

        for (reader_id, consumer) in consumers.into_iter().enumerate() {
            let demux = consumer.join().expect("consumer thread panicked");
            for writer_id in 0..cfg.writers {
                if demux.stream(writer_id) != reference.as_slice() {
                    mismatch = Some(format!(
                        "reader {reader_id} writer {writer_id}: expected {} bytes, got {}",
                        reference.len(),
                        demux.stream(writer_id).len()
                    ));
                }
            }
        }
    });

    match mismatch {
        Some(m) => Err(m),
        None => Ok(()),
    }
}
