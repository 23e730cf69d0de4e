//! Demonstrates the "one reader per sink" pattern: a single global ring
//! buffer fans bytes out to two independent consumers — one that forwards
//! straight to stdout, one that just accumulates into a buffer for later
//! inspection — each running its own BLOCKING read/notify loop, unaware of
//! the other.
//!
//! The buffer and reader table are leaked to get the `'static` storage a
//! process-wide singleton needs; a real retargeted-IO shim would instead own
//! this storage for the lifetime of the embedded application.

use std::cell::UnsafeCell;
use std::io::Write as _;
use std::mem::MaybeUninit;
use std::sync::{Mutex, OnceLock};

use mrrb::{HostedPort, Mrrb, Policy, Reader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    Stdout,
    Capture,
}

static CAPTURED: Mutex<Vec<u8>> = Mutex::new(Vec::new());
static SHIM: OnceLock<Mrrb<'static, Sink, HostedPort>> = OnceLock::new();

fn stdout_notify(handle: Sink, bytes: &[u8]) {
    let _ = std::io::stdout().write_all(bytes);
    shim().read_complete(handle).unwrap();
}

fn capture_notify(handle: Sink, bytes: &[u8]) {
    CAPTURED.lock().unwrap().extend_from_slice(bytes);
    shim().read_complete(handle).unwrap();
}

fn shim() -> &'static Mrrb<'static, Sink, HostedPort> {
    SHIM.get_or_init(|| {
        let buf: Vec<_> = (0..1024).map(|_| UnsafeCell::new(MaybeUninit::uninit())).collect();
        let buf: &'static [UnsafeCell<MaybeUninit<u8>>] = Box::leak(buf.into_boxed_slice());

        let notify_stdout: &'static (dyn Fn(Sink, &[u8]) + Sync) = &stdout_notify;
        let notify_capture: &'static (dyn Fn(Sink, &[u8]) + Sync) = &capture_notify;

        let readers = vec![
            Reader::new(Sink::Stdout, Policy::Blocking, notify_stdout, None).unwrap(),
            Reader::new(Sink::Capture, Policy::Blocking, notify_capture, None).unwrap(),
        ];
        let readers: &'static mut [Reader<'static, Sink>] = Box::leak(readers.into_boxed_slice());

        let mrrb = Mrrb::new(buf, readers, HostedPort::new()).expect("static sizing is valid");
        mrrb.reader_enable(Sink::Stdout).unwrap();
        mrrb.reader_enable(Sink::Capture).unwrap();
        mrrb
    })
}

/// Pushes `bytes` through the shared buffer to every registered sink,
/// retrying until the whole slice has been accepted.
fn forward(bytes: &[u8]) {
    let mrrb = shim();
    let mut sent = 0;
    while sent < bytes.len() {
        let n = mrrb.write(&bytes[sent..]).expect("hosted port never fails");
        if n == 0 {
            std::thread::yield_now();
            continue;
        }
        sent += n;
    }
}

fn main() {
    forward(b"booting up\n");
    forward(b"link established\n");
    forward(b"ready\n");

    let captured = CAPTURED.lock().unwrap();
    println!("--- capture sink recorded {} bytes ---", captured.len());
    print!("{}", String::from_utf8_lossy(&captured));
}
