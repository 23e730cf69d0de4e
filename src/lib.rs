//! A multiple-reader ring buffer: one writer-side byte stream fanned out to
//! any number of independently-paced, callback-driven readers.
//!
//! Each reader names its own overrun policy — block the writer, get disabled,
//! or silently drop its unread bytes — so a slow or absent reader never stops
//! the others from draining the stream. There is no heap allocation: the
//! backing buffer and the reader table are both caller-provided storage, and
//! the crate is `no_std` unless the `std` feature is enabled.
//!
//! ```
//! use core::cell::UnsafeCell;
//! use core::mem::MaybeUninit;
//! use mrrb::{Mrrb, HostedPort, Policy, Reader};
//!
//! let buf: Vec<_> = (0..64).map(|_| UnsafeCell::new(MaybeUninit::uninit())).collect();
//! let print = |_handle: u8, bytes: &[u8]| println!("{bytes:?}");
//! let mut readers = vec![Reader::new(0u8, Policy::Blocking, &print, None).unwrap()];
//! let mrrb = Mrrb::new(&buf, &mut readers, HostedPort::new()).unwrap();
//! mrrb.reader_enable(0).unwrap();
//! mrrb.write(b"hello").unwrap();
//! mrrb.read_complete(0).unwrap();
//! ```
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

mod error;
mod mrrb;
mod port;
mod reader;

pub use error::{InitError, MrrbError, ReaderInitError, ReaderOpError};
pub use mrrb::Mrrb;
pub use port::Port;
#[cfg(feature = "critical-section")]
pub use port::CriticalSectionPort;
#[cfg(feature = "std")]
pub use port::{HostedPort, PoisonError};
pub use reader::{AbortFn, MAX_READERS, NotifyFn, Policy, Reader, State};
