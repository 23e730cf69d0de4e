//! The MRRB core: buffer, cursors, write protocol, publish/overrun/FSM
//! transitions.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ptr;
use core::slice;

use crate::error::{InitError, MrrbError, ReaderOpError};
use crate::port::Port;
use crate::reader::{AbortJob, MAX_READERS, NotifyJob, Policy, Reader, State};

/// Forward distance from `from` to `to`, modulo `cap`. `to == from` gives 0;
/// callers that need to disambiguate 0-vs-`cap` at coincidence use
/// [`reader_space`] / [`continuous_span`], not this directly.
fn fwd(from: usize, to: usize, cap: usize) -> usize {
    if to >= from { to - from } else { cap - from + to }
}

/// Free space ahead of the writer before it would catch up to `r`'s oldest
/// unconsumed byte. Disabled/disabling readers contribute `cap` (they impose
/// no constraint); `is_full` disambiguates the
/// `read_complete_ptr == reservation_ptr` coincidence between "reader owes
/// nothing, all of `cap` is free" and "reader owes everything, none of it is
/// free".
fn reader_space<H>(r: &Reader<H>, reservation_ptr: usize, cap: usize) -> usize {
    if !r.is_enabled() {
        return cap;
    }
    if r.read_complete_ptr == reservation_ptr {
        if r.is_full { 0 } else { cap }
    } else {
        fwd(reservation_ptr, r.read_complete_ptr, cap)
    }
}

/// How much of `r`'s free space a writer is allowed to claim by force
/// (overrun). Blocking readers offer none beyond their own free space;
/// Disable/Skip readers, and any disabled/disabling reader, offer the whole
/// buffer.
fn reader_overwritable<H>(r: &Reader<H>, reservation_ptr: usize, cap: usize) -> usize {
    if !r.is_enabled() {
        return cap;
    }
    match r.policy {
        Policy::Blocking => reader_space(r, reservation_ptr, cap),
        Policy::Disable | Policy::Skip => cap,
    }
}

/// The largest prefix of `[read_complete_ptr, write_ptr)` that does not cross
/// the buffer end — the continuous readable span handed to a single notify
/// callback.
fn continuous_span(read_complete_ptr: usize, write_ptr: usize, is_full: bool, cap: usize) -> usize {
    if write_ptr <= read_complete_ptr || is_full {
        cap - read_complete_ptr
    } else {
        write_ptr - read_complete_ptr
    }
}

type Jobs<'a, H> = [Option<NotifyJob<'a, H>>; MAX_READERS];
type AbortJobs<'a, H> = [Option<AbortJob<'a, H>>; MAX_READERS];

fn no_jobs<'a, H>() -> Jobs<'a, H> {
    core::array::from_fn(|_| None)
}

fn no_abort_jobs<'a, H>() -> AbortJobs<'a, H> {
    core::array::from_fn(|_| None)
}

struct PhaseA<'a, H> {
    start: usize,
    m: usize,
    abort_jobs: AbortJobs<'a, H>,
}

enum ReaderOpErrorInner {
    UnknownHandle,
    NotDisabled,
}

/// State mutated only from within a [`Port::critical_section`] call.
struct Inner<'a, H> {
    /// First byte not yet reserved for any in-flight write.
    reservation_ptr: usize,
    /// First byte not yet published to readers.
    write_ptr: usize,
    /// Writers currently between reservation and publish.
    ongoing_writes: usize,
    readers: &'a mut [Reader<'a, H>],
}

impl<'a, H: Copy + PartialEq> Inner<'a, H> {
    fn remaining_space(&self, cap: usize) -> usize {
        self.readers
            .iter()
            .map(|r| reader_space(r, self.reservation_ptr, cap))
            .min()
            .unwrap_or(cap)
    }

    fn overwritable_space(&self, cap: usize) -> usize {
        self.readers
            .iter()
            .map(|r| reader_overwritable(r, self.reservation_ptr, cap))
            .min()
            .unwrap_or(cap)
    }

    fn is_full(&self) -> bool {
        self.readers.iter().any(|r| r.is_enabled() && r.is_full)
    }

    /// Forces readers whose free space is below `requested` to give it up,
    /// per their overrun policy. Returns the abort-callback jobs to run once
    /// the caller has left the critical section.
    fn clear_overrun(&mut self, requested: usize, cap: usize) -> AbortJobs<'a, H> {
        let reservation_ptr = self.reservation_ptr;
        let mut jobs = no_abort_jobs();
        for (slot, r) in jobs.iter_mut().zip(self.readers.iter_mut()) {
            if !r.is_enabled() {
                continue;
            }
            let space = reader_space(r, reservation_ptr, cap);
            if space >= requested {
                continue;
            }
            match r.policy {
                Policy::Blocking => {
                    // Not cleared; the writer truncates around it instead.
                }
                Policy::Disable => {
                    if let Some(abort) = r.abort {
                        r.state = State::Disabling;
                        *slot = Some(AbortJob { handle: r.handle, abort });
                    } else {
                        r.state = State::Disabled;
                    }
                }
                Policy::Skip => {
                    if r.state == State::Active {
                        r.state = State::Aborting;
                        r.read_complete_ptr = r.read_ptr;
                        r.is_full = false;
                        // `Reader::new` rejects `Skip` without an abort callback.
                        let abort = r.abort.expect("Skip reader without abort callback");
                        *slot = Some(AbortJob { handle: r.handle, abort });
                    }
                    // Dropping the Active reader's unacknowledged span above
                    // may already have freed enough space on its own; only
                    // advance further if a deficit remains.
                    let current_space = reader_space(r, reservation_ptr, cap);
                    let deficit = requested.saturating_sub(current_space);
                    r.read_complete_ptr = (r.read_complete_ptr + deficit) % cap;
                    // `requested >= 1` always holds here (zero-length writes
                    // never reach `clear_overrun`), so the reader can never
                    // end up owning the entire buffer as a result of this
                    // advance; see DESIGN.md for the reasoning.
                    r.is_full = false;
                }
            }
        }
        jobs
    }

    fn reserve(&mut self, n: usize, cap: usize) -> PhaseA<'a, H> {
        let remaining = self.remaining_space(cap);
        let (m, abort_jobs) = if n <= remaining {
            (n, no_abort_jobs())
        } else {
            let overwritable = self.overwritable_space(cap);
            if overwritable > remaining {
                let requested = n.min(cap);
                let abort_jobs = self.clear_overrun(requested, cap);
                let remaining_after = self.remaining_space(cap);
                (n.min(remaining_after), abort_jobs)
            } else {
                (remaining, no_abort_jobs())
            }
        };

        let start = self.reservation_ptr;
        self.reservation_ptr = (self.reservation_ptr + m) % cap;
        self.ongoing_writes += 1;
        let reservation_ptr = self.reservation_ptr;
        for r in self.readers.iter_mut() {
            if r.is_enabled() {
                r.is_full = reservation_ptr == r.read_complete_ptr;
            }
        }

        PhaseA { start, m, abort_jobs }
    }

    /// Publishes reserved bytes once every concurrent writer has copied its
    /// share in. Returns `None` if publication is deferred to a still-ongoing
    /// concurrent writer.
    fn publish(&mut self, cap: usize) -> Option<Jobs<'a, H>> {
        self.ongoing_writes -= 1;
        if self.ongoing_writes != 0 {
            return None;
        }

        let pre_publish_write_ptr = self.write_ptr;
        self.write_ptr = self.reservation_ptr;
        let write_ptr = self.write_ptr;

        let mut jobs = no_jobs();
        for (slot, r) in jobs.iter_mut().zip(self.readers.iter_mut()) {
            let became_active = match r.state {
                State::Idle => {
                    r.state = State::Active;
                    r.read_complete_ptr = pre_publish_write_ptr;
                    true
                }
                State::Aborted => {
                    r.state = State::Active;
                    true
                }
                _ => false,
            };
            if !became_active {
                continue;
            }
            if r.read_complete_ptr == write_ptr && !r.is_full {
                // Nothing was actually published for this reader (e.g. a
                // concurrent writer reserved 0 bytes); a notify callback must
                // never see an empty slice, so stay idle instead.
                r.state = State::Idle;
                continue;
            }
            let span = continuous_span(r.read_complete_ptr, write_ptr, r.is_full, cap);
            r.read_ptr = (r.read_complete_ptr + span) % cap;
            *slot = Some(NotifyJob {
                handle: r.handle,
                notify: r.notify,
                start: r.read_complete_ptr,
                len: span,
            });
        }
        Some(jobs)
    }

    fn find(&mut self, handle: H) -> Option<&mut Reader<'a, H>> {
        self.readers.iter_mut().find(|r| r.handle == handle)
    }
}

/// The multiple-reader ring buffer.
///
/// The buffer length and the reader set are both caller-provided at
/// construction time; the crate never allocates. There is no persistence and
/// no destructor beyond ordinary `Drop`.
pub struct Mrrb<'a, H, P> {
    buf: &'a [UnsafeCell<MaybeUninit<u8>>],
    inner: UnsafeCell<Inner<'a, H>>,
    port: P,
}

// SAFETY: every field of `Inner` is read or written exclusively from within
// `port.critical_section`, which each `Port` implementation guarantees is
// mutually exclusive across threads/interrupt contexts. `buf` bytes are read
// by at most one outstanding notify at a time per region, and writers only
// ever copy into regions no enabled reader still owns (enforced by the
// reservation protocol), so sharing `&Mrrb` across threads is sound as long
// as `H` itself is `Send` and the port is `Sync`.
unsafe impl<'a, H: Send, P: Sync> Sync for Mrrb<'a, H, P> {}

impl<'a, H: Copy + PartialEq, P: Port> Mrrb<'a, H, P> {
    /// Creates an MRRB over caller-provided buffer and reader storage.
    ///
    /// Readers start `Disabled`; call [`Mrrb::reader_enable`] for each one
    /// that should participate from the start.
    pub fn new(
        buf: &'a [UnsafeCell<MaybeUninit<u8>>],
        readers: &'a mut [Reader<'a, H>],
        port: P,
    ) -> Result<Self, InitError> {
        if buf.is_empty() {
            return Err(InitError::EmptyBuffer);
        }
        if readers.is_empty() {
            return Err(InitError::NoReaders);
        }
        if readers.len() > MAX_READERS {
            return Err(InitError::TooManyReaders);
        }
        Ok(Self {
            buf,
            inner: UnsafeCell::new(Inner {
                reservation_ptr: 0,
                write_ptr: 0,
                ongoing_writes: 0,
                readers,
            }),
            port,
        })
    }

    fn cap(&self) -> usize {
        self.buf.len()
    }

    /// The writer's free space: the minimum, over all enabled readers, of
    /// the space each one still permits the writer to use without forcing an
    /// overrun.
    pub fn remaining_space(&self) -> usize {
        let cap = self.cap();
        self.port
            .critical_section(|| {
                // SAFETY: exclusive access for the duration of this closure.
                unsafe { &*self.inner.get() }.remaining_space(cap)
            })
            .unwrap_or(cap)
    }

    /// The largest write size that could succeed right now, including bytes
    /// a forced overrun would reclaim from Disable/Skip readers.
    pub fn overwritable_space(&self) -> usize {
        let cap = self.cap();
        self.port
            .critical_section(|| unsafe { &*self.inner.get() }.overwritable_space(cap))
            .unwrap_or(cap)
    }

    /// `true` iff no reader holds any byte.
    pub fn is_empty(&self) -> bool {
        self.remaining_space() == self.cap()
    }

    /// `true` iff some enabled reader owns the whole buffer.
    pub fn is_full(&self) -> bool {
        self.port
            .critical_section(|| unsafe { &*self.inner.get() }.is_full())
            .unwrap_or(false)
    }

    /// Copies at most `data.len()` bytes into the ring and returns the
    /// number actually copied.
    ///
    /// Zero-length writes, and writes from an interrupt context when
    /// `allow-write-from-isr` is not enabled, return `Ok(0)` without
    /// mutating anything; neither is treated as an error.
    pub fn write(&self, data: &[u8]) -> Result<usize, MrrbError<P::Error>> {
        if data.is_empty() {
            return Ok(0);
        }
        if self.port.in_interrupt() && !cfg!(feature = "allow-write-from-isr") {
            return Ok(0);
        }

        let cap = self.cap();
        let phase_a = self
            .port
            .critical_section(|| unsafe { &mut *self.inner.get() }.reserve(data.len(), cap))
            .map_err(MrrbError::Port)?;

        for job in phase_a.abort_jobs.iter().flatten() {
            (job.abort)(job.handle);
        }
        self.port.fence();

        if phase_a.m > 0 {
            // SAFETY: `reserve` only ever returns a `start`/`m` pair that
            // falls within a region no enabled reader still owns.
            unsafe { self.copy_in(phase_a.start, &data[..phase_a.m]) };
        }
        self.port.fence();

        let notify_jobs = self
            .port
            .critical_section(|| unsafe { &mut *self.inner.get() }.publish(cap))
            .map_err(MrrbError::Port)?;

        if let Some(jobs) = notify_jobs {
            for job in jobs.iter().flatten() {
                // SAFETY: `publish` computed `len` as a continuous span, so
                // it never crosses the buffer end; the region belongs to this
                // reader until it calls `read_complete`/`abort_complete`.
                let slice = unsafe { self.slice_at(job.start, job.len) };
                (job.notify)(job.handle, slice);
            }
        }

        Ok(phase_a.m)
    }

    /// Marks the bytes most recently handed to `handle`'s notify callback as
    /// consumed. No-op if `handle` is unknown or the reader is not `Active`.
    pub fn read_complete(&self, handle: H) -> Result<(), P::Error> {
        let cap = self.cap();
        let job = self.port.critical_section(|| {
            let inner = unsafe { &mut *self.inner.get() };
            let write_ptr = inner.write_ptr;
            let Some(r) = inner.find(handle) else { return None };
            if r.state != State::Active {
                return None;
            }
            r.read_complete_ptr = r.read_ptr;
            r.is_full = false;
            if r.read_complete_ptr == write_ptr {
                r.state = State::Idle;
                None
            } else {
                let span = continuous_span(r.read_complete_ptr, write_ptr, r.is_full, cap);
                r.read_ptr = (r.read_complete_ptr + span) % cap;
                Some(NotifyJob { handle: r.handle, notify: r.notify, start: r.read_complete_ptr, len: span })
            }
        })?;
        if let Some(job) = job {
            (job.notify)(job.handle, unsafe { self.slice_at(job.start, job.len) });
        }
        Ok(())
    }

    /// Acknowledges that an in-flight notify/abort callback for `handle` has
    /// returned. No-op if `handle` is unknown or the reader is not
    /// `Disabling`/`Aborting`.
    pub fn abort_complete(&self, handle: H) -> Result<(), P::Error> {
        let cap = self.cap();
        let job = self.port.critical_section(|| {
            let inner = unsafe { &mut *self.inner.get() };
            let write_ptr = inner.write_ptr;
            let ongoing_writes = inner.ongoing_writes;
            let Some(r) = inner.find(handle) else { return None };
            match r.state {
                State::Disabling => {
                    r.state = State::Disabled;
                    None
                }
                State::Aborting => {
                    if r.read_complete_ptr != write_ptr && ongoing_writes == 0 {
                        let span = continuous_span(r.read_complete_ptr, write_ptr, r.is_full, cap);
                        r.read_ptr = (r.read_complete_ptr + span) % cap;
                        r.state = State::Active;
                        Some(NotifyJob { handle: r.handle, notify: r.notify, start: r.read_complete_ptr, len: span })
                    } else {
                        r.state = State::Aborted;
                        None
                    }
                }
                _ => None,
            }
        })?;
        if let Some(job) = job {
            (job.notify)(job.handle, unsafe { self.slice_at(job.start, job.len) });
        }
        Ok(())
    }

    /// Re-seats `handle`'s cursors onto the current reservation point and
    /// moves it from `Disabled` to `Idle`.
    pub fn reader_enable(&self, handle: H) -> Result<(), ReaderOpError<P::Error>> {
        self.port
            .critical_section(|| {
                let inner = unsafe { &mut *self.inner.get() };
                let reservation_ptr = inner.reservation_ptr;
                match inner.find(handle) {
                    None => Err(ReaderOpErrorInner::UnknownHandle),
                    Some(r) if r.state != State::Disabled => Err(ReaderOpErrorInner::NotDisabled),
                    Some(r) => {
                        r.read_ptr = reservation_ptr;
                        r.read_complete_ptr = reservation_ptr;
                        r.is_full = false;
                        r.state = State::Idle;
                        Ok(())
                    }
                }
            })
            .map_err(ReaderOpError::Port)?
            .map_err(|e| match e {
                ReaderOpErrorInner::UnknownHandle => ReaderOpError::UnknownHandle,
                ReaderOpErrorInner::NotDisabled => ReaderOpError::NotDisabled,
            })
    }

    /// Moves `handle` out of service. If it has an abort callback, transitions
    /// through `Disabling` and the callback is invoked once unlocked;
    /// otherwise goes straight to `Disabled`. No-op if already
    /// `Disabled`/`Disabling`.
    pub fn reader_disable(&self, handle: H) -> Result<(), ReaderOpError<P::Error>> {
        let result = self.port.critical_section(|| {
            let inner = unsafe { &mut *self.inner.get() };
            match inner.find(handle) {
                None => Err(ReaderOpErrorInner::UnknownHandle),
                Some(r) => {
                    let job = match r.state {
                        State::Disabled | State::Disabling => None,
                        _ => match r.abort {
                            Some(abort) => {
                                r.state = State::Disabling;
                                Some(AbortJob { handle: r.handle, abort })
                            }
                            None => {
                                r.state = State::Disabled;
                                None
                            }
                        },
                    };
                    Ok(job)
                }
            }
        });
        let job = result
            .map_err(ReaderOpError::Port)?
            .map_err(|e| match e {
                ReaderOpErrorInner::UnknownHandle => ReaderOpError::UnknownHandle,
                ReaderOpErrorInner::NotDisabled => ReaderOpError::NotDisabled,
            })?;
        if let Some(job) = job {
            (job.abort)(job.handle);
        }
        Ok(())
    }

    /// Copies `data` into the ring starting at `start`, wrapping at the
    /// buffer end with (at most) two `memcpy`s.
    ///
    /// # Safety
    ///
    /// `start..start+data.len()` (mod `cap`) must not overlap a region any
    /// enabled reader still owns.
    unsafe fn copy_in(&self, start: usize, data: &[u8]) {
        let cap = self.buf.len();
        let dst: *mut u8 = self.buf.as_ptr().cast_mut().cast();
        let len = data.len();
        if start + len > cap {
            let pivot = cap - start;
            // SAFETY: both ranges are sub-slices of `buf`/`data`; see the
            // caller's safety contract for non-overlap.
            unsafe {
                ptr::copy_nonoverlapping(data.as_ptr(), dst.add(start), pivot);
                ptr::copy_nonoverlapping(data.as_ptr().add(pivot), dst, len - pivot);
            }
        } else {
            // SAFETY: as above.
            unsafe { ptr::copy_nonoverlapping(data.as_ptr(), dst.add(start), len) };
        }
    }

    /// Borrows `len` bytes starting at `start`, never wrapping (callers only
    /// ever pass spans computed by [`continuous_span`]).
    ///
    /// # Safety
    ///
    /// `start..start+len` must lie within `buf` and must not be concurrently
    /// written by a writer.
    unsafe fn slice_at(&self, start: usize, len: usize) -> &[u8] {
        let ptr: *const u8 = self.buf.as_ptr().cast();
        // SAFETY: per caller's contract.
        unsafe { slice::from_raw_parts(ptr.add(start), len) }
    }
}

#[cfg(all(test, feature = "std"))]
mod test {
    use super::*;
    use crate::port::HostedPort;
    use crate::reader::Reader;
    use std::cell::UnsafeCell as StdUnsafeCell;
    use std::mem::MaybeUninit as StdMaybeUninit;
    use std::sync::Mutex;

    fn buf(n: usize) -> Vec<StdUnsafeCell<StdMaybeUninit<u8>>> {
        (0..n).map(|_| StdUnsafeCell::new(StdMaybeUninit::uninit())).collect()
    }

    fn sink() -> Mutex<Vec<u8>> {
        Mutex::new(Vec::new())
    }

    fn collecting_notify(sink: &Mutex<Vec<u8>>) -> impl Fn(u32, &[u8]) + Sync + '_ {
        move |_h, bytes| sink.lock().unwrap().extend_from_slice(bytes)
    }

    #[test]
    fn single_reader_immediate_complete() {
        let b = buf(128);
        let out = sink();
        let notify = collecting_notify(&out);
        let complete_notify = &notify;
        // A reader that completes synchronously inside its own notify.
        let mrrb_cell: std::cell::Cell<Option<&Mrrb<u32, HostedPort>>> = std::cell::Cell::new(None);
        let notify_and_complete = |h: u32, bytes: &[u8]| {
            complete_notify(h, bytes);
            if let Some(m) = mrrb_cell.get() {
                m.read_complete(h).unwrap();
            }
        };
        let mut readers = vec![Reader::new(1u32, Policy::Blocking, &notify_and_complete, None).unwrap()];
        let mrrb = Mrrb::new(&b, &mut readers, HostedPort::new()).unwrap();
        mrrb_cell.set(Some(&mrrb));
        mrrb.reader_enable(1).unwrap();

        let mut text = Vec::new();
        for i in 0..450u32 {
            text.push((i % 256) as u8);
        }
        let lens = [1usize, 2, 5, 15, 105, 128, 59, 128];
        let mut offset = 0;
        for &len in &lens {
            let chunk = &text[offset..offset + len];
            let m = mrrb.write(chunk).unwrap();
            assert_eq!(m, len);
            offset += len;
            assert!(mrrb.is_empty());
        }
        assert_eq!(*out.lock().unwrap(), text);
    }

    #[test]
    fn single_reader_triggered_wrap() {
        let b = buf(16);
        let out = sink();
        let notify = collecting_notify(&out);
        let mut readers = vec![Reader::new(1u32, Policy::Blocking, &notify, None).unwrap()];
        let mrrb = Mrrb::new(&b, &mut readers, HostedPort::new()).unwrap();
        mrrb.reader_enable(1).unwrap();

        let m = mrrb.write(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]).unwrap();
        assert_eq!(m, 12);
        assert!(!mrrb.is_empty());
        mrrb.read_complete(1).unwrap();
        assert!(mrrb.is_empty());

        // Second write wraps past the buffer end (len=16): the continuous
        // span only reaches the buffer end, so draining it takes two
        // completions — one for the pre-wrap tail, one for the wrapped head.
        let m = mrrb.write(&[13, 14, 15, 16, 17, 18]).unwrap();
        assert_eq!(m, 6);
        mrrb.read_complete(1).unwrap();
        mrrb.read_complete(1).unwrap();
        assert!(mrrb.is_empty());
        assert_eq!(*out.lock().unwrap(), (1..=18).collect::<Vec<u8>>());
    }

    #[test]
    fn write_exactly_buffer_length() {
        let b = buf(8);
        let out = sink();
        let notify = collecting_notify(&out);
        let mut readers = vec![Reader::new(1u32, Policy::Blocking, &notify, None).unwrap()];
        let mrrb = Mrrb::new(&b, &mut readers, HostedPort::new()).unwrap();
        mrrb.reader_enable(1).unwrap();

        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        let m = mrrb.write(&data).unwrap();
        assert_eq!(m, 8);
        assert!(mrrb.is_full());
        mrrb.read_complete(1).unwrap();
        assert!(mrrb.is_empty());
        assert_eq!(*out.lock().unwrap(), data);
    }

    #[test]
    fn single_byte_buffer() {
        let b = buf(1);
        let out = sink();
        let notify = collecting_notify(&out);
        let mut readers = vec![Reader::new(1u32, Policy::Blocking, &notify, None).unwrap()];
        let mrrb = Mrrb::new(&b, &mut readers, HostedPort::new()).unwrap();
        mrrb.reader_enable(1).unwrap();

        assert_eq!(mrrb.write(&[9]).unwrap(), 1);
        assert!(mrrb.is_full());
        mrrb.read_complete(1).unwrap();
        assert!(mrrb.is_empty());
        assert_eq!(mrrb.write(&[10, 11]).unwrap(), 1);
        mrrb.read_complete(1).unwrap();
        assert_eq!(*out.lock().unwrap(), vec![9, 10]);
    }

    #[test]
    fn zero_length_write_is_noop() {
        let b = buf(8);
        let out = sink();
        let notify = collecting_notify(&out);
        let mut readers = vec![Reader::new(1u32, Policy::Blocking, &notify, None).unwrap()];
        let mrrb = Mrrb::new(&b, &mut readers, HostedPort::new()).unwrap();
        mrrb.reader_enable(1).unwrap();

        assert_eq!(mrrb.write(&[]).unwrap(), 0);
        assert!(mrrb.is_empty());
        assert!(out.lock().unwrap().is_empty());
    }

    #[test]
    fn blocking_reader_truncates_on_overrun() {
        let b = buf(8);
        let out = sink();
        let notify = collecting_notify(&out);
        let mut readers = vec![Reader::new(1u32, Policy::Blocking, &notify, None).unwrap()];
        let mrrb = Mrrb::new(&b, &mut readers, HostedPort::new()).unwrap();
        mrrb.reader_enable(1).unwrap();

        assert_eq!(mrrb.write(&[1, 2, 3, 4, 5, 6]).unwrap(), 6);
        // Reader hasn't completed; only 2 bytes of free space remain.
        assert_eq!(mrrb.write(&[7, 8, 9, 10]).unwrap(), 2);
    }

    #[test]
    fn disable_reader_on_overrun() {
        let b = buf(8);
        let out = sink();
        let notify = collecting_notify(&out);
        let disabled = std::sync::atomic::AtomicBool::new(false);
        let abort = |_h: u32| disabled.store(true, std::sync::atomic::Ordering::SeqCst);
        let mut readers = vec![Reader::new(1u32, Policy::Disable, &notify, Some(&abort)).unwrap()];
        let mrrb = Mrrb::new(&b, &mut readers, HostedPort::new()).unwrap();
        mrrb.reader_enable(1).unwrap();

        assert_eq!(mrrb.write(&[1, 2, 3, 4, 5, 6]).unwrap(), 6);
        assert_eq!(mrrb.write(&[7, 8, 9, 10]).unwrap(), 4);
        assert!(disabled.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn skip_reader_advances_past_deficit() {
        let b = buf(8);
        let out = sink();
        let notify = collecting_notify(&out);
        let aborted = std::sync::atomic::AtomicBool::new(false);
        let abort = |_h: u32| aborted.store(true, std::sync::atomic::Ordering::SeqCst);
        let mut readers = vec![Reader::new(1u32, Policy::Skip, &notify, Some(&abort)).unwrap()];
        let mrrb = Mrrb::new(&b, &mut readers, HostedPort::new()).unwrap();
        mrrb.reader_enable(1).unwrap();

        assert_eq!(mrrb.write(&[1, 2, 3, 4, 5, 6]).unwrap(), 6);
        // The first write's notify ran synchronously and left the reader
        // Active with 6 unacknowledged bytes; a second write that needs more
        // space than is free aborts those bytes outright instead of blocking.
        assert_eq!(mrrb.write(&[7, 8, 9, 10]).unwrap(), 4);
        assert!(aborted.load(std::sync::atomic::Ordering::SeqCst));
        assert!(mrrb.remaining_space() >= 4);
    }

    #[test]
    fn mixed_policy_three_readers_overrun() {
        let b = buf(128);
        let out_b = sink();
        let out_d = sink();
        let out_s = sink();
        let notify_b = collecting_notify(&out_b);
        let notify_d = collecting_notify(&out_d);
        let notify_s = collecting_notify(&out_s);
        let abort_d = |_h: u32| {};
        let abort_s = |_h: u32| {};
        let mut readers = vec![
            Reader::new(1u32, Policy::Blocking, &notify_b, None).unwrap(),
            Reader::new(2u32, Policy::Disable, &notify_d, Some(&abort_d)).unwrap(),
            Reader::new(3u32, Policy::Skip, &notify_s, Some(&abort_s)).unwrap(),
        ];
        let mrrb = Mrrb::new(&b, &mut readers, HostedPort::new()).unwrap();
        mrrb.reader_enable(1).unwrap();
        mrrb.reader_enable(2).unwrap();
        mrrb.reader_enable(3).unwrap();

        assert_eq!(mrrb.write(&[0u8; 118]).unwrap(), 118);
        assert_eq!(mrrb.write(&[0u8; 20]).unwrap(), 10);
    }

    #[test]
    fn enable_disable_churn_seats_cursor_on_reservation() {
        let b = buf(16);
        let out = sink();
        let notify = collecting_notify(&out);
        let mut readers = vec![Reader::new(1u32, Policy::Blocking, &notify, None).unwrap()];
        let mrrb = Mrrb::new(&b, &mut readers, HostedPort::new()).unwrap();

        assert_eq!(mrrb.write(&[1, 2, 3]).unwrap(), 3);
        mrrb.reader_enable(1).unwrap();
        assert_eq!(mrrb.remaining_space(), 16);
        assert_eq!(mrrb.write(&[4, 5]).unwrap(), 2);
        mrrb.read_complete(1).unwrap();
        assert_eq!(*out.lock().unwrap(), vec![4, 5]);
        mrrb.reader_disable(1).unwrap();
        assert_eq!(mrrb.write(&[6, 7]).unwrap(), 2);
        mrrb.reader_enable(1).unwrap();
        assert!(mrrb.is_empty());
    }
}
