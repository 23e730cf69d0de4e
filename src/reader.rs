//! Per-reader state and FSM.

use crate::error::ReaderInitError;

/// Upper bound on the number of readers a single [`crate::Mrrb`] may hold.
///
/// The publish and overrun-clearing paths build a fixed-size, on-stack array
/// of deferred notify/abort jobs while the critical section is held; this
/// bounds reader count to that array's length. 64 independently-paced sinks
/// is generous for the embedded targets this crate is written for; raise
/// this if a future target genuinely needs more.
pub const MAX_READERS: usize = 64;

/// What a reader's write-time overrun should do to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Policy {
    /// Never cleared; the writer truncates instead.
    Blocking,
    /// Disabled outright (via its abort callback if it has one).
    Disable,
    /// Finishes its in-flight notify, then has its unread bytes silently
    /// dropped. Requires an abort callback.
    Skip,
}

/// A reader's position in its lifecycle FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Not participating; contributes no constraint on reclamation.
    Disabled,
    /// No notify outstanding.
    Idle,
    /// A notify is outstanding with the reader.
    Active,
    /// Finishing an in-flight notify after a SKIP overrun.
    Aborting,
    /// Transient: the reader's last notify was aborted, not completed; the
    /// next publish moves it back to `Active` with a fresh notify.
    Aborted,
    /// Disabled, but its abort callback is still in flight.
    Disabling,
}

/// Bytes owned, at some instant, by a single reader.
///
/// Produced internally by the publish/overrun paths; the MRRB invokes
/// `notify`/`abort` with the handle from this job only after releasing its
/// critical section, since callbacks must never run under the lock.
pub(crate) struct NotifyJob<'a, H> {
    pub(crate) handle: H,
    pub(crate) notify: NotifyFn<'a, H>,
    pub(crate) start: usize,
    pub(crate) len: usize,
}

pub(crate) struct AbortJob<'a, H> {
    pub(crate) handle: H,
    pub(crate) abort: AbortFn<'a, H>,
}

/// A reader's notify callback: `fn(handle, bytes)`, `bytes.len() >= 1`.
///
/// Modeled as a borrowed `dyn Fn` rather than a raw `fn` pointer plus an
/// opaque context pointer, so a retarget shim can close over its own sink
/// state directly.
pub type NotifyFn<'a, H> = &'a (dyn Fn(H, &[u8]) + Sync);

/// A reader's abort callback: `fn(handle)`.
pub type AbortFn<'a, H> = &'a (dyn Fn(H) + Sync);

/// One consumer of the MRRB's byte stream.
///
/// Constructed with [`Reader::new`], then registered with a [`crate::Mrrb`]
/// at construction time and brought up with [`crate::Mrrb::reader_enable`].
pub struct Reader<'a, H> {
    pub(crate) handle: H,
    pub(crate) notify: NotifyFn<'a, H>,
    pub(crate) abort: Option<AbortFn<'a, H>>,
    pub(crate) policy: Policy,
    pub(crate) state: State,
    /// End of the slice most recently handed to `notify`.
    pub(crate) read_ptr: usize,
    /// First byte this reader still owes a `read_complete`/`abort_complete`.
    pub(crate) read_complete_ptr: usize,
    /// Disambiguates `read_complete_ptr == reservation_ptr` meaning "owns
    /// nothing" from "owns the whole buffer".
    pub(crate) is_full: bool,
}

impl<'a, H: Copy + PartialEq> Reader<'a, H> {
    /// Creates a reader, initially [`State::Disabled`].
    ///
    /// `abort` is required when `policy` is [`Policy::Skip`]; any other
    /// policy may supply an abort callback too ([`Policy::Disable`] uses it
    /// if present).
    pub fn new(
        handle: H,
        policy: Policy,
        notify: NotifyFn<'a, H>,
        abort: Option<AbortFn<'a, H>>,
    ) -> Result<Self, ReaderInitError> {
        if policy == Policy::Skip && abort.is_none() {
            return Err(ReaderInitError::AbortRequiredForSkip);
        }
        Ok(Self {
            handle,
            notify,
            abort,
            policy,
            state: State::Disabled,
            read_ptr: 0,
            read_complete_ptr: 0,
            is_full: false,
        })
    }

    /// The handle this reader was constructed with.
    pub fn handle(&self) -> H {
        self.handle
    }

    /// This reader's current FSM state.
    pub fn state(&self) -> State {
        self.state
    }

    pub(crate) fn is_enabled(&self) -> bool {
        !matches!(self.state, State::Disabled | State::Disabling)
    }
}
