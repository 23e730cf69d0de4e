//! The pluggable execution-environment abstraction.
//!
//! A [`Port`] supplies the one thing the MRRB core needs from its host: a
//! fallible, closure-scoped critical section, a predicate for whether the
//! calling context is an interrupt handler, and a memory fence. Two concrete
//! ports are provided, selected at compile time via Cargo features:
//!
//! - [`HostedPort`] (`std` feature): backed by `std::sync::Mutex`.
//! - [`CriticalSectionPort`] (`critical-section` feature): backed by global
//!   interrupt masking, via `critical_section::acquire`/`release`.

/// Abstracts the execution environment's mutual-exclusion, interrupt-context
/// detection, and memory-fence primitives.
///
/// All mutation of [`crate::Mrrb`] state happens inside [`Port::critical_section`].
/// Implementations must ensure that at most one closure passed to
/// `critical_section` runs at a time across all threads/interrupt contexts
/// sharing this port.
pub trait Port {
    /// The failure mode of this port's critical section, if any.
    type Error: core::fmt::Debug;

    /// Runs `f` with exclusive access to the MRRB's internal state.
    ///
    /// Must not be called reentrantly by `f` itself; reentrant use (e.g. a
    /// notify callback calling back into the MRRB) is expected to happen
    /// *after* this function returns, never from within `f`.
    fn critical_section<R>(&self, f: impl FnOnce() -> R) -> Result<R, Self::Error>;

    /// Reports whether the caller is currently running in an interrupt
    /// handler. Hosted ports have no such concept and always report `false`.
    fn in_interrupt(&self) -> bool;

    /// Issues a memory fence.
    ///
    /// The critical section itself already establishes a happens-before edge
    /// (lock/unlock on a real mutex, or interrupt mask/restore, both order
    /// memory the same way an explicit fence would). This is called anyway
    /// at the Phase A/B and B/C boundaries of [`crate::Mrrb::write`] as
    /// defense in depth.
    fn fence(&self);
}

#[cfg(feature = "std")]
mod hosted {
    use super::Port;
    use std::sync::Mutex;

    /// Hosted port backed by a per-instance [`std::sync::Mutex`].
    ///
    /// There is no interrupt context on a hosted target, so
    /// [`Port::in_interrupt`] always reports `false` and writes are never
    /// rejected on that basis.
    pub struct HostedPort {
        lock: Mutex<()>,
    }

    impl HostedPort {
        /// Creates a new, unlocked hosted port.
        pub const fn new() -> Self {
            Self { lock: Mutex::new(()) }
        }
    }

    impl Default for HostedPort {
        fn default() -> Self {
            Self::new()
        }
    }

    /// A [`HostedPort`]'s underlying mutex was poisoned by a panic while
    /// held, i.e. while a prior call into the MRRB was unwinding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PoisonError;

    impl Port for HostedPort {
        type Error = PoisonError;

        fn critical_section<R>(&self, f: impl FnOnce() -> R) -> Result<R, Self::Error> {
            let _guard = self.lock.lock().map_err(|_| PoisonError)?;
            Ok(f())
        }

        fn in_interrupt(&self) -> bool {
            false
        }

        fn fence(&self) {
            std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
        }
    }
}

#[cfg(feature = "std")]
pub use hosted::{HostedPort, PoisonError};

#[cfg(feature = "critical-section")]
mod bare_metal {
    use super::Port;
    use core::convert::Infallible;

    /// Bare-metal port backed by global interrupt masking, via the
    /// `critical-section` crate.
    ///
    /// `critical_section::acquire()` returns a
    /// [`critical_section::RestoreState`] that is handed back to
    /// `critical_section::release` once the section ends. Bare-metal
    /// critical sections cannot fail, so `Error` is [`Infallible`].
    ///
    /// There is no portable "am I in an interrupt handler" primitive across
    /// architectures, so the predicate is supplied by the embedder as a
    /// plain `fn`.
    pub struct CriticalSectionPort {
        in_interrupt: fn() -> bool,
    }

    impl CriticalSectionPort {
        /// Creates a bare-metal port. `in_interrupt` should return whether
        /// the calling context is an interrupt/exception handler (e.g. via
        /// `cortex_m::peripheral::SCB::vect_active()` on Cortex-M); pass
        /// `|| false` on single-core targets with no ISR-driven writers.
        pub const fn new(in_interrupt: fn() -> bool) -> Self {
            Self { in_interrupt }
        }
    }

    impl Port for CriticalSectionPort {
        type Error = Infallible;

        fn critical_section<R>(&self, f: impl FnOnce() -> R) -> Result<R, Self::Error> {
            // SAFETY: paired with `critical_section::release` below before
            // this function returns; `f` does not itself re-enter a critical
            // section (upheld by callers within this crate).
            let restore = unsafe { critical_section::acquire() };
            let r = f();
            // SAFETY: `restore` is the token just returned by the matching
            // `acquire` above.
            unsafe { critical_section::release(restore) };
            Ok(r)
        }

        fn in_interrupt(&self) -> bool {
            (self.in_interrupt)()
        }

        fn fence(&self) {
            core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
        }
    }
}

#[cfg(feature = "critical-section")]
pub use bare_metal::CriticalSectionPort;
