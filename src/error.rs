//! Error types returned by the public API.

/// Error returned by [`crate::Reader::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReaderInitError {
    /// [`crate::reader::Policy::Skip`] requires an abort callback.
    AbortRequiredForSkip,
}

/// Error returned by [`crate::Mrrb::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// The backing buffer has zero length.
    EmptyBuffer,
    /// No readers were supplied.
    NoReaders,
    /// More readers were supplied than [`crate::reader::MAX_READERS`].
    TooManyReaders,
}

/// Error returned by [`crate::Mrrb::reader_enable`] / [`crate::Mrrb::reader_disable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReaderOpError<E> {
    /// No reader with this handle is known to the MRRB.
    UnknownHandle,
    /// `reader_enable` was called on a reader that was not `Disabled`.
    NotDisabled,
    /// The port's critical section failed.
    Port(E),
}

/// Error returned by [`crate::Mrrb::write`].
///
/// Zero-length writes and disallowed writes-from-ISR are not treated as
/// errors — both return `Ok(0)`. The only failure mode the core itself can
/// produce is a port (lock) failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MrrbError<E> {
    /// The port's critical section failed.
    Port(E),
}
