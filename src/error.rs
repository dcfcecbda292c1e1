//! Error types for the audio core (spec §7).

/// Control-transfer faults that map to a STALL on EP0 (spec §7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlError {
    /// SET_INTERFACE named an alternate setting this interface doesn't have.
    InvalidAltSetting,
    /// A class-specific request targeted a control unit/selector we don't
    /// implement (anything but the streaming Mute control).
    UnsupportedControl,
    /// SET_CUR payload didn't match the expected length for the control.
    MalformedPayload,
}

/// Errors from bringing up the playback engine (spec §7, §6 [ADDED]).
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError<E> {
    /// A `StaticCell` backing a static buffer was already taken.
    OutOfMemory,
    /// The concrete `PlaybackEngine` failed to initialize.
    EngineInit(E),
}
