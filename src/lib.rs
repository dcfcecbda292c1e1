//! Core of a USB Audio Class 1.0 speaker device: a ring buffer and
//! explicit-feedback control loop coupling a USB isochronous OUT stream, an
//! I2S/DMA playback engine, and a USB feedback endpoint.
//!
//! Built on `embassy-usb`'s low-level driver traits rather than its
//! `class::uac1::speaker` convenience class, so the ring buffer (`ring`)
//! and feedback algorithm (`feedback`) this crate exists to implement stay
//! in this crate instead of a dependency.
#![cfg_attr(not(test), no_std)]

pub mod class;
pub mod control;
pub mod dac;
pub mod descriptors;
pub mod error;
pub mod feedback;
pub mod ring;

#[cfg(not(test))]
pub mod board;

pub use feedback::SampleRate;

/// Active sample rate, fixed at compile time by a Cargo feature (spec.md
/// Non-goals: "multiple runtime sample rates" is explicitly out of scope).
#[cfg(all(feature = "rate-44100", not(feature = "rate-48000"), not(feature = "rate-96000")))]
pub const SAMPLE_RATE: SampleRate = SampleRate::Hz44100;
#[cfg(all(feature = "rate-96000", not(feature = "rate-44100")))]
pub const SAMPLE_RATE: SampleRate = SampleRate::Hz96000;
#[cfg(all(
    feature = "rate-48000",
    not(feature = "rate-44100"),
    not(feature = "rate-96000")
))]
pub const SAMPLE_RATE: SampleRate = SampleRate::Hz48000;

/// Bytes per millisecond of stereo 16-bit PCM at [`SAMPLE_RATE`]; also the
/// maximum isochronous OUT packet size (spec §6 `AUDIO_OUT_PACKET`).
pub const AUDIO_OUT_PACKET: usize = (SAMPLE_RATE.hz() as usize * 4) / 1000;

/// Ring buffer size: ten milliseconds of audio (spec §3 `AUDIO_TOTAL_BUF_SIZE`).
pub const AUDIO_TOTAL_BUF_SIZE: usize = AUDIO_OUT_PACKET * 10;

pub type Core = control::AudioCore<AUDIO_TOTAL_BUF_SIZE, AUDIO_OUT_PACKET>;
pub type Ring = ring::RingBuffer<AUDIO_TOTAL_BUF_SIZE, AUDIO_OUT_PACKET>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_out_packet_is_192_bytes_at_48khz() {
        assert_eq!(AUDIO_OUT_PACKET, 192);
        assert_eq!(AUDIO_TOTAL_BUF_SIZE, 1920);
    }
}
