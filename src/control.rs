//! USB Audio Class control-transfer state machine (spec §4.D) and the
//! `AudioCore` aggregate (spec §3 [ADDED]) tying the ring buffer, feedback
//! controller and global flags together behind one critical section.

use crate::error::ControlError;
use crate::feedback::{FeedbackController, SampleRate};
use crate::ring::{Ingest, RingBuffer};

/// bRequest values used on the AC/AS interfaces (spec §4.D, §6).
pub const REQ_SET_CUR: u8 = 0x01;
pub const REQ_GET_CUR: u8 = 0x81;

/// Control selector for the Feature Unit's Mute control (spec §4.D "class-
/// specific Mute requests"). The unit ID is carried in the request's high
/// index byte; this is the only control selector this core implements.
pub const MUTE_CONTROL_SELECTOR: u8 = 0x01;

/// What the caller must do with the playback engine as a result of a state
/// transition. `AudioCore`'s methods are pure; actually calling into
/// `PlaybackEngine` (async, hardware-touching) is the caller's job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineAction {
    /// Nothing changed.
    None,
    /// Alt-setting dropped to 0 (or device reset): tear down the engine.
    Deinit,
    /// Alt-setting switched to 1: engine should be initialized and the
    /// feedback endpoint armed, but playback itself starts once the ring
    /// reaches the half-full mark (`DataOut::StartPlayback`).
    Armed,
    /// SET_CUR on the Mute control: caller must call
    /// `PlaybackEngine::mute_ctl(on)`. The core keeps no mute state of its
    /// own (spec §4.D): the DAC is the only place mute state lives.
    Mute(bool),
}

/// Outcome of feeding one isochronous OUT packet into the ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataOutOutcome {
    /// Interface isn't in the operational alt setting; packet ignored.
    NotReady,
    /// Packet copied into the ring.
    Written,
    /// Packet was malformed (wrong alignment or oversize) and dropped.
    Dropped,
    /// Packet copied and the ring just crossed the half-full mark: the
    /// caller must now call `PlaybackEngine::audio_cmd(.., START)`.
    StartPlayback,
}

/// Aggregate audio core state: ring buffer, feedback controller and
/// alt-setting, all owned by one struct so a single critical section guards
/// every field a USB/SOF interrupt context needs to touch. No mute state
/// lives here (spec §4.D): Mute is write-only through to the DAC.
pub struct AudioCore<const TOTAL: usize, const MAX_PACKET: usize> {
    pub ring: RingBuffer<TOTAL, MAX_PACKET>,
    pub feedback: FeedbackController,
    alt_setting: u8,
    all_ready: bool,
}

impl<const TOTAL: usize, const MAX_PACKET: usize> AudioCore<TOTAL, MAX_PACKET> {
    pub const SET_POINT: u32 = (TOTAL / 12) as u32;

    pub fn new(rate: SampleRate) -> Self {
        Self {
            ring: RingBuffer::new(),
            feedback: FeedbackController::new(rate),
            alt_setting: 0,
            all_ready: false,
        }
    }

    pub fn alt_setting(&self) -> u8 {
        self.alt_setting
    }

    pub fn all_ready(&self) -> bool {
        self.all_ready
    }

    /// SET_INTERFACE(alt) on the AS interface (spec §4.D). `alt` must be 0
    /// or 1; anything else STALLs.
    pub fn set_interface(&mut self, alt: u8) -> Result<EngineAction, ControlError> {
        if alt > 1 {
            return Err(ControlError::InvalidAltSetting);
        }
        self.ring.reset();
        self.feedback.reset();
        self.all_ready = false;
        self.alt_setting = alt;
        if alt == 0 {
            Ok(EngineAction::Deinit)
        } else {
            self.all_ready = true;
            Ok(EngineAction::Armed)
        }
    }

    /// Feed one isochronous OUT packet (spec §4.A, §4.E `DataOut`).
    pub fn data_out(&mut self, packet: &[u8]) -> DataOutOutcome {
        if !self.all_ready {
            return DataOutOutcome::NotReady;
        }
        match self.ring.ingest(packet) {
            Ingest::Dropped => DataOutOutcome::Dropped,
            Ingest::Written => DataOutOutcome::Written,
            Ingest::WrittenReachedHalf => DataOutOutcome::StartPlayback,
        }
    }

    /// Once-per-SOF feedback tick (spec §4.C, §4.E). `rd` is the consumer
    /// offset derived from `PlaybackEngine::writable_from`; `fnsof` is the
    /// current USB frame number.
    pub fn sof_tick(&mut self, rd: u32, fnsof: u16) -> Option<[u8; 3]> {
        if !self.all_ready || !self.ring.rd_enable() {
            return None;
        }
        let writable = self.ring.writable_samples(rd);
        self.feedback.compute(writable, Self::SET_POINT);
        if self.feedback.should_transmit(fnsof) {
            self.feedback.mark_submitted();
            Some(self.feedback.packet())
        } else {
            None
        }
    }

    /// `DataIn` on the feedback endpoint: the host has taken our packet.
    pub fn feedback_sent(&mut self) {
        self.feedback.mark_acknowledged();
    }

    /// `IsoInIncomplete`. Returns whether the caller must flush the EP.
    pub fn iso_in_incomplete(&mut self, fnsof_now: u16) -> bool {
        self.feedback.on_iso_in_incomplete(fnsof_now)
    }

    /// `IsoOutIncomplete` (spec §4.E): re-arm the OUT endpoint at the
    /// current write offset; no state changes beyond that (the caller uses
    /// `self.ring.wr()` to know where to re-post the receive buffer).
    pub fn iso_out_incomplete(&self) -> u32 {
        self.ring.wr()
    }

    /// SET_CUR on the streaming Feature Unit's Mute control (spec §4.D).
    /// `unit` is the high byte of wIndex; only `MUTE_CONTROL_SELECTOR` (the
    /// high byte of wValue) on a recognized unit is accepted. The core keeps
    /// no mute state of its own: the caller must act on the returned
    /// `EngineAction::Mute` by calling `PlaybackEngine::mute_ctl`.
    pub fn set_cur(
        &mut self,
        control_selector: u8,
        _unit: u8,
        data: &[u8],
    ) -> Result<EngineAction, ControlError> {
        if control_selector != MUTE_CONTROL_SELECTOR {
            return Err(ControlError::UnsupportedControl);
        }
        if data.is_empty() {
            return Err(ControlError::MalformedPayload);
        }
        Ok(EngineAction::Mute(data[0] != 0))
    }

    /// GET_CUR on the streaming Feature Unit's Mute control (spec §4.D). The
    /// DAC's mute state is write-only via SET_CUR; the core keeps no
    /// persistent copy, so the current value is always reported as 0.
    pub fn get_cur(&self, control_selector: u8) -> Result<u8, ControlError> {
        if control_selector != MUTE_CONTROL_SELECTOR {
            return Err(ControlError::UnsupportedControl);
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOTAL: usize = 1920;
    const MAX_PACKET: usize = 192;
    type Core = AudioCore<TOTAL, MAX_PACKET>;

    #[test]
    fn set_interface_rejects_out_of_range_alt() {
        let mut core = Core::new(SampleRate::Hz48000);
        assert_eq!(
            core.set_interface(2),
            Err(ControlError::InvalidAltSetting)
        );
    }

    #[test]
    fn p5_alt_zero_then_one_resets_and_arms() {
        let mut core = Core::new(SampleRate::Hz48000);
        assert_eq!(core.set_interface(1), Ok(EngineAction::Armed));
        assert!(core.all_ready());
        assert_eq!(core.set_interface(0), Ok(EngineAction::Deinit));
        assert!(!core.all_ready());
        assert_eq!(core.ring.wr(), 0);
    }

    #[test]
    fn data_out_ignored_before_alt_one() {
        let mut core = Core::new(SampleRate::Hz48000);
        let outcome = core.data_out(&[0u8; 4]);
        assert_eq!(outcome, DataOutOutcome::NotReady);
    }

    #[test]
    fn scenario6_oversize_packet_dropped_after_alt_one() {
        let mut core = Core::new(SampleRate::Hz48000);
        core.set_interface(1).unwrap();
        let big = [0u8; MAX_PACKET + 4];
        assert_eq!(core.data_out(&big), DataOutOutcome::Dropped);
    }

    #[test]
    fn data_out_reaching_half_signals_start_playback() {
        let mut core = Core::new(SampleRate::Hz48000);
        core.set_interface(1).unwrap();
        let mut saw_start = false;
        for _ in 0..20 {
            if core.data_out(&[0u8; MAX_PACKET]) == DataOutOutcome::StartPlayback {
                saw_start = true;
            }
        }
        assert!(saw_start);
    }

    #[test]
    fn scenario5_mute_set_cur_yields_engine_action_without_storing_state() {
        let mut core = Core::new(SampleRate::Hz48000);
        assert_eq!(
            core.set_cur(MUTE_CONTROL_SELECTOR, 2, &[1]),
            Ok(EngineAction::Mute(true))
        );
        assert_eq!(
            core.set_cur(MUTE_CONTROL_SELECTOR, 2, &[0]),
            Ok(EngineAction::Mute(false))
        );
    }

    #[test]
    fn get_cur_always_reports_zero_regardless_of_prior_set_cur() {
        let mut core = Core::new(SampleRate::Hz48000);
        core.set_cur(MUTE_CONTROL_SELECTOR, 2, &[1]).unwrap();
        assert_eq!(core.get_cur(MUTE_CONTROL_SELECTOR), Ok(0));
    }

    #[test]
    fn set_cur_rejects_unknown_control_selector() {
        let mut core = Core::new(SampleRate::Hz48000);
        assert_eq!(
            core.set_cur(0x02, 2, &[1]),
            Err(ControlError::UnsupportedControl)
        );
    }

    #[test]
    fn set_cur_rejects_empty_payload() {
        let mut core = Core::new(SampleRate::Hz48000);
        assert_eq!(
            core.set_cur(MUTE_CONTROL_SELECTOR, 2, &[]),
            Err(ControlError::MalformedPayload)
        );
    }

    #[test]
    fn sof_tick_is_noop_until_ring_half_full() {
        let mut core = Core::new(SampleRate::Hz48000);
        core.set_interface(1).unwrap();
        assert_eq!(core.sof_tick(0, 0), None);
    }
}
