//! Audio ring buffer shared by the USB isochronous OUT producer and the
//! DMA/DAC consumer.
//!
//! The consumer side never touches this struct directly: its progress is
//! observed, once per SOF, through the read offset the caller derives from
//! the DMA controller's residual-transfer counter (see
//! [`crate::dac::PlaybackEngine::writable_from`]). `RingBuffer` itself only
//! ever writes `wr`.

/// Tracks whether the ring has reached the half-full mark that starts DMA.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OffsetState {
    /// Buffer has not yet reached the half-full mark this session.
    Unknown,
    /// Half-full mark reached; DMA running, no outstanding sync request.
    None,
}

/// Outcome of [`RingBuffer::ingest`], telling the caller whether it must now
/// start the playback engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ingest {
    /// Packet was copied into the ring; nothing else to do.
    Written,
    /// Packet exceeded the maximum packet size and was dropped entirely.
    Dropped,
    /// Packet was copied and this write crossed the half-full mark for the
    /// first time this session: the caller must start the playback engine
    /// with the first half of the buffer.
    WrittenReachedHalf,
}

/// Fixed-size byte ring, `TOTAL` bytes, holding stereo 16-bit frames.
///
/// `MAX_PACKET` bounds a single `ingest()` call to one USB isochronous OUT
/// packet's worth of bytes; larger packets are dropped rather than
/// partially written (spec: oversize packets are tolerated silently).
pub struct RingBuffer<const TOTAL: usize, const MAX_PACKET: usize> {
    buf: [u8; TOTAL],
    wr: u32,
    offset_state: OffsetState,
    is_playing: bool,
    rd_enable: bool,
}

impl<const TOTAL: usize, const MAX_PACKET: usize> RingBuffer<TOTAL, MAX_PACKET> {
    const _ALIGNED: () = assert!(TOTAL % 4 == 0, "ring size must be a multiple of 4");

    pub const fn new() -> Self {
        Self {
            buf: [0u8; TOTAL],
            wr: 0,
            offset_state: OffsetState::Unknown,
            is_playing: false,
            rd_enable: false,
        }
    }

    /// Zero the ring and drop back to a fresh, not-yet-playing session.
    /// Called on SET_INTERFACE(0) and SET_INTERFACE(1) (spec §4.D).
    pub fn reset(&mut self) {
        self.buf = [0u8; TOTAL];
        self.wr = 0;
        self.offset_state = OffsetState::Unknown;
        self.is_playing = false;
        self.rd_enable = false;
    }

    pub fn wr(&self) -> u32 {
        self.wr
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn rd_enable(&self) -> bool {
        self.rd_enable
    }

    /// Slice of the first half of the ring, handed to
    /// `PlaybackEngine::audio_cmd` on the `START` transition.
    pub fn first_half(&self) -> &[u8] {
        &self.buf[..TOTAL / 2]
    }

    /// Copy `src` into the ring at `wr`, wrapping at `TOTAL` (not after).
    /// `src.len()` must be a multiple of 4 and at most `MAX_PACKET`, or the
    /// whole packet is dropped (spec I1, §4.A, §7).
    pub fn ingest(&mut self, src: &[u8]) -> Ingest {
        if src.is_empty() {
            return Ingest::Written;
        }
        if src.len() % 4 != 0 || src.len() > MAX_PACKET {
            return Ingest::Dropped;
        }

        let mut wr = self.wr as usize;
        for &byte in src {
            self.buf[wr] = byte;
            wr += 1;
            if wr >= TOTAL {
                wr = 0;
            }
        }
        self.wr = wr as u32;

        if self.offset_state == OffsetState::Unknown
            && !self.is_playing
            && self.wr as usize >= TOTAL / 2
        {
            self.offset_state = OffsetState::None;
            self.is_playing = true;
            self.rd_enable = true;
            return Ingest::WrittenReachedHalf;
        }
        Ingest::Written
    }

    /// Free space ahead of `wr`, up to the derived read pointer `rd`, in
    /// stereo 16-bit frames. Pure; called every SOF with the consumer's
    /// current position.
    pub fn writable_samples(&self, rd: u32) -> u32 {
        let rd = rd % TOTAL as u32;
        let diff = if rd < self.wr {
            rd + TOTAL as u32 - self.wr
        } else {
            rd - self.wr
        };
        diff / 4
    }
}

impl<const TOTAL: usize, const MAX_PACKET: usize> Default for RingBuffer<TOTAL, MAX_PACKET> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOTAL: usize = 1920;
    const MAX_PACKET: usize = 192;
    type Ring = RingBuffer<TOTAL, MAX_PACKET>;

    fn frame(n: usize) -> heapless::Vec<u8, MAX_PACKET> {
        let mut v = heapless::Vec::new();
        for i in 0..n {
            v.push((i % 256) as u8).unwrap();
        }
        v
    }

    #[test]
    fn p1_wr_stays_aligned_and_in_range() {
        let mut ring = Ring::new();
        for _ in 0..1000 {
            ring.ingest(&frame(MAX_PACKET));
            assert_eq!(ring.wr() % 4, 0);
            assert!((ring.wr() as usize) < TOTAL);
        }
    }

    #[test]
    fn oversize_packet_is_dropped_without_advancing_wr() {
        let mut ring = Ring::new();
        ring.ingest(&frame(64));
        let wr_before = ring.wr();
        let outcome = ring.ingest(&frame(MAX_PACKET + 4));
        assert_eq!(outcome, Ingest::Dropped);
        assert_eq!(ring.wr(), wr_before);
    }

    #[test]
    fn non_multiple_of_four_is_dropped() {
        let mut ring = Ring::new();
        let outcome = ring.ingest(&frame(5));
        assert_eq!(outcome, Ingest::Dropped);
        assert_eq!(ring.wr(), 0);
    }

    #[test]
    fn p6_is_playing_flips_once_after_half_full() {
        let mut ring = Ring::new();
        let mut saw_half = 0;
        for _ in 0..20 {
            if ring.ingest(&frame(MAX_PACKET)) == Ingest::WrittenReachedHalf {
                saw_half += 1;
            }
        }
        assert_eq!(saw_half, 1);
        assert!(ring.is_playing());
        assert!(ring.wr() as usize >= TOTAL / 2);
    }

    #[test]
    fn p5_reset_zeroes_wr_and_state() {
        let mut ring = Ring::new();
        for _ in 0..20 {
            ring.ingest(&frame(MAX_PACKET));
        }
        assert!(ring.is_playing());
        ring.reset();
        assert_eq!(ring.wr(), 0);
        assert!(!ring.is_playing());
        assert!(!ring.rd_enable());
        assert!(ring.first_half().iter().all(|&b| b == 0));
    }

    #[test]
    fn writable_samples_wraps_correctly() {
        let mut ring = Ring::new();
        ring.ingest(&frame(MAX_PACKET)); // wr = 192
        // consumer hasn't moved: rd = 0, writable = (0 + TOTAL - 192)/4
        assert_eq!(ring.writable_samples(0), (TOTAL as u32 - 192) / 4);
        // consumer ahead of producer (rd < wr): writable = (rd - wr + TOTAL)/4... actually rd< wr means wrap
        assert_eq!(ring.writable_samples(100), (100 + TOTAL as u32 - 192) / 4);
        // consumer behind producer in ring terms (rd > wr): writable = (rd-wr)/4
        assert_eq!(ring.writable_samples(1000), (1000 - 192) / 4);
    }

    #[test]
    fn wraps_at_total_not_after() {
        let mut ring = Ring::new();
        // advance wr close to TOTAL
        while ring.wr() as usize + MAX_PACKET <= TOTAL {
            ring.ingest(&frame(MAX_PACKET));
        }
        let before = ring.wr();
        assert!(before as usize + MAX_PACKET > TOTAL, "test setup sanity");
        // last partial packet wraps
        let remaining = TOTAL - before as usize;
        ring.ingest(&frame(remaining));
        assert_eq!(ring.wr(), 0);
    }
}
