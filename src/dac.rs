//! Playback engine trait (spec §6 [ADDED]) and a WM8731-backed
//! implementation for the Daisy Seed's onboard codec.
//!
//! The register map and power-up/mute sequencing below follow
//! `blackboxaudio-bbx_audio`'s `bbx_daisy::codec::Wm8731` driver; the only
//! change is using `embedded-hal-async`'s `I2c` trait (the teacher's own
//! dependency) instead of the blocking `embedded-hal` trait that example
//! uses, since every other call in this crate's hot paths is async.

use embedded_hal_async::i2c::I2c;

/// Command passed to [`PlaybackEngine::audio_cmd`] (spec §6 `AUDIO_CMD_*`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AudioCmd {
    Start,
    Play,
    Stop,
}

/// Rust rendering of the external DAC/codec callback interface spec.md §6
/// describes as out of scope to reimplement, but in scope to call through.
pub trait PlaybackEngine {
    type Error;

    /// Power up the codec/SAI at `freq` Hz with the given initial volume
    /// (0-100) and vendor-defined `options` bitmask.
    async fn init(&mut self, freq: u32, volume: u8, options: u32) -> Result<(), Self::Error>;

    /// Power down on SET_INTERFACE(0).
    async fn deinit(&mut self, options: u32);

    /// Hand a buffer to the DMA engine. `Start` arms the first half-buffer
    /// DMA transfer; `Play`/`Stop` are vendor-defined continuations spec.md
    /// leaves unspecified beyond "the callback interface" and are not
    /// exercised by this core.
    fn audio_cmd(&mut self, buffer: &[u8], size: usize, cmd: AudioCmd);

    async fn mute_ctl(&mut self, on: bool);

    /// Non-goal per spec.md §1; kept as a stub so the trait matches the
    /// external callback shape without implying volume control is wired up.
    async fn volume_ctl(&mut self, percent: u8);

    /// Consumer ("read") offset into the ring, in bytes, derived from the
    /// DMA controller's residual-transfer count (spec §3 `rd`).
    fn writable_from(&self, total: u32) -> u32;
}

#[allow(dead_code)]
mod wm8731_regs {
    pub const LEFT_LINE_IN: u8 = 0x00;
    pub const RIGHT_LINE_IN: u8 = 0x01;
    pub const LEFT_HP_OUT: u8 = 0x02;
    pub const RIGHT_HP_OUT: u8 = 0x03;
    pub const ANALOG_PATH: u8 = 0x04;
    pub const DIGITAL_PATH: u8 = 0x05;
    pub const POWER_DOWN: u8 = 0x06;
    pub const DIGITAL_IF: u8 = 0x07;
    pub const SAMPLING: u8 = 0x08;
    pub const ACTIVE: u8 = 0x09;
    pub const RESET: u8 = 0x0F;
}

/// 7-bit I2C address of the Daisy Seed's onboard WM8731 (CSB tied low).
pub const WM8731_I2C_ADDR: u8 = 0x1A;

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wm8731Error<E> {
    I2c(E),
}

pub struct WmPlaybackEngine<I2C> {
    i2c: I2C,
    muted: bool,
}

impl<I2C, E> WmPlaybackEngine<I2C>
where
    I2C: I2c<Error = E>,
{
    pub fn new(i2c: I2C) -> Self {
        Self { i2c, muted: false }
    }

    async fn write_reg(&mut self, reg: u8, value: u16) -> Result<(), Wm8731Error<E>> {
        let word = [((reg << 1) | ((value >> 8) & 1) as u8), (value & 0xFF) as u8];
        self.i2c
            .write(WM8731_I2C_ADDR, &word)
            .await
            .map_err(Wm8731Error::I2c)
    }

    /// Sampling-rate control word for the three rates this core supports;
    /// BOSR/SR bits per the WM8731 datasheet table for a 12.288/24.576 MHz
    /// MCLK (normal mode, USB mode off).
    fn sampling_control_word(freq: u32) -> u16 {
        match freq {
            44_100 => 0b0010_0000,
            96_000 => 0b0000_0111,
            _ => 0b0000_0000, // 48 kHz
        }
    }
}

impl<I2C, E> PlaybackEngine for WmPlaybackEngine<I2C>
where
    I2C: I2c<Error = E>,
{
    type Error = Wm8731Error<E>;

    async fn init(&mut self, freq: u32, volume: u8, _options: u32) -> Result<(), Self::Error> {
        self.write_reg(wm8731_regs::RESET, 0x00).await?;
        self.write_reg(wm8731_regs::POWER_DOWN, 0x00).await?;
        let hp = 0x79 + (volume as u16 * (0x7F - 0x79)) / 100;
        self.write_reg(wm8731_regs::LEFT_HP_OUT, 0x100 | hp).await?;
        self.write_reg(wm8731_regs::RIGHT_HP_OUT, 0x100 | hp).await?;
        self.write_reg(wm8731_regs::ANALOG_PATH, 0x10).await?;
        self.write_reg(wm8731_regs::DIGITAL_PATH, 0x00).await?;
        self.write_reg(wm8731_regs::DIGITAL_IF, 0x0A).await?; // I2S, 16-bit, slave
        self.write_reg(wm8731_regs::SAMPLING, Self::sampling_control_word(freq) as u16)
            .await?;
        self.write_reg(wm8731_regs::ACTIVE, 0x01).await?;
        self.muted = false;
        Ok(())
    }

    async fn deinit(&mut self, _options: u32) {
        let _ = self.write_reg(wm8731_regs::ACTIVE, 0x00).await;
        let _ = self.write_reg(wm8731_regs::POWER_DOWN, 0xFF).await;
    }

    /// Deliberately unimplemented: starting the SAI/DMA transfer is board
    /// bring-up (spec.md §1 explicit exclusion). `WmPlaybackEngine` is an
    /// I2C codec-control driver only; it owns no SAI/DMA handle to start.
    fn audio_cmd(&mut self, _buffer: &[u8], _size: usize, _cmd: AudioCmd) {}

    async fn mute_ctl(&mut self, on: bool) {
        self.muted = on;
        let path = if on { 0x08 } else { 0x10 };
        let _ = self.write_reg(wm8731_regs::ANALOG_PATH, path).await;
    }

    async fn volume_ctl(&mut self, _percent: u8) {
        // Non-goal (spec.md §1): runtime volume control is not wired up.
    }

    /// Deliberately unimplemented: reading `DMA_NDTR` back requires the same
    /// SAI/DMA handle `audio_cmd` would need to start the transfer, which
    /// this I2C-only codec-control driver does not own (spec.md §1, see
    /// `audio_cmd`). Returns `total` unchanged, i.e. "fully drained", so the
    /// feedback loop never reports an underrun/overrun risk against this
    /// stub.
    fn writable_from(&self, total: u32) -> u32 {
        total
    }
}
