//! Board/clock bring-up (spec §4.G [ADDED]).
//!
//! Thin by design (spec.md §1 excludes board bring-up, clocks and interrupt
//! wiring from the core): this module only derives a 48 MHz USB clock and
//! wires the TIM2-counts-SOF trick the core's feedback task depends on. The
//! RCC tree mirrors the H7 blocks in the sibling examples
//! (`miniluz-TFG`'s `experiments/4-usb-audio` and `elagil`'s F401 firmware),
//! adapted to the Daisy Seed's H750 HSE.

use embassy_stm32::rcc::{
    Hse, HseMode, Pll, PllDiv, PllMul, PllPreDiv, PllSource, Sysclk, VoltageScale,
};
use embassy_stm32::time::Hertz;
use embassy_stm32::{bind_interrupts, peripherals, usb, Config};

bind_interrupts!(pub struct Irqs {
    OTG_FS => usb::InterruptHandler<peripherals::USB_OTG_FS>;
});

/// `embassy_stm32::Config` landing PLL1Q on 48 MHz for `USBSEL`, matching
/// the Daisy Seed's 16 MHz HSE, the way the teacher's own board bring-up
/// (and `miniluz-TFG`'s H7 USB audio example) configure it.
pub fn default_rcc() -> Config {
    let mut config = Config::default();
    config.rcc.hse = Some(Hse {
        freq: Hertz(16_000_000),
        mode: HseMode::Oscillator,
    });
    config.rcc.pll1 = Some(Pll {
        source: PllSource::HSE,
        prediv: PllPreDiv::DIV2,
        mul: PllMul::MUL120,
        divp: Some(PllDiv::DIV2),  // 480 MHz sysclk
        divq: Some(PllDiv::DIV20), // 48 MHz for USB
        divr: None,
    });
    config.rcc.sys = Sysclk::PLL1_P;
    config.rcc.voltage_scale = VoltageScale::Scale0;
    config.rcc.mux.usbsel = embassy_stm32::rcc::mux::Usbsel::PLL1_Q;
    config
}
