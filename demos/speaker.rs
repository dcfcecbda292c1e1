//! Full board wiring for the USB Audio Class 1.0 speaker core, on a Daisy
//! Seed (STM32H750). Structured after the teacher crate's own
//! `_usb_uac.rs`: one `embassy-executor` task per concern, `StaticCell`s for
//! every USB-stack buffer, and a TIM2 SOF-counting interrupt feeding an
//! `embassy_sync::signal::Signal` the feedback task awaits.
#![no_std]
#![no_main]

use core::cell::RefCell;

use daisy_audio_speaker::class::{
    control_task, feedback_task, stream_task, AudioControlHandler, EngineActionQueue, SharedCore,
};
use daisy_audio_speaker::dac::WmPlaybackEngine;
use daisy_audio_speaker::{board, descriptors, Core, AUDIO_OUT_PACKET, AUDIO_TOTAL_BUF_SIZE, SAMPLE_RATE};
use defmt::info;
use embassy_executor::Spawner;
use embassy_stm32::i2c::I2c;
use embassy_stm32::interrupt;
use embassy_stm32::time::Hertz;
use embassy_stm32::usb::Driver;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use embassy_sync::signal::Signal;
use embassy_usb::Builder;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

type UsbDriver = Driver<'static, embassy_stm32::peripherals::USB_OTG_FS>;
type Engine = WmPlaybackEngine<I2c<'static, embassy_stm32::peripherals::I2C1>>;
type SharedEngine = AsyncMutex<CriticalSectionRawMutex, Engine>;
type CoreType = SharedCore<AUDIO_TOTAL_BUF_SIZE, AUDIO_OUT_PACKET>;

/// Once-per-SOF tick, set from the TIM2 interrupt below. Carries the current
/// USB frame number's low bits so the feedback parity guard (spec §9) has
/// something to compare against.
static SOF_SIGNAL: Signal<CriticalSectionRawMutex, u16> = Signal::new();

/// TIM2's trigger input is routed to the USB OTG FS core's SOF output
/// (`TriggerSource::ITR6` on H7, per RM0433), the same wiring the teacher's
/// `_usb_uac.rs` uses to count elapsed frames. Unlike that example, which
/// accumulates ticks to measure a sample clock, this handler just signals
/// the feedback task on every trigger (spec design note: no vestigial frame
/// counter).
#[interrupt]
fn TIM2() {
    use embassy_stm32::pac;
    critical_section::with(|_| {
        let regs = pac::TIM2;
        if regs.sr().read().tif() {
            regs.sr().modify(|w| w.set_tif(false));
            static FNSOF: core::sync::atomic::AtomicU16 = core::sync::atomic::AtomicU16::new(0);
            let fnsof = FNSOF.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
            SOF_SIGNAL.signal(fnsof);
        }
    });
}

#[embassy_executor::task]
async fn usb_task(mut device: embassy_usb::UsbDevice<'static, UsbDriver>) {
    device.run().await;
}

#[embassy_executor::task]
async fn streaming_task(
    ep_out: <UsbDriver as embassy_usb::driver::Driver<'static>>::EndpointOut,
    core: &'static CoreType,
    engine: &'static SharedEngine,
) {
    stream_task(ep_out, core, engine).await;
}

#[embassy_executor::task]
async fn feedback_ep_task(
    ep_in: <UsbDriver as embassy_usb::driver::Driver<'static>>::EndpointIn,
    core: &'static CoreType,
    engine: &'static SharedEngine,
) {
    feedback_task(ep_in, core, engine, &SOF_SIGNAL).await;
}

/// Drains SET_INTERFACE/Mute actions signalled from `AudioControlHandler`
/// and drives the playback engine (spec §4.D); see `class::control_task`.
#[embassy_executor::task]
async fn control_ep_task(actions: &'static EngineActionQueue, engine: &'static SharedEngine) {
    control_task(actions, engine, SAMPLE_RATE.hz()).await;
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_stm32::init(board::default_rcc());
    info!("daisy_audio_speaker starting, sample rate = {}", SAMPLE_RATE.hz());

    let i2c = I2c::new(
        p.I2C1,
        p.PB8,
        p.PB9,
        board::Irqs,
        p.DMA1_CH0,
        p.DMA1_CH1,
        Hertz(100_000),
        Default::default(),
    );
    static ENGINE: StaticCell<SharedEngine> = StaticCell::new();
    let engine = ENGINE.init(AsyncMutex::new(WmPlaybackEngine::new(i2c)));

    static CONFIG_DESC: StaticCell<[u8; descriptors::CONFIG_DESC_SIZE]> = StaticCell::new();
    let config_descriptor = *CONFIG_DESC.init(descriptors::build_config_descriptor(
        SAMPLE_RATE.hz(),
        AUDIO_OUT_PACKET as u16,
    ));

    static BOS_DESC: StaticCell<[u8; 12]> = StaticCell::new();
    let bos_descriptor = BOS_DESC.init([0u8; 12]);
    static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();
    let control_buf = CONTROL_BUF.init([0u8; 64]);
    static CONFIG_BUF: StaticCell<[u8; descriptors::CONFIG_DESC_SIZE]> = StaticCell::new();
    let config_buf = CONFIG_BUF.init([0u8; descriptors::CONFIG_DESC_SIZE]);

    let driver = Driver::new(p.USB_OTG_FS, board::Irqs, p.PA12, p.PA11);

    let mut usb_config = embassy_usb::Config::new(0x1209, 0xAF01);
    usb_config.manufacturer = Some("Daisy Audio");
    usb_config.product = Some("USB Audio Speaker");
    usb_config.max_power = 100;
    usb_config.max_packet_size_0 = 64;

    let core: &'static CoreType =
        { static CORE: StaticCell<CoreType> = StaticCell::new(); CORE.init(BlockingMutex::new(RefCell::new(Core::new(SAMPLE_RATE)))) };

    static ACTIONS: StaticCell<EngineActionQueue> = StaticCell::new();
    let actions: &'static EngineActionQueue = ACTIONS.init(EngineActionQueue::new());

    static HANDLER: StaticCell<AudioControlHandler<'static, AUDIO_TOTAL_BUF_SIZE, AUDIO_OUT_PACKET>> =
        StaticCell::new();
    let handler = HANDLER.init(AudioControlHandler::new(core, config_descriptor, actions));

    let mut builder = Builder::new(driver, usb_config, config_buf, bos_descriptor, &mut [], control_buf);
    builder.handler(handler);

    // Audio Control interface (no endpoints of its own) plus the Audio
    // Streaming interface's two alt settings, mirroring the byte layout in
    // `descriptors::build_config_descriptor` (spec §6).
    let mut func = builder.function(0x01, 0x00, 0x00);
    let mut ac_iface = func.interface();
    let _ac_alt = ac_iface.alt_setting(0x01, 0x01, 0x00, None);
    let mut as_iface = func.interface();
    let _as_alt0 = as_iface.alt_setting(0x01, 0x02, 0x00, None);
    let mut as_alt1 = as_iface.alt_setting(0x01, 0x02, 0x00, None);
    let ep_out = as_alt1.endpoint_isochronous_out(
        embassy_usb::driver::EndpointType::Isochronous,
        AUDIO_OUT_PACKET as u16,
        1,
    );
    let ep_in = as_alt1.endpoint_isochronous_in(
        embassy_usb::driver::EndpointType::Isochronous,
        3,
        1,
    );
    drop(func);

    let usb = builder.build();

    spawner.spawn(usb_task(usb)).unwrap();
    spawner.spawn(streaming_task(ep_out, core, engine)).unwrap();
    spawner.spawn(feedback_ep_task(ep_in, core, engine)).unwrap();
    spawner.spawn(control_ep_task(actions, engine)).unwrap();
}
