//! NAND programmer firmware for STM32F103 ("Blue Pill").
//!
//! Wires the board's USB CDC-ACM link and bit-banged NAND bus to the
//! synchronous `nand-engine` command engine.

#![no_std]
#![no_main]

use defmt::info;
use embassy_executor::Spawner;
use embassy_stm32::bind_interrupts;
use embassy_stm32::gpio::{Flex, Input, Output, Level, Pull, Speed};
use embassy_stm32::peripherals::USB;
use embassy_stm32::usb::{Driver, InterruptHandler};
use embassy_time::{Duration, Timer};
use embassy_usb::class::cdc_acm::{CdcAcmClass, State};
use embassy_usb::{Builder, Config};
use nand_engine::badblock::FixedBadBlockTable;
use nand_engine::Engine;
use {defmt_rtt as _, panic_probe as _};

mod chip_table;
mod nand_gpio;
mod usb_handler;

use chip_table::StaticChipTable;
use nand_gpio::{GpioNand, NandPins};
use usb_handler::{usb_rx_task, usb_tx_task, UsbChannels, UsbTransport};

bind_interrupts!(struct Irqs {
    USB_LP_CAN1_RX0 => InterruptHandler<USB>;
});

static mut DEVICE_DESCRIPTOR: [u8; 256] = [0; 256];
static mut CONFIG_DESCRIPTOR: [u8; 256] = [0; 256];
static mut BOS_DESCRIPTOR: [u8; 256] = [0; 256];
static mut CONTROL_BUF: [u8; 64] = [0; 64];
static mut STATE: Option<State> = None;
static CHANNELS: UsbChannels = UsbChannels::new();

/// Up to 64 bad blocks per chip is generous for the 128/256 MiB parts this
/// board targets; capacity-exceeding blocks just aren't deduped in the
/// table and fall back to per-operation ERROR_STATUS reporting.
type BadBlockTable = FixedBadBlockTable<64>;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_stm32::init(Default::default());
    info!("nand-engine firmware (stm32f1) starting");

    let driver = Driver::new(p.USB, Irqs, p.PA12, p.PA11);

    let mut config = Config::new(0xC0DE, 0xCAFE);
    config.manufacturer = Some("nand-engine");
    config.product = Some("NAND programmer");
    config.serial_number = Some("NE-STM32-001");
    config.max_power = 250;
    config.max_packet_size_0 = 64;
    config.composite_with_iads = true;

    let (device_descriptor, config_descriptor, bos_descriptor, control_buf, state) = unsafe {
        STATE = Some(State::new());
        (
            &mut DEVICE_DESCRIPTOR,
            &mut CONFIG_DESCRIPTOR,
            &mut BOS_DESCRIPTOR,
            &mut CONTROL_BUF,
            STATE.as_mut().unwrap(),
        )
    };

    let mut builder = Builder::new(
        driver,
        config,
        device_descriptor,
        config_descriptor,
        bos_descriptor,
        control_buf,
    );

    let class = CdcAcmClass::new(&mut builder, state, 64);
    let usb = builder.build();
    let (sender, receiver) = class.split();

    spawner.spawn(usb_task(usb)).unwrap();
    spawner.spawn(usb_rx_runner(receiver)).unwrap();
    spawner.spawn(usb_tx_runner(sender)).unwrap();

    info!("USB initialized");

    let pins = NandPins {
        cle: Output::new(p.PA0, Level::Low, Speed::High),
        ale: Output::new(p.PA1, Level::Low, Speed::High),
        we: Output::new(p.PA2, Level::High, Speed::High),
        re: Output::new(p.PA3, Level::High, Speed::High),
        ce: Output::new(p.PA4, Level::High, Speed::High),
        rb: Input::new(p.PA5, Pull::Up),
        d0: Flex::new(p.PB0),
        d1: Flex::new(p.PB1),
        d2: Flex::new(p.PB2),
        d3: Flex::new(p.PB3),
        d4: Flex::new(p.PB4),
        d5: Flex::new(p.PB5),
        d6: Flex::new(p.PB6),
        d7: Flex::new(p.PB7),
    };

    let nand = GpioNand::new(pins);
    let transport = UsbTransport::new(&CHANNELS);
    let mut engine: Engine<UsbTransport, GpioNand<'static>, BadBlockTable, StaticChipTable> =
        Engine::new(transport, nand, FixedBadBlockTable::new(), StaticChipTable);

    loop {
        engine.tick();
        Timer::after(Duration::from_micros(100)).await;
    }
}

#[embassy_executor::task]
async fn usb_task(mut usb: embassy_usb::UsbDevice<'static, Driver<'static, USB>>) -> ! {
    usb.run().await
}

#[embassy_executor::task]
async fn usb_rx_runner(
    receiver: embassy_usb::class::cdc_acm::Receiver<'static, Driver<'static, USB>>,
) -> ! {
    usb_rx_task(receiver, &CHANNELS).await
}

#[embassy_executor::task]
async fn usb_tx_runner(
    sender: embassy_usb::class::cdc_acm::Sender<'static, Driver<'static, USB>>,
) -> ! {
    usb_tx_task(sender, &CHANNELS).await
}
