//! GPIO-based NAND flash interface for STM32F1.
//!
//! Bit-bangs the parallel bus directly; there is no dedicated NAND
//! controller peripheral on this part. Implements [`nand_engine::nand::NandController`],
//! so every method here must return promptly — `write_status` in particular
//! never blocks on R/B#, it just samples it once per call.

use embassy_stm32::gpio::{Flex, Input, Level, Output, Pull, Speed};
use nand_engine::chip::ChipInfo;
use nand_engine::nand::{NandController, NandStatus};

/// NAND bus timing parameters, in nanoseconds.
#[derive(Clone, Copy)]
pub struct NandTiming {
    pub t_wp: u32,
    pub t_rp: u32,
    pub t_cls: u32,
    pub t_als: u32,
    pub t_clh: u32,
    pub t_alh: u32,
}

impl Default for NandTiming {
    fn default() -> Self {
        Self {
            t_wp: 50,
            t_rp: 50,
            t_cls: 50,
            t_als: 50,
            t_clh: 20,
            t_alh: 20,
        }
    }
}

/// Pin configuration for the NAND interface on the STM32F103 "Blue Pill".
///
/// Control signals:
///   PA0 - CLE, PA1 - ALE, PA2 - WE# (active low), PA3 - RE# (active low),
///   PA4 - CE# (active low), PA5 - R/B# (input, active low while busy).
///
/// Data bus: PB0-PB7 - D0-D7.
pub struct NandPins<'d> {
    pub cle: Output<'d>,
    pub ale: Output<'d>,
    pub we: Output<'d>,
    pub re: Output<'d>,
    pub ce: Output<'d>,
    pub rb: Input<'d>,

    pub d0: Flex<'d>,
    pub d1: Flex<'d>,
    pub d2: Flex<'d>,
    pub d3: Flex<'d>,
    pub d4: Flex<'d>,
    pub d5: Flex<'d>,
    pub d6: Flex<'d>,
    pub d7: Flex<'d>,
}

/// Ongoing asynchronous program launched by `write_page_async`.
struct InFlightWrite {
    /// Page address, kept only for diagnostics; the engine tracks the
    /// byte address itself.
    page: u32,
}

pub struct GpioNand<'d> {
    pins: NandPins<'d>,
    timing: NandTiming,
    inflight: Option<InFlightWrite>,
    page_size: u32,
}

impl<'d> GpioNand<'d> {
    pub fn new(mut pins: NandPins<'d>) -> Self {
        pins.ce.set_high();
        pins.we.set_high();
        pins.re.set_high();
        pins.cle.set_low();
        pins.ale.set_low();

        for d in [
            &mut pins.d0,
            &mut pins.d1,
            &mut pins.d2,
            &mut pins.d3,
            &mut pins.d4,
            &mut pins.d5,
            &mut pins.d6,
            &mut pins.d7,
        ] {
            d.set_as_input(Pull::None);
        }

        Self {
            pins,
            timing: NandTiming::default(),
            inflight: None,
            page_size: 2048,
        }
    }

    pub fn set_timing(&mut self, timing: NandTiming) {
        self.timing = timing;
    }

    fn set_data_output(&mut self, data: u8) {
        let bits = [
            (&mut self.pins.d0, 0x01),
            (&mut self.pins.d1, 0x02),
            (&mut self.pins.d2, 0x04),
            (&mut self.pins.d3, 0x08),
            (&mut self.pins.d4, 0x10),
            (&mut self.pins.d5, 0x20),
            (&mut self.pins.d6, 0x40),
            (&mut self.pins.d7, 0x80),
        ];
        for (pin, mask) in bits {
            pin.set_as_output(Speed::High);
            pin.set_level(if data & mask != 0 { Level::High } else { Level::Low });
        }
    }

    fn read_data_bus(&mut self) -> u8 {
        let pins = [
            &mut self.pins.d0,
            &mut self.pins.d1,
            &mut self.pins.d2,
            &mut self.pins.d3,
            &mut self.pins.d4,
            &mut self.pins.d5,
            &mut self.pins.d6,
            &mut self.pins.d7,
        ];
        let mut data = 0u8;
        for (i, pin) in pins.into_iter().enumerate() {
            pin.set_as_input(Pull::None);
            if pin.is_high() {
                data |= 1 << i;
            }
        }
        data
    }

    #[inline(always)]
    fn delay_ns(&self, ns: u32) {
        // 72MHz core clock, ~14ns/cycle.
        let cycles = ns / 14;
        for _ in 0..cycles {
            cortex_m::asm::nop();
        }
    }

    fn send_command(&mut self, cmd: u8) {
        self.pins.ce.set_low();
        self.pins.cle.set_high();
        self.pins.ale.set_low();
        self.delay_ns(self.timing.t_cls);

        self.set_data_output(cmd);
        self.pins.we.set_low();
        self.delay_ns(self.timing.t_wp);
        self.pins.we.set_high();

        self.pins.cle.set_low();
        self.delay_ns(self.timing.t_clh);
    }

    fn send_address_byte(&mut self, addr: u8) {
        self.pins.ce.set_low();
        self.pins.cle.set_low();
        self.pins.ale.set_high();
        self.delay_ns(self.timing.t_als);

        self.set_data_output(addr);
        self.pins.we.set_low();
        self.delay_ns(self.timing.t_wp);
        self.pins.we.set_high();

        self.pins.ale.set_low();
        self.delay_ns(self.timing.t_alh);
    }

    fn send_row_address(&mut self, page: u32) {
        self.send_address_byte(0x00);
        self.send_address_byte(0x00);
        self.send_address_byte((page & 0xFF) as u8);
        self.send_address_byte(((page >> 8) & 0xFF) as u8);
        self.send_address_byte(((page >> 16) & 0xFF) as u8);
    }

    fn read_byte(&mut self) -> u8 {
        self.pins.ce.set_low();
        self.pins.cle.set_low();
        self.pins.ale.set_low();

        self.pins.re.set_low();
        self.delay_ns(self.timing.t_rp);
        let data = self.read_data_bus();
        self.pins.re.set_high();

        data
    }

    fn write_byte(&mut self, data: u8) {
        self.pins.ce.set_low();
        self.pins.cle.set_low();
        self.pins.ale.set_low();

        self.set_data_output(data);
        self.pins.we.set_low();
        self.delay_ns(self.timing.t_wp);
        self.pins.we.set_high();
    }

    /// Busy-waits on R/B# with a cycle budget rather than a timer tick, so
    /// this stays callable from synchronous trait methods.
    fn wait_ready_blocking(&mut self, max_spins: u32) -> bool {
        for _ in 0..max_spins {
            if self.pins.rb.is_high() {
                return true;
            }
            cortex_m::asm::nop();
        }
        false
    }

    fn read_status_register(&mut self) -> u8 {
        self.send_command(0x70);
        let status = self.read_byte();
        self.pins.ce.set_high();
        status
    }
}

impl<'d> NandController for GpioNand<'d> {
    fn init(&mut self, chip: &ChipInfo) {
        self.page_size = chip.page_size;
        self.send_command(0xFF);
        self.pins.ce.set_high();
        self.wait_ready_blocking(1_000_000);
    }

    fn read_id(&mut self, out: &mut [u8]) -> usize {
        self.send_command(0x90);
        self.send_address_byte(0x00);
        self.delay_ns(100);
        let n = out.len().min(8);
        for byte in out.iter_mut().take(n) {
            *byte = self.read_byte();
        }
        self.pins.ce.set_high();
        n
    }

    fn erase_block(&mut self, addr: u32) -> NandStatus {
        let page = addr / self.page_size;
        self.send_command(0x60);
        self.send_address_byte((page & 0xFF) as u8);
        self.send_address_byte(((page >> 8) & 0xFF) as u8);
        self.send_address_byte(((page >> 16) & 0xFF) as u8);
        self.send_command(0xD0);

        if !self.wait_ready_blocking(10_000_000) {
            return NandStatus::TimeoutError;
        }
        let status = self.read_status_register();
        if status & 0x01 != 0 {
            NandStatus::ErrorStatus
        } else {
            NandStatus::Ready
        }
    }

    fn read_page(&mut self, page: u32, buf: &mut [u8]) -> NandStatus {
        self.send_command(0x00);
        self.send_row_address(page);
        self.send_command(0x30);

        if !self.wait_ready_blocking(1_000_000) {
            return NandStatus::TimeoutError;
        }
        for byte in buf.iter_mut() {
            *byte = self.read_byte();
        }
        self.pins.ce.set_high();
        NandStatus::Ready
    }

    fn read_data(&mut self, page: u32, offset: u32, buf: &mut [u8]) -> NandStatus {
        self.send_command(0x00);
        self.send_address_byte((offset & 0xFF) as u8);
        self.send_address_byte(((offset >> 8) & 0xFF) as u8);
        self.send_address_byte((page & 0xFF) as u8);
        self.send_address_byte(((page >> 8) & 0xFF) as u8);
        self.send_address_byte(((page >> 16) & 0xFF) as u8);
        self.send_command(0x30);

        if !self.wait_ready_blocking(1_000_000) {
            return NandStatus::TimeoutError;
        }
        for byte in buf.iter_mut() {
            *byte = self.read_byte();
        }
        self.pins.ce.set_high();
        NandStatus::Ready
    }

    fn write_page_async(&mut self, page: u32, data: &[u8]) {
        self.send_command(0x80);
        self.send_row_address(page);
        for &byte in data {
            self.write_byte(byte);
        }
        self.send_command(0x10);
        // Program is now running on-chip; completion is observed through
        // repeated write_status() polls, not here.
        self.inflight = Some(InFlightWrite { page });
    }

    fn write_status(&mut self) -> NandStatus {
        if self.inflight.is_none() {
            return NandStatus::Ready;
        }
        if self.pins.rb.is_low() {
            // Still programming; the engine's adapter treats repeated
            // TimeoutError as "keep polling" up to its own ceiling.
            return NandStatus::TimeoutError;
        }
        let status = self.read_status_register();
        self.pins.ce.set_high();
        self.inflight = None;
        if status & 0x01 != 0 {
            NandStatus::ErrorStatus
        } else {
            NandStatus::Ready
        }
    }
}
