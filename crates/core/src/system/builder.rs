// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::decoder::{
    GPIO_BASE, GPIO_MUX_BASE, GPIO_MUX_WINDOW, GPIO_WINDOW, PWM_BASE, PWM_STRIDE, ROM_WINDOW,
};
use crate::bus::{SystemBus, Target};
use crate::cpu::RiscV;
use crate::memory::{BootImage, Ram, Rom, SpiRom};
use crate::peripherals::gpio::Gpio;
use crate::peripherals::gpio_mux::GpioMux;
use crate::peripherals::pwm::Pwm;
use crate::Machine;
use rvsoc_config::{BootConfig, SocConfig};
use tracing::{info, warn};

fn boot_target(config: &SocConfig, rom: &[u32]) -> anyhow::Result<Box<dyn Target>> {
    let bytes = rom.len() as u64 * 4;
    match config.boot {
        BootConfig::Rom => {
            if bytes > ROM_WINDOW as u64 {
                anyhow::bail!("Boot image of {} bytes exceeds the ROM window", bytes);
            }
            info!("Boot storage: ROM, {} words", rom.len());
            Ok(Box::new(Rom::new(rom.to_vec())))
        }
        BootConfig::SpiFlash { offset, end } => {
            let window = u64::from(end - offset);
            if bytes > window {
                anyhow::bail!(
                    "Boot image of {} bytes exceeds the {} byte SPI flash window",
                    bytes,
                    window
                );
            }
            info!(
                "Boot storage: SPI flash {:#x}..{:#x}, {} words",
                offset,
                end,
                rom.len()
            );
            Ok(Box::new(SpiRom::with_program(offset, end, rom)))
        }
    }
}

/// Builds the fabric described by `config` with `image` preloaded.
pub fn build_system_bus(config: &SocConfig, image: &BootImage) -> anyhow::Result<SystemBus> {
    config.validate()?;

    let boot = boot_target(config, &image.rom)?;
    let ram = Ram::with_image(config.ram_words()?, image.ram.clone())?;
    info!(
        "RAM: {} words, {} preloaded",
        ram.size_words(),
        image.ram.len()
    );

    let mut bus = SystemBus::new(boot, ram)?;
    bus.add_peripheral("gpio", GPIO_BASE, GPIO_WINDOW, Box::new(Gpio::new()))?;
    bus.add_peripheral(
        "gpio_mux",
        GPIO_MUX_BASE,
        GPIO_MUX_WINDOW,
        Box::new(GpioMux::new()),
    )?;
    for i in 0..config.pwm_count {
        let base = PWM_BASE + i as u32 * PWM_STRIDE;
        bus.add_peripheral(&format!("pwm{}", i), base, PWM_STRIDE, Box::new(Pwm::new()))?;
    }
    info!("Mapped {} peripherals", bus.peripherals.len());

    Ok(bus)
}

pub fn build_machine(config: &SocConfig, image: BootImage) -> anyhow::Result<Machine<RiscV>> {
    info!("Building machine '{}'", config.name);
    let bus = build_system_bus(config, &image)?;
    let cpu = super::configure_riscv(config);
    if image.entry != 0 {
        warn!("Image entry {:#x} ignored, the core resets to 0", image.entry);
    }
    let mut machine = Machine::new(cpu, bus);
    machine.reset();
    Ok(machine)
}
