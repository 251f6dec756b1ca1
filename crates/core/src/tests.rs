// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#[cfg(test)]
mod integration_tests {
    use crate::asm;
    use crate::bus::decoder::{PWM_BASE, RAM_BASE};
    use crate::cpu::{RiscV, TrapCause};
    use crate::csr::{MCAUSE, MEPC, MTVEC};
    use crate::memory::BootImage;
    use crate::metrics::PerformanceMetrics;
    use crate::peripherals::gpio::Gpio;
    use crate::peripherals::pwm::Pwm;
    use crate::system::build_machine;
    use crate::{Cpu, Machine, SimulationError, SimulationObserver};
    use rvsoc_config::{BootConfig, SocConfig};
    use std::sync::{Arc, Mutex};

    fn rom_machine(rom: Vec<u32>) -> Machine<RiscV> {
        build_machine(&SocConfig::default(), BootImage::from_rom(rom)).unwrap()
    }

    #[derive(Debug, Default)]
    struct RecordingObserver {
        retired: Mutex<Vec<u32>>,
        traps: Mutex<Vec<(TrapCause, u32)>>,
        started: Mutex<bool>,
    }

    impl SimulationObserver for RecordingObserver {
        fn on_simulation_start(&self) {
            *self.started.lock().unwrap() = true;
        }

        fn on_retire(&self, pc: u32, _word: u32) {
            self.retired.lock().unwrap().push(pc);
        }

        fn on_trap(&self, cause: TrapCause, epc: u32) {
            self.traps.lock().unwrap().push((cause, epc));
        }
    }

    #[test]
    fn test_call_into_ram_and_return() {
        let rom = vec![
            asm::addi(7, 0, 0xCA),
            asm::slli(8, 7, 15),
            asm::lui(1, RAM_BASE >> 12),
            asm::jalr(2, 1, 4),
            asm::addi(9, 0, 0x123),
            asm::jal(0, 0),
        ];
        let ram = vec![
            0xDEAD_BEEF,
            asm::sw(1, 7, 0),
            asm::lw(10, 1, 0),
            asm::jalr(0, 2, 0),
        ];
        let image = BootImage {
            rom,
            ram,
            entry: 0,
        };
        let mut machine = build_machine(&SocConfig::default(), image).unwrap();

        machine.run_until_retired(8, 1_000).unwrap();
        assert_eq!(machine.cpu.get_register(7), 0xCA);
        assert_eq!(machine.cpu.get_register(8), 0x0065_0000);
        assert_eq!(machine.cpu.get_register(10), 0xCA);
        assert_eq!(machine.cpu.get_register(9), 0x123);
        assert_eq!(machine.cpu.get_pc(), 20);
        assert_eq!(machine.read_ram_word(RAM_BASE), Some(0xCA));

        // Reset reloads the initial RAM contents.
        machine.reset();
        assert_eq!(machine.read_ram_word(RAM_BASE), Some(0xDEAD_BEEF));
        assert_eq!(machine.cpu.retired(), 0);
    }

    #[test]
    fn test_rom_cycle_budget() {
        let mut machine = rom_machine(vec![asm::nop(); 4]);
        // Two fetch cycles and one execute cycle per instruction.
        assert_eq!(machine.run_until_retired(4, 100).unwrap(), 12);
        assert_eq!(machine.total_cycles, 12);
    }

    #[test]
    fn test_spi_flash_boot() {
        let config = SocConfig {
            boot: BootConfig::spi_flash(),
            ..Default::default()
        };
        let rom = vec![asm::addi(1, 0, 5), asm::addi(1, 1, 1), asm::jal(0, 0)];
        let mut machine = build_machine(&config, BootImage::from_rom(rom)).unwrap();

        let first = machine.run_until_retired(1, 1_000).unwrap();
        assert!(first > 31 + 65, "first fetch took {} cycles", first);
        let second = machine.run_until_retired(1, 1_000).unwrap();
        assert!(second > 65 && second < first);
        assert_eq!(machine.cpu.get_register(1), 6);
    }

    #[test]
    fn test_timeout() {
        let mut machine = rom_machine(vec![asm::jal(0, 0)]);
        let err = machine.run_until_retired(10, 5).unwrap_err();
        assert!(matches!(err, SimulationError::Timeout { cycles: 5 }));
    }

    #[test]
    fn test_observers_see_retirements_and_traps() {
        let mut rom = vec![asm::nop(); 0x20];
        rom[0] = asm::addi(1, 0, 0x40);
        rom[1] = asm::csrrw(0, MTVEC, 1);
        rom[2] = asm::ecall();
        rom[0x10] = asm::jal(0, 0);
        let mut machine = rom_machine(rom);

        let recorder = Arc::new(RecordingObserver::default());
        let metrics = Arc::new(PerformanceMetrics::new());
        machine.add_observer(recorder.clone());
        machine.add_observer(metrics.clone());
        assert!(*recorder.started.lock().unwrap());

        let cycles = machine.run_until_retired(4, 100).unwrap();
        assert_eq!(*recorder.retired.lock().unwrap(), vec![0, 4, 8, 0x40]);
        assert_eq!(
            *recorder.traps.lock().unwrap(),
            vec![(TrapCause::EnvironmentCall, 8)]
        );
        assert_eq!(machine.cpu.read_csr(MCAUSE), 11);
        assert_eq!(machine.cpu.read_csr(MEPC), 8);

        assert_eq!(metrics.get_instructions(), 4);
        assert_eq!(metrics.get_cycles(), cycles);
        assert_eq!(metrics.get_traps_by_cause(TrapCause::EnvironmentCall), 1);
        assert_eq!(metrics.get_cpi(), 3.0);
    }

    #[test]
    fn test_gpio_and_pwm_from_firmware() {
        let rom = vec![
            asm::lui(1, 0x40000),
            asm::addi(2, 0, 3),
            asm::sw(1, 2, 0),
            asm::lw(3, 1, 0),
            asm::lui(4, PWM_BASE >> 12),
            asm::addi(5, 0, 0x80),
            asm::sb(4, 5, 0),
            asm::lbu(6, 4, 4),
            asm::jal(0, 0),
        ];
        let mut machine = rom_machine(rom);
        machine
            .bus
            .peripheral_mut("gpio")
            .and_then(|p| p.dev.as_any_mut())
            .and_then(|a| a.downcast_mut::<Gpio>())
            .unwrap()
            .set_input(1, true);

        machine.run_until_retired(8, 1_000).unwrap();
        assert_eq!(machine.cpu.get_register(3), 0b111);
        assert_ne!(machine.cpu.get_register(6), 0);

        let gpio = machine
            .bus
            .peripheral("gpio")
            .and_then(|p| p.dev.as_any())
            .and_then(|a| a.downcast_ref::<Gpio>())
            .unwrap();
        assert_eq!(gpio.output(0), Some(true));
        assert_eq!(gpio.output(1), None);

        let pwm = machine
            .bus
            .peripheral("pwm0")
            .and_then(|p| p.dev.as_any())
            .and_then(|a| a.downcast_ref::<Pwm>())
            .unwrap();
        assert_eq!(pwm.compare(), 0x80);
        let pwm1 = machine.peek_peripheral("pwm1").unwrap();
        assert_eq!(pwm1["compare"], 0);
    }

    #[test]
    fn test_unmapped_load_reads_zero() {
        let rom = vec![
            asm::addi(1, 0, 7),
            asm::lui(2, 0x60000),
            asm::lw(1, 2, 0),
            asm::sw(2, 2, 0),
        ];
        let mut machine = rom_machine(rom);
        machine.run_until_retired(4, 100).unwrap();
        assert_eq!(machine.cpu.get_register(1), 0);
        assert_eq!(machine.cpu.get_pc(), 16);
    }

    #[test]
    fn test_machine_snapshot_roundtrip() {
        let rom = vec![
            asm::addi(1, 0, 42),
            asm::lui(4, PWM_BASE >> 12),
            asm::addi(5, 0, 0x10),
            asm::sb(4, 5, 0),
            asm::jal(0, 0),
        ];
        let mut machine = rom_machine(rom.clone());
        machine.run_until_retired(4, 1_000).unwrap();

        let snap = machine.snapshot();
        assert_eq!(snap.cpu.retired, 4);
        assert_eq!(snap.cpu.csr("minstret"), Some(4));
        let json = serde_json::to_string(&snap).unwrap();
        let restored: crate::snapshot::MachineSnapshot = serde_json::from_str(&json).unwrap();

        let mut other = rom_machine(rom);
        other.apply_snapshot(restored).unwrap();
        assert_eq!(other.cpu.get_register(1), 42);
        assert_eq!(other.cpu.get_pc(), machine.cpu.get_pc());
        assert_eq!(other.total_cycles, machine.total_cycles);
        assert_eq!(other.peek_peripheral("pwm0").unwrap()["compare"], 0x10);

        // Both machines continue identically.
        machine.run_until_retired(1, 100).unwrap();
        other.run_until_retired(1, 100).unwrap();
        assert_eq!(other.cpu.get_pc(), machine.cpu.get_pc());
    }

    #[test]
    fn test_snapshot_applied_mid_fetch_restarts_boot_storage() {
        let config = SocConfig {
            boot: BootConfig::spi_flash(),
            ..Default::default()
        };
        let rom = vec![
            asm::addi(1, 0, 1),
            asm::addi(2, 0, 2),
            asm::addi(3, 0, 3),
            asm::jal(0, 0),
        ];
        let mut machine = build_machine(&config, BootImage::from_rom(rom)).unwrap();
        let at_reset = machine.snapshot();

        machine.run_until_retired(2, 1_000).unwrap();
        machine.run(20);
        assert_eq!(machine.cpu.get_pc(), 8);
        assert_eq!(machine.bus.boot.owner(), Some(1));

        machine.apply_snapshot(at_reset).unwrap();
        assert_eq!(machine.bus.boot.owner(), None);
        assert_eq!(machine.bus.ram.owner(), None);

        machine.run_until_retired(1, 1_000).unwrap();
        assert_eq!(machine.cpu.get_pc(), 4);
        assert_eq!(machine.cpu.get_register(1), 1);
        assert_eq!(machine.cpu.get_register(3), 0);
    }
}
