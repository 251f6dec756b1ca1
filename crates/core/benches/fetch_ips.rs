// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rvsoc_config::{BootConfig, SocConfig};
use rvsoc_core::asm;
use rvsoc_core::memory::BootImage;
use rvsoc_core::system::build_machine;

fn counting_loop() -> Vec<u32> {
    vec![
        asm::addi(1, 1, 1),
        asm::andi(2, 1, 0xFF),
        asm::sw(0, 2, 0x100),
        asm::jal(0, -12),
    ]
}

fn bench_fetch(c: &mut Criterion) {
    let rom = counting_loop();

    c.bench_function("rom_10k_cycles", |b| {
        let mut machine =
            build_machine(&SocConfig::default(), BootImage::from_rom(rom.clone())).unwrap();
        b.iter(|| {
            machine.run(black_box(10_000));
        })
    });

    c.bench_function("spi_flash_10k_cycles", |b| {
        let config = SocConfig {
            boot: BootConfig::spi_flash(),
            ..Default::default()
        };
        let mut machine = build_machine(&config, BootImage::from_rom(rom.clone())).unwrap();
        b.iter(|| {
            machine.run(black_box(10_000));
        })
    });
}

criterion_group!(benches, bench_fetch);
criterion_main!(benches);
