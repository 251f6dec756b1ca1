// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cpu::{CoreConfig, RiscV};
use rvsoc_config::SocConfig;

pub fn configure_riscv(config: &SocConfig) -> RiscV {
    RiscV::with_config(CoreConfig {
        strict_decode: config.strict_decode,
        strict_csr: config.strict_csr,
    })
}
