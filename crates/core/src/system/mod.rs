// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod builder;
pub mod riscv;

pub use builder::{build_machine, build_system_bus};
pub use riscv::configure_riscv;
