// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Trap decoders and the fail-stop fault handler registry.
// Author: Lukas Bower

//! Machine-mode trap decoding.
//!
//! Handlers are installed once during bring-up and never removed. Dispatching a
//! trap decodes and logs the machine state, then moves the registry into the
//! terminal halted state. Kernel builds follow up with [`halt_forever`].

use alloc::boxed::Box;
use core::fmt;

use heapless::Vec as HeaplessVec;

use crate::error::FaultError;

/// General-purpose and capability registers captured by the trap entry stub.
pub const TRAP_FRAME_REGS: usize = 35;
/// Vector slots available in the registry.
pub const MAX_TRAP_VECTORS: usize = 8;

const MCAUSE_INTERRUPT: usize = 1 << (usize::BITS - 1);

/// Register file saved on trap entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapFrame {
    /// `x0`..`x34` in save order.
    pub regs: [usize; TRAP_FRAME_REGS],
}

impl Default for TrapFrame {
    fn default() -> Self {
        Self {
            regs: [0; TRAP_FRAME_REGS],
        }
    }
}

/// Machine CSRs sampled at trap time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrapCsrs {
    /// Trap cause.
    pub mcause: usize,
    /// Faulting program counter.
    pub mepc: usize,
    /// CHERI capability cause register.
    pub mccsr: usize,
}

impl TrapCsrs {
    /// Exception code with the interrupt bit cleared.
    #[must_use]
    pub const fn exception_code(&self) -> u32 {
        (self.mcause & !MCAUSE_INTERRUPT) as u32
    }

    /// Whether the trap is an asynchronous interrupt.
    #[must_use]
    pub const fn is_interrupt(&self) -> bool {
        self.mcause & MCAUSE_INTERRUPT != 0
    }

    /// Sample `mcause`, `mepc`, and `mccsr` on the current hart.
    #[cfg(all(feature = "kernel", any(target_arch = "riscv32", target_arch = "riscv64")))]
    #[allow(unsafe_code)]
    #[must_use]
    pub fn read() -> Self {
        let (mcause, mepc, mccsr): (usize, usize, usize);
        // SAFETY: CSR reads have no side effects in machine mode.
        unsafe {
            core::arch::asm!("csrr {0}, mcause", out(reg) mcause);
            core::arch::asm!("csrr {0}, mepc", out(reg) mepc);
            core::arch::asm!("csrr {0}, 0xbc0", out(reg) mccsr);
        }
        Self { mcause, mepc, mccsr }
    }
}

/// Decoded CHERI capability cause register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityFault {
    /// CHERI exception cause.
    pub cause: u8,
    /// Register that held the offending capability.
    pub reg: u8,
    /// Set when `reg` names a special capability register.
    pub is_scr: bool,
}

impl CapabilityFault {
    /// Split `mccsr` into its cause, register, and SCR fields.
    #[must_use]
    pub const fn decode(ccsr: usize) -> Self {
        Self {
            cause: ((ccsr >> 5) & 0x1f) as u8,
            reg: ((ccsr >> 10) & 0x1f) as u8,
            is_scr: (ccsr >> 15) & 0x1 == 1,
        }
    }

    /// Human-readable CHERI cause.
    #[must_use]
    pub const fn cause_label(&self) -> &'static str {
        match self.cause {
            0x00 => "none",
            0x01 => "length violation",
            0x02 => "tag violation",
            0x03 => "seal violation",
            0x04 => "type violation",
            0x08 => "software permission violation",
            0x0a => "representability violation",
            0x0b => "unaligned base",
            0x10 => "global violation",
            0x11 => "permit execute violation",
            0x12 => "permit load violation",
            0x13 => "permit store violation",
            0x14 => "permit load capability violation",
            0x15 => "permit store capability violation",
            0x16 => "permit store local capability violation",
            0x17 => "permit seal violation",
            0x18 => "access system registers violation",
            0x19 => "permit cinvoke violation",
            0x1a => "access cinvoke idc violation",
            0x1b => "permit unseal violation",
            0x1c => "permit set cid violation",
            _ => "reserved",
        }
    }
}

impl fmt::Display for CapabilityFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cause={:#04x} ({}) reg={} scr={}",
            self.cause,
            self.cause_label(),
            self.reg,
            self.is_scr
        )
    }
}

/// What a handler learned about a trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapReport {
    /// Label of the handler that ran.
    pub handler: &'static str,
    /// Raw `mcause`.
    pub mcause: usize,
    /// Faulting program counter.
    pub mepc: usize,
    /// Decoded capability fault, when the handler understands CHERI.
    pub capability: Option<CapabilityFault>,
}

/// Decoder for one class of trap.
pub trait TrapHandler: Send {
    /// Short name used in logs.
    fn label(&self) -> &'static str;

    /// Decode and log the trap state.
    fn handle(&self, csrs: &TrapCsrs, frame: &TrapFrame) -> TrapReport;
}

/// Decoder for CHERI capability exceptions; dumps the full register frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct CapabilityFaultDecoder;

impl TrapHandler for CapabilityFaultDecoder {
    fn label(&self) -> &'static str {
        "cheri"
    }

    fn handle(&self, csrs: &TrapCsrs, frame: &TrapFrame) -> TrapReport {
        let fault = CapabilityFault::decode(csrs.mccsr);
        log::error!(target: "modbus_node::fault", "[fault] CHERI exception");
        for (index, value) in frame.regs.iter().enumerate() {
            log::error!(target: "modbus_node::fault", "[fault] x{index}: {value:#x}");
        }
        log::error!(target: "modbus_node::fault", "[fault] mepc = {:#x}", csrs.mepc);
        log::error!(target: "modbus_node::fault", "[fault] {fault}");
        TrapReport {
            handler: self.label(),
            mcause: csrs.mcause,
            mepc: csrs.mepc,
            capability: Some(fault),
        }
    }
}

/// Fallback decoder for traps with no dedicated handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericTrapDecoder;

impl TrapHandler for GenericTrapDecoder {
    fn label(&self) -> &'static str {
        "generic"
    }

    fn handle(&self, csrs: &TrapCsrs, _frame: &TrapFrame) -> TrapReport {
        log::error!(
            target: "modbus_node::fault",
            "[fault] exception mcause = {:#x} mepc = {:#x}",
            csrs.mcause,
            csrs.mepc
        );
        TrapReport {
            handler: self.label(),
            mcause: csrs.mcause,
            mepc: csrs.mepc,
            capability: None,
        }
    }
}

/// Proof that the registry has reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a halted node must not resume"]
pub struct Halted {
    report: TrapReport,
}

impl Halted {
    /// Report produced by the trap that halted the node.
    pub const fn report(&self) -> &TrapReport {
        &self.report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegistryState {
    Running,
    Halted(TrapReport),
}

/// Trap vector table with fail-stop dispatch.
pub struct FaultHandlerRegistry {
    handlers: HeaplessVec<(u32, Box<dyn TrapHandler>), MAX_TRAP_VECTORS>,
    fallback: GenericTrapDecoder,
    state: RegistryState,
}

impl FaultHandlerRegistry {
    /// Empty registry in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HeaplessVec::new(),
            fallback: GenericTrapDecoder,
            state: RegistryState::Running,
        }
    }

    /// Register `handler` for exception code `cause`.
    pub fn install(&mut self, cause: u32, handler: Box<dyn TrapHandler>) -> Result<(), FaultError> {
        if self.is_halted() {
            return Err(FaultError::Halted);
        }
        if self.installed(cause) {
            return Err(FaultError::AlreadyInstalled { cause });
        }
        let label = handler.label();
        self.handlers
            .push((cause, handler))
            .map_err(|_| FaultError::TableFull)?;
        log::info!(
            target: "modbus_node::fault",
            "[fault] installed {label} handler at cause {cause:#x}"
        );
        Ok(())
    }

    /// Whether a handler is registered at `cause`.
    #[must_use]
    pub fn installed(&self, cause: u32) -> bool {
        self.handlers.iter().any(|(code, _)| *code == cause)
    }

    /// Whether a trap has been dispatched.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        matches!(self.state, RegistryState::Halted(_))
    }

    /// Decode a trap and halt. Once halted, later traps are not decoded and the
    /// first report is returned again.
    pub fn dispatch(&mut self, csrs: &TrapCsrs, frame: &TrapFrame) -> Halted {
        if let RegistryState::Halted(report) = self.state {
            return Halted { report };
        }
        let cause = csrs.exception_code();
        let report = match self.handlers.iter().find(|(code, _)| *code == cause) {
            Some((_, handler)) if !csrs.is_interrupt() => handler.handle(csrs, frame),
            _ => self.fallback.handle(csrs, frame),
        };
        self.state = RegistryState::Halted(report);
        Halted { report }
    }
}

impl Default for FaultHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FaultHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut causes = HeaplessVec::<u32, MAX_TRAP_VECTORS>::new();
        for (cause, _) in self.handlers.iter() {
            let _ = causes.push(*cause);
        }
        f.debug_struct("FaultHandlerRegistry")
            .field("causes", &causes)
            .field("state", &self.state)
            .finish()
    }
}

/// Park the hart after a fatal trap.
#[cfg(feature = "kernel")]
pub fn halt_forever(halted: Halted) -> ! {
    log::error!(
        target: "modbus_node::fault",
        "[fault] halted by {} handler at mepc={:#x}",
        halted.report.handler,
        halted.report.mepc
    );
    loop {
        core::hint::spin_loop();
    }
}

/// Machine trap entry: sample the CSRs, decode, and never return.
#[cfg(all(feature = "kernel", any(target_arch = "riscv32", target_arch = "riscv64")))]
pub fn handle_trap(registry: &mut FaultHandlerRegistry, frame: &TrapFrame) -> ! {
    let csrs = TrapCsrs::read();
    halt_forever(registry.dispatch(&csrs, frame))
}
