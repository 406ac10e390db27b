//! Instruction execution and the fetch-decode-execute dispatch loop.

use crate::bits::SignExtend;
use crate::console::Console;
use crate::instruction::Register::*;
use crate::instruction::Instruction;
use crate::machine::Machine;
use crate::trap::{TrapVector, IN_PROMPT};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// RTI or RES reached dispatch: a malformed program, fatal per spec §7.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionError {
    /// RTI (opcode 1000) executed outside privileged mode.
    Unused,
    /// RES (opcode 1101), a reserved encoding.
    Reserved,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::Unused => write!(f, "RTI executed outside privileged mode"),
            ExecutionError::Reserved => write!(f, "reserved opcode executed"),
        }
    }
}

impl std::error::Error for ExecutionError {}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install a SIGINT handler that the dispatch loop polls once per iteration.
/// Installing more than once is harmless; `nix` just replaces the handler.
pub fn install_sigint_handler() -> nix::Result<()> {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    let action = SigAction::new(
        SigHandler::Handler(handle_sigint),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe { sigaction(Signal::SIGINT, &action) }?;
    Ok(())
}

pub fn was_interrupted() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}

/// Run the fetch-decode-execute loop until HALT, SIGINT, or a fatal error.
///
/// Returns `Ok(true)` on a normal HALT, `Ok(false)` if interrupted, or an
/// `ExecutionError` if the program hit a reserved or unused opcode.
pub fn run(machine: &mut Machine, console: &mut dyn Console) -> Result<bool, ExecutionError> {
    while machine.running {
        if was_interrupted() {
            return Ok(false);
        }

        let word = machine.memory.read(machine.pc, console);
        machine.pc = machine.pc.wrapping_add(1);

        let instruction = Instruction::decode(word);
        execute(machine, console, instruction)?;
    }

    Ok(true)
}

/// Execute a single decoded instruction, mutating `machine` and, for trap
/// routines, interacting with `console`.
pub fn execute(
    machine: &mut Machine,
    console: &mut dyn Console,
    instruction: Instruction,
) -> Result<(), ExecutionError> {
    match instruction {
        // BR - Conditional Branch
        //
        // The condition codes specified by bits [11:9] are tested. If any
        // tested flag matches the current condition code, branch to
        // PC + sext(PCoffset9, 9).
        Instruction::BR(condition, pc_offset) => {
            let taken = (condition.n && machine.condition == crate::machine::Condition::N)
                || (condition.z && machine.condition == crate::machine::Condition::Z)
                || (condition.p && machine.condition == crate::machine::Condition::P);

            if taken {
                machine.pc = machine.pc.wrapping_add(pc_offset.sign_extend(9));
            }
        }

        // ADD - DR <- SR1 + SR2 (or SR1 + sext(imm5, 5)); flags updated from DR.
        Instruction::ADD(dr, sr1, sr2) => {
            let value = machine
                .registers
                .read(sr1)
                .wrapping_add(machine.registers.read(sr2));
            machine.registers.write(dr, value);
            machine.update_flags(dr);
        }
        Instruction::ADDIMM(dr, sr1, imm5) => {
            let value = machine.registers.read(sr1).wrapping_add(imm5.sign_extend(5));
            machine.registers.write(dr, value);
            machine.update_flags(dr);
        }

        // LD - DR <- mem[PC + sext(PCoffset9, 9)]; flags updated from DR.
        Instruction::LD(dr, pc_offset) => {
            let address = machine.pc.wrapping_add(pc_offset.sign_extend(9));
            let value = machine.memory.read(address, console);
            machine.registers.write(dr, value);
            machine.update_flags(dr);
        }

        // ST - mem[PC + sext(PCoffset9, 9)] <- SR.
        Instruction::ST(sr, pc_offset) => {
            let address = machine.pc.wrapping_add(pc_offset.sign_extend(9));
            machine.memory.write(address, machine.registers.read(sr));
        }

        // JSR - R7 <- PC (already incremented); PC <- PC + sext(PCoffset11, 11).
        // R7 is written from the pre-jump PC exactly once, before PC moves.
        Instruction::JSR(pc_offset) => {
            let return_address = machine.pc;
            machine.pc = machine.pc.wrapping_add(pc_offset.sign_extend(11));
            machine.registers.write(R7, return_address);
        }
        // JSRR - R7 <- PC; PC <- register[BaseR].
        Instruction::JSRR(base_r) => {
            let return_address = machine.pc;
            machine.pc = machine.registers.read(base_r);
            machine.registers.write(R7, return_address);
        }

        // AND - DR <- SR1 & SR2 (or SR1 & sext(imm5, 5)); flags updated from DR.
        Instruction::AND(dr, sr1, sr2) => {
            let value = machine.registers.read(sr1) & machine.registers.read(sr2);
            machine.registers.write(dr, value);
            machine.update_flags(dr);
        }
        Instruction::ANDIMM(dr, sr1, imm5) => {
            let value = machine.registers.read(sr1) & imm5.sign_extend(5);
            machine.registers.write(dr, value);
            machine.update_flags(dr);
        }

        // LDR - DR <- mem[register[BaseR] + sext(offset6, 6)]; flags updated from DR.
        Instruction::LDR(dr, base_r, offset) => {
            let address = machine
                .registers
                .read(base_r)
                .wrapping_add(offset.sign_extend(6));
            let value = machine.memory.read(address, console);
            machine.registers.write(dr, value);
            machine.update_flags(dr);
        }

        // STR - mem[register[BaseR] + sext(offset6, 6)] <- SR.
        Instruction::STR(sr, base_r, offset) => {
            let address = machine
                .registers
                .read(base_r)
                .wrapping_add(offset.sign_extend(6));
            machine.memory.write(address, machine.registers.read(sr));
        }

        Instruction::UNUSED => return Err(ExecutionError::Unused),

        // NOT - DR <- !SR; flags updated from DR.
        Instruction::NOT(dr, sr) => {
            machine.registers.write(dr, !machine.registers.read(sr));
            machine.update_flags(dr);
        }

        // LDI - DR <- mem[mem[PC + sext(PCoffset9, 9)]]; flags updated from DR.
        Instruction::LDI(dr, pc_offset) => {
            let pointer_address = machine.pc.wrapping_add(pc_offset.sign_extend(9));
            let address = machine.memory.read(pointer_address, console);
            let value = machine.memory.read(address, console);
            machine.registers.write(dr, value);
            machine.update_flags(dr);
        }

        // STI - mem[mem[PC + sext(PCoffset9, 9)]] <- SR.
        Instruction::STI(sr, pc_offset) => {
            let pointer_address = machine.pc.wrapping_add(pc_offset.sign_extend(9));
            let address = machine.memory.read(pointer_address, console);
            machine.memory.write(address, machine.registers.read(sr));
        }

        // JMP - PC <- register[BaseR]. RET is the special case BaseR = R7.
        Instruction::JMP(base_r) => {
            machine.pc = machine.registers.read(base_r);
        }

        Instruction::RESERVED => return Err(ExecutionError::Reserved),

        // LEA - DR <- PC + sext(PCoffset9, 9); flags updated from DR.
        Instruction::LEA(dr, pc_offset) => {
            let address = machine.pc.wrapping_add(pc_offset.sign_extend(9));
            machine.registers.write(dr, address);
            machine.update_flags(dr);
        }

        // TRAP - R7 <- PC (already incremented); dispatch on the trap vector.
        // Condition flags are not touched by TRAP itself; GETC and IN are
        // specified not to update flags even though they write R0.
        Instruction::TRAP(trap_vector) => {
            machine.registers.write(R7, machine.pc);
            execute_trap(machine, console, trap_vector);
        }
    }

    Ok(())
}

fn execute_trap(machine: &mut Machine, console: &mut dyn Console, trap_vector: TrapVector) {
    match trap_vector {
        // GETC - R0 <- blocking read of one character (high 8 bits cleared).
        TrapVector::GETC => {
            let byte = console.read_char();
            machine.registers.write(R0, u16::from(byte));
        }

        // OUT - write R0[7:0] to the console.
        TrapVector::OUT => {
            console.write_char(machine.registers.read(R0) as u8);
            console.flush();
        }

        // PUTS - write successive memory words (one char each, low byte) from
        // R0 until a zero word.
        TrapVector::PUTS => {
            let mut address = machine.registers.read(R0);
            loop {
                let word = machine.memory.read(address, console);
                if word == 0 {
                    break;
                }
                console.write_char(word as u8);
                address = address.wrapping_add(1);
            }
            console.flush();
        }

        // IN - prompt, then R0 <- blocking read of one character, echoed.
        TrapVector::IN => {
            for byte in IN_PROMPT.bytes() {
                console.write_char(byte);
            }
            console.flush();

            let byte = console.read_char();
            console.write_char(byte);
            console.flush();

            machine.registers.write(R0, u16::from(byte));
        }

        // PUTSP - write two packed characters per word (low byte, then high
        // byte if nonzero) from R0 until a zero word.
        TrapVector::PUTSP => {
            let mut address = machine.registers.read(R0);
            loop {
                let word = machine.memory.read(address, console);
                if word == 0 {
                    break;
                }

                let low = (word & 0xFF) as u8;
                console.write_char(low);

                let high = (word >> 8) as u8;
                if high != 0 {
                    console.write_char(high);
                }

                address = address.wrapping_add(1);
            }
            console.flush();
        }

        // HALT - print a message, stop the dispatch loop.
        TrapVector::HALT => {
            console.write_line("HALT");
            machine.running = false;
        }
    }
}
