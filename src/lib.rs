pub mod bits;
pub mod config;
pub mod console;
pub mod cpu;
pub mod instruction;
pub mod loader;
pub mod machine;
pub mod trap;

pub use crate::config::Config;
use crate::console::RawModeGuard;
use crate::machine::Machine;
use std::error::Error;
use std::fmt;

/// How the dispatch loop ended, for `main` to translate into an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Halted,
    Interrupted,
}

#[derive(Debug)]
struct RawModeError(nix::Error);

impl fmt::Display for RawModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to enter raw terminal mode: {}", self.0)
    }
}

impl Error for RawModeError {}

/// Load every image in `config`, then run the machine to completion.
///
/// Image-loading failures surface as `Err` before the terminal is ever put
/// into raw mode, so no restoration is needed on that path (spec §7.1).
/// Once the dispatch loop starts, the `RawModeGuard` guarantees the
/// terminal is restored on every remaining exit path: HALT, interruption,
/// or a fatal execution error.
pub fn run(config: Config) -> Result<Outcome, Box<dyn Error>> {
    let mut machine = Machine::new();

    for path in &config.image_paths {
        crate::loader::load_image(path, &mut machine)?;
    }

    cpu::install_sigint_handler().map_err(RawModeError)?;

    let mut guard = RawModeGuard::acquire().map_err(RawModeError)?;
    let halted = cpu::run(&mut machine, guard.console())?;

    Ok(if halted {
        Outcome::Halted
    } else {
        Outcome::Interrupted
    })
}
