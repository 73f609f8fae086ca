mod inspect;
mod prepare;

use inspect::run_inspect;
use prepare::run_prepare;

use anyhow::Result;

use crate::cli::Command;
use crate::display::Context;

pub fn dispatch(command: Command, ctx: Context) -> Result<()> {
    match command {
        Command::Prepare(args) => run_prepare(args, ctx),
        Command::Inspect(args) => run_inspect(args, ctx),
    }
}
