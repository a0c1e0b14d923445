pub mod classify;
pub mod cli;
pub mod defaults;
pub mod instance;
pub mod jq_exec;
pub mod load;
pub mod render;
pub mod spec;

fn main() -> anyhow::Result<()> {
    cli::CommandLineInterface::load().run()
}
