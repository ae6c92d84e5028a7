mod cli;
mod ipc;

fn main() -> anyhow::Result<()> {
    galaxyctl::logging::init();
    cli::run()
}
