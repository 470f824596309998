use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use lx_core::{CommandContext, GlobalOptions};
use tracing_subscriber::EnvFilter;

mod cli;
mod dispatch;
mod output;
mod style;

use cli::LxCli;
use output::{emit_output, OutputOptions};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = LxCli::parse();
    init_tracing(cli.trace, cli.verbose);

    let args = cli.command.layer_args();
    let global = GlobalOptions {
        quiet: args.quiet,
        verbose: cli.verbose,
        trace: cli.trace,
        json: cli.json,
    };
    let ctx = CommandContext::new(&global).map_err(|err| eyre!("{err:?}"))?;
    let (info, outcome) = dispatch::dispatch_command(&ctx, &cli.command)?;

    let opts = OutputOptions {
        quiet: global.quiet,
        json: global.json,
        no_color: cli.no_color,
        verbose: global.verbose,
    };
    let code = emit_output(&opts, info, &outcome)?;
    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

/// Logs go to stderr; stdout may be carrying an archive.
fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_env("LX_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("lx_core={level},lx_cli={level}")));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
