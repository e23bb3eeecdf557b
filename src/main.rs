//! previsbine CLI entry point.

use std::fs::File;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use previsbine::cli::{Cli, CommandDispatcher, Commands};
use previsbine::pipeline::CancelToken;
use previsbine::sys::{install_interrupt_handler, is_ci};
use previsbine::ui::{create_ui, OutputMode};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
///
/// With `--log-file` the same events are also appended to that file,
/// without colour codes.
fn init_tracing(debug: bool, log_file: Option<&Path>) {
    let filter = if debug {
        EnvFilter::new("previsbine=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("previsbine=info"))
    };

    let file_layer = log_file.and_then(|path| {
        match File::options().create(true).append(true).open(path) {
            Ok(file) => Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            ),
            Err(e) => {
                eprintln!("Cannot open log file {}: {}", path.display(), e);
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.log_file.as_deref());

    tracing::debug!("previsbine starting with args: {:?}", cli);

    let output_mode = OutputMode::from_flags(cli.verbose, cli.quiet);

    let working_dir = cli
        .working_dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    // Only a build needs to survive Ctrl-C long enough to write its report
    let cancel = CancelToken::new();
    let runs_build = matches!(cli.command, None | Some(Commands::Run(_)));
    if runs_build {
        if let Err(e) = install_interrupt_handler(cancel.flag()) {
            tracing::warn!("Could not install the interrupt handler: {}", e);
        }
    }

    let is_interactive = match &cli.command {
        Some(Commands::Run(args)) => !args.non_interactive && !is_ci(),
        _ => !is_ci(),
    };

    let mut ui = create_ui(is_interactive, output_mode, cli.no_color);

    let dispatcher = CommandDispatcher::new(working_dir)
        .with_config_file(cli.config.clone())
        .with_cancel(cancel);

    match dispatcher.dispatch(&cli, ui.as_mut()) {
        Ok(result) => ExitCode::from(u8::try_from(result.exit_code).unwrap_or(1)),
        Err(e) => {
            ui.error(&format!("Error: {}", e));
            ExitCode::from(1)
        }
    }
}
