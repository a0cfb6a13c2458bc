//! HelmScript CLI — compile and run control scripts.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Input or compile error
//! - 3: Runtime error left unrecovered

mod commands;
mod session;

use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "compile" => commands::compile(&args[2..]),
        "run" => commands::run(&args[2..]),
        "--help" | "-h" | "help" => {
            print_usage();
            process::exit(0);
        }
        other => {
            eprintln!("error: unknown command '{other}'");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    if let Err(code) = result {
        process::exit(code);
    }
}

fn print_usage() {
    eprintln!("Usage: helm <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  compile <script.helm>                     Compile and list the opcodes");
    eprintln!("  run <script.helm> [--dt S] [--max-ticks N]  Run a script to completion");
    eprintln!();
    eprintln!("run options:");
    eprintln!("  --dt S          Seconds of script time per tick (default 0.02)");
    eprintln!("  --max-ticks N   Give up after N ticks (default 100000)");
}
