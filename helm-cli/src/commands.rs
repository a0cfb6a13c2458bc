//! CLI command implementations.

use crate::session::Session;
use helmscript_compiler::ScriptCompiler;
use helmscript_vm::MachineConfig;
use std::fs;
use std::path::Path;

/// Compile a script and print the opcode listing per part.
pub fn compile(args: &[String]) -> Result<(), i32> {
    if args.is_empty() {
        eprintln!("error: compile requires an input file");
        eprintln!("Usage: helm compile <script.helm>");
        return Err(1);
    }

    let input = &args[0];
    let text = fs::read_to_string(input).map_err(|e| {
        eprintln!("error: cannot read '{input}': {e}");
        1
    })?;

    let mut compiler = ScriptCompiler::new();
    let parts = compiler.compile(&text, "").map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    for part in &parts {
        println!("{}:", part.name);
        for (offset, op) in part.code.iter().enumerate() {
            println!("  {offset:4}  {op}");
        }
    }
    Ok(())
}

/// Run a script on a single machine until it goes idle.
///
/// Sibling `.helm` files in the script's directory are loaded onto the
/// machine's volume, so `RUN "name".` resolves against them.
pub fn run(args: &[String]) -> Result<(), i32> {
    if args.is_empty() {
        eprintln!("error: run requires an input file");
        eprintln!("Usage: helm run <script.helm> [--dt S] [--max-ticks N]");
        return Err(1);
    }

    let input = &args[0];
    let mut dt = 0.02f64;
    let mut max_ticks = 100_000u64;

    let mut rest = args[1..].iter();
    while let Some(flag) = rest.next() {
        match flag.as_str() {
            "--dt" => {
                dt = parse_flag_value(rest.next(), "--dt")?;
            }
            "--max-ticks" => {
                max_ticks = parse_flag_value(rest.next(), "--max-ticks")?;
            }
            other => {
                eprintln!("error: unknown option '{other}'");
                return Err(1);
            }
        }
    }

    let text = fs::read_to_string(input).map_err(|e| {
        eprintln!("error: cannot read '{input}': {e}");
        1
    })?;

    let mut session = Session::new(MachineConfig::default());
    let cpu = session.add_processor("local");
    load_sibling_files(&mut session, input);

    session.interpret(cpu, &text).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    let mut ticks = 0u64;
    while session.busy() {
        if ticks >= max_ticks {
            eprintln!("error: still running after {max_ticks} ticks, giving up");
            return Err(3);
        }
        session.tick(dt);
        ticks += 1;
        for line in session.drain_output() {
            println!("{line}");
        }
    }
    for line in session.drain_output() {
        println!("{line}");
    }
    Ok(())
}

fn parse_flag_value<T: std::str::FromStr>(value: Option<&String>, flag: &str) -> Result<T, i32> {
    let raw = value.ok_or_else(|| {
        eprintln!("error: {flag} requires a value");
        1
    })?;
    raw.parse().map_err(|_| {
        eprintln!("error: invalid value '{raw}' for {flag}");
        1
    })
}

/// Register every `.helm` file next to the script on the machine's
/// volume, under both its stem and its full file name.
fn load_sibling_files(session: &mut Session, input: &str) {
    let path = Path::new(input);
    let Some(dir) = path.parent() else {
        return;
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let sibling = entry.path();
        if sibling.extension().and_then(|ext| ext.to_str()) != Some("helm") {
            continue;
        }
        let Ok(text) = fs::read_to_string(&sibling) else {
            continue;
        };
        if let Some(name) = sibling.file_name().and_then(|name| name.to_str()) {
            session.add_file("local", name, &text);
        }
        if let Some(stem) = sibling.file_stem().and_then(|stem| stem.to_str()) {
            session.add_file("local", stem, &text);
        }
    }
}
