use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use miette::{bail, miette, IntoDiagnostic, Result};

use lmc::oracle::{join, Sequence};
use lmc::output::{
    file_message, memory_table, message, print_output, print_trace, registers_table, MsgColor,
    Output,
};
use lmc::{
    assemble, LabelTable, Machine, Memory, Program, RunConfig, Step, Word, RAM_SIZE, WORD_MAX,
    WORD_MIN,
};

/// lmc is an assembler and virtual machine for the Little Man Computer.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a source file to run with input 0
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a source file, or a `.mem` memory image, and print its output
    Run {
        /// Source or `.mem` file to run
        name: PathBuf,
        /// Value read by every `IN` instruction
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true, value_parser = word_parser)]
        input: Word,
        /// Mailbox to start executing from
        #[arg(short, long, default_value_t = 0, value_parser = address_parser)]
        start: usize,
        /// Give up after this many fetch-execute cycles
        #[arg(long)]
        max_cycles: Option<u64>,
        /// Print every fetch-execute cycle to stderr
        #[arg(short, long)]
        trace: bool,
        /// Print memory and registers once halted
        #[arg(short, long)]
        dump: bool,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Run a source file once for every input in a range, optionally checking its output
    #[command(allow_negative_numbers = true)]
    Sweep {
        /// Source file to run
        name: PathBuf,
        /// First input
        #[arg(value_parser = word_parser)]
        from: Word,
        /// Last input (inclusive), defaults to `from`
        #[arg(value_parser = word_parser)]
        to: Option<Word>,
        /// Sequence the output must match (`bsc` or `adv`)
        #[arg(short, long)]
        check: Option<Sequence>,
        /// Whether a sequence that leaves the mailbox range ends with `0`
        #[arg(short, long, default_value_t = true, action = ArgAction::Set)]
        zero: bool,
        /// Give up on a run after this many fetch-execute cycles
        #[arg(long)]
        max_cycles: Option<u64>,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Assemble a source file into a `.mem` memory image and show its mailboxes
    Compile {
        /// Source file to compile
        name: PathBuf,
        /// Destination to output `.mem` file
        dest: Option<PathBuf>,
    },
    /// Assemble source files without running them
    Check {
        /// Files or glob patterns to check, e.g. `programs/*.asm`
        #[arg(required = true)]
        patterns: Vec<String>,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    lmc::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(lmc::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    if let Some(command) = args.command {
        match command {
            Command::Run {
                name,
                input,
                start,
                max_cycles,
                trace,
                dump,
                minimal,
            } => {
                Output::set_minimal(minimal);
                let config = RunConfig::new(input)
                    .start_pc(start)
                    .max_cycles(max_cycles.or(lmc::env::max_cycles()));
                run(&name, config, trace || lmc::env::is_trace_enabled(), dump)
            }
            Command::Sweep {
                name,
                from,
                to,
                check,
                zero,
                max_cycles,
                minimal,
            } => {
                Output::set_minimal(minimal);
                let to = to.unwrap_or(from);
                if to < from {
                    bail!("Input range {from}..={to} is empty");
                }
                let max_cycles = max_cycles.or(lmc::env::max_cycles());
                sweep(&name, from..=to, check.map(|seq| (seq, zero)), max_cycles)
            }
            Command::Compile { name, dest } => {
                file_message(Green, "Assembling", &name);
                let program = assemble_file(&name)?;
                let mem = program.emit();

                let out_file_name = dest.unwrap_or_else(|| name.with_extension("mem"));
                let mut file = File::create(&out_file_name).into_diagnostic()?;
                write!(file, "{mem}").into_diagnostic()?;

                print!("{}", memory_table(&mem, Some(program.labels())));
                message(
                    Green,
                    "Finished",
                    format!("{} of {} mailboxes used", program.mailboxes(), RAM_SIZE).as_str(),
                );
                file_message(Green, "Saved", &out_file_name);
                Ok(())
            }
            Command::Check { patterns } => check(&patterns),
        }
    } else if let Some(path) = args.path {
        run(&path, RunConfig::new(0), lmc::env::is_trace_enabled(), false)
    } else {
        println!("\n~ lmc v{VERSION} ~");
        println!("{}", LOGO.truecolor(255, 183, 197).bold());
        println!("{SHORT_INFO}");
        std::process::exit(0);
    }
}

fn word_parser(s: &str) -> std::result::Result<Word, String> {
    let val: Word = s.parse().map_err(|e| format!("{e}"))?;
    if !(WORD_MIN..=WORD_MAX).contains(&val) {
        return Err(format!("must be from {WORD_MIN} to {WORD_MAX}"));
    }
    Ok(val)
}

fn address_parser(s: &str) -> std::result::Result<usize, String> {
    let val: usize = s.parse().map_err(|e| format!("{e}"))?;
    if val >= RAM_SIZE {
        return Err(format!("must be a mailbox from 0 to {}", RAM_SIZE - 1));
    }
    Ok(val)
}

/// Read and assemble a source file, rendering any error over its contents.
fn assemble_file(name: &Path) -> Result<Program> {
    let contents = fs::read_to_string(name).into_diagnostic()?;
    assemble(&contents).map_err(|err| err.report(&contents))
}

fn run(name: &Path, config: RunConfig, trace: bool, dump: bool) -> Result<()> {
    file_message(MsgColor::Green, "Assembling", name);
    let (mem, labels) = match name.extension().and_then(|ext| ext.to_str()) {
        Some("mem") => {
            let contents = fs::read_to_string(name).into_diagnostic()?;
            let mem: Memory = contents.parse().into_diagnostic()?;
            (mem, LabelTable::new())
        }
        _ => {
            let program = assemble_file(name)?;
            (program.emit(), program.labels().clone())
        }
    };

    message(MsgColor::Green, "Running", "memory image");
    let machine = Machine::new(mem, config).map_err(|e| e.report())?;
    let exec = if trace {
        machine.run_traced(|m: &Machine, step: &Step| print_trace(&labels, m, step))
    } else {
        machine.run()
    }
    .map_err(|e| e.report())?;

    print_output(&exec.output);
    message(
        MsgColor::Cyan,
        "Halted",
        format!("after {} fetch-execute cycles", exec.cycles).as_str(),
    );
    if dump {
        println!();
        print!("{}", memory_table(&exec.memory, Some(&labels)));
        println!("{}", registers_table(&exec.registers, exec.cycles));
    }
    file_message(MsgColor::Green, "Completed", name);
    Ok(())
}

fn sweep(
    name: &Path,
    inputs: std::ops::RangeInclusive<Word>,
    check: Option<(Sequence, bool)>,
    max_cycles: Option<u64>,
) -> Result<()> {
    file_message(MsgColor::Green, "Assembling", name);
    let program = assemble_file(name)?;

    let runs = inputs.clone().count() as u64;
    let mut total_cycles = 0;
    for input in inputs {
        // Every run starts from a fresh image and fresh registers
        let config = RunConfig::new(input).max_cycles(max_cycles);
        let exec = Machine::new(program.emit(), config)
            .and_then(Machine::run)
            .map_err(|e| e.report().wrap_err(format!("While running with input {input}")))?;

        println!("{input:>4} > {}", join(&exec.output));
        if let Some((seq, zero)) = check {
            seq.check(input, zero, &exec.output)
                .map_err(|mismatch| miette!("{}", mismatch))?;
        }
        total_cycles += exec.cycles;
    }

    if check.is_some() {
        message(MsgColor::Green, "Success", "all outputs match");
    }
    message(
        MsgColor::Cyan,
        "Mailboxes",
        format!("{} used", program.mailboxes()).as_str(),
    );
    message(
        MsgColor::Cyan,
        "Cycles",
        format!("{} on average", total_cycles / runs).as_str(),
    );
    if Output::is_minimal() {
        println!("mailboxes {}", program.mailboxes());
        println!("average cycles {}", total_cycles / runs);
    }
    Ok(())
}

fn check(patterns: &[String]) -> Result<()> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let matches = glob::glob(pattern).into_diagnostic()?;
        let before = paths.len();
        for entry in matches {
            paths.push(entry.into_diagnostic()?);
        }
        if paths.len() == before {
            bail!("No files match `{pattern}`");
        }
    }

    let mut failed = 0;
    for path in &paths {
        file_message(MsgColor::Green, "Checking", path);
        match assemble_file(path) {
            Ok(program) => message(
                MsgColor::Green,
                "Success",
                format!("{} mailboxes used", program.mailboxes()).as_str(),
            ),
            Err(report) => {
                failed += 1;
                eprintln!("{:?}", report);
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} files failed to assemble", paths.len());
    }
    Ok(())
}

const LOGO: &str = r#"
 _
| |_ __ ___   ___
| | '_ ` _ \ / __|
| | | | | | | (__
|_|_| |_| |_|\___|"#;

const SHORT_INFO: &str = r"
Welcome to lmc, an assembler and virtual machine for the Little Man Computer.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
