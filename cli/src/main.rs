mod case;
mod predicates;
mod test_runner;

use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const SUBCOMMANDS: &[&str] = &["run", "test", "help"];

#[derive(Parser)]
#[command(name = "patmatch", version, about = "Structural pattern matching case runner")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Match one case file and print the captures
    Run(RunArgs),

    /// Run .case.toml files and check their expectations
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Case file to match
    file: String,

    /// Print the parsed pattern before matching
    #[arg(long)]
    show_pattern: bool,

    /// Only report through the exit code
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .case.toml file or directory containing them
    path: String,

    /// Run only cases in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

/// Logs go to stderr, and only when RUST_LOG asks for them.
fn init_tracing() {
    let Ok(filter) = EnvFilter::try_from_default_env() else {
        return;
    };
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

fn main() {
    init_tracing();

    // `patmatch file.case.toml` works like `patmatch run file.case.toml`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args.iter().skip(1).position(|a| !a.starts_with('-')) {
        let pos = pos + 1;
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "run".to_string());
        }
    }

    let cli = Cli::parse_from(&args);

    match cli.command {
        Command::Run(run_args) => process::exit(do_run(run_args, cli.no_color)),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

/// Exit codes: 0 matched, 1 no match, 2 the case could not be loaded or
/// the match raised an error.
fn do_run(args: RunArgs, no_color: bool) -> i32 {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            return 2;
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());

    let binder = test_runner::binder_name(Path::new(&args.file));

    let case = match case::parse_case(&source, &binder) {
        Ok(case) => case,
        Err(err) => {
            let writer = StandardStream::stderr(color_choice);
            let config = term::Config::default();
            let diagnostic = err.to_diagnostic(file_id);
            let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
            return 2;
        }
    };

    if args.show_pattern && !args.quiet {
        println!("pattern: {}", case.pattern);
        println!("subject: {}", case.subject);
    }

    match case.run() {
        Ok(Some(bindings)) => {
            if !args.quiet {
                println!("matched");
                for (name, value) in &bindings {
                    println!("  {} = {}", name, value);
                }
            }
            0
        }
        Ok(None) => {
            if !args.quiet {
                println!("no match");
            }
            1
        }
        Err(err) => {
            eprintln!("match error: {}", err);
            2
        }
    }
}
