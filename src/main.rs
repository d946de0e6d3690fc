use clap::{Parser, Subcommand};
use ochre::cli::{self, CheckOptions, CliError, EvalOptions};
use std::io::{self, Read};

#[derive(Parser)]
#[command(name = "ochre")]
#[command(about = "Ochre - a typed expression engine for data-driven map styling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an expression without evaluating it
    Check {
        /// The expression JSON to validate
        expression: String,

        /// Expected result type (number, string, boolean, color)
        #[arg(long)]
        expect: Option<String>,
    },

    /// Evaluate an expression against a feature and zoom
    Eval {
        /// The expression JSON to evaluate
        expression: String,

        /// Feature JSON (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Zoom level
        #[arg(short, long, default_value_t = 0.0)]
        zoom: f64,

        /// Feature-state JSON object
        #[arg(long)]
        state: Option<String>,

        /// Expected result type (number, string, boolean, color)
        #[arg(long)]
        expect: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { expression, expect } => run_check(expression, expect),
        Commands::Eval {
            expression,
            input,
            zoom,
            state,
            expect,
            pretty,
        } => run_eval(expression, input, zoom, state, expect, pretty),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_check(expression: String, expect: Option<String>) -> Result<(), CliError> {
    let options = CheckOptions { expression, expect };
    cli::execute_check(&options)?;
    println!("Syntax is valid");
    Ok(())
}

fn run_eval(
    expression: String,
    input: Option<String>,
    zoom: f64,
    state: Option<String>,
    expect: Option<String>,
    pretty: bool,
) -> Result<(), CliError> {
    let input = match input {
        Some(s) => Some(s),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(CliError::Io)?;
            Some(buffer)
        }
        None => None,
    };

    let options = EvalOptions {
        expression,
        input,
        zoom,
        state,
        expect,
    };

    let output = cli::execute_eval(&options)?;
    let json = if pretty {
        serde_json::to_string_pretty(&output)
    } else {
        serde_json::to_string(&output)
    }
    .map_err(CliError::Json)?;
    println!("{}", json);
    Ok(())
}
