use std::cell::Cell;
use std::process;

use clap::Parser;
use colored::Colorize;
use formula_jit::{fastest_backend, BackendChoice, Formula};

#[derive(Parser)]
#[command(name = "formula-jit")]
#[command(about = "Evaluate a formula with the interpreting or the compiling backend")]
#[command(version)]
struct Args {
    /// Formula to evaluate, e.g. "x = y * z"
    expression: String,

    /// Backend to use: default, interpreting, compiling or fastest
    #[arg(short, long, default_value = "default")]
    backend: String,

    /// Variable binding, repeatable
    #[arg(short, long = "var", value_name = "NAME=VALUE", value_parser = parse_binding)]
    vars: Vec<(String, f64)>,

    /// Number of evaluations
    #[arg(short, long, default_value_t = 1)]
    repeat: u32,

    /// Print the optimized CLIF of the compiled routine
    #[arg(long)]
    ir: bool,
}

fn parse_binding(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid value for `{name}`: {e}"))?;
    Ok((name.trim().to_string(), value))
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_module("cranelift_codegen", log::LevelFilter::Warn)
        .filter_module("cranelift_jit", log::LevelFilter::Warn)
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), String> {
    let choice = if args.backend.eq_ignore_ascii_case("fastest") {
        fastest_backend()
    } else {
        args.backend.parse::<BackendChoice>()?
    };

    let mut formula = Formula::try_new(choice).map_err(|e| e.to_string())?;

    // Storage lives until the end of `run`, after the last evaluation
    let cells: Vec<(String, Cell<f64>)> = args
        .vars
        .iter()
        .map(|(name, value)| (name.clone(), Cell::new(*value)))
        .collect();
    for (name, cell) in &cells {
        // SAFETY: `cells` outlives `formula`'s last evaluation.
        if !unsafe { formula.set_variable(name, cell.as_ptr()) } {
            return Err(formula.error_string().to_string());
        }
    }

    if !formula.set_expression(&args.expression) {
        return Err(formula.error_string().to_string());
    }

    let mut result = f64::NAN;
    for _ in 0..args.repeat.max(1) {
        result = formula.evaluate();
        if !formula.error_string().is_empty() {
            return Err(formula.error_string().to_string());
        }
    }

    println!(
        "{} {}",
        "Backend:".bright_blue().bold(),
        formula.backend().to_string().italic()
    );
    println!("{} {}", "Result:".bright_green().bold(), result);
    for (name, cell) in &cells {
        println!("  {} = {}", name.bright_yellow(), cell.get());
    }

    if args.ir {
        match formula.compiled_ir() {
            Some(ir) => println!("{}\n{}", "CLIF IR:".bright_blue().bold(), ir),
            None => println!("{}", "No IR: the formula is interpreted".dimmed()),
        }
    }

    Ok(())
}
