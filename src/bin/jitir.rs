//! jitir - translate `.pcode` files into use-def graphs.
//!
//! `jitir translate` runs the translation pipeline over one or more files
//! and prints the requested sections; `jitir check` runs the files as
//! FileCheck-style tests; `jitir userops` lists the built-in userops.

use clap::{Parser, Subcommand};
use jitir::config::{MismatchPolicy, PrintOptions, TranslatorConfig};
use jitir::core::{RegisterMap, UseropLibrary};
use jitir::driver::translate_units;
use jitir::pcode::{Program, TestRunner, TestSpec};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jitir")]
#[command(about = "Translate p-code units into an optimized use-def graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate units and print the results
    Translate {
        /// Input files; reads stdin when empty
        #[arg(value_name = "INPUT")]
        input: Vec<PathBuf>,

        /// Print each graph after dead-code elimination
        #[arg(long)]
        print_graph: bool,

        /// Print resolved value types and type diagnostics
        #[arg(long)]
        print_types: bool,

        /// Print the scheduled lowering plan
        #[arg(long)]
        print_plan: bool,

        /// Print translation statistics
        #[arg(long)]
        print_stats: bool,

        /// Keep dead operations
        #[arg(long)]
        no_dce: bool,

        /// Check use-set consistency after every pass
        #[arg(long)]
        verify: bool,

        /// What to do with type mismatches (coerce, reject)
        #[arg(long, default_value = "coerce")]
        mismatch: MismatchPolicy,

        /// Worker threads
        #[arg(short = 'j', long, default_value = "1")]
        threads: usize,

        /// Report values tainted by a built-in analysis client
        #[arg(long, value_name = "CLIENT")]
        taint: Option<String>,
    },

    /// Run .pcode files as FileCheck-style tests
    Check {
        #[arg(value_name = "TEST", required = true)]
        tests: Vec<PathBuf>,
    },

    /// List the built-in userops
    Userops,
}

fn read_input(input: &[PathBuf]) -> io::Result<Vec<(String, String)>> {
    if input.is_empty() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(vec![("<stdin>".to_string(), buffer)]);
    }
    input
        .iter()
        .map(|path| Ok((path.display().to_string(), fs::read_to_string(path)?)))
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let userops = UseropLibrary::builtin();
    let registers = RegisterMap::x86_64();

    match cli.command {
        Commands::Translate {
            input,
            print_graph,
            print_types,
            print_plan,
            print_stats,
            no_dce,
            verify,
            mismatch,
            threads,
            taint,
        } => {
            let config = TranslatorConfig {
                mismatch_policy: mismatch,
                eliminate_dead_code: !no_dce,
                verify: verify || TranslatorConfig::default().verify,
                threads: threads.max(1),
                taint,
                print: PrintOptions {
                    graph: print_graph,
                    types: print_types,
                    plan: print_plan,
                    stats: print_stats,
                },
            };

            let mut all_translated = true;
            for (name, text) in read_input(&input)? {
                if cli.verbose {
                    eprintln!("Translating {}", name);
                }
                let program = Program::parse(&text).map_err(|e| format!("{}: {}", name, e))?;
                let result = translate_units(&program, &userops, &registers, &config)?;
                print!("{}", result.render(config.print.stats));
                all_translated &= result.all_translated();
            }
            if !all_translated {
                std::process::exit(2);
            }
            Ok(())
        }

        Commands::Check { tests } => {
            let runner = TestRunner::new(cli.verbose);
            let mut failed = 0;
            for path in &tests {
                let content = fs::read_to_string(path)?;
                let result = TestSpec::parse(&content).and_then(|spec| runner.run_test(&spec));
                match result {
                    Ok(()) => println!("PASS: {}", path.display()),
                    Err(e) => {
                        println!("FAIL: {}: {}", path.display(), e);
                        failed += 1;
                    }
                }
            }
            println!("{} passed, {} failed", tests.len() - failed, failed);
            if failed > 0 {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Userops => {
            for name in userops.names() {
                if let Some(def) = userops.get(name) {
                    let inputs: Vec<String> = def.inputs.iter().map(|t| t.to_string()).collect();
                    let variadic = if def.variadic { ", ..." } else { "" };
                    let pure = if def.pure { " pure" } else { "" };
                    println!(
                        "@{}({}{}) -> {}{}",
                        def.name,
                        inputs.join(", "),
                        variadic,
                        def.output,
                        pure
                    );
                }
            }
            Ok(())
        }
    }
}
