/*
 * Dependence-graph dumper
 *
 * Reads an IR module (JSON interchange form), runs the full analysis
 * pipeline and prints the dependence graph as DOT.
 *
 * Usage:
 *   dg-dump [flags] IR_module
 *
 * Flags:
 *   -no-control   drop control-dependence edges
 *   -no-data      drop data-dependence edges
 *   -cfg          include block successor edges (default)
 *   -cfgall       also include reverse CFG edges
 *   -call         include call edges between subgraphs
 *   -pd           reserved
 *   -v            verbose diagnostics
 */

use std::process::ExitCode;

use depgraph_ir::adapters::dot::{dg_to_dot, PrintOptions};
use depgraph_ir::features::dep_graph::analyze_module;
use depgraph_ir::shared::models::ir::Module;

struct Args {
    module: Option<String>,
    options: PrintOptions,
    verbose: bool,
}

impl Args {
    fn parse() -> Self {
        let mut module = None;
        let mut options = PrintOptions::default();
        let mut verbose = false;

        for arg in std::env::args().skip(1) {
            match arg.as_str() {
                "-no-control" => options.control = false,
                "-no-data" => options.data = false,
                "-cfg" => options.cfg = true,
                "-cfgall" => {
                    options.cfg = true;
                    options.rev_cfg = true;
                }
                "-call" => options.call = true,
                "-pd" => eprintln!("Not implemented now"),
                "-v" => verbose = true,
                // anything unrecognized is the module path
                other => module = Some(other.to_string()),
            }
        }

        Args {
            module,
            options,
            verbose,
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let Some(path) = args.module else {
        eprintln!("Usage: dg-dump [flags] IR_module");
        return ExitCode::FAILURE;
    };

    let data = match std::fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("{}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    let module = match Module::from_json(&data) {
        Ok(module) => module,
        Err(e) => {
            eprintln!("{}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    match analyze_module(&module, None) {
        Ok(analysis) => {
            for (_, sub) in analysis.graph.subgraphs() {
                for issue in sub.verify() {
                    tracing::warn!(function = %sub.name, "{}", issue);
                }
            }
            print!("{}", dg_to_dot(&analysis.graph, args.options));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
