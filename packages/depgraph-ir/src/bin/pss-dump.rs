/*
 * Pointer-subgraph dumper
 *
 * Reads an IR module (JSON interchange form), solves points-to with the
 * chosen variant and prints the pointer subgraph.
 *
 * Usage:
 *   pss-dump [flags] IR_module
 *
 * Flags:
 *   -pta fs|fi    flow-sensitive or flow-insensitive (default fi)
 *   -dot          DOT output instead of plain text
 *   -v            verbose: include memory objects / memory maps
 */

use std::process::ExitCode;

use depgraph_ir::adapters::dot::pss_to_dot;
use depgraph_ir::adapters::text_dump::dump_pss_text;
use depgraph_ir::adapters::PointsToData;
use depgraph_ir::features::points_to::{
    build_pss, solve_flow_insensitive, solve_flow_sensitive,
};
use depgraph_ir::shared::models::ir::Module;
use tracing::info;

#[derive(Clone, Copy, PartialEq)]
enum PtaVariant {
    FlowInsensitive,
    FlowSensitive,
}

struct Args {
    module: Option<String>,
    variant: PtaVariant,
    dot: bool,
    verbose: bool,
}

impl Args {
    fn parse() -> Self {
        let argv: Vec<String> = std::env::args().skip(1).collect();
        let mut module = None;
        let mut variant = PtaVariant::FlowInsensitive;
        let mut dot = false;
        let mut verbose = false;

        let mut i = 0;
        while i < argv.len() {
            match argv[i].as_str() {
                "-pta" => {
                    i += 1;
                    if argv.get(i).map(String::as_str) == Some("fs") {
                        variant = PtaVariant::FlowSensitive;
                    }
                }
                "-dot" => dot = true,
                "-v" => verbose = true,
                // anything unrecognized is the module path
                other => module = Some(other.to_string()),
            }
            i += 1;
        }

        Args {
            module,
            variant,
            dot,
            verbose,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let Some(path) = args.module else {
        eprintln!("Usage: pss-dump [flags] IR_module");
        return ExitCode::FAILURE;
    };

    let module = match std::fs::read_to_string(&path)
        .map_err(depgraph_ir::DepGraphError::from)
        .and_then(|data| Module::from_json(&data))
    {
        Ok(module) => module,
        Err(e) => {
            eprintln!("{}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    let mut pss = match build_pss(&module, None) {
        Ok(pss) => pss,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let fi;
    let fs;
    let data = match args.variant {
        PtaVariant::FlowInsensitive => {
            fi = solve_flow_insensitive(&mut pss);
            info!(duration_ms = fi.stats.duration_ms, "points-to analysis took");
            PointsToData::FlowInsensitive(&fi)
        }
        PtaVariant::FlowSensitive => {
            fs = solve_flow_sensitive(&mut pss);
            info!(duration_ms = fs.stats.duration_ms, "points-to analysis took");
            PointsToData::FlowSensitive(&fs)
        }
    };

    if args.dot {
        print!("{}", pss_to_dot(&pss, &data, args.verbose));
    } else {
        print!("{}", dump_pss_text(&pss, &data, args.verbose));
    }

    ExitCode::SUCCESS
}
