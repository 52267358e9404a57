use anyhow::{anyhow, Context, Result};
use merlin_viewer::parse::{parse_grid_block, parse_scene_block, CellPolicy};
use std::env;
use std::fs;
use std::process;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("error: {err:?}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };
    match command.as_str() {
        "validate" => {
            let path = args
                .next()
                .ok_or_else(|| anyhow!("validate requires a path: block_tool validate <block>"))?;
            cmd_validate(&path)
        }
        "format" => {
            let path = args
                .next()
                .ok_or_else(|| anyhow!("format requires a path: block_tool format <block>"))?;
            cmd_format(&path)
        }
        "grid-validate" => {
            let path = args.next().ok_or_else(|| {
                anyhow!("grid-validate requires a path: block_tool grid-validate <block> [--strict]")
            })?;
            let policy = match args.next().as_deref() {
                Some("--strict") => CellPolicy::AllOrNothing,
                _ => CellPolicy::SkipInvalid,
            };
            cmd_grid_validate(&path, policy)
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => Err(anyhow!("unknown command '{other}'")),
    }
}

fn print_usage() {
    eprintln!(
        "Block Tool

Usage:
  block_tool validate <block_path>            Parse and validate one scene block
  block_tool format <block_path>              Re-render a block as canonical text
  block_tool grid-validate <block> [--strict] Validate a grid block cell by cell
  block_tool help                             Show this message
"
    );
}

fn read_block(path: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading block file {path}"))
}

fn cmd_validate(path: &str) -> Result<()> {
    let body = read_block(path)?;
    match parse_scene_block(&body) {
        Ok(description) => {
            println!(
                "ok: {} model(s), {} light(s)",
                description.models.len(),
                description.lights.len()
            );
            Ok(())
        }
        Err(err) => Err(anyhow!("{err}")),
    }
}

fn cmd_format(path: &str) -> Result<()> {
    let body = read_block(path)?;
    let description = parse_scene_block(&body).map_err(|err| anyhow!("{err}"))?;
    println!("{}", description.to_block_text());
    Ok(())
}

fn cmd_grid_validate(path: &str, policy: CellPolicy) -> Result<()> {
    let body = read_block(path)?;
    let outcome = parse_grid_block(&body, policy).map_err(|err| anyhow!("{err}"))?;
    println!("ok: {} valid cell(s)", outcome.grid.cells.len());
    for (cell, err) in &outcome.failures {
        println!("cell '{cell}' invalid:\n{err}");
    }
    if outcome.failures.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("{} cell(s) failed validation", outcome.failures.len()))
    }
}
