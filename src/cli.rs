use crate::config::{Config, LayoutAlgorithm, load_config};
use crate::ir::{Direction, Graph};
use crate::layout::{layout_graph, route_layout};
use crate::layout_dump::{LayoutDump, write_layout_dump};
use crate::scene::load_scene;
use crate::validate::{RoutingValidator, ValidationReport};
use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "dlay",
    version,
    about = "Layered graph layout, orthogonal edge routing and routing checks"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lay out a graph JSON file and route its edges
    Layout(LayoutArgs),
    /// Check the arrows of Excalidraw-style scene files
    Validate(ValidateArgs),
}

#[derive(ClapArgs, Debug)]
pub struct LayoutArgs {
    /// Input graph (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the layout dump. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Layout algorithm: hierarchical or force
    #[arg(short = 'a', long = "algorithm")]
    pub algorithm: Option<String>,

    /// Flow direction: TB or LR. Takes precedence over a direction set in the graph file
    #[arg(short = 'd', long = "direction")]
    pub direction: Option<String>,

    /// Split tall layouts into two columns
    #[arg(long = "two-column")]
    pub two_column: bool,

    /// Seed for the force-directed layout
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Skip edge routing
    #[arg(long = "no-route")]
    pub no_route: bool,
}

#[derive(ClapArgs, Debug)]
pub struct ValidateArgs {
    /// Scene files to check
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long = "json")]
    pub json: bool,
}

/// Runs the command line and returns the process exit code.
pub fn run() -> Result<i32> {
    let args = Args::parse();
    match args.command {
        Command::Layout(layout_args) => run_layout(&layout_args),
        Command::Validate(validate_args) => run_validate(&validate_args),
    }
}

fn run_layout(args: &LayoutArgs) -> Result<i32> {
    let config = apply_overrides(load_config(args.config.as_deref())?, args)?;
    let input = read_input(args.input.as_deref())?;
    let graph = with_direction_flag(parse_graph(&input)?, args);

    let (layout, connector) = layout_graph(&graph, &config.layout)?;
    let routed = (!args.no_route).then(|| route_layout(&layout, connector.as_ref(), &config));
    let dump = LayoutDump::from_layout(
        config.layout.algorithm,
        &layout,
        connector.as_ref(),
        routed.as_ref(),
    );
    write_layout_dump(args.output.as_deref(), &dump)?;
    Ok(0)
}

fn apply_overrides(mut config: Config, args: &LayoutArgs) -> Result<Config> {
    if let Some(name) = args.algorithm.as_deref() {
        config.layout.algorithm = name.parse::<LayoutAlgorithm>()?;
    }
    if let Some(token) = args.direction.as_deref() {
        config.layout.direction = token.parse::<Direction>()?;
    }
    if args.two_column {
        config.layout.columns.enabled = true;
    }
    if args.seed.is_some() {
        config.layout.force.seed = args.seed;
    }
    Ok(config)
}

/// An explicit `--direction` beats the graph file's own direction, which
/// otherwise overrides the configured one.
fn with_direction_flag(mut graph: Graph, args: &LayoutArgs) -> Graph {
    if args.direction.is_some() {
        graph.direction = None;
    }
    graph
}

/// Graph documents are JSON; JSON5 is accepted as a fallback.
pub fn parse_graph(contents: &str) -> Result<Graph> {
    match serde_json::from_str::<Graph>(contents) {
        Ok(graph) => Ok(graph),
        Err(json_err) => json5::from_str::<Graph>(contents)
            .map_err(|_| json_err)
            .context("parsing graph"),
    }
}

#[derive(Serialize)]
struct FileReport<'a> {
    path: &'a Path,
    #[serde(flatten)]
    report: ValidationReport,
}

fn run_validate(args: &ValidateArgs) -> Result<i32> {
    let config = load_config(args.config.as_deref())?;
    let validator = RoutingValidator::new(config.validator);

    let mut failed = false;
    let mut reports = Vec::new();
    for path in &args.files {
        let scene = match load_scene(path) {
            Ok(scene) => scene,
            Err(err) => {
                eprintln!("error: {}: {err}", path.display());
                failed = true;
                continue;
            }
        };
        let report = validator.validate(&scene.boxes, &scene.arrows);
        failed |= !report.is_clean();
        if args.json {
            reports.push(FileReport { path, report });
        } else {
            print!("{}", format_report(path, &report));
        }
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    Ok(if failed { 1 } else { 0 })
}

fn format_report(path: &Path, report: &ValidationReport) -> String {
    let summary = &report.summary;
    let mut out = format!(
        "Validating: {}\n  boxes: {}, arrows: {}\n  issues: {} ({} errors, {} warnings, {} info)\n",
        path.display(),
        summary.boxes_checked,
        summary.arrows_checked,
        summary.total_issues,
        summary.errors,
        summary.warnings,
        summary.info,
    );
    for issue in report.sorted_issues() {
        out.push_str(&format!("  {issue}\n"));
    }
    out
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return std::fs::read_to_string(path)
                .with_context(|| format!("reading graph {}", path.display()));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
