//! stepsweep - run sweep loops over a small demonstration plan

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use sweep_core::annotation::preview_series;
use sweep_core::engine::{ReadyHandle, ResultParameters};
use sweep_core::prelude::*;
use sweep_core::{import, telemetry, RangeBehavior, RunError, RunHandle, SweepSummary, Verdict};

/// Children finish immediately with a pass; each point is logged.
struct LoggingRunner;

#[async_trait]
impl StepRunner for LoggingRunner {
    async fn run_children(
        &self,
        tree: &StepTree,
        children: &[StepId],
        params: &ResultParameters,
        _token: &CancellationToken,
    ) -> Result<Vec<Box<dyn RunHandle>>, RunError> {
        for &child in children {
            let name = tree.node(child).map(|n| n.name().to_string()).unwrap_or_default();
            let values: Vec<String> = params.iter().map(|p| format!("{}={}", p.name, p.value)).collect();
            tracing::info!(step = %child, %name, params = %values.join(" "), "running child");
        }
        Ok(children
            .iter()
            .map(|&id| Box::new(ReadyHandle::new(RunOutcome::new(id, Verdict::Pass))) as Box<dyn RunHandle>)
            .collect())
    }
}

fn source_type() -> Arc<StepType> {
    StepType::builder("Source")
        .member(MemberDescriptor::new("count", TypeDescriptor::Int, Value::Int(1)))
        .member(
            MemberDescriptor::new("level", TypeDescriptor::Float, Value::Float(0.0))
                .group(&["Output"]),
        )
        .build()
}

fn meter_type() -> Arc<StepType> {
    StepType::builder("Meter")
        .member(MemberDescriptor::new("count", TypeDescriptor::Int, Value::Int(1)))
        .build()
}

/// `loop_step` with a `Source` and a `Meter` child
fn demo_tree(loop_step: impl Step + 'static) -> anyhow::Result<(StepTree, StepId)> {
    let registry = TypeRegistry::new()
        .with_step_type(source_type())
        .with_step_type(meter_type());
    let mut tree = StepTree::new(registry);
    let root = tree.add_root("sweep", loop_step)?;
    tree.add_child(root, "source", PropertyStep::new(source_type()))?;
    tree.add_child(root, "meter", PropertyStep::new(meter_type()))?;
    Ok((tree, root))
}

fn member(ty: &StepType, name: &str) -> anyhow::Result<Member> {
    ty.get_member(name)
        .ok_or_else(|| anyhow!("{} has no member {name}", ty.name()))
}

fn arg<T: Clone + Send + Sync + 'static>(args: &ArgMatches, name: &str) -> anyhow::Result<T> {
    args.get_one::<T>(name)
        .cloned()
        .ok_or_else(|| anyhow!("missing --{name}"))
}

fn print_summary(summary: &SweepSummary, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        let iterations: Vec<_> = summary
            .iterations
            .iter()
            .map(|i| json!({ "index": i.index, "params": i.params, "children": i.children }))
            .collect();
        let report = json!({
            "loop": summary.loop_id.to_string(),
            "kind": summary.kind.to_string(),
            "indices": summary.indices,
            "cancelled": summary.cancelled,
            "break_requested": summary.break_requested,
            "apply_failures": summary.apply.failures().len(),
            "restore_failures": summary.restore.failures().len(),
            "verdict": summary.worst_verdict(),
            "iterations": iterations,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Sweep {} ({})", summary.loop_id, summary.kind);
    for iteration in &summary.iterations {
        let values: Vec<String> = iteration
            .params
            .iter()
            .map(|p| format!("{}={}", p.name, p.value))
            .collect();
        println!("  point {}: {}", iteration.index, values.join(", "));
    }
    if summary.cancelled {
        println!("  cancelled");
    }
    if summary.break_requested {
        println!("  stopped by break");
    }
    for failure in summary.apply.failures().iter().chain(summary.restore.failures()) {
        println!("  warning: {failure:?}");
    }
    println!("  verdict: {:?}", summary.worst_verdict());
    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });
    token
}

async fn simulate(config: &SweepConfig, args: &ArgMatches, as_json: bool) -> anyhow::Result<()> {
    let mode = match args.get_one::<String>("mode").map(String::as_str) {
        Some("within") => SweepMode::WithinRun,
        Some("across") => SweepMode::AcrossRuns,
        Some(other) => bail!("unknown mode {other}, expected within or across"),
        None => config.default_mode,
    };
    let runs: u32 = arg(args, "runs")?;
    let text: String = arg(args, "values")?;

    let (mut tree, root) = demo_tree(ParameterSweep::new().with_mode(mode))?;
    let values = text
        .split(',')
        .map(|v| TypeDescriptor::Int.parse_text(v, tree.registry()))
        .collect::<Result<Vec<_>, _>>()
        .context("parsing --values")?;
    let param = SweepParam::new([
        member(&source_type(), "count")?,
        member(&meter_type(), "count")?,
    ])?;
    let axis = param.name().to_string();
    let cloner = config.cloner(Arc::clone(tree.registry()));
    let sweep = tree.step_as_mut::<ParameterSweep>(root)?;
    sweep.add_param(param, &cloner)?;
    sweep.set_series(&axis, values, &cloner)?;
    if !as_json {
        println!("{}", preview_series(sweep.params()));
    }

    let engine = SweepEngine::new(config.clone());
    let token = cancel_on_ctrl_c();
    let runs = if mode == SweepMode::WithinRun { 1 } else { runs };
    for _ in 0..runs {
        let summary = engine.run(&mut tree, root, &LoggingRunner, &token).await?;
        print_summary(&summary, as_json)?;
    }
    Ok(())
}

async fn range(config: &SweepConfig, args: &ArgMatches, as_json: bool) -> anyhow::Result<()> {
    let start: f64 = arg(args, "start")?;
    let stop: f64 = arg(args, "stop")?;
    let points: u32 = arg(args, "points")?;
    let behavior = if args.get_flag("exponential") {
        RangeBehavior::Exponential
    } else {
        RangeBehavior::Linear
    };

    let mut sweep = RangeSweep::new(start, stop, points).with_behavior(behavior);
    sweep.set_members([member(&source_type(), "level")?])?;
    let (mut tree, root) = demo_tree(sweep)?;

    let engine = SweepEngine::new(config.clone());
    let summary = engine.run(&mut tree, root, &LoggingRunner, &cancel_on_ctrl_c()).await?;
    print_summary(&summary, as_json)
}

/// Plain comma separated cells, one row per line
///
/// Quoting is not supported, so no cell may contain a comma or a quote.
fn parse_table(text: &str) -> anyhow::Result<Vec<Vec<String>>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| -> anyhow::Result<Vec<String>> {
            if line.contains('"') {
                bail!("line {}: quoted cells are not supported", number + 1);
            }
            Ok(line.split(',').map(|cell| cell.trim().to_string()).collect())
        })
        .collect()
}

async fn import_csv(config: &SweepConfig, args: &ArgMatches, as_json: bool) -> anyhow::Result<()> {
    let path: PathBuf = arg(args, "file")?;
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let table = parse_table(&text).with_context(|| format!("parsing {}", path.display()))?;

    let (mut tree, root) = demo_tree(ParameterSweep::new().with_mode(config.default_mode))?;
    let rows = import::import_parameters(&mut tree, root, &table)?;
    let sweep = tree.step_as::<ParameterSweep>(root)?;
    if as_json {
        let saved = sweep_core::persist::save(sweep);
        println!("{}", saved.to_json()?);
    } else {
        println!("Imported {rows} rows from {}", path.display());
        println!("{}", preview_series(sweep.params()));
    }

    if args.get_flag("run") {
        let engine = SweepEngine::new(config.clone());
        let summary = engine.run(&mut tree, root, &LoggingRunner, &cancel_on_ctrl_c()).await?;
        print_summary(&summary, as_json)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("stepsweep")
        .version(sweep_core::VERSION)
        .about("Run parameter, range and table sweeps over a demonstration plan")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Output as JSON"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("simulate")
                .about("Sweep the count of both children over a value list")
                .arg(
                    Arg::new("values")
                        .long("values")
                        .default_value("10,20")
                        .help("Comma separated integer values"),
                )
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .value_parser(["within", "across"])
                        .help("Sweep mode (defaults to the configured mode)"),
                )
                .arg(
                    Arg::new("runs")
                        .long("runs")
                        .default_value("1")
                        .value_parser(value_parser!(u32))
                        .help("Executions of an across-runs sweep"),
                ),
        )
        .subcommand(
            Command::new("range")
                .about("Sweep the source level over a computed range")
                .arg(
                    Arg::new("start")
                        .long("start")
                        .default_value("1")
                        .value_parser(value_parser!(f64))
                        .help("First value"),
                )
                .arg(
                    Arg::new("stop")
                        .long("stop")
                        .default_value("10")
                        .value_parser(value_parser!(f64))
                        .help("Last value"),
                )
                .arg(
                    Arg::new("points")
                        .long("points")
                        .default_value("5")
                        .value_parser(value_parser!(u32))
                        .help("Number of points"),
                )
                .arg(
                    Arg::new("exponential")
                        .long("exponential")
                        .action(ArgAction::SetTrue)
                        .help("Space points evenly in log10"),
                ),
        )
        .subcommand(
            Command::new("import")
                .about("Load a parameter sweep from a CSV table")
                .arg(
                    Arg::new("file")
                        .long("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Comma separated table, without quoting, whose header names sweepable members"),
                )
                .arg(
                    Arg::new("run")
                        .long("run")
                        .action(ArgAction::SetTrue)
                        .help("Run the imported sweep"),
                ),
        );

    let matches = cli.get_matches();

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SweepConfig::load(path)?,
        None => SweepConfig::default(),
    };
    telemetry::init(&config)?;
    let as_json = matches.get_flag("json");

    match matches.subcommand() {
        Some(("simulate", args)) => simulate(&config, args, as_json).await,
        Some(("range", args)) => range(&config, args, as_json).await,
        Some(("import", args)) => import_csv(&config, args, as_json).await,
        Some((other, _)) => bail!("unknown command {other}"),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_rows_skip_blank_lines() {
        let table = parse_table("Enabled, count\n\ntrue,10\nno , 20\n").unwrap();
        assert_eq!(
            table,
            vec![
                vec!["Enabled".to_string(), "count".to_string()],
                vec!["true".to_string(), "10".to_string()],
                vec!["no".to_string(), "20".to_string()],
            ]
        );
    }

    #[test]
    fn quoted_cells_are_rejected() {
        let err = parse_table("count\n\"1,5\"\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
