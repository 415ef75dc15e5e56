//! Strategic Allocation Core - influence-diagram decision engine
//!
//! The entry point for sa-core, handling:
//! - Single evaluations under user-supplied evidence
//! - The built-in macro scenarios
//! - Model validation, description and export

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, error, info};

use sa_common::{Error, NodeKind, OutputFormat, QueryError, Result, SCHEMA_VERSION};
use sa_config::{EngineSettings, ModelDefinition, StrategyKind};
use sa_core::exit_codes::ExitCode;
use sa_core::inference::InferenceEngine;
use sa_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};
use sa_core::model::{load_model, scenarios, LoadedModel};
use sa_core::output::{
    render, DescribeReport, EvaluationReport, Render, ScenarioOutcome, ScenariosReport,
    ValidationReport,
};

/// Strategic Allocation Core - maximum expected utility over an influence diagram
#[derive(Parser)]
#[command(name = "sa-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Model definition file (JSON or YAML); defaults to the built-in model
    #[arg(long, short = 'm', global = true)]
    model: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Log level (overrides SA_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format: human or jsonl (overrides SA_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every label of a decision under evidence
    Evaluate(EvaluateArgs),

    /// Run the built-in macro scenarios
    Scenarios(ScenariosArgs),

    /// Check the model for structural and table violations
    Validate,

    /// List nodes, labels and arcs
    Describe,

    /// Write the model definition as JSON or YAML
    Export(ExportArgs),
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Observation as NAME=LABEL (repeatable)
    #[arg(long, short = 'e', value_parser = parse_observation)]
    evidence: Vec<(String, String)>,

    /// Decision node to rank (default: first declared decision)
    #[arg(long, short = 'd')]
    decision: Option<String>,

    /// Inference strategy (enumeration or variable_elimination)
    #[arg(long)]
    strategy: Option<StrategyKind>,

    /// Work budget for one inference
    #[arg(long)]
    max_assignments: Option<u64>,
}

#[derive(Args, Debug)]
struct ScenariosArgs {
    /// Run only this scenario
    #[arg(long)]
    name: Option<String>,

    /// Inference strategy (enumeration or variable_elimination)
    #[arg(long)]
    strategy: Option<StrategyKind>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Destination file; stdout when omitted
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

fn parse_observation(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, label)) if !name.trim().is_empty() && !label.trim().is_empty() => {
            Ok((name.trim().to_string(), label.trim().to_string()))
        }
        _ => Err(format!("expected NAME=LABEL, got '{}'", raw)),
    }
}

fn main() -> std::process::ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = if e.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Ok
            };
            return code.into();
        }
    };

    let level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        LogLevel::from_verbosity(cli.global.verbose).or(cli.global.log_level)
    };
    init_logging(&LogConfig::from_env(level, cli.global.log_format));

    let ctx = LogContext::new(generate_run_id());
    let code = {
        let _init = ctx.span(Stage::Init).entered();
        info!(event = event_names::RUN_STARTED, version = env!("CARGO_PKG_VERSION"), "run started");
        match run(&cli, &ctx) {
            Ok(code) => code,
            Err(e) => {
                debug!(event = event_names::RUN_FAILED, code = e.code(), "{}", e);
                output_error(&cli.global, &e)
            }
        }
    };
    info!(event = event_names::RUN_FINISHED, exit_code = code.as_i32(), "run finished");
    code.into()
}

fn run(cli: &Cli, ctx: &LogContext) -> Result<ExitCode> {
    let loaded = {
        let _build = ctx.span(Stage::Build).entered();
        load_model(cli.global.model.as_deref())?
    };
    match &cli.command {
        Commands::Evaluate(args) => run_evaluate(&cli.global, ctx, loaded, args),
        Commands::Scenarios(args) => run_scenarios(&cli.global, ctx, loaded, args),
        Commands::Validate => run_validate(&cli.global, ctx, loaded),
        Commands::Describe => {
            print_report(&DescribeReport::new(&loaded.diagram), cli.global.format)?;
            Ok(ExitCode::Ok)
        }
        Commands::Export(args) => run_export(&cli.global, loaded, args),
    }
}

fn print_report<T: Render>(report: &T, format: OutputFormat) -> Result<()> {
    let _report = tracing::debug_span!("render", %format).entered();
    println!("{}", render(report, format)?);
    Ok(())
}

fn engine_settings(loaded: &LoadedModel, strategy: Option<StrategyKind>) -> EngineSettings {
    let mut settings = loaded.settings.clone();
    if let Some(strategy) = strategy {
        settings.strategy = strategy;
    }
    settings
}

fn run_evaluate(
    global: &GlobalOpts,
    ctx: &LogContext,
    loaded: LoadedModel,
    args: &EvaluateArgs,
) -> Result<ExitCode> {
    let mut settings = engine_settings(&loaded, args.strategy);
    if args.max_assignments.is_some() {
        settings.max_assignments = args.max_assignments;
    }
    let decision = match &args.decision {
        Some(name) => name.clone(),
        None => loaded
            .diagram
            .nodes_of_kind(NodeKind::Decision)
            .next()
            .map(|n| n.name().to_string())
            .ok_or_else(|| QueryError::IncompleteModel {
                violations: vec!["model has no decision node".to_string()],
            })?,
    };

    let mut engine = InferenceEngine::new(&loaded.diagram, settings);
    {
        let _evidence = ctx.span(Stage::Evidence).entered();
        engine.set_evidence(
            args.evidence
                .iter()
                .map(|(name, label)| (name.as_str(), label.as_str())),
        )?;
    }
    {
        let _infer = ctx.span(Stage::Infer).entered();
        engine.infer()?;
    }
    let recommendation = {
        let _decide = ctx.span(Stage::Decide).entered();
        engine.recommend(&decision)?
    };

    let _report = ctx.span(Stage::Report).entered();
    let report = EvaluationReport::new(
        ctx.run_id.clone(),
        loaded.snapshot.clone(),
        engine.result()?,
        recommendation,
    );
    print_report(&report, global.format)?;
    Ok(ExitCode::Ok)
}

fn run_scenarios(
    global: &GlobalOpts,
    ctx: &LogContext,
    loaded: LoadedModel,
    args: &ScenariosArgs,
) -> Result<ExitCode> {
    let settings = engine_settings(&loaded, args.strategy);
    let selected: Vec<_> = scenarios()
        .into_iter()
        .filter(|s| {
            args.name
                .as_deref()
                .map_or(true, |name| s.name.eq_ignore_ascii_case(name))
        })
        .collect();
    if selected.is_empty() {
        return Err(Error::Config(format!(
            "unknown scenario '{}'",
            args.name.as_deref().unwrap_or_default()
        )));
    }

    // One engine per scenario; the diagram is shared read-only.
    let diagram = &loaded.diagram;
    let outcomes: Vec<Result<ScenarioOutcome>> = std::thread::scope(|scope| {
        let handles: Vec<_> = selected
            .iter()
            .map(|scenario| {
                let settings = settings.clone();
                let span = ctx.span(Stage::Infer);
                scope.spawn(move || -> Result<ScenarioOutcome> {
                    let _infer = span.entered();
                    let mut engine = InferenceEngine::new(diagram, settings);
                    engine.set_evidence(scenario.evidence.iter().copied())?;
                    engine.infer()?;
                    let decision = engine
                        .diagram()
                        .nodes_of_kind(NodeKind::Decision)
                        .next()
                        .map(|n| n.name().to_string())
                        .ok_or_else(|| QueryError::IncompleteModel {
                            violations: vec!["model has no decision node".to_string()],
                        })?;
                    let recommendation = engine.recommend(&decision)?;
                    engine.clear_evidence();
                    Ok(ScenarioOutcome::new(
                        scenario.name,
                        scenario.description,
                        &scenario.evidence,
                        recommendation,
                    ))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join().unwrap_or_else(|_| {
                    error!(event = event_names::INTERNAL_ERROR, "scenario worker panicked");
                    Err(Error::Config("scenario worker panicked".to_string()))
                })
            })
            .collect()
    });
    let outcomes = outcomes.into_iter().collect::<Result<Vec<_>>>()?;

    let _report = ctx.span(Stage::Report).entered();
    let report = ScenariosReport::new(
        ctx.run_id.clone(),
        loaded.snapshot.clone(),
        settings.strategy.to_string(),
        outcomes,
    );
    print_report(&report, global.format)?;
    Ok(ExitCode::Ok)
}

fn run_validate(global: &GlobalOpts, ctx: &LogContext, loaded: LoadedModel) -> Result<ExitCode> {
    let _validate = ctx.span(Stage::Validate).entered();
    let violations = loaded.diagram.validate_with(loaded.settings.tolerance);
    if !violations.is_empty() {
        info!(
            event = event_names::MODEL_INVALID,
            violations = violations.len(),
            "model has violations"
        );
    }
    let report = ValidationReport::new(&loaded.diagram, violations);
    print_report(&report, global.format)?;
    Ok(if report.valid {
        ExitCode::Ok
    } else {
        ExitCode::InvalidModel
    })
}

fn run_export(global: &GlobalOpts, loaded: LoadedModel, args: &ExportArgs) -> Result<ExitCode> {
    let definition = ModelDefinition::from(&loaded.diagram);
    let yaml = match &args.output {
        Some(path) => matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        ),
        None => global.format == OutputFormat::Yaml,
    };
    let text = if yaml {
        serde_yaml::to_string(&definition)?
    } else {
        serde_json::to_string_pretty(&definition)?
    };
    match &args.output {
        Some(path) => {
            std::fs::write(path, text)?;
            info!(path = %path.display(), "model definition exported");
        }
        None => println!("{}", text),
    }
    Ok(ExitCode::Ok)
}

/// Print an error in the requested format and pick the exit code.
fn output_error(global: &GlobalOpts, error: &Error) -> ExitCode {
    let code = ExitCode::for_error(error);
    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "status": "error",
                "exit_code": code.code_name(),
                "error": error.report(),
            });
            let text = if global.format == OutputFormat::Yaml {
                serde_yaml::to_string(&response).ok()
            } else {
                serde_json::to_string_pretty(&response).ok()
            };
            eprintln!("{}", text.unwrap_or_else(|| error.to_string()));
        }
        OutputFormat::Summary => eprintln!("[{}] {}", code.code_name(), error),
        OutputFormat::Md => eprintln!("{}", error.to_human()),
    }
    code
}
