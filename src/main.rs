use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_client::AgentClient;
use evals_scenarios::config::EvalConfig;
use evals_scenarios::failure::classify_failure;
use evals_scenarios::report::{ExecutionSummary, Mode, RunSummary, ScenarioReport};
use evals_scenarios::{registry, Scenario, ScenarioError, ScenarioResult};
use fhir_client::FhirClient;

#[derive(Parser)]
#[command(name = "evals-run")]
#[command(about = "Run the clinical agent evaluation suite")]
struct Cli {
    /// Scenario id to run, e.g. 02a (repeatable)
    #[arg(long = "scenario", value_name = "ID")]
    scenarios: Vec<String>,

    /// Run every scenario in the registry
    #[arg(long, conflicts_with = "scenarios")]
    all: bool,

    /// Who performs the tasks
    #[arg(long, value_enum, default_value_t = ModeArg::Human)]
    mode: ModeArg,

    /// List scenarios and exit
    #[arg(long)]
    list: bool,

    /// Where reports are written, overriding EVALS_REPORT_DIR
    #[arg(long, value_name = "DIR")]
    report_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Human,
    Agent,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Human => Mode::Human,
            ModeArg::Agent => Mode::Agent,
        }
    }
}

/// Main entry point for the evaluation harness
///
/// Runs the selected scenarios against the configured FHIR server,
/// either performing each task directly (human mode) or delegating it
/// to the workflow agent and grading the outcome (agent mode). One
/// report file is written per scenario; a failed scenario never stops
/// the rest of the run.
///
/// # Environment Variables
/// - `FHIR_BASE_URL`: FHIR server root (required)
/// - `AGENT_WEBHOOK_URL`: workflow agent invocation endpoint (agent mode)
/// - `AGENT_LOG_URL`: execution-log retrieval endpoint (agent mode)
/// - `EVALS_REPORT_DIR`: report directory (default: "reports")
///
/// # Returns
/// * `Ok(())` - If every selected scenario passed
/// * `Err(anyhow::Error)` - On setup failure or when any scenario failed
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("evals_run=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let suite = registry();

    if cli.list {
        for scenario in &suite {
            println!("{:<4} {}", scenario.id(), scenario.name());
        }
        return Ok(());
    }

    let selected = if cli.all {
        suite
    } else {
        select(suite, &cli.scenarios)?
    };

    let mut config = EvalConfig::from_env()?;
    if let Some(dir) = cli.report_dir {
        config.set_report_dir(dir);
    }
    let mode = Mode::from(cli.mode);

    let fhir = FhirClient::new(config.fhir_base_url())?;
    let agent = match mode {
        Mode::Human => None,
        Mode::Agent => {
            let (Some(webhook), Some(log)) =
                (config.agent_webhook_url(), config.agent_log_url())
            else {
                anyhow::bail!("agent mode needs AGENT_WEBHOOK_URL and AGENT_LOG_URL");
            };
            Some(AgentClient::new(webhook, log))
        }
    };

    tracing::info!(
        "++ Running {} scenario(s) in {} mode against {}",
        selected.len(),
        mode,
        config.fhir_base_url()
    );

    let mut summary = RunSummary::default();
    for scenario in &selected {
        tracing::info!("++ [{}] {}", scenario.id(), scenario.name());
        let mut report = ScenarioReport::begin(scenario.id(), scenario.name(), mode);

        let outcome = match &agent {
            None => run_human(scenario.as_ref(), &fhir).await,
            Some(agent) => {
                run_agent(
                    scenario.as_ref(),
                    &fhir,
                    agent,
                    config.fhir_base_url(),
                    &mut report,
                )
                .await
            }
        };
        report.finish(outcome);
        summary.record(report.passed);

        if report.passed {
            tracing::info!("++ [{}] passed in {} ms", report.scenario_id, report.duration_ms);
        } else {
            tracing::error!(
                "[{}] failed: {}",
                report.scenario_id,
                report.failure.as_deref().unwrap_or("unknown")
            );
        }

        let path = report.write(config.report_dir())?;
        tracing::info!("++ [{}] report written to {}", report.scenario_id, path.display());
    }

    println!("{}/{} scenario(s) passed", summary.passed, summary.total());
    if !summary.all_passed() {
        anyhow::bail!("{} scenario(s) failed", summary.failed);
    }
    Ok(())
}

/// Keep the suite's order; an unknown id fails the whole invocation.
fn select(
    suite: Vec<Box<dyn Scenario>>,
    requested: &[String],
) -> anyhow::Result<Vec<Box<dyn Scenario>>> {
    if requested.is_empty() {
        return Ok(suite);
    }
    for id in requested {
        if !suite.iter().any(|scenario| scenario.id() == id) {
            anyhow::bail!("unknown scenario id '{}'; --list shows the registry", id);
        }
    }
    Ok(suite
        .into_iter()
        .filter(|scenario| requested.iter().any(|id| id == scenario.id()))
        .collect())
}

async fn run_human(scenario: &dyn Scenario, fhir: &FhirClient) -> ScenarioResult<()> {
    scenario.prepare(fhir).await?;
    let answer = scenario.act(fhir).await?;
    scenario.check_answer(&answer)?;
    scenario.verify(fhir).await?;
    Ok(())
}

/// Delegate the task to the workflow agent, then grade the outcome the
/// same way the human path is graded. A failing run gets its tool
/// record classified into the report.
async fn run_agent(
    scenario: &dyn Scenario,
    fhir: &FhirClient,
    agent: &AgentClient,
    fhir_base_url: &str,
    report: &mut ScenarioReport,
) -> ScenarioResult<()> {
    scenario.prepare(fhir).await?;

    let result = agent.run(&scenario.prompt(), fhir_base_url).await;
    let result = agent.enrich(result).await;
    report.execution = Some(ExecutionSummary::from(&result));

    let outcome = grade(scenario, fhir, &result).await;
    if outcome.is_err() {
        if let Some(tool_calls) = &result.tool_calls {
            let diagnosis = classify_failure(tool_calls, &scenario.expected_tools());
            if !diagnosis.is_clean() {
                tracing::warn!("[{}] tool record diagnosis: {:?}", scenario.id(), diagnosis);
                report.failure_mode = Some(diagnosis);
            }
        }
    }
    outcome
}

async fn grade(
    scenario: &dyn Scenario,
    fhir: &FhirClient,
    result: &agent_client::ExecutionResult,
) -> ScenarioResult<()> {
    if !result.execution_success {
        let detail = result
            .message
            .clone()
            .unwrap_or_else(|| "no response from the workflow engine".to_string());
        return Err(ScenarioError::Agent(detail));
    }
    let answer = result.message.as_deref().unwrap_or_default();
    scenario.check_answer(answer)?;
    scenario.verify(fhir).await?;
    Ok(())
}
