use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evals_fixtures::{baseline, FixtureIds};
use evals_types::ResourceKind;
use fhir_client::FhirClient;

#[derive(Parser)]
#[command(name = "evalctl")]
#[command(about = "Admin commands for the evaluation FHIR server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the server answers its metadata endpoint
    Ping,
    /// Delete every resource on the server
    Purge,
    /// Purge, then load the baseline fixture set
    Seed,
    /// Print per-kind resource totals
    Count,
    /// Run an ad-hoc search and print the response body
    Search {
        /// Resource type, e.g. Patient
        kind: String,
        /// Query parameters as name=value pairs
        params: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("evalctl=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let Ok(base_url) = std::env::var("FHIR_BASE_URL") else {
        anyhow::bail!("FHIR_BASE_URL is not set");
    };
    let fhir = FhirClient::new(&base_url)?;

    match cli.command {
        Some(Commands::Ping) => {
            tracing::info!("++ Pinging FHIR server at {}", base_url);
            let response = fhir.metadata().await?;
            if response.is_success() {
                println!("Server at {} is up (status {})", base_url, response.status());
            } else {
                anyhow::bail!(
                    "Server at {} answered {}: {}",
                    base_url,
                    response.status(),
                    response.body_excerpt()
                );
            }
        }
        Some(Commands::Purge) => {
            let report = fhir.delete_all().await?;
            for purge in &report.kinds {
                if purge.deleted > 0 || purge.failed > 0 {
                    println!("{}: deleted {}, failed {}", purge.kind, purge.deleted, purge.failed);
                }
            }
            println!("Purged {} resource(s) in total", report.deleted());
            if !report.is_clean() {
                anyhow::bail!("{} resource(s) could not be deleted", report.failed());
            }
        }
        Some(Commands::Seed) => {
            let purge = fhir.delete_all().await?;
            println!("Purged {} resource(s)", purge.deleted());
            let seeds = baseline(&FixtureIds::default());
            let total = seeds.len();
            for seed in &seeds {
                fhir.upsert(seed).await?.ensure_success()?;
            }
            println!("Seeded {} baseline resource(s)", total);
        }
        Some(Commands::Count) => {
            let mut total = 0;
            for kind in ResourceKind::ALL {
                let ids = fhir.resource_ids(kind).await?;
                if !ids.is_empty() {
                    println!("{}: {}", kind, ids.len());
                }
                total += ids.len();
            }
            println!("Total: {}", total);
        }
        Some(Commands::Search { kind, params }) => {
            let kind = ResourceKind::from_str(&kind)?;
            let mut query = Vec::new();
            for param in &params {
                let Some(pair) = param.split_once('=') else {
                    anyhow::bail!("Parameter '{}' is not in name=value form", param);
                };
                query.push(pair);
            }
            let response = fhir.search(kind, &query).await?.ensure_success()?;
            println!("{}", serde_json::to_string_pretty(&response.json()?)?);
        }
        None => {
            println!("Use 'evalctl --help' for commands");
        }
    }

    Ok(())
}
