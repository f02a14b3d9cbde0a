//! Terraform Provider for VMware Cloud Director
//!
//! Command-line front end to the provider: dumps schemas and drives single
//! resource operations against a VCD endpoint.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use vcd_provider::config::default_config_path;
use vcd_provider::error::has_errors;
use vcd_provider::provider::StateResponse;
use vcd_provider::state::{decode_dynamic_value, make_state, DynamicValue};
use vcd_provider::{Diagnostic, ProviderConfig, Registry, VcdProvider};

/// VMware Cloud Director Terraform provider
#[derive(Parser)]
#[command(name = "terraform-provider-vcd")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Provider settings file (TOML)
    #[arg(long, env = "VCD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the provider schema as JSON
    Schema,

    /// List resource and data source types
    Resources,

    /// Import a resource by ID and print its state
    Read {
        type_name: String,
        id: String,
    },

    /// Read a data source
    Lookup {
        type_name: String,

        /// Value of the `name` attribute
        name: Option<String>,

        /// Additional attributes as key=value
        #[arg(short, long = "attribute", value_parser = parse_attribute)]
        attributes: Vec<(String, String)>,
    },

    /// Create, update or delete a resource from JSON states
    Apply {
        type_name: String,

        /// Planned state; `null` deletes
        #[arg(long)]
        planned: PathBuf,

        /// Prior state; absent means create
        #[arg(long)]
        prior: Option<PathBuf>,
    },
}

fn parse_attribute(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

fn read_state(path: &Path) -> anyhow::Result<DynamicValue> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    decode_dynamic_value(&data).with_context(|| format!("parsing {}", path.display()))
}

fn report(diagnostics: &[Diagnostic]) -> anyhow::Result<()> {
    for diag in diagnostics {
        eprintln!("{:?}: {}: {}", diag.severity, diag.summary, diag.detail);
    }
    if has_errors(diagnostics) {
        anyhow::bail!("operation failed");
    }
    Ok(())
}

fn print_state(response: StateResponse) -> anyhow::Result<()> {
    report(&response.diagnostics)?;
    println!("{}", serde_json::to_string_pretty(&response.new_state)?);
    Ok(())
}

async fn configured(config_path: Option<PathBuf>) -> anyhow::Result<VcdProvider> {
    let path = config_path.unwrap_or_else(default_config_path);
    debug!("Loading configuration from {}", path.display());
    let config = ProviderConfig::load(&path)?.with_env()?;

    let provider = VcdProvider::new(Registry::builtin(), config);
    report(&provider.configure_provider(&DynamicValue::Null).await)?;
    Ok(provider)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Schema => {
            let provider = VcdProvider::new(Registry::builtin(), ProviderConfig::default());
            let schema = provider.get_provider_schema();
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Commands::Resources => {
            let registry = Registry::builtin();
            println!("Resources:");
            for name in registry.resource_names() {
                println!("  {}", name);
            }
            println!("Data sources:");
            for name in registry.data_source_names() {
                println!("  {}", name);
            }
        }
        Commands::Read { type_name, id } => {
            let provider = configured(cli.config).await?;
            print_state(provider.import_resource_state(&type_name, &id).await)?;
        }
        Commands::Lookup {
            type_name,
            name,
            attributes,
        } => {
            let provider = configured(cli.config).await?;
            let mut attrs: Vec<(&str, DynamicValue)> = attributes
                .iter()
                .map(|(k, v)| (k.as_str(), DynamicValue::from(v.as_str())))
                .collect();
            if let Some(name) = &name {
                attrs.push(("name", name.as_str().into()));
            }
            let config = make_state(attrs);

            report(&provider.validate_data_resource_config(&type_name, &config))?;
            print_state(provider.read_data_source(&type_name, &config).await)?;
        }
        Commands::Apply {
            type_name,
            planned,
            prior,
        } => {
            let planned = read_state(&planned)?;
            let prior = match prior {
                Some(path) => read_state(&path)?,
                None => DynamicValue::Null,
            };

            let provider = configured(cli.config).await?;
            if !planned.is_null() {
                let config = without_computed(&provider, &type_name, &planned);
                report(&provider.validate_resource_config(&type_name, &config))?;
            }
            info!("Applying change to {}", type_name);
            print_state(provider.apply_resource_change(&type_name, &prior, &planned).await)?;
        }
    }

    Ok(())
}

/// Planned states carry computed values that configuration may not set
fn without_computed(provider: &VcdProvider, type_name: &str, planned: &DynamicValue) -> DynamicValue {
    let (Some(resource), Some(values)) = (provider.registry().resource(type_name), planned.as_map()) else {
        return planned.clone();
    };
    let schema = resource.schema();
    DynamicValue::Map(
        values
            .iter()
            .filter(|(name, _)| {
                schema
                    .attributes
                    .get(name.as_str())
                    .map_or(true, |a| !a.computed || a.optional)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
    )
}
