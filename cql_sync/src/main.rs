//! cql_sync command line.
//!
//! Works on declared model files only; nothing here connects to a cluster.
//!
//! ```bash
//! # Check every model the config points at
//! cql_sync validate --config cql_sync.toml
//!
//! # Print the statements that would create one model's table
//! cql_sync ddl --config cql_sync.toml --model UserProfile
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use cql_sync::config::{self, Config};
use cql_sync::schema::generator::{schema_creation_statements, Statement};
use cql_sync::schema::normalizer::normalize_replication;
use cql_sync::utils::logging::init_logging;
use cql_sync::ModelRegistry;

/// cql_sync - declared Cassandra schemas
#[derive(Parser)]
#[command(name = "cql_sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every model file.
    Validate {
        /// Path to the configuration file.
        #[arg(short, long, default_value = "cql_sync.toml")]
        config: String,
    },

    /// Print the statements creating the declared schema.
    Ddl {
        /// Path to the configuration file.
        #[arg(short, long, default_value = "cql_sync.toml")]
        config: String,

        /// Only print this model.
        #[arg(short, long)]
        model: Option<String>,
    },
}

fn load(config_path: &str) -> Result<(Config, ModelRegistry)> {
    let config = config::load_from_file(config_path).with_context(|| format!("loading {}", config_path))?;
    init_logging(&config.logging)?;

    let mut registry = ModelRegistry::new(&config.models);
    registry.scan_and_register().context("registering models")?;
    Ok((config, registry))
}

fn validate(config_path: &str) -> Result<()> {
    let (_, registry) = load(config_path)?;

    for model in registry.models() {
        println!("ok  {} -> \"{}\"", model.name, model.table_name);
    }
    println!("{} model(s) valid", registry.len());
    Ok(())
}

fn ddl(config_path: &str, model: Option<&str>) -> Result<()> {
    let (config, registry) = load(config_path)?;

    let mut statements = Vec::new();
    if model.is_none() {
        if config.keyspace.create_keyspace {
            statements.push(Statement::CreateKeyspace {
                keyspace: config.connection.keyspace.clone(),
                replication: normalize_replication(&config.keyspace.replication),
            });
        }
        for (name, fields) in &config.udts {
            statements.push(Statement::CreateType {
                name: name.clone(),
                fields: fields.clone(),
            });
        }
        for (name, udf) in &config.udfs {
            statements.push(Statement::CreateFunction {
                name: name.clone(),
                inputs: udf.inputs.clone(),
                return_type: udf.return_type.clone(),
                language: udf.language.clone(),
                code: udf.code.clone(),
            });
        }
        for (name, uda) in &config.udas {
            statements.push(Statement::CreateAggregate {
                name: name.clone(),
                input_types: uda.input_types.clone(),
                sfunc: uda.sfunc.clone(),
                stype: uda.stype.clone(),
                finalfunc: uda.finalfunc.clone(),
                initcond: uda.initcond.clone(),
            });
        }
    }

    let models: Vec<_> = match model {
        Some(name) => match registry.get(name) {
            Some(info) => vec![info],
            None => bail!("model \"{}\" is not registered", name),
        },
        None => registry.models().collect(),
    };
    for info in models {
        statements.extend(schema_creation_statements(&info.table_name, &info.schema)?);
    }

    for statement in statements {
        println!("{}", statement);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Ddl { config, model } => ddl(&config, model.as_deref()),
    }
}
