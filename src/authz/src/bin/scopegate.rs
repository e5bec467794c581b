//! # scopegate
//!
//! Command-line front end for the scope resolution core. Role and client
//! files are JSON arrays in the same camelCase shape the auth service stores.
//!
//! # Usage
//!
//! ```bash
//! # Normalize a scope set
//! scopegate normalize 'queue:*' queue:create-task index:get
//!
//! # Check a role file for malformed templates and non-terminating roles
//! scopegate validate --roles roles.json
//!
//! # Expand scopes against a role file
//! scopegate resolve --roles roles.json assume:client-id:ci
//!
//! # Show a client or role with its expanded scopes
//! scopegate client --roles roles.json --clients clients.json ci
//! scopegate role --roles roles.json 'project:*'
//!
//! # Enable debug logging
//! RUST_LOG=debug scopegate resolve --roles roles.json 'assume:*'
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Logging level (default: info)
//! - `SCOPEGATE_MAX_EXPANSION_STEPS`: Expansion safety cap
//! - `SCOPEGATE_MAX_LAST_USED_DELAY_SECS`: Last-used write-back threshold

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scopegate_authz::{
    normalize_scopes, validate_roles, InMemoryStore, ResolverConfig, Role, ScopeResolverService,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Scope resolution toolkit
#[derive(Parser, Debug)]
#[command(
    name = "scopegate",
    version,
    about = "Resolve, normalize and validate delegated scopes",
    long_about = None
)]
struct Args {
    /// Maximum number of scopes a single expansion may process
    #[arg(long, global = true, env = "SCOPEGATE_MAX_EXPANSION_STEPS")]
    max_expansion_steps: Option<usize>,

    /// Last-used write-back threshold in seconds
    #[arg(long, global = true, env = "SCOPEGATE_MAX_LAST_USED_DELAY_SECS")]
    max_last_used_delay: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the minimal equivalent of a scope set
    Normalize {
        /// Scopes to normalize
        scopes: Vec<String>,
    },

    /// Validate a role file
    Validate {
        /// JSON array of roles
        #[arg(long)]
        roles: PathBuf,
    },

    /// Expand scopes against a role file
    Resolve {
        /// JSON array of roles
        #[arg(long)]
        roles: PathBuf,

        /// Scopes to expand
        #[arg(required = true)]
        scopes: Vec<String>,
    },

    /// Show a client with its expanded scopes
    Client {
        /// JSON array of roles
        #[arg(long)]
        roles: PathBuf,

        /// JSON array of clients
        #[arg(long)]
        clients: PathBuf,

        /// Client to load
        client_id: String,
    },

    /// Show a role with its expanded scopes
    Role {
        /// JSON array of roles
        #[arg(long)]
        roles: PathBuf,

        /// Role to load
        role_id: String,
    },
}

impl Args {
    fn config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::from_env();
        if let Some(steps) = self.max_expansion_steps {
            config = config.with_max_expansion_steps(steps);
        }
        if let Some(secs) = self.max_last_used_delay {
            config = config.with_max_last_used_delay(Duration::from_secs(secs));
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = args.config();

    info!("Starting scopegate v{}", scopegate_authz::VERSION);

    if let Err(e) = run(args.command, config).await {
        error!("Command failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(command: Command, config: ResolverConfig) -> Result<()> {
    match command {
        Command::Normalize { scopes } => print_json(&normalize_scopes(&scopes)),

        Command::Validate { roles } => {
            let roles: Vec<Role> = serde_json::from_str(&read(&roles)?)
                .with_context(|| format!("parsing {}", roles.display()))?;
            validate_roles(&roles)?;
            info!(roles = roles.len(), "Role set is valid");
            print_json(&serde_json::json!({ "valid": true, "roles": roles.len() }))
        }

        Command::Resolve { roles, scopes } => {
            let service = start_service(&roles, None, config).await?;
            print_json(&service.resolve(scopes.as_slice())?)
        }

        Command::Client {
            roles,
            clients,
            client_id,
        } => {
            let service = start_service(&roles, Some(&clients), config).await?;
            match service.load_client(&client_id)? {
                Some(client) => print_json(&client),
                None => bail!("client '{}' not found", client_id),
            }
        }

        Command::Role { roles, role_id } => {
            let service = start_service(&roles, None, config).await?;
            match service.load_role(&role_id)? {
                Some(role) => print_json(&role),
                None => bail!("role '{}' not found", role_id),
            }
        }
    }
}

async fn start_service(
    roles: &Path,
    clients: Option<&Path>,
    config: ResolverConfig,
) -> Result<ScopeResolverService> {
    let roles_json = read(roles)?;
    let clients_json = clients.map(read).transpose()?;
    let store = Arc::new(
        InMemoryStore::from_json(&roles_json, clients_json.as_deref())
            .context("loading role and client files")?,
    );

    let service = ScopeResolverService::new(config, store.clone(), store);
    service.setup(None).await?;
    Ok(service)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
