//! Sync command - run one reconciliation pass

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use rolesync_connector_ldap::LdapDirectory;
use rolesync_connector_postgres::PostgresConnector;
use rolesync_reconcile::{DatabaseStatus, EngineOptions, PassReport, PhaseStatus, SyncRunner};

use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};
use crate::error::{CliError, CliResult};

/// Arguments for the sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Path to the configuration file
    #[arg(short, long, env = "CFG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Only reconcile the database with this alias (repeatable)
    #[arg(long = "database", value_name = "ALIAS")]
    pub databases: Vec<String>,

    /// Compute and report changes without applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Print the full pass report as JSON on stdout
    #[arg(long)]
    pub report_json: bool,
}

pub async fn execute(args: SyncArgs) -> CliResult<()> {
    let config = AppConfig::load(&args.config)?;
    let targets = config.targets(&args.databases)?;

    info!(
        config = %args.config.display(),
        databases = targets.len(),
        dry_run = args.dry_run,
        "Configuration loaded"
    );

    let directory = LdapDirectory::new(config.ldap.clone())?;
    directory.connect().await?;

    let connector = PostgresConnector::new();
    let options = EngineOptions {
        timeouts: config.timeouts.clone(),
        dry_run: args.dry_run,
    };
    let report = SyncRunner::new(&directory, &connector, &config.sync_policy)
        .with_options(options)
        .with_group_object_classes(config.ldap.schema.group_object_classes.clone())
        .run(&targets)
        .await;

    directory.close().await;

    if args.report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_summary(&report));
    }

    if report.has_errors() {
        return Err(CliError::PassFailed(report.summary().errors));
    }
    Ok(())
}

/// Plain-text summary of a pass, one block per database.
fn render_summary(report: &PassReport) -> String {
    let mut out = String::new();
    let summary = report.summary();

    if report.dry_run {
        out.push_str("DRY RUN: no changes were applied\n\n");
    }

    for db in &report.databases {
        out.push_str(&format!("{}: {}\n", db.alias, status_label(db.status)));
        if let Some(error) = &db.error {
            out.push_str(&format!("  error: {error}\n"));
        }
        for mapping in db.mappings.iter().filter(|m| m.status == PhaseStatus::Failed) {
            out.push_str(&format!(
                "  mapping {} -> {} failed{}: {}\n",
                mapping.directory_group,
                mapping.target_role,
                if mapping.transient { " (transient)" } else { "" },
                mapping.error.as_deref().unwrap_or("unknown error")
            ));
        }
        if !db.provisioning.created.is_empty() {
            out.push_str(&format!("  created: {}\n", db.provisioning.created.join(", ")));
        }
        for membership in &db.memberships {
            if membership.status == PhaseStatus::Failed {
                out.push_str(&format!(
                    "  role {} failed: {}\n",
                    membership.role,
                    membership.reason.as_deref().unwrap_or("unknown error")
                ));
                continue;
            }
            if !membership.granted.is_empty() {
                out.push_str(&format!(
                    "  granted {}: {}\n",
                    membership.role,
                    membership.granted.join(", ")
                ));
            }
            if !membership.revoked.is_empty() {
                out.push_str(&format!(
                    "  revoked {}: {}\n",
                    membership.role,
                    membership.revoked.join(", ")
                ));
            }
        }
        if !db.deprovisioning.dropped.is_empty() {
            out.push_str(&format!(
                "  dropped: {}\n",
                db.deprovisioning.dropped.join(", ")
            ));
        }
        for failure in &db.deprovisioning.failures {
            out.push_str(&format!(
                "  drop {} failed: {}\n",
                failure.account, failure.error
            ));
        }
    }

    out.push_str(&format!(
        "\n{} database(s): {} created, {} granted, {} revoked, {} dropped, {} error(s) in {}s\n",
        summary.databases,
        summary.created,
        summary.granted,
        summary.revoked,
        summary.dropped,
        summary.errors,
        report.duration_seconds()
    ));
    out
}

fn status_label(status: DatabaseStatus) -> &'static str {
    match status {
        DatabaseStatus::Completed => "ok",
        DatabaseStatus::CompletedWithErrors => "completed with errors",
        DatabaseStatus::ConnectFailed => "connect failed",
        DatabaseStatus::ProvisioningFailed => "provisioning failed",
    }
}
