// crates/otto-bgp-cli/src/main.rs
// ============================================================================
// Module: Otto BGP CLI entry point
// Description: Command dispatcher for the boundary surface named in
// section 6: `pipeline`, `apply`, and `rollout status`.
// Purpose: Wire configuration, tracing, the RPKI validator, the Unified
// Safety Manager, and (for `pipeline` in coordinator mode) the Rollout
// Coordinator into the three observable commands, then map the outcome to
// the stable exit-code ABI.
// Dependencies: clap, otto-bgp-core, otto-bgp-config, otto-bgp-pipeline,
// otto-bgp-rollout, otto-bgp-rpki, otto-bgp-safety, otto-bgp-store-sqlite
// ============================================================================

//! ## Overview
//! Fleet discovery, BGP-text collection, and policy generation are external
//! collaborators (§1 Non-goals) this binary does not implement; `pipeline`
//! reads a manifest file holding already-discovered router profiles and
//! already-generated policies instead of invoking those collaborators.
//! `rollout status` reads the durable event log directly rather than
//! querying a live coordinator, since Run/Stage/Target state lives only in
//! the process that ran `start_run` (§4.6: resuming execution is out of
//! scope).

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

use otto_bgp_config::OperatingMode;
use otto_bgp_config::OttoConfig;
use otto_bgp_core::ApplicationResult;
use otto_bgp_core::ExitCode;
use otto_bgp_core::FinalizationMode;
use otto_bgp_core::Hostname;
use otto_bgp_core::OttoError;
use otto_bgp_core::Policy;
use otto_bgp_core::RouterProfile;
use otto_bgp_core::RunId;
use otto_bgp_pipeline::PipelineError;
use otto_bgp_pipeline::PipelineOrchestrator;
use otto_bgp_pipeline::StrategyChoice;
use otto_bgp_rollout::PhaseKey;
use otto_bgp_rollout::RolloutCoordinator;
use otto_bgp_rpki::Allowlist;
use otto_bgp_rpki::RpkiValidator;
use otto_bgp_rpki::VrpStore;
use otto_bgp_safety::SshCredentials;
use otto_bgp_safety::UnifiedSafetyManager;
use otto_bgp_store_sqlite::EventStore;

mod manifest;

use manifest::PipelineManifest;
use manifest::StrategyChoiceArg;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "otto-bgp", arg_required_else_help = true)]
struct Cli {
    /// Optional TOML config file, layered under `OTTO_BGP_*` env overrides.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// SSH username for NETCONF sessions.
    #[arg(long, global = true, default_value = "otto-bgp")]
    ssh_user: String,
    /// Path to the SSH private key used for NETCONF sessions.
    #[arg(long, global = true, value_name = "PATH", default_value = "/etc/otto-bgp/id_ed25519")]
    ssh_key: PathBuf,
    /// Path to the durable rollout event store (SQLite file).
    #[arg(long, global = true, value_name = "PATH", default_value = "/var/lib/otto-bgp/rollout.db")]
    event_store: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run section 4.7 end-to-end from a manifest of devices and policies.
    Pipeline(PipelineArgs),
    /// Run section 4.5 (guardrails, NETCONF apply, finalization) for one router.
    Apply(ApplyArgs),
    /// Rollout Coordinator queries.
    Rollout {
        #[command(subcommand)]
        command: RolloutCommand,
    },
}

#[derive(clap::Args, Debug)]
struct PipelineArgs {
    /// JSON manifest: `{"devices": [...], "policies_by_hostname": {...}}`.
    #[arg(long, value_name = "PATH")]
    manifest: PathBuf,
    /// Execution mode.
    #[arg(long, value_enum, default_value_t = PipelineModeArg::Direct)]
    mode: PipelineModeArg,
    /// Staging strategy; only used when `--mode coordinator`.
    #[arg(long, value_name = "blast|phased-region|phased-role|canary:<hostname>", default_value = "blast")]
    strategy: String,
    /// Recorded as the run's `initiated_by` in coordinator mode.
    #[arg(long, default_value = "cli")]
    initiated_by: String,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PipelineModeArg {
    Direct,
    Coordinator,
}

#[derive(clap::Args, Debug)]
struct ApplyArgs {
    /// Target router's hostname.
    #[arg(long)]
    hostname: String,
    /// Target router's management address.
    #[arg(long)]
    address: String,
    /// JSON file holding a `Vec<Policy>` to apply.
    #[arg(long, value_name = "PATH")]
    policies: PathBuf,
}

#[derive(Subcommand, Debug)]
enum RolloutCommand {
    /// Print the last durable event recorded for a run.
    Status {
        /// The run identifier to query.
        #[arg(long)]
        run: String,
    },
}

fn main() -> ProcessExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(Cli::parse()) {
        Ok(code) => to_process_exit_code(code),
        Err(err) => {
            tracing::error!(%err, "otto-bgp command failed");
            to_process_exit_code(err.exit_code())
        }
    }
}

fn to_process_exit_code(code: ExitCode) -> ProcessExitCode {
    ProcessExitCode::from(code.as_u8())
}

fn run(cli: Cli) -> Result<ExitCode, OttoError> {
    let config = load_config(cli.config.as_deref())?;
    let ssh_credentials = SshCredentials {
        username: cli.ssh_user,
        private_key_path: cli.ssh_key,
    };

    match cli.command {
        Command::Pipeline(args) => command_pipeline(&args, &config, ssh_credentials, &cli.event_store),
        Command::Apply(args) => command_apply(&args, &config, ssh_credentials),
        Command::Rollout {
            command: RolloutCommand::Status {
                run,
            },
        } => command_rollout_status(&run, &cli.event_store),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<OttoConfig, OttoError> {
    let mut config = match path {
        Some(path) => OttoConfig::load_from_file(path).map_err(|err| OttoError::InputValidation(err.to_string()))?,
        None => OttoConfig::default(),
    };
    config.apply_env_overrides().map_err(|err| OttoError::InputValidation(err.to_string()))?;
    Ok(config)
}

fn finalization_mode(config: &OttoConfig) -> FinalizationMode {
    match config.mode {
        OperatingMode::Autonomous => FinalizationMode::AutoFinalize,
        OperatingMode::System => FinalizationMode::ManualConfirm,
    }
}

fn build_safety_manager(config: &OttoConfig, ssh_credentials: SshCredentials) -> Arc<UnifiedSafetyManager> {
    let vrp_store = VrpStore::new(config.rpki.vrp_cache_path.clone());
    let vrp_path = std::path::Path::new(&config.rpki.vrp_cache_path);
    if vrp_path.exists() {
        if let Err(err) = vrp_store.load_from(vrp_path) {
            tracing::warn!(%err, path = %vrp_path.display(), "failed to load VRP cache, continuing with an empty dataset");
        }
    }

    let allowlist_path = std::path::Path::new(&config.rpki.allowlist_path);
    let allowlist = if allowlist_path.exists() {
        Allowlist::load_from(allowlist_path).unwrap_or_else(|err| {
            tracing::warn!(%err, path = %allowlist_path.display(), "failed to load RPKI allowlist, continuing with an empty overlay");
            Allowlist::empty()
        })
    } else {
        Allowlist::empty()
    };

    let rpki_validator = RpkiValidator::new(vrp_store, allowlist, &config.rpki);
    Arc::new(UnifiedSafetyManager::new(
        config.guardrails.clone(),
        config.netconf.clone(),
        config.notifications.clone(),
        rpki_validator,
        ssh_credentials,
    ))
}

fn command_pipeline(
    args: &PipelineArgs,
    config: &OttoConfig,
    ssh_credentials: SshCredentials,
    event_store_path: &std::path::Path,
) -> Result<ExitCode, OttoError> {
    let manifest = PipelineManifest::load(&args.manifest)?;
    let safety = build_safety_manager(config, ssh_credentials);
    let mode = finalization_mode(config);

    match args.mode {
        PipelineModeArg::Direct => {
            let orchestrator = PipelineOrchestrator::new(safety);
            let report = orchestrator
                .run_direct(&manifest.policies_by_hostname, &manifest.addresses(), mode)
                .map_err(PipelineError::into_otto_error)?;
            let results_json = report
                .direct_results
                .iter()
                .map(|result| serde_json::to_value(result).map_err(|err| OttoError::General(err.to_string())))
                .collect::<Result<Vec<_>, OttoError>>()?;
            print_json(&serde_json::json!({"results": results_json}))?;

            // Several routers can fail with different guardrail/health/NETCONF
            // causes; the process exit code reports the first failure's code
            // rather than collapsing every cause to one generic value.
            let exit_code = report
                .direct_results
                .iter()
                .find(|result| !result.success())
                .map_or(ExitCode::Success, ApplicationResult::exit_code);
            Ok(exit_code)
        }
        PipelineModeArg::Coordinator => {
            let event_store = Arc::new(EventStore::open(event_store_path).map_err(|err| OttoError::Resource(err.to_string()))?);
            let coordinator = Arc::new(RolloutCoordinator::new(event_store, Arc::clone(&safety)));
            let orchestrator = PipelineOrchestrator::with_coordinator(safety, Arc::clone(&coordinator));
            let strategy_choice = parse_strategy_arg(&args.strategy)?;

            let report = orchestrator
                .run_coordinated(
                    &manifest.devices,
                    &manifest.policies_by_hostname,
                    &strategy_choice,
                    &config.rollout,
                    args.initiated_by.clone(),
                    mode,
                )
                .map_err(PipelineError::into_otto_error)?;

            let Some(run_id) = report.run_id else {
                return Err(OttoError::General("coordinator mode returned no run_id".to_owned()));
            };
            print_json(&serde_json::json!({"run_id": run_id.as_str()}))?;

            let status = coordinator.status(&run_id).map_err(|err| OttoError::General(err.to_string()))?;
            Ok(if status.run.all_targets_succeeded_or_skipped() {
                ExitCode::Success
            } else {
                ExitCode::SafetyCheckFailed
            })
        }
    }
}

fn command_apply(args: &ApplyArgs, config: &OttoConfig, ssh_credentials: SshCredentials) -> Result<ExitCode, OttoError> {
    let policies = load_policies(&args.policies)?;
    let safety = build_safety_manager(config, ssh_credentials);
    let mode = finalization_mode(config);
    let hostname = Hostname::new(args.hostname.clone());

    let check = safety.validate_policies_before_apply(&policies);
    let result = safety.execute_pipeline(&policies, &hostname, &args.address, mode, check, None);

    print_json(&serde_json::to_value(&result).map_err(|err| OttoError::General(err.to_string()))?)?;
    Ok(result.exit_code())
}

fn command_rollout_status(run: &str, event_store_path: &std::path::Path) -> Result<ExitCode, OttoError> {
    let event_store = EventStore::open(event_store_path).map_err(|err| OttoError::Resource(err.to_string()))?;
    let run_id = RunId::new(run);
    let events = event_store.events_for_run(&run_id).map_err(|err| OttoError::Resource(err.to_string()))?;
    let last = event_store.last_event_for_run(&run_id).map_err(|err| OttoError::Resource(err.to_string()))?;

    print_json(&serde_json::json!({
        "run_id": run_id.as_str(),
        "event_count": events.len(),
        "last_event": last,
    }))?;
    Ok(ExitCode::Success)
}

fn parse_strategy_arg(raw: &str) -> Result<StrategyChoice, OttoError> {
    match StrategyChoiceArg::parse(raw) {
        Some(StrategyChoiceArg::Blast) => Ok(StrategyChoice::Blast),
        Some(StrategyChoiceArg::PhasedRegion) => Ok(StrategyChoice::Phased(PhaseKey::Region)),
        Some(StrategyChoiceArg::PhasedRole) => Ok(StrategyChoice::Phased(PhaseKey::Role)),
        Some(StrategyChoiceArg::Canary(hostname)) => Ok(StrategyChoice::Canary(hostname)),
        None => Err(OttoError::InputValidation(format!("unrecognized --strategy value {raw:?}"))),
    }
}

fn load_policies(path: &std::path::Path) -> Result<Vec<Policy>, OttoError> {
    let bytes = std::fs::read(path).map_err(|err| OttoError::Resource(format!("reading {}: {err}", path.display())))?;
    serde_json::from_slice(&bytes).map_err(|err| OttoError::InputValidation(format!("parsing {}: {err}", path.display())))
}

fn print_json(value: &serde_json::Value) -> Result<(), OttoError> {
    let text = serde_json::to_string_pretty(value).map_err(|err| OttoError::General(err.to_string()))?;
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{text}").map_err(|err| OttoError::Resource(err.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_strategy_arg_accepts_named_strategies() {
        assert!(matches!(parse_strategy_arg("blast").unwrap(), StrategyChoice::Blast));
        assert!(matches!(parse_strategy_arg("phased-region").unwrap(), StrategyChoice::Phased(PhaseKey::Region)));
        assert!(matches!(parse_strategy_arg("canary:r1").unwrap(), StrategyChoice::Canary(_)));
        assert!(parse_strategy_arg("bogus").is_err());
    }
}
