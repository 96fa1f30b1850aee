//! bulwark CLI - inspect and edit a world's region file.
//!
//! The world name is the file stem. Membership edits run through the same
//! command path the engine uses in-game, with the console as the sender.
//! Names cannot be resolved offline, so only identifiers and groups are
//! accepted.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use bulwark_config::GuardConfig;
use bulwark_core::JsonRegionStore;
use bulwark_engine::{
    CommandError, CommandSource, CommandStatus, Engine, MembershipArgs, MessageSink, Targets,
    report_failure,
};
use bulwark_identity::{ResolutionPolicy, StaticProfileService};
use bulwark_types::{AttributeKey, BlockVector, PrincipalId};

#[derive(Parser)]
#[command(name = "bulwark")]
#[command(about = "Inspect and edit a world's region file")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every region with its priority, parent, volume and domains
    Regions {
        /// Region file; its stem names the world
        file: PathBuf,
    },
    /// Show the regions at a block and how attributes resolve there
    #[command(allow_negative_numbers = true)]
    Query {
        /// Region file; its stem names the world
        file: PathBuf,
        x: i32,
        y: i32,
        z: i32,
        /// Attributes to resolve (default: all)
        #[arg(value_parser = parse_attribute)]
        attributes: Vec<AttributeKey>,
    },
    /// Count the regions a player owns
    Owned {
        /// Region file; its stem names the world
        file: PathBuf,
        #[arg(value_parser = parse_player)]
        player: PrincipalId,
    },
    /// Add members to a region
    AddMembers(MembershipCommand),
    /// Add owners to a region
    AddOwners(MembershipCommand),
    /// Remove members from a region
    RemoveMembers(MembershipCommand),
    /// Remove owners from a region
    RemoveOwners(MembershipCommand),
}

#[derive(Args)]
struct MembershipCommand {
    /// Region file; its stem names the world
    file: PathBuf,
    region: String,
    /// Player identifiers or `g:group` tokens
    #[arg(required_unless_present = "all")]
    targets: Vec<String>,
    /// Remove everyone (removal only)
    #[arg(short = 'a', long, conflicts_with = "targets")]
    all: bool,
}

impl MembershipCommand {
    fn targets(&self) -> Targets {
        if self.all {
            Targets::All
        } else {
            Targets::Tokens(self.targets.clone())
        }
    }
}

fn parse_attribute(raw: &str) -> Result<AttributeKey, String> {
    AttributeKey::parse(raw).ok_or_else(|| format!("unknown attribute '{raw}'"))
}

fn parse_player(raw: &str) -> Result<PrincipalId, String> {
    PrincipalId::parse(raw).ok_or_else(|| format!("invalid player uuid '{raw}'"))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // Stdout carries command output; without a log file, log to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.bulwark/logs/bulwark.log
    if let Some(config_path) = GuardConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("bulwark.log"));
    }

    // Fallback: ./.bulwark/logs/bulwark.log
    candidates.push(PathBuf::from(".bulwark").join("logs").join("bulwark.log"));

    candidates
}

fn load_config() -> GuardConfig {
    match GuardConfig::load() {
        Ok(Some(config)) => config,
        Ok(None) => GuardConfig::default(),
        Err(err) => {
            tracing::warn!(path = %err.path().display(), error = %err, "Ignoring unreadable config");
            GuardConfig::default()
        }
    }
}

struct Stdout;

impl MessageSink for Stdout {
    fn send(&self, message: &str) {
        println!("{message}");
    }
}

fn world_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_owned)
        .with_context(|| format!("cannot derive a world name from {}", path.display()))
}

type MembershipOp =
    fn(&Engine, &CommandSource, MembershipArgs) -> Result<CommandStatus, CommandError>;

impl Command {
    fn file(&self) -> &Path {
        match self {
            Command::Regions { file }
            | Command::Query { file, .. }
            | Command::Owned { file, .. } => file,
            Command::AddMembers(args)
            | Command::AddOwners(args)
            | Command::RemoveMembers(args)
            | Command::RemoveOwners(args) => &args.file,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let path = cli.command.file().to_path_buf();
    let world = world_name(&path)?;
    let store = JsonRegionStore::new(&path);
    let mut engine = Engine::new(
        load_config(),
        Arc::new(StaticProfileService::new()),
        tokio::runtime::Handle::current(),
    );
    let loaded = engine
        .load_world(&world, &store)
        .with_context(|| format!("loading {}", path.display()))?;

    let (args, op): (MembershipCommand, MembershipOp) = match cli.command {
            Command::Regions { .. } => {
                for region in loaded.index().regions() {
                    let parent = region
                        .parent()
                        .map(|p| format!(" parent={p}"))
                        .unwrap_or_default();
                    println!(
                        "{} priority={}{parent} volume={} owners={} members={}",
                        region.id(),
                        region.priority(),
                        region.bounds().volume(),
                        region.owners(),
                        region.members()
                    );
                }
                return Ok(());
            }
            Command::Query {
                x,
                y,
                z,
                attributes,
                ..
            } => {
                let point = BlockVector::new(x, y, z);
                let keys = if attributes.is_empty() {
                    AttributeKey::all().to_vec()
                } else {
                    attributes
                };

                let set = loaded.index().query(point);
                let ids: Vec<String> = set.regions().map(|r| r.id().to_string()).collect();
                println!("{point}: [{}]", ids.join(", "));
                for key in keys {
                    let resolved = set.resolve_attribute(key, None);
                    let value = resolved
                        .value()
                        .map_or_else(|| "unset".to_owned(), ToString::to_string);
                    match resolved.source() {
                        Some(source) => println!("  {key} = {value} (from {})", source.id()),
                        None => println!("  {key} = {value} (default)"),
                    }
                }
                return Ok(());
            }
            Command::Owned { player, .. } => {
                println!("{}", loaded.index().count_owned_by(&player));
                return Ok(());
            }
            Command::AddMembers(args) => (args, Engine::add_members),
            Command::AddOwners(args) => (args, Engine::add_owners),
            Command::RemoveMembers(args) => (args, Engine::remove_members),
            Command::RemoveOwners(args) => (args, Engine::remove_owners),
        };

    let membership = MembershipArgs::new(&world, &args.region, args.targets())
        .with_policy(ResolutionPolicy::UuidOnly);
    let console = CommandSource::console(Arc::new(Stdout));
    if let Err(err) = op(&engine, &console, membership) {
        report_failure(&console, &err);
        return Ok(());
    }
    while !engine.supervisor().is_empty() {
        engine.tick(Instant::now());
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    engine
        .save_world(&world, &store)
        .with_context(|| format!("saving {}", path.display()))?;

    Ok(())
}
