use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Result};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use specwright_core::status::AgentState;
use specwright_core::{
    AgentPhase, AgentRole, Config, Confirmation, FileStorage, ProjectManager, ProjectPhase,
    ProjectStatus, SessionKey, Storage, Workflow, WorkflowRegistry,
};

mod watch;

type Manager = ProjectManager<FileStorage>;

#[derive(Parser)]
#[command(name = "specwright")]
#[command(about = "Drive a PM, designer and engineer assistant through a specification workflow", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./specwright.toml, then the user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project
    Init {
        /// Project id (defaults to the next free number)
        #[arg(long)]
        id: Option<String>,
    },
    /// List all projects
    List,
    /// Show a project's progress
    Status { id: String },
    /// Start the current phase
    Begin { id: String, phase: AgentPhase },
    /// Mark a question or review phase as being worked on by the user
    Review { id: String, phase: AgentPhase },
    /// Confirm a phase is done
    Complete { id: String, phase: AgentPhase },
    /// Check a phase against the files on disk
    Validate {
        id: String,
        /// Phase to check (defaults to the recorded one)
        phase: Option<ProjectPhase>,
    },
    /// Rewind a project to the latest phase its files support
    Recover { id: String },
    /// Complete the current phase if its output has been written
    Sync { id: String },
    /// Reset an agent and every agent after it
    Reset { id: String, agent: AgentRole },
    /// Record assistant spend
    Cost { id: String, agent: AgentRole, usd: f64 },
    /// Print the prompt for a workflow
    Prompt {
        workflow: String,
        id: String,
        /// What you want the assistant to do
        #[arg(required = true)]
        request: Vec<String>,
    },
    /// Print the prompt for the project's current phase
    NextPrompt {
        id: String,
        #[arg(required = true)]
        request: Vec<String>,
    },
    /// List the available workflows
    Workflows,
    /// Manage assistant sessions
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
    /// Wait for the current phase's output, then complete the phase
    AwaitOutput {
        id: String,
        #[arg(long)]
        timeout_secs: Option<u64>,
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: Option<u64>,
    },
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Print an agent's session id
    Get { id: String, agent: SessionKey },
    /// Remember an agent's session id
    Save {
        id: String,
        agent: SessionKey,
        session_id: String,
    },
    /// Forget an agent's session id
    Clear { id: String, agent: SessionKey },
    /// Forget every session of a project
    ClearAll { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    init_logging(cli.verbose, &config.logging.level);

    WorkflowRegistry::builtin().verify_against_catalog()?;

    let storage = FileStorage::with_config(config.storage.clone());
    let manager = ProjectManager::with_settings(storage, config.project.to_settings());

    run(cli.command, &manager, &config).await
}

/// Logs go to stderr so prompts on stdout can be piped.
fn init_logging(verbose: bool, level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(command: Commands, manager: &Manager, config: &Config) -> Result<()> {
    match command {
        Commands::Init { id } => {
            let status = manager.create_project(id.as_deref())?;
            println!("Created project {}", status.project_id);
            println!("  Directory: {}", manager.storage().project_dir(&status.project_id).display());
            println!("  Phase: {}", status.current_phase);
        }
        Commands::List => {
            let projects = manager.list_projects()?;
            if projects.is_empty() {
                println!("No projects found. Use 'specwright init' to create one.");
            }
            for project in projects {
                println!(
                    "{:<12} {:<28} {}",
                    project.project_id,
                    project.current_phase.to_string(),
                    project.last_updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Status { id } => print_status(&manager.get_status(&id)?),
        Commands::Begin { id, phase } => print_status(&manager.begin_phase(&id, phase)?),
        Commands::Review { id, phase } => print_status(&manager.mark_user_reviewing(&id, phase)?),
        Commands::Complete { id, phase } => {
            print_status(&manager.complete_phase(&id, phase, Confirmation::User)?)
        }
        Commands::Validate { id, phase } => {
            let claimed = match phase {
                Some(phase) => phase,
                None => manager.load_or_init_status(&id)?.current_phase,
            };
            print_json(&manager.validate_current_phase(&id, claimed)?)?;
        }
        Commands::Recover { id } => print_json(&manager.validate_and_recover_phase(&id)?)?,
        Commands::Sync { id } => match manager.sync_generated_output(&id)? {
            Some(phase) => println!("Completed {phase}"),
            None => println!("Nothing to sync"),
        },
        Commands::Reset { id, agent } => print_status(&manager.reset_agent(&id, agent)?),
        Commands::Cost { id, agent, usd } => {
            let status = manager.record_cost(&id, agent, usd)?;
            if let Some(cost) = &status.cost_tracking {
                println!("Total spend: ${:.2}", cost.total_usd);
            }
        }
        Commands::Prompt {
            workflow,
            id,
            request,
        } => {
            let prompt = manager.build_prompt(&workflow, &id, &request.join(" "))?;
            print!("{}", prompt.prompt_text);
        }
        Commands::NextPrompt { id, request } => {
            let next = manager.prompt_for_current_phase(&id, &request.join(" "))?;
            if let Some(session) = &next.session_id {
                eprintln!("Resume session {session} for {}", next.phase.agent());
            }
            print!("{}", next.prompt.prompt_text);
        }
        Commands::Workflows => print_workflows(manager.registry()),
        Commands::Session { command } => run_session(command, manager)?,
        Commands::AwaitOutput {
            id,
            timeout_secs,
            interval_ms,
        } => {
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.watch.poll_interval());
            let timeout = timeout_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.watch.timeout());

            match watch::await_output(manager, &id, interval, timeout).await? {
                watch::WatchOutcome::Completed(phase) => println!("Completed {phase}"),
                watch::WatchOutcome::NotSynced(phase) => {
                    println!("Output for {phase} changed but the phase was not completed")
                }
                watch::WatchOutcome::TimedOut(path) => {
                    bail!("Timed out waiting for {}", path.display())
                }
            }
        }
    }

    Ok(())
}

fn run_session(command: SessionCommand, manager: &Manager) -> Result<()> {
    let sessions = manager.sessions();
    match command {
        SessionCommand::Get { id, agent } => match sessions.get_agent_session(&id, agent)? {
            Some(session) => println!("{session}"),
            None => bail!("No session saved for {agent} in {id}"),
        },
        SessionCommand::Save {
            id,
            agent,
            session_id,
        } => {
            sessions.save_agent_session(&id, agent, session_id)?;
            println!("Saved {agent} session for {id}");
        }
        SessionCommand::Clear { id, agent } => {
            if sessions.clear_agent_session(&id, agent)? {
                println!("Cleared {agent} session for {id}");
            } else {
                println!("No {agent} session for {id}");
            }
        }
        SessionCommand::ClearAll { id } => {
            sessions.clear_all_sessions(&id)?;
            println!("Cleared all sessions for {id}");
        }
    }
    Ok(())
}

fn print_status(status: &ProjectStatus) {
    println!("Project {}", status.project_id);
    println!("  Phase: {}", status.current_phase);
    for agent in AgentRole::ALL {
        let agent_status = status.agents.get(agent);
        let marker = match agent_status.status {
            AgentState::Complete => "done",
            AgentState::InProgress => "active",
            AgentState::NotStarted => "",
        };
        println!("  {:<16} {marker}", agent.display_name());
        for phase in agent.phases() {
            println!(
                "    {:<24} {}",
                phase.as_str(),
                status.phase_status(agent, phase).display_name()
            );
        }
    }
}

fn print_workflows(registry: &WorkflowRegistry) {
    for workflow in registry.iter() {
        match workflow {
            Workflow::Leaf(leaf) => {
                println!("{:<20} {:<9} {}", leaf.name, leaf.agent.as_str(), leaf.outputs.join(", "))
            }
            Workflow::Composite(composite) => {
                println!("{:<20} {:<9} {}", composite.name, "-", composite.phases.join(" > "))
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
