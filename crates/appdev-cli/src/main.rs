//! Appdev - develop and deploy apps against a remote app server
//!
//! Usage:
//!   appdev server -q <host> -u <user>   # Set defaults and fetch the CA bundle
//!   appdev preregister                  # Preregister the workspace app
//!   appdev register [--ip <addr>]       # Register the locally running app
//!   appdev deploy -p <app.zip>          # Install or upgrade a packaged app

mod interactive;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use console::style;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use appdev_core::prelude::*;
use appdev_core::trust::RemoteShellConnector;

use crate::interactive::TerminalOperator;

const DEFAULT_LOCAL_IP: &str = "127.0.0.1";

#[derive(Parser)]
#[command(name = "appdev")]
#[command(about = "App developer workflow tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct ServerArgs {
    /// Server to use; saved as the default when given
    #[arg(short = 'q', long = "host")]
    host: Option<String>,

    /// User for API calls; saved as the default when given
    #[arg(short, long)]
    user: Option<String>,
}

#[derive(Args, Clone)]
struct WorkspaceArgs {
    /// App workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,
}

#[derive(Args, Clone)]
struct AppIdArgs {
    /// Application id on the server
    #[arg(short = 'a', long = "app-id")]
    app_id: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or set the default server and user, and ensure a CA bundle
    Server(ServerArgs),

    /// Preregister the workspace app as a development app
    Preregister {
        #[command(flatten)]
        workspace: WorkspaceArgs,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Register (or update) the locally running development app
    Register {
        #[command(flatten)]
        workspace: WorkspaceArgs,
        #[command(flatten)]
        server: ServerArgs,
        /// Address the server uses to reach this computer
        ///
        /// Defaults to 127.0.0.1 on the assumption that remote port forwarding is used.
        #[arg(short, long, default_value = DEFAULT_LOCAL_IP)]
        ip: String,
    },

    /// Deregister the workspace's development app
    Deregister {
        #[command(flatten)]
        workspace: WorkspaceArgs,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Install or upgrade a packaged app
    Deploy {
        /// Path to the app zip
        #[arg(short, long)]
        package: PathBuf,
        /// Authorization user to use if the app requests capabilities
        #[arg(short = 'o', long)]
        auth_user: Option<String>,
        /// Upload timeout in seconds; raise it for large packages
        #[arg(short, long, default_value_t = UPLOAD_TIMEOUT.as_secs())]
        timeout: u64,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Authorize an app that is waiting for an authorization user
    Authorize {
        #[command(flatten)]
        app: AppIdArgs,
        #[arg(short = 'o', long)]
        auth_user: Option<String>,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Show an app's status
    Status {
        #[command(flatten)]
        app: AppIdArgs,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Cancel an in-progress install
    Cancel {
        #[command(flatten)]
        app: AppIdArgs,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Delete an installed app
    Delete {
        #[command(flatten)]
        app: AppIdArgs,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Print the development app instance id for local runs
    InstanceId {
        #[command(flatten)]
        workspace: WorkspaceArgs,
        #[command(flatten)]
        server: ServerArgs,
    },
}

/// How a command finished when it did not fail outright.
enum Completion {
    Success,
    /// Completed, but the process should still exit non-zero.
    Failure,
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "appdev=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let operator = TerminalOperator::new();

    match run_cli(cli.command, &operator) {
        Ok(Completion::Success) => ExitCode::SUCCESS,
        Ok(Completion::Failure) => ExitCode::FAILURE,
        Err(err) => report(&operator, err),
    }
}

fn report(operator: &TerminalOperator, err: anyhow::Error) -> ExitCode {
    match err.downcast_ref::<Error>() {
        Some(e) if e.is_declined() => {
            operator.say(&e.to_string());
            ExitCode::SUCCESS
        }
        Some(e) => {
            eprintln!("{}", style(strip_errno_prefix(&e.to_string())).red());
            ExitCode::FAILURE
        }
        None => {
            eprintln!("{}", style(strip_errno_prefix(&format!("{err:#}"))).red());
            ExitCode::FAILURE
        }
    }
}

fn run_cli(command: Commands, operator: &TerminalOperator) -> Result<Completion> {
    let context = AppContext::from_env()?;
    let connector = Ssh2Connector;

    match command {
        Commands::Server(server) => {
            run_server(&context, operator, &connector, &server)?;
            Ok(Completion::Success)
        }
        Commands::Preregister { workspace, server } => {
            let workspace = Workspace::open(&workspace.workspace)?;
            let resolved = resolve(&context, operator, &server)?;
            context.with_client(&resolved, operator, &connector, None, |client| {
                RegistrationCoordinator::new(client, operator).preregister(&workspace)
            })?;
            Ok(Completion::Success)
        }
        Commands::Register {
            workspace,
            server,
            ip,
        } => {
            let workspace = Workspace::open(&workspace.workspace)?;
            let resolved = resolve(&context, operator, &server)?;
            let runtime = DockerCli::default();
            context.with_client(&resolved, operator, &connector, None, |client| {
                RegistrationCoordinator::new(client, operator).register(&workspace, &ip, &runtime)
            })?;
            Ok(Completion::Success)
        }
        Commands::Deregister { workspace, server } => {
            let workspace = Workspace::open_unchecked(&workspace.workspace)?;
            let resolved = resolve(&context, operator, &server)?;
            let remote = context.with_client(&resolved, operator, &connector, None, |client| {
                RegistrationCoordinator::new(client, operator).deregister_remote(&workspace)
            });
            let outcome = finish_deregister(&workspace, &resolved.host, remote)?;
            Ok(match outcome {
                DeregisterOutcome::Removed => Completion::Success,
                DeregisterOutcome::NotFound => Completion::Failure,
            })
        }
        Commands::Deploy {
            package,
            auth_user,
            timeout,
            server,
        } => {
            let resolved = resolve(&context, operator, &server)?;
            let timeout = Duration::from_secs(timeout);
            if timeout != UPLOAD_TIMEOUT {
                operator.say(&format!("Using upload timeout {}s", timeout.as_secs()));
            }
            // Polling gets its own SSL retry so it never repeats the upload.
            let submission =
                context.with_client(&resolved, operator, &connector, Some(timeout), |client| {
                    DeploymentCoordinator::new(client, operator).submit(&package)
                })?;
            let outcome = context.with_client(&resolved, operator, &connector, None, |client| {
                DeploymentCoordinator::new(client, operator)
                    .follow(&submission, auth_user.as_deref())
            })?;
            Ok(completion_for(&outcome))
        }
        Commands::Authorize {
            app,
            auth_user,
            server,
        } => {
            let resolved = resolve(&context, operator, &server)?;
            let app_id = RemoteId::new(app.app_id);
            let outcome = context.with_client(&resolved, operator, &connector, None, |client| {
                DeploymentCoordinator::new(client, operator).authorize(&app_id, auth_user.as_deref())
            })?;
            Ok(completion_for(&outcome))
        }
        Commands::Status { app, server } => {
            let resolved = resolve(&context, operator, &server)?;
            let app_id = RemoteId::new(app.app_id);
            context.with_client(&resolved, operator, &connector, None, |client| {
                DeploymentCoordinator::new(client, operator).status(&app_id)
            })?;
            Ok(Completion::Success)
        }
        Commands::Cancel { app, server } => {
            let resolved = resolve(&context, operator, &server)?;
            let app_id = RemoteId::new(app.app_id);
            context.with_client(&resolved, operator, &connector, None, |client| {
                DeploymentCoordinator::new(client, operator).cancel(&app_id)
            })?;
            Ok(Completion::Success)
        }
        Commands::Delete { app, server } => {
            let resolved = resolve(&context, operator, &server)?;
            let app_id = RemoteId::new(app.app_id);
            context.with_client(&resolved, operator, &connector, None, |client| {
                DeploymentCoordinator::new(client, operator).delete(&app_id)
            })?;
            Ok(Completion::Success)
        }
        Commands::InstanceId { workspace, server } => {
            run_instance_id(&context, operator, &workspace, &server)
        }
    }
}

fn resolve(
    context: &AppContext,
    operator: &TerminalOperator,
    server: &ServerArgs,
) -> Result<ResolvedServer> {
    let resolved = context.resolve_server(
        server.host.as_deref(),
        server.user.as_deref(),
        operator,
        false,
    )?;
    debug!(host = %resolved.host, user = %resolved.user, "resolved server");
    Ok(resolved)
}

fn run_server(
    context: &AppContext,
    operator: &TerminalOperator,
    connector: &dyn RemoteShellConnector,
    server: &ServerArgs,
) -> Result<()> {
    let resolved = context.resolve_server(
        server.host.as_deref(),
        server.user.as_deref(),
        operator,
        true,
    )?;
    let store = context.trust_store();
    let verification =
        TrustBootstrap::new(&store, operator, connector, context.settings()).ensure(&resolved.host)?;
    if let Verification::Bundle(path) = verification {
        operator.say(&format!("CA certificate bundle: {}", path.display()));
    }
    Ok(())
}

/// Local-run mode: never prompts for trust material.
fn run_instance_id(
    context: &AppContext,
    operator: &TerminalOperator,
    workspace: &WorkspaceArgs,
    server: &ServerArgs,
) -> Result<Completion> {
    let workspace = Workspace::open_unchecked(&workspace.workspace)?;
    let resolved = resolve(context, operator, server)?;
    check_bootstrapped(&context.trust_store(), &resolved.host)?;

    match instance_id_for(&workspace, &resolved.host) {
        Some(instance_id) => {
            operator.say(instance_id.as_str());
            Ok(Completion::Success)
        }
        None => {
            operator.say(&format!(
                "No development app for workspace [{}] has been preregistered against {}",
                workspace.name(),
                resolved.host
            ));
            Ok(Completion::Failure)
        }
    }
}

fn completion_for(outcome: &DeployOutcome) -> Completion {
    if outcome.is_failure() {
        Completion::Failure
    } else {
        Completion::Success
    }
}
