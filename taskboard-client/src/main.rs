//! # Taskboard CLI
//!
//! Command-line front end for the Taskboard API, built on
//! `taskboard_client::ClientContext`.
//!
//! ## Usage
//!
//! ```bash
//! taskboard signup alice --email alice@example.com --password s3cret-pass
//! taskboard login alice --password s3cret-pass
//! taskboard projects
//! taskboard tasks --project 1 --status todo
//! taskboard task-add --project 1 "Write copy" --priority high
//! taskboard task-done --project 1 7
//! ```
//!
//! The password may also come from `TASKBOARD_PASSWORD`. Log output goes to
//! stderr and is controlled by `RUST_LOG`.

use anyhow::{bail, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use taskboard_client::config::ClientConfig;
use taskboard_client::dashboard::Dashboard;
use taskboard_client::session::SignupFlowError;
use taskboard_client::{ClientContext, ClientError};
use taskboard_shared::models::{
    CreateProject, CreateTask, Project, ProjectId, SignupRequest, Task, TaskId, TaskPriority,
    TaskStatus, UpdateTask,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Task-management client
#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Manage projects and tasks on a Taskboard server", long_about = None)]
#[command(version)]
struct Cli {
    /// API root, overriding configuration
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the server is reachable
    Health,

    /// Create an account (does not log in unless --login is given)
    Signup {
        username: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
        password: String,

        /// Log in right after the account is created
        #[arg(long)]
        login: bool,
    },

    /// Log in and store the credential
    Login {
        username: String,

        #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored credential
    Logout,

    /// Show the logged-in user
    Whoami,

    /// List projects
    Projects,

    /// Create a project
    ProjectAdd {
        name: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a project and all of its tasks
    ProjectRm { id: ProjectId },

    /// List the tasks of a project
    Tasks {
        #[arg(long)]
        project: ProjectId,

        /// todo, doing or done
        #[arg(long)]
        status: Option<TaskStatus>,

        /// low, medium or high
        #[arg(long)]
        priority: Option<TaskPriority>,

        /// Text to search for in titles and descriptions
        #[arg(long)]
        search: Option<String>,
    },

    /// Create a task
    TaskAdd {
        #[arg(long)]
        project: ProjectId,

        title: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        status: Option<TaskStatus>,

        #[arg(long)]
        priority: Option<TaskPriority>,

        /// Due date as YYYY-MM-DD
        #[arg(long)]
        due: Option<NaiveDate>,
    },

    /// Change fields of a task
    TaskUpdate {
        #[arg(long)]
        project: ProjectId,

        id: TaskId,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        status: Option<TaskStatus>,

        #[arg(long)]
        priority: Option<TaskPriority>,

        #[arg(long)]
        due: Option<NaiveDate>,
    },

    /// Mark a task as done
    TaskDone {
        #[arg(long)]
        project: ProjectId,

        id: TaskId,
    },

    /// Delete a task
    TaskRm {
        #[arg(long)]
        project: ProjectId,

        id: TaskId,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "Command failed");
            eprintln!("Error: {}", describe(&err));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskboard=info,taskboard_client=warn".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Message shown to the user for a failed command
fn describe(err: &anyhow::Error) -> String {
    if let Some(err) = err.downcast_ref::<ClientError>() {
        return err.user_message();
    }
    if let Some(err) = err.downcast_ref::<SignupFlowError>() {
        return err.user_message();
    }
    format!("{:#}", err)
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ClientConfig::load()?;
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
        config.validate()?;
    }

    let ctx = ClientContext::new(config)?;
    ctx.session().install_unauthorized_teardown(None);

    match cli.command {
        Commands::Health => {
            let health = ctx.health().await?;
            if !health.is_ok() {
                bail!("Server reported status '{}'", health.status);
            }
            println!("ok ({})", ctx.http().base_url());
        }

        Commands::Signup {
            username,
            email,
            password,
            login,
        } => {
            let request = SignupRequest::new(&username, email.as_deref(), &password);
            let user = if login {
                ctx.session().signup_and_login(request).await?
            } else {
                ctx.session().signup(request).await?
            };
            println!("Account '{}' created", user.username);
            if login {
                println!("Logged in as {}", user.username);
            }
        }

        Commands::Login { username, password } => {
            ctx.session().login(&username, &password).await?;
            println!("Logged in as {}", username);
        }

        Commands::Logout => {
            ctx.session().logout();
            println!("Logged out");
        }

        Commands::Whoami => {
            require_login(&ctx)?;
            let user = ctx.session().get_me().await?;
            match user.email() {
                Some(email) => println!("{} <{}>", user.username, email),
                None => println!("{}", user.username),
            }
        }

        Commands::Projects => {
            require_login(&ctx)?;
            let projects = ctx.dashboard().projects().settled().await?;
            if projects.is_empty() {
                println!("No projects yet");
            }
            for project in projects.iter() {
                println!("{}", format_project(project));
            }
        }

        Commands::ProjectAdd { name, description } => {
            require_login(&ctx)?;
            let mut input = CreateProject::new(name);
            if let Some(description) = description {
                input = input.with_description(description);
            }
            let project = ctx.dashboard().create_project(input).await?;
            println!("Created {}", format_project(&project));
        }

        Commands::ProjectRm { id } => {
            require_login(&ctx)?;
            ctx.dashboard().delete_project(id).await?;
            println!("Deleted project {}", id);
        }

        Commands::Tasks {
            project,
            status,
            priority,
            search,
        } => {
            require_login(&ctx)?;
            let dashboard = ctx.dashboard();
            dashboard.select_project(Some(project));
            dashboard.set_status(status);
            dashboard.set_priority(priority);
            if let Some(search) = search {
                dashboard.set_search(&search);
            }

            let tasks = visible_tasks(dashboard).await?;
            if tasks.is_empty() {
                println!("No matching tasks");
            }
            let today = Utc::now().date_naive();
            for task in &tasks {
                println!("{}", format_task(task, today));
            }
        }

        Commands::TaskAdd {
            project,
            title,
            description,
            status,
            priority,
            due,
        } => {
            require_login(&ctx)?;
            let mut input = CreateTask::new(project, title);
            if let Some(description) = description {
                input = input.with_description(description);
            }
            if let Some(status) = status {
                input = input.with_status(status);
            }
            if let Some(priority) = priority {
                input = input.with_priority(priority);
            }
            if let Some(due) = due {
                input = input.with_due_date(due);
            }

            ctx.dashboard().select_project(Some(project));
            let task = ctx.dashboard().create_task(input).await?;
            println!("Created {}", format_task(&task, Utc::now().date_naive()));
        }

        Commands::TaskUpdate {
            project,
            id,
            title,
            status,
            priority,
            due,
        } => {
            require_login(&ctx)?;
            let input = UpdateTask {
                title,
                status,
                priority,
                due_date: due,
                ..UpdateTask::default()
            };
            if input.is_empty() {
                bail!("Nothing to update; pass --title, --status, --priority or --due");
            }

            let task = find_task(ctx.dashboard(), project, id).await?;
            let task = ctx.dashboard().update_task(&task, input).await?;
            println!("Updated {}", format_task(&task, Utc::now().date_naive()));
        }

        Commands::TaskDone { project, id } => {
            require_login(&ctx)?;
            let task = find_task(ctx.dashboard(), project, id).await?;
            ctx.dashboard()
                .update_task(&task, UpdateTask::status(TaskStatus::Done))
                .await?;
            println!("Task {} done", id);
        }

        Commands::TaskRm { project, id } => {
            require_login(&ctx)?;
            let task = find_task(ctx.dashboard(), project, id).await?;
            ctx.dashboard().delete_task(&task).await?;
            println!("Deleted task {}", id);
        }
    }

    Ok(())
}

fn require_login(ctx: &ClientContext) -> Result<()> {
    if !ctx.session().is_authenticated() {
        bail!("Not logged in. Run `taskboard login <username>` first");
    }
    Ok(())
}

/// Waits for the task list of the current selection
async fn visible_tasks(dashboard: &Dashboard) -> Result<Vec<Task>> {
    let Some(mut tasks) = dashboard.tasks() else {
        return Err(ClientError::NoProjectSelected.into());
    };
    Ok(tasks.settled().await?.as_ref().clone())
}

/// Looks a task up in its project's unfiltered list
async fn find_task(dashboard: &Dashboard, project: ProjectId, id: TaskId) -> Result<Task> {
    dashboard.select_project(Some(project));
    let tasks = visible_tasks(dashboard).await?;

    match tasks.into_iter().find(|task| task.id == id) {
        Some(task) => Ok(task),
        None => bail!("Task {} not found in project {}", id, project),
    }
}

fn format_project(project: &Project) -> String {
    match &project.description {
        Some(description) if !description.is_empty() => {
            format!("{:>4}  {}  ({})", project.id, project.name, description)
        }
        _ => format!("{:>4}  {}", project.id, project.name),
    }
}

fn format_task(task: &Task, today: NaiveDate) -> String {
    let mut line = format!(
        "{:>4}  [{:<5}] {:<6}  {}",
        task.id,
        task.status.as_str(),
        task.priority.as_str(),
        task.title
    );
    if let Some(due) = task.due_date {
        line.push_str(&format!("  due {}", due));
        if task.is_overdue(today) {
            line.push_str(" (overdue)");
        }
    }
    line
}
