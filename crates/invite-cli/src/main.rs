//! Invite CLI
//!
//! Command-line interface for Invite Studio - invitation projects, their
//! pages and elements, and project export/import.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use invite_core::{Config, ProjectId, Store, DEFAULT_TEMPLATE_ID};

mod commands;
mod output;
mod prompt;

use commands::element::{ElementEdit, TextStyle};
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "invite")]
#[command(about = "Invite Studio - invitation projects from the command line")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use a specific config file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Manage pages of a project
    Page {
        #[command(subcommand)]
        command: PageCommands,
    },
    /// Manage elements on a page
    Element {
        #[command(subcommand)]
        command: ElementCommands,
    },
    /// Read stored assets
    Asset {
        #[command(subcommand)]
        command: AssetCommands,
    },
    /// Migration and integrity tasks
    Maintenance {
        #[command(subcommand)]
        command: MaintenanceCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show store status (counts, migration state)
    Status,
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// List all projects
    #[command(alias = "ls")]
    List,
    /// Show a project with its pages and elements
    Show {
        /// Project ID
        id: ProjectId,
    },
    /// Create a new project
    #[command(alias = "new")]
    Create {
        /// Project name
        name: String,
        /// Background template of the first page
        #[arg(short, long, default_value_t = DEFAULT_TEMPLATE_ID)]
        template: i64,
    },
    /// Rename a project
    Rename {
        /// Project ID
        id: ProjectId,
        /// New name
        name: String,
    },
    /// Delete a project and all of its assets
    #[command(alias = "rm")]
    Delete {
        /// Project ID
        id: ProjectId,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Export a project to a .invite.json file
    Export {
        /// Project ID
        id: ProjectId,
        /// Output directory (default: current directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Import a project from a .invite.json file
    Import {
        /// Export file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum PageCommands {
    /// Append a page
    Add {
        /// Project ID
        project: ProjectId,
        /// Page name (default: "Page N")
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Rename a page
    Rename {
        /// Project ID
        project: ProjectId,
        /// Page ID
        page: String,
        /// New name
        name: String,
    },
    /// Delete a page and its elements
    #[command(alias = "rm")]
    Delete {
        /// Project ID
        project: ProjectId,
        /// Page ID
        page: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ElementCommands {
    /// Add a text element
    AddText {
        /// Project ID
        project: ProjectId,
        /// Page ID
        page: String,
        /// Text content
        text: String,
        /// Font family (Poppins, Playfair Display, Great Vibes, Arial, Verdana)
        #[arg(long)]
        font: Option<String>,
        /// Font size
        #[arg(long)]
        size: Option<f64>,
        /// Text color, e.g. "#000000"
        #[arg(long)]
        color: Option<String>,
        /// Alignment (left, center, right)
        #[arg(long)]
        align: Option<String>,
    },
    /// Add an image element from a file
    AddImage {
        /// Project ID
        project: ProjectId,
        /// Page ID
        page: String,
        /// Image file (PNG, JPEG, GIF, WebP)
        file: PathBuf,
    },
    /// Move, resize or restyle an element
    Set {
        /// Project ID
        project: ProjectId,
        /// Page ID
        page: String,
        /// Element ID
        element: String,
        /// Horizontal position
        #[arg(long, allow_hyphen_values = true)]
        x: Option<f64>,
        /// Vertical position
        #[arg(long, allow_hyphen_values = true)]
        y: Option<f64>,
        /// Width
        #[arg(long)]
        width: Option<f64>,
        /// Height
        #[arg(long)]
        height: Option<f64>,
        /// Rotation in degrees
        #[arg(long, allow_hyphen_values = true)]
        rotation: Option<f64>,
        /// Text content (text elements only)
        #[arg(long)]
        text: Option<String>,
        /// Font family (text elements only)
        #[arg(long)]
        font: Option<String>,
        /// Font size (text elements only)
        #[arg(long)]
        size: Option<f64>,
        /// Text color (text elements only)
        #[arg(long)]
        color: Option<String>,
        /// Alignment (text elements only)
        #[arg(long)]
        align: Option<String>,
    },
    /// Delete an element
    #[command(alias = "rm")]
    Delete {
        /// Project ID
        project: ProjectId,
        /// Page ID
        page: String,
        /// Element ID
        element: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum AssetCommands {
    /// Write an asset's bytes to a file
    Get {
        /// Asset ID
        id: i64,
        /// Output file
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum MaintenanceCommands {
    /// Run the legacy session migration
    Migrate,
    /// Remove assets whose project no longer exists
    Sweep,
    /// Store a legacy session document for migration
    StashLegacy {
        /// Legacy session JSON file
        file: PathBuf,
        /// Clear the migration-complete flag first
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, autosave_delay_ms, max_image_dimension, log_level)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work without opening the store
    if let Commands::Config { command } = &cli.command {
        init_logging(None);
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(config.log_level.as_deref());

    let mut store = Store::open_with_config(config)?;

    match cli.command {
        Commands::Project { command } => handle_project_command(command, &mut store, &output),
        Commands::Page { command } => handle_page_command(command, &store, &output),
        Commands::Element { command } => handle_element_command(command, &mut store, &output),
        Commands::Asset { command } => match command {
            AssetCommands::Get { id, out } => commands::asset::get(&store, id, out, &output),
        },
        Commands::Maintenance { command } => {
            handle_maintenance_command(command, &mut store, &output)
        }
        Commands::Status => commands::status::show(&store, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_project_command(
    command: ProjectCommands,
    store: &mut Store,
    output: &Output,
) -> Result<()> {
    match command {
        ProjectCommands::List => commands::project::list(store, output),
        ProjectCommands::Show { id } => commands::project::show(store, id, output),
        ProjectCommands::Create { name, template } => {
            commands::project::create(store, name, template, output)
        }
        ProjectCommands::Rename { id, name } => commands::project::rename(store, id, name, output),
        ProjectCommands::Delete { id, yes } => commands::project::delete(store, id, yes, output),
        ProjectCommands::Export { id, out } => commands::project::export(store, id, out, output),
        ProjectCommands::Import { file } => commands::project::import(store, file, output),
    }
}

fn handle_page_command(command: PageCommands, store: &Store, output: &Output) -> Result<()> {
    match command {
        PageCommands::Add { project, name } => commands::page::add(store, project, name, output),
        PageCommands::Rename {
            project,
            page,
            name,
        } => commands::page::rename(store, project, page, name, output),
        PageCommands::Delete { project, page, yes } => {
            commands::page::delete(store, project, page, yes, output)
        }
    }
}

fn handle_element_command(
    command: ElementCommands,
    store: &mut Store,
    output: &Output,
) -> Result<()> {
    match command {
        ElementCommands::AddText {
            project,
            page,
            text,
            font,
            size,
            color,
            align,
        } => {
            let style = TextStyle {
                font,
                size,
                color,
                align,
            };
            commands::element::add_text(store, project, page, text, style, output)
        }
        ElementCommands::AddImage {
            project,
            page,
            file,
        } => commands::element::add_image(store, project, page, file, output),
        ElementCommands::Set {
            project,
            page,
            element,
            x,
            y,
            width,
            height,
            rotation,
            text,
            font,
            size,
            color,
            align,
        } => {
            let edit = ElementEdit {
                x,
                y,
                width,
                height,
                rotation,
                text,
                font,
                size,
                color,
                align,
            };
            commands::element::set(store, project, page, element, edit, output)
        }
        ElementCommands::Delete {
            project,
            page,
            element,
            yes,
        } => commands::element::delete(store, project, page, element, yes, output),
    }
}

fn handle_maintenance_command(
    command: MaintenanceCommands,
    store: &mut Store,
    output: &Output,
) -> Result<()> {
    match command {
        MaintenanceCommands::Migrate => commands::maintenance::migrate(store, output),
        MaintenanceCommands::Sweep => commands::maintenance::sweep(store, output),
        MaintenanceCommands::StashLegacy { file, reset } => {
            commands::maintenance::stash_legacy(store, file, reset, output)
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging to stderr
///
/// RUST_LOG wins when set; otherwise the configured level, otherwise warn.
fn init_logging(log_level: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
