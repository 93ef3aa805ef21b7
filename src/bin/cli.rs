//! Component Graphs CLI - manage dashboard graph catalogs from the shell.

use anyhow::Context;
use clap::{Parser, Subcommand};
use component_graphs::{ComponentId, GraphDefinition, GraphId};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "component-graphs")]
#[command(about = "Ordered monitoring graph catalogs per component", long_about = None)]
struct Cli {
    /// Path to the config file (default: ./graphs.toml)
    #[arg(short, long, default_value = "graphs.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new graph store
    Init,

    /// List a component's graphs in display order
    List {
        /// Component ID
        component: String,
    },

    /// Append a graph to a component
    Create {
        /// Component ID
        component: String,

        /// Graph title
        title: String,

        /// Raw query (rewritten before it is stored)
        query: String,
    },

    /// Seed a component from a named template
    Import {
        /// Component ID
        component: String,

        /// Template name (see `templates`)
        template: String,
    },

    /// Append graphs from a JSON file of [{"title", "promql"}] objects
    ImportFile {
        /// Component ID
        component: String,

        /// Path to the JSON file
        file: PathBuf,
    },

    /// Replace a graph's title and query, optionally moving it
    Update {
        /// Component ID
        component: String,

        /// Graph ID
        graph_id: String,

        /// New title
        title: String,

        /// New raw query
        query: String,

        /// New position (0-based); keeps the current one if omitted
        #[arg(short, long)]
        sequence: Option<u32>,
    },

    /// Delete one graph
    Delete {
        /// Component ID
        component: String,

        /// Graph ID
        graph_id: String,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Delete every graph of a component
    Purge {
        /// Component ID
        component: String,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// List available templates
    Templates,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config;
    let open = || {
        component_graphs::open(&config)
            .with_context(|| format!("opening store from {}", config.display()))
    };

    match cli.command {
        Commands::Init => {
            let service = component_graphs::init(&config)?;
            println!("✓ Initialized graph store at {:?}", service.store().root());
        }

        Commands::List { component } => {
            let component = ComponentId::new(component)?;
            let service = open()?;
            print_json(&service.list(&component)?)?;
        }

        Commands::Create {
            component,
            title,
            query,
        } => {
            let component = ComponentId::new(component)?;
            let service = open()?;
            print_json(&service.create(&component, &title, &query)?)?;
        }

        Commands::Import {
            component,
            template,
        } => {
            let component = ComponentId::new(component)?;
            let service = open()?;
            print_json(&service.import_template(&component, &template)?)?;
        }

        Commands::ImportFile { component, file } => {
            let component = ComponentId::new(component)?;
            let service = open()?;
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let definitions: Vec<GraphDefinition> = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", file.display()))?;
            print_json(&service.bulk_import(&component, &definitions)?)?;
        }

        Commands::Update {
            component,
            graph_id,
            title,
            query,
            sequence,
        } => {
            let component = ComponentId::new(component)?;
            let service = open()?;
            let graph_id = GraphId::from(graph_id);
            print_json(&service.update(&component, &graph_id, &title, &query, sequence)?)?;
        }

        Commands::Delete {
            component,
            graph_id,
            force,
        } => {
            if !force {
                println!(
                    "Are you sure you want to delete graph '{}'? Use --force to confirm.",
                    graph_id
                );
                return Ok(());
            }

            let component = ComponentId::new(component)?;
            let service = open()?;
            let removed = service.delete(&component, &GraphId::from(graph_id))?;
            println!("✓ Deleted graph: {} ({})", removed.graph_id, removed.title);
        }

        Commands::Purge { component, force } => {
            if !force {
                println!(
                    "Are you sure you want to delete every graph of '{}'? Use --force to confirm.",
                    component
                );
                return Ok(());
            }

            let component = ComponentId::new(component)?;
            let service = open()?;
            let removed = service.delete_by_component(&component)?;
            println!("✓ Deleted {} graphs from {}", removed, component);
        }

        Commands::Templates => {
            let names = open()?.list_templates();
            if names.is_empty() {
                println!("No templates found.");
            } else {
                println!("Templates ({}):", names.len());
                for name in names {
                    println!("  - {}", name);
                }
            }
        }
    }

    Ok(())
}
