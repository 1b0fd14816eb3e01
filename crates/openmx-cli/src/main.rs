//! OpenMX command-line browser
//!
//! Boots a simulated VM, builds its management platform and lets you list,
//! describe, read, write and invoke beans, or watch notifications while a
//! synthetic workload runs.

mod commands;
mod output;
mod render;

use clap::{Parser, Subcommand};
use openmx_runtime::{Runtime, RuntimeConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "openmx")]
#[command(about = "Browse management beans of a simulated VM", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (openmx.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Colored output: auto, always or never
    #[arg(long, global = true)]
    color: Option<String>,

    /// More diagnostics (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered beans
    List {
        /// Only beans of this kind (memory, threading, gc, memory-pool, ...)
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Describe a bean's attributes, operations and notifications
    Info {
        /// Object name or bean kind
        name: String,
    },

    /// Read attributes
    Get {
        /// Object name or bean kind
        name: String,
        /// Attributes to read (all readable ones if omitted)
        attributes: Vec<String>,
    },

    /// Write an attribute
    Set {
        /// Object name or bean kind
        name: String,
        /// Attribute name
        attribute: String,
        /// New value; `null` for none, arrays comma-separated
        value: String,
    },

    /// Invoke an operation
    Invoke {
        /// Object name or bean kind
        name: String,
        /// Operation name
        operation: String,
        /// Arguments; the overload is picked by count and parseability
        args: Vec<String>,
    },

    /// Run an allocation workload and print notifications as they arrive
    Watch {
        /// Workload steps
        #[arg(short, long, default_value_t = 200)]
        steps: u32,
        /// Usage threshold of the old generation, percent of its max
        #[arg(short, long, default_value_t = 60)]
        threshold: u8,
        /// Workload seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    // A second init (tests) keeps the first subscriber
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn boot(config: Option<&PathBuf>) -> anyhow::Result<Runtime> {
    let runtime = match config {
        Some(path) => Runtime::from_config(path)?,
        None => {
            let mut config = RuntimeConfig::default();
            config.apply_env(std::env::var(openmx_runtime::VERBOSE_ENV).ok().as_deref());
            Runtime::new(config)?
        }
    };
    Ok(runtime)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = boot(cli.config.as_ref())?;
    let mut out = output::StyledOutput::new(output::resolve_color_choice(cli.color.as_deref()), cli.json);

    let result = match cli.command {
        Commands::List { kind } => commands::list::execute(&runtime, kind.as_deref(), &mut out),
        Commands::Info { name } => commands::info::execute(&runtime, &name, &mut out),
        Commands::Get { name, attributes } => {
            commands::attributes::get(&runtime, &name, &attributes, &mut out)
        }
        Commands::Set {
            name,
            attribute,
            value,
        } => commands::attributes::set(&runtime, &name, &attribute, &value, &mut out),
        Commands::Invoke {
            name,
            operation,
            args,
        } => commands::invoke::execute(&runtime, &name, &operation, &args, &mut out),
        Commands::Watch {
            steps,
            threshold,
            seed,
        } => {
            let options = commands::watch::WatchOptions {
                steps,
                threshold,
                seed,
            };
            commands::watch::execute(&runtime, options, &mut out)
        }
    };

    runtime.shutdown();
    out.flush();
    result
}
