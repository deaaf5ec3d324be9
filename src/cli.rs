use crate::config::{Config, StoreConfig, load_config};
use crate::ir::{Person, PersonId, load_persons, parse_persons};
use crate::layout::compute_diagram;
use crate::layout_dump::{layout_dump_json, write_layout_dump};
use crate::render::{render_svg, write_output_png, write_output_svg};
use crate::store::{
    Actor, CacheKey, FileCache, FileSharedStore, HistoryQuery, LoadSource, OverrideStore, Role,
    StoreError,
};
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ftree", version, about = "Family tree layout and renderer")]
pub struct Args {
    /// Config file (JSON5: layout, themeVariables, store)
    #[arg(short = 'c', long = "configFile", global = true)]
    pub config: Option<PathBuf>,

    /// Directory of the shared positions copy
    #[arg(long = "store", global = true)]
    pub store: Option<PathBuf>,

    /// Directory of the local positions cache
    #[arg(long = "cache", global = true)]
    pub cache: Option<PathBuf>,

    /// Diagram variant (selects the local cache key)
    #[arg(long = "variant", global = true)]
    pub variant: Option<String>,

    /// Name recorded in the position history
    #[arg(long = "actor", global = true, default_value = "local")]
    pub actor: String,

    /// Role of the actor: admin, editor or viewer
    #[arg(long = "role", global = true, default_value = "editor")]
    pub role: Role,

    /// More logging (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lay out a person collection and write the diagram
    Render(RenderArgs),
    /// Pin one person at a position in the local session
    Move {
        #[arg(long)]
        id: String,
        #[arg(long, allow_hyphen_values = true)]
        x: f32,
        #[arg(long, allow_hyphen_values = true)]
        y: f32,
        /// Also save the session to the shared copy
        #[arg(long)]
        save: bool,
    },
    /// Drop the override of one person, or of everyone
    Reset {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        save: bool,
    },
    /// Send the local session to the shared copy
    Save,
    /// Replace the local session with the shared copy
    Reload,
    /// List position changes, most recent first (admin only)
    History {
        #[arg(long)]
        person: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(clap::Args, Debug)]
pub struct RenderArgs {
    /// Person collection (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Width
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// Height
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,

    /// Use the local session instead of the shared copy
    #[arg(long)]
    pub local: bool,

    /// Ignore stored positions
    #[arg(long = "noOverrides")]
    pub no_overrides: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    execute(args)
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub fn execute(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    apply_store_flags(&mut config.store, &args);
    let actor = Actor::new(args.actor.clone(), args.role);
    let mut store = open_store(&config.store);

    match args.command {
        Command::Render(render) => run_render(&render, &mut config, &mut store),
        Command::Move { id, x, y, save } => {
            let id = PersonId::new(id)?;
            store.open_session();
            store.drag_to(id.clone(), x, y).map_err(user_error)?;
            println!("moved {id} to ({x:.2}, {y:.2})");
            if save {
                save_session(&mut store, &actor)?;
            }
            Ok(())
        }
        Command::Reset { id, save } => {
            store.open_session();
            match id {
                Some(id) => {
                    let id = PersonId::new(id)?;
                    match store.remove(&id) {
                        Some(_) => println!("reset {id}"),
                        None => println!("{id} had no stored position"),
                    }
                }
                None => {
                    store.clear();
                    println!("reset all positions");
                }
            }
            if save {
                save_session(&mut store, &actor)?;
            }
            Ok(())
        }
        Command::Save => {
            store.open_session();
            save_session(&mut store, &actor)
        }
        Command::Reload => {
            store.reload().map_err(user_error)?;
            println!("loaded {} positions from the shared copy", store.positions().len());
            Ok(())
        }
        Command::History { person, limit } => {
            let query = HistoryQuery {
                person: person.map(PersonId::new).transpose()?,
                limit,
            };
            let entries = store.history(&actor, &query).map_err(user_error)?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
            Ok(())
        }
    }
}

fn apply_store_flags(store: &mut StoreConfig, args: &Args) {
    if let Some(dir) = &args.store {
        store.shared_dir = dir.clone();
        store.cache_dir = dir.join(".cache");
    }
    if let Some(dir) = &args.cache {
        store.cache_dir = dir.clone();
    }
    if let Some(variant) = &args.variant {
        store.variant = variant.clone();
    }
}

pub fn open_store(config: &StoreConfig) -> OverrideStore<FileCache, FileSharedStore> {
    OverrideStore::new(
        FileCache::new(config.cache_dir.clone()),
        FileSharedStore::new(config.shared_dir.clone()),
        CacheKey::for_variant(&config.variant),
    )
}

fn run_render(
    args: &RenderArgs,
    config: &mut Config,
    store: &mut OverrideStore<FileCache, FileSharedStore>,
) -> Result<()> {
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }
    let persons = read_persons(args.input.as_deref())?;

    let source = if args.no_overrides {
        LoadSource::Empty
    } else if args.local {
        store.resume()
    } else {
        store.peek()
    };
    tracing::info!(persons = persons.len(), overrides = store.positions().len(), ?source, "rendering");
    let overrides = if args.no_overrides {
        Default::default()
    } else {
        store.positions().clone()
    };

    let layout = compute_diagram(
        &persons,
        &overrides,
        &config.layout,
        (config.render.width, config.render.height),
    );
    match args.output_format {
        OutputFormat::Svg => {
            let svg = render_svg(&layout, &config.theme);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let svg = render_svg(&layout, &config.theme);
            write_output_png(&svg, &output, &config.render)?;
        }
        OutputFormat::Json => match args.output.as_deref() {
            Some(path) => write_layout_dump(path, &layout)?,
            None => println!("{}", layout_dump_json(&layout)?),
        },
    }
    Ok(())
}

fn save_session(store: &mut OverrideStore<FileCache, FileSharedStore>, actor: &Actor) -> Result<()> {
    let report = store.save(actor).map_err(user_error)?;
    println!(
        "saved {} positions ({} history entries)",
        report.saved,
        report.entries.len()
    );
    Ok(())
}

/// Logs the full error and surfaces the user-facing notice.
fn user_error(err: StoreError) -> anyhow::Error {
    tracing::error!(error = %err, "position store request failed");
    anyhow::anyhow!(err.notice().message)
}

fn read_persons(path: Option<&Path>) -> Result<Vec<Person>> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return Ok(load_persons(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(parse_persons(&buf)?)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!(
        "Output path required for {} output",
        ext
    ))
}
