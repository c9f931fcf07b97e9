use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use bentokit::build::{BuildConfig, BUILDFILE};
use bentokit::{config, logging, Bento, BentoStore, ModelStore, Tag};

#[derive(Parser)]
#[command(name = "bentokit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build, store and move portable service bundles")]
struct Cli {
    /// Data directory (defaults to $BENTOKIT_HOME or ~/.bentokit)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a bento from a bentofile and build context
    Build {
        /// Build context directory
        #[arg(default_value = ".")]
        context: PathBuf,
        /// Build spec file (defaults to bentofile.yaml inside the context)
        #[arg(short = 'f', long)]
        bentofile: Option<PathBuf>,
        /// Explicit version (a time-ordered one is generated when omitted)
        #[arg(long)]
        version: Option<String>,
    },
    /// List stored bentos, newest first
    List {
        /// Only show versions of this name
        name: Option<String>,
        #[arg(short, long, value_parser = ["table", "json"], default_value = "table")]
        output: String,
    },
    /// Print a stored bento's manifest
    Get { tag: String },
    /// Delete a stored bento
    Delete { tag: String },
    /// Export a stored bento to an archive or directory
    Export {
        tag: String,
        /// Bare path, osfs://, zip:// or temp:// destination
        destination: String,
        /// Output format: bento, gz, zip or folder
        #[arg(short = 'f', long)]
        format: Option<String>,
        /// Subdirectory inside a directory destination
        #[arg(long)]
        subpath: Option<String>,
    },
    /// Import a bento archive into the local store
    Import {
        /// Bare path, osfs://, zip:// or temp:// source
        source: String,
        /// Input format override: bento, gz, zip or folder
        #[arg(short = 'f', long)]
        format: Option<String>,
    },
    /// Model store operations
    Models {
        #[command(subcommand)]
        action: ModelCommands,
    },
}

#[derive(Subcommand)]
enum ModelCommands {
    /// List stored models, newest first
    List,
    /// Delete a stored model
    Delete { tag: String },
}

fn open_stores(home: Option<&PathBuf>) -> Result<(BentoStore, ModelStore)> {
    let (bentos_dir, models_dir) = match home {
        Some(home) => (home.join("bentos"), home.join("models")),
        None => (config::bento_store_dir()?, config::model_store_dir()?),
    };
    Ok((BentoStore::open(bentos_dir)?, ModelStore::open(models_dir)?))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(e) = logging::init_logging(cli.log_json) {
        eprintln!("warning: failed to initialize logging: {e}");
    }

    let (bentos, models) = open_stores(cli.home.as_ref())?;

    match cli.command {
        Commands::Build {
            context,
            bentofile,
            version,
        } => {
            let buildfile = bentofile.unwrap_or_else(|| context.join(BUILDFILE));
            let config = BuildConfig::from_file(&buildfile)?;
            let bento = Bento::create(&config, &context, version.as_deref(), &models)?;
            let bento = bento.save(&bentos, &models)?;
            println!("Successfully built bento {}", bento.tag());
        }
        Commands::List { name, output } => {
            let entries = bentos.list(name.as_deref())?;
            if output == "json" {
                let rows: Vec<serde_json::Value> = entries
                    .iter()
                    .map(|(tag, created)| {
                        serde_json::json!({
                            "tag": tag.to_string(),
                            "creation_time": created.to_rfc3339(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for (tag, created) in entries {
                    println!("{tag}\t{created}");
                }
            }
        }
        Commands::Get { tag } => {
            let tag = Tag::parse(&tag)?;
            let bento = bentos.get(&tag)?;
            print!("{}", bento.info().to_yaml()?);
        }
        Commands::Delete { tag } => {
            let tag = Tag::parse(&tag)?;
            let resolved = bentos.resolve(&tag)?;
            bentos.delete(&resolved)?;
            println!("Deleted bento {resolved}");
        }
        Commands::Export {
            tag,
            destination,
            format,
            subpath,
        } => {
            let tag = Tag::parse(&tag)?;
            let bento = bentos.get(&tag)?;
            let path = bento
                .export(&destination, format.as_deref(), subpath.as_deref())
                .with_context(|| format!("exporting {}", bento.tag()))?;
            println!("Exported {} to {}", bento.tag(), path.display());
        }
        Commands::Import { source, format } => {
            let bento = Bento::import_from(&source, format.as_deref())?;
            let bento = bento.save(&bentos, &models)?;
            println!("Imported bento {}", bento.tag());
        }
        Commands::Models { action } => match action {
            ModelCommands::List => {
                for (tag, created) in models.list()? {
                    println!("{tag}\t{created}");
                }
            }
            ModelCommands::Delete { tag } => {
                let tag = Tag::parse(&tag)?;
                let resolved = models.resolve(&tag)?;
                models.delete(&resolved)?;
                println!("Deleted model {resolved}");
            }
        },
    }

    Ok(())
}
