use std::path::PathBuf;

use clap::{Parser, Subcommand};
use polystore::Result;
use polystore::commands::{
    ingest_file, list_schemas, run_query, search_schemas, show_config, show_history, write_config,
};

#[derive(Parser)]
#[command(name = "polystore")]
#[command(about = "Ingest JSON batches into relational or document storage and query them by name")]
#[command(version)]
struct Cli {
    /// Data directory holding config.toml and the databases
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a JSON file containing an array of objects or a single object
    Ingest {
        /// Path to the JSON batch
        file: PathBuf,
        /// Free-text notes stored with the schema and used for search
        #[arg(long, default_value = "")]
        notes: String,
        /// Override the top table (relational) or namespace (document)
        #[arg(long)]
        name: Option<String>,
    },
    /// Query a registered schema by name
    Query {
        /// Schema name, table or namespace to query
        #[arg(long)]
        target: String,
        /// Equality filter as key=value; repeat for AND
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// Column to project; repeat to select several
        #[arg(long = "field")]
        fields: Vec<String>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Find registered schemas matching free text
    Search {
        text: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// List registered schemas
    Schemas,
    /// Show the registration history of a schema
    History { name: String },
    /// Write the configuration file, or show it
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.as_deref();

    match cli.command {
        Commands::Ingest { file, notes, name } => {
            ingest_file(data_dir, &file, &notes, name.as_deref()).await?;
        }
        Commands::Query {
            target,
            filters,
            fields,
            limit,
        } => {
            run_query(data_dir, &target, &filters, &fields, limit).await?;
        }
        Commands::Search { text, top_k } => {
            search_schemas(data_dir, &text, top_k).await?;
        }
        Commands::Schemas => {
            list_schemas(data_dir).await?;
        }
        Commands::History { name } => {
            show_history(data_dir, &name).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config(data_dir)?;
            } else {
                write_config(data_dir)?;
            }
        }
    }

    Ok(())
}
