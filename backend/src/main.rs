//! Resolver CLI - match building references against the entrance registry
//!
//! # Main Commands
//!
//! ```bash
//! resolver serve --registry entrances.csv            # HTTP server (port 3000)
//! resolver resolve building-ids egids.csv -o out.csv  # Run one job in-process
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! resolver parse-csv input.csv          # Show detected format and rows
//! resolver parse-address "Bahnhofstr. 12a-c"
//! resolver detect-srid shapes.geojson
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use resolver::{
    address::{normalize, parse_street},
    api::start_server,
    config::Config,
    export,
    models::{JobMetadata, JobStatus, JobType},
    parser::{CsvReadOptions, CsvReader},
    pipeline::Pipeline,
    registry::InMemoryRegistry,
    spatial::{detect_srid, Srid},
};
use serde_json::json;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "resolver")]
#[command(about = "Resolve building references against a building-entrance registry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on (default: RESOLVER_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Registry CSV dump (default: RESOLVER_REGISTRY_PATH)
        #[arg(short, long)]
        registry: Option<PathBuf>,
    },

    /// Run one job through preparation, resolving and export
    Resolve {
        /// Job type: building-ids, municipalities-codes, geo-json, address-search
        job_type: JobType,

        /// Input file (CSV, or GeoJSON for geo-json jobs)
        input: PathBuf,

        /// Registry CSV dump (default: RESOLVER_REGISTRY_PATH)
        #[arg(short, long, env = "RESOLVER_REGISTRY_PATH")]
        registry: Option<PathBuf>,

        /// CSV delimiter (guessed if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// CSV enclosure (guessed if not specified)
        #[arg(short, long)]
        enclosure: Option<char>,

        /// Input charset (detected if not specified)
        #[arg(long)]
        charset: Option<String>,

        /// Restrict matches to one country code
        #[arg(long)]
        country: Option<String>,

        /// Reference system of GeoJSON input, e.g. 2056 or EPSG:4326
        #[arg(long)]
        srid: Option<Srid>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a CSV file and output its rows as JSON
    ParseCsv {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (guessed if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a free-text street and show its matching keys
    ParseAddress {
        /// Street with house number, e.g. "Bahnhofstr. 12a"
        street: String,
    },

    /// Detect the reference system of a GeoJSON file
    DetectSrid {
        /// Input GeoJSON file
        input: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port, registry } => cmd_serve(port, registry).await,

        Commands::Resolve {
            job_type,
            input,
            registry,
            delimiter,
            enclosure,
            charset,
            country,
            srid,
            format,
            output,
        } => {
            let metadata = JobMetadata {
                delimiter,
                enclosure,
                charset,
                country,
                srid,
                ..Default::default()
            };
            cmd_resolve(job_type, &input, registry.as_deref(), metadata, format, output.as_deref()).await
        }

        Commands::ParseCsv {
            input,
            delimiter,
            output,
        } => cmd_parse_csv(&input, delimiter, output.as_deref()),

        Commands::ParseAddress { street } => cmd_parse_address(&street),

        Commands::DetectSrid { input } => cmd_detect_srid(&input),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(port: Option<u16>, registry: Option<PathBuf>) -> CliResult<()> {
    let mut config = Config::from_env()?;
    if let Some(port) = port {
        config.port = port;
    }
    if registry.is_some() {
        config.registry_path = registry;
    }

    let registry = load_registry(config.registry_path.as_deref())?;
    start_server(config, Arc::new(registry)).await
}

async fn cmd_resolve(
    job_type: JobType,
    input: &Path,
    registry: Option<&Path>,
    metadata: JobMetadata,
    format: OutputFormat,
    output: Option<&Path>,
) -> CliResult<()> {
    eprintln!("📄 Resolving {}: {}", job_type, input.display());

    let registry = load_registry(registry)?;
    let pipeline = Pipeline::builder().registry(Arc::new(registry)).build();

    let data = fs::read(input)?;
    let job = pipeline.run_job(job_type, data, metadata).await?;
    if job.status != JobStatus::Completed {
        let details = job
            .failure
            .map(|f| f.details)
            .unwrap_or_else(|| format!("job stopped in status {}", job.status));
        return Err(details.into());
    }

    let results = pipeline.results(job.id).await?;
    let matched = results.iter().filter(|r| r.entrance.is_some()).count();
    eprintln!("   Results: {} ({} matched)", results.len(), matched);

    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    match format {
        OutputFormat::Csv => {
            export::write_csv(&job, &results, &mut writer)?;
        }
        OutputFormat::Json => export::write_json(job.job_type, &results, &mut writer)?,
    }
    writer.flush()?;

    if let Some(path) = output {
        eprintln!("💾 Output written to: {}", path.display());
    }
    Ok(())
}

fn cmd_parse_csv(input: &Path, delimiter: Option<char>, output: Option<&Path>) -> CliResult<()> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let bytes = fs::read(input)?;
    let options = CsvReadOptions {
        delimiter,
        ..Default::default()
    };
    let reader = CsvReader::new(&bytes, options)?;

    eprintln!("   Charset: {}", reader.charset());
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(reader.delimiter()),
        if delimiter.is_none() { " (guessed)" } else { "" }
    );
    eprintln!("   Enclosure: '{}'", reader.enclosure());
    eprintln!("   Columns: {}", reader.header().join(", "));

    let rows = reader.read_all()?;
    eprintln!("✅ Parsed {} rows", rows.len());

    let values: Vec<_> = rows.iter().map(|row| &row.values).collect();
    let json = serde_json::to_string_pretty(&values)?;
    write_output(&json, output)
}

fn cmd_parse_address(street: &str) -> CliResult<()> {
    let parsed = parse_street(street);
    let name = parsed.name().unwrap_or_default();
    let report = json!({
        "street": parsed,
        "folded": normalize::fold(name),
        "normalized": normalize::normalize(name),
        "expanded": normalize::expand_abbreviations(&normalize::normalize(name)),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_detect_srid(input: &Path) -> CliResult<()> {
    let text = fs::read_to_string(input)?;
    let detection = detect_srid(text.trim_start_matches('\u{feff}'))?;
    match detection.srid() {
        Some(srid) => println!("{} ({:?})", srid.crs_name(), detection),
        None => return Err("Could not detect the SRID of the GeoJSON".into()),
    }
    Ok(())
}

fn load_registry(path: Option<&Path>) -> CliResult<InMemoryRegistry> {
    match path {
        Some(path) => Ok(InMemoryRegistry::from_path(path)?),
        None => {
            tracing::warn!("No registry configured, every task will be unmatched");
            Ok(InMemoryRegistry::new(Vec::new()))
        }
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult<()> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
