use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use snaptrip::{
    CachedEmbedder, Catalog, CatalogFile, CatalogSeeder, Coordinate, EmbeddingCache,
    HttpEmbedder, ImageEmbedder, RecommendationOutcome, RecommendationPipeline, SeedManifest,
    SnapTripConfig, web,
};

/// Photo-driven place recommendations with a ready-to-walk route
#[derive(Parser)]
#[command(name = "snaptrip", version, about)]
struct Cli {
    /// Configuration file (defaults to <config dir>/snaptrip/config.toml)
    #[arg(long, global = true, env = "SNAPTRIP_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level regardless of the configured level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Port to listen on (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Recommend a route for local photos and print it
    Recommend {
        /// Photo to match, repeat for several photos
        #[arg(long = "image", required = true)]
        images: Vec<PathBuf>,
        /// Starting latitude (defaults to origin.latitude)
        #[arg(long, requires = "lng", allow_negative_numbers = true)]
        lat: Option<f64>,
        /// Starting longitude (defaults to origin.longitude)
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lng: Option<f64>,
    },
    /// Embed the photos of a place manifest into the catalog
    Seed {
        /// JSON manifest of places and their photos
        #[arg(long)]
        input: PathBuf,
        /// Directory holding the photos named in the manifest
        #[arg(long)]
        images: PathBuf,
        /// Catalog to create or extend (defaults to catalog.path)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(config: &SnapTripConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_embedder(config: &SnapTripConfig) -> Result<Arc<dyn ImageEmbedder>> {
    let http = HttpEmbedder::new(&config.embedding)?;
    if !config.cache.enabled {
        return Ok(Arc::new(http));
    }

    let location = config.cache.resolved_location();
    let ttl = Duration::from_secs(u64::from(config.cache.ttl_hours) * 3600);
    match EmbeddingCache::open(&location, ttl) {
        Ok(cache) => Ok(Arc::new(CachedEmbedder::new(
            http,
            cache,
            config.embedding.dimension,
        ))),
        Err(e) => {
            warn!(
                "Embedding cache unavailable at {}: {}",
                location.display(),
                e
            );
            Ok(Arc::new(http))
        }
    }
}

fn build_pipeline(config: &SnapTripConfig) -> Result<RecommendationPipeline> {
    let catalog = Catalog::load(&config.catalog.path, config.embedding.dimension)?;

    Ok(RecommendationPipeline::new(
        &config.recommend,
        config.origin.coordinate(),
        build_embedder(config)?,
        Arc::new(catalog.index),
    )
    .with_moods(catalog.moods))
}

async fn seed(
    config: &SnapTripConfig,
    input: &Path,
    images: &Path,
    output: Option<PathBuf>,
) -> Result<()> {
    if !images.is_dir() {
        bail!("Image directory not found: {}", images.display());
    }
    let output = output.unwrap_or_else(|| PathBuf::from(&config.catalog.path));
    let manifest = SeedManifest::read(input)?;
    let mut catalog = CatalogFile::read_or_default(&output)?;

    let seeder = CatalogSeeder::new(build_embedder(config)?, images, config.embedding.dimension);
    let report = seeder.seed(&manifest, &mut catalog).await;

    if report.added > 0 {
        catalog.write(&output)?;
    }
    info!(
        "Seeded {}: {} added, {} already known, {} missing, {} failed",
        output.display(),
        report.added,
        report.known,
        report.missing,
        report.failed
    );
    println!(
        "{} photos added to {} ({} places in total)",
        report.added,
        output.display(),
        catalog.places.len()
    );
    Ok(())
}

fn print_outcome(outcome: &RecommendationOutcome) {
    match outcome {
        RecommendationOutcome::Success { data } => {
            println!("Your route ({} stops):", data.len());
            for (index, stop) in data.iter().enumerate() {
                println!(
                    "{:>2}. {} - {} min by {} (similarity distance {:.3})",
                    index + 1,
                    stop.candidate.name,
                    stop.duration,
                    stop.transport,
                    stop.candidate.score
                );
                if let Some(description) = &stop.candidate.description {
                    println!("    {description}");
                }
                if let Some(mood) = &stop.candidate.mood {
                    println!("    mood: {mood}");
                }
            }
        }
        RecommendationOutcome::Fail { message } => println!("{message}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SnapTripConfig::load_from_path(cli.config.clone())
        .with_context(|| "Failed to load configuration")?;
    init_logging(&config, cli.verbose);

    match cli.command {
        Command::Seed {
            input,
            images,
            output,
        } => seed(&config, &input, &images, output).await,
        Command::Serve { port } => {
            let pipeline = build_pipeline(&config)?;
            let mut server = config.server.clone();
            if let Some(port) = port {
                server.port = port;
            }
            web::run(&server, Arc::new(pipeline)).await
        }
        Command::Recommend { images, lat, lng } => {
            let pipeline = build_pipeline(&config)?;
            let origin = match (lat, lng) {
                (Some(lat), Some(lng)) => {
                    let origin = Coordinate::new(lat, lng);
                    if !origin.is_valid() {
                        bail!("Invalid origin: {}", origin.format_coordinates());
                    }
                    Some(origin)
                }
                _ => None,
            };

            let mut photos = Vec::with_capacity(images.len());
            for path in &images {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("Failed to read image: {}", path.display()))?;
                photos.push(bytes);
            }

            info!("Matching {} photos", photos.len());
            let outcome = pipeline
                .recommend(&photos, origin)
                .await
                .unwrap_or_else(RecommendationOutcome::from);
            print_outcome(&outcome);
            Ok(())
        }
    }
}
