//! Weather radar product retriever.
//!
//! Retrieves products from the Civil Protection Department radar platform:
//! - `latest` or explicit instants, snapped to each product's cadence
//! - Fixed-delay retry of transient upstream failures
//! - Optional clip, reprojection and format conversion
//! - Delivery to a local directory, stdout bytes and/or S3
//! - Registration in a shared JSON-lines catalog
//!
//! One JSON outcome per product is printed on stdout; logs go to stderr.
//! With `--return-data` the payload takes stdout and the outcome moves to stderr.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use geo_transform::{TransformOptions, Transformer};
use radar_common::{BoundingBox, CrsCode, DataFormat, InstantSpec, RetryPolicy};
use storage::{CatalogLocation, ObjectStorageConfig, S3Uri};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use retriever::report::ProgressReporter;
use retriever::resolve::DEFAULT_PROBE_STEPS;
use retriever::source::DPC_BASE_URL;
use retriever::{
    DeliveryOptions, DpcApi, Pipeline, RetrievalRequest, RetrieverConfig, StatusReporter,
    StoreProvider, UpstreamSource,
};

#[derive(Parser, Debug)]
#[command(name = "retriever")]
#[command(about = "Retrieve weather radar products from the DPC radar platform")]
struct Args {
    /// Product code(s) to retrieve, e.g. SRI,VMI
    #[arg(short, long = "product", value_delimiter = ',', required_unless_present = "status")]
    products: Vec<String>,

    /// "latest" or an ISO 8601 timestamp (UTC when no offset is given)
    #[arg(short, long, default_value = "latest")]
    time: InstantSpec,

    /// Clip box: minx,miny,maxx,maxy
    #[arg(long, allow_hyphen_values = true)]
    bbox: Option<BoundingBox>,

    /// CRS of the clip box
    #[arg(long, default_value = "EPSG:4326")]
    bbox_crs: CrsCode,

    /// Target CRS, e.g. EPSG:32633
    #[arg(long)]
    t_srs: Option<CrsCode>,

    /// Output format: tif, nc, zip (shapefile) or geojson
    #[arg(long)]
    out_format: Option<DataFormat>,

    /// Write the payload bytes to stdout (single product only); the JSON
    /// outcome then goes to stderr
    #[arg(long)]
    return_data: bool,

    /// Local output directory
    #[arg(long, env = "RADAR_OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// Object-store destination: s3://bucket/prefix (a bare bucket name is accepted)
    #[arg(long, env = "RADAR_BUCKET")]
    bucket: Option<String>,

    /// Register delivered files in the catalog
    #[arg(long)]
    catalog: bool,

    /// Catalog location (local path or s3:// URI), defaults next to the output
    #[arg(long, env = "RADAR_CATALOG")]
    catalog_location: Option<String>,

    /// Retries after the first failed download or upload
    #[arg(long, default_value_t = 3)]
    max_retry: u32,

    /// Seconds between retries
    #[arg(long, default_value_t = 60)]
    retry_delay: u64,

    /// Cadence steps probed backward when resolving "latest"
    #[arg(long, default_value_t = DEFAULT_PROBE_STEPS)]
    probe_steps: u32,

    /// Seconds to wait for the catalog lock
    #[arg(long, default_value_t = 30)]
    lock_timeout: u64,

    /// Print product availability and exit
    #[arg(long)]
    status: bool,

    /// Include product details in the status report
    #[arg(short, long)]
    verbose: bool,

    /// Shorthand for --log-level debug
    #[arg(long)]
    debug: bool,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// JSON log lines
    #[arg(long)]
    log_json: bool,

    /// Progress backend receiving each outcome
    #[arg(long, env = "BACKEND_URL")]
    backend: Option<String>,

    /// Job id reported with every outcome (generated when absent)
    #[arg(long)]
    jid: Option<String>,

    /// YAML file overriding products and resampling
    #[arg(long, env = "PRODUCTS_CONFIG")]
    products_config: Option<PathBuf>,

    /// Upstream API base URL
    #[arg(long, env = "DPC_BASE_URL", default_value = DPC_BASE_URL)]
    base_url: String,

    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value_t = 120)]
    http_timeout: u64,
}

impl Args {
    /// Reject flag combinations clap cannot express.
    fn check(&self) -> Result<()> {
        if self.return_data && !self.status && self.products.len() > 1 {
            bail!(
                "--return-data writes raw bytes to stdout and accepts a single product, got {}",
                self.products.len()
            );
        }
        Ok(())
    }

    fn object_store(&self) -> Result<Option<S3Uri>> {
        let Some(bucket) = &self.bucket else {
            return Ok(None);
        };
        let uri = if bucket.starts_with("s3://") {
            bucket.clone()
        } else {
            format!("s3://{}", bucket)
        };
        Ok(Some(
            uri.parse::<S3Uri>()
                .with_context(|| format!("Invalid object-store destination {}", bucket))?,
        ))
    }

    fn request(&self, product: &str, job_id: &str) -> Result<RetrievalRequest> {
        let catalog: Option<CatalogLocation> = self
            .catalog_location
            .as_deref()
            .map(str::parse)
            .transpose()
            .context("Invalid catalog location")?;

        Ok(RetrievalRequest::new(product, self.time)
            .with_job_id(job_id)
            .with_options(TransformOptions {
                bbox: self.bbox,
                bbox_crs: self.bbox_crs,
                target_crs: self.t_srs,
                target_format: self.out_format,
            })
            .with_delivery(DeliveryOptions {
                return_data: self.return_data,
                out_dir: self.out_dir.clone(),
                object_store: self.object_store()?,
                register_catalog: self.catalog,
                catalog,
            })
            .with_retry(RetryPolicy::new(
                self.max_retry,
                Duration::from_secs(self.retry_delay),
            )))
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = if args.debug {
        Level::DEBUG
    } else {
        match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    args.check()?;
    init_tracing(&args)?;
    geo_transform::netcdf::silence_hdf5_errors();

    let config = RetrieverConfig::load(args.products_config.as_deref())?;
    let registry = Arc::new(config.registry);
    let source: Arc<dyn UpstreamSource> = Arc::new(
        DpcApi::new(&args.base_url, Duration::from_secs(args.http_timeout))
            .context("Failed to create upstream client")?,
    );

    if args.status {
        let reporter =
            StatusReporter::new(registry, source).with_probe_steps(args.probe_steps);
        let product = args.products.first().map(String::as_str);
        let status = reporter.status(product, args.verbose).await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let pipeline = Pipeline::new(
        registry,
        source,
        Transformer::new(config.resampling),
        StoreProvider::S3(ObjectStorageConfig::from_env()),
    )
    .with_probe_steps(args.probe_steps)
    .with_lock_timeout(Duration::from_secs(args.lock_timeout));

    let progress = args.backend.as_deref().map(ProgressReporter::new).transpose()?;
    let job_id = args.jid.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
    info!(job_id = %job_id, products = ?args.products, time = %args.time, "Starting retrieval");

    let mut failures = 0;
    for product in &args.products {
        let request = args.request(product, &job_id)?;
        let outcome = pipeline.run(&request).await;

        if let Some(progress) = &progress {
            progress.report(&outcome).await;
        }
        if !outcome.success {
            failures += 1;
        }

        let line = serde_json::to_string(&outcome)?;
        match (&outcome.data, args.return_data) {
            (Some(data), true) => {
                std::io::stdout().write_all(data)?;
                eprintln!("{}", line);
            }
            _ => println!("{}", line),
        }
    }

    if failures > 0 {
        warn!(failures, total = args.products.len(), "Some retrievals failed");
        std::process::exit(1);
    }
    Ok(())
}
