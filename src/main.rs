use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use coskit::{
    AclHeader, BucketAcl, BucketGetOptions, BucketPutOptions, Client, CosConfig,
    CreateBucketOutcome, DownloadMode, ObjectMeta,
};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "coskit")]
#[command(version, about = "Tencent Cloud COS bucket and object tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (defaults to coskit.toml, config.toml, data/coskit.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bucket name, overrides the config file
    #[arg(long, global = true, env = "COSKIT_BUCKET")]
    bucket: Option<String>,

    /// Log filter, e.g. coskit=debug
    #[arg(long, global = true, default_value = "coskit=info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List all buckets of the account
    Buckets,

    /// Create the bucket
    Mb {
        /// Make the bucket publicly readable
        #[arg(long)]
        public_read: bool,

        /// Create a multi-AZ bucket
        #[arg(long)]
        maz: bool,
    },

    /// List objects
    Ls {
        /// Key prefix
        #[arg(default_value = "")]
        prefix: String,

        /// Group keys by this separator
        #[arg(long)]
        delimiter: Option<String>,

        /// Start after this key
        #[arg(long)]
        marker: Option<String>,

        /// Maximum keys per page
        #[arg(long)]
        max_keys: Option<u32>,

        /// Follow pages until the listing is complete
        #[arg(long)]
        all: bool,
    },

    /// Upload a local file
    Put {
        local: PathBuf,
        key: String,
    },

    /// Download an object to a file, or to stdout without a path
    Get {
        key: String,
        local: Option<PathBuf>,
    },

    /// Delete one or more objects
    Rm {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Show object metadata
    Head {
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = CosConfig::load(cli.config.as_deref())?;
    if let Some(bucket) = cli.bucket.clone() {
        config.bucket = bucket;
    }
    if config.secret_id.is_empty() || config.secret_key.is_empty() {
        bail!("missing credentials: set secret_id/secret_key or COSKIT_SECRET_ID/COSKIT_SECRET_KEY");
    }

    let client = Client::new(&config).context("failed to build COS client")?;
    run(&client, cli.command).await
}

async fn run(client: &Client, command: Commands) -> Result<()> {
    match command {
        Commands::Buckets => {
            let result = client.list_buckets().await?;
            println!("{}", serde_json::to_string_pretty(&result.buckets)?);
        }
        Commands::Mb { public_read, maz } => {
            let mut acl = AclHeader::new();
            if public_read {
                acl.insert_bucket_x_cos_acl(BucketAcl::PublicRead);
            }
            let opt = BucketPutOptions {
                acl,
                az_config: maz.then(|| "MAZ".to_string()),
            };
            match client.put_bucket(&opt).await? {
                CreateBucketOutcome::Created(_) => println!("created {}", client.bucket_url()),
                CreateBucketOutcome::AlreadyExists { code, .. } => {
                    println!("exists {} ({})", client.bucket_url(), code)
                }
            }
        }
        Commands::Ls {
            prefix,
            delimiter,
            marker,
            max_keys,
            all,
        } => {
            let opt = BucketGetOptions {
                prefix: Some(prefix).filter(|p| !p.is_empty()),
                delimiter,
                marker,
                max_keys,
                ..BucketGetOptions::default()
            };
            let result = if all {
                client.list_all_objects(&opt).await?
            } else {
                client.list_objects(&opt).await?.0
            };
            for prefix in &result.common_prefixes {
                println!("{:>12}  {}", "PRE", prefix.prefix);
            }
            for object in &result.contents {
                if object.is_dir() {
                    println!("{:>12}  {}", "DIR", object.key);
                } else {
                    println!("{:>12}  {}", object.size, object.key);
                }
            }
            if let Some(next) = result.next_page_marker() {
                eprintln!("truncated, continue with --marker {}", next);
            }
        }
        Commands::Put { local, key } => {
            let resp = client.upload_local_file(&local, &key).await?;
            println!("uploaded {} {}", key, resp.etag().unwrap_or_default());
        }
        Commands::Get { key, local } => match local {
            Some(path) => {
                client.download_file(&key, &path, DownloadMode::File).await?;
                println!("downloaded {} to {}", key, path.display());
            }
            None => {
                let resp = client
                    .download_file(&key, &PathBuf::new(), DownloadMode::Response)
                    .await?;
                std::io::stdout().write_all(&resp.body)?;
            }
        },
        Commands::Rm { keys } => {
            if let [key] = keys.as_slice() {
                client.delete(key).await?;
                println!("deleted {}", key);
            } else {
                let result = client.multi_delete_all(&keys).await?;
                for err in &result.errors {
                    eprintln!("failed {}: {} {}", err.key, err.code, err.message);
                }
                println!(
                    "deleted {} of {}",
                    keys.len().saturating_sub(result.errors.len()),
                    keys.len()
                );
            }
        }
        Commands::Head { key } => {
            let resp = client.object_head(&key).await?;
            let meta = ObjectMeta::from_headers(&resp.headers);
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
    }
    Ok(())
}
