mod keygen;
mod serve;

use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use serve::{MediaConfig, ServeConfig};

/// SIAD document archive server.
#[derive(Parser)]
#[command(name = "siad", version, about = "SIAD document archive server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the SIAD HTTP API server
    Serve {
        /// Port to listen on
        #[arg(long, env = "SIAD_PORT", default_value = "8080")]
        port: u16,
        /// Requests per minute allowed per client IP
        #[arg(long, env = "SIAD_RATE_LIMIT", default_value = "120")]
        rate_limit: u64,
        /// Session lifetime in seconds
        #[arg(long, env = "SIAD_SESSION_TTL_SECS", default_value = "28800")]
        session_ttl_secs: u64,
        /// Email of the administrator seeded on first start
        #[arg(long, env = "SIAD_ADMIN_EMAIL", default_value = "admin@siad.local")]
        admin_email: String,
        /// Password for the seeded administrator (generated when absent)
        #[arg(long, env = "SIAD_ADMIN_PASSWORD", hide_env_values = true)]
        admin_password: Option<String>,
        /// Secret key file written by `siad keygen`
        #[arg(long, env = "SIAD_SIGNING_KEY")]
        signing_key: Option<PathBuf>,
        /// Push image uploads to the image host
        #[arg(long, env = "SIAD_IMAGE_HOST_ENABLED")]
        image_host_enabled: bool,
        /// Image-host cloud name
        #[arg(long, env = "SIAD_IMAGE_HOST_CLOUD")]
        image_host_cloud: Option<String>,
        /// Unsigned upload preset
        #[arg(long, env = "SIAD_IMAGE_HOST_PRESET")]
        image_host_preset: Option<String>,
        /// Image-host folder
        #[arg(long, env = "SIAD_IMAGE_HOST_FOLDER", default_value = "siad")]
        image_host_folder: String,
        /// Maximum width applied to uploaded images
        #[arg(long, env = "SIAD_IMAGE_MAX_WIDTH", default_value = "1600")]
        image_max_width: u32,
        /// Path to TLS certificate PEM file (requires --tls-key)
        #[arg(long, env = "SIAD_TLS_CERT")]
        tls_cert: Option<PathBuf>,
        /// Path to TLS private key PEM file (requires --tls-cert)
        #[arg(long, env = "SIAD_TLS_KEY")]
        tls_key: Option<PathBuf>,
    },

    /// Generate the Ed25519 keypair used to sign documents
    Keygen {
        /// Output file prefix (writes <prefix>.secret and <prefix>.pub)
        #[arg(long, default_value = "siad")]
        output_prefix: String,
    },
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("SIAD_LOG_JSON", false) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Serve {
            port,
            rate_limit,
            session_ttl_secs,
            admin_email,
            admin_password,
            signing_key,
            image_host_enabled,
            image_host_cloud,
            image_host_preset,
            image_host_folder,
            image_max_width,
            tls_cert,
            tls_key,
        } => {
            // Validate TLS flags: both must be provided or neither
            if tls_cert.is_some() != tls_key.is_some() {
                eprintln!("error: --tls-cert and --tls-key must both be provided");
                process::exit(1);
            }
            if image_host_enabled && (image_host_cloud.is_none() || image_host_preset.is_none()) {
                tracing::warn!(
                    "image host enabled without cloud name and preset; images stay in storage"
                );
            }
            let config = ServeConfig {
                port,
                rate_limit,
                session_ttl: Duration::from_secs(session_ttl_secs),
                admin_email,
                admin_password,
                signing_key,
                media: MediaConfig {
                    enabled: image_host_enabled,
                    cloud_name: image_host_cloud,
                    upload_preset: image_host_preset,
                    folder: image_host_folder,
                    max_width: image_max_width,
                    ..MediaConfig::default()
                },
                tls_cert,
                tls_key,
            };
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("error: failed to create tokio runtime: {}", e);
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(serve::start_server(config)) {
                eprintln!("Server error: {}", e);
                process::exit(1);
            }
        }
        Commands::Keygen { output_prefix } => match keygen::cmd_keygen(&output_prefix) {
            Ok((secret_path, pub_path)) => {
                println!("Secret key: {}", secret_path.display());
                println!("Public key: {}", pub_path.display());
            }
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        },
    }
}
