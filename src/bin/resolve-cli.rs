use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "resolve-cli")]
#[command(about = "Client for a running image proxy", long_about = None)]
struct Cli {
    /// Base URL of the proxy.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check proxy liveness
    Health,
    /// Resolve a target URL to an image
    Fetch {
        /// Image or page URL to resolve
        target: String,
        /// Write the image here instead of printing a summary
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{base}/healthz")).send().await?;
            let json: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Commands::Fetch { target, out } => {
            let res = client
                .get(format!("{base}/api/image-proxy"))
                .query(&[("url", target.as_str())])
                .send()
                .await?;
            let status = res.status();

            if !status.is_success() {
                eprintln!("Error: proxy returned status {}", status);
                match res.json::<Value>().await {
                    Ok(json) => eprintln!("{}", serde_json::to_string_pretty(&json)?),
                    Err(e) => eprintln!("(unreadable error body: {e})"),
                }
                std::process::exit(1);
            }

            let content_type = res
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            let bytes = res.bytes().await?;

            match out {
                Some(path) => {
                    tokio::fs::write(&path, &bytes).await?;
                    println!("Wrote {} bytes ({}) to {}", bytes.len(), content_type, path.display());
                }
                None => println!("{} bytes, {}", bytes.len(), content_type),
            }
        }
    }

    Ok(())
}
