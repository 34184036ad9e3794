use clap::{Parser, Subcommand};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::task::JoinSet;

#[derive(Parser)]
#[command(name = "client-cli")]
#[command(about = "Exercise and inspect a running resilient-client", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch weather data once through the client
    Fetch,
    /// Show strategy and circuit breaker state
    Status,
    /// Fire concurrent requests and summarise the response codes
    Burst {
        #[arg(short, long, default_value_t = 20)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Fetch => {
            let res = client.get(format!("{}/", cli.url)).send().await?;
            let status = res.status();
            println!("{} {}", status.as_u16(), res.text().await?);
        }
        Commands::Status => {
            let res = client.get(format!("{}/status", cli.url)).send().await?;
            if !res.status().is_success() {
                eprintln!("Error: status endpoint returned {}", res.status());
                return Ok(());
            }
            let json: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Commands::Burst { count } => {
            let mut tasks = JoinSet::new();
            for _ in 0..count {
                let client = client.clone();
                let url = format!("{}/", cli.url);
                tasks.spawn(async move { client.get(url).send().await.map(|r| r.status().as_u16()) });
            }

            let mut summary: BTreeMap<String, usize> = BTreeMap::new();
            while let Some(joined) = tasks.join_next().await {
                let key = match joined {
                    Ok(Ok(status)) => status.to_string(),
                    Ok(Err(e)) => format!("error ({})", e),
                    Err(e) => format!("task failed ({})", e),
                };
                *summary.entry(key).or_default() += 1;
            }
            for (status, n) in summary {
                println!("{:>20}  {}", status, n);
            }
        }
    }

    Ok(())
}
