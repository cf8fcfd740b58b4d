//! Devwatch CLI
//!
//! Command-line interface to a running devwatch daemon:
//! - Inspect panels, tokens and status
//! - Manage followed devs
//! - Change filters and chart provider
//! - Import/Export devs and settings

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devwatch-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Control a running devwatch daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8090", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show feed state, SOL price and counts
    Status,

    /// Show one panel (new-launches, active-tokens, graduated)
    Panel { panel: String },

    /// List every tracked token
    Tokens,

    /// Stop tracking a token
    RemoveToken { mint: String },

    /// Stop tracking every token
    ClearTokens,

    /// Re-place every token on the panels now
    Refresh,

    /// List devs
    Devs,

    /// Follow a new dev
    AddDev {
        name: String,
        address: String,
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Remove a dev by id
    RemoveDev { id: String },

    /// Remove a dev and print its fields for re-entry
    EditDev { id: String },

    /// Toggle following for a dev
    Follow { id: String },

    /// Re-send feed subscriptions (one dev, or all followed devs)
    Sync { id: Option<String> },

    /// Write the dev list as JSON
    ExportDevs {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge devs from a JSON array file
    ImportDevs { path: PathBuf },

    /// Remove every dev
    ClearDevs,

    /// Set or reset a panel filter (ages in minutes, market caps in USD)
    Filter {
        panel: String,
        #[arg(long)]
        min_age: Option<f64>,
        #[arg(long)]
        max_age: Option<f64>,
        #[arg(long)]
        min_mc: Option<f64>,
        #[arg(long)]
        max_mc: Option<f64>,
        /// Restore the panel's defaults
        #[arg(long)]
        reset: bool,
    },

    /// Set the chart provider (axiom, photon), or toggle when omitted
    Chart { provider: Option<String> },

    /// Write the full settings bundle
    ExportSettings {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply a settings bundle file
    ImportSettings { path: PathBuf },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

struct ApiClient {
    client: reqwest::Client,
    base: String,
}

impl ApiClient {
    fn new(base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}/api/v1{}", self.base, path))
    }

    /// Send and decode, turning error bodies into a readable failure
    async fn send(&self, request: RequestBuilder) -> anyhow::Result<Value> {
        let response = request.send().await.with_context(|| {
            format!(
                "Cannot connect to devwatch at {} (is `devwatch` running?)",
                self.base
            )
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(text);
            bail!("Request failed ({}): {}", status, message);
        }
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).context("Invalid response body")
    }

    async fn get(&self, path: &str) -> anyhow::Result<Value> {
        self.send(self.request(Method::GET, path)).await
    }

    async fn post(&self, path: &str) -> anyhow::Result<Value> {
        self.send(self.request(Method::POST, path)).await
    }

    async fn delete(&self, path: &str) -> anyhow::Result<Value> {
        self.send(self.request(Method::DELETE, path)).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let api = ApiClient::new(&cli.api_url);
    let as_json = cli.format == "json";

    match cli.command {
        Commands::Status => {
            let status = api.get("/status").await?;
            if as_json {
                return print_json(&status);
            }
            println!("Devwatch v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Feed:           {}", str_field(&status, "feed"));
            println!("SOL price:      ${:.2}", status["solPriceUsd"].as_f64().unwrap_or(0.0));
            println!("Chart provider: {}", str_field(&status, "chartProvider"));
            println!();
            println!(
                "Devs:           {} ({} followed)",
                status["devs"].as_u64().unwrap_or(0),
                status["followedDevs"].as_u64().unwrap_or(0)
            );
            println!("Tokens:         {}", status["tokens"].as_u64().unwrap_or(0));
            println!("  New launches: {}", status["newLaunches"].as_u64().unwrap_or(0));
            println!("  Active:       {}", status["activeTokens"].as_u64().unwrap_or(0));
            println!("  Graduated:    {}", status["graduated"].as_u64().unwrap_or(0));
        }

        Commands::Panel { panel } => {
            let data = api.get(&format!("/panels/{}", panel)).await?;
            if as_json {
                return print_json(&data);
            }
            let empty = Vec::new();
            let cards = data["tokens"].as_array().unwrap_or(&empty);
            println!("{} ({} tokens)", str_field(&data, "panel"), cards.len());
            print_token_table(cards);
        }

        Commands::Tokens => {
            let data = api.get("/tokens").await?;
            if as_json {
                return print_json(&data);
            }
            let empty = Vec::new();
            print_token_table(data["tokens"].as_array().unwrap_or(&empty));
        }

        Commands::RemoveToken { mint } => {
            let card = api.delete(&format!("/tokens/{}", mint)).await?;
            println!("Removed {} ({})", str_field(&card, "symbol"), mint);
        }

        Commands::ClearTokens => {
            let data = api.delete("/tokens").await?;
            println!("Removed {} tokens", data["count"].as_u64().unwrap_or(0));
        }

        Commands::Refresh => {
            let data = api.post("/refresh").await?;
            println!("Panels reconciled ({} changes)", data["count"].as_u64().unwrap_or(0));
        }

        Commands::Devs => {
            let data = api.get("/devs").await?;
            if as_json {
                return print_json(&data);
            }
            let empty = Vec::new();
            let devs = data["devs"].as_array().unwrap_or(&empty);
            if devs.is_empty() {
                println!("No devs followed yet.");
                println!();
                println!("Add one with:");
                println!("  devwatch-cli add-dev <name> <address>");
                return Ok(());
            }

            println!(
                "{:<38} {:<16} {:<46} {:<9} {:<8} {:>8} {:>12}",
                "ID", "Name", "Address", "Follow", "Sync", "Launches", "Volume"
            );
            println!("{}", "-".repeat(143));
            for dev in devs {
                println!(
                    "{:<38} {:<16} {:<46} {:<9} {:<8} {:>8} {:>12}",
                    str_field(dev, "id"),
                    str_field(dev, "name"),
                    str_field(dev, "address"),
                    if dev["following"].as_bool().unwrap_or(false) { "yes" } else { "no" },
                    str_field(dev, "syncState"),
                    dev["launches"].as_u64().unwrap_or(0),
                    format!("${:.0}", dev["totalVolume"].as_f64().unwrap_or(0.0)),
                );
            }
        }

        Commands::AddDev { name, address, notes } => {
            let body = json!({
                "name": name,
                "address": address,
                "notes": notes.unwrap_or_default(),
            });
            let data = api.send(api.request(Method::POST, "/devs").json(&body)).await?;
            println!(
                "Now following {} ({}) [id {}]",
                str_field(&data["dev"], "name"),
                str_field(&data["dev"], "address"),
                str_field(&data["dev"], "id")
            );
        }

        Commands::RemoveDev { id } => {
            let data = api.delete(&format!("/devs/{}", id)).await?;
            println!("Removed {}", str_field(&data["dev"], "name"));
        }

        Commands::EditDev { id } => {
            let data = api.post(&format!("/devs/{}/edit", id)).await?;
            let draft = &data["draft"];
            if as_json {
                return print_json(draft);
            }
            println!("Removed {} for editing. Re-add with:", str_field(draft, "name"));
            println!(
                "  devwatch-cli add-dev {:?} {:?} --notes {:?}",
                str_field(draft, "name"),
                str_field(draft, "address"),
                str_field(draft, "notes")
            );
        }

        Commands::Follow { id } => {
            let data = api.post(&format!("/devs/{}/follow", id)).await?;
            let dev = &data["dev"];
            let verb = if dev["following"].as_bool().unwrap_or(false) {
                "Following"
            } else {
                "Stopped following"
            };
            println!("{} {}", verb, str_field(dev, "name"));
        }

        Commands::Sync { id } => match id {
            Some(id) => {
                let data = api.post(&format!("/devs/{}/sync", id)).await?;
                println!("Sync state: {}", str_field(&data, "syncState"));
            }
            None => {
                let data = api.post("/devs/sync").await?;
                println!("Re-synced {} followed devs", data["count"].as_u64().unwrap_or(0));
            }
        },

        Commands::ExportDevs { output } => {
            let devs = api.get("/devs/export").await?;
            write_output(&devs, output)?;
        }

        Commands::ImportDevs { path } => {
            let body = read_file(&path)?;
            let data = api
                .send(api.request(Method::POST, "/devs/import").body(body))
                .await?;
            println!(
                "Imported {} devs ({} skipped)",
                data["added"].as_u64().unwrap_or(0),
                data["skipped"].as_u64().unwrap_or(0)
            );
        }

        Commands::ClearDevs => {
            let data = api.delete("/devs").await?;
            println!("Removed {} devs", data["count"].as_u64().unwrap_or(0));
        }

        Commands::Filter {
            panel,
            min_age,
            max_age,
            min_mc,
            max_mc,
            reset,
        } => {
            let path = format!("/filters/{}", panel);
            let data = if reset {
                api.delete(&path).await?
            } else {
                let body = json!({
                    "minAge": min_age,
                    "maxAge": max_age,
                    "minMarketCap": min_mc,
                    "maxMarketCap": max_mc,
                });
                api.send(api.request(Method::PUT, &path).json(&body)).await?
            };
            println!("{} filter:", str_field(&data, "panel"));
            let filter = &data["filter"];
            println!("  age:        {} - {} min", bound(&filter["minAge"]), bound(&filter["maxAge"]));
            println!(
                "  market cap: {} - {} USD",
                bound(&filter["minMarketCap"]),
                bound(&filter["maxMarketCap"])
            );
        }

        Commands::Chart { provider } => {
            let data = match provider {
                Some(provider) => {
                    api.send(
                        api.request(Method::PUT, "/chart-provider")
                            .json(&json!({ "provider": provider })),
                    )
                    .await?
                }
                None => api.post("/chart-provider/toggle").await?,
            };
            println!("Chart provider: {}", str_field(&data, "label"));
        }

        Commands::ExportSettings { output } => {
            let bundle = api.get("/settings/export").await?;
            write_output(&bundle, output)?;
        }

        Commands::ImportSettings { path } => {
            let body = read_file(&path)?;
            let summary = api
                .send(api.request(Method::POST, "/settings/import").body(body))
                .await?;
            if as_json {
                return print_json(&summary);
            }
            println!("Settings imported:");
            println!(
                "  Devs added:     {} ({} skipped)",
                summary["devsAdded"].as_u64().unwrap_or(0),
                summary["devsSkipped"].as_u64().unwrap_or(0)
            );
            println!("  Filters:        {}", summary["filtersReplaced"].as_u64().unwrap_or(0));
            match summary["tokensReplaced"].as_u64() {
                Some(n) => println!("  Tokens:         {} (replaced)", n),
                None => println!("  Tokens:         unchanged"),
            }
        }

        Commands::Config { output } => {
            let config = devwatch::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value[key].as_str().unwrap_or("-")
}

fn bound(value: &Value) -> String {
    value
        .as_f64()
        .map(|v| format!("{}", v))
        .unwrap_or_else(|| "any".to_string())
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_file(path: &PathBuf) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Cannot read {:?}", path))
}

fn write_output(value: &Value, output: Option<PathBuf>) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(&path, text)?;
            println!("Exported to {:?}", path);
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn print_token_table(tokens: &[Value]) {
    if tokens.is_empty() {
        println!("No tokens");
        return;
    }

    println!(
        "{:<10} {:<20} {:<14} {:>7} {:>12} {:>12} {:>9} {:>6}",
        "Symbol", "Name", "Dev", "Age", "Market cap", "Volume", "Bonding", "Trades"
    );
    println!("{}", "-".repeat(98));

    let now = chrono::Utc::now().timestamp_millis();
    for token in tokens {
        let launched = token["launchTime"].as_i64().unwrap_or(now);
        let age_secs = ((now - launched).max(0)) / 1000;
        let trades = token["buyCount"].as_u64().unwrap_or(0) + token["sellCount"].as_u64().unwrap_or(0);
        let graduated = if token["graduated"].as_bool().unwrap_or(false) { "*" } else { "" };

        println!(
            "{:<10} {:<20} {:<14} {:>7} {:>12} {:>12} {:>8.1}% {:>6}",
            format!("{}{}", str_field(token, "symbol"), graduated),
            truncate(str_field(token, "name"), 20),
            truncate(str_field(token, "devName"), 14),
            format!("{}:{:02}", age_secs / 60, age_secs % 60),
            format!("${:.0}", token["marketCap"].as_f64().unwrap_or(0.0)),
            format!("${:.0}", token["volume24h"].as_f64().unwrap_or(0.0)),
            token["bondingProgress"].as_f64().unwrap_or(0.0),
            trades,
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
