use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use power_models::{
    AlertSubscription, DashboardStats, ErrorShape, ProjectPage, ProjectQuery, RescoreResponse,
    SubscribeRequest, SyncReport,
};
use reqwest::{Client, Response};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "power-cli")]
#[command(about = "Command line client for the Power Monitor API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, default_value = "http://localhost:8080")]
    pub server_url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a monitoring cycle now
    Sync,
    /// Show dashboard statistics
    Stats,
    /// List stored projects
    Projects {
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        project_type: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        min_capacity: Option<f64>,
        #[arg(long)]
        min_score: Option<i64>,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "50")]
        per_page: u32,
    },
    /// Download every project as JSON or CSV
    Export {
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Subscribe an e-mail address to new-project alerts
    Subscribe {
        email: String,
        #[arg(long)]
        min_capacity: Option<f64>,
        /// Repeat for several states
        #[arg(long = "state")]
        states: Vec<String>,
        #[arg(long = "project-type")]
        project_types: Vec<String>,
    },
    /// Recompute hunter scores of every stored project
    Rescore,
}

pub struct PowerClient {
    client: Client,
    base_url: String,
}

/// Turns a non-success response into an error carrying the server's message.
async fn check(response: Response, action: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await?;
    let message = serde_json::from_str::<ErrorShape>(&text)
        .map(|shape| shape.error)
        .unwrap_or(text);
    Err(anyhow!("{} failed ({}): {}", action, status, message))
}

impl PowerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn sync(&self) -> Result<SyncReport> {
        let response = self
            .client
            .post(format!("{}/api/sync", self.base_url))
            .send()
            .await?;
        Ok(check(response, "Sync").await?.json().await?)
    }

    pub async fn stats(&self) -> Result<DashboardStats> {
        let response = self
            .client
            .get(format!("{}/api/stats", self.base_url))
            .send()
            .await?;
        Ok(check(response, "Stats").await?.json().await?)
    }

    pub async fn projects(&self, query: &ProjectQuery) -> Result<ProjectPage> {
        let response = self
            .client
            .get(format!("{}/api/projects", self.base_url))
            .query(query)
            .send()
            .await?;
        Ok(check(response, "List projects").await?.json().await?)
    }

    pub async fn export(&self, format: ExportFormat) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(format!("{}/export/{}", self.base_url, format.as_str()))
            .send()
            .await?;
        Ok(check(response, "Export").await?.bytes().await?.to_vec())
    }

    pub async fn subscribe(&self, request: &SubscribeRequest) -> Result<AlertSubscription> {
        let response = self
            .client
            .post(format!("{}/api/alerts", self.base_url))
            .json(request)
            .send()
            .await?;
        Ok(check(response, "Subscribe").await?.json().await?)
    }

    pub async fn rescore(&self) -> Result<RescoreResponse> {
        let response = self
            .client
            .post(format!("{}/api/rescore", self.base_url))
            .send()
            .await?;
        Ok(check(response, "Rescore").await?.json().await?)
    }
}

fn print_report(report: &SyncReport) {
    println!(
        "Sync finished in {:.1}s: {} found, {} new, {} updated, {} duplicates, {} alerts sent",
        report.duration_seconds,
        report.total,
        report.new,
        report.updated,
        report.duplicates,
        report.alerts_sent
    );
    for source in &report.by_source {
        println!("  {:<14} {:>6}", source.source, source.projects);
    }
    for error in &report.errors {
        println!("  error: {error}");
    }
}

fn print_stats(stats: &DashboardStats) {
    println!("Projects:            {}", stats.total_projects);
    println!("New (30 days):       {}", stats.recent_projects);
    println!("High capacity:       {}", stats.high_capacity);
    println!("Data centers:        {}", stats.datacenter_projects);
    println!("Total capacity (MW): {:.0}", stats.total_capacity_mw);
    println!(
        "Hunter score:        {} high / {} medium / {} low",
        stats.score_bands.high, stats.score_bands.medium, stats.score_bands.low
    );
    println!("Top states:");
    for state in &stats.top_states {
        println!("  {:<4} {:>5} {:>10.0} MW", state.state, state.count, state.total_mw);
    }
}

fn print_page(page: &ProjectPage) {
    println!(
        "{:<22} {:<40} {:>9} {:<5} {:<10} {:>5}",
        "REQUEST ID", "NAME", "MW", "STATE", "TYPE", "SCORE"
    );
    for p in &page.projects {
        let name: String = p.project_name.chars().take(40).collect();
        println!(
            "{:<22} {:<40} {:>9.1} {:<5} {:<10} {:>5}",
            p.request_id,
            name,
            p.capacity_mw,
            p.state,
            p.project_type.as_str(),
            p.hunter_score
        );
    }
    println!(
        "page {}/{} ({} projects)",
        page.page,
        page.pages.max(1),
        page.total
    );
}

pub async fn run(cli: Cli) -> Result<()> {
    let client = PowerClient::new(cli.server_url);

    match cli.command {
        Commands::Sync => print_report(&client.sync().await?),
        Commands::Stats => print_stats(&client.stats().await?),
        Commands::Projects {
            state,
            project_type,
            source,
            search,
            min_capacity,
            min_score,
            page,
            per_page,
        } => {
            let query = ProjectQuery {
                min_capacity,
                state,
                project_type,
                source,
                search,
                min_score,
                page: Some(page),
                per_page: Some(per_page),
            };
            print_page(&client.projects(&query).await?);
        }
        Commands::Export { format, output } => {
            let body = client.export(format).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &body)?;
                    println!("Wrote {} bytes to {}", body.len(), path.display());
                }
                None => println!("{}", String::from_utf8_lossy(&body)),
            }
        }
        Commands::Subscribe {
            email,
            min_capacity,
            states,
            project_types,
        } => {
            let subscription = client
                .subscribe(&SubscribeRequest {
                    email,
                    min_capacity,
                    states,
                    project_types,
                })
                .await?;
            println!(
                "Subscribed {} (id {}, >= {} MW)",
                subscription.email, subscription.id, subscription.min_capacity
            );
        }
        Commands::Rescore => {
            let result = client.rescore().await?;
            println!("Rescored projects: {} updated", result.updated);
        }
    }

    Ok(())
}
