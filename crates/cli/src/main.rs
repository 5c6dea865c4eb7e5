//! jobq - command-line client for the JobQueue daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9627";

#[derive(Parser)]
#[command(name = "jobq")]
#[command(about = "JobQueue CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "JOBQUEUE_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a new job
    Enqueue {
        /// Owning tenant
        #[arg(short, long)]
        tenant: String,

        /// Job type (e.g., email_sending, report_generation)
        #[arg(short, long)]
        job_type: String,

        /// Priority class
        #[arg(short, long, value_enum, default_value = "medium")]
        priority: Priority,

        /// Attempt budget (daemon default: 3)
        #[arg(short, long)]
        max_attempts: Option<i32>,

        /// Payload as JSON string
        #[arg(long, default_value = "{}")]
        payload: String,
    },

    /// Show one job
    Get {
        /// Job ID
        job_id: String,
    },

    /// List jobs of a tenant, newest first
    List {
        /// Tenant ID
        tenant: String,

        #[arg(short, long, default_value = "20")]
        limit: i64,

        #[arg(short, long, default_value = "0")]
        offset: i64,
    },

    /// Send a FAILED job back to PENDING
    Retry {
        /// Job ID
        job_id: String,

        /// Keep the attempt count (refused once the budget is spent)
        #[arg(long)]
        keep_attempts: bool,
    },

    /// Delete finished jobs older than N days
    Cleanup {
        #[arg(short, long, default_value = "7")]
        days: i64,
    },

    /// Show system status
    Status,

    /// List registered job types
    Handlers,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct EnqueueResult {
    job_id: String,
    status: String,
    priority: String,
}

#[derive(Tabled)]
struct JobRow {
    id: String,
    #[tabled(rename = "type")]
    job_type: String,
    status: String,
    priority: String,
    attempts: String,
    created: String,
}

impl JobRow {
    fn from_value(job: &Value) -> Self {
        Self {
            id: str_field(job, "id"),
            job_type: str_field(job, "job_type"),
            status: str_field(job, "status"),
            priority: str_field(job, "priority"),
            attempts: format!("{}/{}", job["attempts"], job["max_attempts"]),
            created: format_millis(&job["created_at"]),
        }
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value[key].as_str().unwrap_or("-").to_string()
}

fn format_millis(value: &Value) -> String {
    value
        .as_i64()
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn colored_status(status: &str) -> String {
    match status {
        "PENDING" => status.yellow().to_string(),
        "PROCESSING" => status.cyan().to_string(),
        "COMPLETED" => status.green().to_string(),
        "FAILED" => status.red().to_string(),
        other => other.to_string(),
    }
}

async fn call_rpc(url: &str, method: &str, params: Value) -> Result<Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Enqueue {
            tenant,
            job_type,
            priority,
            max_attempts,
            payload,
        } => {
            let payload_json: Value =
                serde_json::from_str(&payload).context("Invalid JSON payload")?;

            let mut params = json!({
                "tenant_id": tenant,
                "job_type": job_type,
                "priority": priority.as_str(),
                "payload": payload_json,
            });
            if let Some(max) = max_attempts {
                params["max_attempts"] = json!(max);
            }

            let result = call_rpc(&cli.rpc_url, "jobs.enqueue.v1", params).await?;
            let enqueue_result: EnqueueResult = serde_json::from_value(result)?;

            println!("{}", "✓ Job enqueued successfully".green().bold());
            println!();

            let table = Table::new(vec![enqueue_result]).to_string();
            println!("{}", table);
        }

        Commands::Get { job_id } => {
            let job = call_rpc(&cli.rpc_url, "jobs.get.v1", json!({ "job_id": job_id })).await?;

            println!("{}", format!("Job {}", job_id).cyan().bold());
            println!();
            println!("  {} {}", "Tenant:".bold(), str_field(&job, "tenant_id"));
            println!("  {} {}", "Type:".bold(), str_field(&job, "job_type"));
            println!(
                "  {} {}",
                "Status:".bold(),
                colored_status(&str_field(&job, "status"))
            );
            println!("  {} {}", "Priority:".bold(), str_field(&job, "priority"));
            println!(
                "  {} {}/{}",
                "Attempts:".bold(),
                job["attempts"],
                job["max_attempts"]
            );
            println!("  {} {}", "Created:".bold(), format_millis(&job["created_at"]));
            println!("  {} {}", "Updated:".bold(), format_millis(&job["updated_at"]));
            println!(
                "  {} {}",
                "Completed:".bold(),
                format_millis(&job["completed_at"])
            );
            println!();
            println!("  {} {}", "Payload:".bold(), job["payload"]);
            if !job["result"].is_null() {
                println!("  {} {}", "Result:".bold(), job["result"]);
            }
            if let Some(err) = job["error"].as_str() {
                println!("  {} {}", "Error:".bold(), err.red());
            }
        }

        Commands::List {
            tenant,
            limit,
            offset,
        } => {
            let params = json!({
                "tenant_id": tenant,
                "limit": limit,
                "offset": offset,
            });
            let page = call_rpc(&cli.rpc_url, "jobs.list.v1", params).await?;

            let rows: Vec<JobRow> = page["jobs"]
                .as_array()
                .map(|jobs| jobs.iter().map(JobRow::from_value).collect())
                .unwrap_or_default();

            if rows.is_empty() {
                println!("{}", "No jobs found".yellow());
            } else {
                println!("{}", Table::new(rows));
            }
            println!(
                "  {} {} (offset {}, limit {})",
                "Total:".bold(),
                page["total"],
                page["offset"],
                page["limit"]
            );
        }

        Commands::Retry {
            job_id,
            keep_attempts,
        } => {
            let params = json!({
                "job_id": job_id,
                "reset_attempts": !keep_attempts,
            });
            let result = call_rpc(&cli.rpc_url, "jobs.retry.v1", params).await?;

            println!(
                "{}",
                format!(
                    "✓ Job {} is {} again (attempts {}/{})",
                    job_id, result["status"], result["attempts"], result["max_attempts"]
                )
                .green()
                .bold()
            );
        }

        Commands::Cleanup { days } => {
            println!("{}", "Running cleanup...".cyan().bold());
            println!();

            let params = json!({ "older_than_days": days });
            match call_rpc(&cli.rpc_url, "admin.cleanup.v1", params).await {
                Ok(result) => {
                    println!(
                        "  {} {} finished jobs older than {} days deleted",
                        "✓".green(),
                        result["deleted"],
                        result["older_than_days"]
                    );
                }
                Err(e) => {
                    println!("  {} Cleanup failed: {}", "✗".red(), e);
                }
            }
        }

        Commands::Status => {
            println!("{}", "System Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Total Jobs:".bold(), stats["total_jobs"]);
                    println!("  {} {}", "Pending:".bold(), stats["by_status"]["PENDING"]);
                    println!(
                        "  {} {}",
                        "Processing:".bold(),
                        stats["by_status"]["PROCESSING"]
                    );
                    println!(
                        "  {} {}",
                        "Completed:".bold(),
                        stats["by_status"]["COMPLETED"]
                    );
                    println!("  {} {}", "Failed:".bold(), stats["by_status"]["FAILED"]);
                    println!();
                    let db_mb =
                        stats["db_size_bytes"].as_i64().unwrap_or(0) as f64 / (1024.0 * 1024.0);
                    println!("  {} {:.2} MB", "DB Size:".bold(), db_mb);
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::Handlers => {
            let result = call_rpc(&cli.rpc_url, "admin.handlers.v1", json!({})).await?;
            let handlers: Vec<String> =
                serde_json::from_value(result["handlers"].clone()).unwrap_or_default();

            println!("{}", "Registered handlers".cyan().bold());
            for name in handlers {
                println!("  {} {}", "•".bold(), name);
            }
        }
    }

    Ok(())
}
