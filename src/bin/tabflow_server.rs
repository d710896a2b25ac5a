//! tabflow API Server binary

use clap::Parser;
use std::path::PathBuf;
use tabflow::api::{run_api_server, ApiConfig};

#[derive(Parser, Debug)]
#[command(name = "tabflow-server")]
#[command(version)]
#[command(about = "tabflow API Server - HTTP API over one spreadsheet session")]
#[command(long_about = r#"
tabflow API Server

Endpoints:
  - POST   /api/v1/upload          - Upload a workbook (raw request body)
  - DELETE /api/v1/upload          - Remove it and reset the session
  - GET    /api/v1/sheets          - Sheet names
  - POST   /api/v1/load            - Load a sheet {"sheet": "Sales"}
  - GET    /api/v1/filters         - Filter choices
  - POST   /api/v1/filter          - {"filters": [...], "sort": {...}}
  - POST   /api/v1/formula         - {"name": "growth", "expr": "sales.pct_change()"}
  - GET    /api/v1/table           - ?view=raw|filtered|calculated&limit=N
  - GET    /api/v1/columns/numeric - Plot y-axis candidates
  - POST   /api/v1/plot            - {"x": "date", "y": "growth"}

Additional endpoints:
  - GET  /health           - Health check
  - GET  /version          - Server version info
  - GET  /                 - API documentation

Example usage:
  tabflow-server                           # Start on localhost:8080
  tabflow-server --host 0.0.0.0 --port 3000

  curl -X POST http://localhost:8080/api/v1/upload --data-binary @sales.xlsx
"#)]
struct Args {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "TABFLOW_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "TABFLOW_PORT")]
    port: u16,

    /// Where the uploaded workbook is kept
    #[arg(long, default_value = "uploaded.xlsx", env = "TABFLOW_UPLOAD_PATH")]
    upload_path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ApiConfig {
        host: args.host,
        port: args.port,
        upload_path: args.upload_path,
    };

    run_api_server(config).await
}
