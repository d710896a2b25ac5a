use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tabflow::api::ApiConfig;
use tabflow::cli::{self, OutputFormat, PipelineOptions};
use tabflow::core::CarryOver;
use tabflow::logging::init_tracing;

#[derive(Parser)]
#[command(name = "tabflow")]
#[command(about = "Load a sheet, filter rows, derive columns with safe formulas, plot the result.")]
#[command(long_about = "tabflow - spreadsheet analysis from the command line

Every command runs one pipeline pass:
  load sheet → filter & sort → formulas → output

COMMANDS:
  sheets   - List the sheets of a workbook
  columns  - Column types, numeric columns and filter choices
  show     - Print the calculated table (table, json or csv)
  plot     - Print an (x, y) series
  export   - Write the calculated table to .xlsx
  serve    - Start the HTTP API

EXAMPLES:
  tabflow show sales.xlsx --filter region=East,West --sort date
  tabflow show sales.xlsx -f 'growth=sales.pct_change()' --format csv
  tabflow plot sales.xlsx --recipe monthly.yaml
  tabflow export sales.xlsx report.xlsx --recipe monthly.yaml")]
#[command(version)]
struct Cli {
    /// Log pipeline steps to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct PipelineArgs {
    /// Sheet name (default: first sheet)
    #[arg(short, long)]
    sheet: Option<String>,

    /// YAML recipe with sheet, filters, sort, formulas and plot settings
    #[arg(short, long)]
    recipe: Option<PathBuf>,

    /// Keep rows whose column has one of the values: column=value1,value2
    #[arg(long = "filter", value_name = "COLUMN=VALUES")]
    filters: Vec<String>,

    /// Sort by this column
    #[arg(long)]
    sort: Option<String>,

    /// Sort descending
    #[arg(long)]
    descending: bool,

    /// Derived column: name=expression (applied in order)
    #[arg(short = 'f', long = "formula", value_name = "NAME=EXPR")]
    formulas: Vec<String>,

    /// How derived columns follow rows after re-filtering
    #[arg(long, value_name = "positional|row_identity")]
    carry_over: Option<CarryOver>,
}

impl From<PipelineArgs> for PipelineOptions {
    fn from(args: PipelineArgs) -> Self {
        PipelineOptions {
            sheet: args.sheet,
            recipe: args.recipe,
            filters: args.filters,
            sort: args.sort,
            descending: args.descending,
            formulas: args.formulas,
            carry_over: args.carry_over,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of a workbook
    Sheets {
        /// Workbook (.xlsx, .xls, .xlsb, .ods)
        file: PathBuf,
    },

    /// Show column types, numeric columns and filter choices
    Columns {
        file: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Output format (table or json)
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    #[command(long_about = "Run the pipeline and print the calculated table.

FORMULAS:
  Column names, numbers, 'text', + - * / // % **, comparisons,
  and functions: shift, diff, pct_change, cumsum, abs, round,
  fillna, sum, mean, min, max, count.
  Method form works too: sales.shift(1) is shift(sales, 1).

EXAMPLE:
  tabflow show sales.xlsx -f 'prev=sales.shift(1)' -f 'delta=sales - prev'")]
    /// Print the calculated table
    Show {
        file: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Print at most this many rows
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Print an (x, y) line-chart series
    Plot {
        file: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// X-axis column
        #[arg(short, long)]
        x: Option<String>,

        /// Y-axis column (numeric)
        #[arg(short, long)]
        y: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Write the calculated table to an .xlsx file
    Export {
        file: PathBuf,

        /// Output .xlsx path
        output: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Worksheet name in the output
        #[arg(long)]
        sheet_name: Option<String>,
    },

    /// Start the HTTP API server
    Serve {
        /// Host address to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1", env = "TABFLOW_HOST")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "TABFLOW_PORT")]
        port: u16,

        /// Where the uploaded workbook is kept
        #[arg(long, default_value = "uploaded.xlsx", env = "TABFLOW_UPLOAD_PATH")]
        upload_path: PathBuf,
    },
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Sheets { file } => cli::sheets(file)?,

        Commands::Columns {
            file,
            pipeline,
            format,
        } => cli::columns(file, pipeline.into(), format)?,

        Commands::Show {
            file,
            pipeline,
            format,
            limit,
        } => cli::show(file, pipeline.into(), format, limit)?,

        Commands::Plot {
            file,
            pipeline,
            x,
            y,
            format,
        } => cli::plot(file, pipeline.into(), x, y, format)?,

        Commands::Export {
            file,
            output,
            pipeline,
            sheet_name,
        } => cli::export(file, output, pipeline.into(), sheet_name)?,

        Commands::Serve {
            host,
            port,
            upload_path,
        } => cli::serve(ApiConfig {
            host,
            port,
            upload_path,
        })?,
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let filter = match (&cli.command, cli.verbose) {
        (Commands::Serve { .. }, _) => "tabflow=info,tower_http=info",
        (_, true) => "tabflow=debug",
        (_, false) => "tabflow=warn",
    };
    init_tracing(filter);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
