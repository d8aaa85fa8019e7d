use anyhow::Result;
use clap::{Parser, Subcommand};
use quickdocs_nlq::execution::Row;
use quickdocs_nlq::{Config, NlQueryPipeline, QueryOutcome};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quickdocs-nlq")]
#[command(about = "Ask natural-language questions about the QuickDocs database")]
struct Args {
    /// Path to the SQLite database (or set QUICKDOCS_DATABASE)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Generation service API key (or set GEMINI_API_KEY / OPENAI_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Reject generated SQL unless it parses as exactly one query
    #[arg(long, global = true)]
    strict: bool,

    /// Print outcomes as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate one question to SQL and run it
    Ask {
        /// The question in natural language
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Print the schema the model is grounded on
    Schema,
    /// Ask questions interactively until "exit"
    Repl,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(api_key) = args.api_key.filter(|k| !k.trim().is_empty()) {
        config.generation.api_key = Some(api_key);
    }
    if args.strict {
        config.strict_sql = true;
    }
    config.validate()?;

    info!("Using database {:?}", config.database_path);
    let pipeline = NlQueryPipeline::from_config(Arc::new(config))?;

    match args.command {
        Commands::Ask { question } => {
            let outcome = pipeline.answer(&question.join(" ")).await;
            print_outcome(&outcome, args.json)?;
            Ok(if outcome.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Schema => {
            let schema = pipeline.engine().describe_schema().await?;
            println!("{}", schema);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Repl => {
            run_repl(&pipeline, args.json).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_repl(pipeline: &NlQueryPipeline, json: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("question> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        let outcome = pipeline.answer(question).await;
        print_outcome(&outcome, json)?;
    }
    Ok(())
}

fn print_outcome(outcome: &QueryOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    if !outcome.sql_text.is_empty() {
        println!("SQL: {}", outcome.sql_text);
    }
    if let Some(message) = outcome.error_message() {
        println!("Error: {}", message);
        return Ok(());
    }
    print_table(&outcome.rows, outcome.truncated);
    Ok(())
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn print_table(rows: &[Row], truncated: bool) {
    let Some(first) = rows.first() else {
        println!("(no results)");
        return;
    };

    let columns: Vec<&String> = first.keys().collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| row.get(*c).map(render_value).unwrap_or_default()).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |values: Vec<&str>| {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{:<width$}", v, width = widths[i]))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    println!("{}", line(columns.iter().map(|c| c.as_str()).collect()));
    println!(
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-")
    );
    for row in &cells {
        println!("{}", line(row.iter().map(|c| c.as_str()).collect()));
    }
    if truncated {
        println!("(truncated to {} rows)", rows.len());
    } else {
        println!("({} row{})", rows.len(), if rows.len() == 1 { "" } else { "s" });
    }
}
