use clap::Parser;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use storql::{DbResult, Engine, QueryResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "storql")]
#[command(about = "Embedded SQL-flavored query engine over a versioned object store", long_about = None)]
struct Args {
    /// Data directory path
    #[arg(long, default_value = "./data")]
    data_dir: String,

    /// Execute a single statement and exit
    #[arg(short = 'e', long)]
    execute: Option<String>,

    /// Positional parameters as a JSON array, e.g. '["Dune", 5]'
    #[arg(short = 'p', long)]
    params: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storql=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let engine = Engine::open(&args.data_dir)?;

    if let Some(statement) = args.execute {
        let params = parse_params(args.params.as_deref())?;
        match engine.execute(&statement, &params).await {
            Ok(result) => print_result(&result),
            Err(err) => {
                eprintln!("{}", err.to_string().red());
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    repl(&engine).await
}

async fn repl(engine: &Engine) -> anyhow::Result<()> {
    println!(
        "storql v{} (store version {})",
        env!("CARGO_PKG_VERSION"),
        engine.version()
    );
    println!("Type {} for help, {} to exit.", ".help".cyan(), ".quit".cyan());

    let mut editor = DefaultEditor::new()?;
    let mut params: Vec<Value> = Vec::new();

    loop {
        match editor.readline(&"storql> ".cyan().to_string()) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                match line {
                    ".quit" | ".exit" => break,
                    ".help" => {
                        print_help();
                        continue;
                    }
                    ".tables" => {
                        print_tables(engine);
                        continue;
                    }
                    _ => {}
                }

                if let Some(rest) = line.strip_prefix(".params") {
                    match parse_params(Some(rest.trim())) {
                        Ok(parsed) => {
                            params = parsed;
                            println!("{} parameter(s) bound", params.len());
                        }
                        Err(err) => eprintln!("{}", err.to_string().red()),
                    }
                    continue;
                }

                match engine.execute(line, &params).await {
                    Ok(result) => print_result(&result),
                    Err(err) => eprintln!("{}", err.to_string().red()),
                }
                params.clear();
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}", err.to_string().red());
                break;
            }
        }
    }

    Ok(())
}

fn parse_params(raw: Option<&str>) -> anyhow::Result<Vec<Value>> {
    match raw {
        None | Some("") => Ok(Vec::new()),
        Some(raw) => {
            let value: Value = serde_json::from_str(raw)?;
            match value {
                Value::Array(values) => Ok(values),
                other => Ok(vec![other]),
            }
        }
    }
}

fn print_result(result: &QueryResult) {
    match result {
        QueryResult::Created => println!("{}", "OK".green()),
        QueryResult::Inserted { id } => println!("{} id={}", "Inserted".green(), id),
        QueryResult::Rows(rows) => {
            for row in rows {
                println!("{}", row.to_value());
            }
            println!("{} row(s)", rows.len());
        }
        QueryResult::Updated { count } => println!("{} {} row(s)", "Updated".green(), count),
        QueryResult::Deleted { count } => println!("{} {} row(s)", "Deleted".green(), count),
    }
}

fn print_tables(engine: &Engine) {
    let print = |tables: DbResult<Vec<storql::TableSchema>>| match tables {
        Ok(tables) => {
            for table in &tables {
                let columns: Vec<String> = table
                    .columns
                    .iter()
                    .map(|c| format!("{} {}", c.name, c.declared_type))
                    .collect();
                println!("{} ({})", table.name.bold(), columns.join(", "));
            }
            println!("{} table(s)", tables.len());
        }
        Err(err) => eprintln!("{}", err.to_string().red()),
    };
    print(engine.list_tables());
}

fn print_help() {
    println!("Statements:");
    println!("  CREATE TABLE name (col TYPE, ...)");
    println!("  INSERT INTO name (cols) VALUES (?, ...)");
    println!("  SELECT * FROM name [WHERE col = ? [AND ...]] [ORDER BY col [ASC|DESC]]");
    println!("  UPDATE name SET col = ? WHERE col = ?");
    println!("  DELETE FROM name WHERE col = ?");
    println!();
    println!("Meta commands:");
    println!("  .params [json array]   bind parameters for the next statement");
    println!("  .tables                list tables");
    println!("  .help                  this help");
    println!("  .quit                  exit");
}
