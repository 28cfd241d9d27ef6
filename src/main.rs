//! # Lectern CLI
//!
//! The `lectern` binary is the primary interface for Lectern. It provides
//! commands for database initialization, course ingestion, one-shot
//! questions, an interactive chat session, and index statistics.
//!
//! ## Usage
//!
//! ```bash
//! lectern --config ./config/lectern.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lectern init` | Create the SQLite database and schema |
//! | `lectern ingest <folder>` | Parse and index course documents (`--full` to re-ingest) |
//! | `lectern ask "<question>"` | Answer a single question |
//! | `lectern chat` | Interactive session with conversation memory |
//! | `lectern outline "<course>"` | Print a course outline |
//! | `lectern stats` | Show indexed course and chunk counts |

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lectern::assistant::Assistant;
use lectern::config::{load_config, Config};
use lectern::embedding::create_embedder;
use lectern::index::CourseIndex;
use lectern::ingest::sync_folder;
use lectern::llm::OpenAiChatModel;
use lectern::sqlite_store::SqliteStore;
use lectern::tools::ToolRegistry;

/// Lectern — a retrieval-augmented assistant for course materials.
#[derive(Parser)]
#[command(
    name = "lectern",
    about = "Lectern — a retrieval-augmented assistant for course materials",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lectern.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Parse and index every course document in a folder.
    Ingest {
        /// Folder containing `*.txt` / `*.md` course documents.
        folder: PathBuf,

        /// Re-ingest courses that are already indexed.
        #[arg(long)]
        full: bool,
    },

    /// Answer a single question.
    Ask {
        /// The question to answer.
        question: String,

        /// Conversation id, for follow-up context across invocations of
        /// `chat`; `ask` runs a fresh conversation per process.
        #[arg(long, default_value = "cli")]
        session: String,
    },

    /// Interactive chat with conversation memory. `/clear` resets the
    /// conversation, `/quit` exits.
    Chat {
        #[arg(long, default_value = "cli")]
        session: String,
    },

    /// Print the outline of a course (fuzzy title match).
    Outline {
        /// Course title or partial title.
        course: String,
    },

    /// Show indexed course titles and chunk counts.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = lectern::db::connect(&config.db.path).await?;
            lectern::db::init_schema(&pool).await?;
            println!("initialized {}", config.db.path.display());
            pool.close().await;
        }
        Commands::Ingest { folder, full } => {
            let index = open_index(&config).await?;
            let report = sync_folder(&index, &folder, full).await?;
            println!("ingest {}", folder.display());
            println!("  files seen: {}", report.files_seen);
            println!("  courses added: {}", report.courses_added);
            println!("  chunks added: {}", report.chunks_added);
            println!("  skipped existing: {}", report.skipped_existing);
            println!("  failed: {}", report.failed);
            println!("ok");
        }
        Commands::Ask { question, session } => {
            let assistant = open_assistant(&config).await?;
            let answer = assistant.answer(&session, &question).await?;
            print_answer(&answer);
        }
        Commands::Chat { session } => {
            let assistant = open_assistant(&config).await?;
            run_chat(&assistant, &session).await?;
        }
        Commands::Outline { course } => {
            let index = open_index(&config).await?;
            let registry = ToolRegistry::with_course_tools(Arc::new(index));
            let outcome = registry
                .execute(
                    "get_course_outline",
                    serde_json::json!({ "course_title": course }),
                )
                .await?;
            println!("{}", outcome.text);
        }
        Commands::Stats => {
            let index = open_index(&config).await?;
            let titles = index.course_titles().await?;
            println!("courses: {}", titles.len());
            for title in &titles {
                println!("  {}", title);
            }
            println!("chunks: {}", index.chunk_count().await?);
        }
    }

    Ok(())
}

async fn open_index(config: &Config) -> Result<CourseIndex> {
    let pool = lectern::db::connect(&config.db.path).await?;
    lectern::db::init_schema(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));
    let embedder = create_embedder(&config.embedding)?;
    Ok(CourseIndex::new(
        store,
        embedder,
        config.chunking.clone(),
        config.retrieval.clone(),
    ))
}

async fn open_assistant(config: &Config) -> Result<Assistant> {
    let index = Arc::new(open_index(config).await?);
    let tools = ToolRegistry::with_course_tools(index);
    let model = Arc::new(OpenAiChatModel::new(&config.generation)?);
    Ok(Assistant::new(
        model,
        tools,
        &config.session,
        &config.generation,
    ))
}

fn print_answer(answer: &lectern::AssistantAnswer) {
    println!("{}", answer.text);
    if !answer.citations.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.citations {
            match &source.link {
                Some(link) => println!("  {} <{}>", source.label(), link),
                None => println!("  {}", source.label()),
            }
        }
    }
}

async fn run_chat(assistant: &Assistant, session: &str) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    println!("Lectern chat — /clear resets the conversation, /quit exits.");
    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                assistant.clear_session(session);
                println!("conversation cleared");
            }
            question => match assistant.answer(session, question).await {
                Ok(answer) => print_answer(&answer),
                Err(err) => eprintln!("error: {}", err),
            },
        }
    }

    Ok(())
}
