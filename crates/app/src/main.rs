use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use medchat_core::{
    build_agent, build_retriever, index, load_pdf_documents, load_records, save_records,
    ApiKeys, ChatSession, EmbeddingChoice, IngestionOptions, MilvusStore, ModelChoice, Retriever,
    RetrieverOptions, VectorStore, DEFAULT_COLLECTION, DEFAULT_MILVUS_URI,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "medchat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Milvus server URI
    #[arg(long, env = "MILVUS_URI", default_value = DEFAULT_MILVUS_URI)]
    milvus_uri: String,

    /// Milvus access token
    #[arg(long, env = "MILVUS_TOKEN", hide_env_values = true)]
    milvus_token: Option<String>,

    /// Collection holding the medical records
    #[arg(long, env = "MILVUS_COLLECTION", default_value = DEFAULT_COLLECTION)]
    collection: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Load PDFs, split pages into windows and save them as JSON.
    Ingest {
        #[arg(long, default_value = "../medical_data")]
        input_dir: PathBuf,
        #[arg(long, default_value = "stack.json")]
        output_file: String,
        #[arg(long, default_value = "data")]
        output_dir: PathBuf,
        /// Descend into subfolders.
        #[arg(long, default_value_t = false)]
        recursive: bool,
        #[arg(long, default_value = "5000")]
        chunk_size: usize,
        #[arg(long, default_value = "200")]
        chunk_overlap: usize,
    },
    /// Replace the collection with the records of a saved JSON file.
    Seed {
        #[arg(long, default_value = "stack.json")]
        file: String,
        #[arg(long, default_value = "data")]
        dir: PathBuf,
        /// Embedding provider: openai or google.
        #[arg(long, default_value = "google")]
        embedding: EmbeddingChoice,
    },
    /// Run the hybrid retriever once and print the fused records.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "google")]
        embedding: EmbeddingChoice,
        #[arg(long, default_value = "4")]
        top_k: usize,
    },
    /// Ask the agent a single question.
    Ask {
        /// Chat model: gpt4 or gemini.
        #[arg(long, default_value = "gemini")]
        model: ModelChoice,
        #[arg(long)]
        query: String,
    },
    /// Interactive chat. Type /clear to reset the conversation and /exit to leave.
    Chat {
        #[arg(long, default_value = "gemini")]
        model: ModelChoice,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let keys = ApiKeys::new(cli.openai_api_key, cli.google_api_key);
    let store: Arc<dyn VectorStore> = Arc::new(
        MilvusStore::new(&cli.milvus_uri, cli.milvus_token)
            .with_context(|| format!("invalid milvus uri {}", cli.milvus_uri))?,
    );

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        milvus = %cli.milvus_uri,
        collection = %cli.collection,
        "medchat boot"
    );

    match cli.command {
        Command::Ingest {
            input_dir,
            output_file,
            output_dir,
            recursive,
            chunk_size,
            chunk_overlap,
        } => {
            let options = IngestionOptions {
                chunk_size,
                chunk_overlap,
                recursive,
            };
            let report = load_pdf_documents(&input_dir, &options)?;

            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
            }

            let path = save_records(&report.records, &output_file, &output_dir)?;
            println!(
                "{} records saved to {} at {}",
                report.records.len(),
                path.display(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Seed {
            file,
            dir,
            embedding,
        } => {
            let records = load_records(&file, &dir)
                .with_context(|| format!("cannot load {}", dir.join(&file).display()))?;
            let handle = index(store.as_ref(), &records, &cli.collection, embedding, &keys).await?;
            println!(
                "collection {} seeded with {} records ({} dimensions)",
                handle.name,
                handle.ids.len(),
                handle.dimensions
            );
        }
        Command::Search {
            query,
            embedding,
            top_k,
        } => {
            let options = RetrieverOptions {
                top_k,
                ..RetrieverOptions::new(cli.collection)
            };
            let retriever = build_retriever(store, embedding, &keys, &options).await;
            if retriever.is_degraded() {
                warn!("retriever is degraded, results are placeholders");
            }

            for (rank, record) in retriever.search(&query).await?.iter().enumerate() {
                println!(
                    "[{}] source={}",
                    rank + 1,
                    record.source().unwrap_or("unknown")
                );
                println!("{}", record.content);
            }
        }
        Command::Ask { model, query } => {
            let agent =
                build_agent(model, &keys, store, &RetrieverOptions::new(cli.collection)).await?;
            let result = agent.invoke(&query, &[]).await?;

            for step in &result.steps {
                info!(tool = %step.tool_call.name, arguments = %step.tool_call.arguments, "tool step");
            }
            println!("{}", result.output);
        }
        Command::Chat { model } => {
            let agent =
                build_agent(model, &keys, store, &RetrieverOptions::new(cli.collection)).await?;
            println!("{}", model.display_name());
            run_chat(agent).await?;
        }
    }

    Ok(())
}

async fn run_chat(agent: medchat_core::AnswerAgent) -> anyhow::Result<()> {
    let mut session = ChatSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if let Some(greeting) = session.turns().first() {
        println!("assistant> {}", greeting.content);
    }

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/exit" => break,
            "/clear" => {
                session.clear();
                if let Some(greeting) = session.turns().first() {
                    println!("assistant> {}", greeting.content);
                }
            }
            input => {
                let reply = session.ask(&agent, input).await;
                println!("assistant> {reply}");
            }
        }
    }

    Ok(())
}
