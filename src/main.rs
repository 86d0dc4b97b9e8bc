//! # Reflexion Agent CLI
//!
//! Answers a question by drafting, critiquing, searching and revising.
//!
//! ```bash
//! cargo run -- "What are the trade-offs of async Rust?"
//! ```

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use reflexion_agent::{
    build_provider, build_search, Config, Provider, ReflexionGraph, RunOutcome, SearchBackend,
};

#[derive(Parser, Debug)]
#[command(
    name = "reflexion-agent",
    version,
    about = "Answers a question, critiques the answer, and revises it with web search results",
    long_about = r#"
Reflexion Agent drafts an answer, reflects on what is missing or superfluous,
searches the web for the missing pieces, and revises the answer with numbered
citations. Revision and search alternate up to --max-iterations extra rounds.

EXAMPLES:
  reflexion-agent "How do autonomous SOC platforms work?"
  reflexion-agent --max-iterations 0 "What is 2+2?"
  reflexion-agent --provider ollama --search duckduckgo "Rust web frameworks"
"#
)]
struct Args {
    /// The question to answer
    #[arg(value_name = "QUESTION")]
    question: String,

    /// Inference provider (overrides REFLEXION_PROVIDER)
    #[arg(short = 'p', long = "provider", value_enum)]
    provider: Option<Provider>,

    /// Model identifier (overrides REFLEXION_MODEL)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// Extra revise rounds after the first (overrides MAX_ITERATIONS)
    #[arg(short = 'n', long = "max-iterations")]
    max_iterations: Option<usize>,

    /// Search backend (overrides SEARCH_BACKEND)
    #[arg(short = 's', long = "search", value_enum)]
    search: Option<SearchBackend>,

    /// Abort the run after this many seconds (overrides RUN_TIMEOUT_SECS)
    #[arg(long = "timeout-secs")]
    timeout_secs: Option<u64>,

    /// Print the conversation and final answer as JSON
    #[arg(long = "json", default_value = "false")]
    json: bool,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(provider) = self.provider {
            config.provider = provider;
        }
        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(max_iterations) = self.max_iterations {
            config.max_iterations = max_iterations;
        }
        if let Some(search) = self.search {
            config.search_backend = search;
        }
        if let Some(secs) = self.timeout_secs {
            config.run_timeout = Some(Duration::from_secs(secs));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let mut config = Config::from_env()?;
    args.apply(&mut config);
    config.validate()?;

    info!(
        provider = ?config.provider,
        model = %config.model(),
        search = ?config.search_backend,
        max_iterations = config.max_iterations,
        "Configuration loaded"
    );

    let graph = ReflexionGraph::new(build_provider(&config), build_search(&config)?)
        .with_max_iterations(config.max_iterations)
        .with_search_concurrency(config.search_concurrency);

    let outcome = match run_question(&graph, &args.question, config.run_timeout).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("\nRun failed: {}", e);

            if e.to_string().contains("connection refused") {
                eprintln!("\nTip: make sure the inference service is reachable (for Ollama: `ollama serve`).");
            }
            return Err(e);
        }
    };

    print_outcome(&outcome, args.json)?;
    info!(
        model_calls = outcome.model_calls,
        search_batches = outcome.search_batches,
        "Run completed successfully"
    );
    Ok(())
}

/// Run the graph, optionally under a whole-run timeout.
///
/// A loop failure keeps its error kind and state. The timeout wraps the
/// whole run from outside and drops it wherever it is, so it has no loop
/// state to report and says so.
async fn run_question(
    graph: &ReflexionGraph,
    question: &str,
    timeout: Option<Duration>,
) -> Result<RunOutcome> {
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, graph.run(question)).await {
            Ok(result) => result,
            Err(_) => {
                error!(timeout = ?limit, "Run timed out");
                anyhow::bail!(
                    "TimeoutError: run aborted by the caller-level timeout after {:?} \
                     (the whole run was cancelled, so no loop state is reported)",
                    limit
                );
            }
        },
        None => graph.run(question).await,
    };

    result.map_err(|failure| {
        error!(state = %failure.state, error = %failure.error, "Run failed");
        failure.into()
    })
}

fn print_outcome(outcome: &RunOutcome, json: bool) -> Result<()> {
    if json {
        let report = serde_json::json!({
            "answer": outcome.answer.encode(),
            "rendered": outcome.answer.render(),
            "model_calls": outcome.model_calls,
            "search_batches": outcome.search_batches,
            "conversation": outcome.conversation,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", outcome.answer.render());
    }
    Ok(())
}

/// Install the tracing subscriber. Logs go to stderr; stdout is for the answer.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
