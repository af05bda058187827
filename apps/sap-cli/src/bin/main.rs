use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sap_core::config::{Config, LoggingConfig, SapConfig};
use sap_core::types::{Modality, Query, QueryImage};
use sap_hybrid::{AnswerComposer, EvidenceContext, QueryRouter, RouterSettings};
use sap_providers::{use_fake_providers, OpenAiChatClient, ProviderSet, WithTimeout};
use sap_vector::SharedRetriever;

#[derive(Parser)]
#[command(name = "sap", version, about = "Plant retrieval over the text, caption and image vector stores")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Route a query and print the retrieved evidence.
    Query {
        #[command(flatten)]
        input: QueryInput,
        /// Results per index (overrides retrieval.top_k).
        #[arg(long)]
        top_k: Option<usize>,
        /// Print the full route outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Route a query and answer it with the chat model.
    Ask {
        #[command(flatten)]
        input: QueryInput,
        #[arg(long)]
        json: bool,
    },
    /// Show what is loaded from each vector store.
    Stats,
}

#[derive(Args)]
struct QueryInput {
    /// Question or description.
    #[arg(long, short)]
    text: Option<String>,
    /// Photo of the plant.
    #[arg(long, short)]
    image: Option<PathBuf>,
}

impl QueryInput {
    fn into_query(self) -> anyhow::Result<Query> {
        let image = match &self.image {
            Some(path) => {
                let bytes = fs::read(path).with_context(|| format!("reading image {}", path.display()))?;
                Some(QueryImage::new(bytes))
            }
            None => None,
        };
        let query = Query { text: self.text, image };
        if query.trimmed_text().is_none() && query.image.is_none() {
            bail!("provide --text and/or --image");
        }
        Ok(query)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;
    init_tracing(&settings.logging);

    let stores_dir = settings.stores.base_path();
    let retriever = Arc::new(
        SharedRetriever::open(settings.stores.clone())
            .with_context(|| format!("opening vector stores under {}", stores_dir.display()))?,
    );

    match cli.command {
        Command::Stats => {
            let snapshot = retriever.snapshot();
            for stats in snapshot.stats() {
                println!("{}", serde_json::to_string_pretty(stats)?);
            }
        }
        Command::Query { input, top_k, json } => {
            let query = input.into_query()?;
            let mut router_settings = RouterSettings::from(&settings.retrieval);
            if let Some(k) = top_k {
                router_settings.top_k = k;
            }
            let router = QueryRouter::new(retriever.clone(), providers(&settings, &retriever)?, router_settings);
            let outcome = router.handle_query(&query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("mode: {}", outcome.mode);
                if let Some(caption) = &outcome.generated_caption {
                    println!("caption: {caption}");
                }
                println!();
                println!("{}", EvidenceContext::build(&outcome, settings.retrieval.context_items).render());
            }
        }
        Command::Ask { input, json } => {
            let query = input.into_query()?;
            let chat = OpenAiChatClient::from_env(&settings.chat)?;
            let composer = AnswerComposer::new(
                Arc::new(WithTimeout::new(chat, settings.chat.timeout())),
                settings.retrieval.context_items,
            );
            let router = QueryRouter::new(
                retriever.clone(),
                providers(&settings, &retriever)?,
                RouterSettings::from(&settings.retrieval),
            );
            let outcome = router.handle_query(&query).await?;
            let answer = composer.answer(&query, &outcome).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                println!("{}", answer.answer);
            }
        }
    }
    Ok(())
}

fn providers(settings: &SapConfig, retriever: &SharedRetriever) -> anyhow::Result<ProviderSet> {
    if use_fake_providers(&settings.providers) {
        let snapshot = retriever.snapshot();
        let set = ProviderSet::fake(snapshot.index(Modality::Text).dim(), snapshot.index(Modality::Image).dim());
        return Ok(set.with_timeout(settings.providers.timeout()));
    }
    Ok(ProviderSet::remote(&settings.providers)?)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
