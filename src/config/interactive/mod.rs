
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ConfigError, ProviderConfig, RetrievalConfig, StoreConfig};
use crate::database::BackendKind;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 RAG Core Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Model Provider").bold().yellow());
    eprintln!("Configure the Ollama instance used for embeddings and generation.");
    eprintln!();
    configure_provider(&mut config.provider)?;

    eprintln!();
    eprintln!("{}", style("Vector Store").bold().yellow());
    configure_store(&mut config.store)?;

    eprintln!();
    eprintln!("{}", style("Retrieval").bold().yellow());
    configure_retrieval(&mut config.retrieval)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_provider_connection(&config.provider) {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before ingesting.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Provider:").bold().yellow());
    eprintln!("  Host: {}", style(&config.provider.host).cyan());
    eprintln!("  Port: {}", style(config.provider.port).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.provider.embedding_model).cyan()
    );
    eprintln!(
        "  Generation Model: {}",
        style(&config.provider.generation_model).cyan()
    );
    eprintln!(
        "  Embedding Dimension: {}",
        style(config.provider.embedding_dimension).cyan()
    );
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Vector Store:").bold().yellow());
    eprintln!("  Backend: {}", style(config.store.backend).cyan());
    eprintln!(
        "  Collection: {}",
        style(&config.store.collection_name).cyan()
    );
    match config.store.backend {
        BackendKind::LocalIndex => eprintln!(
            "  Index File: {}",
            style(config.local_index_path().display()).cyan()
        ),
        BackendKind::ColumnarTable => {
            eprintln!("  LanceDB URI: {}", style(config.lancedb_uri()).cyan());
        }
        BackendKind::Unimplemented => {
            eprintln!("  {}", style("Backend is not implemented").red());
        }
    }

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.retrieval.chunk_size).cyan());
    eprintln!(
        "  Chunk Overlap: {}",
        style(config.retrieval.chunk_overlap).cyan()
    );
    eprintln!(
        "  Context Budget: {}",
        style(config.retrieval.context_budget).cyan()
    );
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load_default().or_else(|_| {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        let base_dir = Config::default_base_dir().context("Failed to resolve home directory")?;
        Ok(Config {
            base_dir,
            ..Config::default()
        })
    })
}

fn configure_provider(provider: &mut ProviderConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == provider.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(provider.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = ProviderConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..ProviderConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(provider.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(provider.embedding_model.clone())
        .interact_text()?;

    let generation_model: String = Input::new()
        .with_prompt("Generation model")
        .default(provider.generation_model.clone())
        .interact_text()?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(provider.embedding_dimension)
        .interact_text()?;

    provider.set_protocol(protocol)?;
    provider.set_host(host)?;
    provider.set_port(port)?;
    provider.set_embedding_model(embedding_model)?;
    provider.set_generation_model(generation_model)?;
    provider.set_embedding_dimension(dimension)?;

    Ok(())
}

fn configure_store(store: &mut StoreConfig) -> Result<()> {
    let kinds = [BackendKind::LocalIndex, BackendKind::ColumnarTable];
    let labels: Vec<String> = kinds.iter().map(ToString::to_string).collect();
    let default_index = kinds.iter().position(|k| *k == store.backend).unwrap_or(0);

    let selected = Select::new()
        .with_prompt("Vector store backend")
        .default(default_index)
        .items(&labels)
        .interact()?;
    store.backend = kinds[selected];

    store.collection_name = Input::new()
        .with_prompt("Collection name")
        .default(store.collection_name.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if !input.is_empty()
                && input
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                Ok(())
            } else {
                Err("Use letters, digits, '_' or '-'")
            }
        })
        .interact_text()?;

    Ok(())
}

fn configure_retrieval(retrieval: &mut RetrievalConfig) -> Result<()> {
    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(retrieval.chunk_size)
        .interact_text()?;

    let chunk_overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(retrieval.chunk_overlap.min(chunk_size.saturating_sub(1)))
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input < chunk_size {
                Ok(())
            } else {
                Err("Overlap must be smaller than the chunk size")
            }
        })
        .interact_text()?;

    let context_budget: usize = Input::new()
        .with_prompt("Context budget (characters)")
        .default(retrieval.context_budget)
        .interact_text()?;

    let top_k: usize = Input::new()
        .with_prompt("Results per query (top_k)")
        .default(retrieval.top_k)
        .interact_text()?;

    retrieval.chunk_size = chunk_size;
    retrieval.chunk_overlap = chunk_overlap;
    retrieval.context_budget = context_budget;
    retrieval.top_k = top_k;

    Ok(())
}

fn test_provider_connection(provider: &ProviderConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        provider.protocol, provider.host, provider.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) => (400..500).contains(&code),
        Err(_) => false,
    }
}
