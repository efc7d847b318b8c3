use std::{env, fs, path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    agents::SearchLayer,
    config::PlannerConfig,
    core::TripPipeline,
    modification::{ConversationTurn, ModificationEngine},
    services::{
        CompletionClient, Discovery, GooglePlacesClient, JinaSearchClient, OpenAICompatibleClient,
    },
    types::Itinerary,
};

/// CLI entry point for the trip planner
pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let matches = command().get_matches();
    let config = resolve_config(&matches)?;

    match matches.subcommand() {
        Some(("generate", sub)) => generate(&config, sub).await,
        Some(("modify", sub)) => modify(&config, sub).await,
        Some(("classify", sub)) => classify(&config, sub).await,
        Some((name, _)) => anyhow::bail!("Unknown command: {name}"),
        None => anyhow::bail!("A command is required"),
    }
}

fn command() -> Command {
    let request = Arg::new("request")
        .help("Natural-language request")
        .required(true)
        .index(1);
    let itinerary = Arg::new("itinerary")
        .long("itinerary")
        .value_name("FILE")
        .help("Itinerary JSON document to edit")
        .required(true);

    Command::new("trip-planner")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Generate themed itineraries and edit them incrementally")
        .subcommand_required(true)
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("MODEL")
                .global(true)
                .help("Completion model (or set MODEL)"),
        )
        .arg(
            Arg::new("api-key")
                .short('k')
                .long("api-key")
                .value_name("KEY")
                .global(true)
                .help("Completion API key (or set OPENAI_API_KEY)"),
        )
        .arg(
            Arg::new("base-url")
                .short('u')
                .long("base-url")
                .value_name("URL")
                .global(true)
                .help("Completion base URL (or set OPENAI_BASE_URL / OPENROUTER_BASE_URL)"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("SECONDS")
                .global(true)
                .help("Per-call timeout for completion requests"),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate an itinerary and print the pipeline result as JSON")
                .arg(request.clone()),
        )
        .subcommand(
            Command::new("modify")
                .about("Apply an edit request and print the patch events as SSE frames")
                .arg(itinerary.clone())
                .arg(
                    Arg::new("context")
                        .long("context")
                        .value_name("FILE")
                        .help("JSON list of prior {role, content} conversation turns"),
                )
                .arg(request.clone()),
        )
        .subcommand(
            Command::new("classify")
                .about("Print the modification intent for an edit request")
                .arg(itinerary)
                .arg(request),
        )
}

fn resolve_config(matches: &ArgMatches) -> Result<PlannerConfig> {
    if let Some(api_key) = matches.get_one::<String>("api-key") {
        env::set_var("OPENAI_API_KEY", api_key);
    }

    let mut config = PlannerConfig::from_env().context("Failed to load configuration")?;

    if let Some(model) = matches.get_one::<String>("model") {
        config = config.with_model(model.as_str());
    }
    if let Some(base_url) = matches.get_one::<String>("base-url") {
        config = config.with_base_url(base_url.as_str());
    }
    if let Some(raw) = matches.get_one::<String>("timeout") {
        let secs: u64 = raw
            .parse()
            .with_context(|| format!("--timeout is not a number: {raw}"))?;
        config = config.with_completion_timeout(Duration::from_secs(secs));
    }

    info!(
        target: "trip_planner::cli",
        model = %config.model,
        base_url = %config.base_url,
        price_lookup = config.jina_api_key.is_some(),
        "Configuration loaded"
    );
    Ok(config)
}

fn clients(config: &PlannerConfig) -> (Arc<dyn CompletionClient>, Arc<dyn Discovery>) {
    let completion: Arc<dyn CompletionClient> = Arc::new(OpenAICompatibleClient::from_config(config));
    let discovery: Arc<dyn Discovery> = Arc::new(GooglePlacesClient::from_config(config));
    (completion, discovery)
}

fn search_layer(
    config: &PlannerConfig,
    completion: &Arc<dyn CompletionClient>,
    discovery: &Arc<dyn Discovery>,
) -> SearchLayer {
    let search = SearchLayer::new(Arc::clone(discovery), Arc::clone(completion)).with_config(config);
    match config.jina_api_key.as_deref() {
        Some(key) => search.with_price_lookup(Arc::new(JinaSearchClient::new(key))),
        None => search,
    }
}

fn request(matches: &ArgMatches) -> Result<&str> {
    matches
        .get_one::<String>("request")
        .map(String::as_str)
        .context("request is required")
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn load_itinerary(matches: &ArgMatches) -> Result<Itinerary> {
    let path = matches
        .get_one::<String>("itinerary")
        .context("--itinerary is required")?;
    let document = read_json(Path::new(path))?;
    Ok(Itinerary::from_document(document)?)
}

fn load_context(matches: &ArgMatches) -> Result<Vec<ConversationTurn>> {
    match matches.get_one::<String>("context") {
        Some(path) => {
            let turns = serde_json::from_value(read_json(Path::new(path))?)
                .with_context(|| format!("{path} is not a list of conversation turns"))?;
            Ok(turns)
        }
        None => Ok(Vec::new()),
    }
}

async fn generate(config: &PlannerConfig, matches: &ArgMatches) -> Result<()> {
    let query = request(matches)?;
    let (completion, discovery) = clients(config);
    let search = search_layer(config, &completion, &discovery);
    let pipeline = TripPipeline::from_config(config, completion, discovery).with_search_layer(search);

    let run = pipeline.run(query).await;
    eprintln!("{}", run.replay());
    println!("{}", serde_json::to_string_pretty(&run)?);

    if !run.success {
        anyhow::bail!("No itinerary could be generated: {}", run.errors.join("; "));
    }
    Ok(())
}

async fn modify(config: &PlannerConfig, matches: &ArgMatches) -> Result<()> {
    let itinerary = load_itinerary(matches)?;
    let context = load_context(matches)?;
    let (completion, discovery) = clients(config);
    let search = search_layer(config, &completion, &discovery);
    let engine =
        ModificationEngine::from_config(config, completion, discovery).with_search_layer(search);

    let outcome = engine.modify(request(matches)?, &itinerary, &context).await;
    for event in outcome.events {
        print!("{}", event.to_sse()?);
    }
    Ok(())
}

async fn classify(config: &PlannerConfig, matches: &ArgMatches) -> Result<()> {
    let itinerary = load_itinerary(matches)?;
    let (completion, discovery) = clients(config);
    let engine = ModificationEngine::from_config(config, completion, discovery);

    let intent = engine.classify(request(matches)?, &itinerary, &[]).await;
    println!("{}", serde_json::to_string_pretty(&intent)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parses_subcommands() {
        let matches = command()
            .try_get_matches_from([
                "trip-planner",
                "modify",
                "--itinerary",
                "trip.json",
                "--model",
                "some/model",
                "make it cheaper",
            ])
            .unwrap();

        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "modify");
        assert_eq!(request(sub).unwrap(), "make it cheaper");
        assert_eq!(sub.get_one::<String>("model").unwrap(), "some/model");
    }

    #[test]
    fn test_subcommand_required() {
        assert!(command().try_get_matches_from(["trip-planner"]).is_err());
    }
}
