use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use serde_json::{Map, Value};
use std::sync::Arc;
use vidgen::{
    logger::{self, LoggerConfig},
    Config, GenerationPhase, GenerationsClient, KieClient, PollController, TaskProvider,
};

#[derive(Parser)]
#[command(name = "vidgen", version, about = "Text-to-video generation through Kie.ai")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        host: Option<String>,
    },
    /// Submit a generation and poll it until it settles.
    Generate {
        #[arg(long)]
        model: String,
        #[arg(long)]
        prompt: Option<String>,
        /// Extra input fields as a JSON object, e.g. '{"duration":"10"}'.
        #[arg(long)]
        input: Option<String>,
        #[command(flatten)]
        remote: Remote,
    },
    /// Look up a task once.
    Status {
        task_id: String,
        #[command(flatten)]
        remote: Remote,
    },
    /// List the supported models.
    Models,
}

#[derive(Args)]
struct Remote {
    /// Talk to a running vidgen server instead of Kie.ai directly.
    #[arg(long)]
    server: Option<String>,
    #[arg(long, env = "SESSION_TOKEN")]
    token: Option<String>,
}

impl Remote {
    fn provider(&self, config: &Config) -> Arc<dyn TaskProvider> {
        match &self.server {
            Some(server) => {
                log::info!("🔗 Using generations API at {}", server);
                let client = GenerationsClient::new(server.as_str());
                Arc::new(match &self.token {
                    Some(token) => client.with_session_token(token.as_str()),
                    None => client,
                })
            }
            None => Arc::new(KieClient::new(config.kie.clone())),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    let cli = Cli::parse();
    let mut config = Config::from_env();

    logger::init_with_config(LoggerConfig::from_app_config(&config))?;
    if !dotenv_loaded {
        log::debug!("No .env file found, using system environment variables");
    }

    match cli.command {
        Command::Serve { port, host } => {
            if let Some(port) = port {
                config = config.with_port(port);
            }
            if let Some(host) = host {
                config = config.with_host(host);
            }
            serve(config).await?;
        }
        Command::Generate {
            model,
            prompt,
            input,
            remote,
        } => {
            let input = build_input(prompt, input.as_deref())?;
            let request = vidgen::normalize(&model, &input)?;
            generate(remote.provider(&config), request).await?;
        }
        Command::Status { task_id, remote } => {
            let status = remote.provider(&config).query_task(&task_id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Models => {
            for model in vidgen::supported_models() {
                println!("{}\t{}\t{}", model.id, model.name, model.description);
            }
        }
    }

    Ok(())
}

#[cfg(feature = "server")]
async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    logger::log_startup_info(
        "vidgen",
        env!("CARGO_PKG_VERSION"),
        &config.host,
        config.port_or_default(),
    );
    logger::log_config_info(&config);

    let provider: Arc<dyn TaskProvider> = Arc::new(KieClient::new(config.kie.clone()));
    vidgen::server::run(config, provider).await?;
    Ok(())
}

#[cfg(not(feature = "server"))]
async fn serve(_config: Config) -> Result<(), Box<dyn std::error::Error>> {
    Err("vidgen was built without the `server` feature".into())
}

/// Merges `--prompt` over the `--input` object.
fn build_input(prompt: Option<String>, input: Option<&str>) -> Result<Value, String> {
    let mut fields = match input {
        None => Map::new(),
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => return Err("--input must be a JSON object".to_string()),
            Err(e) => return Err(format!("--input is not valid JSON: {}", e)),
        },
    };
    if let Some(prompt) = prompt {
        fields.insert("prompt".to_string(), Value::String(prompt));
    }
    Ok(Value::Object(fields))
}

async fn generate(
    provider: Arc<dyn TaskProvider>,
    request: vidgen::GenerationRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let _timer = logger::timer("Generation");
    let controller = PollController::new(provider);

    let task_id = controller.submit(request).await?;
    log::info!("🎬 Task {} submitted, polling for the result...", task_id);

    let mut updates = controller.updates();
    let outcome = loop {
        tokio::select! {
            update = updates.next() => match update {
                Some(phase) if phase.is_terminal() => break phase,
                Some(phase) => log::debug!("Phase: {}", phase.name()),
                None => break controller.phase(),
            },
            _ = tokio::signal::ctrl_c() => {
                log::warn!("Interrupted, cancelling polling for {}", task_id);
                controller.reset();
                return Ok(());
            }
        }
    };

    match outcome {
        GenerationPhase::Success {
            result_urls,
            warning,
            ..
        } => {
            if let Some(warning) = warning {
                log::warn!("⚠️  {}", warning);
            }
            log::info!("✅ Task {} finished with {} video(s)", task_id, result_urls.len());
            for url in result_urls {
                println!("{}", url);
            }
            Ok(())
        }
        GenerationPhase::Fail { failure, .. } => {
            log::error!("❌ Task {} failed: {}", task_id, failure.message());
            Err(failure.message().into())
        }
        other => Err(format!("Generation ended in unexpected state: {}", other.name()).into()),
    }
}
