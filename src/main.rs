//! CLI for linepub
//!
//! Subcommands:
//! - `publish`: publish stdin (or a file) line by line to the configured topic
//! - `generate`: print synthetic order records, ready to pipe into `publish`
//! - `create-topic`: create the configured topic if it does not exist
//! - `consume`: print what the broker delivers on a topic (WebSocket broker only)

use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use config::ConfigError;
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

use linepub::broker::{BrokerClient, DeliveryReports, TopicAdmin, TopicSpec, ensure_topic};
use linepub::config::{Backend, Settings, load_config_from, validate};
use linepub::generator::OrderGenerator;
use linepub::persistence::DeadLetterStore;
use linepub::publisher::Publisher;
use linepub::shutdown::Shutdown;
use linepub::transport::{WsProducer, WsSubscriber};
use linepub::utils::{Result, logging};

#[cfg(feature = "kafka")]
use linepub::transport::KafkaProducer;

#[derive(Parser)]
#[command(name = "linepub", version, about = "Reliable line publisher")]
struct Cli {
    /// Configuration file (default: config/default.* if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error (overrides log.level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish newline-delimited messages; an empty line ends the input
    Publish {
        /// Read messages from this file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        brokers: Option<String>,
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Write COUNT order records to stdout, followed by an empty line
    Generate { count: usize },
    /// Create the topic if it does not exist yet
    CreateTopic {
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        partitions: Option<u32>,
        #[arg(long)]
        replication_factor: Option<u32>,
    },
    /// Print messages delivered on a topic
    Consume {
        #[arg(long)]
        topic: Option<String>,
        /// Stop after this many messages
        #[arg(long)]
        max_messages: Option<u64>,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start the async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let code = runtime.block_on(run(cli));
    // a pending stdin read cannot be cancelled and would hold up a normal shutdown
    runtime.shutdown_background();
    code
}

async fn run(cli: Cli) -> ExitCode {
    let settings = match load_config_from(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init(cli.log_level.as_deref().unwrap_or("info"));
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(cli.log_level.as_deref().unwrap_or(&settings.log.level));

    let result = match cli.command {
        Command::Publish {
            input,
            topic,
            brokers,
            max_retries,
        } => {
            let mut settings = settings;
            if let Some(topic) = topic {
                settings.topic.name = topic;
            }
            if let Some(brokers) = brokers {
                settings.broker.brokers = brokers;
            }
            if let Some(max_retries) = max_retries {
                settings.publisher.max_retries = max_retries;
            }
            run_publish(settings, input).await
        }
        Command::Generate { count } => run_generate(count),
        Command::CreateTopic {
            topic,
            partitions,
            replication_factor,
        } => {
            let mut settings = settings;
            if let Some(topic) = topic {
                settings.topic.name = topic;
            }
            if let Some(partitions) = partitions {
                settings.topic.partitions = partitions;
            }
            if let Some(replication_factor) = replication_factor {
                settings.topic.replication_factor = replication_factor;
            }
            run_create_topic(settings).await
        }
        Command::Consume {
            topic,
            max_messages,
        } => {
            let mut settings = settings;
            if let Some(topic) = topic {
                settings.topic.name = topic;
            }
            run_consume(settings, max_messages).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(feature = "kafka"))]
fn kafka_unavailable() -> linepub::utils::LinepubError {
    let message = "broker.backend = kafka requires building with the `kafka` feature";
    ConfigError::Message(message.to_string()).into()
}

async fn run_publish(settings: Settings, input: Option<PathBuf>) -> Result<()> {
    validate(&settings)?;

    match settings.broker.backend {
        Backend::WebSocket => {
            let (producer, reports) = WsProducer::connect(&settings.broker).await?;
            publish_with(producer, reports, &settings, input).await
        }
        #[cfg(feature = "kafka")]
        Backend::Kafka => {
            let (producer, reports) = KafkaProducer::connect(&settings.broker).await?;
            publish_with(producer, reports, &settings, input).await
        }
        #[cfg(not(feature = "kafka"))]
        Backend::Kafka => Err(kafka_unavailable()),
    }
}

async fn publish_with<B>(
    broker: B,
    reports: DeliveryReports,
    settings: &Settings,
    input: Option<PathBuf>,
) -> Result<()>
where
    B: BrokerClient + TopicAdmin,
{
    let spec = TopicSpec::from(&settings.topic);
    let status = ensure_topic(&broker, &spec, settings.topic.create_if_missing).await?;
    info!("Topic '{}' ready ({status:?})", spec.name);

    let mut publisher = Publisher::new(
        broker,
        reports,
        settings.topic.name.as_str(),
        settings.publisher.clone(),
    );
    if let Some(path) = &settings.publisher.dead_letter_path {
        let store = DeadLetterStore::open(path, settings.publisher.dead_letter_max_per_topic)?;
        info!("Failed messages will be kept in {path}");
        publisher = publisher.with_dead_letters(store);
    }

    let shutdown = Shutdown::on_ctrl_c();
    let stats = match input {
        Some(path) => {
            let file = tokio::fs::File::open(&path).await?;
            info!("Publishing {} to '{}'", path.display(), spec.name);
            publisher.publish_all(BufReader::new(file), shutdown).await
        }
        None => {
            info!("Publishing stdin to '{}'", spec.name);
            publisher
                .publish_all(BufReader::new(tokio::io::stdin()), shutdown)
                .await
        }
    };

    info!("Publishing finished: {stats}");
    Ok(())
}

fn run_generate(count: usize) -> Result<()> {
    let stdout = BufWriter::new(io::stdout().lock());
    OrderGenerator::new(rand::rng()).write_records(count, stdout)?;
    Ok(())
}

async fn run_create_topic(settings: Settings) -> Result<()> {
    validate(&settings)?;
    let spec = TopicSpec::from(&settings.topic);

    match settings.broker.backend {
        Backend::WebSocket => {
            let (producer, _reports) = WsProducer::connect(&settings.broker).await?;
            let status = ensure_topic(&producer, &spec, true).await;
            producer.close().await;
            let status = status?;
            info!("Topic '{}': {status:?}", spec.name);
        }
        #[cfg(feature = "kafka")]
        Backend::Kafka => {
            let (producer, _reports) = KafkaProducer::connect(&settings.broker).await?;
            let status = ensure_topic(&producer, &spec, true).await?;
            info!("Topic '{}': {status:?}", spec.name);
        }
        #[cfg(not(feature = "kafka"))]
        Backend::Kafka => return Err(kafka_unavailable()),
    }
    Ok(())
}

async fn run_consume(settings: Settings, max_messages: Option<u64>) -> Result<()> {
    if settings.broker.backend != Backend::WebSocket {
        let message = "consume only supports the websocket backend".to_string();
        return Err(ConfigError::Message(message).into());
    }

    let mut subscriber = WsSubscriber::connect(&settings.broker, &settings.topic.name).await?;
    let mut shutdown = Shutdown::on_ctrl_c();
    let mut stdout = tokio::io::stdout();
    let mut received: u64 = 0;

    loop {
        if max_messages.is_some_and(|max| received >= max) {
            break;
        }
        let next = tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            next = subscriber.next_delivery() => next?,
        };
        let Some(delivery) = next else {
            info!("Broker closed the connection");
            break;
        };

        stdout.write_all(delivery.payload.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        received += 1;
    }

    info!("Received {received} message(s) from '{}'", subscriber.topic());
    if let Err(e) = subscriber.close().await {
        warn!("Failed to close subscription cleanly: {e}");
    }
    Ok(())
}
