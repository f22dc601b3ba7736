use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use feedwire::api::{ApiClient, Content, HttpTransport, Transport};
use feedwire::cache::{CacheLayer, CacheStorage, MemoryStorage, NoopStorage};
use feedwire::config::Config;
use feedwire::logging;
use feedwire::notify::Notifier;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "feedwire")]
#[command(about = "Fetch JSON feed APIs through an in-memory response cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/feedwire/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Log at debug level unless RUST_LOG is set
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// GET a JSON resource through the cache and print its `data` payload
  Get {
    uri: Url,
    /// Skip the cache and refetch
    #[arg(long)]
    force: bool,
    /// Issue the same request this many times
    #[arg(long, default_value_t = 1)]
    repeat: u32,
  },
  /// GET a raw page and print it
  Html { uri: Url },
  /// POST a form
  Post {
    uri: Url,
    /// Form field as key=value, repeatable
    #[arg(short, long = "form", value_parser = parse_pair)]
    fields: Vec<(String, String)>,
    /// Print the raw response instead of decoding the envelope
    #[arg(long)]
    raw: bool,
  },
}

fn parse_pair(s: &str) -> std::result::Result<(String, String), String> {
  s.split_once('=')
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;
  if args.verbose {
    config.log.level = "debug".to_string();
  }
  let _log_guard = logging::init(&config.log)?;

  let transport = HttpTransport::new(&config.http_settings())?;
  let notifier = Arc::new(Notifier::new());
  notifier.subscribe(|n| eprintln!("[{}] {}", n.kind, n.message));

  if config.cache.enabled {
    let cache = CacheLayer::new(MemoryStorage::new(), config.cache_settings())?;
    run(ApiClient::new(transport, cache, notifier), &config, args.command).await
  } else {
    let cache = CacheLayer::new(NoopStorage, config.cache_settings())?;
    run(ApiClient::new(transport, cache, notifier), &config, args.command).await
  }
}

async fn run<T: Transport, S: CacheStorage>(client: ApiClient<T, S>, config: &Config, command: Command) -> Result<()> {
  let cookies = Config::get_cookies();

  match command {
    Command::Get { uri, force, repeat } => {
      if repeat == 0 {
        return Err(eyre!("--repeat must be at least 1"));
      }
      for i in 0..repeat {
        let payload = client.get_data(&uri, force, &cookies).await?;
        if i == 0 {
          print_payload(payload)?;
        }
      }
      info!(stats = ?client.cache().stats()?, "cache stats");
    }
    Command::Html { uri } => {
      let text = client
        .get_text(&uri, &cookies, &config.http.requested_with)
        .await?;
      println!("{}", text);
    }
    Command::Post { uri, fields, raw } => {
      let content = Content::Form(fields);
      if raw {
        println!("{}", client.post_text(&uri, &content, &cookies).await?);
      } else {
        print_payload(client.post_data(&uri, &content, &cookies).await?)?;
      }
    }
  }

  client.shutdown().await;
  Ok(())
}

fn print_payload(payload: Option<Value>) -> Result<()> {
  match payload {
    Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
    None => eprintln!("(no data)"),
  }
  Ok(())
}
