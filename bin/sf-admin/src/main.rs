//! Storefront Admin CLI
//!
//! Drives the admin data-sync layer against a running API:
//! - `list` loads one page of a resource
//! - `create` / `update` / `delete` dispatch sanitized, rate-limited mutations
//! - `buckets` prints the configured rate-limit buckets
//!
//! Configuration comes from an optional TOML file, `.env` and `SF_*` variables.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sf_client::ReqwestHttpClient;
use sf_common::{EntityId, LoadState, QueryKey, TracingNotifier};
use sf_config::AppConfig;
use sf_ratelimit::RateLimiterRegistry;
use sf_sync::{ListOptions, ListSynchronizer, MutationDispatcher, MutationOptions, SyncContext};

/// Storefront admin client
#[derive(Parser, Debug)]
#[command(name = "sf-admin")]
#[command(about = "List and mutate storefront admin resources")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "SF_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one page of a resource, e.g. `list /admin/users --search vip`
    List {
        endpoint: String,

        #[arg(long, default_value = "1")]
        page: u32,

        /// Page size (defaults to `lists.default_page_size`)
        #[arg(long)]
        limit: Option<u32>,

        #[arg(long, default_value = "")]
        search: String,
    },

    /// POST a JSON payload
    Create {
        endpoint: String,
        payload: String,

        #[command(flatten)]
        fields: MutationArgs,
    },

    /// PATCH a JSON payload onto `endpoint/id`
    Update {
        endpoint: String,
        id: String,
        payload: String,

        #[command(flatten)]
        fields: MutationArgs,
    },

    /// DELETE `endpoint/id`
    Delete {
        endpoint: String,
        id: String,

        #[command(flatten)]
        fields: MutationArgs,
    },

    /// Show rate-limit buckets
    Buckets,
}

#[derive(clap::Args, Debug)]
struct MutationArgs {
    /// Payload field validated as an email address (repeatable)
    #[arg(long = "email-field")]
    email_fields: Vec<String>,

    /// Entity name used in notifications
    #[arg(long, default_value = "Item")]
    label: String,
}

impl MutationArgs {
    fn options(&self, endpoint: &str) -> MutationOptions {
        let mut options = MutationOptions::new(endpoint)
            .invalidates(query_key_for(endpoint))
            .with_label(self.label.clone());
        for field in &self.email_fields {
            options = options.with_email_field(field.clone());
        }
        options
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    info!(base_url = %config.api.base_url, "Starting storefront admin client");

    let limiter = Arc::new(RateLimiterRegistry::new(config.rate_limits.clone()));
    if let Command::Buckets = args.command {
        return print_json(&json!(limiter.stats()));
    }

    let client = ReqwestHttpClient::new(config.api.clone()).context("Failed to build HTTP client")?;
    let ctx = SyncContext::new(Arc::new(client), limiter, Arc::new(TracingNotifier));

    match args.command {
        Command::List { endpoint, page, limit, search } => {
            let options = ListOptions::new(endpoint.as_str(), query_key_for(&endpoint))
                .with_page_size(limit.unwrap_or(config.lists.default_page_size))
                .with_search(search);
            let list: ListSynchronizer<Value> = ListSynchronizer::new(&ctx, options);

            if let LoadState::Failed(err) = list.set_page(page).await {
                return Err(err).with_context(|| format!("Failed to list {}", endpoint));
            }
            print_json(&json!({
                "data": list.items(),
                "pagination": list.meta(),
            }))
        }
        Command::Create { endpoint, payload, fields } => {
            let payload = parse_payload(&payload)?;
            let dispatcher: MutationDispatcher<Value> = MutationDispatcher::new(&ctx, fields.options(&endpoint));
            let created = dispatcher.create(&payload).await?;
            print_json(&created)
        }
        Command::Update { endpoint, id, payload, fields } => {
            let payload = parse_payload(&payload)?;
            let dispatcher: MutationDispatcher<Value> = MutationDispatcher::new(&ctx, fields.options(&endpoint));
            let updated = dispatcher.update(&parse_id(&id), &payload).await?;
            print_json(&updated)
        }
        Command::Delete { endpoint, id, fields } => {
            let dispatcher: MutationDispatcher<Value> = MutationDispatcher::new(&ctx, fields.options(&endpoint));
            dispatcher.remove(&parse_id(&id)).await?;
            Ok(())
        }
        Command::Buckets => Ok(()),
    }
}

/// `/admin/users` → `admin-users`
fn query_key_for(endpoint: &str) -> QueryKey {
    endpoint.trim_matches('/').replace('/', "-")
}

fn parse_id(raw: &str) -> EntityId {
    raw.parse::<i64>().map(EntityId::Number).unwrap_or_else(|_| EntityId::from(raw))
}

fn parse_payload(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).context("Payload is not valid JSON")
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
