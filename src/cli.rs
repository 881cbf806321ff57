use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::{self, AppConfig, WebhookConfig};
use crate::dispatch::Dispatcher;
use crate::lookup::{self, LookupProvider, Selection};
use crate::model::params::InputItem;
use crate::transport::{ApiRequest, HttpTransport, Transport};
use crate::webhook::server::{self, AppState};
use crate::webhook::{EventFilter, FileWebhookStore, WebhookRegistrar};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run {
        resource: String,
        operation: String,
        input: Option<PathBuf>,
        continue_on_fail: bool,
    },
    Lookup {
        provider: LookupProvider,
        selection: Selection,
    },
    Fields {
        board: Option<u64>,
    },
    Webhook(WebhookAction),
    Serve,
    Test,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAction {
    Check,
    Create,
    Delete,
}

const RUN_USAGE: &str = "Usage: businessmap run <resource> <operation> [-i <items.json>] [--continue-on-fail]\n\nExamples:\n  businessmap run mainCard get -i items.json\n  echo '[{\"params\":{\"board_id\":3}}]' | businessmap run mainCard getAllCardsPerBoard";

const LOOKUP_USAGE: &str = "Usage: businessmap lookup <provider> [--board N] [--workflow N] [--workspace N] [--card N] [--filter TEXT]";

const WEBHOOK_USAGE: &str = "Usage: businessmap webhook <check|create|delete>";

pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some(first) = args.first() else {
        return Ok(Command::Help);
    };
    let rest = &args[1..];

    match first.as_str() {
        "run" => parse_run_args(rest),
        "lookup" => parse_lookup_args(rest),
        "fields" => {
            let selection = parse_selection(rest)?;
            Ok(Command::Fields {
                board: selection.board,
            })
        }
        "webhook" => parse_webhook_args(rest),
        "serve" => Ok(Command::Serve),
        "test" => Ok(Command::Test),
        "help" | "-h" | "--help" => Ok(Command::Help),
        other => bail!("Unknown command: {other}\n\nRun `businessmap help` for usage."),
    }
}

/// Parse `run` arguments.
///
/// Supported forms:
///   businessmap run cards comment -i items.json
///   businessmap run cards comment --input items.json --continue-on-fail
pub fn parse_run_args(args: &[String]) -> Result<Command> {
    let mut positional: Vec<String> = Vec::new();
    let mut input = None;
    let mut continue_on_fail = false;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "-i" | "--input" => {
                i += 1;
                if i < args.len() {
                    input = Some(PathBuf::from(&args[i]));
                } else {
                    bail!("Missing value for -i/--input flag");
                }
            }
            "--continue-on-fail" => continue_on_fail = true,
            _ => positional.push(args[i].clone()),
        }
        i += 1;
    }

    let [resource, operation] = positional.as_slice() else {
        bail!("{RUN_USAGE}");
    };

    Ok(Command::Run {
        resource: resource.clone(),
        operation: operation.clone(),
        input,
        continue_on_fail,
    })
}

pub fn parse_lookup_args(args: &[String]) -> Result<Command> {
    let Some(name) = args.first() else {
        bail!("{LOOKUP_USAGE}\n\nProviders: {}", provider_names());
    };
    let Some(provider) = LookupProvider::parse(name) else {
        bail!("Unknown lookup provider: {name}\n\nProviders: {}", provider_names());
    };
    Ok(Command::Lookup {
        provider,
        selection: parse_selection(&args[1..])?,
    })
}

fn parse_webhook_args(args: &[String]) -> Result<Command> {
    let action = match args.first().map(String::as_str) {
        Some("check") => WebhookAction::Check,
        Some("create") => WebhookAction::Create,
        Some("delete") => WebhookAction::Delete,
        _ => bail!("{WEBHOOK_USAGE}"),
    };
    Ok(Command::Webhook(action))
}

fn parse_selection(args: &[String]) -> Result<Selection> {
    let mut selection = Selection::default();
    let mut i = 0;

    while i < args.len() {
        let flag = args[i].as_str();
        i += 1;
        let Some(value) = args.get(i) else {
            bail!("Missing value for {flag} flag");
        };
        match flag {
            "--board" => selection.board = Some(parse_id(flag, value)?),
            "--workflow" => selection.workflow = Some(parse_id(flag, value)?),
            "--workspace" => selection.workspace = Some(parse_id(flag, value)?),
            "--card" => selection.card = Some(parse_id(flag, value)?),
            "--filter" => selection.filter = Some(value.clone()),
            other => bail!("Unknown flag: {other}\n\n{LOOKUP_USAGE}"),
        }
        i += 1;
    }

    Ok(selection)
}

fn parse_id(flag: &str, value: &str) -> Result<u64> {
    match value.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => bail!("Invalid value for {flag}: {value} (expected a positive number)"),
    }
}

fn provider_names() -> String {
    LookupProvider::ALL
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Items come as a JSON array of `{params, binary}` objects. A single object
/// is one item; empty input runs once with no parameters.
pub fn parse_items(raw: &str) -> Result<Vec<InputItem>> {
    if raw.trim().is_empty() {
        return Ok(vec![InputItem::default()]);
    }
    let value: Value = serde_json::from_str(raw).context("Input items are not valid JSON")?;
    match value {
        Value::Array(_) => serde_json::from_value(value).context("Invalid input item"),
        Value::Object(_) => Ok(vec![serde_json::from_value(value).context("Invalid input item")?]),
        _ => bail!("Input items must be a JSON array or object"),
    }
}

fn read_items(path: Option<&Path>) -> Result<Vec<InputItem>> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read items from {}", path.display()))?,
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read items from stdin")?;
            raw
        }
    };
    parse_items(&raw)
}

fn transport(config: &AppConfig) -> Result<Arc<dyn Transport>> {
    let credential = config.credential()?;
    Ok(Arc::new(HttpTransport::new(credential)))
}

fn webhook_config(config: &AppConfig) -> Result<WebhookConfig> {
    config
        .webhook
        .clone()
        .context("No [webhook] section configured in ~/.businessmap/config.toml")
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn execute(command: Command) -> Result<()> {
    if command == Command::Help {
        print_help();
        return Ok(());
    }

    let config = config::load_config()?;

    match command {
        Command::Run {
            resource,
            operation,
            input,
            continue_on_fail,
        } => {
            let items = read_items(input.as_deref())?;
            let dispatcher = Dispatcher::new(transport(&config)?);
            match dispatcher
                .execute(&resource, &operation, &items, continue_on_fail)
                .await
            {
                Ok(records) => print_json(&records),
                Err(err) => bail!("{}\n{}", err.message, err.description),
            }
        }
        Command::Lookup {
            provider,
            selection,
        } => {
            let transport = transport(&config)?;
            let options = lookup::lookup(provider, transport.as_ref(), &selection)
                .await
                .with_context(|| format!("Failed to load {}", provider.as_str()))?;
            print_json(&options)
        }
        Command::Fields { board } => {
            let transport = transport(&config)?;
            let schema = lookup::custom_field_schema(transport.as_ref(), board)
                .await
                .context("Failed to load custom fields")?;
            print_json(&schema)
        }
        Command::Webhook(action) => {
            let webhook = webhook_config(&config)?;
            let transport = transport(&config)?;
            let store = FileWebhookStore::new();
            let registrar = WebhookRegistrar::new(
                transport.as_ref(),
                &store,
                webhook.public_url.clone(),
                webhook.board_id,
                webhook.authenticate,
            );
            match action {
                WebhookAction::Check => {
                    let found = registrar.check_exists().await?;
                    println!(
                        "{}",
                        if found { "Webhook is registered" } else { "No webhook registered" }
                    );
                }
                WebhookAction::Create => {
                    registrar.create().await?;
                    println!("Webhook created for {}", registrar.url());
                }
                WebhookAction::Delete => {
                    if registrar.delete().await? {
                        println!("Webhook deleted");
                    } else {
                        println!("No webhook to delete");
                    }
                }
            }
            Ok(())
        }
        Command::Serve => {
            let webhook = webhook_config(&config)?;
            let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
            tokio::spawn(async move {
                while let Some(payload) = rx.recv().await {
                    println!("{payload}");
                }
            });
            let state = AppState {
                store: Arc::new(FileWebhookStore::new()),
                registration_key: webhook.public_url.clone(),
                filter: EventFilter::new(&webhook.events),
                triggered: tx,
            };
            server::serve(&webhook.bind, state)
                .await
                .with_context(|| format!("Webhook server on {} failed", webhook.bind))
        }
        Command::Test => {
            let transport = transport(&config)?;
            transport
                .request(ApiRequest::get("/me"))
                .await
                .context("Credential test failed")?;
            println!("Credentials OK");
            Ok(())
        }
        Command::Help => Ok(()),
    }
}

pub fn print_help() {
    println!("businessmap — Businessmap (Kanbanize) integration node\n");
    println!("USAGE:");
    println!("  businessmap run <resource> <operation>  Run an operation for each input item");
    println!("  businessmap lookup <provider>           List selectable options");
    println!("  businessmap fields --board N            Show the custom-field schema of a board");
    println!("  businessmap webhook <check|create|delete>");
    println!("                                          Manage the webhook subscription");
    println!("  businessmap serve                       Receive webhook deliveries");
    println!("  businessmap test                        Verify the configured credentials");
    println!();
    println!("RUN OPTIONS:");
    println!("  -i, --input <file>    Items as a JSON array (default: stdin)");
    println!("  --continue-on-fail    Emit error records instead of stopping");
    println!();
    println!("LOOKUP OPTIONS:");
    println!("  --board N  --workflow N  --workspace N  --card N  --filter TEXT");
    println!();
    println!("Providers: {}", provider_names());
}
