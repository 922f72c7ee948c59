//! Mailroom CLI
//!
//! Direct access to the Mailroom tools without an MCP client: list tools,
//! call one with JSON arguments, convert a local attachment, or run the Gmail
//! auth flow that produces `token.json`.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mailroom_core::attachment::{self, AttachmentDescriptor};
use mailroom_core::config::Config;
use mailroom_core::gmail::GmailClient;
use mailroom_core::mcp::{get_tool_definitions, ToolHandler, ToolResult, ToolResultContent};
use mailroom_core::oauth::OAuthManager;

#[derive(Parser)]
#[command(name = "mailroom")]
#[command(about = "Mailroom - Gmail, MongoDB and Excel tools with attachment conversion")]
#[command(long_about = "Mailroom exposes Gmail, MongoDB and Excel tools to MCP clients \
(via mailroom-mcp) and directly from the command line.

QUICK START:
  1. Authorize Gmail:   mailroom auth
  2. List tools:        mailroom tools
  3. Call a tool:       mailroom call search_emails --args '{\"query\": \"has:attachment\"}'
  4. Convert a file:    mailroom convert ./report.xlsx

OUTPUT FORMAT:
  'call' prints the tool's result envelope as JSON and exits non-zero when isError is true.
  Add --human to print only the text content.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in human-readable format instead of JSON. Applies to all subcommands.
    #[arg(long, global = true)]
    human: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every tool with its input schema
    Tools,
    /// Call a tool with JSON arguments
    Call {
        /// Tool name, e.g. find_documents
        tool: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Run the attachment converter on a local file
    Convert {
        /// File to convert
        file: PathBuf,
        /// Declared MIME type; omit to infer from the extension
        #[arg(long)]
        mime_type: Option<String>,
        /// Where to write image or PDF output
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Authorize Gmail access and write token.json
    Auth {
        /// Authorization code; prompted for when omitted
        #[arg(long)]
        code: Option<String>,
        /// Re-authorize even when the stored token still works
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|_| {
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    });

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.general.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Tools => handle_tools(cli.human),
        Commands::Call { tool, args } => handle_call(config, &tool, &args, cli.human).await,
        Commands::Convert {
            file,
            mime_type,
            out,
        } => handle_convert(&file, mime_type.as_deref(), out.as_deref(), cli.human).await,
        Commands::Auth { code, force } => handle_auth(config, code, force).await,
    }
}

fn handle_tools(human: bool) -> Result<()> {
    let tools = get_tool_definitions();
    if human {
        for tool in &tools {
            println!("{:<20} {}", tool.name, tool.description);
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&tools)?);
    }
    Ok(())
}

/// Parse `--args`, which must be a JSON object
fn parse_arguments(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("--args is not valid JSON")?;
    if !value.is_object() {
        bail!("--args must be a JSON object");
    }
    Ok(value)
}

async fn handle_call(config: Config, tool: &str, raw_args: &str, human: bool) -> Result<()> {
    let arguments = parse_arguments(raw_args)?;
    let config = Arc::new(config);
    let services = mailroom_core::build_services(&config)?;
    let documents = services.documents.clone();
    let handler = ToolHandler::new(services, config);

    let started = std::time::Instant::now();
    info!("→ tools/call:{}", tool);
    let result = handler.dispatch(tool, &arguments).await;
    info!(
        "← tools/call:{} {} ({}ms)",
        tool,
        if result.is_error { "ERROR" } else { "OK" },
        started.elapsed().as_millis()
    );
    documents.close().await;

    print_result(&result, human)?;
    if result.is_error {
        std::process::exit(1);
    }
    Ok(())
}

fn print_result(result: &ToolResult, human: bool) -> Result<()> {
    if human {
        println!("{}", result.joined_text());
    } else {
        println!("{}", serde_json::to_string_pretty(result)?);
    }
    Ok(())
}

async fn handle_convert(
    file: &Path,
    mime_type: Option<&str>,
    out: Option<&Path>,
    human: bool,
) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let descriptor =
        AttachmentDescriptor::new(STANDARD.encode(&bytes), mime_type.unwrap_or_default())
            .with_filename(filename);
    info!("Converting {} as {}", file.display(), descriptor.kind().label());

    let blocks = tokio::task::spawn_blocking(move || attachment::normalize(&descriptor)).await??;

    for block in &blocks {
        match block {
            ToolResultContent::Text { text } => println!("{}", text),
            ToolResultContent::Image { data, mime_type } => {
                write_binary(data, mime_type, out, human)?
            }
            ToolResultContent::Resource { resource } => {
                let mime = resource.mime_type.as_deref().unwrap_or("application/octet-stream");
                match &resource.blob {
                    Some(blob) => write_binary(blob, mime, out, human)?,
                    None => println!("{}", resource.uri),
                }
            }
        }
    }
    Ok(())
}

/// Write a base64 block to `out`, or describe it when no path was given
fn write_binary(data: &str, mime_type: &str, out: Option<&Path>, human: bool) -> Result<()> {
    let bytes = STANDARD.decode(data).context("converter produced invalid base64")?;
    match out {
        Some(path) => {
            std::fs::write(path, &bytes)
                .with_context(|| format!("cannot write {}", path.display()))?;
            if human {
                println!("Wrote {} ({} bytes) to {}", mime_type, bytes.len(), path.display());
            } else {
                println!(
                    "{}",
                    serde_json::json!({
                        "mimeType": mime_type,
                        "bytes": bytes.len(),
                        "path": path.display().to_string()
                    })
                );
            }
        }
        None => println!("[{} output, {} bytes; pass --out to save it]", mime_type, bytes.len()),
    }
    Ok(())
}

/// Whether the auth flow has to run: forced, or the stored token is
/// missing or can no longer be refreshed
async fn needs_authorization(oauth: &OAuthManager, force: bool) -> Result<bool> {
    if force {
        return Ok(true);
    }
    match oauth.get_valid_token().await {
        Ok(_) => Ok(false),
        Err(e) if e.requires_reauth() => {
            info!("Authorization required: {}", e);
            Ok(true)
        }
        Err(e) => Err(e.into()),
    }
}

async fn handle_auth(config: Config, code: Option<String>, force: bool) -> Result<()> {
    let client = GmailClient::new(config.gmail.clone())?;
    let oauth = client.oauth().await?;

    if !needs_authorization(oauth, force).await? {
        println!(
            "Stored token at {} is valid; pass --force to re-authorize",
            oauth.token_provider().location()
        );
        return Ok(());
    }

    let code = match code {
        Some(code) => code,
        None => {
            println!("Open this URL in a browser and authorize access:\n");
            println!("{}\n", oauth.authorization_url()?);
            print!("Paste the authorization code: ");
            std::io::stdout().flush()?;

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim().to_string()
        }
    };

    if code.is_empty() {
        bail!("no authorization code given");
    }

    oauth.exchange_code(&code).await?;
    println!(
        "Token saved to {}",
        oauth.token_provider().location()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_call_args_parse() {
        let cli = Cli::try_parse_from([
            "mailroom",
            "call",
            "find_documents",
            "--args",
            r#"{"collection":"orders"}"#,
            "--human",
        ])
        .unwrap();
        assert!(cli.human);
        match cli.command {
            Commands::Call { tool, args } => {
                assert_eq!(tool, "find_documents");
                assert_eq!(parse_arguments(&args).unwrap()["collection"], "orders");
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn test_arguments_must_be_an_object() {
        assert!(parse_arguments("[1]").is_err());
        assert!(parse_arguments("{oops").is_err());
        assert!(parse_arguments("{}").unwrap().as_object().unwrap().is_empty());
    }

    const CLIENT_JSON: &str = r#"{"installed":{"client_id":"1.apps.googleusercontent.com","client_secret":"s","redirect_uris":["http://localhost"]}}"#;

    fn auth_config(dir: &Path) -> Config {
        std::fs::write(dir.join("credentials.json"), CLIENT_JSON).unwrap();
        let mut config = Config::default();
        config.gmail.credentials_path = dir.join("credentials.json");
        config.gmail.token_path = dir.join("token.json");
        config
    }

    #[test]
    fn test_auth_force_flag() {
        let cli = Cli::try_parse_from(["mailroom", "auth", "--force"]).unwrap();
        match cli.command {
            Commands::Auth { code, force } => {
                assert!(force);
                assert!(code.is_none());
            }
            _ => panic!("expected auth"),
        }
    }

    #[tokio::test]
    async fn test_auth_needed_only_without_usable_token() {
        let dir = tempfile::tempdir().unwrap();
        let client = GmailClient::new(auth_config(dir.path()).gmail).unwrap();
        let oauth = client.oauth().await.unwrap();

        assert!(needs_authorization(oauth, false).await.unwrap());

        let expiry = tomorrow_ms();
        std::fs::write(
            dir.path().join("token.json"),
            format!(r#"{{"access_token":"ya29.a","refresh_token":"1//r","expiry_date":{}}}"#, expiry),
        )
        .unwrap();
        assert!(!needs_authorization(oauth, false).await.unwrap());
        assert!(needs_authorization(oauth, true).await.unwrap());
    }

    /// An expiry a day past the current time, in epoch milliseconds
    fn tomorrow_ms() -> u128 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap();
        (now + std::time::Duration::from_secs(86_400)).as_millis()
    }

    #[test]
    fn test_write_binary_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        write_binary(&STANDARD.encode(b"\x89PNG"), "image/png", Some(&path), true).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG");
    }
}
