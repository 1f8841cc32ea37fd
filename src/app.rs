//! Command dispatch for the `echoquill` binary.

use crate::auth::proxy::{self, ProxyState};
use crate::auth::{ExchangeClient, OAuthController, parse_callback_url};
use crate::cli::{Cli, Commands, PersonaCommands, SuggestCommands};
use crate::completion::HttpCompletionClient;
use crate::config::Config;
use crate::content::ContentFetcher;
use crate::error::EchoquillError;
use crate::pipeline::SuggestionPipeline;
use crate::store::{Identity, Store, StoredSession, Suggestion, SuggestionStatus};
use crate::workflow::{BuildProgress, PersonaWorkflow};
use anyhow::{Context, Result, bail};
use std::io::IsTerminal;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Login => run_login(&config).await,
        Commands::Status => run_status(&config).await,
        Commands::Logout => run_logout(&config).await,
        Commands::Proxy { port, host } => run_proxy(&config, host, port).await,
        Commands::Persona { persona_command } => match persona_command {
            PersonaCommands::Build => run_persona_build(&config).await,
        },
        Commands::Suggest { suggest_command } => run_suggest(&config, suggest_command).await,
    }
}

async fn require_login(store: &Store) -> Result<(Identity, StoredSession)> {
    let Some(identity) = store.current_identity().await? else {
        bail!("no linked account. Run `echoquill login` first.");
    };
    let Some(session) = store.current_session().await? else {
        bail!("stored session is missing. Run `echoquill login` again.");
    };
    Ok((identity, session))
}

fn completion_client(config: &Config) -> Result<HttpCompletionClient> {
    let Some(api_key) = config.completion.api_key.as_deref() else {
        bail!(
            "completion API key is not set. Set ECHOQUILL_COMPLETION_API_KEY or completion.api_key in config.toml."
        );
    };
    Ok(HttpCompletionClient::new(&config.completion, api_key))
}

fn parse_status(input: &str) -> Result<SuggestionStatus> {
    match input.trim().to_ascii_lowercase().as_str() {
        "pending" => Ok(SuggestionStatus::Pending),
        "approved" => Ok(SuggestionStatus::Approved),
        "rejected" => Ok(SuggestionStatus::Rejected),
        "posted" => Ok(SuggestionStatus::Posted),
        _ => bail!("Unknown status '{input}'. Use one of: pending, approved, rejected, posted"),
    }
}

/// Interactive OAuth login: print the authorization URL, then complete the
/// handshake from the pasted callback URL. The PKCE verifier only ever
/// lives in this process, so the paste must happen in the same run.
async fn run_login(config: &Config) -> Result<()> {
    let exchange = ExchangeClient::new(&config.proxy);
    let controller = OAuthController::new(&config.oauth, exchange)?;

    let request = controller.begin_authorization();
    println!("Open this URL in your browser and authorize access:");
    println!("\n  {}\n", request.url);
    println!(
        "After approving you will land on {}; copy the full URL from the address bar.",
        controller.redirect_uri()
    );

    if !std::io::stdin().is_terminal() {
        bail!("login is interactive; run it from a terminal");
    }
    let pasted: String = dialoguer::Input::<String>::new()
        .with_prompt("Paste the full callback URL")
        .interact_text()
        .context("failed to read callback URL from terminal")?;

    let params = parse_callback_url(&pasted)?;
    let success = controller
        .complete_authorization(&params.code, &params.state)
        .await?;

    let store = Store::open(&config.db_path()).await?;
    let identity = store.persist_login(&success.user, &success.tokens).await?;

    info!(identity = %identity.id, "login persisted");
    println!("Linked @{} ({}).", identity.username, identity.display_name);
    Ok(())
}

async fn run_status(config: &Config) -> Result<()> {
    let store = Store::open(&config.db_path()).await?;
    let Some(identity) = store.current_identity().await? else {
        println!("Not linked. Run `echoquill login` to connect an account.");
        return Ok(());
    };

    println!("Account:  @{} ({})", identity.username, identity.display_name);
    if identity.verified {
        println!("          verified");
    }
    if let Some(session) = store.current_session().await? {
        match session.expires_at {
            Some(expires_at) => println!("Session:  access token expires {expires_at}"),
            None => println!("Session:  access token without recorded expiry"),
        }
    }

    match store.persona(&identity.id).await? {
        Some(persona) => {
            println!(
                "Persona:  {} voice, {}% confidence",
                persona.tone, persona.confidence
            );
            println!("          topics: {}", persona.topics.join(", "));
            println!("          updated {}", persona.updated_at);
        }
        None => println!("Persona:  not built yet (`echoquill persona build`)"),
    }

    let suggestions = store.list_suggestions(&identity.id, None).await?;
    let pending = suggestions
        .iter()
        .filter(|s| s.status == SuggestionStatus::Pending)
        .count();
    println!(
        "Suggestions: {} total, {} pending review",
        suggestions.len(),
        pending
    );
    Ok(())
}

async fn run_logout(config: &Config) -> Result<()> {
    let store = Store::open(&config.db_path()).await?;
    if store.logout().await? {
        println!("Logged out. Stored tokens were discarded; nothing was revoked upstream.");
    } else {
        println!("No session to clear.");
    }
    Ok(())
}

async fn run_proxy(config: &Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if config.oauth.client_id.is_empty() {
        bail!("oauth.client_id is not configured. Set it in config.toml or ECHOQUILL_CLIENT_ID.");
    }
    let secret = proxy::secret_from_env()?;
    let state = ProxyState::new(&config.proxy, &config.oauth.client_id, &secret);

    let host = host.unwrap_or_else(|| config.proxy.host.clone());
    let port = port.unwrap_or(config.proxy.port);
    proxy::run_proxy(&host, port, state).await
}

async fn run_persona_build(config: &Config) -> Result<()> {
    let store = Store::open(&config.db_path()).await?;
    let (identity, session) = require_login(&store).await?;
    let completion = completion_client(config)?;
    let fetcher = ContentFetcher::new(&config.platform);
    let workflow = PersonaWorkflow::new(&completion, &fetcher, &store);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let (tx, mut rx) = tokio::sync::watch::channel(BuildProgress::default());
    let printer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let progress = *rx.borrow_and_update();
            println!("[{:>3}%] {}", progress.percent, progress.stage);
        }
    });

    println!(
        "Building persona for @{} (Ctrl+C cancels)...",
        identity.username
    );
    let result = workflow
        .build_persona(&identity, &session.access_token, &tx, &cancel)
        .await;
    drop(tx);
    let _ = printer.await;

    match result {
        Ok(persona) => {
            println!("\nVoice profile for @{}:", identity.username);
            println!("  tone:       {}", persona.tone);
            println!("  topics:     {}", persona.topics.join(", "));
            println!("  style:      {}", persona.interaction_style);
            println!("  identity:   {}", persona.identity_blurb);
            println!("  confidence: {}%", persona.confidence);
            Ok(())
        }
        Err(EchoquillError::Cancelled) => {
            println!("\nCancelled. No persona was saved.");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

async fn run_suggest(config: &Config, command: SuggestCommands) -> Result<()> {
    let store = Store::open(&config.db_path()).await?;

    match command {
        SuggestCommands::Run { per_query } => {
            let (identity, session) = require_login(&store).await?;
            let Some(persona) = store.persona(&identity.id).await? else {
                bail!("no persona yet. Run `echoquill persona build` first.");
            };
            let completion = completion_client(config)?;
            let fetcher = ContentFetcher::new(&config.platform);
            let pipeline = SuggestionPipeline::new(&completion, &fetcher, &store);

            let summary = pipeline
                .run(&persona, &session.access_token, per_query)
                .await?;

            println!(
                "Recorded {} suggestion(s) from {} queries: {} candidate(s) seen, {} draft(s) failed.",
                summary.recorded, summary.queries, summary.candidates_seen, summary.failed
            );
            if summary.fallback_queries > 0 {
                println!(
                    "{} of {} searches used locally generated stand-in content.",
                    summary.fallback_queries, summary.queries
                );
            }
            println!("Review with `echoquill suggest list`.");
            Ok(())
        }

        SuggestCommands::List { status } => {
            let Some(identity) = store.current_identity().await? else {
                bail!("no linked account. Run `echoquill login` first.");
            };
            let filter = status.as_deref().map(parse_status).transpose()?;
            let suggestions = store.list_suggestions(&identity.id, filter).await?;
            if suggestions.is_empty() {
                println!("No suggestions recorded.");
                return Ok(());
            }
            for suggestion in &suggestions {
                print_suggestion(suggestion);
            }
            Ok(())
        }

        SuggestCommands::Approve { id } => {
            let updated = store
                .update_suggestion_status(&id, SuggestionStatus::Approved)
                .await?;
            println!("Suggestion {} is now {}.", updated.id, updated.status);
            Ok(())
        }

        SuggestCommands::Reject { id } => {
            let updated = store
                .update_suggestion_status(&id, SuggestionStatus::Rejected)
                .await?;
            println!("Suggestion {} is now {}.", updated.id, updated.status);
            Ok(())
        }

        SuggestCommands::Post { id } => {
            let updated = store
                .update_suggestion_status(&id, SuggestionStatus::Posted)
                .await?;
            println!(
                "Suggestion {} marked {}. Copy the reply text when you publish it:",
                updated.id, updated.status
            );
            println!("  {}", updated.reply_text);
            Ok(())
        }
    }
}

fn print_suggestion(suggestion: &Suggestion) {
    println!(
        "{}  [{}]  @{}  confidence {}%",
        suggestion.id, suggestion.status, suggestion.target_author, suggestion.confidence
    );
    println!("    topic:  {}", suggestion.topic);
    println!("    target: {}", suggestion.target_text);
    println!("    reply:  {}", suggestion.reply_text);
}
