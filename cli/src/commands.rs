//! Subcommand handlers

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use muni_core::{
    Client, Config, Database, DocumentQuery, Navigator, SessionStart, SignUpOutcome, UploadFile,
    UploadOutcome,
};
use muni_session::{decode_claims, token_fingerprint};
use std::sync::Arc;

use crate::cli::{Cli, Commands, ConfigAction, DocumentsAction};

/// Tells the user the session is gone instead of opening a sign-in page
struct SignInNotice;

impl Navigator for SignInNotice {
    fn redirect_to_sign_in(&self) {
        tracing::debug!("Sign-in required");
        eprintln!("Session ended. Sign in again with `muni signin`.");
    }
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir {
        config.database_path = dir.join("muni.db");
    }
    if cli.api_base_url.is_some() {
        config.api_base_url = cli.api_base_url;
    }

    if let Commands::Config { action } = cli.command {
        return run_config(config, action);
    }

    let client = Client::with_navigator(config, Arc::new(SignInNotice))
        .context("failed to initialize client")?;

    let result = run(&client, cli.command).await;
    client.shutdown();
    result
}

async fn run(client: &Client, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Signup(credentials) => {
            match client
                .api()
                .sign_up(&credentials.email, &credentials.password)
                .await?
            {
                SignUpOutcome::SignedIn(_) => println!("Account created. Signed in."),
                SignUpOutcome::RegisteredSignInRequired => {
                    println!("Account created. Sign in with `muni signin`.")
                }
            }
        }
        Commands::Signin(credentials) => {
            client
                .api()
                .sign_in(&credentials.email, &credentials.password)
                .await?;
            println!("Signed in.");
        }
        Commands::Logout => {
            client.session().logout();
        }
        Commands::Status => print_status(client)?,
        Commands::Documents { action } => {
            require_session(client).await?;
            run_documents(client, action).await?;
        }
        Commands::Search { query } => {
            require_session(client).await?;
            let answer = client.api().search(&query.join(" ")).await?;
            println!("{}", answer.answer);
            if !answer.sources.is_empty() {
                println!();
                println!("Fuentes:");
                for source in &answer.sources {
                    println!("  - {}", source.display_name());
                }
            }
        }
        Commands::Config { action } => run_config(client.config().clone(), action)?,
    }

    Ok(())
}

async fn require_session(client: &Client) -> anyhow::Result<()> {
    match client.start().await? {
        SessionStart::Authenticated(schedule) => {
            tracing::debug!(schedule = ?schedule, "Session restored");
            Ok(())
        }
        SessionStart::Unauthenticated => bail!("not signed in"),
    }
}

async fn run_documents(client: &Client, action: DocumentsAction) -> anyhow::Result<()> {
    let api = client.api();

    match action {
        DocumentsAction::List {
            query,
            status,
            sort,
        } => {
            let documents = api
                .list_documents(&DocumentQuery {
                    q: query,
                    status,
                    sort,
                })
                .await?;

            if documents.is_empty() {
                println!("No hay documentos.");
            }
            for doc in &documents {
                println!(
                    "{:>6}  {:<10}  {:<25}  {}",
                    doc.id(),
                    doc.display_status().label(),
                    doc.uploaded_at.as_deref().unwrap_or("-"),
                    doc.display_name()
                );
            }
        }
        DocumentsAction::Upload { path } => {
            let file = UploadFile::from_path(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            match api.upload_document(file).await? {
                UploadOutcome::Accepted => println!("Uploaded. Processing in the background."),
                UploadOutcome::Processed { failed } if failed.is_empty() => {
                    println!("Uploaded and processed.")
                }
                UploadOutcome::Processed { failed } => {
                    bail!("some files failed: {}", failed.join(", "))
                }
            }
        }
        DocumentsAction::Url { id } => match api.document_url(&id).await? {
            Some(url) => println!("{url}"),
            None => bail!("document {id} has no public URL"),
        },
        DocumentsAction::Summarize { id } => {
            println!("{}", api.summarize_document(&id).await?);
        }
    }

    Ok(())
}

fn print_status(client: &Client) -> anyhow::Result<()> {
    println!("Backend:  {}", client.api_base());
    println!("Database: {}", client.config().database_path.display());

    let tokens = client.session().vault().load()?;
    let Some(access_token) = tokens.usable_access_token() else {
        println!("Session:  signed out");
        return Ok(());
    };

    println!("Session:  signed in (token {})", token_fingerprint(access_token));

    let expiry = decode_claims(access_token)
        .and_then(|claims| claims.expires_at_millis())
        .and_then(DateTime::<Utc>::from_timestamp_millis);
    match expiry {
        Some(at) if at <= Utc::now() => println!("Expires:  {} (expired)", at.to_rfc3339()),
        Some(at) => println!("Expires:  {}", at.to_rfc3339()),
        None => println!("Expires:  unknown"),
    }
    println!(
        "Refresh:  {}",
        if tokens.refresh_token.is_some() {
            "available"
        } else {
            "none"
        }
    );

    Ok(())
}

fn run_config(config: Config, action: ConfigAction) -> anyhow::Result<()> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = Database::open(&config.database_path)?;

    match action {
        ConfigAction::SetBaseUrl { url } => {
            let base = Config::save_api_base_url(&db, &url)?;
            println!("Saved backend URL {base}");
            if config.api_base_url.is_some() {
                println!("Note: MUNI_API_BASE_URL / --api-base-url still take precedence.");
            }
        }
        ConfigAction::Show => {
            println!("Backend:  {}", config.resolve_api_base(&db)?);
            println!("Database: {}", config.database_path.display());
            println!("Timeout:  {}s", config.request_timeout_secs);
        }
    }

    Ok(())
}
