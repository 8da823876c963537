use anyhow::{Context, Result};
use dialoguer::{Input, Password};
use serde::de::DeserializeOwned;
use serde::Serialize;

mod api;
mod config;
mod error;
mod token;

use api::{ApiClient, ResourceClient};
use config::{Commands, Config, MovementAction, ResourceAction};
use error::ClientError;
use token::{TokenManager, TokenStore};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with the configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(api = %config.api_base_url, store = %config.token_store_path.display(), "Starting");

    let store = TokenStore::open(&config.token_store_path)?;
    let tokens = TokenManager::new(store, config.token_config())?;

    let client = ApiClient::new(
        tokens.clone(),
        config.api_base_url.clone(),
        config.http_request_timeout,
    )?
    .with_session_expired_hook(|| {
        eprintln!("Session expired. Run `stockdesk login` to sign in again.");
    });

    // Proactive refresh runs for the lifetime of the command.
    let maintenance = tokens.spawn_maintenance(config.maintenance_interval);

    let result = run_command(&client, command).await;

    maintenance.stop();

    if let Err(err) = result {
        if let ClientError::Api { fields, .. } = &err {
            for (field, messages) in fields {
                for message in messages {
                    eprintln!("  {}: {}", field, message);
                }
            }
        }
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    Ok(())
}

async fn run_command(client: &ApiClient, command: Commands) -> error::Result<()> {
    match command {
        Commands::Login { email } => {
            let email: String = match email {
                Some(email) => email,
                None => Input::new()
                    .with_prompt("Email")
                    .interact_text()
                    .context("Failed to read email")?,
            };

            let password: String = Password::new()
                .with_prompt("Password")
                .interact()
                .context("Failed to read password")?;

            let profile = api::auth::login(client, &email, &password).await?;
            println!("Logged in as {}", profile.email);
            Ok(())
        }

        Commands::Logout => {
            api::auth::logout(client);
            println!("Logged out.");
            Ok(())
        }

        Commands::Whoami => {
            let profile = api::auth::current_user(client).await?;
            print_json(&profile)
        }

        Commands::Products { action } => run_resource(client.products(), action).await,
        Commands::Brands { action } => run_resource(client.brands(), action).await,
        Commands::Categories { action } => run_resource(client.categories(), action).await,
        Commands::Suppliers { action } => run_resource(client.suppliers(), action).await,
        Commands::Stores { action } => run_resource(client.stores(), action).await,

        Commands::Users { action } => run_resource(client.users(), action).await,

        Commands::Movements { action } => run_movements(client, action).await,
    }
}

async fn run_resource<T: DeserializeOwned + Serialize>(
    resource: ResourceClient<'_, T>,
    action: ResourceAction,
) -> error::Result<()> {
    match action {
        ResourceAction::List { search, page } => {
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(search) = search {
                query.push(("search", search));
            }
            if let Some(page) = page {
                query.push(("page", page.to_string()));
            }
            let query: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();

            let page = resource.list(&query).await?;
            eprintln!("{} result(s) total", page.count);
            print_json(&page.results)
        }

        ResourceAction::Get { id } => print_json(&resource.retrieve(id).await?),

        ResourceAction::Create { data } => {
            let body = parse_body(&data)?;
            print_json(&resource.create(&body).await?)
        }

        ResourceAction::Update { id, data } => {
            let body = parse_body(&data)?;
            print_json(&resource.update(id, &body).await?)
        }

        ResourceAction::Delete { id } => {
            resource.delete(id).await?;
            println!("Deleted {}", id);
            Ok(())
        }
    }
}

async fn run_movements(client: &ApiClient, action: MovementAction) -> error::Result<()> {
    let movements = client.movements();

    match action {
        MovementAction::List { product, page } => {
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(product) = product {
                query.push(("product", product.to_string()));
            }
            if let Some(page) = page {
                query.push(("page", page.to_string()));
            }
            let query: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();

            let page = movements.list(&query).await?;
            eprintln!("{} result(s) total", page.count);
            print_json(&page.results)
        }

        MovementAction::Get { id } => print_json(&movements.retrieve(id).await?),

        MovementAction::Create { data } => {
            let body = parse_body(&data)?;
            print_json(&movements.create(&body).await?)
        }
    }
}

fn parse_body(data: &str) -> error::Result<serde_json::Value> {
    let value: serde_json::Value =
        serde_json::from_str(data).context("--data must be a valid JSON object")?;
    Ok(value)
}

fn print_json<T: Serialize>(value: &T) -> error::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{}", rendered);
    Ok(())
}
