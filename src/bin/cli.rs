use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SESSION_FILE: &str = ".foodgram-session";

#[derive(Parser)]
#[command(name = "foodgram")]
#[command(about = "A CLI client for the Foodgram recipe service", long_about = None)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "FOODGRAM_API_URL",
        default_value = "http://localhost:8000",
        help = "Base URL of the server"
    )]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Log in and store the session token")]
    Login {
        #[arg(short, long, help = "Account email")]
        email: String,

        #[arg(short, long, help = "Account password")]
        password: String,
    },

    #[command(about = "Revoke the session token and forget it")]
    Logout,

    #[command(about = "Show the logged-in user")]
    Whoami,

    #[command(about = "List recipes")]
    Recipes {
        #[arg(short, long, help = "Only recipes by this author id")]
        author: Option<i64>,

        #[arg(short, long = "tag", help = "Tag slug (repeatable)")]
        tags: Vec<String>,

        #[arg(long, help = "Only your favorites")]
        favorited: bool,

        #[arg(long, help = "Only recipes in your shopping cart")]
        in_cart: bool,

        #[arg(short, long, help = "Page size")]
        limit: Option<usize>,

        #[arg(short, long, help = "Number of recipes to skip")]
        offset: Option<usize>,
    },

    #[command(about = "Add a recipe to favorites")]
    Favorite { id: i64 },

    #[command(about = "Remove a recipe from favorites")]
    Unfavorite { id: i64 },

    #[command(about = "Add a recipe to the shopping cart")]
    CartAdd { id: i64 },

    #[command(about = "Remove a recipe from the shopping cart")]
    CartRemove { id: i64 },

    #[command(about = "Download the shopping list")]
    DownloadCart {
        #[arg(short, long, help = "Output file (defaults to the server-provided name)")]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Session {
    token: String,
    user_id: i64,
    username: String,
    email: String,
}

impl Session {
    fn save(&self) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(SESSION_FILE, json).context("Failed to write session file")?;
        Ok(())
    }

    fn load() -> Option<Self> {
        if Path::new(SESSION_FILE).exists() {
            let data = fs::read_to_string(SESSION_FILE).ok()?;
            serde_json::from_str(&data).ok()
        } else {
            None
        }
    }

    fn clear() -> Result<()> {
        if Path::new(SESSION_FILE).exists() {
            fs::remove_file(SESSION_FILE)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    auth_token: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: i64,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
}

#[derive(Debug, Deserialize)]
struct Tag {
    slug: String,
}

#[derive(Debug, Deserialize)]
struct Recipe {
    id: i64,
    name: String,
    author: UserResponse,
    tags: Vec<Tag>,
    cooking_time: u32,
    is_favorited: bool,
    is_in_shopping_cart: bool,
}

#[derive(Debug, Deserialize)]
struct ShortRecipe {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    count: usize,
    results: Vec<T>,
}

struct Api {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl Api {
    fn new(base_url: &str, session: Option<&Session>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: session.map(|s| s.token.clone()),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/api{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Token {token}")),
            None => builder,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_command(&cli.api_url, cli.command).await {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_command(api_url: &str, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email, password } => login(api_url, &email, &password).await,
        Commands::Logout => logout(api_url).await,
        Commands::Whoami => whoami(api_url).await,
        Commands::Recipes {
            author,
            tags,
            favorited,
            in_cart,
            limit,
            offset,
        } => {
            let session = Session::load();
            let api = Api::new(api_url, session.as_ref());
            if (favorited || in_cart) && session.is_none() {
                bail!("--favorited and --in-cart need a session. Use: foodgram login -e <email> -p <password>");
            }
            list_recipes(&api, author, tags, favorited, in_cart, limit, offset).await
        }
        Commands::Favorite { id } => {
            let api = Api::new(api_url, Some(&require_login()?));
            toggle(&api, Method::POST, &format!("/recipes/{id}/favorite/"), "⭐ Added to favorites").await
        }
        Commands::Unfavorite { id } => {
            let api = Api::new(api_url, Some(&require_login()?));
            toggle(&api, Method::DELETE, &format!("/recipes/{id}/favorite/"), "🗑️  Removed from favorites").await
        }
        Commands::CartAdd { id } => {
            let api = Api::new(api_url, Some(&require_login()?));
            toggle(&api, Method::POST, &format!("/recipes/{id}/shopping_cart/"), "🛒 Added to shopping cart").await
        }
        Commands::CartRemove { id } => {
            let api = Api::new(api_url, Some(&require_login()?));
            toggle(&api, Method::DELETE, &format!("/recipes/{id}/shopping_cart/"), "🗑️  Removed from shopping cart").await
        }
        Commands::DownloadCart { output } => {
            let api = Api::new(api_url, Some(&require_login()?));
            download_cart(&api, output).await
        }
    }
}

fn require_login() -> Result<Session> {
    Session::load()
        .ok_or_else(|| anyhow::anyhow!("You must be logged in. Use: foodgram login -e <email> -p <password>"))
}

/// Fails with the server's error body when the response is not a success.
async fn check(response: Response, action: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    bail!("{} ({}): {}", action, status, describe_error(&body))
}

/// Flattens `{"field": ["msg"]}` and `{"detail": "msg"}` bodies into one line.
fn describe_error(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    let Some(object) = value.as_object() else {
        return body.trim().to_string();
    };
    object
        .iter()
        .map(|(key, value)| {
            let messages = match value {
                serde_json::Value::Array(items) => items
                    .iter()
                    .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                    .collect::<Vec<_>>()
                    .join(" "),
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if key == "detail" || key == "non_field_errors" {
                messages
            } else {
                format!("{key}: {messages}")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

async fn login(api_url: &str, email: &str, password: &str) -> Result<()> {
    let api = Api::new(api_url, None);
    let response = api
        .request(Method::POST, "/auth/token/login/")
        .json(&LoginRequest { email, password })
        .send()
        .await?;
    let token: TokenResponse = check(response, "Login failed").await?.json().await?;

    let api = Api {
        token: Some(token.auth_token.clone()),
        ..api
    };
    let response = api.request(Method::GET, "/users/me/").send().await?;
    let me: UserResponse = check(response, "Failed to load profile").await?.json().await?;

    let session = Session {
        token: token.auth_token,
        user_id: me.id,
        username: me.username,
        email: me.email,
    };
    session.save()?;

    println!("✅ Logged in as {} ({})", session.username, session.email);
    Ok(())
}

async fn logout(api_url: &str) -> Result<()> {
    if let Some(session) = Session::load() {
        let api = Api::new(api_url, Some(&session));
        let response = api.request(Method::POST, "/auth/token/logout/").send().await?;
        // A token the server no longer knows is as good as revoked.
        if !response.status().is_success() && response.status() != reqwest::StatusCode::UNAUTHORIZED {
            check(response, "Logout failed").await?;
        }
    }
    Session::clear()?;
    println!("👋 Logged out");
    Ok(())
}

async fn whoami(api_url: &str) -> Result<()> {
    let Some(session) = Session::load() else {
        println!("❌ Not logged in");
        println!("💡 Use 'foodgram login -e <email> -p <password>' to log in");
        return Ok(());
    };

    let api = Api::new(api_url, Some(&session));
    let response = api.request(Method::GET, "/users/me/").send().await?;
    let me: UserResponse = check(response, "Failed to load profile").await?.json().await?;

    println!("👤 Logged in as: {}", me.username);
    println!("🆔 User ID: {}", me.id);
    println!("📧 Email: {}", me.email);
    if !me.first_name.is_empty() || !me.last_name.is_empty() {
        println!("   Name: {} {}", me.first_name, me.last_name);
    }
    Ok(())
}

async fn list_recipes(
    api: &Api,
    author: Option<i64>,
    tags: Vec<String>,
    favorited: bool,
    in_cart: bool,
    limit: Option<usize>,
    offset: Option<usize>,
) -> Result<()> {
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(author) = author {
        query.push(("author", author.to_string()));
    }
    for tag in tags {
        query.push(("tags", tag));
    }
    if favorited {
        query.push(("is_favorited", "1".to_string()));
    }
    if in_cart {
        query.push(("is_in_shopping_cart", "1".to_string()));
    }
    if let Some(limit) = limit {
        query.push(("limit", limit.to_string()));
    }
    if let Some(offset) = offset {
        query.push(("offset", offset.to_string()));
    }

    let response = api
        .request(Method::GET, "/recipes/")
        .query(&query)
        .send()
        .await?;
    let page: Page<Recipe> = check(response, "Failed to fetch recipes").await?.json().await?;

    if page.results.is_empty() {
        println!("📭 No recipes found.");
        return Ok(());
    }

    println!("\n📋 Recipes ({} of {})\n", page.results.len(), page.count);

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Author"),
        Cell::new("Minutes"),
        Cell::new("Tags"),
        Cell::new("Fav"),
        Cell::new("Cart"),
    ]));

    for recipe in page.results {
        let tags = recipe
            .tags
            .iter()
            .map(|t| t.slug.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(Row::new(vec![
            Cell::new(&recipe.id.to_string()),
            Cell::new(&recipe.name),
            Cell::new(&recipe.author.username),
            Cell::new(&recipe.cooking_time.to_string()),
            Cell::new(if tags.is_empty() { "-" } else { tags.as_str() }),
            Cell::new(if recipe.is_favorited { "⭐" } else { "" }),
            Cell::new(if recipe.is_in_shopping_cart { "🛒" } else { "" }),
        ]));
    }

    table.printstd();
    println!();

    Ok(())
}

async fn toggle(api: &Api, method: Method, path: &str, done: &str) -> Result<()> {
    let adding = method == Method::POST;
    let response = api.request(method, path).send().await?;
    let response = check(response, "Request failed").await?;
    if adding {
        let recipe: ShortRecipe = response.json().await?;
        println!("{}: {} (#{})", done, recipe.name, recipe.id);
    } else {
        println!("{}", done);
    }
    Ok(())
}

async fn download_cart(api: &Api, output: Option<PathBuf>) -> Result<()> {
    let response = api
        .request(Method::GET, "/recipes/download_shopping_cart/")
        .send()
        .await?;
    let response = check(response, "Failed to download shopping list").await?;

    let suggested = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split("filename=").nth(1))
        .map(|name| name.trim_matches('"').to_string());
    let path = output
        .or_else(|| suggested.map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("shopping_cart.txt"));

    let body = response.text().await?;
    if body.is_empty() {
        println!("🛒 Your shopping cart is empty.");
        return Ok(());
    }
    fs::write(&path, &body).with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✅ Shopping list saved to {}", path.display());
    println!("{}", body);
    Ok(())
}
