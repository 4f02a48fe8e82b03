use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration. Every option can also be set through the environment
/// (or a `.env` file).
#[derive(Debug, Parser)]
#[command(name = "foodgram")]
#[command(about = "Recipe sharing backend", long_about = None)]
pub struct Config {
    #[arg(long, env = "FOODGRAM_ADDR", default_value = "0.0.0.0:8000")]
    pub addr: SocketAddr,

    #[arg(long, env = "FOODGRAM_DATA_FILE", default_value = "foodgram.json")]
    pub data_file: PathBuf,

    #[arg(long, env = "FOODGRAM_MEDIA_ROOT", default_value = "media")]
    pub media_root: PathBuf,

    /// Base URL used for short links and pagination links.
    #[arg(long, env = "FOODGRAM_PUBLIC_URL", default_value = "http://localhost:8000")]
    pub public_url: String,

    #[arg(long, env = "FOODGRAM_PAGE_SIZE", default_value_t = 6)]
    pub page_size: usize,

    #[arg(long, env = "FOODGRAM_BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(about = "Run the HTTP server (default)")]
    Serve,

    #[command(about = "Load ingredients from a JSON array of {name, measurement_unit}")]
    ImportIngredients {
        #[arg(help = "Path to the JSON file")]
        file: PathBuf,
    },

    #[command(about = "Load tags from a JSON array of {name, slug}")]
    ImportTags {
        #[arg(help = "Path to the JSON file")]
        file: PathBuf,
    },
}

/// Runtime settings shared with request handlers.
#[derive(Debug, Clone)]
pub struct Settings {
    pub public_url: String,
    pub page_size: usize,
    pub bcrypt_cost: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:8000".to_string(),
            page_size: 6,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Config {
    pub fn settings(&self) -> Settings {
        Settings {
            public_url: self.public_url.trim_end_matches('/').to_string(),
            page_size: self.page_size.max(1),
            bcrypt_cost: self.bcrypt_cost,
        }
    }
}
