use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reelmart::types::Category;

/// Browse and post listings of the reels marketplace feed
#[derive(Parser)]
#[command(name = "reelmart")]
#[command(about = "Marketplace feed browser with single-video playback", long_about = None)]
pub struct Cli {
    /// Config file (defaults to config.toml in the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the category filters
    Categories,
    /// Print the feed for a category
    Feed {
        #[arg(short, long, default_value_t = Category::All)]
        category: Category,
        /// Read from the configured remote backend instead of the local store
        #[arg(long)]
        remote: bool,
    },
    /// Create or rename a seller profile in the local store
    AddProfile {
        id: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Publish a listing
    AddListing {
        #[arg(long)]
        seller: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        price: String,
        #[arg(long)]
        category: String,
        /// Hosted image url, repeatable
        #[arg(long = "image", required = true)]
        images: Vec<String>,
        #[arg(long)]
        video: Option<String>,
        #[arg(long)]
        remote: bool,
    },
    /// Upload an image file and print its hosted url
    UploadImage { path: PathBuf },
    /// Upload a video file and print its hosted url
    UploadVideo { path: PathBuf },
    /// Page through the feed with a logging player and print what would render
    Browse {
        #[arg(short, long, default_value_t = Category::All)]
        category: Category,
        #[arg(long)]
        remote: bool,
    },
}
