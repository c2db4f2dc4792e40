mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use reelmart::config::Config;
use reelmart::driver::LoggingPlayer;
use reelmart::listing::ListingDraft;
use reelmart::overlay::format_price;
use reelmart::screen::ScreenEvent;
use reelmart::types::Category;
use reelmart::upload::{HostedUploader, MediaUploader, ProgressFn};
use reelmart::visibility::ViewableItem;
use reelmart::Reelmart;

const VIEWPORT_WIDTH: f32 = 390.0;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reelmart=info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Categories => {
            for c in Category::ALL {
                println!("{c}");
            }
        }
        Commands::Feed { category, remote } => {
            let app = Reelmart::connect(config, remote).await?;
            app.feed().load(category).await?;
            let data = app.feed().snapshot().await;
            if data.items.is_empty() {
                println!("No listings in {category}");
            }
            for item in &data.items {
                let videos = item.media.iter().filter(|m| m.is_video()).count();
                println!(
                    "{:<36}  {:<10}  {:>9}  @{:<16}  {} media ({} video)  {}",
                    item.id,
                    item.category,
                    format_price(item.price),
                    item.seller_display_name,
                    item.media.len(),
                    videos,
                    item.title
                );
            }
        }
        Commands::AddProfile { id, name } => {
            let app = Reelmart::connect(config, false).await?;
            let db = app.local().context("profiles can only be written to the local store")?;
            db.upsert_profile(&id, name.as_deref()).await?;
            println!("Profile {id} saved");
        }
        Commands::AddListing { seller, title, description, price, category, images, video, remote } => {
            let app = Reelmart::connect(config, remote).await?;
            let draft = ListingDraft { title, description, price, category, images, video };
            let rec = app.publish_listing(&seller, &draft).await?;
            println!("Listing {} created", rec.id);
        }
        Commands::UploadImage { path } => {
            let bytes = tokio::fs::read(&path).await.with_context(|| format!("reading {}", path.display()))?;
            let url = HostedUploader::new(config.upload)?.upload_image(bytes).await?;
            println!("{url}");
        }
        Commands::UploadVideo { path } => {
            let bytes = tokio::fs::read(&path).await.with_context(|| format!("reading {}", path.display()))?;
            let progress: ProgressFn = Arc::new(|p| eprintln!("uploading... {p}%"));
            let url = HostedUploader::new(config.upload)?.upload_video(bytes, progress).await?;
            println!("{url}");
        }
        Commands::Browse { category, remote } => {
            let app = Reelmart::connect(config, remote).await?;
            app.feed().load(category).await?;
            browse(&app).await?;
        }
    }
    Ok(())
}

/// Scrolls through every item, swiping across each carousel, then prints the
/// render state of the last screen.
async fn browse(app: &Reelmart) -> Result<()> {
    let screen = app.new_screen().await;
    let items: Vec<usize> = screen.items().iter().map(|i| i.media.len()).collect();
    let (tx, rx) = mpsc::channel(32);
    let player = Arc::new(LoggingPlayer::with_latency(Duration::from_millis(20)));
    let running = tokio::spawn(screen.run(player, rx));

    for (index, slots) in items.iter().enumerate() {
        tx.send(ScreenEvent::ViewableItems(vec![ViewableItem::new(index, 1.0)])).await?;
        for slot in 0..*slots {
            let offset_x = slot as f32 * VIEWPORT_WIDTH;
            tx.send(ScreenEvent::CarouselSettled { item_index: index, offset_x, viewport_width: VIEWPORT_WIDTH }).await?;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
    drop(tx);

    let screen = running.await?;
    for d in screen.render() {
        println!(
            "{}#{} {:?} visible={} intent={:?} {}",
            d.item_id, d.slot, d.kind, d.carousel_visible, d.intent, d.url
        );
    }
    if let Some(overlay) = screen.active_item().and_then(|i| screen.overlay(i)) {
        println!("{} {} {} {}", overlay.title, overlay.price, overlay.seller, overlay.category);
        println!("{}", overlay.description.text);
    }
    Ok(())
}
