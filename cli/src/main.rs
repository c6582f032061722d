use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use clap::{Parser, Subcommand};
use cluster_session::prep::path_to_uri;
use cluster_session::{
    photo_dhash, ClusterMode, ClusterSession, Collaborators, FolderAlbumSource, FolderPhotoSource, GroupView,
    ImageCodec, OfflineGeocoder, SessionConfig,
};
use photo_clustering::{hamming_distance, BurstStats, Group, HashGrid, PhotoRecord};
use rayon::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "photo-clusters")]
#[command(about = "Group a folder of photos by content, place, day, burst or album")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Group the photos of a folder and print the groups
    Group {
        /// Folder containing images; its subfolders are treated as albums
        #[arg(short, long)]
        path: PathBuf,

        /// semantic, location, day, day_location, bursts, duplicates or albums
        #[arg(short, long, default_value = "bursts")]
        mode: ClusterMode,

        /// Maximum time gap between shots of one burst (seconds)
        #[arg(long)]
        gap_secs: Option<i64>,

        /// Offset of local time from UTC used for days and titles (minutes)
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        utc_offset_minutes: i32,

        /// Number of newest photos to load
        #[arg(long)]
        page_size: Option<usize>,

        /// Write the groups to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the perceptual hash of each image as 16 hex digits
    Hash {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Also list pairs of files within this Hamming distance
        #[arg(long)]
        threshold: Option<u32>,
    },
}

struct GroupOptions {
    path: PathBuf,
    mode: ClusterMode,
    gap_secs: Option<i64>,
    utc_offset_minutes: i32,
    page_size: Option<usize>,
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Group {
            path,
            mode,
            gap_secs,
            utc_offset_minutes,
            page_size,
            output,
        } => {
            let options = GroupOptions {
                path,
                mode,
                gap_secs,
                utc_offset_minutes,
                page_size,
                output,
            };
            let groups = group_folder(&options)?;
            print_groups(options.mode, &groups);
            Ok(())
        }
        Commands::Hash { files, threshold } => hash_files(&files, threshold),
    }
}

fn utc_offset(minutes: i32) -> Result<FixedOffset> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .with_context(|| format!("UTC offset out of range: {} minutes", minutes))
}

fn session_config(options: &GroupOptions) -> SessionConfig {
    let mut config = SessionConfig::default();
    if let Some(gap) = options.gap_secs {
        config.burst_gap_secs = gap;
    }
    if let Some(page_size) = options.page_size {
        config.page_size = page_size;
    }
    config
}

/// Run a session over a folder and return the groups for the chosen mode
fn group_folder(options: &GroupOptions) -> Result<Vec<GroupView>> {
    let tz = utc_offset(options.utc_offset_minutes)?;
    let codec = Arc::new(ImageCodec::new()?);
    let sources = Collaborators {
        photos: Arc::new(FolderPhotoSource::new(&options.path, tz)?),
        transform: codec.clone(),
        decoder: codec,
        geocoder: Arc::new(OfflineGeocoder),
        faces: None,
        albums: Some(Arc::new(FolderAlbumSource::new(&options.path, tz)?)),
    };

    let session = ClusterSession::new(session_config(options), sources, tz);
    let count = session.bootstrap_photos()?;
    info!("Loaded {} photos from {}", count, options.path.display());

    if options.mode == ClusterMode::Semantic {
        warn!("No classifier is available; every photo stays unclassified");
    }

    session.prepare(options.mode);
    if let Some(progress) = session.wait() {
        info!(
            "Background passes done: {} items, {} failed",
            progress.completed_items, progress.failed_items
        );
    }

    let groups = session.groups(options.mode);

    if let Some(output_path) = &options.output {
        let json = serde_json::to_string_pretty(&groups).context("Failed to serialize groups to JSON")?;
        std::fs::write(output_path, json)
            .with_context(|| format!("Failed to write output to {}", output_path.display()))?;
        info!("Groups saved to {}", output_path.display());
    }

    Ok(groups)
}

fn print_groups(mode: ClusterMode, groups: &[GroupView]) {
    println!("\n📈 {} GROUPS", mode.as_str().to_uppercase());
    println!("==================");

    let total: usize = groups.iter().map(|g| g.len()).sum();
    println!("Groups: {}", groups.len());
    println!("Photos in groups: {}", total);

    for group in groups {
        println!("\n{} ({})", group.title, group.key);
        println!("  📸 Photos: {}", group.len());

        if matches!(mode, ClusterMode::Bursts | ClusterMode::Duplicates) {
            let borrowed = Group::new(group.key.as_str(), group.title.as_str(), group.items.iter().collect());
            let stats = BurstStats::of(&borrowed);
            println!("  ⏱️  Duration: {}s", stats.duration_secs);
            println!("  ⚡ Avg gap: {:.1}s", stats.avg_gap_secs);
        }

        for photo in group.items.iter().take(3) {
            println!("    {}", photo.id);
        }
        if group.len() > 3 {
            println!("    ... and {} more", group.len() - 3);
        }
    }
}

/// Pairs of inputs whose fingerprints are within `threshold`
fn similar_pairs<'a>(hashed: &'a [(PathBuf, u64)], threshold: u32) -> Vec<(&'a Path, &'a Path, u32)> {
    let mut pairs = Vec::new();
    for (i, (a, ha)) in hashed.iter().enumerate() {
        for (b, hb) in &hashed[i + 1..] {
            let distance = hamming_distance(*ha, *hb);
            if distance <= threshold {
                pairs.push((a.as_path(), b.as_path(), distance));
            }
        }
    }
    pairs
}

fn hash_files(files: &[PathBuf], threshold: Option<u32>) -> Result<()> {
    let codec = ImageCodec::new()?;
    let grid = HashGrid::default();

    let results: Vec<_> = files
        .par_iter()
        .map(|path| {
            let photo = PhotoRecord::new(path.display().to_string(), path_to_uri(path), 0, 0);
            (path, photo_dhash(&photo, grid, &codec, &codec))
        })
        .collect();

    let mut hashed = Vec::new();
    for (path, result) in results {
        match result {
            Ok(hash) => {
                println!("{:016x}  {}", hash, path.display());
                hashed.push((path.clone(), hash));
            }
            Err(e) => warn!("Failed to hash {}: {}", path.display(), e),
        }
    }

    if let Some(threshold) = threshold {
        for (a, b, distance) in similar_pairs(&hashed, threshold) {
            println!("≈ {} {} (distance {})", a.display(), b.display(), distance);
        }
    }

    Ok(())
}
