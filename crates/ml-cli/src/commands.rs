//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ml_media::{MediaOptions, OwnerRef, UpdateMediaParams};

/// Medialib - attach files, thumbnails and collections to any record
#[derive(Parser, Debug)]
#[command(name = "medialib")]
#[command(about = "Attach media files to owner records", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Owner the command operates on
#[derive(Args, Debug, Clone)]
pub struct OwnerArgs {
    /// Owner type name, e.g. `User`
    #[arg(long)]
    pub owner_type: String,

    /// Owner identifier
    #[arg(long)]
    pub owner_id: i64,
}

impl OwnerArgs {
    pub fn owner(&self) -> OwnerRef {
        OwnerRef::new(&self.owner_type, self.owner_id)
    }
}

/// Thumbnail box shared by `store` and `update`
#[derive(Args, Debug, Clone)]
pub struct ThumbnailArgs {
    /// Generate a thumbnail
    #[arg(long)]
    pub thumbnail: bool,

    /// Thumbnail box width, defaults to the configured width
    #[arg(long, requires = "thumbnail")]
    pub width: Option<u32>,

    /// Thumbnail box height, defaults to the configured height
    #[arg(long, requires = "thumbnail")]
    pub height: Option<u32>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the media table
    Migrate,

    /// Store a file for an owner
    Store {
        #[command(flatten)]
        owner: OwnerArgs,

        /// File to upload
        file: PathBuf,

        /// Target disk
        #[arg(long)]
        disk: Option<String>,

        /// Target collection
        #[arg(long)]
        collection: Option<String>,

        /// Stored file name without extension
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        thumbnail: ThumbnailArgs,
    },

    /// Replace the files of an existing media record
    Update {
        #[command(flatten)]
        owner: OwnerArgs,

        /// Media record ID
        id: i64,

        /// Replacement file
        file: PathBuf,

        /// Stored file name without extension
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        thumbnail: ThumbnailArgs,
    },

    /// Delete one media record, or all of the owner's media without an ID
    Delete {
        #[command(flatten)]
        owner: OwnerArgs,

        /// Media record ID
        id: Option<i64>,
    },

    /// Delete every media record of the owner in a collection
    DeleteCollection {
        #[command(flatten)]
        owner: OwnerArgs,

        /// Collection name
        collection: String,
    },

    /// Print the owner's media library as JSON
    List {
        #[command(flatten)]
        owner: OwnerArgs,

        /// Only media in this collection
        #[arg(long, conflicts_with_all = ["disk", "media_type"])]
        collection: Option<String>,

        /// Only media on this disk
        #[arg(long, conflicts_with = "media_type")]
        disk: Option<String>,

        /// Only media with this extension
        #[arg(long = "type")]
        media_type: Option<String>,
    },
}

impl ThumbnailArgs {
    /// Apply to store options; a missing dimension falls back to `default`
    pub fn apply(&self, options: MediaOptions, default: (u32, u32)) -> MediaOptions {
        match (self.thumbnail, self.width, self.height) {
            (false, _, _) => options,
            (true, None, None) => options.with_default_thumbnail(),
            (true, w, h) => options.with_thumbnail(w.unwrap_or(default.0), h.unwrap_or(default.1)),
        }
    }

    /// Update parameters with this thumbnail box
    pub fn update_params(&self, name: Option<String>, default: (u32, u32)) -> UpdateMediaParams {
        let params = match name {
            Some(name) => UpdateMediaParams::new().with_name(name),
            None => UpdateMediaParams::new(),
        };
        if self.thumbnail {
            params.with_thumbnail(
                self.width.unwrap_or(default.0),
                self.height.unwrap_or(default.1),
            )
        } else {
            params.without_thumbnail()
        }
    }
}
