//! Publisher (C11).
//!
//! Hash-based three-way sync between selected cache files and a movie's
//! library directory. Copies only what changed, deletes only what is
//! unauthorized, and never touches the main media file. Grounded on the
//! scanner's directory-walk shape (`WalkDir` + content-hash bookkeeping)
//! and the cache's atomic temp+rename write pattern.

pub mod nfo;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use mediarch_common::{AssetType, Result};
use mediarch_db::models::{Actor, Movie};
use mediarch_db::queries::{cache as cache_queries, library_files};
use rusqlite::Connection;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::cache::{CacheKind, ContentCache};

fn extension_for(kind: CacheKind) -> &'static str {
    match kind {
        CacheKind::Image => "jpg",
        CacheKind::Video => "mp4",
        CacheKind::Text => "nfo",
        CacheKind::Audio => "mp3",
    }
}

pub struct PublishRequest {
    pub movie: Movie,
    pub library_dir: PathBuf,
    pub main_media_paths: HashSet<PathBuf>,
    pub selected_images: HashMap<AssetType, String>,
    pub selected_videos: HashMap<AssetType, String>,
    pub actors: Vec<Actor>,
}

#[derive(Debug, Default, Clone)]
pub struct PublishOutcome {
    pub copied: usize,
    pub renamed: usize,
    pub deleted: usize,
    pub nfo_changed: bool,
}

impl PublishOutcome {
    pub fn changed(&self) -> bool {
        self.copied > 0 || self.renamed > 0 || self.deleted > 0 || self.nfo_changed
    }
}

struct Inventory {
    hash_to_path: HashMap<String, PathBuf>,
    path_to_hash: HashMap<PathBuf, String>,
}

fn build_inventory(library_dir: &Path, main_media_paths: &HashSet<PathBuf>) -> Inventory {
    let mut hash_to_path = HashMap::new();
    let mut path_to_hash = HashMap::new();

    for entry in WalkDir::new(library_dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if main_media_paths.contains(&canonical) {
            continue;
        }
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read inventory file, skipping");
                continue;
            }
        };
        let hash = ContentCache::hash_of(&bytes);
        hash_to_path.insert(hash.clone(), path.to_path_buf());
        path_to_hash.insert(path.to_path_buf(), hash);
    }

    Inventory { hash_to_path, path_to_hash }
}

fn atomic_copy(source: &Path, dest: &Path) -> Result<()> {
    let tmp = dest.with_extension(format!("tmp.{}", std::process::id()));
    fs::copy(source, &tmp)?;
    fs::rename(&tmp, dest)?;
    Ok(())
}

fn is_hash_locked(conn: &Connection, hash: &str) -> Result<bool> {
    if let Some(row) = cache_queries::get_image_by_hash(conn, hash)? {
        return Ok(row.is_locked);
    }
    if let Some(row) = cache_queries::get_video_by_hash(conn, hash)? {
        return Ok(row.is_locked);
    }
    if let Some(row) = cache_queries::get_text_by_hash(conn, hash)? {
        return Ok(row.is_locked);
    }
    if let Some(row) = cache_queries::get_audio_by_hash(conn, hash)? {
        return Ok(row.is_locked);
    }
    Ok(false)
}

/// Run one idempotent publish pass for a single movie.
pub fn publish(conn: &Connection, cache: &ContentCache, request: &PublishRequest) -> Result<PublishOutcome> {
    let mut outcome = PublishOutcome::default();

    let main_canonical: HashSet<PathBuf> = request
        .main_media_paths
        .iter()
        .map(|p| p.canonicalize().unwrap_or_else(|_| p.clone()))
        .collect();

    let mut inventory = build_inventory(&request.library_dir, &main_canonical);

    let basename = request
        .main_media_paths
        .iter()
        .next()
        .and_then(|p| p.file_stem())
        .map(|s| nfo::sanitize_basename(&s.to_string_lossy()))
        .unwrap_or_else(|| nfo::sanitize_basename(&request.movie.title));

    let mut authorized_hashes: HashSet<String> = HashSet::new();

    let mut selected: Vec<(AssetType, String, CacheKind)> = Vec::new();
    selected.extend(request.selected_images.iter().map(|(t, h)| (*t, h.clone(), CacheKind::Image)));
    selected.extend(request.selected_videos.iter().map(|(t, h)| (*t, h.clone(), CacheKind::Video)));

    for (asset_type, hash, kind) in selected {
        authorized_hashes.insert(hash.clone());

        let expected_path = request
            .library_dir
            .join(format!("{basename}{}.{}", asset_type.filename_suffix(), extension_for(kind)));

        match inventory.hash_to_path.get(&hash) {
            Some(existing_path) if *existing_path == expected_path => {
                debug!(asset_type = %asset_type, "already published at expected path");
            }
            Some(existing_path) => {
                let existing_path = existing_path.clone();
                fs::rename(&existing_path, &expected_path)?;
                inventory.path_to_hash.remove(&existing_path);
                inventory.hash_to_path.insert(hash.clone(), expected_path.clone());
                inventory.path_to_hash.insert(expected_path, hash.clone());
                outcome.renamed += 1;
            }
            None => {
                let cached_path = cache
                    .get(kind, &hash)
                    .ok_or_else(|| mediarch_common::Error::not_found(format!("cache entry {hash}")))?;
                atomic_copy(&cached_path, &expected_path)?;
                inventory.hash_to_path.insert(hash.clone(), expected_path.clone());
                inventory.path_to_hash.insert(expected_path, hash.clone());
                outcome.copied += 1;
            }
        }
    }

    // NFO.
    let nfo_body = nfo::render_movie_nfo(&request.movie, &request.actors);
    let nfo_hash = ContentCache::hash_of(nfo_body.as_bytes());
    let nfo_path = request.library_dir.join(format!("{basename}.nfo"));
    authorized_hashes.insert(nfo_hash.clone());

    match inventory.path_to_hash.get(&nfo_path) {
        Some(existing_hash) if *existing_hash == nfo_hash => {}
        _ => {
            let tmp = nfo_path.with_extension(format!("nfo.tmp.{}", std::process::id()));
            fs::write(&tmp, nfo_body.as_bytes())?;
            fs::rename(&tmp, &nfo_path)?;
            if let Some(old_hash) = inventory.path_to_hash.insert(nfo_path.clone(), nfo_hash.clone()) {
                inventory.hash_to_path.remove(&old_hash);
            }
            inventory.hash_to_path.insert(nfo_hash.clone(), nfo_path.clone());
            outcome.nfo_changed = true;
        }
    }

    cache_queries::put_text(conn, &nfo_hash, &nfo_path.to_string_lossy(), nfo_body.len() as i64)?;

    // Cleanup: delete anything unauthorized.
    let to_delete: Vec<PathBuf> = inventory
        .path_to_hash
        .iter()
        .filter(|(path, hash)| !authorized_hashes.contains(*hash) && !main_canonical.contains(path.as_path()))
        .map(|(path, _)| path.clone())
        .collect();

    for path in to_delete {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
        if main_canonical.contains(&canonical) {
            continue;
        }
        let hash = inventory.path_to_hash.get(&path).cloned().unwrap_or_default();
        if !request.movie.monitored && is_hash_locked(conn, &hash)? {
            continue;
        }
        fs::remove_file(&path)?;
        outcome.deleted += 1;
    }

    // Rebuild library_*_files records.
    library_files::delete_images_for_movie(conn, request.movie.id)?;
    library_files::delete_videos_for_movie(conn, request.movie.id)?;
    library_files::delete_text_for_movie(conn, request.movie.id)?;
    library_files::delete_audio_for_movie(conn, request.movie.id)?;

    for (asset_type, hash) in &request.selected_images {
        if let Some(cached) = cache_queries::get_image_by_hash(conn, hash)? {
            let path = request
                .library_dir
                .join(format!("{basename}{}.{}", asset_type.filename_suffix(), extension_for(CacheKind::Image)));
            library_files::publish_image(conn, request.movie.id, *asset_type, cached.id, &path.to_string_lossy())?;
        }
    }
    for (asset_type, hash) in &request.selected_videos {
        if let Some(cached) = cache_queries::get_video_by_hash(conn, hash)? {
            let path = request
                .library_dir
                .join(format!("{basename}{}.{}", asset_type.filename_suffix(), extension_for(CacheKind::Video)));
            library_files::publish_video(conn, request.movie.id, *asset_type, cached.id, &path.to_string_lossy())?;
        }
    }
    if let Some(cached) = cache_queries::get_text_by_hash(conn, &nfo_hash)? {
        library_files::publish_text(conn, request.movie.id, cached.id, &nfo_path.to_string_lossy())?;
    }

    if outcome.changed() {
        info!(movie_id = %request.movie.id, copied = outcome.copied, renamed = outcome.renamed, deleted = outcome.deleted, "publish made changes");
    }

    Ok(outcome)
}

/// Handles `publish` jobs: assembles a [`PublishRequest`] for one movie from
/// its selected asset candidates and cast, runs [`publish`], then enqueues a
/// player notification.
pub struct PublishJobHandler {
    pool: mediarch_db::pool::DbPool,
    cache: std::sync::Arc<ContentCache>,
}

impl PublishJobHandler {
    pub fn new(pool: mediarch_db::pool::DbPool, cache: std::sync::Arc<ContentCache>) -> Self {
        Self { pool, cache }
    }
}

#[async_trait::async_trait]
impl crate::queue::JobHandler for PublishJobHandler {
    async fn handle(&self, job: &mediarch_db::models::Job) -> Result<()> {
        use mediarch_db::queries::{activity_log, actors, asset_candidates, movies};

        let movie_id: mediarch_common::MovieId = job
            .payload
            .get("movie_id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| mediarch_common::Error::invalid_input("publish payload missing movie_id"))?;

        let conn = mediarch_db::pool::get_conn(&self.pool)?;
        let movie = movies::get(&conn, movie_id)?.ok_or_else(|| mediarch_common::Error::not_found("movie"))?;
        let cast = actors::list_for_movie(&conn, movie_id)?;

        let main_media_path = PathBuf::from(&movie.file_path);
        let library_dir = main_media_path
            .parent()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| mediarch_common::Error::invalid_input("movie file path has no parent directory"))?;

        let mut selected_images = HashMap::new();
        let mut selected_videos = HashMap::new();
        for asset_type in mediarch_common::AssetType::ALL {
            if let Some(selected) = asset_candidates::get_selected(&conn, movie_id, asset_type)? {
                let Some(hash) = selected.content_hash else { continue };
                if asset_type.is_video() {
                    selected_videos.insert(asset_type, hash);
                } else {
                    selected_images.insert(asset_type, hash);
                }
            }
        }

        let request = PublishRequest {
            movie: movie.clone(),
            library_dir,
            main_media_paths: std::iter::once(main_media_path).collect(),
            selected_images,
            selected_videos,
            actors: cast,
        };

        let outcome = publish(&conn, &self.cache, &request)?;

        let nfo_hash = ContentCache::hash_of(nfo::render_movie_nfo(&movie, &request.actors).as_bytes());
        movies::mark_published(&conn, movie_id, &nfo_hash)?;

        if outcome.changed() {
            let message = format!(
                "published {}: {} copied, {} renamed, {} deleted, nfo_changed={}",
                movie.title, outcome.copied, outcome.renamed, outcome.deleted, outcome.nfo_changed
            );
            if let Err(e) = activity_log::record(&conn, "info", &message, Some(movie_id), Some(job.id)) {
                tracing::warn!(error = %e, %movie_id, "failed to write activity log entry for publish result");
            }

            crate::queue::enqueue(
                &self.pool,
                mediarch_common::JobKind::NotifyPlayer,
                mediarch_common::JobPriority::BACKGROUND,
                serde_json::json!({ "movie_id": movie_id }),
                false,
                None,
            )?;
        }

        Ok(())
    }
}
