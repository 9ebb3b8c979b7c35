//! TMDB provider adapter.
//!
//! Implements [`ProviderAdapter`] against the TMDB v3 REST API. Rate
//! limiting, circuit breaking, and retry are no longer inline here (see
//! [`super::harness::AdapterHarness`]) — this adapter only knows how to talk
//! to TMDB and translate its responses and errors into the uniform contract.

use std::collections::HashMap;

use async_trait::async_trait;
use mediarch_common::{AssetType, Error, MediaType, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{AssetCandidate, Capabilities, CastMember, ConnectionTestResult, FetchPriority, MetadataResponse, ProviderAdapter, SearchResult};

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";
const MAX_BILLED_CAST: usize = 15;

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieSearchResult {
    id: u64,
    title: Option<String>,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvSearchResult {
    id: u64,
    name: Option<String>,
    first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieDetail {
    title: Option<String>,
    original_title: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    vote_average: Option<f64>,
    runtime: Option<u32>,
    genres: Option<Vec<TmdbGenre>>,
    imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvDetail {
    name: Option<String>,
    original_name: Option<String>,
    overview: Option<String>,
    first_air_date: Option<String>,
    vote_average: Option<f64>,
    episode_run_time: Option<Vec<u32>>,
    genres: Option<Vec<TmdbGenre>>,
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmdbImagesResponse {
    posters: Option<Vec<TmdbImage>>,
    backdrops: Option<Vec<TmdbImage>>,
    logos: Option<Vec<TmdbImage>>,
}

#[derive(Debug, Deserialize)]
struct TmdbImage {
    file_path: String,
    width: u32,
    height: u32,
    iso_639_1: Option<String>,
    vote_average: f64,
    vote_count: u32,
}

#[derive(Debug, Deserialize)]
struct TmdbCreditsResponse {
    cast: Vec<TmdbCastMember>,
}

#[derive(Debug, Deserialize)]
struct TmdbCastMember {
    name: String,
    character: Option<String>,
    order: i32,
    profile_path: Option<String>,
}

pub struct TmdbAdapter {
    client: reqwest::Client,
    api_key: String,
    language: String,
}

impl TmdbAdapter {
    pub fn new(api_key: String, language: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            language,
        }
    }

    fn url(&self, path: &str, extra_params: &[(&str, &str)]) -> String {
        let mut url = format!("{TMDB_BASE_URL}{path}?api_key={}&language={}", self.api_key, self.language);
        for (key, value) in extra_params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoded(value));
        }
        url
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(std::time::Duration::from_secs);
                Err(Error::RateLimited { retry_after })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::ProviderAuth {
                provider: "tmdb".into(),
                message: resp.status().to_string(),
            }),
            status if status.is_server_error() => Err(Error::ProviderUnavailable {
                provider: "tmdb".into(),
                message: status.to_string(),
            }),
            _ => resp.error_for_status().map_err(|e| transport_error(&e)),
        }
    }

    fn confidence(query_title: &str, result_title: &str, query_year: Option<u16>, result_year: Option<u16>) -> f64 {
        let base = if query_title == result_title {
            0.5
        } else if query_title.eq_ignore_ascii_case(result_title) {
            0.4
        } else if result_title.to_ascii_lowercase().contains(&query_title.to_ascii_lowercase()) {
            0.2
        } else {
            0.1
        };

        let year_bonus = match (query_year, result_year) {
            (Some(q), Some(r)) if q == r => 0.3,
            (Some(q), Some(r)) if q.abs_diff(r) <= 1 => 0.15,
            _ => 0.0,
        };

        base + year_bonus
    }

    /// Top-billed cast for an entity, ordered and capped at `MAX_BILLED_CAST`.
    /// Never fails the caller: a credits-fetch error downgrades to an empty cast.
    async fn get_credits(&self, provider_result_id: &str, entity_kind: MediaType) -> Vec<CastMember> {
        let path = match entity_kind {
            MediaType::Movie => format!("/movie/{provider_result_id}/credits"),
            MediaType::Tv => format!("/tv/{provider_result_id}/credits"),
            MediaType::Music => return Vec::new(),
        };

        let url = self.url(&path, &[]);
        let resp: TmdbCreditsResponse = match self.get(&url).await {
            Ok(resp) => match resp.json().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(error = %e, "tmdb credits decode failed");
                    return Vec::new();
                }
            },
            Err(e) => {
                debug!(error = %e, "tmdb credits fetch failed");
                return Vec::new();
            }
        };

        let mut cast: Vec<TmdbCastMember> = resp.cast;
        cast.sort_by_key(|c| c.order);
        cast.into_iter()
            .take(MAX_BILLED_CAST)
            .map(|c| CastMember {
                name: c.name,
                role: c.character,
                order: c.order,
                thumbnail_url: c.profile_path.as_deref().map(image_url),
            })
            .collect()
    }
}

fn transport_error(e: &reqwest::Error) -> Error {
    if e.is_timeout() || e.is_connect() {
        Error::ProviderUnavailable {
            provider: "tmdb".into(),
            message: e.to_string(),
        }
    } else {
        Error::internal(format!("tmdb request failed: {e}"))
    }
}

const HEX: [u8; 16] = *b"0123456789ABCDEF";

fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0x0f) as usize]));
            }
        }
    }
    out
}

fn parse_year(date: &Option<String>) -> Option<u16> {
    date.as_deref().and_then(|d| d.get(..4)).and_then(|y| y.parse::<u16>().ok())
}

fn image_url(path: &str) -> String {
    format!("{TMDB_IMAGE_BASE}{path}")
}

fn to_candidate(img: &TmdbImage, asset_type: AssetType) -> AssetCandidate {
    AssetCandidate {
        asset_type,
        url: image_url(&img.file_path),
        width: Some(img.width),
        height: Some(img.height),
        language: img.iso_639_1.clone(),
        vote_average: Some(img.vote_average),
        vote_count: Some(img.vote_count),
        quality_hint: (img.width >= 1920 || img.height >= 1920).then(|| "hd".to_string()),
    }
}

#[async_trait]
impl ProviderAdapter for TmdbAdapter {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            entity_kinds: vec![MediaType::Movie, MediaType::Tv],
            asset_types: vec![AssetType::Poster, AssetType::Fanart, AssetType::Clearlogo],
            metadata_fields: vec!["title", "original_title", "overview", "genres", "production_year", "community_rating", "runtime_minutes"],
            external_id_lookup: vec!["imdb"],
        }
    }

    async fn search(
        &self,
        query: &str,
        year: Option<u16>,
        entity_kind: MediaType,
        _priority: FetchPriority,
    ) -> Result<Vec<SearchResult>> {
        let mut results = match entity_kind {
            MediaType::Movie => {
                let mut params = vec![("query", query)];
                let year_str = year.map(|y| y.to_string());
                if let Some(ref y) = year_str {
                    params.push(("year", y.as_str()));
                }
                let url = self.url("/search/movie", &params);
                debug!(url = %url, "tmdb search movie");
                let body: TmdbSearchResponse<TmdbMovieSearchResult> =
                    self.get(&url).await?.json().await.map_err(|e| transport_error(&e))?;

                body.results
                    .into_iter()
                    .map(|r| {
                        let title = r.title.unwrap_or_default();
                        let result_year = parse_year(&r.release_date);
                        let confidence = Self::confidence(query, &title, year, result_year);
                        SearchResult {
                            provider_result_id: r.id.to_string(),
                            title,
                            year: result_year,
                            confidence,
                            external_ids: HashMap::new(),
                        }
                    })
                    .collect::<Vec<_>>()
            }
            MediaType::Tv => {
                let url = self.url("/search/tv", &[("query", query)]);
                debug!(url = %url, "tmdb search tv");
                let body: TmdbSearchResponse<TmdbTvSearchResult> =
                    self.get(&url).await?.json().await.map_err(|e| transport_error(&e))?;

                body.results
                    .into_iter()
                    .map(|r| {
                        let title = r.name.unwrap_or_default();
                        let result_year = parse_year(&r.first_air_date);
                        let confidence = Self::confidence(query, &title, None, result_year);
                        SearchResult {
                            provider_result_id: r.id.to_string(),
                            title,
                            year: result_year,
                            confidence,
                            external_ids: HashMap::new(),
                        }
                    })
                    .collect::<Vec<_>>()
            }
            MediaType::Music => return Ok(Vec::new()),
        };

        results.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        Ok(results)
    }

    async fn get_metadata(&self, provider_result_id: &str, entity_kind: MediaType, _priority: FetchPriority) -> Result<MetadataResponse> {
        let mut fields = HashMap::new();
        let present;

        match entity_kind {
            MediaType::Movie => {
                let url = self.url(&format!("/movie/{provider_result_id}"), &[]);
                let detail: TmdbMovieDetail = self.get(&url).await?.json().await.map_err(|e| transport_error(&e))?;

                fields.insert("title".into(), json!(detail.title.unwrap_or_default()));
                if let Some(v) = detail.original_title {
                    fields.insert("original_title".into(), json!(v));
                }
                if let Some(v) = &detail.overview {
                    fields.insert("overview".into(), json!(v));
                }
                fields.insert(
                    "genres".into(),
                    json!(detail.genres.unwrap_or_default().into_iter().map(|g| g.name).collect::<Vec<_>>()),
                );
                if let Some(y) = parse_year(&detail.release_date) {
                    fields.insert("production_year".into(), json!(y));
                }
                if let Some(v) = detail.vote_average {
                    fields.insert("community_rating".into(), json!(v));
                }
                if let Some(v) = detail.runtime {
                    fields.insert("runtime_minutes".into(), json!(v));
                }
                if let Some(imdb) = detail.imdb_id {
                    fields.insert("imdb_id".into(), json!(imdb));
                }
                present = fields.len();
            }
            MediaType::Tv => {
                let url = self.url(&format!("/tv/{provider_result_id}"), &[]);
                let detail: TmdbTvDetail = self.get(&url).await?.json().await.map_err(|e| transport_error(&e))?;

                fields.insert("title".into(), json!(detail.name.unwrap_or_default()));
                if let Some(v) = detail.original_name {
                    fields.insert("original_title".into(), json!(v));
                }
                if let Some(v) = &detail.overview {
                    fields.insert("overview".into(), json!(v));
                }
                fields.insert(
                    "genres".into(),
                    json!(detail.genres.unwrap_or_default().into_iter().map(|g| g.name).collect::<Vec<_>>()),
                );
                if let Some(y) = parse_year(&detail.first_air_date) {
                    fields.insert("production_year".into(), json!(y));
                }
                if let Some(v) = detail.vote_average {
                    fields.insert("community_rating".into(), json!(v));
                }
                if let Some(v) = detail.episode_run_time.and_then(|v| v.first().copied()) {
                    fields.insert("runtime_minutes".into(), json!(v));
                }
                present = fields.len();
            }
            MediaType::Music => {
                present = 0;
            }
        }

        let cast = self.get_credits(provider_result_id, entity_kind).await;

        let total_fields = self.capabilities().metadata_fields.len().max(1);
        Ok(MetadataResponse {
            fields,
            completeness: present as f64 / total_fields as f64,
            cast,
        })
    }

    async fn get_assets(
        &self,
        provider_result_id: &str,
        entity_kind: MediaType,
        asset_types: &[AssetType],
        _priority: FetchPriority,
    ) -> Result<Vec<AssetCandidate>> {
        let path = match entity_kind {
            MediaType::Movie => format!("/movie/{provider_result_id}/images"),
            MediaType::Tv => format!("/tv/{provider_result_id}/images"),
            MediaType::Music => return Ok(Vec::new()),
        };

        let url = self.url(&path, &[]);
        let resp: TmdbImagesResponse = self.get(&url).await?.json().await.map_err(|e| transport_error(&e))?;

        let mut candidates = Vec::new();
        if asset_types.contains(&AssetType::Poster) {
            candidates.extend(resp.posters.unwrap_or_default().iter().map(|i| to_candidate(i, AssetType::Poster)));
        }
        if asset_types.contains(&AssetType::Fanart) {
            candidates.extend(resp.backdrops.unwrap_or_default().iter().map(|i| to_candidate(i, AssetType::Fanart)));
        }
        if asset_types.contains(&AssetType::Clearlogo) {
            candidates.extend(resp.logos.unwrap_or_default().iter().map(|i| to_candidate(i, AssetType::Clearlogo)));
        }

        Ok(candidates)
    }

    async fn test_connection(&self) -> ConnectionTestResult {
        if self.api_key.is_empty() {
            return ConnectionTestResult {
                ok: false,
                message: "no api key configured".into(),
            };
        }

        let url = self.url("/configuration", &[]);
        match self.get(&url).await {
            Ok(_) => ConnectionTestResult {
                ok: true,
                message: "ok".into(),
            },
            Err(e) => ConnectionTestResult {
                ok: false,
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_exact_title_and_year_match() {
        let score = TmdbAdapter::confidence("Inception", "Inception", Some(2010), Some(2010));
        assert!((score - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn confidence_case_insensitive_match() {
        let score = TmdbAdapter::confidence("inception", "Inception", None, None);
        assert!((score - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn confidence_no_match() {
        let score = TmdbAdapter::confidence("Foo", "Bar", None, None);
        assert!((score - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn year_parsing() {
        assert_eq!(parse_year(&Some("2023-04-15".to_string())), Some(2023));
        assert_eq!(parse_year(&None), None);
    }

    #[test]
    fn image_url_construction() {
        assert_eq!(image_url("/abc.jpg"), "https://image.tmdb.org/t/p/original/abc.jpg");
    }

    #[test]
    fn url_encoding_escapes_reserved_chars() {
        assert_eq!(urlencoded("hello world"), "hello+world");
        assert_eq!(urlencoded("foo&bar"), "foo%26bar");
    }

    #[test]
    fn capabilities_cover_movie_and_tv() {
        let adapter = TmdbAdapter::new("key".into(), "en-US".into());
        let caps = adapter.capabilities();
        assert!(caps.entity_kinds.contains(&MediaType::Movie));
        assert!(caps.entity_kinds.contains(&MediaType::Tv));
        assert!(!caps.entity_kinds.contains(&MediaType::Music));
    }
}
