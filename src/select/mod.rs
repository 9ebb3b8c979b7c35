//! Asset selector (C8).
//!
//! Per asset type, dedupes candidates from all providers plus the existing
//! library assets, tiers survivors by language fit and HD quality, and picks
//! a winner by lexicographic tie-break. Grounded on the scoring vocabulary
//! already used for `vote_average`-based picks in the enrichment flow, but
//! generalized from "highest vote wins" to the full four-field comparator.

use mediarch_common::AssetType;

use crate::imaging::{self, ImageFingerprint};

/// One candidate under consideration, already decorated with whatever the
/// selector needs to compare it: the library may supply candidates with no
/// provider behind them (already-downloaded assets) and no perceptual hash
/// (not yet fingerprinted).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub asset_type: AssetType,
    pub provider: String,
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub language: Option<String>,
    pub vote_count: Option<f64>,
    pub quality_hint: Option<String>,
    pub content_hash: Option<String>,
    pub perceptual: Option<ImageFingerprint>,
    pub is_locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    One,
    Two,
    Three,
    Four,
}

const HD_QUALITY_HINTS: [&str; 6] = ["hd", "bluray", "4k", "uhd", "1080p", "2160p"];

fn is_hd(candidate: &Candidate) -> bool {
    let dims_hd = candidate.width.unwrap_or(0) >= 1920 || candidate.height.unwrap_or(0) >= 1920;
    let hint_hd = candidate
        .quality_hint
        .as_deref()
        .map(|h| HD_QUALITY_HINTS.contains(&h.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    dims_hd || hint_hd
}

/// Exact match = 1.0, absent/neutral = 0.5, other = 0.0.
fn language_fit(candidate_language: Option<&str>, preferred_language: &str) -> f64 {
    match candidate_language {
        None => 0.5,
        Some(lang) if lang.eq_ignore_ascii_case(preferred_language) => 1.0,
        Some(lang) if lang.is_empty() => 0.5,
        Some(_) => 0.0,
    }
}

fn tier(candidate: &Candidate, preferred_language: &str) -> Tier {
    let preferred = language_fit(candidate.language.as_deref(), preferred_language) >= 0.5;
    let hd = is_hd(candidate);
    match (preferred, hd) {
        (true, true) => Tier::One,
        (true, false) => Tier::Two,
        (false, true) => Tier::Three,
        (false, false) => Tier::Four,
    }
}

fn pixel_area(candidate: &Candidate) -> Option<u64> {
    match (candidate.width, candidate.height) {
        (Some(w), Some(h)) => Some(w as u64 * h as u64),
        _ => None,
    }
}

/// Named provider-priority ordering, used as the final tie-break. A provider
/// absent from the list sorts after every listed provider.
#[derive(Debug, Clone)]
pub struct ProviderPriority(Vec<String>);

impl ProviderPriority {
    pub fn new(order: Vec<String>) -> Self {
        Self(order)
    }

    pub fn quality_first() -> Self {
        Self::new(vec!["tmdb".into(), "tvdb".into(), "fanart".into()])
    }

    pub fn speed_first() -> Self {
        Self::new(vec!["tmdb".into()])
    }

    pub fn tmdb_primary() -> Self {
        Self::new(vec!["tmdb".into()])
    }

    pub fn tvdb_primary() -> Self {
        Self::new(vec!["tvdb".into(), "tmdb".into()])
    }

    pub(crate) fn index_of(&self, provider: &str) -> usize {
        self.0.iter().position(|p| p == provider).unwrap_or(self.0.len())
    }
}

/// Two candidates are duplicates if: same asset type AND (same URL, OR same
/// content hash, OR perceptual hash similarity within threshold).
fn are_duplicates(a: &Candidate, b: &Candidate) -> bool {
    if a.asset_type != b.asset_type {
        return false;
    }

    if a.url == b.url {
        return true;
    }

    if let (Some(hash_a), Some(hash_b)) = (&a.content_hash, &b.content_hash) {
        if imaging::are_duplicates_by_content_hash(hash_a, hash_b) {
            return true;
        }
    }

    if let (Some(pa), Some(pb)) = (&a.perceptual, &b.perceptual) {
        let mode = pa.similarity_mode().min_strictness(pb.similarity_mode());
        return imaging::are_duplicates(pa, pb, mode);
    }

    false
}

/// Remove duplicates, keeping the first-seen representative of each group.
pub fn dedupe(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = Vec::new();
    'outer: for candidate in candidates {
        for existing in &kept {
            if are_duplicates(&candidate, existing) {
                continue 'outer;
            }
        }
        kept.push(candidate);
    }
    kept
}

fn compare(a: &Candidate, b: &Candidate, preferred_language: &str, priority: &ProviderPriority) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    let tier_cmp = tier(a, preferred_language).cmp(&tier(b, preferred_language));
    if tier_cmp != Ordering::Equal {
        return tier_cmp;
    }

    if let (Some(va), Some(vb)) = (a.vote_count, b.vote_count) {
        let min = va.min(vb);
        if min > 0.0 && (va - vb).abs() > 0.5 * min {
            return vb.partial_cmp(&va).unwrap_or(Ordering::Equal);
        }
    }

    if let (Some(area_a), Some(area_b)) = (pixel_area(a), pixel_area(b)) {
        let min = area_a.min(area_b);
        if min > 0 && (area_a as i64 - area_b as i64).unsigned_abs() as u64 > min / 10 {
            return area_b.cmp(&area_a);
        }
    }

    priority.index_of(&a.provider).cmp(&priority.index_of(&b.provider))
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub winner: Candidate,
    pub reason: String,
    pub display_score: f64,
}

fn selection_reason(candidate: &Candidate, preferred_language: &str) -> String {
    match tier(candidate, preferred_language) {
        Tier::One => "Best quality in preferred language".to_string(),
        Tier::Two => "Preferred language, standard quality".to_string(),
        Tier::Three => "High quality, non-preferred language".to_string(),
        Tier::Four => "Best available candidate".to_string(),
    }
}

/// Select the winning candidate for one asset type from a mixed pool of
/// provider candidates and existing library assets. Locked (user-pinned)
/// candidates are never considered replaceable and are skipped from scoring
/// entirely — if one exists among `candidates`, it wins unconditionally.
pub fn select(candidates: Vec<Candidate>, preferred_language: &str, priority: &ProviderPriority) -> Option<Selection> {
    if let Some(locked) = candidates.iter().find(|c| c.is_locked) {
        return Some(Selection {
            winner: locked.clone(),
            reason: "Locked by user".to_string(),
            display_score: 1.0,
        });
    }

    let deduped = dedupe(candidates);
    let winner = deduped
        .into_iter()
        .min_by(|a, b| compare(a, b, preferred_language, priority))?;

    let reason = selection_reason(&winner, preferred_language);
    let display_score = match tier(&winner, preferred_language) {
        Tier::One => 1.0,
        Tier::Two => 0.75,
        Tier::Three => 0.5,
        Tier::Four => 0.25,
    };

    Some(Selection {
        winner,
        reason,
        display_score,
    })
}

impl imaging::SimilarityMode {
    /// The more lenient of two modes (used when comparing images whose
    /// individual auto-detected modes disagree).
    fn min_strictness(self, other: Self) -> Self {
        use imaging::SimilarityMode::*;
        match (self, other) {
            (Lenient, _) | (_, Lenient) => Lenient,
            (Default, _) | (_, Default) => Default,
            (Strict, Strict) => Strict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(asset_type: AssetType, provider: &str, lang: Option<&str>, w: u32, h: u32, votes: f64) -> Candidate {
        Candidate {
            asset_type,
            provider: provider.to_string(),
            url: format!("https://example.com/{provider}/{w}x{h}"),
            width: Some(w),
            height: Some(h),
            language: lang.map(str::to_string),
            vote_count: Some(votes),
            quality_hint: None,
            content_hash: None,
            perceptual: None,
            is_locked: false,
        }
    }

    #[test]
    fn tier_prefers_language_and_hd() {
        let a = candidate(AssetType::Poster, "tmdb", Some("en"), 1920, 2880, 5.0);
        assert_eq!(tier(&a, "en"), Tier::One);
    }

    #[test]
    fn tier_trumps_votes_even_with_huge_vote_gap() {
        let priority = ProviderPriority::quality_first();
        let a = candidate(AssetType::Poster, "tmdb", Some("en"), 1920, 2880, 5.0);
        let b = candidate(AssetType::Poster, "tmdb", Some("de"), 500, 750, 9999.0);

        let selection = select(vec![a.clone(), b], "en", &priority).unwrap();
        assert_eq!(selection.winner.provider, a.provider);
        assert_eq!(selection.winner.width, a.width);
        assert!(selection.reason.contains("Best quality in preferred language"));
    }

    #[test]
    fn within_tier_higher_votes_win_when_gap_is_significant() {
        let priority = ProviderPriority::quality_first();
        let low_votes = candidate(AssetType::Poster, "a", Some("en"), 1920, 2880, 5.0);
        let high_votes = candidate(AssetType::Poster, "b", Some("en"), 1920, 2880, 50.0);

        let selection = select(vec![low_votes, high_votes.clone()], "en", &priority).unwrap();
        assert_eq!(selection.winner.provider, high_votes.provider);
    }

    #[test]
    fn within_tier_close_votes_fall_through_to_area() {
        let priority = ProviderPriority::quality_first();
        let small = candidate(AssetType::Poster, "a", Some("en"), 1920, 2880, 10.0);
        let large = candidate(AssetType::Poster, "b", Some("en"), 3840, 5760, 11.0);

        let selection = select(vec![small, large.clone()], "en", &priority).unwrap();
        assert_eq!(selection.winner.provider, large.provider);
    }

    #[test]
    fn provider_priority_breaks_final_tie() {
        let priority = ProviderPriority::new(vec!["tvdb".into(), "tmdb".into()]);
        let tmdb = candidate(AssetType::Poster, "tmdb", Some("en"), 1920, 2880, 10.0);
        let tvdb = candidate(AssetType::Poster, "tvdb", Some("en"), 1920, 2880, 10.0);

        let selection = select(vec![tmdb, tvdb.clone()], "en", &priority).unwrap();
        assert_eq!(selection.winner.provider, tvdb.provider);
    }

    #[test]
    fn duplicate_urls_are_deduped() {
        let mut a = candidate(AssetType::Poster, "tmdb", Some("en"), 1920, 2880, 10.0);
        let mut b = candidate(AssetType::Poster, "tmdb", Some("en"), 1920, 2880, 20.0);
        a.url = "https://example.com/same.jpg".to_string();
        b.url = a.url.clone();

        let deduped = dedupe(vec![a, b]);
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn locked_candidate_wins_unconditionally() {
        let priority = ProviderPriority::quality_first();
        let mut locked = candidate(AssetType::Poster, "manual", Some("de"), 200, 300, 0.0);
        locked.is_locked = true;
        let challenger = candidate(AssetType::Poster, "tmdb", Some("en"), 1920, 2880, 9999.0);

        let selection = select(vec![locked.clone(), challenger], "en", &priority).unwrap();
        assert_eq!(selection.winner.provider, locked.provider);
        assert_eq!(selection.reason, "Locked by user");
    }

    #[test]
    fn empty_candidates_yields_no_selection() {
        let priority = ProviderPriority::quality_first();
        assert!(select(vec![], "en", &priority).is_none());
    }
}
