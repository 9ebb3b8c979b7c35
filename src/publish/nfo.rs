//! Kodi-compatible NFO serialization.
//!
//! A minimal hand-rolled XML writer, consistent with the existing
//! codebase's preference for small hand-written serializers (e.g.
//! hand-rolled URL building in the notification clients) over pulling in
//! an XML crate for a handful of elements.

use mediarch_db::models::{Actor, Movie};

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn element(tag: &str, value: &str, out: &mut String) {
    out.push_str(&format!("  <{tag}>{}</{tag}>\n", escape(value)));
}

fn optional_element(tag: &str, value: Option<&str>, out: &mut String) {
    if let Some(v) = value {
        element(tag, v, out);
    }
}

/// Render a `<movie>` NFO document for a single movie and its cast.
pub fn render_movie_nfo(movie: &Movie, actors: &[Actor]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
    out.push_str("<movie>\n");

    element("title", &movie.title, &mut out);
    optional_element("originaltitle", movie.original_title.as_deref(), &mut out);
    optional_element("sorttitle", movie.sort_title.as_deref(), &mut out);
    if let Some(year) = movie.year {
        element("year", &year.to_string(), &mut out);
    }
    optional_element("plot", movie.plot.as_deref(), &mut out);
    optional_element("tagline", movie.tagline.as_deref(), &mut out);
    if let Some(runtime) = movie.runtime_minutes {
        element("runtime", &runtime.to_string(), &mut out);
    }
    optional_element("premiered", movie.release_date.as_deref(), &mut out);

    if let Some(tmdb_id) = movie.tmdb_id {
        out.push_str(&format!(
            "  <uniqueid type=\"tmdb\" default=\"true\">{}</uniqueid>\n",
            tmdb_id
        ));
    }
    if let Some(imdb_id) = &movie.imdb_id {
        out.push_str(&format!(
            "  <uniqueid type=\"imdb\">{}</uniqueid>\n",
            escape(imdb_id)
        ));
    }
    if let Some(tvdb_id) = movie.tvdb_id {
        out.push_str(&format!(
            "  <uniqueid type=\"tvdb\">{}</uniqueid>\n",
            tvdb_id
        ));
    }

    for actor in actors {
        out.push_str("  <actor>\n");
        out.push_str(&format!("    <name>{}</name>\n", escape(&actor.name)));
        if let Some(role) = &actor.role {
            out.push_str(&format!("    <role>{}</role>\n", escape(role)));
        }
        out.push_str(&format!("    <order>{}</order>\n", actor.order_index));
        out.push_str("  </actor>\n");
    }

    out.push_str("</movie>\n");
    out
}

/// Reject path separators, `..`, and anything outside
/// `[A-Za-z0-9 _().-]` so a title can never escape the library directory
/// or collide with a reserved filename when used as a media basename.
pub fn sanitize_basename(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '(' | ')' | '.' | '-'))
        .collect::<String>()
        .replace("..", "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediarch_common::{ActorId, MovieId};

    fn movie() -> Movie {
        Movie {
            id: MovieId::new(),
            library_id: mediarch_common::LibraryId::new(),
            file_path: "/media/movies/Example (2020)/Example.mkv".to_string(),
            title: "Ex<ample> & \"Title\"".to_string(),
            sort_title: None,
            original_title: None,
            year: Some(2020),
            plot: Some("A story with an & ampersand".to_string()),
            tagline: None,
            runtime_minutes: Some(120),
            release_date: Some("2020-01-01".to_string()),
            tmdb_id: Some(603),
            imdb_id: Some("tt0133093".to_string()),
            tvdb_id: None,
            status: mediarch_common::EnrichmentStatus::Enriched,
            monitored: true,
            deleted_at: None,
            last_published_at: None,
            published_nfo_hash: None,
            enriched_at: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn escapes_special_characters_in_title() {
        let xml = render_movie_nfo(&movie(), &[]);
        assert!(xml.contains("Ex&lt;ample&gt; &amp; &quot;Title&quot;"));
        assert!(!xml.contains("<ample>"));
    }

    #[test]
    fn includes_unique_ids() {
        let xml = render_movie_nfo(&movie(), &[]);
        assert!(xml.contains("type=\"tmdb\""));
        assert!(xml.contains("603"));
        assert!(xml.contains("tt0133093"));
    }

    #[test]
    fn includes_actor_entries() {
        let actor = Actor {
            id: ActorId::new(),
            movie_id: MovieId::new(),
            name: "Jane Doe".to_string(),
            role: Some("Protagonist".to_string()),
            order_index: 0,
            thumb_cache_hash: None,
            created_at: chrono::Utc::now(),
        };
        let xml = render_movie_nfo(&movie(), std::slice::from_ref(&actor));
        assert!(xml.contains("Jane Doe"));
        assert!(xml.contains("Protagonist"));
    }

    #[test]
    fn sanitize_basename_strips_path_separators_and_traversal() {
        assert_eq!(sanitize_basename("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_basename("Normal Title (2020)"), "Normal Title (2020)");
        assert_eq!(sanitize_basename("bad/name:chars*?"), "badnamechars");
    }
}
