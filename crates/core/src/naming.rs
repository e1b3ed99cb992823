//! Output file names from user templates.
//!
//! A template such as `Show S{season}E{episode} [{quality}]` is filled from
//! whatever the source file name reveals. Missing season or episode numbers
//! become `XX`, a missing quality tag becomes `Unknown`.

use once_cell::sync::Lazy;
use regex_lite::Regex;

const MISSING_NUMBER: &str = "XX";
const MISSING_QUALITY: &str = "Unknown";
const MAX_NAME_BYTES: usize = 255;

#[derive(Clone, Copy)]
enum Groups {
    SeasonEpisode,
    EpisodeOnly,
}

#[derive(Clone, Copy)]
enum QualityTag {
    /// Use the matched text.
    AsFound,
    /// Use a fixed label.
    Fixed(&'static str),
}

fn compile<T: Copy>(patterns: &[(&str, T)]) -> Vec<(Regex, T)> {
    patterns
        .iter()
        .filter_map(|(pattern, tag)| Regex::new(pattern).ok().map(|re| (re, *tag)))
        .collect()
}

// Most specific first; the bare number is the last resort.
static EPISODE_PATTERNS: Lazy<Vec<(Regex, Groups)>> = Lazy::new(|| {
    compile(&[
        (r"(?i)S(\d+)(?:E|EP)(\d+)", Groups::SeasonEpisode),
        (r"(?i)S(\d+)[\s-]*(?:E|EP)(\d+)", Groups::SeasonEpisode),
        (r"(?i)Season\s*(\d+)\s*Episode\s*(\d+)", Groups::SeasonEpisode),
        (r"(?i)\[S(\d+)\]\[E(\d+)\]", Groups::SeasonEpisode),
        (r"(?i)S(\d+)[^\d]*(\d+)", Groups::SeasonEpisode),
        (r"(?i)(?:E|EP|Episode)\s*(\d+)", Groups::EpisodeOnly),
        (r"\b(\d+)\b", Groups::EpisodeOnly),
    ])
});

static QUALITY_PATTERNS: Lazy<Vec<(Regex, QualityTag)>> = Lazy::new(|| {
    compile(&[
        (r"(?i)\b(\d{3,4}[pi])\b", QualityTag::AsFound),
        (r"(?i)\b(4k|2160p)\b", QualityTag::Fixed("4k")),
        (r"(?i)\b(2k|1440p)\b", QualityTag::Fixed("2k")),
        (r"(?i)\b(HDRip|HDTV)\b", QualityTag::AsFound),
        (r"(?i)\b(4kX264|4kx265)\b", QualityTag::AsFound),
        (r"(?i)\[(\d{3,4}[pi])\]", QualityTag::AsFound),
    ])
});

/// Season and episode numbers found in a file name, as written.
pub fn extract_season_episode(name: &str) -> (Option<String>, Option<String>) {
    for (re, groups) in EPISODE_PATTERNS.iter() {
        let Some(caps) = re.captures(name) else {
            continue;
        };
        let group = |i: usize| caps.get(i).map(|m| m.as_str().to_string());
        return match groups {
            Groups::SeasonEpisode => (group(1), group(2)),
            Groups::EpisodeOnly => (None, group(1)),
        };
    }
    (None, None)
}

/// Quality tag found in a file name.
pub fn extract_quality(name: &str) -> Option<String> {
    QUALITY_PATTERNS.iter().find_map(|(re, tag)| {
        let caps = re.captures(name)?;
        match tag {
            QualityTag::AsFound => caps.get(1).map(|m| m.as_str().to_string()),
            QualityTag::Fixed(label) => Some((*label).to_string()),
        }
    })
}

/// Source name without extension, with dots and underscores as spaces.
pub fn title_of(source_name: &str) -> String {
    let stem = match source_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() <= 5 && !ext.contains(' ') => stem,
        _ => source_name,
    };
    stem.replace(['.', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fills `template` from `source_name` and appends `.ext`.
///
/// Placeholders: `{season}`, `{episode}`, `{quality}`, `{title}`. The result
/// is safe to use as a single path component.
pub fn render_file_name(template: &str, source_name: &str, ext: &str) -> String {
    let (season, episode) = extract_season_episode(source_name);
    let quality = extract_quality(source_name);

    let rendered = template
        .replace("{season}", season.as_deref().unwrap_or(MISSING_NUMBER))
        .replace("{episode}", episode.as_deref().unwrap_or(MISSING_NUMBER))
        .replace("{quality}", quality.as_deref().unwrap_or(MISSING_QUALITY))
        .replace("{title}", &title_of(source_name));

    let suffix = format!(".{}", ext);
    let base = rendered
        .strip_suffix(suffix.as_str())
        .unwrap_or(&rendered)
        .to_string();
    with_extension(&sanitize(&base), ext)
}

/// Default name for an output: the source title with the new extension.
pub fn default_file_name(source_name: &str, ext: &str) -> String {
    with_extension(&sanitize(&title_of(source_name)), ext)
}

fn with_extension(base: &str, ext: &str) -> String {
    let base = if base.is_empty() { "file" } else { base };
    let budget = MAX_NAME_BYTES.saturating_sub(ext.len() + 1);
    let mut end = base.len().min(budget);
    while !base.is_char_boundary(end) {
        end -= 1;
    }
    let base = base[..end].trim_end_matches([' ', '.']);
    let base = if base.is_empty() { "file" } else { base };
    format!("{}.{}", base, ext)
}

/// Replaces characters that are not allowed in file names.
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    replaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(['.', ' '])
        .to_string()
}
