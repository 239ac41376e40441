//! Exercise catalog: exercise names mapped to tutorial video links.
//!
//! File format, one exercise per line:
//! `Exercise Name|||https://url-one|||https://url-two`.
//! Blank lines and lines starting with `#` are skipped.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// Most exercises reported from a single response
pub const MAX_EXTRACTED: usize = 8;

const SEPARATOR: &str = "|||";

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub urls: Vec<String>,
}

/// Keyed by lowercase exercise name
#[derive(Debug, Clone, Default)]
pub struct ExerciseCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl ExerciseCatalog {
    /// Load from disk. A missing file yields an empty catalog.
    pub fn load(path: &Path) -> io::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let catalog = Self::parse(&text);
                tracing::info!(exercises = catalog.len(), path = %path.display(), "exercise catalog loaded");
                Ok(catalog)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "exercise catalog not found, links disabled");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn parse(text: &str) -> Self {
        let mut entries = BTreeMap::new();

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split(SEPARATOR).map(str::trim);
            let Some(name) = parts.next().filter(|n| !n.is_empty()) else {
                continue;
            };
            if !line.contains(SEPARATOR) {
                continue;
            }

            let urls = parts.filter(|u| !u.is_empty()).map(String::from).collect();
            // Later lines override earlier ones with the same name.
            entries.insert(
                name.to_lowercase(),
                CatalogEntry {
                    name: name.to_string(),
                    urls,
                },
            );
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Catalog exercises mentioned in `text`, case-insensitively, ordered by
    /// first mention then name, at most [`MAX_EXTRACTED`].
    pub fn extract(&self, text: &str) -> Vec<String> {
        let haystack = text.to_lowercase();

        let mut found: Vec<(usize, &str)> = self
            .entries
            .iter()
            .filter_map(|(key, entry)| haystack.find(key.as_str()).map(|pos| (pos, entry.name.as_str())))
            .collect();

        found.sort_unstable();
        found
            .into_iter()
            .take(MAX_EXTRACTED)
            .map(|(_, name)| name.to_string())
            .collect()
    }

    /// Links for an exercise: exact name first, otherwise a substring match
    /// in either direction where the longest key wins, then the
    /// lexicographically smallest.
    pub fn links(&self, exercise: &str) -> &[String] {
        let wanted = exercise.trim().to_lowercase();
        if wanted.is_empty() {
            return &[];
        }

        if let Some(entry) = self.entries.get(&wanted) {
            return &entry.urls;
        }

        self.entries
            .iter()
            .filter(|(key, _)| key.contains(wanted.as_str()) || wanted.contains(key.as_str()))
            .min_by(|(a, _), (b, _)| {
                b.chars()
                    .count()
                    .cmp(&a.chars().count())
                    .then_with(|| a.cmp(b))
            })
            .map(|(_, entry)| entry.urls.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "\
# name|||links
Squat|||https://yt/squat-1|||https://yt/squat-2
Front Squat|||https://yt/front-squat
Deadlift|||https://yt/deadlift

Romanian Deadlift|||https://yt/rdl
Plank|||
not a catalog line
";

    #[test]
    fn test_parse_skips_comments_and_malformed_lines() {
        let catalog = ExerciseCatalog::parse(CATALOG);
        assert_eq!(catalog.len(), 5);
        assert!(catalog.links("plank").is_empty());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp = tempfile::TempDir::new().unwrap();
        let catalog = ExerciseCatalog::load(&temp.path().join("absent.txt")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_extract_orders_by_first_mention() {
        let catalog = ExerciseCatalog::parse(CATALOG);
        let found = catalog.extract("Start with the PLANK, then deadlift, then squat.");
        assert_eq!(found, vec!["Plank", "Deadlift", "Squat"]);
    }

    #[test]
    fn test_extract_caps_results() {
        let lines: String = (0..12).map(|i| format!("Move{i:02}|||https://yt/{i}\n")).collect();
        let catalog = ExerciseCatalog::parse(&lines);
        let text: String = (0..12).map(|i| format!("move{i:02} ")).collect();

        let found = catalog.extract(&text);
        assert_eq!(found.len(), MAX_EXTRACTED);
        assert_eq!(found[0], "Move00");
    }

    #[test]
    fn test_links_exact_match_first() {
        let catalog = ExerciseCatalog::parse(CATALOG);
        assert_eq!(
            catalog.links("  SQUAT "),
            ["https://yt/squat-1", "https://yt/squat-2"]
        );
    }

    #[test]
    fn test_links_partial_match_prefers_longest_key() {
        let catalog = ExerciseCatalog::parse(CATALOG);
        // Both "deadlift" and "romanian deadlift" are contained in the query.
        assert_eq!(
            catalog.links("single leg romanian deadlift"),
            ["https://yt/rdl"]
        );
        // "squa" is contained in "squat" and "front squat".
        assert_eq!(catalog.links("squa"), ["https://yt/front-squat"]);
    }

    #[test]
    fn test_links_unknown_or_blank_is_empty() {
        let catalog = ExerciseCatalog::parse(CATALOG);
        assert!(catalog.links("swimming").is_empty());
        assert!(catalog.links("   ").is_empty());
    }
}
