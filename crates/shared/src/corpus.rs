use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

/// A paper from the user's reference library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusPaper {
    pub key: String,
    pub title: String,
    pub abstract_text: String,
    pub date_added: DateTime<Utc>,
    /// Slash-joined collection paths, e.g. `Reading/Transformers`.
    pub paths: Vec<String>,
}

struct IgnoreRule {
    matcher: GlobSet,
    negated: bool,
}

/// Gitignore-style filter over collection paths. The last matching rule wins.
#[derive(Default)]
pub struct IgnoreFilter {
    rules: Vec<IgnoreRule>,
}

impl IgnoreFilter {
    /// Parse patterns separated by newlines or commas.
    pub fn parse(text: &str) -> Result<Self> {
        let mut rules = Vec::new();

        for raw in text.split(['\n', ',']) {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (negated, pattern) = match line.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, line),
            };
            let pattern = pattern.trim_end_matches('/');
            if pattern.is_empty() {
                continue;
            }

            rules.push(IgnoreRule {
                matcher: Self::compile(pattern)
                    .with_context(|| format!("Invalid ignore pattern: {}", line))?,
                negated,
            });
        }

        Ok(Self { rules })
    }

    fn compile(pattern: &str) -> Result<GlobSet> {
        // A leading slash or an inner slash anchors the pattern at the library root
        let anchored = pattern.starts_with('/') || pattern.contains('/');
        let pattern = pattern.trim_start_matches('/');

        let globs = if anchored {
            vec![pattern.to_string(), format!("{}/**", pattern)]
        } else {
            vec![
                pattern.to_string(),
                format!("{}/**", pattern),
                format!("**/{}", pattern),
                format!("**/{}/**", pattern),
            ]
        };

        let mut builder = GlobSetBuilder::new();
        for glob in globs {
            builder.add(GlobBuilder::new(&glob).literal_separator(true).build()?);
        }
        Ok(builder.build()?)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        let path = path.trim_matches('/');
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matcher.is_match(path))
            .map(|rule| !rule.negated)
            .unwrap_or(false)
    }
}

/// Drop every paper that sits in at least one ignored collection.
pub fn filter_corpus(corpus: Vec<CorpusPaper>, filter: &IgnoreFilter) -> Vec<CorpusPaper> {
    if filter.is_empty() {
        return corpus;
    }

    let before = corpus.len();
    let kept: Vec<CorpusPaper> = corpus
        .into_iter()
        .filter(|paper| !paper.paths.iter().any(|p| filter.is_ignored(p)))
        .collect();

    tracing::debug!(before, after = kept.len(), "Applied corpus ignore filter");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(key: &str, paths: &[&str]) -> CorpusPaper {
        CorpusPaper {
            key: key.to_string(),
            title: format!("Paper {}", key),
            abstract_text: "abstract".to_string(),
            date_added: Utc::now(),
            paths: paths.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn unanchored_pattern_matches_at_any_depth() {
        let filter = IgnoreFilter::parse("Archive").unwrap();
        assert!(filter.is_ignored("Archive"));
        assert!(filter.is_ignored("Work/Archive"));
        assert!(filter.is_ignored("Work/Archive/2019"));
        assert!(!filter.is_ignored("Work/Archives"));
    }

    #[test]
    fn anchored_pattern_only_matches_from_root() {
        let filter = IgnoreFilter::parse("/Work/Old").unwrap();
        assert!(filter.is_ignored("Work/Old"));
        assert!(filter.is_ignored("Work/Old/Drafts"));
        assert!(!filter.is_ignored("Home/Work/Old"));
    }

    #[test]
    fn wildcards_stay_within_one_level() {
        let filter = IgnoreFilter::parse("Teaching/*").unwrap();
        assert!(filter.is_ignored("Teaching/2023"));
        assert!(!filter.is_ignored("Teaching"));
    }

    #[test]
    fn negation_reincludes_and_last_rule_wins() {
        let filter = IgnoreFilter::parse("Archive\n!Archive/Keep\n# comment\n").unwrap();
        assert!(filter.is_ignored("Archive/Drop"));
        assert!(!filter.is_ignored("Archive/Keep"));
    }

    #[test]
    fn comma_separated_patterns_are_accepted() {
        let filter = IgnoreFilter::parse("Archive, Teaching/").unwrap();
        assert!(filter.is_ignored("Teaching"));
        assert!(filter.is_ignored("Archive"));
    }

    #[test]
    fn filter_drops_papers_with_any_ignored_path() {
        let filter = IgnoreFilter::parse("Archive").unwrap();
        let corpus = vec![
            paper("a", &["Reading"]),
            paper("b", &["Reading", "Archive/2020"]),
            paper("c", &[]),
        ];
        let kept: Vec<String> = filter_corpus(corpus, &filter)
            .into_iter()
            .map(|p| p.key)
            .collect();
        assert_eq!(kept, vec!["a", "c"]);
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let filter = IgnoreFilter::parse("\n  \n").unwrap();
        assert!(filter.is_empty());
        let corpus = vec![paper("a", &["Archive"])];
        assert_eq!(filter_corpus(corpus, &filter).len(), 1);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(IgnoreFilter::parse("Reading/[unclosed").is_err());
    }
}
