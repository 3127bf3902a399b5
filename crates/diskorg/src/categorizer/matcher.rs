use crate::config::schema::Category;

/// Keyword classifier built from a category rule set.
///
/// Matching is a case-insensitive substring test against the file name.
/// Each category contributes at most once; the highest priority match wins
/// and equal priorities resolve to the category declared first.
pub struct Categorizer {
    rules: Vec<CompiledRule>,
    fallback: Option<CompiledRule>,
}

struct CompiledRule {
    name: String,
    priority: i64,
    target_dir: String,
    /// Lower-cased, never empty.
    keywords: Vec<String>,
}

impl CompiledRule {
    fn from_category(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            priority: category.priority,
            target_dir: category.target_dir.clone(),
            keywords: category
                .keywords
                .iter()
                .filter(|kw| !kw.is_empty())
                .map(|kw| kw.to_lowercase())
                .collect(),
        }
    }

    fn first_match(&self, lower_name: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|kw| lower_name.contains(kw.as_str()))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorizationResult {
    pub category: String,
    pub target_dir: String,
    /// The keyword that selected the category; `None` for the fallback.
    pub keyword: Option<String>,
}

impl Categorizer {
    pub fn new(categories: &[Category]) -> Self {
        let rules = categories.iter().map(CompiledRule::from_category).collect();
        let fallback = categories
            .iter()
            .find(|c| c.is_fallback())
            .map(CompiledRule::from_category);

        Self { rules, fallback }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn categorize(&self, file_name: &str) -> Option<CategorizationResult> {
        let lower_name = file_name.to_lowercase();

        let mut best: Option<(&CompiledRule, &str)> = None;
        for rule in &self.rules {
            let Some(keyword) = rule.first_match(&lower_name) else {
                continue;
            };
            match best {
                Some((current, _)) if current.priority >= rule.priority => {}
                _ => best = Some((rule, keyword)),
            }
        }

        if let Some((rule, keyword)) = best {
            return Some(CategorizationResult {
                category: rule.name.clone(),
                target_dir: rule.target_dir.clone(),
                keyword: Some(keyword.to_string()),
            });
        }

        self.fallback.as_ref().map(|rule| CategorizationResult {
            category: rule.name.clone(),
            target_dir: rule.target_dir.clone(),
            keyword: None,
        })
    }

    pub fn resolve_target(&self, file_name: &str) -> Option<String> {
        self.categorize(file_name).map(|result| result.target_dir)
    }
}

/// One-shot form of [`Categorizer::resolve_target`].
pub fn resolve_target(file_name: &str, categories: &[Category]) -> Option<String> {
    Categorizer::new(categories).resolve_target(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Vec<Category> {
        vec![
            Category::new("Movies", 5, "Sorted/Movies", &["1080p", "bluray"]),
            Category::new("Series", 9, "Sorted/Series", &["s01", "s02"]),
            Category::new("Docs", 1, "Sorted/Docs", &["invoice", ".pdf"]),
        ]
    }

    #[test]
    fn test_simple_keyword_match() {
        let categorizer = Categorizer::new(&rules());
        let result = categorizer.categorize("holiday.1080p.mkv").unwrap();
        assert_eq!(result.category, "Movies");
        assert_eq!(result.target_dir, "Sorted/Movies");
        assert_eq!(result.keyword.as_deref(), Some("1080p"));
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let categories = vec![Category::new("Docs", 1, "Docs", &["InVoice"])];
        assert_eq!(
            resolve_target("ACME-INVOICE-2024.PDF", &categories),
            Some("Docs".to_string())
        );
    }

    #[test]
    fn test_higher_priority_wins_regardless_of_order() {
        let name = "Show.S01E02.1080p.mkv";
        assert_eq!(resolve_target(name, &rules()), Some("Sorted/Series".into()));

        let mut reversed = rules();
        reversed.reverse();
        assert_eq!(resolve_target(name, &reversed), Some("Sorted/Series".into()));
    }

    #[test]
    fn test_equal_priority_first_declared_wins() {
        let categories = vec![
            Category::new("A", 3, "A", &["report"]),
            Category::new("B", 3, "B", &["report"]),
        ];
        assert_eq!(resolve_target("report.txt", &categories), Some("A".into()));
    }

    #[test]
    fn test_category_contributes_once() {
        // Many matching keywords in a low-priority category must not outweigh
        // a single match in a higher-priority one.
        let categories = vec![
            Category::new("Many", 1, "Many", &["a", "b", "c"]),
            Category::new("One", 2, "One", &["abc"]),
        ];
        assert_eq!(resolve_target("abc", &categories), Some("One".into()));
    }

    #[test]
    fn test_no_match_uses_others() {
        let mut categories = rules();
        categories.push(Category::new("Others", 0, "Sorted/Others", &[]));

        let result = Categorizer::new(&categories)
            .categorize("random.bin")
            .unwrap();
        assert_eq!(result.category, "Others");
        assert_eq!(result.target_dir, "Sorted/Others");
        assert!(result.keyword.is_none());
    }

    #[test]
    fn test_no_match_without_others_skips() {
        assert_eq!(resolve_target("random.bin", &rules()), None);
    }

    #[test]
    fn test_empty_keyword_never_matches() {
        let categories = vec![Category::new("Everything", 100, "All", &[""])];
        assert_eq!(resolve_target("anything.txt", &categories), None);
    }

    #[test]
    fn test_category_without_keywords_matches_nothing() {
        let categories = vec![
            Category::new("Empty", 100, "Empty", &[]),
            Category::new("Docs", 1, "Docs", &["pdf"]),
        ];
        assert_eq!(resolve_target("a.pdf", &categories), Some("Docs".into()));
        assert_eq!(resolve_target("a.txt", &categories), None);
    }

    #[test]
    fn test_decision_is_deterministic() {
        let categorizer = Categorizer::new(&rules());
        let first = categorizer.categorize("Show.S02.bluray.mkv");
        for _ in 0..10 {
            assert_eq!(categorizer.categorize("Show.S02.bluray.mkv"), first);
        }
    }

    #[test]
    fn test_empty_rule_set() {
        let categorizer = Categorizer::new(&[]);
        assert!(categorizer.is_empty());
        assert_eq!(categorizer.resolve_target("file.txt"), None);
    }
}
