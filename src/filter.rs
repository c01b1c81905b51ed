/// decides which changed paths count toward a commit's line totals
///
/// a path is in scope when it starts with one of `include_prefixes`, does not
/// end with any of `exclude_suffixes` and contains none of `exclude_patterns`.
/// with empty exclusion lists this is a plain prefix match; with no prefixes
/// nothing is in scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilter {
    pub include_prefixes: Vec<String>,
    pub exclude_suffixes: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

impl FileFilter {
    pub fn new(
        include_prefixes: Vec<String>,
        exclude_suffixes: Vec<String>,
        exclude_patterns: Vec<String>,
    ) -> Self {
        Self {
            include_prefixes,
            exclude_suffixes,
            exclude_patterns,
        }
    }

    pub fn accepts(&self, path: &str) -> bool {
        self.include_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
            && !self
                .exclude_suffixes
                .iter()
                .any(|suffix| path.ends_with(suffix.as_str()))
            && !self
                .exclude_patterns
                .iter()
                .any(|pattern| path.contains(pattern.as_str()))
    }
}
