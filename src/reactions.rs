use anyhow::Result;

/// Username -> emoji mapping, assigned by position.
#[derive(Debug, Clone)]
pub struct ReactionTable {
    entries: Vec<(String, String)>,
}

impl ReactionTable {
    /// Zip a comma-separated list of usernames against `emoji` by position.
    ///
    /// Blank names are skipped. More names than emoji is a configuration
    /// error rather than a silent truncation.
    pub fn from_names(names_csv: &str, emoji: &[String]) -> Result<Self> {
        let names: Vec<&str> = names_csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if names.len() > emoji.len() {
            anyhow::bail!(
                "{} team member(s) configured but only {} reaction emoji available",
                names.len(),
                emoji.len()
            );
        }

        let entries = names
            .into_iter()
            .zip(emoji.iter())
            .map(|(name, emoji)| (name.to_string(), emoji.clone()))
            .collect();

        Ok(Self { entries })
    }

    /// Emoji assigned to `username`, if any.
    pub fn resolve(&self, username: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == username)
            .map(|(_, emoji)| emoji.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emoji() -> Vec<String> {
        ["🔥", "🦄", "🐳"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_by_position() {
        let table = ReactionTable::from_names("alice, bob,carol", &emoji()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.resolve("alice"), Some("🔥"));
        assert_eq!(table.resolve("bob"), Some("🦄"));
        assert_eq!(table.resolve("carol"), Some("🐳"));
    }

    #[test]
    fn test_absent_name_not_found() {
        let table = ReactionTable::from_names("alice,bob", &emoji()).unwrap();
        assert_eq!(table.resolve("mallory"), None);
        assert_eq!(table.resolve("Alice"), None);
    }

    #[test]
    fn test_fewer_names_than_emoji() {
        let table = ReactionTable::from_names("alice", &emoji()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_too_many_names_rejected() {
        let result = ReactionTable::from_names("a,b,c,d", &emoji());
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_list() {
        let table = ReactionTable::from_names("", &emoji()).unwrap();
        assert_eq!(table.len(), 0);
        assert_eq!(table.resolve(""), None);
    }
}
