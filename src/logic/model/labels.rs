//! Class labels - one label per line

use std::path::Path;

use super::inference::InferenceError;

#[derive(Debug, Clone, Default)]
pub struct Labels(Vec<String>);

impl Labels {
    /// Blank lines are skipped, surrounding whitespace trimmed
    pub fn parse(text: &str) -> Self {
        Self(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| InferenceError(format!("Failed to read labels {:?}: {}", path, e)))?;
        let labels = Self::parse(&text);
        if labels.is_empty() {
            log::warn!("Labels file {:?} is empty - labels will be class indices", path);
        }
        log::info!("Loaded {} labels from {:?}", labels.len(), path);
        Ok(labels)
    }

    /// Label for a class index, `class_<i>` when the file is short
    pub fn get(&self, index: usize) -> String {
        self.0
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", index))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_and_fallback() {
        let labels = Labels::parse("cat\n\n  dog  \r\nbird\n");
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.get(1), "dog");
        assert_eq!(labels.get(7), "class_7");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "zebra\nlion").unwrap();
        let labels = Labels::load(file.path()).unwrap();
        assert_eq!(labels.get(0), "zebra");
        assert!(Labels::load(Path::new("/nonexistent/labels.txt")).is_err());
    }
}
