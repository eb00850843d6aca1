use std::borrow::Cow;
use std::fs::read_to_string;
use std::path::Path;

use crate::error::Result;

/// Class names indexed by class id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelTable {
    labels: Vec<Option<String>>,
}

impl LabelTable {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Like `from_file`, but a missing or unreadable file yields a table
    /// built from `fallback`. Names it does not cover become placeholders.
    pub fn from_file_or(path: &Path, fallback: &[String]) -> Self {
        match Self::from_file(path) {
            Ok(labels) => labels,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, fallback = fallback.len(), "could not load labels");
                Self::from_names(fallback.iter().cloned())
            }
        }
    }

    /// One label per non-blank line. A line written as `<index> <name>`
    /// places the name at that index instead of the next free position.
    pub fn parse(text: &str) -> Self {
        let mut labels: Vec<Option<String>> = Vec::new();
        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let (index, name) = match line.split_once(char::is_whitespace) {
                Some((first, rest)) => match first.parse::<usize>() {
                    Ok(index) => (index, rest.trim()),
                    Err(_) => (labels.len(), line),
                },
                None => (labels.len(), line),
            };
            if labels.len() <= index {
                labels.resize(index + 1, None);
            }
            labels[index] = Some(name.to_string());
        }
        Self { labels }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: names.into_iter().map(|name| Some(name.into())).collect(),
        }
    }

    pub fn lookup(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).and_then(|label| label.as_deref())
    }

    pub fn name_for(&self, class_id: usize) -> Cow<'_, str> {
        match self.lookup(class_id) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("class_{}", class_id)),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
