//! Secret scrubbing for program screens.

use std::borrow::Cow;

use emporia_types::RedactionConfig;
use emporia_vm::OutputFilter;

/// Replaces configured secret values with `[label]`.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    /// (value, replacement), longest value first so a secret that contains
    /// another is replaced whole.
    secrets: Vec<(String, String)>,
}

impl Redactor {
    #[must_use]
    pub fn new(config: &RedactionConfig) -> Self {
        let mut secrets: Vec<(String, String)> = config
            .pairs()
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(label, value)| (value.to_owned(), format!("[{label}]")))
            .collect();
        secrets.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { secrets }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl OutputFilter for Redactor {
    fn filter<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if !self.secrets.iter().any(|(value, _)| text.contains(value.as_str())) {
            return Cow::Borrowed(text);
        }
        let mut out = text.to_owned();
        for (value, replacement) in &self.secrets {
            if out.contains(value.as_str()) {
                out = out.replace(value.as_str(), replacement);
            }
        }
        Cow::Owned(out)
    }

    fn longest_match(&self) -> usize {
        self.secrets.first().map_or(0, |(value, _)| value.len())
    }

    fn partial_suffix(&self, text: &str) -> usize {
        let tail = text.as_bytes();
        self.secrets
            .iter()
            .filter_map(|(value, _)| {
                (1..value.len().min(tail.len() + 1))
                    .rev()
                    .find(|&n| {
                        text.is_char_boundary(tail.len() - n)
                            && tail.ends_with(&value.as_bytes()[..n])
                    })
            })
            .max()
            .unwrap_or(0)
    }
}
