//! Bounded screen buffer for program output.

use std::borrow::Cow;

/// Rewrites text before it reaches a screen.
///
/// The screen filters its whole buffer once, at the end, so a value split
/// across several writes is still caught.
pub trait OutputFilter: Send + Sync {
    fn filter<'a>(&self, text: &'a str) -> Cow<'a, str>;

    /// Byte length of the longest value the filter rewrites.
    fn longest_match(&self) -> usize {
        0
    }

    /// Byte length of the longest suffix of `text` that is the start of a
    /// value the filter rewrites, but not the whole value.
    fn partial_suffix(&self, _text: &str) -> usize {
        0
    }
}

/// Passes text through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilter;

impl OutputFilter for NoFilter {
    fn filter<'a>(&self, text: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(text)
    }
}

/// Append-only text buffer capped at `limit` bytes of filtered output.
///
/// Raw writes are kept up to `limit` plus the filter's longest match, so
/// a value that starts inside the visible part is always seen whole.
pub struct Screen<'f> {
    raw: String,
    limit: usize,
    overflowed: bool,
    filter: &'f dyn OutputFilter,
}

impl<'f> Screen<'f> {
    #[must_use]
    pub fn new(limit: usize, filter: &'f dyn OutputFilter) -> Self {
        Self {
            raw: String::new(),
            limit,
            overflowed: false,
            filter,
        }
    }

    pub fn write(&mut self, text: &str) {
        if self.overflowed {
            return;
        }
        let cap = self.limit.saturating_add(self.filter.longest_match());
        let room = cap.saturating_sub(self.raw.len());
        if text.len() <= room {
            self.raw.push_str(text);
            return;
        }
        self.raw.push_str(&text[..floor_char_boundary(text, room)]);
        self.overflowed = true;
    }

    /// Filtered contents cut to `limit`, and whether anything was lost.
    ///
    /// A cut screen never ends with the opening bytes of a filtered value.
    #[must_use]
    pub fn finish(self) -> (String, bool) {
        let filtered = self.filter.filter(&self.raw);
        let mut truncated = self.overflowed;
        let mut end = filtered.len();
        if end > self.limit {
            end = floor_char_boundary(&filtered, self.limit);
            truncated = true;
        }
        if truncated {
            end -= self.filter.partial_suffix(&filtered[..end]);
        }
        (filtered[..end].to_owned(), truncated)
    }
}

fn floor_char_boundary(text: &str, mut at: usize) -> usize {
    at = at.min(text.len());
    while !text.is_char_boundary(at) {
        at -= 1;
    }
    at
}
