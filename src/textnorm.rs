//! Text normalization shared by the alignment builder (C4) and the text
//! locator (C5): lowercase, collapse whitespace, strip non-letters, while
//! keeping a mapping back to original character offsets (spec §4.5 step 1).

/// Normalized characters paired with the original char-index each one came
/// from, so a match in normalized space can be translated back.
pub struct Normalized {
    pub chars: Vec<char>,
    pub origin: Vec<usize>,
}

impl Normalized {
    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Original char offset a normalized-space offset maps back to.
    pub fn origin_at(&self, normalized_offset: usize) -> usize {
        self.origin
            .get(normalized_offset)
            .copied()
            .unwrap_or_else(|| self.origin.last().copied().unwrap_or(0))
    }
}

pub fn normalize(text: &str) -> Normalized {
    let mut chars = Vec::with_capacity(text.len());
    let mut origin = Vec::with_capacity(text.len());
    let mut last_was_space = true; // collapse leading whitespace too

    for (idx, c) in text.chars().enumerate() {
        if c.is_alphabetic() {
            for lower in c.to_lowercase() {
                chars.push(lower);
                origin.push(idx);
            }
            last_was_space = false;
        } else if c.is_whitespace() {
            if !last_was_space {
                chars.push(' ');
                origin.push(idx);
                last_was_space = true;
            }
        }
        // digits and punctuation are dropped entirely: they rarely survive
        // narration-to-print deviations intact.
    }

    while chars.last() == Some(&' ') {
        chars.pop();
        origin.pop();
    }

    Normalized { chars, origin }
}

/// Count non-overlapping occurrences of `needle` inside `haystack`.
pub fn count_occurrences(haystack: &[char], needle: &[char]) -> usize {
    if needle.is_empty() || haystack.len() < needle.len() {
        return 0;
    }
    let mut count = 0;
    for start in 0..=(haystack.len() - needle.len()) {
        if &haystack[start..start + needle.len()] == needle {
            count += 1;
        }
    }
    count
}

/// Byte offset of the first occurrence of `needle`, if any.
pub fn find_first(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=(haystack.len() - needle.len())).find(|&start| haystack[start..start + needle.len()] == *needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_collapses_whitespace() {
        let n = normalize("Hello,   World!\n\nFoo.");
        assert_eq!(n.as_string(), "hello world foo");
    }

    #[test]
    fn origin_maps_back_to_original_offsets() {
        let n = normalize("Hi there");
        // first normalized char 'h' maps to original index 0
        assert_eq!(n.origin_at(0), 0);
    }

    #[test]
    fn count_occurrences_finds_unique_match() {
        let hay = normalize("the quick brown fox jumps over the lazy dog");
        let needle = normalize("brown fox");
        assert_eq!(count_occurrences(&hay.chars, &needle.chars), 1);
    }
}
