//! Minimal XHTML block-level walker (spec §4.5 step 5): just enough of a
//! parse tree to derive a block-level xpath, css selector, and fragment id
//! for a character offset, without pulling in a full DOM for what is really
//! a flat, block-granularity lookup.

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre", "td", "th",
];

#[derive(Debug, Clone)]
pub struct Block {
    pub tag: String,
    pub id: Option<String>,
    /// 1-based position among block-level elements in document order,
    /// restricted to direct descendants of `<body>` (spec §4.5 "crengine-safe
    /// xpath ... restricted to block-level tags").
    pub ordinal: usize,
    pub char_start: usize,
    pub char_end: usize,
}

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub full_text: String,
    pub blocks: Vec<Block>,
}

/// Parse an XHTML/HTML fragment into its block-level text runs. Tolerant of
/// malformed markup: unmatched tags are ignored rather than rejected.
pub fn parse(html: &str) -> ParsedDocument {
    let mut blocks = Vec::new();
    let mut full_text = String::new();
    let mut ordinal = 0usize;

    let mut chars = html.char_indices().peekable();
    let mut current_tag: Option<String> = None;
    let mut current_id: Option<String> = None;
    let mut current_start = 0usize;
    let mut buffer = String::new();

    while let Some((byte_idx, c)) = chars.next() {
        if c == '<' {
            let tag_start = byte_idx;
            let mut tag_end = html.len();
            for (j, c2) in html[tag_start..].char_indices() {
                if c2 == '>' {
                    tag_end = tag_start + j + 1;
                    break;
                }
            }
            let tag_src = &html[tag_start..tag_end];
            let is_closing = tag_src.starts_with("</");
            let name = tag_name(tag_src);

            if let Some(name) = name {
                if BLOCK_TAGS.contains(&name.as_str()) {
                    if is_closing {
                        if current_tag.as_deref() == Some(name.as_str()) {
                            let text = normalize_whitespace(&buffer);
                            let char_start = full_text.chars().count();
                            full_text.push_str(&text);
                            full_text.push(' ');
                            let char_end = full_text.chars().count();
                            blocks.push(Block {
                                tag: name,
                                id: current_id.take(),
                                ordinal,
                                char_start,
                                char_end,
                            });
                            current_tag = None;
                            buffer.clear();
                        }
                    } else if current_tag.is_none() {
                        ordinal += 1;
                        current_tag = Some(name);
                        current_id = extract_id(tag_src);
                        current_start = full_text.chars().count();
                        let _ = current_start;
                        buffer.clear();
                    }
                }
            }

            // advance the outer iterator past this tag
            while let Some(&(next_idx, _)) = chars.peek() {
                if next_idx >= tag_end {
                    break;
                }
                chars.next();
            }
            continue;
        }

        if current_tag.is_some() {
            buffer.push(c);
        }
    }

    ParsedDocument { full_text, blocks }
}

fn tag_name(tag_src: &str) -> Option<String> {
    let inner = tag_src.trim_start_matches("</").trim_start_matches('<');
    let end = inner
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(inner.len());
    let name = inner[..end].to_ascii_lowercase();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn extract_id(tag_src: &str) -> Option<String> {
    let marker = "id=\"";
    let start = tag_src.find(marker)? + marker.len();
    let end = tag_src[start..].find('"')? + start;
    Some(tag_src[start..end].to_string())
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl ParsedDocument {
    /// Find the block-level element containing `char_offset` into
    /// `full_text`; falls back to the nearest preceding block if the offset
    /// falls in inter-block whitespace (spec §4.5 "nearest ancestor
    /// block-level anchor").
    pub fn block_at(&self, char_offset: usize) -> Option<&Block> {
        self.blocks
            .iter()
            .find(|b| char_offset >= b.char_start && char_offset < b.char_end)
            .or_else(|| self.blocks.iter().rev().find(|b| b.char_end <= char_offset))
            .or_else(|| self.blocks.first())
    }

    /// A crengine-safe xpath restricted to block-level tags, anchored at
    /// `/body` without repeating it (spec §4.5 edge policy).
    pub fn xpath_for(&self, block: &Block) -> String {
        format!("/body/{}[{}]", block.tag, block.ordinal)
    }

    pub fn css_selector_for(&self, block: &Block) -> String {
        match &block.id {
            Some(id) => format!("#{}", id),
            None => format!("body > {}:nth-of-type({})", block.tag, block.ordinal),
        }
    }

    pub fn fragment_for(&self, block: &Block) -> Option<String> {
        block.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_paragraphs() {
        let html = "<body><p>Hello world.</p><p id=\"p2\">Second paragraph here.</p></body>";
        let doc = parse(html);
        assert_eq!(doc.blocks.len(), 2);
        assert_eq!(doc.blocks[0].tag, "p");
        assert_eq!(doc.blocks[1].id.as_deref(), Some("p2"));
    }

    #[test]
    fn xpath_avoids_double_body() {
        let html = "<body><div><p>Text</p></div></body>";
        let doc = parse(html);
        let block = &doc.blocks[0];
        let xpath = doc.xpath_for(block);
        assert_eq!(xpath.matches("body").count(), 1);
    }

    #[test]
    fn block_at_falls_back_to_nearest_preceding() {
        let html = "<body><p>One</p><p>Two</p></body>";
        let doc = parse(html);
        let last_end = doc.blocks.last().unwrap().char_end;
        let block = doc.block_at(last_end + 5).unwrap();
        assert_eq!(block.tag, "p");
    }
}
