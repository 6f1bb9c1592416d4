//! Text helpers used before handing answer text to the markdown renderer.

/// Split text into paragraph-sized blocks.
///
/// Blocks are separated by one or more blank lines; each block is trimmed and
/// empty blocks are dropped. Rendering block by block keeps earlier blocks
/// stable while the last one is still growing.
#[must_use]
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut start = 0;
    let mut rest = text;

    while let Some(pos) = find_blank_line(rest) {
        blocks.push(&text[start..start + pos.0]);
        start += pos.1;
        rest = &text[start..];
    }
    blocks.push(&text[start..]);

    blocks
        .into_iter()
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .collect()
}

/// Find the first run of two or more consecutive newlines.
///
/// Returns the byte offset where the run starts and where it ends.
fn find_blank_line(s: &str) -> Option<(usize, usize)> {
    let start = s.find("\n\n")?;
    let end = start + s[start..].bytes().take_while(|b| *b == b'\n').count();
    Some((start, end))
}
