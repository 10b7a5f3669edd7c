//! Line scanner that tracks fenced code blocks and masks inline code spans.
//!
//! Reference extraction runs regexes per line, so block state (inside a
//! fence or not) has to be carried across lines here. Masking replaces code
//! span bytes with spaces, keeping byte offsets identical to the source line.

use std::borrow::Cow;

#[derive(Debug, Clone, Copy)]
struct Fence {
    marker: u8,
    len: usize,
    line: usize,
}

/// One scannable line of a document.
pub struct ScanLine<'a> {
    /// 1-based line number.
    pub number: usize,
    /// Byte offset of the line start in the document.
    pub offset: usize,
    /// Line text without its terminator.
    pub text: &'a str,
    /// `text` with inline code spans blanked out (when enabled).
    pub masked: Cow<'a, str>,
}

/// Iterates over lines outside fenced code blocks.
pub struct MarkdownScanner<'a> {
    content: &'a str,
    pos: usize,
    number: usize,
    skip_code_blocks: bool,
    skip_inline_code: bool,
    fence: Option<Fence>,
}

impl<'a> MarkdownScanner<'a> {
    pub fn new(content: &'a str, skip_code_blocks: bool, skip_inline_code: bool) -> Self {
        Self {
            content,
            pos: 0,
            number: 0,
            skip_code_blocks,
            skip_inline_code,
            fence: None,
        }
    }

    /// Line number of a fence still open after the whole document was consumed.
    pub fn unclosed_fence(&self) -> Option<usize> {
        if self.pos >= self.content.len() {
            self.fence.map(|f| f.line)
        } else {
            None
        }
    }

    fn next_raw(&mut self) -> Option<(usize, usize, &'a str)> {
        if self.pos >= self.content.len() {
            return None;
        }
        let rest = &self.content[self.pos..];
        let (line, advance) = match rest.find('\n') {
            Some(i) => (&rest[..i], i + 1),
            None => (rest, rest.len()),
        };
        let line = line.strip_suffix('\r').unwrap_or(line);
        let offset = self.pos;
        self.pos += advance;
        self.number += 1;
        Some((self.number, offset, line))
    }
}

/// Opening/closing fence marker of a line: (`` ` `` or `~`, run length).
fn fence_marker(line: &str) -> Option<(u8, usize)> {
    let t = line.trim_start();
    let first = *t.as_bytes().first()?;
    if first != b'`' && first != b'~' {
        return None;
    }
    let len = t.bytes().take_while(|b| *b == first).count();
    if len < 3 {
        return None;
    }
    // backtick fences may not carry backticks in their info string
    if first == b'`' && t[len..].contains('`') {
        return None;
    }
    Some((first, len))
}

impl<'a> Iterator for MarkdownScanner<'a> {
    type Item = ScanLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (number, offset, text) = self.next_raw()?;
            if self.skip_code_blocks {
                match (self.fence, fence_marker(text)) {
                    (None, Some((marker, len))) => {
                        self.fence = Some(Fence {
                            marker,
                            len,
                            line: number,
                        });
                        continue;
                    }
                    (Some(open), Some((marker, len))) => {
                        let closing = marker == open.marker
                            && len >= open.len
                            && text.trim_start()[len..].trim().is_empty();
                        if closing {
                            self.fence = None;
                        }
                        continue;
                    }
                    (Some(_), None) => continue,
                    (None, None) => {}
                }
            }
            let masked = if self.skip_inline_code {
                mask_inline_code(text)
            } else {
                Cow::Borrowed(text)
            };
            return Some(ScanLine {
                number,
                offset,
                text,
                masked,
            });
        }
    }
}

/// Blank out inline code spans (`` `x` ``, ``` ``x`` ```) byte-for-byte.
///
/// A backtick run opens a span that closes at the next run of the same
/// length; an unmatched run is left as literal text.
pub fn mask_inline_code(line: &str) -> Cow<'_, str> {
    if !line.contains('`') {
        return Cow::Borrowed(line);
    }
    let bytes = line.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    let mut changed = false;
    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let run = bytes[i..].iter().take_while(|b| **b == b'`').count();
        let mut j = i + run;
        let mut close = None;
        while j < bytes.len() {
            if bytes[j] == b'`' {
                let r = bytes[j..].iter().take_while(|b| **b == b'`').count();
                if r == run {
                    close = Some(j + r);
                    break;
                }
                j += r;
            } else {
                j += 1;
            }
        }
        match close {
            Some(end) => {
                for b in &mut out[i..end] {
                    *b = b' ';
                }
                changed = true;
                i = end;
            }
            None => i += run,
        }
    }
    if !changed {
        return Cow::Borrowed(line);
    }
    // every masked byte is ASCII, untouched bytes are whole UTF-8 sequences
    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_inline_code_preserves_length() {
        let line = "a `![x](y.png)` b ``c`d`` e";
        let m = mask_inline_code(line);
        assert_eq!(m.len(), line.len());
        assert!(!m.contains("y.png"));
        assert!(!m.contains("c`d"));
        assert!(m.starts_with("a "));
        assert!(m.ends_with(" e"));
    }

    #[test]
    fn test_mask_inline_code_leaves_unmatched_backticks() {
        let line = "a ` b ![x](y.png)";
        assert_eq!(mask_inline_code(line), line);
    }

    #[test]
    fn test_scanner_skips_fenced_blocks() {
        let doc = "one\n```md\n![x](a.png)\n```\ntwo\n~~~~\n```\nstill code\n~~~~\nthree";
        let sc = MarkdownScanner::new(doc, true, true);
        let got: Vec<(usize, String)> = sc.map(|l| (l.number, l.text.to_string())).collect();
        assert_eq!(
            got,
            vec![
                (1, "one".to_string()),
                (5, "two".to_string()),
                (10, "three".to_string())
            ]
        );
    }

    #[test]
    fn test_scanner_reports_unclosed_fence() {
        let doc = "a\n```\nb\n";
        let mut sc = MarkdownScanner::new(doc, true, true);
        let lines: Vec<_> = sc.by_ref().map(|l| l.number).collect();
        assert_eq!(lines, vec![1]);
        assert_eq!(sc.unclosed_fence(), Some(2));
    }

    #[test]
    fn test_scanner_offsets_and_crlf() {
        let doc = "ab\r\ncd\n";
        let sc = MarkdownScanner::new(doc, false, false);
        let got: Vec<(usize, &str)> = sc.map(|l| (l.offset, l.text)).collect();
        assert_eq!(got, vec![(0, "ab"), (4, "cd")]);
    }

    #[test]
    fn test_scanner_keeps_fences_when_disabled() {
        let doc = "```\n![x](a.png)\n```";
        let sc = MarkdownScanner::new(doc, false, false);
        assert_eq!(sc.count(), 3);
    }
}
