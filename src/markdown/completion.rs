//! Repair of truncated markdown.
//!
//! Streamed assistant text is cut at arbitrary points: half a code fence, an
//! opening `**` whose closer has not arrived yet, a link destination still
//! being typed. [`complete_markdown`] appends the missing closers so the
//! converter sees well-formed input and the rendered HTML does not flicker
//! between "literal asterisks" and "bold" as the stream advances.
//!
//! Only the trailing block is inspected. Emphasis cannot span a blank line
//! or a list item, and fenced code is closed separately, so anything before
//! the last block boundary is returned untouched. A fence opened inside a
//! list item or blockquote is closed with that container's prefix, and code
//! lines typed without the item's indentation are indented into it.

/// An open fenced code block.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fence {
    marker: char,
    len: usize,
    /// Nesting depth of `>` blockquote markers in front of the opener.
    quote_depth: usize,
    /// Column of the opener after the blockquote prefix.
    indent: usize,
    /// Indentation code lines need to stay inside the enclosing list item.
    content_indent: usize,
    /// Text emitted in front of the closing marker.
    prefix: String,
    /// Byte offset of the first code line.
    body_start: usize,
}

/// Blockquote markers and indentation in front of a line's content.
#[derive(Debug)]
struct Container<'a> {
    quote: &'a str,
    indent: usize,
    rest: &'a str,
}

impl Container<'_> {
    fn quote_depth(&self) -> usize {
        self.quote.matches('>').count()
    }
}

/// Result of scanning the text line by line for block structure.
#[derive(Debug)]
struct BlockScan {
    /// Fence still open at end of input.
    open_fence: Option<Fence>,
    /// Byte offset where the trailing block starts.
    last_block_start: usize,
    /// The trailing block is indented code and has no inline markup.
    indented_code: bool,
}

/// Inline delimiters that need a closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delim {
    Emphasis(char),
    Strong(char),
    Strike,
}

impl Delim {
    fn closer(self) -> &'static str {
        match self {
            Self::Emphasis('_') => "_",
            Self::Emphasis(_) => "*",
            Self::Strong('_') => "__",
            Self::Strong(_) => "**",
            Self::Strike => "~~",
        }
    }

    fn width(self) -> usize {
        match self {
            Self::Emphasis(_) => 1,
            Self::Strong(_) | Self::Strike => 2,
        }
    }

    fn marker(self) -> char {
        match self {
            Self::Emphasis(m) | Self::Strong(m) => m,
            Self::Strike => '~',
        }
    }
}

/// How the trailing block has to be patched.
#[derive(Debug, Default)]
struct InlineRepair {
    /// Bytes of the block to keep; shorter than the block when a dangling
    /// opener is dropped.
    keep: usize,
    closers: String,
}

/// Returns `text` with unterminated markdown constructs closed.
///
/// Never fails. Input that is already well formed, or that cannot be
/// repaired unambiguously, is returned unchanged.
///
/// ```rust
/// use markdown_stream_wc::markdown::complete_markdown;
///
/// assert_eq!(complete_markdown("**bold"), "**bold**");
/// assert_eq!(complete_markdown("```rust\nfn main() {"), "```rust\nfn main() {\n```");
/// assert_eq!(complete_markdown("1. ```sh\nls"), "1. ```sh\n   ls\n   ```");
/// ```
pub fn complete_markdown(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let scan = scan_blocks(text);
    if let Some(fence) = scan.open_fence {
        return close_fence(text, &fence);
    }
    if scan.indented_code {
        return text.to_string();
    }

    let (head, tail) = text.split_at(scan.last_block_start);
    let repair = repair_inline(tail);
    if repair.keep == tail.len() && repair.closers.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + repair.closers.len());
    out.push_str(head);
    out.push_str(tail[..repair.keep].trim_end());
    out.push_str(&repair.closers);
    out
}

fn close_fence(text: &str, fence: &Fence) -> String {
    let (head, body) = text.split_at(fence.body_start.min(text.len()));
    let mut out = String::with_capacity(text.len() + fence.prefix.len() + fence.len + 8);
    out.push_str(head);
    for line in body.split_inclusive('\n') {
        let spaces = line.len() - line.trim_start_matches(' ').len();
        if spaces < fence.content_indent && !line.trim().is_empty() {
            out.extend(std::iter::repeat_n(' ', fence.content_indent - spaces));
        }
        out.push_str(line);
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&fence.prefix);
    out.extend(std::iter::repeat_n(fence.marker, fence.len));
    out
}

fn scan_blocks(text: &str) -> BlockScan {
    let mut open_fence: Option<Fence> = None;
    let mut last_block_start = 0;
    // Content column of the innermost list item seen so far.
    let mut item_indent = 0;
    let mut indented_code = false;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        let next = offset + line.len();

        if let Some(fence) = &open_fence {
            if closes_fence(content, fence) {
                open_fence = None;
                last_block_start = next;
            }
        } else if content.trim().is_empty() {
            last_block_start = next;
        } else {
            let container = split_container(content);
            if offset == last_block_start {
                indented_code = container.indent > item_indent + 3;
            }
            if let Some(fence) = fence_opener(&container, item_indent, next) {
                open_fence = Some(fence);
            } else if let Some(width) = list_marker(container.rest)
                .filter(|_| container.indent <= item_indent + 3)
            {
                item_indent = container.indent + width;
                indented_code = false;
                last_block_start = offset;
            } else if container.indent == 0 {
                item_indent = 0;
            }
        }

        offset = next;
    }

    BlockScan {
        open_fence,
        last_block_start,
        indented_code,
    }
}

/// Splits off blockquote markers and leading spaces.
fn split_container(line: &str) -> Container<'_> {
    let mut quote_end = 0;
    loop {
        let rest = &line[quote_end..];
        let spaces = rest.len() - rest.trim_start_matches(' ').len();
        if spaces > 3 || !rest[spaces..].starts_with('>') {
            break;
        }
        quote_end += spaces + 1;
        if line[quote_end..].starts_with(' ') {
            quote_end += 1;
        }
    }

    let rest = &line[quote_end..];
    let body = rest.trim_start_matches(' ');
    Container {
        quote: &line[..quote_end],
        indent: rest.len() - body.len(),
        rest: body,
    }
}

/// Width of a list item marker plus the spaces after it, e.g. `3` for `1. `.
fn list_marker(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let marker = match bytes.first()? {
        b'-' | b'*' | b'+' => 1,
        b'0'..=b'9' => {
            let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
            if digits > 9 || !matches!(bytes.get(digits), Some(b'.' | b')')) {
                return None;
            }
            digits + 1
        }
        _ => return None,
    };
    let spaces = bytes[marker..].iter().take_while(|&&b| b == b' ').count();
    match spaces {
        0 => None,
        1..=4 => Some(marker + spaces),
        // Wider gaps start indented code inside the item.
        _ => Some(marker + 1),
    }
}

/// Marker and length of a fence run, if `body` starts one.
fn fence_run(body: &str) -> Option<(char, usize)> {
    let marker = body.chars().next().filter(|c| matches!(c, '`' | '~'))?;
    let len = body.chars().take_while(|&c| c == marker).count();
    (len >= 3).then_some((marker, len))
}

fn fence_opener(line: &Container<'_>, item_indent: usize, body_start: usize) -> Option<Fence> {
    // Deeper lines are indented code.
    if line.indent > item_indent + 3 {
        return None;
    }

    let (width, in_item, after_marker) = match list_marker(line.rest) {
        Some(w) => (line.indent + w, true, &line.rest[w..]),
        None => (
            line.indent,
            item_indent > 0 && line.indent >= item_indent,
            line.rest,
        ),
    };
    let body = after_marker.trim_start_matches(' ');
    let lead = after_marker.len() - body.len();
    if lead > 3 {
        return None;
    }

    let (marker, len) = fence_run(body)?;
    // Backtick info strings may not contain backticks.
    if marker == '`' && body[len..].contains('`') {
        return None;
    }

    let indent = width + lead;
    let mut prefix = line.quote.to_string();
    prefix.extend(std::iter::repeat_n(' ', indent));
    Some(Fence {
        marker,
        len,
        quote_depth: line.quote_depth(),
        indent,
        content_indent: if in_item && line.quote.is_empty() {
            width
        } else {
            0
        },
        prefix,
        body_start,
    })
}

fn closes_fence(line: &str, fence: &Fence) -> bool {
    let container = split_container(line);
    if container.quote_depth() != fence.quote_depth || container.indent > fence.indent + 3 {
        return false;
    }
    let body = container.rest;
    let len = body.chars().take_while(|&c| c == fence.marker).count();
    len >= fence.len && body[len..].trim().is_empty()
}

/// Words that read as a bare URL keep their underscores literal.
fn looks_like_url(word: &str) -> bool {
    word.contains("://") || word.starts_with("www.")
}

fn repair_inline(block: &str) -> InlineRepair {
    let chars: Vec<(usize, char)> = block.char_indices().collect();
    let run_len = |from: usize, c: char| chars[from..].iter().take_while(|(_, x)| *x == c).count();

    let mut stack: Vec<Delim> = Vec::new();
    // Byte offset and backtick count of an open code span.
    let mut code: Option<(usize, usize)> = None;
    let mut in_destination = false;
    // Marker run at the very end that cannot open or close anything yet.
    let mut dangling: Option<usize> = None;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];

        if let Some((_, ticks)) = code {
            if c == '`' {
                let run = run_len(i, c);
                if run == ticks {
                    code = None;
                }
                i += run;
            } else {
                i += 1;
            }
            continue;
        }

        if in_destination {
            if c == ')' {
                in_destination = false;
            }
            i += 1;
            continue;
        }

        match c {
            '\\' => i += 2,
            '`' => {
                let run = run_len(i, c);
                code = Some((pos, run));
                i += run;
            }
            ']' if chars.get(i + 1).is_some_and(|(_, n)| *n == '(') => {
                in_destination = true;
                i += 2;
            }
            '_' if looks_like_url(block[..pos].rsplit(char::is_whitespace).next().unwrap_or("")) => {
                i += run_len(i, c);
            }
            '*' | '_' | '~' => {
                let run = run_len(i, c);
                let prev = i.checked_sub(1).map(|p| chars[p].1);
                let next = chars.get(i + run).map(|(_, n)| *n);
                if next.is_none() && prev.is_none_or(char::is_whitespace) {
                    dangling = Some(pos);
                } else {
                    apply_delimiter_run(&mut stack, c, run, prev, next);
                }
                i += run;
            }
            _ => i += 1,
        }
    }

    let mut repair = InlineRepair {
        keep: block.len(),
        closers: String::new(),
    };

    if let Some((start, ticks)) = code {
        if block[start + ticks..].trim().is_empty() {
            repair.keep = start;
        } else {
            repair.closers.extend(std::iter::repeat_n('`', ticks));
        }
    }
    if let Some(start) = dangling {
        repair.keep = start;
    }
    if in_destination {
        repair.closers.push(')');
    }
    for delim in stack.iter().rev() {
        repair.closers.push_str(delim.closer());
    }

    repair
}

/// Feeds one delimiter run into the opener stack.
///
/// A closer matches the nearest opener of its own width; openers left
/// above the match stay literal and are dropped from the stack. A single
/// marker against an open `**` is half a closer, so only one more marker is
/// owed.
fn apply_delimiter_run(
    stack: &mut Vec<Delim>,
    c: char,
    run: usize,
    prev: Option<char>,
    next: Option<char>,
) {
    let can_open = next.is_some_and(|n| !n.is_whitespace());
    let can_close = prev.is_some_and(|p| !p.is_whitespace());

    if c == '_' && prev.is_some_and(char::is_alphanumeric) && next.is_some_and(char::is_alphanumeric)
    {
        return;
    }

    if c == '~' {
        if run < 2 {
            return;
        }
        match stack.iter().rposition(|d| *d == Delim::Strike) {
            Some(idx) if can_close => stack.truncate(idx),
            _ if can_open => stack.push(Delim::Strike),
            _ => {}
        }
        return;
    }

    let mut left = run;
    while can_close && left > 0 {
        let wanted = if left >= 2 {
            Delim::Strong(c)
        } else {
            Delim::Emphasis(c)
        };
        if let Some(idx) = stack.iter().rposition(|d| *d == wanted) {
            stack.truncate(idx);
            left -= wanted.width();
            continue;
        }
        match stack.iter().rposition(|d| d.marker() == c) {
            Some(idx) if matches!(stack[idx], Delim::Strong(_)) => {
                stack.truncate(idx);
                stack.push(Delim::Emphasis(c));
                left = 0;
            }
            Some(idx) => {
                stack.truncate(idx);
                left -= 1;
            }
            None => break,
        }
    }

    if left > 0 && can_open {
        if left % 2 == 1 {
            stack.push(Delim::Emphasis(c));
        }
        if left >= 2 {
            stack.push(Delim::Strong(c));
        }
    }
}
