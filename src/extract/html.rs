//! String-level HTML helpers tailored to the site's markup. Deliberately
//! naive: every caller degrades to null/unknown when a shape is missing.

/// Remove all `<...>` tags, then collapse whitespace.
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    normalize_ws(&out)
}

/// Collapse whitespace runs into single spaces and trim.
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

/// Decode the handful of entities the site actually emits.
pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Given the byte offset of an `<li ...>` opening tag, return the element's
/// complete serialized subtree, honoring nested `<li>`/`</li>` pairs.
///
/// This is the structural fragment boundary: an activity fragment is exactly
/// its own element, with no reliance on where the next activity happens to
/// begin.
pub fn li_subtree(html: &str, open_start: usize) -> Option<&str> {
    if !html[open_start..].starts_with("<li") {
        return None;
    }
    let mut depth: u32 = 0;
    let mut pos = open_start;
    loop {
        let rel = html[pos..].find('<')?;
        let at = pos + rel;
        let rest = &html[at..];
        if rest.starts_with("</li") {
            let end = at + rest.find('>')? + 1;
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(&html[open_start..end]);
            }
            pos = end;
        } else if rest.starts_with("<li")
            && matches!(rest.as_bytes().get(3), Some(b' ' | b'\t' | b'\n' | b'\r' | b'>'))
        {
            depth += 1;
            pos = at + 3;
        } else {
            pos = at + 1;
        }
    }
}

/// Inner text of the region between `open_marker` (an opening-tag prefix)
/// and `close_marker`, starting the search at `from`.
pub fn slice_between<'a>(s: &'a str, open_marker: &str, close_marker: &str) -> Option<&'a str> {
    let open_idx = s.find(open_marker)?;
    let after_open = open_idx + s[open_idx..].find('>')? + 1;
    let close_rel = s[after_open..].find(close_marker)?;
    Some(&s[after_open..after_open + close_rel])
}
