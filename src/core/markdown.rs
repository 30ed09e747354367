use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use std::sync::LazyLock;

static INLINE_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s\*\s").expect("valid pattern"));

/// Renders model output as HTML. Blank input renders to nothing.
pub fn render_markdown_html(text: Option<&str>) -> Option<String> {
    let text = text.filter(|t| !t.is_empty())?;
    let normalized = separate_list_items(&split_inline_bullets(text));

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(&normalized, options);
    let mut rendered = String::with_capacity(normalized.len() * 3 / 2);
    html::push_html(&mut rendered, parser);
    Some(rendered)
}

/// Models like to run bullets together on one line (`intro * a * b`);
/// every ` * ` not already at the start of a line starts a new list item.
fn split_inline_bullets(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut copied_to = 0;
    let mut search_from = 0;

    while let Some(m) = INLINE_BULLET.find_at(text, search_from) {
        let preceded_by_newline = text[..m.start()].ends_with('\n');
        if preceded_by_newline {
            // retry one character later, the bullet itself cannot start a match
            search_from = m.start() + next_char_len(text, m.start());
            continue;
        }
        out.push_str(&text[copied_to..m.start()]);
        out.push_str("\n* ");
        copied_to = m.end();
        search_from = m.end();
    }

    out.push_str(&text[copied_to..]);
    out
}

/// Puts a blank line before `\n*` list items so they are not folded into
/// the preceding paragraph.
fn separate_list_items(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if ch == '\n' && text[idx + 1..].starts_with('*') {
            let after_star = text[idx + 2..].chars().next();
            if after_star.is_some_and(char::is_whitespace) {
                out.push_str("\n\n*");
                chars.next(); // the star
                continue;
            }
        }
        out.push(ch);
    }

    out
}

fn next_char_len(text: &str, at: usize) -> usize {
    text[at..].chars().next().map(char::len_utf8).unwrap_or(1)
}
