/*
 *  Copyright 2025 Vellum Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Markdown-to-HTML rendering for markdown cells.
//!
//! With the `markdown` feature enabled (the default), rendering goes
//! through comrak with table support. Without it, a small built-in
//! renderer covers the subset notebooks actually use: `#`/`##`/`###`
//! headings, pipe tables, `**bold**`, `` `code` ``, and paragraphs split
//! on blank lines. Input is HTML-escaped in the fallback path so cell text
//! can never inject markup.

/// Renders markdown source to an HTML fragment.
pub fn render_markdown(source: &str) -> String {
    #[cfg(feature = "markdown")]
    {
        let mut options = comrak::Options::default();
        options.extension.table = true;
        options.extension.strikethrough = true;
        comrak::markdown_to_html(source, &options)
    }
    #[cfg(not(feature = "markdown"))]
    {
        fallback::render(source)
    }
}

/// Dependency-free renderer used when the `markdown` feature is off.
/// Compiled unconditionally so its behavior stays covered.
pub(crate) mod fallback {
    /// Escapes the five HTML-significant characters.
    pub fn escape_html(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for ch in text.chars() {
            match ch {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(ch),
            }
        }
        out
    }

    /// Inline spans: `**bold**` and `` `code` ``. Operates on
    /// already-escaped text.
    fn render_inline(escaped: &str) -> String {
        let mut out = String::with_capacity(escaped.len());
        let mut rest = escaped;
        let mut bold_open = false;
        let mut code_open = false;
        while let Some(pos) = rest.find(|c| c == '*' || c == '`') {
            out.push_str(&rest[..pos]);
            rest = &rest[pos..];
            if rest.starts_with("**") {
                out.push_str(if bold_open { "</strong>" } else { "<strong>" });
                bold_open = !bold_open;
                rest = &rest[2..];
            } else if rest.starts_with('`') {
                out.push_str(if code_open { "</code>" } else { "<code>" });
                code_open = !code_open;
                rest = &rest[1..];
            } else {
                out.push('*');
                rest = &rest[1..];
            }
        }
        out.push_str(rest);
        if bold_open {
            out.push_str("</strong>");
        }
        if code_open {
            out.push_str("</code>");
        }
        out
    }

    fn is_table_row(line: &str) -> bool {
        let trimmed = line.trim();
        trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.len() > 1
    }

    fn is_separator_row(line: &str) -> bool {
        is_table_row(line)
            && line
                .trim()
                .trim_matches('|')
                .split('|')
                .all(|c| !c.trim().is_empty() && c.trim().chars().all(|ch| ch == '-' || ch == ':'))
    }

    fn split_row(line: &str) -> Vec<String> {
        line.trim()
            .trim_matches('|')
            .split('|')
            .map(|c| c.trim().to_string())
            .collect()
    }

    pub fn render(source: &str) -> String {
        let lines: Vec<&str> = source.lines().collect();
        let mut html = String::new();
        let mut paragraph: Vec<String> = Vec::new();
        let mut i = 0;

        let flush = |paragraph: &mut Vec<String>, html: &mut String| {
            if !paragraph.is_empty() {
                html.push_str("<p>");
                html.push_str(&paragraph.join("<br/>"));
                html.push_str("</p>\n");
                paragraph.clear();
            }
        };

        while i < lines.len() {
            let line = lines[i];
            let trimmed = line.trim();

            if trimmed.is_empty() {
                flush(&mut paragraph, &mut html);
                i += 1;
                continue;
            }

            if let Some(text) = trimmed.strip_prefix("### ") {
                flush(&mut paragraph, &mut html);
                html.push_str(&format!("<h3>{}</h3>\n", render_inline(&escape_html(text))));
                i += 1;
                continue;
            }
            if let Some(text) = trimmed.strip_prefix("## ") {
                flush(&mut paragraph, &mut html);
                html.push_str(&format!("<h2>{}</h2>\n", render_inline(&escape_html(text))));
                i += 1;
                continue;
            }
            if let Some(text) = trimmed.strip_prefix("# ") {
                flush(&mut paragraph, &mut html);
                html.push_str(&format!("<h1>{}</h1>\n", render_inline(&escape_html(text))));
                i += 1;
                continue;
            }

            // A header row directly followed by a separator row opens a table.
            if is_table_row(line) && i + 1 < lines.len() && is_separator_row(lines[i + 1]) {
                flush(&mut paragraph, &mut html);
                html.push_str("<table><thead><tr>");
                for cell in split_row(line) {
                    html.push_str(&format!("<th>{}</th>", render_inline(&escape_html(&cell))));
                }
                html.push_str("</tr></thead><tbody>");
                i += 2;
                while i < lines.len() && is_table_row(lines[i]) {
                    html.push_str("<tr>");
                    for cell in split_row(lines[i]) {
                        html.push_str(&format!("<td>{}</td>", render_inline(&escape_html(&cell))));
                    }
                    html.push_str("</tr>");
                    i += 1;
                }
                html.push_str("</tbody></table>\n");
                continue;
            }

            paragraph.push(render_inline(&escape_html(trimmed)));
            i += 1;
        }
        flush(&mut paragraph, &mut html);
        html
    }
}
