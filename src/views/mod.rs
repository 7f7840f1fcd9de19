//! Server-side rendering of the single page.

use std::fmt::Write as _;

/// A successful identification shown under the form.
#[derive(Debug, Clone)]
pub struct Identification {
    pub text: String,
    pub image_path: String,
}

#[derive(Debug, Clone, Default)]
pub struct PageView {
    pub result: Option<Identification>,
    pub error: Option<String>,
}

impl PageView {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_result(result: Identification) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(message.into()),
        }
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Model output is plain text with line breaks; keep the breaks.
fn render_text(text: &str) -> String {
    text.lines()
        .map(escape_html)
        .collect::<Vec<_>>()
        .join("<br>\n")
}

pub fn render_page(view: &PageView) -> String {
    let mut body = String::new();

    if let Some(error) = &view.error {
        let _ = write!(
            body,
            r#"<div class="error" role="alert">{}</div>"#,
            escape_html(error)
        );
    }

    if let Some(result) = &view.result {
        let src = escape_html(&result.image_path);
        let _ = write!(
            body,
            r#"<section class="result">
      <a href="{src}"><img src="{src}" alt="Uploaded plant"></a>
      <h2>Result</h2>
      <div class="text">{}</div>
    </section>"#,
            render_text(&result.text),
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Plant Identifier</title>
  <link rel="stylesheet" href="/css/style.css">
</head>
<body>
  <main>
    <h1>🌿 Plant Identifier</h1>
    <p>Upload a photo of a plant to find out what it is.</p>
    <form action="/upload" method="post" enctype="multipart/form-data">
      <input type="file" name="image" accept="image/*" required>
      <button type="submit">Identify</button>
    </form>
    {body}
  </main>
</body>
</html>
"#
    )
}
