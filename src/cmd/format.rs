/*!
format.rs

Human-readable output helpers for the `scan` and `locate` commands.

  - StyleOptions::detect() honors NO_COLOR / NO_EMOJI and COLUMNS
  - color(role, text, &style) / emoji(tag, &style)
  - box_header(title, subtitle, &style)
  - section(title, body, &style) for labelled stdout / stderr blocks

Nothing here prints; callers decide where the text goes. JSON output paths
must not use these helpers.
*/

/* -------------------------------------------------------------------------- */
/* Style Options                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub use_emoji: bool,
    pub term_width: usize,
}

impl StyleOptions {
    pub fn detect() -> Self {
        let term_width = std::env::var("COLUMNS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|w| w.clamp(40, 220))
            .unwrap_or(100);
        Self {
            use_color: std::env::var_os("NO_COLOR").is_none(),
            use_emoji: std::env::var_os("NO_EMOJI").is_none(),
            term_width,
        }
    }

    #[cfg(test)]
    pub fn plain() -> Self {
        Self {
            use_color: false,
            use_emoji: false,
            term_width: 100,
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Color / Emoji                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Primary,
    Secondary,
    Success,
    Warning,
    Error,
    Dim,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Primary => "38;5;45",
        Role::Secondary => "38;5;250",
        Role::Success => "38;5;82",
        Role::Warning => "38;5;214",
        Role::Error => "38;5;196",
        Role::Dim => "2",
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

pub fn emoji(tag: &str, style: &StyleOptions) -> &'static str {
    if !style.use_emoji {
        return "";
    }
    match tag {
        "success" => "✔",
        "error" => "✖",
        "warn" => "⚠",
        "info" => "ℹ",
        "target" => "🎯",
        "folder" => "📂",
        _ => "",
    }
}

/* -------------------------------------------------------------------------- */
/* Boxes / Sections                                                           */
/* -------------------------------------------------------------------------- */

/// Single-line boxed title; overly long content is truncated to the terminal.
pub fn box_header(
    title: impl AsRef<str>,
    subtitle: Option<impl AsRef<str>>,
    style: &StyleOptions,
) -> String {
    let max_inner = style.term_width.saturating_sub(4).max(16);
    let raw = match &subtitle {
        Some(s) => format!("{}  {}", title.as_ref(), s.as_ref()),
        None => title.as_ref().to_string(),
    };
    let inner = truncate_ellipsis(&raw, max_inner);
    let width = inner.chars().count();

    // Color after truncation so escape codes never get cut.
    let styled = match &subtitle {
        Some(s) if inner == raw => format!(
            "{}  {}",
            color(Role::Primary, title.as_ref(), style),
            color(Role::Secondary, s.as_ref(), style)
        ),
        _ => color(Role::Primary, &inner, style),
    };

    let bar = "─".repeat(width + 2);
    format!("┌{bar}┐\n│ {styled} │\n└{bar}┘")
}

pub fn section(title: &str, body: &str, role: Role, style: &StyleOptions) -> String {
    let heading = color(role, format!("── {title} "), style);
    let body = body.trim_end();
    if body.is_empty() {
        format!("{heading}\n{}", color(Role::Dim, "(empty)", style))
    } else {
        format!("{heading}\n{body}")
    }
}

pub fn truncate_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = s.chars().take(keep).collect();
    out.push('…');
    out
}
