use std::fmt;

/// One rectangular cell span inside the wallpaper grid.
///
/// Coordinates and spans are in grid cells; the engine converts them to
/// normalized device coordinates when the world is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disposition {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Disposition {
    /// Whether the span stays inside a `cols` x `rows` grid.
    pub fn fits(&self, cols: u32, rows: u32) -> bool {
        self.w >= 1 && self.h >= 1 && self.x + self.w <= cols && self.y + self.h <= rows
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}:{}x{}", self.x, self.y, self.w, self.h)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("empty disposition template")]
    Empty,
    #[error("invalid disposition entry '{0}'; expected 'XxY:WxH'")]
    Malformed(String),
}

/// Builtin portrait templates for a 2x4 grid, used by random-disposition mode.
pub const PORTRAIT_TEMPLATES: &[&str] = &[
    "0x0:2x2|0x2:1x1|1x2:1x1|0x3:1x1|1x3:1x1",
    "0x0:1x1|1x0:1x1|0x1:2x2|0x3:1x1|1x3:1x1",
    "0x0:1x2|1x0:1x1|1x1:1x1|0x2:2x2",
    "0x0:2x1|0x1:1x2|1x1:1x2|0x3:2x1",
    "0x0:1x1|1x0:1x2|0x1:1x1|0x2:2x2",
];

/// Builtin landscape templates for a 4x2 grid.
pub const LANDSCAPE_TEMPLATES: &[&str] = &[
    "0x0:2x2|2x0:1x1|3x0:1x1|2x1:1x1|3x1:1x1",
    "0x0:1x1|1x0:1x1|2x0:2x2|0x1:2x1",
    "0x0:1x2|1x0:2x2|3x0:1x1|3x1:1x1",
    "0x0:2x1|2x0:2x1|0x1:1x1|1x1:2x1|3x1:1x1",
];

/// Parses a `"XxY:WxH|XxY:WxH|..."` template into dispositions.
pub fn parse_template(template: &str) -> Result<Vec<Disposition>, LayoutError> {
    let trimmed = template.trim();
    if trimmed.is_empty() {
        return Err(LayoutError::Empty);
    }

    trimmed
        .split('|')
        .map(|entry| {
            let (origin, span) = entry
                .split_once(':')
                .ok_or_else(|| LayoutError::Malformed(entry.to_string()))?;
            let (x, y) = parse_pair(origin).ok_or_else(|| LayoutError::Malformed(entry.to_string()))?;
            let (w, h) = parse_pair(span).ok_or_else(|| LayoutError::Malformed(entry.to_string()))?;
            Ok(Disposition { x, y, w, h })
        })
        .collect()
}

fn parse_pair(raw: &str) -> Option<(u32, u32)> {
    let (a, b) = raw.split_once('x')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}
