//! Fuzzy file identifiers.
//!
//! An id ignores case, token order and punctuation inside each path segment,
//! drops image and audio extensions, and lists segments innermost first:
//! `assets/Textures/Diffuse_Rock.png` becomes `diffuse_rock/textures/assets/`.
//! Because the file name comes first, a short request such as
//! `rock_diffuse.tga` is a prefix of the full id and still matches.

/// Extensions dropped from ids so that format substitutes collide.
const SUBSTITUTABLE: &[&str] = &[
    ".jpg", ".png", ".bmp", ".tga", ".hdr", // images
    ".ogg", ".mp3", ".wav", ".mod", ".xm", ".flac", // audio
];

fn is_segment_sep(c: char) -> bool {
    c == '/' || c == '\\'
}

fn is_token_sep(c: char) -> bool {
    matches!(c, '[' | ']' | '(' | ')' | '_' | ' ')
}

/// Computes the fuzzy id of `path`.
pub fn file_id(path: &str) -> String {
    let mut lower = path.to_lowercase();

    let name_start = lower.rfind(is_segment_sep).map(|p| p + 1).unwrap_or(0);
    if let Some(dot) = lower[name_start..].rfind('.') {
        let dot = name_start + dot;
        if SUBSTITUTABLE.contains(&&lower[dot..]) {
            lower.truncate(dot);
        }
    }

    let mut id = String::with_capacity(lower.len() + 1);
    let segments: Vec<&str> = lower.split(is_segment_sep).filter(|s| !s.is_empty()).collect();
    for segment in segments.iter().rev() {
        let mut tokens: Vec<&str> = segment.split(is_token_sep).filter(|t| !t.is_empty()).collect();
        tokens.sort_unstable();
        id.push_str(&tokens.join("_"));
        id.push('/');
    }
    id
}
