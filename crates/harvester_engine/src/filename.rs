/// Local name for an item's preview image: `{index:04}_{stem}.jpg`, where the
/// stem is the last path segment of the image URL up to any `=` sizing suffix.
pub fn image_filename(index: usize, image_url: &str) -> String {
    let path = image_url
        .split(['?', '#'])
        .next()
        .unwrap_or(image_url)
        .trim_end_matches('/');
    let segment = path.rsplit('/').next().unwrap_or(path);
    let stem = segment.split('=').next().unwrap_or(segment);
    format!("{index:04}_{}.jpg", sanitize_stem(stem))
}

fn sanitize_stem(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);
    if cleaned.is_empty() {
        return "image".to_string();
    }

    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }
    if compacted.len() > 80 {
        let mut cut = 80;
        while !compacted.is_char_boundary(cut) {
            cut -= 1;
        }
        compacted.truncate(cut);
    }
    if is_reserved_windows_name(&compacted) {
        compacted.push('_');
    }
    compacted
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizing_suffix_is_dropped() {
        assert_eq!(
            image_filename(7, "https://lh3.ggpht.example/ci/AbC123xyz=s1200-w600"),
            "0007_AbC123xyz.jpg"
        );
    }

    #[test]
    fn query_and_odd_characters_are_cleaned() {
        assert_eq!(
            image_filename(12, "https://img.example/a/b/wave:<1>.png?size=large"),
            "0012_wave_1_.png.jpg"
        );
        assert_eq!(image_filename(1, "https://img.example/"), "0001_img.example.jpg");
        assert_eq!(image_filename(3, "https://img.example/con"), "0003_con_.jpg");
    }
}
