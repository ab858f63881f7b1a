use regex::Regex;

#[inline]
pub fn capture_group_1<'a>(re: &Regex, input: &'a str) -> Option<&'a str> {
    re.captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Returns the path component of `input` with query and fragment removed.
///
/// Falls back to a plain string split when `input` is not an absolute URL,
/// so relative upload paths still classify.
pub fn url_path(input: &str) -> String {
    match url::Url::parse(input) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => input
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Lower-cased extension of the last path segment, if any.
pub fn path_extension(input: &str) -> Option<String> {
    let path = url_path(input);
    let last = path.rsplit('/').next()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_extension_ignores_query_and_fragment() {
        assert_eq!(
            path_extension("https://cdn.example.com/a/b/clip.MP4?token=abc#t=10"),
            Some("mp4".to_string())
        );
        assert_eq!(
            path_extension("/uploads/lesson-1.m3u8?sig=1"),
            Some("m3u8".to_string())
        );
    }

    #[test]
    fn test_path_extension_none() {
        assert_eq!(path_extension("https://cdn.example.com/stream"), None);
        assert_eq!(path_extension("https://cdn.example.com/.hidden"), None);
        assert_eq!(path_extension("https://cdn.example.com/dir.d/"), None);
    }
}
