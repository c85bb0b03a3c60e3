use percent_encoding::percent_decode_str;

/// Raster formats that get downscaled variants
pub const SCALABLE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// File name of a remote resource: last path segment, query dropped,
/// percent-decoded, with the placeholder prefix hosted files get renamed
/// and parentheses stripped.
pub fn resource_basename(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    decoded
        .replace("unnamed_", "resource_")
        .replace(['(', ')'], "")
}

/// Lowercased extension of a file name, at most four characters
pub fn extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.chars().take(4).collect::<String>().to_lowercase())
}

/// Whether a cached file should get downscaled variants
pub fn is_scalable(name: &str) -> bool {
    extension(name).is_some_and(|ext| SCALABLE_EXTENSIONS.contains(&ext.as_str()))
}

/// Name of the variant of `name` fitting in a `dim` x `dim` box:
/// `photo.jpg` becomes `photo-s1024.jpg`
pub fn derivative_name(name: &str, dim: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-s{}.{}", stem, dim, ext),
        None => format!("{}-s{}", name, dim),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_basename() {
        assert_eq!(
            resource_basename("https://s3.example.com/secure/abc/My%20Photo%20(1).JPG?X-Amz-Expires=3600"),
            "My Photo 1.JPG"
        );
        assert_eq!(
            resource_basename("https://files.example/x/unnamed_42.png"),
            "resource_42.png"
        );
        assert_eq!(resource_basename("https://files.example/x/"), "");
    }

    #[test]
    fn test_extension_and_scalable() {
        assert_eq!(extension("My Photo 1.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension("archive.tar.gzipped").as_deref(), Some("gzip"));
        assert_eq!(extension("README"), None);
        assert!(is_scalable("a.JPEG"));
        assert!(is_scalable("b.gif"));
        assert!(!is_scalable("report.pdf"));
    }

    #[test]
    fn test_derivative_name() {
        assert_eq!(derivative_name("b1-photo.JPG", 1024), "b1-photo-s1024.JPG");
        assert_eq!(derivative_name("b1-chart.v2.png", 320), "b1-chart.v2-s320.png");
    }
}
