use url::Url;

/// Resource type of an extracted asset reference
///
/// Classification is extension-based; query strings are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetType {
    Css,
    Js,
    Image,
    Font,
    Video,
    Audio,
    Other,
}

impl AssetType {
    /// Classifies a URL by the extension of its path
    pub fn classify(url: &Url) -> Self {
        let path = url.path().to_lowercase();
        let extension = path.rsplit('.').next().unwrap_or("");
        // A path without any dot yields itself as the "extension"
        if !path.contains('.') {
            return Self::Other;
        }

        match extension {
            "css" => Self::Css,
            "js" => Self::Js,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "ico" | "bmp" => Self::Image,
            "woff" | "woff2" | "ttf" | "otf" | "eot" => Self::Font,
            "mp4" | "webm" | "ogg" | "avi" | "mov" => Self::Video,
            "mp3" | "wav" | "m4a" | "flac" => Self::Audio,
            _ => Self::Other,
        }
    }

    /// Stable name used in manifests and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Js => "js",
            Self::Image => "image",
            Self::Font => "font",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One resource referenced by a page or stylesheet
///
/// Transient: produced by extraction, consumed by the fetcher, never
/// persisted.
#[derive(Debug, Clone)]
pub struct AssetRef {
    /// Absolute original URL (archive replay prefixes already stripped)
    pub url: Url,
    pub kind: AssetType,
    /// The document the reference was found in
    pub source: String,
    /// True iff the host is neither `domain` nor `www.{domain}`
    pub is_external: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(url: &str) -> AssetType {
        AssetType::classify(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(classify("http://a.com/style.css"), AssetType::Css);
        assert_eq!(classify("http://a.com/app.js"), AssetType::Js);
        assert_eq!(classify("http://a.com/logo.GIF"), AssetType::Image);
        assert_eq!(classify("http://a.com/face.woff2"), AssetType::Font);
        assert_eq!(classify("http://a.com/clip.webm"), AssetType::Video);
        assert_eq!(classify("http://a.com/track.mp3"), AssetType::Audio);
        assert_eq!(classify("http://a.com/data.xml"), AssetType::Other);
    }

    #[test]
    fn test_classify_ignores_query() {
        assert_eq!(classify("http://a.com/style.css?v=3"), AssetType::Css);
        assert_eq!(classify("http://a.com/logo.png?width=200"), AssetType::Image);
    }

    #[test]
    fn test_classify_no_extension() {
        assert_eq!(classify("http://a.com/images"), AssetType::Other);
        assert_eq!(classify("http://a.com/"), AssetType::Other);
    }

    #[test]
    fn test_display() {
        assert_eq!(AssetType::Image.to_string(), "image");
        assert_eq!(AssetType::Other.to_string(), "other");
    }
}
