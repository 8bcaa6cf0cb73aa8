//! Content sniffing: file type from leading bytes, extension from MIME type.
//!
//! Both are used by the filename resolver when the URL path segment carries
//! no extension of its own.

/// A file type recognized from its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileKind {
    /// Extension without the leading dot.
    pub extension: &'static str,
    /// Canonical MIME type.
    pub mime: &'static str,
}

impl FileKind {
    const fn new(extension: &'static str, mime: &'static str) -> Self {
        Self { extension, mime }
    }
}

/// Offset of the `ustar` magic inside a tar header block.
const TAR_MAGIC_OFFSET: usize = 257;

/// Classifies `data` by its leading bytes.
///
/// Returns `None` when no known signature matches; an empty buffer never
/// matches.
#[must_use]
pub fn classify(data: &[u8]) -> Option<FileKind> {
    let kind = match data {
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => FileKind::new("png", "image/png"),
        [0xFF, 0xD8, 0xFF, ..] => FileKind::new("jpg", "image/jpeg"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => FileKind::new("gif", "image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, rest @ ..] => return classify_riff(rest),
        [b'%', b'P', b'D', b'F', ..] => FileKind::new("pdf", "application/pdf"),
        [b'P', b'K', 0x03, 0x04, ..] => return Some(classify_zip(data)),
        [b'P', b'K', 0x05 | 0x07, 0x06 | 0x08, ..] => FileKind::new("zip", "application/zip"),
        [0x1F, 0x8B, 0x08, ..] => FileKind::new("gz", "application/gzip"),
        [b'B', b'Z', b'h', ..] => FileKind::new("bz2", "application/x-bzip2"),
        [0xFD, b'7', b'z', b'X', b'Z', 0x00, ..] => FileKind::new("xz", "application/x-xz"),
        [0x28, 0xB5, 0x2F, 0xFD, ..] => FileKind::new("zst", "application/zstd"),
        [b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C, ..] => {
            FileKind::new("7z", "application/x-7z-compressed")
        }
        [b'R', b'a', b'r', b'!', 0x1A, 0x07, ..] => {
            FileKind::new("rar", "application/x-rar-compressed")
        }
        [b'I', b'D', b'3', ..] | [0xFF, 0xFB | 0xF3 | 0xF2, ..] => {
            FileKind::new("mp3", "audio/mpeg")
        }
        [b'O', b'g', b'g', b'S', ..] => FileKind::new("ogg", "audio/ogg"),
        [b'f', b'L', b'a', b'C', ..] => FileKind::new("flac", "audio/x-flac"),
        [b'M', b'T', b'h', b'd', ..] => FileKind::new("mid", "audio/midi"),
        [_, _, _, _, b'f', b't', b'y', b'p', brand @ ..] => return Some(classify_ftyp(brand)),
        [0x1A, 0x45, 0xDF, 0xA3, ..] => return Some(classify_matroska(data)),
        [0x00, 0x00, 0x01, 0x00, ..] => FileKind::new("ico", "image/x-icon"),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => {
            FileKind::new("tif", "image/tiff")
        }
        [b'8', b'B', b'P', b'S', ..] => FileKind::new("psd", "image/vnd.adobe.photoshop"),
        [b'w', b'O', b'F', b'F', ..] => FileKind::new("woff", "font/woff"),
        [b'w', b'O', b'F', b'2', ..] => FileKind::new("woff2", "font/woff2"),
        [b'O', b'T', b'T', b'O', 0x00, ..] => FileKind::new("otf", "font/otf"),
        [0x00, 0x01, 0x00, 0x00, 0x00, ..] => FileKind::new("ttf", "font/ttf"),
        [0x00, b'a', b's', b'm', ..] => FileKind::new("wasm", "application/wasm"),
        [0x7F, b'E', b'L', b'F', ..] => FileKind::new("elf", "application/x-elf"),
        [b'M', b'Z', ..] => FileKind::new("exe", "application/x-msdownload"),
        [b'M', b'S', b'C', b'F', ..] => FileKind::new("cab", "application/vnd.ms-cab-compressed"),
        [b'!', b'<', b'a', b'r', b'c', b'h', b'>', b'\n', rest @ ..] => {
            if rest.starts_with(b"debian-binary") {
                FileKind::new("deb", "application/x-deb")
            } else {
                FileKind::new("ar", "application/x-unix-archive")
            }
        }
        [b'S', b'Q', b'L', b'i', b't', b'e', b' ', b'f', b'o', b'r', b'm', b'a', b't', b' ', b'3', 0x00, ..] => {
            FileKind::new("sqlite", "application/x-sqlite3")
        }
        [b'{', b'\\', b'r', b't', b'f', ..] => FileKind::new("rtf", "application/rtf"),
        [b'<', b'?', b'x', b'm', b'l', b' ', ..] => FileKind::new("xml", "application/xml"),
        [b'B', b'M', _, _, _, _, 0x00, 0x00, 0x00, 0x00, ..] => FileKind::new("bmp", "image/bmp"),
        _ if data
            .get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5)
            .is_some_and(|magic| magic == b"ustar") =>
        {
            FileKind::new("tar", "application/x-tar")
        }
        _ => return None,
    };
    Some(kind)
}

/// RIFF containers: `rest` starts at the form type (byte 8).
fn classify_riff(rest: &[u8]) -> Option<FileKind> {
    match rest {
        [b'W', b'E', b'B', b'P', ..] => Some(FileKind::new("webp", "image/webp")),
        [b'W', b'A', b'V', b'E', ..] => Some(FileKind::new("wav", "audio/wav")),
        [b'A', b'V', b'I', b' ', ..] => Some(FileKind::new("avi", "video/vnd.avi")),
        _ => None,
    }
}

/// Zip-based formats announce themselves through their first member.
fn classify_zip(data: &[u8]) -> FileKind {
    const EPUB_MIMETYPE: &[u8] = b"mimetypeapplication/epub+zip";
    const MEMBER_NAME_OFFSET: usize = 30;

    let first_member = data.get(MEMBER_NAME_OFFSET..).unwrap_or_default();
    if first_member.starts_with(EPUB_MIMETYPE) {
        FileKind::new("epub", "application/epub+zip")
    } else if first_member.starts_with(b"META-INF/mozilla.rsa") {
        FileKind::new("xpi", "application/x-xpinstall")
    } else {
        FileKind::new("zip", "application/zip")
    }
}

/// ISO base media files: `brand` starts at the major brand (byte 8).
fn classify_ftyp(brand: &[u8]) -> FileKind {
    match brand {
        [b'a', b'v', b'i', b'f', ..] => FileKind::new("avif", "image/avif"),
        [b'h', b'e', b'i', b'c' | b'x', ..] | [b'm', b'i', b'f', b'1', ..] => {
            FileKind::new("heic", "image/heic")
        }
        [b'q', b't', b' ', b' ', ..] => FileKind::new("mov", "video/quicktime"),
        [b'M', b'4', b'A', b' ', ..] => FileKind::new("m4a", "audio/x-m4a"),
        [b'3', b'g', b'p', ..] => FileKind::new("3gp", "video/3gpp"),
        _ => FileKind::new("mp4", "video/mp4"),
    }
}

fn classify_matroska(data: &[u8]) -> FileKind {
    let head = &data[..data.len().min(64)];
    if head.windows(4).any(|window| window == b"webm") {
        FileKind::new("webm", "video/webm")
    } else {
        FileKind::new("mkv", "video/x-matroska")
    }
}

/// Known extensions per MIME type.
///
/// Several types legitimately map to more than one extension; those are kept
/// complete so ambiguity can be detected.
const MIME_EXTENSIONS: &[(&str, &[&str])] = &[
    ("application/epub+zip", &["epub"]),
    ("application/gzip", &["gz"]),
    ("application/java-archive", &["jar", "war", "ear"]),
    ("application/javascript", &["js", "mjs"]),
    ("application/json", &["json", "map"]),
    ("application/msword", &["doc", "dot"]),
    (
        "application/octet-stream",
        &[
            "bin", "dms", "lrf", "mar", "so", "dist", "distz", "pkg", "bpk", "dump", "elc",
            "deploy", "exe", "dll", "deb", "dmg", "iso", "img", "msi", "msp", "msm", "buffer",
        ],
    ),
    ("application/pdf", &["pdf"]),
    ("application/rtf", &["rtf"]),
    ("application/vnd.rar", &["rar"]),
    ("application/wasm", &["wasm"]),
    ("application/x-7z-compressed", &["7z"]),
    ("application/x-bzip2", &["bz2", "boz"]),
    ("application/x-msdownload", &["exe", "dll", "com", "bat", "msi"]),
    ("application/x-rar-compressed", &["rar"]),
    ("application/x-sh", &["sh"]),
    ("application/x-tar", &["tar"]),
    ("application/x-xz", &["xz"]),
    ("application/xml", &["xml", "xsl", "xsd", "rng"]),
    ("application/zip", &["zip"]),
    ("application/zstd", &["zst"]),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        &["pptx"],
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        &["xlsx"],
    ),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        &["docx"],
    ),
    ("audio/flac", &["flac"]),
    ("audio/mpeg", &["mpga", "mp2", "mp2a", "mp3", "m2a", "m3a"]),
    ("audio/ogg", &["oga", "ogg", "spx", "opus"]),
    ("audio/wav", &["wav"]),
    ("audio/x-flac", &["flac"]),
    ("audio/x-wav", &["wav"]),
    ("font/otf", &["otf"]),
    ("font/ttf", &["ttf"]),
    ("font/woff", &["woff"]),
    ("font/woff2", &["woff2"]),
    ("image/avif", &["avif"]),
    ("image/bmp", &["bmp"]),
    ("image/gif", &["gif"]),
    ("image/jpeg", &["jpeg", "jpg", "jpe"]),
    ("image/png", &["png"]),
    ("image/svg+xml", &["svg", "svgz"]),
    ("image/tiff", &["tif", "tiff"]),
    ("image/vnd.microsoft.icon", &["ico"]),
    ("image/webp", &["webp"]),
    ("image/x-icon", &["ico"]),
    ("text/calendar", &["ics", "ifb"]),
    ("text/css", &["css"]),
    ("text/csv", &["csv"]),
    ("text/html", &["html", "htm", "shtml"]),
    ("text/javascript", &["js", "mjs"]),
    ("text/markdown", &["md", "markdown"]),
    (
        "text/plain",
        &["txt", "text", "conf", "def", "list", "log", "in", "ini"],
    ),
    ("text/xml", &["xml"]),
    ("text/yaml", &["yaml", "yml"]),
    ("video/mp4", &["mp4", "mp4v", "mpg4"]),
    ("video/quicktime", &["qt", "mov"]),
    ("video/webm", &["webm"]),
];

/// Returns every known extension for a `Content-Type` value.
///
/// Parameters (`; charset=...`) are ignored and matching is case-insensitive.
#[must_use]
pub fn extensions_for_mime(content_type: &str) -> &'static [&'static str] {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    MIME_EXTENSIONS
        .iter()
        .find(|(known, _)| *known == mime)
        .map_or(&[], |(_, extensions)| *extensions)
}

/// Returns the extension for a `Content-Type` value only when it is
/// unambiguous, i.e. the type maps to exactly one known extension.
#[must_use]
pub fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    match extensions_for_mime(content_type) {
        [single] => Some(*single),
        _ => None,
    }
}
