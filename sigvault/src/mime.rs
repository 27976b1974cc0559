//! MIME type → filename extension mapping for exported attachments.

/// Filename extension for a known attachment MIME type.
///
/// Returns `None` for unrecognized types; callers typically fall back to no
/// extension. Matching is exact and case-sensitive; Signal records
/// lowercase types.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let ext = match mime {
        "application/gzip" => "gz",
        "application/msword" => "doc",
        "application/pdf" => "pdf",
        "application/rtf" => "rtf",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.oasis.opendocument.presentation" => "odp",
        "application/vnd.oasis.opendocument.spreadsheet" => "ods",
        "application/vnd.oasis.opendocument.text" => "odt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.rar" => "rar",
        "application/x-7z-compressed" => "7z",
        "application/x-bzip2" => "bz2",
        "application/x-tar" => "tar",
        "application/zip" => "zip",
        "audio/aac" => "aac",
        "audio/flac" => "flac",
        "audio/mp4" => "m4a",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "image/gif" => "gif",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/svg+xml" => "svg",
        "image/tiff" => "tif",
        "image/webp" => "webp",
        "text/html" => "html",
        "text/plain" => "txt",
        "text/x-signal-plain" => "txt",
        "video/mp4" => "mp4",
        "video/mpeg" => "mpg",
        _ => return None,
    };
    Some(ext)
}
