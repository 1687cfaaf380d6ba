use crate::{
    sampling::SamplingParameters,
    types::{DocumentPage, Frame},
};

/// Header information printed above the first page.
#[derive(Debug, Clone)]
pub struct DocumentMeta {
    pub title: String,
    pub source: String,
    pub duration_seconds: f64,
    pub sampling: SamplingParameters,
}

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Derive a document title from a video locator: the `v` query value when
/// present, else the last non-empty path segment.
pub fn title_from_locator(locator: &str) -> String {
    let trimmed = locator.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);
    let (path, query) = without_fragment
        .split_once('?')
        .unwrap_or((without_fragment, ""));

    let video_id = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("v="))
        .filter(|id| !id.is_empty());
    let tail = video_id
        .or_else(|| path.rsplit('/').find(|segment| !segment.is_empty()))
        .unwrap_or("video");
    format!("Video {}", tail)
}

/// Lowercase ASCII slug safe for a file name.
pub fn sanitize_file_stem(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "document".to_string()
    } else {
        slug.to_string()
    }
}

pub fn render_header(meta: &DocumentMeta) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", meta.title));
    output.push_str(&format!(
        "**Source:** {} | **Duration:** {} | \
         **Audio segments:** {}s | **Keyframes every:** {}s\n\n",
        meta.source,
        format_timestamp(meta.duration_seconds),
        meta.sampling.segment_length_ms / 1000,
        meta.sampling.frame_interval_s
    ));
    output.push_str("---\n\n");
    output
}

/// Render one page. `frame_data` is the base64 JPEG for the page's frame.
pub fn render_page(page: &DocumentPage, frame_data: Option<&str>) -> String {
    let mut output = String::new();
    output.push_str(&format!("## Page {}\n\n", page.number));

    if let Some(summary) = &page.summary {
        output.push_str(&format!("> **Summary:** {}\n\n", summary));
    }

    if !page.body.is_empty() {
        output.push_str(&page.body);
        output.push_str("\n\n");
    }

    if let (Some(frame), Some(data)) = (&page.frame, frame_data) {
        output.push_str(&format!(
            "![{}](data:image/jpeg;base64,{})\n\n",
            frame_caption(frame),
            data
        ));
    }

    output.push_str("---\n\n");
    output
}

fn frame_caption(frame: &Frame) -> String {
    format!(
        "Frame {} at {}",
        frame.index + 1,
        format_timestamp(frame.at_seconds as f64)
    )
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(125.7), "02:05");
        assert_eq!(format_timestamp(3720.0), "62:00");
    }

    #[test]
    fn test_title_from_locator() {
        assert_eq!(
            title_from_locator("https://www.youtube.com/watch?v=TK4N5W22Gts"),
            "Video TK4N5W22Gts"
        );
        assert_eq!(title_from_locator("https://youtu.be/abc/"), "Video abc");
    }

    #[test]
    fn test_title_ignores_trailing_query_parameters() {
        assert_eq!(
            title_from_locator("https://www.youtube.com/watch?v=TK4N5W22Gts&t=42s"),
            "Video TK4N5W22Gts"
        );
        assert_eq!(
            title_from_locator("https://www.youtube.com/watch?t=42s&v=other_id"),
            "Video other_id"
        );
        assert_eq!(title_from_locator("https://youtu.be/abc?t=10"), "Video abc");
        assert_eq!(title_from_locator("https://youtu.be/abc#chapter"), "Video abc");
        assert_ne!(
            title_from_locator("https://www.youtube.com/watch?v=first&t=42s"),
            title_from_locator("https://www.youtube.com/watch?v=second&t=42s")
        );
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("Video TK4N5W22Gts"), "video-tk4n5w22gts");
        assert_eq!(sanitize_file_stem("  ¿¿  "), "document");
    }

    #[test]
    fn test_render_page_with_summary_and_frame() {
        let page = DocumentPage {
            number: 1,
            summary: Some("short summary".to_string()),
            body: "hello world".to_string(),
            frame: Some(Frame {
                index: 0,
                at_seconds: 70,
                path: PathBuf::from("frame_00000.jpg"),
            }),
        };

        let rendered = render_page(&page, Some("QUJD"));

        assert_eq!(
            rendered,
            "## Page 1\n\n> **Summary:** short summary\n\nhello world\n\n\
             ![Frame 1 at 01:10](data:image/jpeg;base64,QUJD)\n\n---\n\n"
        );
    }

    #[test]
    fn test_render_image_only_page() {
        let page = DocumentPage {
            number: 4,
            summary: None,
            body: String::new(),
            frame: Some(Frame {
                index: 3,
                at_seconds: 30,
                path: PathBuf::from("frame_00003.jpg"),
            }),
        };

        let rendered = render_page(&page, Some("QUJD"));

        assert!(rendered.starts_with("## Page 4\n\n![Frame 4 at 00:30]"));
    }
}
