use serde::{Deserialize, Serialize};

/// One carousel or sponsor slide.
///
/// `html` is trusted markup from the sponsor sheet and is rendered verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideItem {
    pub image_url: String,
    pub title: String,
    pub html: String,
}

impl SlideItem {
    pub fn new(
        image_url: impl Into<String>,
        title: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            image_url: image_url.into(),
            title: title.into(),
            html: html.into(),
        }
    }

    /// Slides shipped with the display, used when the config lists none
    #[must_use]
    pub fn builtin() -> Vec<Self> {
        const PHOTOS: [&str; 4] = [
            "https://mercazdafyomi.com/wp-content/uploads/2023/11/DSC_1430-scaled.jpg",
            "https://mercazdafyomi.com/wp-content/uploads/2023/11/DSC_1914-scaled.jpg",
            "https://mercazdafyomi.com/wp-content/uploads/2023/11/DSC_2150-scaled.jpg",
            "https://mercazdafyomi.com/wp-content/uploads/2022/07/Siyum-Tannis-018-scaled.jpg",
        ];

        let community = "<p class=\"description\"><b>In honor</b> of our community and supporters who make this possible.</p>";
        let torah = "<p class=\"description\"><b>Kidnovations LLC:</b> Supporting Torah study worldwide.</p>";

        (0..14)
            .map(|i| {
                let image_url = if i % 2 == 0 {
                    PHOTOS[(i / 2) % PHOTOS.len()].to_string()
                } else {
                    format!("/images/{}.png", i / 2 + 1)
                };
                let html = if i % 3 == 0 { community } else { torah };
                Self::new(image_url, format!("Sponsors {}", i + 1), html)
            })
            .collect()
    }

    /// Placeholder list returned when no sponsor source is reachable
    #[must_use]
    pub fn default_sponsors() -> Vec<Self> {
        vec![
            Self::new(
                "/images/1.png",
                "Default Sponsor 1",
                "<p>Loading sponsor information...</p>",
            ),
            Self::new(
                "/images/2.png",
                "Default Sponsor 2",
                "<p>Please check your connection.</p>",
            ),
        ]
    }
}

/// Build the scrolling sponsor line: `title: text` entries joined by a bullet.
#[must_use]
pub fn ticker_text(items: &[SlideItem]) -> String {
    items
        .iter()
        .map(|item| format!("{}: {}", item.title, strip_tags(&item.html)))
        .collect::<Vec<_>>()
        .join(" • ")
}

/// Replace every tag with a space and collapse whitespace
fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_slides_fill_more_than_one_window() {
        let slides = SlideItem::builtin();
        assert!(slides.len() > 2 * crate::config::DEFAULT_WINDOW_SIZE);
        assert_eq!(slides[0].title, "Sponsors 1");
        assert_eq!(slides[1].image_url, "/images/1.png");
    }

    #[test]
    fn test_default_sponsors() {
        let defaults = SlideItem::default_sponsors();
        assert_eq!(defaults.len(), 2);
        assert_eq!(defaults[0].title, "Default Sponsor 1");
        assert_eq!(defaults[1].image_url, "/images/2.png");
    }

    #[test]
    fn test_serializes_camel_case() {
        let item = SlideItem::new("/images/1.png", "A", "B");
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["imageUrl"], "/images/1.png");
        assert!(value.get("image_url").is_none());
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(
            strip_tags("<p class=\"x\"><b>Acme:</b>\n In   honor</p>"),
            "Acme: In honor"
        );
        assert_eq!(strip_tags("plain"), "plain");
    }

    #[test]
    fn test_ticker_text_joins_entries() {
        let items = vec![
            SlideItem::new("", "One", "<p>First <i>line</i></p>"),
            SlideItem::new("", "Two", "Second"),
        ];
        assert_eq!(ticker_text(&items), "One: First line • Two: Second");
        assert_eq!(ticker_text(&[]), "");
    }
}
