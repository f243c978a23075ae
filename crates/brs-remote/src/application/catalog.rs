//! Typed views of the ECP query endpoints.
//!
//! The simulator's XML is small and flat, so a couple of regular expressions
//! are enough; no XML parser is pulled in.  Unparseable input yields empty
//! results rather than errors, and callers fall back to the raw body.

use std::borrow::Cow;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// One `<app id=".." version="..">Name</app>` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppInfo {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
}

impl fmt::Display for AppInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (v{})",
            self.id,
            self.name,
            self.version.as_deref().unwrap_or("?")
        )
    }
}

/// The flat `<tag>value</tag>` fields of `/query/device-info`, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeviceInfo {
    pub fields: Vec<(String, String)>,
}

impl DeviceInfo {
    /// Value of the first field named `tag`.
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == tag)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (tag, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{tag}: {value}")?;
        }
        Ok(())
    }
}

fn app_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"<app\s+([^>]*)>([^<]*)</app>").expect("app pattern is a valid regex")
    })
}

fn attr_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"([A-Za-z_-]+)="([^"]*)""#).expect("attribute pattern is a valid regex")
    })
}

fn element_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"<([A-Za-z_-]+)[^>/]*>([^<]*)</([A-Za-z_-]+)>")
            .expect("element pattern is a valid regex")
    })
}

/// Every app listed by `/query/apps`.
pub fn parse_apps(xml: &str) -> Vec<AppInfo> {
    app_pattern()
        .captures_iter(xml)
        .filter_map(|caps| app_from(caps.get(1)?.as_str(), caps.get(2)?.as_str()))
        .collect()
}

/// The foreground app from `/query/active-app`, if any.
///
/// The home screen is reported without an `<app>` element and yields `None`.
pub fn parse_active_app(xml: &str) -> Option<AppInfo> {
    let caps = app_pattern().captures(xml)?;
    app_from(caps.get(1)?.as_str(), caps.get(2)?.as_str())
}

/// Leaf elements with non-blank text from `/query/device-info`.
pub fn parse_device_info(xml: &str) -> DeviceInfo {
    let fields = element_pattern()
        .captures_iter(xml)
        .filter_map(|caps| {
            let open = caps.get(1)?.as_str();
            if caps.get(3)?.as_str() != open {
                return None;
            }
            let value = caps.get(2)?.as_str().trim();
            (!value.is_empty()).then(|| (open.to_string(), unescape(value).into_owned()))
        })
        .collect();
    DeviceInfo { fields }
}

fn app_from(attrs: &str, name: &str) -> Option<AppInfo> {
    let mut id = None;
    let mut version = None;
    for caps in attr_pattern().captures_iter(attrs) {
        match (caps.get(1).map(|m| m.as_str()), caps.get(2)) {
            (Some("id"), Some(v)) => id = Some(unescape(v.as_str()).into_owned()),
            (Some("version"), Some(v)) => version = Some(unescape(v.as_str()).into_owned()),
            _ => {}
        }
    }
    Some(AppInfo {
        id: id.unwrap_or_else(|| "?".to_string()),
        name: unescape(name.trim()).into_owned(),
        version,
    })
}

/// Replaces the five predefined XML entities.
fn unescape(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&"),
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const APPS: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<apps>
    <app id="dev" type="appl" version="1.2.0">My Channel</app>
    <app id="tvinput.hdmi1" type="tvin" version="1.0.0">HDMI 1</app>
    <app id="31012">Tom &amp; Jerry</app>
</apps>"#;

    #[test]
    fn test_parse_apps_reads_every_entry() {
        // Act
        let apps = parse_apps(APPS);

        // Assert
        assert_eq!(apps.len(), 3);
        assert_eq!(
            apps[0],
            AppInfo {
                id: "dev".into(),
                name: "My Channel".into(),
                version: Some("1.2.0".into()),
            }
        );
        assert_eq!(apps[2].name, "Tom & Jerry");
        assert_eq!(apps[2].version, None);
    }

    #[test]
    fn test_app_display_marks_unknown_version() {
        let apps = parse_apps(APPS);
        assert_eq!(apps[0].to_string(), "[dev] My Channel (v1.2.0)");
        assert_eq!(apps[2].to_string(), "[31012] Tom & Jerry (v?)");
    }

    #[test]
    fn test_parse_apps_empty_list() {
        assert!(parse_apps("<apps></apps>").is_empty());
        assert!(parse_apps("not xml at all").is_empty());
    }

    #[test]
    fn test_parse_active_app() {
        // Arrange
        let xml = r#"<active-app><app id="dev" version="1.0.0">My Channel</app></active-app>"#;

        // Act
        let app = parse_active_app(xml).unwrap();

        // Assert
        assert_eq!(app.id, "dev");
        assert_eq!(app.name, "My Channel");
    }

    #[test]
    fn test_parse_active_app_home_screen_is_none() {
        let xml = "<active-app><app>Roku</app></active-app>";
        assert_eq!(parse_active_app(xml), None);
    }

    #[test]
    fn test_parse_device_info_keeps_order_and_skips_blank() {
        // Arrange
        let xml = r#"<device-info>
    <model-name>BrightScript Simulator</model-name>
    <software-version>11.5.0</software-version>
    <serial-number></serial-number>
    <is-tv>false</is-tv>
</device-info>"#;

        // Act
        let info = parse_device_info(xml);

        // Assert
        assert_eq!(info.fields.len(), 3);
        assert_eq!(info.get("software-version"), Some("11.5.0"));
        assert_eq!(info.get("serial-number"), None);
        assert_eq!(
            info.to_string(),
            "model-name: BrightScript Simulator\nsoftware-version: 11.5.0\nis-tv: false"
        );
    }

    #[test]
    fn test_parse_device_info_ignores_mismatched_tags() {
        let info = parse_device_info("<a>one</b><c>two</c>");
        assert_eq!(info.fields, vec![("c".to_string(), "two".to_string())]);
    }
}
