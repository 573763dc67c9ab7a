//! Minimal `User-Agent` parsing for login events.
//!
//! Only what the login log needs: an OS name for `device` and
//! `"<browser> <version>"` for `application`.

/// Parsed client description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAgent {
    pub device: String,
    pub application: String,
}

impl ClientAgent {
    pub fn parse(user_agent: &str) -> Self {
        Self {
            device: parse_os(user_agent),
            application: parse_browser(user_agent),
        }
    }
}

/// Token following `marker` up to the first delimiter.
fn version_after<'a>(ua: &'a str, marker: &str) -> Option<&'a str> {
    let start = ua.find(marker)? + marker.len();
    let rest = &ua[start..];
    let end = rest
        .find(|c: char| c == ' ' || c == ';' || c == ')')
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn parse_os(ua: &str) -> String {
    if let Some(v) = version_after(ua, "Windows NT ") {
        let name = match v {
            "10.0" => "10",
            "6.3" => "8.1",
            "6.2" => "8",
            "6.1" => "7",
            other => other,
        };
        return format!("Windows {name}");
    }
    if let Some(v) = version_after(ua, "iPhone OS ") {
        return format!("iOS {}", v.replace('_', "."));
    }
    if let Some(v) = version_after(ua, "CPU OS ") {
        return format!("iPadOS {}", v.replace('_', "."));
    }
    if let Some(v) = version_after(ua, "Mac OS X ") {
        return format!("Mac OS X {}", v.replace('_', "."));
    }
    if let Some(v) = version_after(ua, "Android ") {
        return format!("Android {v}");
    }
    if ua.contains("CrOS") {
        return "Chrome OS".to_string();
    }
    if ua.contains("Linux") {
        return "Linux".to_string();
    }
    String::new()
}

fn parse_browser(ua: &str) -> String {
    // Order matters: Edge and Opera also advertise Chrome, Chrome advertises Safari.
    const BROWSERS: &[(&str, &str)] = &[
        ("Edg/", "Edge"),
        ("OPR/", "Opera"),
        ("Firefox/", "Firefox"),
        ("Chrome/", "Chrome"),
        ("curl/", "curl"),
    ];
    for (marker, name) in BROWSERS {
        if let Some(v) = version_after(ua, marker) {
            return format!("{name} {v}");
        }
    }
    if ua.contains("Safari/") {
        return match version_after(ua, "Version/") {
            Some(v) => format!("Safari {v}"),
            None => "Safari".to_string(),
        };
    }
    ua.split('/').next().unwrap_or_default().trim().to_string()
}
