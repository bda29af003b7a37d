//! Parsers for the device output the playback poller consumes.

use std::sync::OnceLock;

use regex::Regex;

const TWITCH_PACKAGE: &str = "tv.twitch.android.viewer";

/// Lines scanned past the session header before giving up.
const HEADER_WINDOW: usize = 40;

fn state_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"PlaybackState\s*\{[^}]*\bstate\s*=\s*(\d+)\b").expect("valid regex")
    })
}

fn profile_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Go to .+?'s profile(?:\.\.\.)?$").expect("valid regex"))
}

/// Extracts the Twitch media-session state from `dumpsys media_session`
/// output.
///
/// Fast path: find the exact session header line, then scan the following
/// lines for the first `PlaybackState {state=N}`. Fallback: a single
/// window-bounded regex for output whose header spacing drifts.
#[must_use]
pub fn playback_state(text: &str, session_header: &str) -> Option<u32> {
    if text.is_empty() {
        return None;
    }

    let anchor = format!("{session_header} {TWITCH_PACKAGE}/{session_header}");
    if let Some(index) = text.find(&anchor) {
        for line in text[index..].lines().take(HEADER_WINDOW) {
            if let Some(captures) = state_line_re().captures(line) {
                return captures[1].parse().ok();
            }
        }
    }

    // `.` stays line-bound so the repeated `\n.*?` group is a true line
    // window; only the explicit newlines advance it.
    let pattern = format!(
        r"{}\s+tv\.twitch\.android\.viewer/.*?(?:\n.*?){{0,{HEADER_WINDOW}}}?PlaybackState\s*\{{[^}}]*\bstate\s*=\s*(\d+)\b",
        regex::escape(session_header)
    );
    let windowed = Regex::new(&pattern).ok()?;
    windowed
        .captures(text)
        .and_then(|captures| captures[1].parse().ok())
}

/// Returns `true` when `dumpsys window` output shows the Twitch app holding
/// the current window focus.
#[must_use]
pub fn app_in_focus(text: &str) -> bool {
    text.lines()
        .any(|line| line.contains(TWITCH_PACKAGE) && line.contains("mCurrentFocus="))
}

/// Extracts the channel name from a uiautomator hierarchy dump.
///
/// The channel label is the `node` immediately preceding the sibling whose
/// `text` reads `Go to <name>'s profile` (ellipsis optional). Malformed XML
/// or a missing sibling yields `None`.
#[must_use]
pub fn active_channel(xml: &str) -> Option<String> {
    let doc = roxmltree::Document::parse(xml).ok()?;
    for parent in doc.descendants() {
        let nodes: Vec<_> = parent
            .children()
            .filter(|child| child.has_tag_name("node"))
            .collect();
        for (index, node) in nodes.iter().enumerate() {
            let Some(text) = node.attribute("text") else {
                continue;
            };
            if profile_re().is_match(text) {
                if index == 0 {
                    return None;
                }
                return nodes[index - 1].attribute("text").map(str::to_owned);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEDIA_SESSION: &str = "\
MEDIA SESSION SERVICE (dumpsys media_session)
  Global priority session is null
  Sessions Stack - have 2 sessions:
    TwitchMediaSession tv.twitch.android.viewer/TwitchMediaSession (userId=0)
      package=tv.twitch.android.viewer
      active=true
      flags=3
      state=PlaybackState {state=3, position=0, buffered position=0, speed=1.0, updated=8411, actions=516, custom actions=[], active item id=-1, error=null}
      volumeType=LOCAL, controlType=VOLUME_CONTROL_ABSOLUTE
";

    #[test]
    fn extracts_state_after_anchor() {
        assert_eq!(playback_state(MEDIA_SESSION, "TwitchMediaSession"), Some(3));
    }

    #[test]
    fn falls_back_when_header_spacing_drifts() {
        let drifted = MEDIA_SESSION.replace(
            "TwitchMediaSession tv.twitch.android.viewer/TwitchMediaSession",
            "TwitchMediaSession  tv.twitch.android.viewer/TwitchMediaSession",
        );
        assert_eq!(playback_state(&drifted, "TwitchMediaSession"), Some(3));
    }

    #[test]
    fn gives_up_past_the_window() {
        let mut text = String::from(
            "TwitchMediaSession tv.twitch.android.viewer/TwitchMediaSession (userId=0)\n",
        );
        for _ in 0..45 {
            text.push_str("      filler=true\n");
        }
        text.push_str("      state=PlaybackState {state=3, position=0}\n");
        assert_eq!(playback_state(&text, "TwitchMediaSession"), None);
    }

    #[test]
    fn no_session_means_none() {
        assert_eq!(playback_state("", "TwitchMediaSession"), None);
        assert_eq!(
            playback_state("  SpotifyMediaSession com.spotify.tv.android/Spotify\n", "TwitchMediaSession"),
            None
        );
    }

    #[test]
    fn detects_window_focus() {
        let focused = "  mCurrentFocus=Window{5c1a2bc u0 tv.twitch.android.viewer/tv.twitch.android.apps.TvLandingActivity}\n";
        assert!(app_in_focus(focused));

        let unfocused = "  mCurrentFocus=Window{11899bf u0 com.amazon.tv.launcher/com.amazon.tv.launcher.ui.HomeActivity}\n  mFocusedApp=tv.twitch.android.viewer\n";
        assert!(!app_in_focus(unfocused));
    }

    #[test]
    fn channel_is_the_previous_sibling_of_the_profile_node() {
        let xml = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation="0"><node index="0" text="" class="android.widget.FrameLayout"><node index="0" text="xQc" class="android.widget.TextView"/><node index="1" text="Go to xQc&#39;s profile" class="android.widget.Button"/></node></hierarchy>"#;
        assert_eq!(active_channel(xml).as_deref(), Some("xQc"));
    }

    #[test]
    fn profile_ellipsis_is_accepted() {
        let xml = r#"<hierarchy><node text="pokimane"/><node text="Go to pokimane's profile..."/></hierarchy>"#;
        assert_eq!(active_channel(xml).as_deref(), Some("pokimane"));
    }

    #[test]
    fn profile_as_first_sibling_has_no_channel() {
        let xml = r#"<hierarchy><node text="Go to xQc's profile"/><node text="xQc"/></hierarchy>"#;
        assert_eq!(active_channel(xml), None);
    }

    #[test]
    fn malformed_xml_is_none() {
        assert_eq!(active_channel("<hierarchy><node text="), None);
        assert_eq!(active_channel(""), None);
    }
}
