//! ECP and web-installer endpoint vocabulary.
//!
//! ECP key events are plain HTTP POSTs whose path names both the action and
//! the key, e.g. `POST /keypress/Select` or `POST /keydown/Lit_a`.  Any key
//! name is accepted on the wire; [`RemoteKey`] lists the buttons of the
//! physical remote for callers that want a typed name.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// `GET` – device description (XML).
pub const QUERY_DEVICE_INFO: &str = "/query/device-info";
/// `GET` – the app in the foreground (XML).
pub const QUERY_ACTIVE_APP: &str = "/query/active-app";
/// `GET` – every installed app (XML).
pub const QUERY_APPS: &str = "/query/apps";
/// `POST` prefix for launching an app: `/launch/{app_id}`.
pub const LAUNCH_PREFIX: &str = "launch";

/// Digest-protected `POST` that saves a screenshot on the simulator.
pub const PLUGIN_INSPECT: &str = "/plugin_inspect";
/// Digest-protected `POST` that side-loads a channel package.
pub const PLUGIN_INSTALL: &str = "/plugin_install";
/// Where the simulator stores the last screenshot as PNG.
pub const SCREENSHOT_PNG: &str = "/pkgs/dev.png";
/// JPG fallback for [`SCREENSHOT_PNG`].
pub const SCREENSHOT_JPG: &str = "/pkgs/dev.jpg";

/// Prefix of keys that type a single literal character.
pub const LITERAL_PREFIX: &str = "Lit_";

/// Returned when a string does not name a [`KeyAction`] or [`RemoteKey`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
}

// ── Key action ────────────────────────────────────────────────────────────────

/// How a key event is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyAction {
    /// Down immediately followed by up.
    #[default]
    Press,
    /// Key held down until a matching [`KeyAction::Up`].
    Down,
    Up,
}

impl KeyAction {
    /// First path segment of the ECP endpoint for this action.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Press => "keypress",
            Self::Down => "keydown",
            Self::Up => "keyup",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Press => "press",
            Self::Down => "down",
            Self::Up => "up",
        }
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAction {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "press" => Ok(Self::Press),
            "down" => Ok(Self::Down),
            "up" => Ok(Self::Up),
            _ => Err(UnknownName {
                kind: "key action",
                value: s.to_string(),
            }),
        }
    }
}

// ── Remote keys ───────────────────────────────────────────────────────────────

macro_rules! remote_keys {
    ($($variant:ident),+ $(,)?) => {
        /// Buttons of the physical remote, named as ECP expects them.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum RemoteKey {
            $($variant),+
        }

        impl RemoteKey {
            /// Every remote button, in remote-layout order.
            pub const ALL: &'static [RemoteKey] = &[$(RemoteKey::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(RemoteKey::$variant => stringify!($variant)),+
                }
            }
        }
    };
}

remote_keys!(
    Home,
    Rev,
    Fwd,
    Play,
    Select,
    Left,
    Right,
    Down,
    Up,
    Back,
    InstantReplay,
    Info,
    Backspace,
    Search,
    Enter,
    VolumeUp,
    VolumeDown,
    VolumeMute,
);

impl fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemoteKey {
    type Err = UnknownName;

    /// Case-insensitive lookup by ECP name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownName {
                kind: "remote key",
                value: s.to_string(),
            })
    }
}

/// The key that types `c` on an on-screen keyboard, e.g. `Lit_a`.
///
/// The character is left unescaped; it is percent-encoded once when the key
/// becomes a URL path segment.
pub fn literal_key(c: char) -> String {
    format!("{LITERAL_PREFIX}{c}")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
