//! Well-known keys of a versions file.

use std::fmt;

use crate::document::Key;

/// Repeated top-level element listing the add-on ids.
pub const ADD_ON_ELEMENT: &str = "addon";
/// Prefix of the per add-on subtree, `addon_<id>`.
pub const ADD_ON_NODE_PREFIX: &str = "addon_";

pub const CORE_ELEMENT: &str = "core";

pub fn core() -> Key {
    Key::new(CORE_ELEMENT)
}

/// `core.version`, the main release.
pub fn core_version() -> Key {
    core().child("version")
}

/// `core.daily-version`, the weekly release.
pub fn core_daily_version() -> Key {
    core().child("daily-version")
}

pub fn core_release_notes() -> Key {
    core().child("relnotes")
}

pub fn core_release_notes_url() -> Key {
    core().child("relnotes-url")
}

/// The repeated `addon` list element.
pub fn add_on_list() -> Key {
    Key::new(ADD_ON_ELEMENT)
}

/// The `addon_<id>` subtree.
pub fn add_on_key(id: &str) -> Key {
    Key::new(format!("{ADD_ON_NODE_PREFIX}{id}"))
}

/// A release asset published under `core`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Daily,
    Windows32,
    Windows,
    Linux,
    Mac,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Daily,
        Platform::Windows32,
        Platform::Windows,
        Platform::Linux,
        Platform::Mac,
    ];

    pub fn element(self) -> &'static str {
        match self {
            Platform::Daily => "daily",
            Platform::Windows32 => "windows32",
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::Mac => "mac",
        }
    }

    /// `core.<platform>`
    pub fn key(self) -> Key {
        core().child(self.element())
    }

    pub fn file(self) -> Key {
        self.key().child("file")
    }

    pub fn hash(self) -> Key {
        self.key().child("hash")
    }

    pub fn size(self) -> Key {
        self.key().child("size")
    }

    pub fn url(self) -> Key {
        self.key().child("url")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_render_dotted() {
        assert_eq!(core_version().to_string(), "core.version");
        assert_eq!(core_daily_version().to_string(), "core.daily-version");
        assert_eq!(add_on_key("ascanrules").to_string(), "addon_ascanrules");
        assert_eq!(Platform::Linux.hash().to_string(), "core.linux.hash");
        assert_eq!(Platform::Daily.url().to_string(), "core.daily.url");
    }
}
