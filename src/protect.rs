//! Protection rules deciding which packages a sweep must never touch.
//!
//! The fixed rule set covers the platform itself, the reserved platform
//! namespace, home-screen launchers and telephony/IMS components. Deployments
//! can add their own rules through [`ProtectionPolicy`], but the fixed rules
//! always apply.

use serde::{Deserialize, Serialize};

/// Package name reserved for the platform process.
pub const RESERVED_NAME: &str = "android";

/// Namespace prefix reserved for platform packages.
pub const RESERVED_PREFIX: &str = "com.android.";

/// Substrings marking launcher and telephony/IMS packages.
pub const RESERVED_SUBSTRINGS: [&str; 2] = ["launcher", "ims"];

/// Returns true if `package_name` matches one of the fixed protection rules.
///
/// Rules, any of which protects the package:
/// - equals `"android"`
/// - starts with `"com.android."`
/// - contains `"launcher"`
/// - contains `"ims"`
///
/// Matching is case-sensitive.
pub fn is_protected(package_name: &str) -> bool {
    package_name == RESERVED_NAME
        || package_name.starts_with(RESERVED_PREFIX)
        || RESERVED_SUBSTRINGS
            .iter()
            .any(|needle| package_name.contains(needle))
}

/// Fixed rules plus user-configured additions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionPolicy {
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub substrings: Vec<String>,
}

/// Which rule protected a package, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtectionReason {
    ReservedName,
    ReservedPrefix,
    ReservedSubstring(&'static str),
    ConfiguredName(String),
    ConfiguredPrefix(String),
    ConfiguredSubstring(String),
}

impl std::fmt::Display for ProtectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtectionReason::ReservedName => write!(f, "equals \"{}\"", RESERVED_NAME),
            ProtectionReason::ReservedPrefix => write!(f, "starts with \"{}\"", RESERVED_PREFIX),
            ProtectionReason::ReservedSubstring(s) => write!(f, "contains \"{}\"", s),
            ProtectionReason::ConfiguredName(s) => write!(f, "equals configured \"{}\"", s),
            ProtectionReason::ConfiguredPrefix(s) => {
                write!(f, "starts with configured \"{}\"", s)
            }
            ProtectionReason::ConfiguredSubstring(s) => {
                write!(f, "contains configured \"{}\"", s)
            }
        }
    }
}

impl ProtectionPolicy {
    /// Policy with only the fixed rules.
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.prefixes.is_empty() && self.substrings.is_empty()
    }

    pub fn is_protected(&self, package_name: &str) -> bool {
        self.reason(package_name).is_some()
    }

    /// First rule that protects `package_name`, fixed rules first.
    pub fn reason(&self, package_name: &str) -> Option<ProtectionReason> {
        if package_name == RESERVED_NAME {
            return Some(ProtectionReason::ReservedName);
        }
        if package_name.starts_with(RESERVED_PREFIX) {
            return Some(ProtectionReason::ReservedPrefix);
        }
        if let Some(s) = RESERVED_SUBSTRINGS
            .iter()
            .find(|needle| package_name.contains(*needle))
        {
            return Some(ProtectionReason::ReservedSubstring(s));
        }

        if let Some(n) = self.names.iter().find(|n| n.as_str() == package_name) {
            return Some(ProtectionReason::ConfiguredName(n.clone()));
        }
        if let Some(p) = self
            .prefixes
            .iter()
            .find(|p| !p.is_empty() && package_name.starts_with(p.as_str()))
        {
            return Some(ProtectionReason::ConfiguredPrefix(p.clone()));
        }
        self.substrings
            .iter()
            .find(|s| !s.is_empty() && package_name.contains(s.as_str()))
            .map(|s| ProtectionReason::ConfiguredSubstring(s.clone()))
    }
}
