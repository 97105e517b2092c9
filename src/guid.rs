//! Stable identifiers for generated projects.
//!
//! Project files refer to each other by GUID. Regenerating a project must
//! produce the same GUIDs or the consuming IDE treats every project as new,
//! so identifiers are name-based (RFC 4122 version 5): a SHA-1 digest over a
//! fixed namespace and `"<project>/<target>"`.
//!
//! # Examples
//!
//! ```
//! use bakery::guid::Guid;
//!
//! let guid = Guid::for_target("hello", "exe1");
//! assert_eq!(guid.braced(), "{2657D891-4E57-52A9-B8AD-F0E116484CE6}");
//! ```

use sha1::{Digest, Sha1};
use std::fmt::{self, Display, Formatter};

/// A 128-bit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid([u8; 16]);

/// Namespace of project identifiers, `{D9BD5916-F055-4D77-8C69-9448E02BF433}`.
pub const PROJECT_NAMESPACE: Guid = Guid([
    0xd9, 0xbd, 0x59, 0x16, 0xf0, 0x55, 0x4d, 0x77, 0x8c, 0x69, 0x94, 0x48, 0xe0, 0x2b, 0xf4, 0x33,
]);

impl Guid {
    /// Version-5 identifier for `name` within `namespace`.
    #[must_use]
    pub fn v5(namespace: &Self, name: &str) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(namespace.0);
        hasher.update(name.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0_u8; 16];
        for (slot, byte) in bytes.iter_mut().zip(digest) {
            *slot = byte;
        }
        bytes[6] = (bytes[6] & 0x0f) | 0x50;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        Self(bytes)
    }

    /// Identifier of `target` in `project`.
    #[must_use]
    pub fn for_target(project: &str, target: &str) -> Self {
        Self::v5(&PROJECT_NAMESPACE, &format!("{project}/{target}"))
    }

    /// Upper-case form wrapped in braces, as used in project files.
    #[must_use]
    pub fn braced(&self) -> String {
        format!("{{{self}}}")
    }
}

impl Display for Guid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, byte) in self.0.iter().enumerate() {
            if matches!(index, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}
