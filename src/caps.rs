//! Capability sets.
//!
//! Pads treat capabilities as an opaque predicate: two caps are compatible
//! when they intersect, and a caps event is acceptable when it is a subset
//! of what the pad can handle. [`Caps`] models this with a list of media
//! type names such as `"video/x-raw"`, where the first entry is the
//! preferred one.

use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// A set of acceptable media types.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Caps {
    any: bool,
    media: SmallVec<[Arc<str>; 2]>,
}

impl Caps {
    /// Caps that accept anything.
    pub fn any() -> Self {
        Self {
            any: true,
            media: SmallVec::new(),
        }
    }

    /// Caps that accept nothing.
    pub fn empty() -> Self {
        Self {
            any: false,
            media: SmallVec::new(),
        }
    }

    /// Caps with a single media type.
    pub fn new(media: &str) -> Self {
        Self::many([media])
    }

    /// Caps with several media types, preferred one first.
    ///
    /// Duplicates are dropped, keeping the first occurrence.
    pub fn many<'a>(media: impl IntoIterator<Item = &'a str>) -> Self {
        let mut caps = Self::empty();
        for m in media {
            if !caps.contains(m) {
                caps.media.push(Arc::from(m));
            }
        }
        caps
    }

    /// Whether these caps accept anything.
    #[inline]
    pub fn is_any(&self) -> bool {
        self.any
    }

    /// Whether these caps accept nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.any && self.media.is_empty()
    }

    /// Whether these caps name exactly one media type.
    #[inline]
    pub fn is_fixed(&self) -> bool {
        !self.any && self.media.len() == 1
    }

    /// The media types, in preference order.
    pub fn media_types(&self) -> impl Iterator<Item = &str> {
        self.media.iter().map(|m| &**m)
    }

    fn contains(&self, media: &str) -> bool {
        self.any || self.media.iter().any(|m| &**m == media)
    }

    /// Whether `self` and `other` share at least one media type.
    pub fn can_intersect(&self, other: &Caps) -> bool {
        match (self.any, other.any) {
            (true, _) => !other.is_empty(),
            (_, true) => !self.is_empty(),
            _ => self.media.iter().any(|m| other.contains(m)),
        }
    }

    /// Media types in both sets, in `self`'s preference order.
    pub fn intersect(&self, other: &Caps) -> Caps {
        if self.any {
            return other.clone();
        }
        if other.any {
            return self.clone();
        }
        Self {
            any: false,
            media: self
                .media
                .iter()
                .filter(|m| other.contains(m))
                .cloned()
                .collect(),
        }
    }

    /// Whether every media type of `self` is accepted by `superset`.
    pub fn is_subset(&self, superset: &Caps) -> bool {
        if superset.any {
            return true;
        }
        if self.any {
            return false;
        }
        self.media.iter().all(|m| superset.contains(m))
    }
}

impl Default for Caps {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Debug for Caps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Caps({self})")
    }
}

impl fmt::Display for Caps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.any {
            return f.write_str("ANY");
        }
        if self.media.is_empty() {
            return f.write_str("EMPTY");
        }
        for (i, m) in self.media.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(m)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_and_empty() {
        assert!(Caps::any().can_intersect(&Caps::new("audio/x-raw")));
        assert!(!Caps::any().can_intersect(&Caps::empty()));
        assert!(Caps::empty().is_subset(&Caps::new("audio/x-raw")));
        assert!(!Caps::any().is_subset(&Caps::new("audio/x-raw")));
    }

    #[test]
    fn test_intersect_keeps_first_order() {
        let a = Caps::many(["video/x-raw", "video/x-h264", "video/x-vp8"]);
        let b = Caps::many(["video/x-vp8", "video/x-raw"]);
        let both = a.intersect(&b);
        assert_eq!(
            both.media_types().collect::<Vec<_>>(),
            vec!["video/x-raw", "video/x-vp8"]
        );
        assert!(!both.is_fixed());
    }

    #[test]
    fn test_subset_and_fixed() {
        let fixed = Caps::new("audio/x-raw");
        assert!(fixed.is_fixed());
        assert!(fixed.is_subset(&Caps::many(["audio/x-raw", "audio/mpeg"])));
        assert!(!Caps::many(["audio/x-raw", "audio/x-opus"]).is_subset(&fixed));
    }

    #[test]
    fn test_display() {
        assert_eq!(Caps::many(["a/b", "c/d"]).to_string(), "a/b; c/d");
        assert_eq!(Caps::any().to_string(), "ANY");
        assert_eq!(Caps::empty().to_string(), "EMPTY");
    }
}
