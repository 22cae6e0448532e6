//! NuGet-style package versions and version ranges.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A package version: up to four numeric components plus an optional
/// pre-release label (`1.2.3-beta.1`). Build metadata after `+` is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub revision: u64,
    pub prerelease: Option<String>,
}

impl PackageVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            revision: 0,
            prerelease: None,
        }
    }

    /// Normalized form used for cache directories and feed URLs.
    ///
    /// Always three components; the fourth is only kept when non-zero.
    pub fn to_normalized_string(&self) -> String {
        let mut out = format!("{}.{}.{}", self.major, self.minor, self.patch);
        if self.revision != 0 {
            out.push_str(&format!(".{}", self.revision));
        }
        if let Some(pre) = &self.prerelease {
            out.push('-');
            out.push_str(pre);
        }
        out
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_normalized_string())
    }
}

impl FromStr for PackageVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.split_once('+').map(|(v, _)| v).unwrap_or(s);
        let (numbers, prerelease) = match s.split_once('-') {
            Some((n, p)) if !p.is_empty() => (n, Some(p.to_string())),
            Some(_) => return Err(Error::Manifest(format!("invalid version '{}'", s))),
            None => (s, None),
        };

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(Error::Manifest(format!("invalid version '{}'", s)));
        }

        let mut components = [0u64; 4];
        for (slot, part) in components.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| Error::Manifest(format!("invalid version '{}'", s)))?;
        }

        Ok(Self {
            major: components[0],
            minor: components[1],
            patch: components[2],
            revision: components[3],
            prerelease,
        })
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch, self.revision)
            .cmp(&(other.major, other.minor, other.patch, other.revision))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dot-separated label comparison: numeric labels compare numerically and
/// sort before alphanumeric ones; alphanumeric labels compare case-insensitively.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase()),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// A version range in NuGet interval notation.
///
/// | Notation      | Meaning              |
/// |---------------|----------------------|
/// | `1.0`         | `x >= 1.0`           |
/// | `[1.0]`       | `x == 1.0`           |
/// | `(1.0,)`      | `x > 1.0`            |
/// | `[1.0,2.0)`   | `1.0 <= x < 2.0`     |
/// | `(,2.0]`      | `x <= 2.0`           |
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    pub min: Option<PackageVersion>,
    pub min_inclusive: bool,
    pub max: Option<PackageVersion>,
    pub max_inclusive: bool,
}

impl VersionRange {
    /// Range accepting any version.
    pub fn any() -> Self {
        Self {
            min: None,
            min_inclusive: false,
            max: None,
            max_inclusive: false,
        }
    }

    /// Range `>= version`.
    pub fn at_least(version: PackageVersion) -> Self {
        Self {
            min: Some(version),
            min_inclusive: true,
            max: None,
            max_inclusive: false,
        }
    }

    /// Range `== version`.
    pub fn exact(version: PackageVersion) -> Self {
        Self {
            min: Some(version.clone()),
            min_inclusive: true,
            max: Some(version),
            max_inclusive: true,
        }
    }

    /// The lowest version this range names, used as the discovery version.
    ///
    /// Ranges without a lower bound fall back to `0.0.0`.
    pub fn min_version(&self) -> PackageVersion {
        self.min.clone().unwrap_or_else(|| PackageVersion::new(0, 0, 0))
    }

    pub fn satisfies(&self, version: &PackageVersion) -> bool {
        if let Some(min) = &self.min {
            match version.cmp(min) {
                Ordering::Less => return false,
                Ordering::Equal if !self.min_inclusive => return false,
                _ => {}
            }
        }
        if let Some(max) = &self.max {
            match version.cmp(max) {
                Ordering::Greater => return false,
                Ordering::Equal if !self.max_inclusive => return false,
                _ => {}
            }
        }
        true
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.min, &self.max) {
            (Some(min), None) if self.min_inclusive => write!(f, "{}", min),
            (Some(min), Some(max)) if min == max && self.min_inclusive && self.max_inclusive => {
                write!(f, "[{}]", min)
            }
            (min, max) => {
                let open = if self.min_inclusive { '[' } else { '(' };
                let close = if self.max_inclusive { ']' } else { ')' };
                let min = min.as_ref().map(ToString::to_string).unwrap_or_default();
                let max = max.as_ref().map(ToString::to_string).unwrap_or_default();
                write!(f, "{}{}, {}{}", open, min, max, close)
            }
        }
    }
}

impl FromStr for VersionRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(Self::any());
        }

        let first = s.chars().next().unwrap_or_default();
        if first != '[' && first != '(' {
            return Ok(Self::at_least(s.parse()?));
        }

        let last = s.chars().last().unwrap_or_default();
        if s.len() < 2 || (last != ']' && last != ')') {
            return Err(Error::Manifest(format!("invalid version range '{}'", s)));
        }

        let min_inclusive = first == '[';
        let max_inclusive = last == ']';
        let inner = &s[1..s.len() - 1];

        let Some((low, high)) = inner.split_once(',') else {
            // `[1.0]` is the only valid single-element form.
            if !(min_inclusive && max_inclusive) {
                return Err(Error::Manifest(format!("invalid version range '{}'", s)));
            }
            return Ok(Self::exact(inner.parse()?));
        };

        let parse_bound = |text: &str| -> Result<Option<PackageVersion>> {
            let text = text.trim();
            if text.is_empty() {
                Ok(None)
            } else {
                text.parse().map(Some)
            }
        };

        Ok(Self {
            min: parse_bound(low)?,
            min_inclusive,
            max: parse_bound(high)?,
            max_inclusive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> PackageVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_normalization() {
        assert_eq!(v("13.0.1").to_normalized_string(), "13.0.1");
        assert_eq!(v("13.0.1.0").to_normalized_string(), "13.0.1");
        assert_eq!(v("4.7").to_normalized_string(), "4.7.0");
        assert_eq!(v("1.0.0.5").to_normalized_string(), "1.0.0.5");
        assert_eq!(v("2.0.0-rc.1+sha.abc").to_normalized_string(), "2.0.0-rc.1");
    }

    #[test]
    fn test_ordering() {
        assert!(v("1.0.0") < v("1.0.1"));
        assert!(v("1.10.0") > v("1.9.0"));
        assert!(v("2.0.0-beta") < v("2.0.0"));
        assert!(v("2.0.0-alpha.2") < v("2.0.0-alpha.10"));
        assert!(v("2.0.0-alpha") < v("2.0.0-beta"));
        assert_eq!(v("1.0"), v("1.0.0.0"));
    }

    #[test]
    fn test_invalid_versions() {
        assert!("".parse::<PackageVersion>().is_err());
        assert!("1.x".parse::<PackageVersion>().is_err());
        assert!("1.2.3.4.5".parse::<PackageVersion>().is_err());
        assert!("1.0-".parse::<PackageVersion>().is_err());
    }

    #[test]
    fn test_range_parsing() {
        let range: VersionRange = "6.0.0".parse().unwrap();
        assert_eq!(range.min_version(), v("6.0.0"));
        assert!(range.satisfies(&v("7.0.0")));
        assert!(!range.satisfies(&v("5.9.9")));

        let exact: VersionRange = "[1.2.3]".parse().unwrap();
        assert!(exact.satisfies(&v("1.2.3")));
        assert!(!exact.satisfies(&v("1.2.4")));

        let bounded: VersionRange = "[1.0, 2.0)".parse().unwrap();
        assert!(bounded.satisfies(&v("1.5.0")));
        assert!(!bounded.satisfies(&v("2.0.0")));

        let upper: VersionRange = "(,2.0]".parse().unwrap();
        assert_eq!(upper.min_version(), v("0.0.0"));
        assert!(upper.satisfies(&v("2.0.0")));
        assert!(!upper.satisfies(&v("2.0.1")));

        let exclusive: VersionRange = "(1.0,)".parse().unwrap();
        assert!(!exclusive.satisfies(&v("1.0.0")));
        assert!(exclusive.satisfies(&v("1.0.1")));
    }

    #[test]
    fn test_range_display() {
        assert_eq!("1.0".parse::<VersionRange>().unwrap().to_string(), "1.0.0");
        assert_eq!("[1.0]".parse::<VersionRange>().unwrap().to_string(), "[1.0.0]");
        assert_eq!(
            "[1.0,2.0)".parse::<VersionRange>().unwrap().to_string(),
            "[1.0.0, 2.0.0)"
        );
    }

    #[test]
    fn test_invalid_ranges() {
        assert!("(1.0)".parse::<VersionRange>().is_err());
        assert!("[1.0".parse::<VersionRange>().is_err());
    }
}
