//! Target framework monikers.

/// Framework used when asking sources for dependency metadata.
pub const DEPENDENCY_FRAMEWORK: &str = "netstandard2.1";

/// `lib/` subdirectories probed for reference assemblies, in order.
pub const DEFAULT_FRAMEWORK_ORDER: [&str; 5] = [
    "netstandard2.1",
    "netstandard2.0",
    "netcoreapp3.1",
    "net5.0",
    "net6.0",
];

/// Normalize a framework name to its short lowercase moniker.
///
/// `.NETStandard2.0` → `netstandard2.0`, `.NETCoreApp3.1` → `netcoreapp3.1`,
/// `.NETFramework4.5` → `net45`. Short names pass through lowercased.
pub fn normalize_framework(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();

    if let Some(version) = lower.strip_prefix(".netstandard") {
        return format!("netstandard{}", strip_version_key(version));
    }
    if let Some(version) = lower.strip_prefix(".netcoreapp") {
        let version = strip_version_key(version);
        // .NETCoreApp5.0 and later are the net5.0+ monikers.
        return match version.split('.').next().and_then(|m| m.parse::<u32>().ok()) {
            Some(major) if major >= 5 => format!("net{}", version),
            _ => format!("netcoreapp{}", version),
        };
    }
    if let Some(version) = lower.strip_prefix(".netframework") {
        return format!("net{}", strip_version_key(version).replace('.', ""));
    }

    lower
}

/// `,Version=v2.0` → `2.0`, after lowercasing.
fn strip_version_key(version: &str) -> &str {
    version.trim_start_matches(',').trim_start_matches("version=v")
}

/// Parsed `(family, major, minor)` for the families the resolver reasons about.
fn parse_moniker(moniker: &str) -> Option<(&'static str, u32, u32)> {
    let (family, version) = if let Some(v) = moniker.strip_prefix("netstandard") {
        ("netstandard", v)
    } else if let Some(v) = moniker.strip_prefix("netcoreapp") {
        ("netcoreapp", v)
    } else if let Some(v) = moniker.strip_prefix("net") {
        if !v.contains('.') {
            return None; // net45 and friends: .NET Framework
        }
        ("net", v)
    } else {
        return None;
    };

    let (major, minor) = version.split_once('.').unwrap_or((version, "0"));
    Some((family, major.parse().ok()?, minor.parse().ok()?))
}

/// Frameworks whose assets a project targeting `target` can consume,
/// nearest first.
pub fn compatible_frameworks(target: &str) -> Vec<String> {
    const NETSTANDARD: [(u32, u32); 8] = [
        (2, 1),
        (2, 0),
        (1, 6),
        (1, 5),
        (1, 4),
        (1, 3),
        (1, 2),
        (1, 0),
    ];

    let target = normalize_framework(target);
    let Some((family, major, minor)) = parse_moniker(&target) else {
        return vec![target];
    };

    let mut out = Vec::new();
    let mut netstandard_ceiling = (2, 1);

    match family {
        "net" => {
            for m in (5..=major).rev() {
                out.push(format!("net{}.0", m));
            }
            for (ma, mi) in [(3, 1), (3, 0), (2, 2), (2, 1), (2, 0)] {
                out.push(format!("netcoreapp{}.{}", ma, mi));
            }
        }
        "netcoreapp" => {
            for (ma, mi) in [(3, 1), (3, 0), (2, 2), (2, 1), (2, 0), (1, 1), (1, 0)] {
                if (ma, mi) <= (major, minor) {
                    out.push(format!("netcoreapp{}.{}", ma, mi));
                }
            }
            if (major, minor) < (3, 0) {
                netstandard_ceiling = (2, 0);
            }
        }
        _ => netstandard_ceiling = (major, minor),
    }

    for (ma, mi) in NETSTANDARD {
        if (ma, mi) <= netstandard_ceiling {
            out.push(format!("netstandard{}.{}", ma, mi));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_framework(".NETStandard2.0"), "netstandard2.0");
        assert_eq!(normalize_framework(".NETCoreApp3.1"), "netcoreapp3.1");
        assert_eq!(normalize_framework(".NETCoreApp6.0"), "net6.0");
        assert_eq!(normalize_framework(".NETFramework4.5"), "net45");
        assert_eq!(normalize_framework("netstandard2.1"), "netstandard2.1");
        assert_eq!(normalize_framework("NET8.0"), "net8.0");
    }

    #[test]
    fn test_netstandard_compatibility() {
        let frameworks = compatible_frameworks("netstandard2.1");
        assert_eq!(frameworks[0], "netstandard2.1");
        assert_eq!(frameworks[1], "netstandard2.0");
        assert!(frameworks.contains(&"netstandard1.0".to_string()));
        assert!(!frameworks.iter().any(|f| f.starts_with("netcoreapp")));
    }

    #[test]
    fn test_net_compatibility() {
        let frameworks = compatible_frameworks("net8.0");
        assert_eq!(frameworks[0], "net8.0");
        assert!(frameworks.contains(&"net5.0".to_string()));
        assert!(frameworks.contains(&"netcoreapp3.1".to_string()));
        assert!(frameworks.contains(&"netstandard2.1".to_string()));
    }

    #[test]
    fn test_unknown_framework_passthrough() {
        assert_eq!(compatible_frameworks("net45"), vec!["net45".to_string()]);
    }
}
