//! Stable names for mirrored packages

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Division slash. Looks like `/` but is not a path separator.
pub const SLASH: char = '\u{2215}';

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://(?:[^@/]*@)?(?P<host>[^/]+)(?P<path>/.*)?$")
        .expect("valid url regex")
});

static SCP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@/]+@(?P<host>[^:/]+):(?P<path>.+)$").expect("valid scp regex")
});

/// Host and path of a remote URL; `None` for local paths.
fn remote(url: &str) -> Option<(String, Vec<String>)> {
    let caps = URL.captures(url).or_else(|| SCP.captures(url))?;
    let host = caps.name("host")?.as_str().to_string();
    let path = caps
        .name("path")
        .map(|p| {
            p.as_str()
                .split('/')
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Some((host, path))
}

fn strip_git(component: &str) -> &str {
    component.strip_suffix(".git").unwrap_or(component)
}

/// `(owner, repo)` for GitHub URLs.
pub fn github_pair(url: &str) -> Option<(String, String)> {
    let (host, path) = remote(url)?;
    if !host.ends_with("github.com") {
        return None;
    }
    match path.as_slice() {
        [owner, repo] => Some((owner.clone(), strip_git(repo).to_string())),
        _ => None,
    }
}

/// Display name for a package descriptor: `owner/repo` on GitHub, else the
/// package's own name.
pub fn qualified_name(url: &str, name: &str) -> String {
    match github_pair(url) {
        Some((owner, repo)) => format!("{owner}/{repo}"),
        None => name.to_string(),
    }
}

/// Directory name of a package inside the mirror root.
///
/// Derived from the URL only, so it does not move when the resolver
/// relocates its checkouts.
pub fn mirror_name(url: &str, name: &str, version: Option<&strata_core::Version>) -> String {
    let mut base = if let Some((owner, repo)) = github_pair(url) {
        format!("{owner}{SLASH}{repo}")
    } else if let Some((host, mut path)) = remote(url) {
        if let Some(last) = path.last_mut() {
            *last = strip_git(last).to_string();
        }
        std::iter::once(host)
            .chain(path)
            .map(|c| c.replace(':', "%3A"))
            .collect::<Vec<_>>()
            .join(&SLASH.to_string())
    } else {
        Path::new(url)
            .file_name()
            .map(|n| strip_git(&n.to_string_lossy()).to_string())
            .unwrap_or_else(|| name.to_string())
    };
    if let Some(version) = version {
        base.push('-');
        base.push_str(&version.to_string());
    }
    base
}
