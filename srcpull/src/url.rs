//! Source locations and the closed set of transports that can serve them.

use std::path::PathBuf;

use crate::Error;

/// The kind of transport used to reach a [`Url`]. Each kind maps onto exactly one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Plain download (`http`, `https`, `ftp`).
    Http,
    /// Local synchronisation of a file or directory.
    Local,
    Git,
    Hg,
    Darcs,
}

impl Transport {
    /// The `<prefix>+` that forces this transport in the textual form of a url.
    fn prefix(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Local => "rsync",
            Self::Git => "git",
            Self::Hg => "hg",
            Self::Darcs => "darcs",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "http" => Some(Self::Http),
            "rsync" | "file" => Some(Self::Local),
            "git" => Some(Self::Git),
            "hg" => Some(Self::Hg),
            "darcs" => Some(Self::Darcs),
            _ => None,
        }
    }

    /// Guess the transport of an address without a forcing prefix.
    fn infer(address: &str) -> Self {
        let is_git = address.trim_end_matches('/').ends_with(".git");
        match address.split_once("://").map(|(scheme, _)| scheme) {
            Some("file") => Self::Local,
            Some("git") => Self::Git,
            Some("hg") => Self::Hg,
            Some("darcs") => Self::Darcs,
            Some(_) if is_git => Self::Git,
            Some(_) => Self::Http,
            // scp-like `user@host:path`
            None if is_git || (address.contains('@') && address.contains(':')) => Self::Git,
            None => Self::Local,
        }
    }

    /// Version control transports track mutable refs rather than fixed content.
    pub fn is_vcs(self) -> bool {
        matches!(self, Self::Git | Self::Hg | Self::Darcs)
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Local => write!(f, "local"),
            Self::Git => write!(f, "git"),
            Self::Hg => write!(f, "hg"),
            Self::Darcs => write!(f, "darcs"),
        }
    }
}

/// A source location: transport, address and an optional ref fragment.
///
/// The textual form is `[<transport>+]<address>[#<fragment>]`. Without a prefix the transport is
/// inferred from the address, so `https://example.com/foo.tar.gz` is a download,
/// `https://example.com/foo.git` a git remote and `/srv/mirror/foo.tar.gz` a local file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Url {
    transport: Transport,
    address: String,
    fragment: Option<String>,
}

impl Url {
    pub fn new<S: Into<String>>(transport: Transport, address: S) -> Self {
        Self {
            transport,
            address: address.into(),
            fragment: None,
        }
    }

    pub fn with_fragment<S: Into<String>>(mut self, fragment: S) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// The ref (branch, tag or revision) named by the fragment, if any.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Append `/`-separated segments to the address. The fragment is dropped.
    pub fn join<I, S>(&self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut address = self.address.trim_end_matches('/').to_string();
        for segment in segments {
            address.push('/');
            address.push_str(segment.as_ref());
        }
        Self::new(self.transport, address)
    }

    /// The last path segment of the address, used to name the fetched artifact.
    pub fn basename(&self) -> String {
        let from_parsed = url::Url::parse(&self.address).ok().and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
                .map(str::to_string)
        });
        let name = from_parsed.unwrap_or_else(|| {
            let trimmed = self.address.trim_end_matches('/');
            trimmed
                .rsplit(['/', ':'])
                .next()
                .unwrap_or(trimmed)
                .to_string()
        });
        if name.is_empty() {
            "download".to_string()
        } else {
            name
        }
    }

    /// The filesystem path of a local url.
    pub fn local_path(&self) -> PathBuf {
        PathBuf::from(
            self.address
                .strip_prefix("file://")
                .unwrap_or(&self.address),
        )
    }
}

impl std::fmt::Display for Url {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if Transport::infer(&self.address) != self.transport {
            write!(f, "{}+", self.transport.prefix())?;
        }
        write!(f, "{}", self.address)?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Url {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| Error::InvalidUrl {
            url: s.to_string(),
            reason: reason.to_string(),
        };
        let (body, fragment) = match s.split_once('#') {
            Some((body, fragment)) => (body, Some(fragment).filter(|f| !f.is_empty())),
            None => (s, None),
        };
        let (forced, address) = match body.split_once('+') {
            Some((prefix, rest)) => match Transport::from_prefix(prefix) {
                Some(transport) => (Some(transport), rest),
                None => (None, body),
            },
            None => (None, body),
        };
        if address.is_empty() {
            return Err(invalid("empty address"));
        }
        let transport = forced.unwrap_or_else(|| Transport::infer(address));
        if transport == Transport::Http {
            url::Url::parse(address).map_err(|e| invalid(&e.to_string()))?;
        }
        Ok(Self {
            transport,
            address: address.to_string(),
            fragment: fragment.map(str::to_string),
        })
    }
}

impl TryFrom<String> for Url {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Url> for String {
    fn from(value: Url) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod test_parsing_urls {
    use super::*;

    fn parse(s: &str) -> Url {
        s.parse().unwrap()
    }

    #[test]
    fn infer_transports() {
        assert_eq!(parse("https://example.com/foo-1.0.tar.gz").transport(), Transport::Http);
        assert_eq!(parse("ftp://example.com/foo.tgz").transport(), Transport::Http);
        assert_eq!(parse("https://github.com/foo/bar.git").transport(), Transport::Git);
        assert_eq!(parse("git@github.com:foo/bar.git").transport(), Transport::Git);
        assert_eq!(parse("git://example.com/bar").transport(), Transport::Git);
        assert_eq!(parse("file:///srv/foo.tar.gz").transport(), Transport::Local);
        assert_eq!(parse("/srv/foo.tar.gz").transport(), Transport::Local);
    }

    #[test]
    fn prefix_forces_transport() {
        let url = parse("hg+https://example.com/repo#default");
        assert_eq!(url.transport(), Transport::Hg);
        assert_eq!(url.address(), "https://example.com/repo");
        assert_eq!(url.fragment(), Some("default"));
        assert_eq!(parse("darcs+https://example.com/repo").transport(), Transport::Darcs);
        assert_eq!(parse("rsync+/srv/mirror").transport(), Transport::Local);
    }

    #[test]
    fn display_round_trips() {
        for s in [
            "https://example.com/foo-1.0.tar.gz",
            "git+https://example.com/repo#v1.0",
            "https://example.com/repo.git#main",
            "hg+https://example.com/repo",
            "/srv/foo.tar.gz",
        ] {
            assert_eq!(parse(s).to_string(), s);
        }
    }

    #[test]
    fn bad_urls_fail() {
        assert!(matches!("".parse::<Url>(), Err(Error::InvalidUrl { .. })));
        assert!(matches!("git+".parse::<Url>(), Err(Error::InvalidUrl { .. })));
        assert!(matches!("http+not a url".parse::<Url>(), Err(Error::InvalidUrl { .. })));
    }

    #[test]
    fn basename_of_addresses() {
        assert_eq!(parse("https://example.com/a/foo-1.0.tar.gz?x=1").basename(), "foo-1.0.tar.gz");
        assert_eq!(parse("https://example.com/a/dir/").basename(), "dir");
        assert_eq!(parse("/srv/mirror/foo.zip").basename(), "foo.zip");
        assert_eq!(parse("git@github.com:bar.git").basename(), "bar.git");
    }

    #[test]
    fn join_appends_segments_and_drops_fragment() {
        let root = parse("https://cache.example.com/root/#frag");
        let joined = root.join(["md5", "ab", "abcd"]);
        assert_eq!(joined.address(), "https://cache.example.com/root/md5/ab/abcd");
        assert_eq!(joined.fragment(), None);
        assert_eq!(joined.transport(), Transport::Http);
    }

    #[test]
    fn local_path_strips_scheme() {
        assert_eq!(parse("file:///srv/x").local_path(), PathBuf::from("/srv/x"));
        assert_eq!(parse("/srv/x").local_path(), PathBuf::from("/srv/x"));
    }
}
