//! Bucket identifier normalization.
//!
//! Users hand us buckets in whatever shape they found them: a bare name, an
//! `s3://` URI, a path-style URL copied from a browser, or a virtual-hosted
//! hostname pulled out of a page's source. [`BucketName::normalize`] reduces
//! all of them to the one canonical name the storage service understands, and
//! [`BucketName::render`] turns it back into any of the supported [`Format`]s.
//!
//! # Example
//!
//! ```
//! use s3scan_storage::{BucketName, Format};
//!
//! let from_url = BucketName::normalize("https://s3.amazonaws.com/my-bucket/index.html");
//! let from_host = BucketName::normalize("my-bucket.s3.amazonaws.com");
//! assert_eq!(from_url, from_host);
//! assert_eq!(from_url.render(Format::Uri), "s3://my-bucket");
//! ```

use crate::error::{Error, ErrorKind};
use regex::Regex;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::LazyLock;

const REGION: &str = r"[a-z]{2}(?:-gov|-iso[a-z]?)?-[a-z]+-\d+";
const SERVICE_HOST_SUFFIX: &str = r"\.amazonaws\.com(?:\.cn)?";

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

/// Bare service host, e.g. `s3.amazonaws.com` or `s3.dualstack.eu-west-1.amazonaws.com`.
fn service_host() -> String {
    format!(r"s3(?:-external-1|[.-](?:dualstack\.)?{REGION})?{SERVICE_HOST_SUFFIX}")
}

regex!(HTTP_SCHEME_REGEX, r"(?i)^https?://");
regex!(PATH_STYLE_REGEX, format!(r"(?i)^{}/", service_host()).as_str());
regex!(VHOST_REGEX, format!(r"(?i)^([^/]+?)\.{}(?:$|/)", service_host()).as_str());
regex!(URI_REGEX, r"^[a-zA-Z][a-zA-Z0-9+.-]*://");

/// The representations a bucket can be rendered into.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Format {
    /// `https://s3.amazonaws.com/<name>`
    Path,
    /// `<name>`
    Name,
    /// `s3://<name>`
    Uri,
    /// `<name>.s3.amazonaws.com`
    VHost,
}
impl Format {
    pub const ALL: [Format; 4] = [Format::Path, Format::Name, Format::Uri, Format::VHost];
}
impl FromStr for Format {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "path" => Ok(Self::Path),
            "name" => Ok(Self::Name),
            "uri" | "url" => Ok(Self::Uri),
            "vhost" | "virtual-host" => Ok(Self::VHost),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Canonical bucket name.
///
/// Two references to the same bucket always normalize to equal values. The
/// other representations are derived on demand and never stored.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct BucketName(String);

impl BucketName {
    /// Extract the canonical bucket name from a free-form reference.
    ///
    /// Never fails: anything unrecognised is assumed to already be a bare
    /// name. The result may be empty (e.g. for an empty reference), it's up
    /// to the caller to reject that with [`is_empty()`](Self::is_empty).
    ///
    /// Matching order matters, as a malformed reference can partially
    /// match more than one pattern:
    /// 1. path-style URL (`s3.amazonaws.com/<name>/...`),
    /// 2. virtual-hosted URL (`<name>.s3.amazonaws.com/...`),
    /// 3. any `scheme://<name>/...` URI,
    /// 4. bare name.
    pub fn normalize(reference: &str) -> Self {
        let trimmed = reference.trim();
        let target = match HTTP_SCHEME_REGEX.find(trimmed) {
            Some(scheme) => &trimmed[scheme.end()..],
            None => trimmed,
        };
        let name = if let Some(host) = PATH_STYLE_REGEX.find(target) {
            &target[host.end()..]
        } else if let Some(captures) = VHOST_REGEX.captures(target) {
            captures.get(1).map(|name| name.as_str()).unwrap_or_default()
        } else if let Some(scheme) = URI_REGEX.find(target) {
            &target[scheme.end()..]
        } else {
            target
        };
        Self(first_segment(name).trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn render(&self, format: Format) -> String {
        match format {
            Format::Path => self.to_path(),
            Format::Name => self.to_name(),
            Format::Uri => self.to_uri(),
            Format::VHost => self.to_vhost(),
        }
    }

    pub fn to_path(&self) -> String {
        format!("https://s3.amazonaws.com/{}", self.0)
    }

    /// The bare name; this is what gets sent to the storage service.
    pub fn to_name(&self) -> String {
        self.0.clone()
    }

    pub fn to_uri(&self) -> String {
        format!("s3://{}", self.0)
    }

    pub fn to_vhost(&self) -> String {
        format!("{}.s3.amazonaws.com", self.0)
    }
}
impl Display for BucketName {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
impl AsRef<str> for BucketName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn first_segment(value: &str) -> &str {
    value.split('/').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("my-bucket", "my-bucket")]
    #[case("  my-bucket\t", "my-bucket")]
    #[case("s3://my-bucket", "my-bucket")]
    #[case("s3://my-bucket/some/key.txt", "my-bucket")]
    #[case("https://s3.amazonaws.com/my-bucket", "my-bucket")]
    #[case("http://s3.amazonaws.com/my-bucket/", "my-bucket")]
    #[case("s3.amazonaws.com/my-bucket/deep/path", "my-bucket")]
    #[case("https://s3-us-west-2.amazonaws.com/my-bucket", "my-bucket")]
    #[case("https://s3.eu-central-1.amazonaws.com/my-bucket/file", "my-bucket")]
    #[case("https://s3.dualstack.ap-southeast-2.amazonaws.com/my-bucket", "my-bucket")]
    #[case("https://s3-external-1.amazonaws.com/my-bucket", "my-bucket")]
    #[case("https://s3.cn-north-1.amazonaws.com.cn/my-bucket", "my-bucket")]
    #[case("my-bucket.s3.amazonaws.com", "my-bucket")]
    #[case("https://my-bucket.s3.amazonaws.com/", "my-bucket")]
    #[case("HTTPS://my-bucket.S3.AMAZONAWS.COM/index.html", "my-bucket")]
    #[case("my-bucket.s3-us-west-2.amazonaws.com", "my-bucket")]
    #[case("my-bucket.s3.us-gov-west-1.amazonaws.com/a/b", "my-bucket")]
    #[case("dotted.bucket.name.s3.amazonaws.com", "dotted.bucket.name")]
    // Looks like a service host at first glance, but it's a bucket.
    #[case("s3-logs.s3.amazonaws.com", "s3-logs")]
    #[case("s3-logs.s3.amazonaws.com/key", "s3-logs")]
    #[case("gs://other-provider/key", "other-provider")]
    #[case("my-bucket/with/embedded/path", "my-bucket")]
    #[case("s3://abc /key", "abc")]
    #[case("s3://  abc/key", "abc")]
    fn test_normalize(#[case] reference: &str, #[case] expected: &str) {
        assert_eq!(BucketName::normalize(reference).as_str(), expected);
    }

    #[test]
    fn test_representation_invariant() {
        let references = [
            "https://s3.amazonaws.com/my-bucket",
            "my-bucket.s3.amazonaws.com",
            "s3://my-bucket",
            "my-bucket",
        ];
        for reference in references {
            assert_eq!(BucketName::normalize(reference).as_str(), "my-bucket", "{reference}");
        }
    }

    #[rstest]
    #[case("my-bucket")]
    #[case("dotted.bucket.name")]
    #[case("s3-logs")]
    #[case("https://bucket-b.s3.amazonaws.com/")]
    #[case("s3://archive-2019/2019/01/dump.tar")]
    #[case("s3.amazonaws.com/assets/app.js")]
    #[case("s3://abc /key")]
    #[case("https://s3.amazonaws.com/ padded /x")]
    fn test_normalize_is_idempotent(#[case] reference: &str) {
        let name = BucketName::normalize(reference);
        for format in Format::ALL {
            let rendered = name.render(format);
            assert_eq!(BucketName::normalize(&rendered), name, "{format:?}: {rendered}");
        }
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("https://")]
    #[case("s3://")]
    #[case("https://s3.amazonaws.com/")]
    #[case("/")]
    fn test_normalize_empty(#[case] reference: &str) {
        assert!(BucketName::normalize(reference).is_empty());
    }

    #[rstest]
    #[case("://")]
    #[case("http:/half-a-scheme")]
    #[case(".s3.amazonaws.com")]
    #[case("💥.s3.amazonaws.com/☃")]
    #[case("s3.amazonaws.com")]
    fn test_normalize_never_panics_on_garbage(#[case] reference: &str) {
        let _ = BucketName::normalize(reference);
    }

    #[test]
    fn test_render() {
        let name = BucketName::normalize("my-bucket");
        assert_eq!(name.render(Format::Path), "https://s3.amazonaws.com/my-bucket");
        assert_eq!(name.render(Format::Name), "my-bucket");
        assert_eq!(name.render(Format::Uri), "s3://my-bucket");
        assert_eq!(name.render(Format::VHost), "my-bucket.s3.amazonaws.com");
        assert_eq!(name.to_string(), "my-bucket");
    }

    #[rstest]
    #[case("path", Format::Path)]
    #[case("name", Format::Name)]
    #[case("url", Format::Uri)]
    #[case("URI", Format::Uri)]
    #[case("vhost", Format::VHost)]
    fn test_format_from_str(#[case] input: &str, #[case] expected: Format) {
        assert_eq!(input.parse::<Format>().unwrap(), expected);
    }

    #[test]
    fn test_format_from_str_invalid() {
        let err = "gopher".parse::<Format>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }
}
