use regex::Regex;

use crate::error::ApiError;

/// Where a negotiated `(version, format)` pair came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptSource {
    /// Parsed out of a vendor media type in the Accept header.
    Header,
    /// The header was absent or did not match; configured defaults apply.
    Default,
}

/// Result of Accept negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accept {
    pub version: String,
    pub format: String,
    pub source: AcceptSource,
}

/// Parses and builds vendor media types of the form
/// `application/<tree>.<vendor>.<version>+<format>`.
///
/// The vendor token is matched literally and case-sensitively. Versions may
/// carry point releases (`v1`, `v2.0.1`). Formats are passed through without
/// validation; whether one is supported is decided by the formatter registry.
#[derive(Debug, Clone)]
pub struct AcceptParser {
    standards_tree: String,
    subtype: String,
    default_version: String,
    default_format: String,
    pattern: Regex,
}

impl AcceptParser {
    /// Build a parser for the `vnd` tree.
    pub fn new(
        vendor: &str,
        default_version: &str,
        default_format: &str,
    ) -> Result<Self, regex::Error> {
        Self::with_tree("vnd", vendor, default_version, default_format)
    }

    pub fn with_tree(
        standards_tree: &str,
        vendor: &str,
        default_version: &str,
        default_format: &str,
    ) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r"application/{}\.{}\.(v[0-9]+(?:\.[0-9]+)*)\+(\w+)",
            regex::escape(standards_tree),
            regex::escape(vendor)
        ))?;
        Ok(Self {
            standards_tree: standards_tree.to_string(),
            subtype: vendor.to_string(),
            default_version: default_version.to_string(),
            default_format: default_format.to_string(),
            pattern,
        })
    }

    #[must_use]
    pub fn vendor(&self) -> &str {
        &self.subtype
    }

    #[must_use]
    pub fn default_version(&self) -> &str {
        &self.default_version
    }

    #[must_use]
    pub fn default_format(&self) -> &str {
        &self.default_format
    }

    /// Negotiate `(version, format)`, falling back to the defaults.
    ///
    /// Only the first vendor media type in the header is considered.
    #[must_use]
    pub fn parse(&self, header: Option<&str>) -> Accept {
        self.try_parse(header).unwrap_or_else(|| Accept {
            version: self.default_version.clone(),
            format: self.default_format.clone(),
            source: AcceptSource::Default,
        })
    }

    /// Like [`parse`](Self::parse) but a missing or non-matching header is an
    /// error instead of a fallback.
    pub fn parse_strict(&self, header: Option<&str>) -> Result<Accept, ApiError> {
        self.try_parse(header).ok_or_else(|| ApiError::BadRequest {
            message: format!(
                "Accept header could not be properly parsed because of a strict matching process. \
                 Expected application/{}.{}.<version>+<format>",
                self.standards_tree, self.subtype
            ),
        })
    }

    fn try_parse(&self, header: Option<&str>) -> Option<Accept> {
        let captures = self.pattern.captures(header?)?;
        Some(Accept {
            version: captures.get(1)?.as_str().to_string(),
            format: captures.get(2)?.as_str().to_string(),
            source: AcceptSource::Header,
        })
    }

    /// Inverse of [`parse`](Self::parse) for the configured tree and vendor.
    #[must_use]
    pub fn build(&self, version: &str, format: &str) -> String {
        build_accept(&self.standards_tree, &self.subtype, version, format)
    }
}

/// Build a vendor media type header value.
#[must_use]
pub fn build_accept(standards_tree: &str, vendor: &str, version: &str, format: &str) -> String {
    format!("application/{standards_tree}.{vendor}.{version}+{format}")
}
