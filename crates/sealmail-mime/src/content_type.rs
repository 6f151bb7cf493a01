//! `Content-Type` header values
//!
//! Parsed messages take their content type from `mail-parser`, which also
//! joins RFC 2231 parameter continuations. [`ContentType::parse`] covers
//! values set on trees built in code. It is lenient: a malformed value still
//! yields a type, and parameters that cannot be split into `name=value` are
//! skipped.

/// Parsed `Content-Type` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    mime_type: String,
    params: Vec<(String, String)>,
}

impl ContentType {
    /// Parse a header value such as `multipart/signed; boundary="b1"`
    pub fn parse(value: &str) -> Self {
        let mut segments = split_params(value).into_iter();
        let mime_type = segments
            .next()
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_default();

        let params = segments
            .filter_map(|segment| {
                let (name, value) = segment.split_once('=')?;
                let name = name.trim().to_ascii_lowercase();
                if name.is_empty() {
                    return None;
                }
                Some((name, unquote(value.trim())))
            })
            .collect();

        Self { mime_type, params }
    }

    /// Lowercase `type/subtype`
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Subtype after the slash, empty if there is none
    pub fn subtype(&self) -> &str {
        self.mime_type
            .split_once('/')
            .map_or("", |(_, subtype)| subtype)
    }

    /// Compare the MIME type, ignoring case and parameters
    pub fn is(&self, mime_type: &str) -> bool {
        self.mime_type.eq_ignore_ascii_case(mime_type)
    }

    pub fn is_multipart(&self) -> bool {
        self.mime_type.starts_with("multipart/")
    }

    /// Parameter value by case-insensitive name, unquoted
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn boundary(&self) -> Option<&str> {
        self.param("boundary").filter(|b| !b.is_empty())
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self {
            mime_type: "text/plain".to_string(),
            params: Vec::new(),
        }
    }
}

impl From<&mail_parser::ContentType<'_>> for ContentType {
    fn from(parsed: &mail_parser::ContentType<'_>) -> Self {
        let mime_type = match parsed.subtype() {
            Some(subtype) => format!("{}/{}", parsed.ctype(), subtype),
            None => parsed.ctype().to_string(),
        };

        let params = parsed
            .attributes()
            .unwrap_or_default()
            .iter()
            .map(|attr| (attr.name.to_ascii_lowercase(), attr.value.to_string()))
            .collect();

        Self {
            mime_type: mime_type.to_ascii_lowercase(),
            params,
        }
    }
}

/// Split on `;` outside quoted strings
fn split_params(value: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                segments.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&value[start..]);

    segments
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"') else {
        return value.to_string();
    };
    let inner = inner.strip_suffix('"').unwrap_or(inner);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
