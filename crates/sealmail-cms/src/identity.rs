//! Signer identity resolution
//!
//! Finds the email address a certificate was issued for. The subject DN is
//! consulted first (`EMAILADDRESS=` or `E=`), then `rfc822Name` entries of the
//! Subject Alternative Name extension.

use crate::policy::oids;
use der::asn1::ObjectIdentifier;
use der::{Decode, Encode, Tag, Tagged};
use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;
use x509_cert::Certificate;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::pkix::SubjectAltName;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::name::Name;

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"EMAILADDRESS=([^,]+)|E=([^,]+)").ok());

/// Resolve the email address of a certificate's subject
///
/// Never fails: certificates without a usable address yield `None`.
pub fn email_for(certificate: &Certificate) -> Option<String> {
    let dn = render_name(&certificate.tbs_certificate.subject);
    trace!("Resolving signer email from subject {}", dn);

    email_from_dn(&dn).or_else(|| email_from_san(certificate))
}

/// Extract an email address from an RFC 4514 style distinguished name
///
/// The first `EMAILADDRESS=` or `E=` attribute wins. An attribute with an
/// empty value is treated as absent.
pub fn email_from_dn(dn: &str) -> Option<String> {
    let pattern = EMAIL_PATTERN.as_ref()?;
    let captures = pattern.captures(dn)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().trim())
        .filter(|email| !email.is_empty())
        .map(ToString::to_string)
}

fn email_from_san(certificate: &Certificate) -> Option<String> {
    let extensions = certificate.tbs_certificate.extensions.as_ref()?;

    extensions
        .iter()
        .filter(|ext| ext.extn_id == oids::SUBJECT_ALT_NAME)
        .filter_map(|ext| SubjectAltName::from_der(ext.extn_value.as_bytes()).ok())
        .flat_map(|san| san.0)
        .find_map(|name| match name {
            GeneralName::Rfc822Name(email) => Some(email.to_string()),
            _ => None,
        })
}

/// Render a distinguished name in RFC 4514 order (most specific RDN first)
///
/// PKCS#9 `emailAddress` is rendered as `EMAILADDRESS`. Attributes without
/// a known short name use the dotted OID and a `#`-prefixed hex DER value.
pub fn render_name(name: &Name) -> String {
    let mut out = String::new();

    for (i, rdn) in name.0.iter().rev().enumerate() {
        if i > 0 {
            out.push(',');
        }
        for (j, atv) in rdn.0.iter().enumerate() {
            if j > 0 {
                out.push('+');
            }
            render_attribute(&mut out, atv);
        }
    }

    out
}

fn render_attribute(out: &mut String, atv: &AttributeTypeAndValue) {
    let short_name = short_name(&atv.oid);
    match short_name {
        Some(name) => out.push_str(name),
        None => out.push_str(&atv.oid.to_string()),
    }
    out.push('=');

    let text = matches!(
        atv.value.tag(),
        Tag::Utf8String
            | Tag::PrintableString
            | Tag::Ia5String
            | Tag::TeletexString
            | Tag::VisibleString
    )
    .then(|| std::str::from_utf8(atv.value.value()).ok())
    .flatten();

    match (short_name, text) {
        (Some(_), Some(text)) => escape_value(out, text),
        _ => {
            out.push('#');
            if let Ok(der) = atv.value.to_der() {
                out.push_str(&hex::encode(der));
            }
        }
    }
}

fn escape_value(out: &mut String, value: &str) {
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        let leading = i == 0 && (c == ' ' || c == '#');
        let trailing = i == last && c == ' ';
        if leading || trailing || matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';') {
            out.push('\\');
        }
        out.push(c);
    }
}

const fn short_name(oid: &ObjectIdentifier) -> Option<&'static str> {
    let name = match *oid {
        oids::COMMON_NAME => "CN",
        oids::COUNTRY => "C",
        oids::LOCALITY => "L",
        oids::STATE_OR_PROVINCE => "ST",
        oids::STREET => "STREET",
        oids::ORGANIZATION => "O",
        oids::ORGANIZATIONAL_UNIT => "OU",
        oids::USER_ID => "UID",
        oids::DOMAIN_COMPONENT => "DC",
        oids::EMAIL_ADDRESS => "EMAILADDRESS",
        _ => return None,
    };
    Some(name)
}
