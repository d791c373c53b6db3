#![forbid(unsafe_code)]

//! Auto-submitting HTML form for the POST binding.

use base64::Engine;
use sha2::{Digest, Sha256};
use sundby_core::ns;

/// Name of the generated form.
pub const FORM_NAME: &str = "SAMLForm";

/// The inline script that submits the form. Its hash is allow-listed by the
/// page's Content-Security-Policy, so it must not change independently.
pub const AUTO_SUBMIT_SCRIPT: &str = "document.forms.SAMLForm.submit();";

/// `script-src` source expression for [`AUTO_SUBMIT_SCRIPT`].
pub fn script_hash() -> String {
    let hash = Sha256::digest(AUTO_SUBMIT_SCRIPT.as_bytes());
    format!(
        "'sha256-{}'",
        base64::engine::general_purpose::STANDARD.encode(hash)
    )
}

/// Escape text for use in HTML content or a quoted attribute value.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Render the form posting `payload` under `field` to `destination`.
///
/// The `RelayState` input is included only for a non-empty relay state.
pub fn render(destination: &str, field: &str, payload: &str, relay_state: Option<&str>) -> String {
    let mut html = String::with_capacity(payload.len() + 640);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!(
        "<meta http-equiv=\"Content-Security-Policy\" content=\"script-src {}\">\n",
        script_hash()
    ));
    html.push_str("<title>Continue</title>\n</head>\n<body>\n");
    html.push_str(&format!(
        "<form name=\"{FORM_NAME}\" action=\"{}\" method=\"post\">\n",
        escape_html(destination)
    ));
    if let Some(relay_state) = relay_state.filter(|r| !r.is_empty()) {
        html.push_str(&hidden_input(ns::form::RELAY_STATE, relay_state));
    }
    html.push_str(&hidden_input(field, payload));
    html.push_str("<noscript><button type=\"submit\">Continue</button></noscript>\n");
    html.push_str("</form>\n");
    html.push_str(&format!("<script>{AUTO_SUBMIT_SCRIPT}</script>\n"));
    html.push_str("</body>\n</html>\n");
    html
}

fn hidden_input(name: &str, value: &str) -> String {
    format!(
        "<input type=\"hidden\" name=\"{}\" value=\"{}\"/>\n",
        escape_html(name),
        escape_html(value)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csp_hash_matches_inline_script() {
        let html = render("https://sp/acs", "SAMLResponse", "PGEvPg==", None);
        let script = html
            .split("<script>")
            .nth(1)
            .and_then(|s| s.split("</script>").next())
            .unwrap();
        let expected = base64::engine::general_purpose::STANDARD.encode(Sha256::digest(script));
        assert!(html.contains(&format!("script-src 'sha256-{expected}'")));
    }

    #[test]
    fn test_relay_state_only_when_non_empty() {
        let with = render("https://sp/acs", "SAMLResponse", "x", Some("abc"));
        assert!(with.contains(r#"<input type="hidden" name="RelayState" value="abc"/>"#));
        for relay in [None, Some("")] {
            let without = render("https://sp/acs", "SAMLResponse", "x", relay);
            assert!(!without.contains("RelayState"));
        }
    }

    #[test]
    fn test_values_are_escaped() {
        let html = render(
            "https://sp/acs?a=1&b=\"2\"",
            "SAMLRequest",
            "x",
            Some("<script>alert('x')</script>"),
        );
        assert!(html.contains(r#"action="https://sp/acs?a=1&amp;b=&quot;2&quot;""#));
        assert!(html.contains("value=\"&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;\""));
        assert_eq!(html.matches("<script>").count(), 1);
    }
}
