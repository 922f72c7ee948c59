//! RFC 5322 message construction for `users.messages.send`

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::services::OutgoingEmail;

/// Encode a header value per RFC 2047 when it is not plain printable ASCII
fn encode_header_value(value: &str) -> String {
    let needs_encoding = value
        .chars()
        .any(|c| !c.is_ascii() || c.is_ascii_control());

    if !needs_encoding {
        return value.to_string();
    }

    format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
}

/// Normalize a comma-separated recipient list to `a, b, c`. Control
/// characters are blanked so the list cannot end the header line.
fn recipient_list(to: &str) -> String {
    let flattened: String = to
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    flattened
        .split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the raw RFC 5322 message
pub fn build_raw_message(email: &OutgoingEmail) -> String {
    let content_type = if email.is_html {
        "text/html"
    } else {
        "text/plain"
    };

    let mut message = String::new();
    message.push_str(&format!("To: {}\r\n", recipient_list(&email.to)));
    message.push_str(&format!("Subject: {}\r\n", encode_header_value(&email.subject)));
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str(&format!("Content-Type: {}; charset=utf-8\r\n", content_type));
    message.push_str("Content-Transfer-Encoding: 8bit\r\n");
    message.push_str("\r\n");
    message.push_str(&email.body);

    message
}

/// Message encoded for the `raw` field: URL-safe alphabet, no padding
pub fn encode_raw_message(email: &OutgoingEmail) -> String {
    URL_SAFE_NO_PAD.encode(build_raw_message(email).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(subject: &str, is_html: bool) -> OutgoingEmail {
        OutgoingEmail {
            to: "ada@example.com,  grace@example.com".to_string(),
            subject: subject.to_string(),
            body: "<p>Hi</p>".to_string(),
            is_html,
        }
    }

    #[test]
    fn test_headers_and_body() {
        let raw = build_raw_message(&email("Status", false));
        let (headers, body) = raw.split_once("\r\n\r\n").unwrap();
        assert!(headers.contains("To: ada@example.com, grace@example.com"));
        assert!(headers.contains("Subject: Status"));
        assert!(headers.contains("Content-Type: text/plain; charset=utf-8"));
        assert_eq!(body, "<p>Hi</p>");
    }

    #[test]
    fn test_recipients_cannot_inject_headers() {
        let mut injected = email("s", false);
        injected.to = "ada@example.com\r\nBcc: attacker@evil.test".to_string();

        let raw = build_raw_message(&injected);
        let (headers, _) = raw.split_once("\r\n\r\n").unwrap();
        let lines: Vec<&str> = headers.split("\r\n").collect();

        assert!(lines.iter().all(|l| !l.starts_with("Bcc:")));
        assert_eq!(lines.iter().filter(|l| l.starts_with("To:")).count(), 1);
        assert!(!lines[0].contains('\r') && !lines[0].contains('\n'));
    }

    #[test]
    fn test_html_content_type() {
        let raw = build_raw_message(&email("Status", true));
        assert!(raw.contains("Content-Type: text/html; charset=utf-8"));
    }

    #[test]
    fn test_non_ascii_subject_is_rfc2047() {
        let raw = build_raw_message(&email("Relatório ✓", false));
        let expected = format!("Subject: =?UTF-8?B?{}?=", STANDARD.encode("Relatório ✓"));
        assert!(raw.contains(&expected));
    }

    #[test]
    fn test_raw_field_is_url_safe_unpadded() {
        let encoded = encode_raw_message(&email("Relatório ✓ ??>>", false));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('='));
        let decoded = URL_SAFE_NO_PAD.decode(&encoded).unwrap();
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            build_raw_message(&email("Relatório ✓ ??>>", false))
        );
    }
}
