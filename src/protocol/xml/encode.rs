use std::fmt::Write;

/// Encode a host-style response document
///
/// Produces `<root status_code=".." status_message="..">` with one child
/// element per field. Used by the in-crate mock host.
#[must_use]
pub fn encode_response(status_code: u16, status_message: &str, fields: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(128);
    output.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    let _ = write!(
        output,
        "<root status_code=\"{status_code}\" status_message=\"{}\">",
        escape(status_message)
    );
    for (name, value) in fields {
        let _ = write!(output, "<{name}>{}</{name}>", escape(value));
    }
    output.push_str("</root>");
    output
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
