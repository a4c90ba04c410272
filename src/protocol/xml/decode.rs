use thiserror::Error;

use super::Fields;

/// Errors that can occur during XML decoding
#[derive(Debug, Error)]
pub enum XmlDecodeError {
    #[error("unexpected end of document")]
    UnexpectedEof,

    #[error("malformed tag at offset {0}")]
    MalformedTag(usize),

    #[error("mismatched closing tag: expected </{expected}>, got </{actual}>")]
    MismatchedTag { expected: String, actual: String },

    #[error("unclosed element <{0}>")]
    Unclosed(String),

    #[error("no root element")]
    NoRoot,
}

/// Element being built while its children are parsed
struct OpenElement {
    name: String,
    text: String,
    has_children: bool,
}

/// Decode a document into a flat field map
///
/// # Errors
///
/// Returns `XmlDecodeError` on unbalanced or malformed markup.
pub fn decode_strict(document: &str) -> Result<Fields, XmlDecodeError> {
    let mut fields = Fields::new();
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut seen_root = false;
    let mut pos = 0;

    while pos < document.len() {
        let rest = &document[pos..];

        let Some(lt) = rest.find('<') else {
            // Trailing text after the last tag
            if let Some(open) = stack.last_mut() {
                open.text.push_str(&unescape(rest));
            }
            break;
        };

        if lt > 0 {
            if let Some(open) = stack.last_mut() {
                open.text.push_str(&unescape(&rest[..lt]));
            }
        }
        let tag_start = pos + lt;
        let tag = &document[tag_start..];

        // Declarations, comments and processing instructions carry no fields
        if tag.starts_with("<?") {
            pos = tag_start + skip_past(tag, "?>")?;
            continue;
        }
        if tag.starts_with("<!--") {
            pos = tag_start + skip_past(tag, "-->")?;
            continue;
        }
        if tag.starts_with("<!") {
            pos = tag_start + skip_past(tag, ">")?;
            continue;
        }

        let end = tag.find('>').ok_or(XmlDecodeError::UnexpectedEof)?;
        let inner = &tag[1..end];
        pos = tag_start + end + 1;

        if let Some(name) = inner.strip_prefix('/') {
            let name = name.trim();
            let open = stack.pop().ok_or(XmlDecodeError::MalformedTag(tag_start))?;
            if open.name != name {
                return Err(XmlDecodeError::MismatchedTag {
                    expected: open.name,
                    actual: name.to_string(),
                });
            }
            if !open.has_children {
                fields.insert(open.name, open.text.trim());
            }
            continue;
        }

        let self_closing = inner.ends_with('/');
        let inner = inner.trim_end_matches('/');
        let (name, attributes) = split_tag(inner, tag_start)?;

        if stack.is_empty() {
            if seen_root {
                return Err(XmlDecodeError::MalformedTag(tag_start));
            }
            seen_root = true;
        }
        if let Some(parent) = stack.last_mut() {
            parent.has_children = true;
        }
        for (key, value) in attributes {
            fields.insert(key, value);
        }

        if self_closing {
            // A root-level self-closing element has no field of its own
            if !stack.is_empty() {
                fields.insert(name, "");
            }
        } else {
            stack.push(OpenElement {
                name,
                text: String::new(),
                has_children: false,
            });
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlDecodeError::Unclosed(open.name));
    }
    if !seen_root {
        return Err(XmlDecodeError::NoRoot);
    }

    Ok(fields)
}

fn skip_past(tag: &str, terminator: &str) -> Result<usize, XmlDecodeError> {
    tag.find(terminator)
        .map(|i| i + terminator.len())
        .ok_or(XmlDecodeError::UnexpectedEof)
}

/// Split `name a="1" b='2'` into the element name and its attributes
fn split_tag(inner: &str, offset: usize) -> Result<(String, Vec<(String, String)>), XmlDecodeError> {
    let inner = inner.trim();
    let name_end = inner
        .find(|c: char| c.is_whitespace())
        .unwrap_or(inner.len());
    let name = &inner[..name_end];
    if name.is_empty() || !name.chars().all(is_name_char) {
        return Err(XmlDecodeError::MalformedTag(offset));
    }

    let mut attributes = Vec::new();
    let mut rest = inner[name_end..].trim_start();
    while !rest.is_empty() {
        let eq = rest.find('=').ok_or(XmlDecodeError::MalformedTag(offset))?;
        let key = rest[..eq].trim();
        if key.is_empty() || !key.chars().all(is_name_char) {
            return Err(XmlDecodeError::MalformedTag(offset));
        }

        let after = rest[eq + 1..].trim_start();
        let quote = after
            .chars()
            .next()
            .filter(|c| *c == '"' || *c == '\'')
            .ok_or(XmlDecodeError::MalformedTag(offset))?;
        let close = after[1..]
            .find(quote)
            .ok_or(XmlDecodeError::MalformedTag(offset))?;

        attributes.push((key.to_string(), unescape(&after[1..=close])));
        rest = after[close + 2..].trim_start();
    }

    Ok((name.to_string(), attributes))
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
