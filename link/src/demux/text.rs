use homesec_common::frame::RawFrame;
use tracing::trace;

/// Emit every newline-terminated line of `span` as a trimmed `TextLine`.
///
/// Bytes after the last `\n` are left out; callers either keep them buffered or
/// discard them.
pub fn split_lines(span: &[u8], out: &mut Vec<RawFrame>) {
    let Some(last_newline) = span.iter().rposition(|&b| b == b'\n') else {
        if !span.is_empty() {
            trace!(bytes = span.len(), "unterminated text fragment");
        }
        return;
    };

    let text = String::from_utf8_lossy(&span[..last_newline]);
    for line in text.split('\n') {
        let line = line.trim();
        if !line.is_empty() {
            out.push(RawFrame::TextLine(line.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(span: &[u8]) -> Vec<RawFrame> {
        let mut out = Vec::new();
        split_lines(span, &mut out);
        out
    }

    #[test]
    fn crlf_and_blank_lines() {
        assert_eq!(
            lines(b"ALARM ON\r\n\r\n  TEMP=1 HUM=2 \r\npartial"),
            vec![
                RawFrame::TextLine("ALARM ON".into()),
                RawFrame::TextLine("TEMP=1 HUM=2".into()),
            ]
        );
    }

    #[test]
    fn no_newline_emits_nothing() {
        assert!(lines(b"no terminator").is_empty());
        assert!(lines(b"").is_empty());
    }
}
