//! ICY in-stream metadata parsing.
//!
//! A server that honours `Icy-MetaData: 1` interleaves a metadata block after
//! every `icy-metaint` audio bytes. The block starts with one length byte
//! (in units of 16 bytes) followed by `key='value';` pairs.

/// Largest possible metadata block including its length byte.
pub(crate) const MAX_META_BLOCK: usize = 1 + 255 * 16;

/// Bytes needed to hold the first metadata block once its length byte is known.
pub(crate) fn block_end(buf: &[u8], meta_interval: usize) -> Option<usize> {
    buf.get(meta_interval)
        .map(|len| meta_interval + 1 + (*len as usize) * 16)
}

/// Extract `StreamTitle` from the first metadata block in `buf`.
pub fn parse_stream_title(buf: &[u8], meta_interval: usize) -> Option<String> {
    let len = *buf.get(meta_interval)? as usize * 16;
    if len == 0 {
        return None;
    }
    let start = meta_interval + 1;
    let end = (start + len).min(buf.len());
    let block = buf.get(start..end)?;
    let text = String::from_utf8_lossy(block);
    let text = text.trim_end_matches('\0');

    let rest = text.split("StreamTitle='").nth(1)?;
    let title = match rest.find("';") {
        Some(idx) => &rest[..idx],
        None => rest.trim_end_matches('\''),
    };
    Some(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_meta(audio: usize, meta: &str) -> Vec<u8> {
        let mut buf = vec![0xFFu8; audio];
        let blocks = meta.len().div_ceil(16);
        buf.push(blocks as u8);
        buf.extend_from_slice(meta.as_bytes());
        buf.resize(audio + 1 + blocks * 16, 0);
        buf
    }

    #[test]
    fn extracts_title() {
        let buf = with_meta(32, "StreamTitle='Artist - Song';StreamUrl='';");
        assert_eq!(parse_stream_title(&buf, 32).as_deref(), Some("Artist - Song"));
    }

    #[test]
    fn empty_block_has_no_title() {
        let mut buf = vec![0u8; 16];
        buf.push(0);
        assert_eq!(parse_stream_title(&buf, 16), None);
    }

    #[test]
    fn truncated_buffer_is_tolerated() {
        let buf = with_meta(8, "StreamTitle='Long title that gets cut';");
        let cut = &buf[..8 + 1 + 20];
        assert_eq!(parse_stream_title(cut, 8).as_deref(), Some("Long ti"));
    }

    #[test]
    fn missing_length_byte() {
        assert_eq!(parse_stream_title(&[0u8; 4], 8), None);
    }

    #[test]
    fn block_end_uses_length_byte() {
        let buf = with_meta(10, "StreamTitle='x';");
        assert_eq!(block_end(&buf, 10), Some(10 + 1 + 16));
        assert_eq!(block_end(&buf[..5], 10), None);
    }
}
