//! Bounded reading of newline-delimited requests.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// One line of request input.
#[derive(Debug, PartialEq, Eq)]
pub enum InputLine {
    /// Line contents without the terminator.
    Request(String),
    /// A line longer than the limit. Its contents were skipped.
    Oversized,
}

/// Read the next line, buffering at most `limit + 1` bytes of it.
///
/// Returns `None` at end of input.
pub async fn next_line<R>(reader: &mut R, limit: usize) -> std::io::Result<Option<InputLine>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let read = (&mut *reader).take(cap).read_until(b'\n', &mut buf).await?;
    if read == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > limit {
        skip_line(reader).await?;
        return Ok(Some(InputLine::Oversized));
    }

    Ok(Some(InputLine::Request(
        String::from_utf8_lossy(&buf).into_owned(),
    )))
}

/// Discard input up to and including the next newline.
async fn skip_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(input: &[u8], limit: usize) -> Vec<InputLine> {
        let mut reader = tokio::io::BufReader::with_capacity(4, input);
        let mut lines = Vec::new();
        while let Some(line) = next_line(&mut reader, limit).await.unwrap() {
            lines.push(line);
        }
        lines
    }

    fn request(text: &str) -> InputLine {
        InputLine::Request(text.to_string())
    }

    #[tokio::test]
    async fn test_splits_lines() {
        let lines = collect(b"{\"a\":1}\r\n\n{\"b\":2}", 64).await;
        assert_eq!(lines, vec![request("{\"a\":1}"), request(""), request("{\"b\":2}")]);
    }

    #[tokio::test]
    async fn test_line_at_limit_is_kept() {
        let lines = collect(b"12345678\nnext\n", 8).await;
        assert_eq!(lines, vec![request("12345678"), request("next")]);
    }

    #[tokio::test]
    async fn test_oversized_line_is_skipped() {
        let lines = collect(b"123456789abcdef\nnext\n0123456789", 8).await;
        assert_eq!(lines, vec![InputLine::Oversized, request("next"), InputLine::Oversized]);
    }
}
