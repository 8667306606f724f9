use crate::error::{Error, ErrorKind, Result};
use async_stream::stream;
use futures::Stream;
use std::borrow::Cow;
use std::io::IsTerminal;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

pub type InputReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Where bucket references are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    File(PathBuf),
    /// Standard input; only accepted when something is piped into it.
    Stdin,
}
impl InputSource {
    /// `-` means standard input; anything else is a file path.
    pub fn from_arg(arg: impl Into<PathBuf>) -> Self {
        let path = arg.into();
        match path.as_os_str() == "-" {
            true => Self::Stdin,
            false => Self::File(path),
        }
    }

    pub async fn open(&self) -> Result<InputReader> {
        match self {
            Self::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| Error::from(ErrorKind::Input(format!("{}: {e}", path.display()))))?;
                Ok(Box::new(BufReader::new(file)))
            },
            Self::Stdin => {
                if std::io::stdin().is_terminal() {
                    exn::bail!(ErrorKind::Input("standard input is a terminal, pipe a bucket list into it".to_string()));
                }
                Ok(Box::new(BufReader::new(tokio::io::stdin())))
            },
        }
    }
}

/// Trimmed, non-blank lines of `input`.
///
/// Bytes that aren't valid UTF-8 are replaced rather than rejected; such a
/// line just names a bucket that won't exist. A read error is yielded once
/// and ends the stream.
pub fn references<R>(mut input: R) -> impl Stream<Item = Result<String>>
where
    R: AsyncBufRead + Unpin,
{
    stream!({
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match input.read_until(b'\n', &mut buffer).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buffer);
                    if let Cow::Owned(_) = line {
                        tracing::warn!(line = %line.trim(), "Input line is not valid UTF-8");
                    }
                    let line = line.trim();
                    if !line.is_empty() {
                        yield Ok(line.to_string());
                    }
                },
                Err(e) => {
                    yield Err(Error::from(ErrorKind::Input(e.to_string())));
                    return;
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use rstest::rstest;

    #[rstest]
    #[case("-", InputSource::Stdin)]
    #[case("buckets.txt", InputSource::File(PathBuf::from("buckets.txt")))]
    #[case("./-", InputSource::File(PathBuf::from("./-")))]
    fn test_from_arg(#[case] arg: &str, #[case] expected: InputSource) {
        assert_eq!(InputSource::from_arg(arg), expected);
    }

    #[tokio::test]
    async fn test_references_skip_blank_lines() {
        let input: &[u8] = b"  bucket-a  \n\n\t\nhttps://bucket-b.s3.amazonaws.com/\r\nlast-without-newline";
        let lines: Vec<_> = references(input).map(|r| r.unwrap()).collect().await;
        assert_eq!(lines, ["bucket-a", "https://bucket-b.s3.amazonaws.com/", "last-without-newline"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_kept() {
        let input: &[u8] = b"good\n\xff\xfe-bucket\nstill-read\n";
        let lines: Vec<_> = references(input).map(|r| r.unwrap()).collect().await;
        assert_eq!(lines, ["good", "\u{FFFD}\u{FFFD}-bucket", "still-read"]);
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = InputSource::File(temp_dir.path().join("missing.txt"));
        let err = source.open().await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Input(_)));
    }

    #[tokio::test]
    async fn test_open_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("buckets.txt");
        std::fs::write(&path, "one\ntwo\n").unwrap();
        let reader = InputSource::File(path).open().await.unwrap();
        let lines: Vec<_> = references(reader).map(|r| r.unwrap()).collect().await;
        assert_eq!(lines, ["one", "two"]);
    }
}
