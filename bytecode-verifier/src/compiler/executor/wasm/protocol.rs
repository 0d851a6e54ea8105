//! Newline-delimited JSON messages exchanged with the wasm worker process.
//!
//! The worker announces `ready`, receives exactly one `input`, answers with
//! the `output` carrying the same id and exits after `shutdown`.

use super::super::ExecutorError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ParentMessage {
    #[serde(rename_all = "camelCase")]
    Input {
        id: u64,
        compiler_filename: String,
        payload: Value,
    },
    Shutdown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChildMessage {
    Ready,
    Output { id: u64, result: Value },
}

/// Reads a single message. `None` means the peer closed the stream.
pub async fn read_message<R, M>(reader: &mut R, max_size: usize) -> Result<Option<M>, ExecutorError>
where
    R: AsyncBufRead + Unpin,
    M: DeserializeOwned,
{
    let mut line = String::new();
    let read = reader
        .take(max_size as u64 + 1)
        .read_line(&mut line)
        .await?;
    if read == 0 {
        return Ok(None);
    }
    if line.len() > max_size {
        return Err(ExecutorError::OutputTooLarge(max_size));
    }
    let message = serde_json::from_str(line.trim_end())
        .map_err(|err| ExecutorError::Protocol(format!("malformed message: {err}")))?;
    Ok(Some(message))
}

pub async fn write_message<W, M>(writer: &mut W, message: &M) -> Result<(), ExecutorError>
where
    W: AsyncWrite + Unpin,
    M: Serialize,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::io::BufReader;

    #[test]
    fn messages_wire_format() {
        let input = ParentMessage::Input {
            id: 7,
            compiler_filename: "/compilers/solc-wasm-v0.8.9+commit.e5eed63a.js".to_string(),
            payload: json!({"language": "Solidity"}),
        };
        assert_eq!(
            json!({
                "type": "input",
                "id": 7,
                "compilerFilename": "/compilers/solc-wasm-v0.8.9+commit.e5eed63a.js",
                "payload": {"language": "Solidity"}
            }),
            serde_json::to_value(&input).unwrap()
        );
        assert_eq!(
            json!({"type": "shutdown"}),
            serde_json::to_value(ParentMessage::Shutdown).unwrap()
        );
        assert_eq!(
            json!({"type": "ready"}),
            serde_json::to_value(ChildMessage::Ready).unwrap()
        );
        assert_eq!(
            ChildMessage::Output {
                id: 7,
                result: json!({"contracts": {}})
            },
            serde_json::from_value(json!({"type": "output", "id": 7, "result": {"contracts": {}}}))
                .unwrap()
        );
    }

    #[tokio::test]
    async fn messages_are_line_delimited() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let mut reader = BufReader::new(reader);

        write_message(&mut writer, &ChildMessage::Ready).await.unwrap();
        write_message(&mut writer, &ParentMessage::Shutdown).await.unwrap();
        drop(writer);

        let first: Option<ChildMessage> = read_message(&mut reader, 1024).await.unwrap();
        let second: Option<ParentMessage> = read_message(&mut reader, 1024).await.unwrap();
        let third: Option<ParentMessage> = read_message(&mut reader, 1024).await.unwrap();
        assert_eq!(Some(ChildMessage::Ready), first);
        assert_eq!(Some(ParentMessage::Shutdown), second);
        assert_eq!(None, third);
    }

    #[tokio::test]
    async fn oversized_messages_are_rejected() {
        let (mut writer, reader) = tokio::io::duplex(4096);
        let mut reader = BufReader::new(reader);
        let result = json!({"data": "x".repeat(200)});

        write_message(&mut writer, &ChildMessage::Output { id: 1, result })
            .await
            .unwrap();

        let message: Result<Option<ChildMessage>, _> = read_message(&mut reader, 64).await;
        assert!(matches!(message, Err(ExecutorError::OutputTooLarge(64))));
    }
}
