//! Wire protocol of the AI backend: upload, submit, and the event stream
//! that delivers the job result.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;

use super::result::ArtifactRef;
use super::sse::{SseDecoder, SseEvent};
use super::AiError;
use crate::config::AiBackendConfig;
use crate::external::ByteStream;

/// The calls the adapter makes against the AI backend.
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    /// Uploads a video and returns the backend's handle for it.
    async fn upload(&self, file_name: &str, video: ByteStream) -> Result<String, AiError>;

    /// Starts an analysis job for an uploaded video and returns its event id.
    async fn submit(&self, video_path: &str) -> Result<String, AiError>;

    /// Blocks until the job emits `complete` (returning its payload) or
    /// `error`.
    async fn await_result(&self, event_id: &str) -> Result<Value, AiError>;

    /// Fetches an artifact produced by a finished job.
    async fn download(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, AiError>;
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    event_id: String,
}

/// [`AnalysisTransport`] over the backend's HTTP API.
pub struct HttpTransport {
    client: Client,
    /// Only bounded by the connect timeout; a job's event stream stays open
    /// for as long as the job runs.
    stream_client: Client,
    base_url: String,
    job: String,
}

impl HttpTransport {
    pub fn new(config: &AiBackendConfig) -> Result<Self, AiError> {
        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let stream_client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self {
            client,
            stream_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            job: config.job.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn check(stage: &'static str, response: Response) -> Result<Response, AiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AiError::Status {
            stage,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AnalysisTransport for HttpTransport {
    async fn upload(&self, file_name: &str, video: ByteStream) -> Result<String, AiError> {
        let body = Body::wrap_stream(ReaderStream::new(video));
        let form = Form::new().part("files", Part::stream(body).file_name(file_name.to_string()));

        let response = self
            .client
            .post(self.url("upload"))
            .multipart(form)
            .send()
            .await?;
        let paths: Vec<String> = Self::check("upload", response).await?.json().await?;

        paths
            .into_iter()
            .next()
            .ok_or_else(|| AiError::Protocol("upload returned no file path".to_string()))
    }

    async fn submit(&self, video_path: &str) -> Result<String, AiError> {
        let request = json!({
            "data": [{
                "path": video_path,
                "meta": {"_type": "gradio.FileData"}
            }]
        });

        let response = self
            .client
            .post(self.url(&format!("call/{}", self.job)))
            .json(&request)
            .send()
            .await?;
        let submitted: SubmitResponse = Self::check("submit", response).await?.json().await?;
        Ok(submitted.event_id)
    }

    async fn await_result(&self, event_id: &str) -> Result<Value, AiError> {
        let response = self
            .stream_client
            .get(self.url(&format!("call/{}/{}", self.job, event_id)))
            .header("accept", "text/event-stream")
            .send()
            .await?;
        let response = Self::check("event stream", response).await?;

        let mut decoder = SseDecoder::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            for event in decoder.push(&chunk?) {
                if let Some(result) = terminal(event) {
                    return result;
                }
            }
        }
        match decoder.finish().and_then(terminal) {
            Some(result) => result,
            None => Err(AiError::StreamClosed),
        }
    }

    async fn download(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, AiError> {
        let url = if artifact.is_url() {
            artifact.location.clone()
        } else {
            self.url(&format!("file={}", artifact.location))
        };
        let response = self.client.get(url).send().await?;
        let bytes = Self::check("download", response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Maps a terminal event to the job result; `None` for progress events.
fn terminal(event: SseEvent) -> Option<Result<Value, AiError>> {
    match event.event.as_str() {
        "complete" => Some(serde_json::from_str(&event.data).map_err(|e| {
            AiError::Protocol(format!("invalid complete payload: {}", e))
        })),
        "error" => Some(Err(AiError::Remote(remote_message(&event.data)))),
        _ => None,
    }
}

fn remote_message(data: &str) -> String {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::String(s)) => s,
        Ok(Value::Null) => "unknown error".to_string(),
        Ok(other) => other.to_string(),
        Err(_) if data.trim().is_empty() => "unknown error".to_string(),
        Err(_) => data.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    fn event(name: &str, data: &str) -> SseEvent {
        SseEvent {
            event: name.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_progress_events_are_not_terminal() {
        assert!(terminal(event("generating", "null")).is_none());
        assert!(terminal(event("heartbeat", "")).is_none());
    }

    #[test]
    fn test_complete_event_yields_payload() {
        let value = terminal(event("complete", "[\"hi\", null]")).unwrap().unwrap();
        assert_eq!(value, json!(["hi", null]));

        let err = terminal(event("complete", "not json")).unwrap().unwrap_err();
        assert!(matches!(err, AiError::Protocol(_)));
    }

    #[test]
    fn test_error_event_carries_remote_message() {
        let err = terminal(event("error", "\"CUDA out of memory\"")).unwrap().unwrap_err();
        assert_eq!(err.to_string(), "AI backend reported an error: CUDA out of memory");

        let err = terminal(event("error", "null")).unwrap().unwrap_err();
        assert!(err.to_string().ends_with("unknown error"));
    }

    #[test]
    fn test_url_joining() {
        let transport = HttpTransport::new(&AiBackendConfig {
            base_url: "http://ai.local:7860/".to_string(),
            ..AiBackendConfig::default()
        })
        .unwrap();
        assert_eq!(transport.url("upload"), "http://ai.local:7860/upload");
        assert_eq!(
            transport.url("call/predict/abc"),
            "http://ai.local:7860/call/predict/abc"
        );
    }

    /// Serves one event stream that emits a progress event right away and
    /// the `complete` event only after `delay`.
    async fn slow_event_stream(delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n",
                )
                .await
                .unwrap();
            socket.write_all(b"event: generating\ndata: null\n\n").await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(delay).await;
            socket
                .write_all(b"event: complete\ndata: [\"late\"]\n\n")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_event_after_request_timeout_is_consumed() {
        let base_url = slow_event_stream(Duration::from_millis(2500)).await;
        let transport = HttpTransport::new(&AiBackendConfig {
            base_url,
            request_timeout_secs: 1,
            ..AiBackendConfig::default()
        })
        .unwrap();

        let value = transport.await_result("evt-1").await.unwrap();
        assert_eq!(value, json!(["late"]));
    }
}
