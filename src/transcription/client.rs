/*!
 * Streaming transcription client.
 *
 * One WebSocket connection per transcription. Audio goes out in fixed-size
 * binary frames; after every frame the client waits for one response frame
 * before sending the next, so the service produces results incrementally and
 * in-flight data stays bounded. After the source is exhausted a single
 * `{"eof" : 1}` text frame is sent, the final response is read, and the
 * connection is closed normally.
 */

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, trace, warn};
use std::path::Path;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::app_config::RecognitionConfig;
use crate::errors::{MalformedMessage, TranscriptionError};

use super::SpeechTranscriber;
use super::json_stream::{JsonStreamBuffer, ScannedItem};
use super::recognition::{RecognitionResult, RecognitionWord};

/// End-of-stream control frame
pub const EOF_MESSAGE: &str = r#"{"eof" : 1}"#;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Counters for one transcription session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Response frames received
    pub frames: usize,
    /// Frames that were empty after trimming
    pub empty_frames: usize,
    /// Complete recognition results parsed
    pub results: usize,
    /// Fragments dropped as malformed
    pub malformed: usize,
}

/// Per-call transcription state: the parse buffer and the words so far.
///
/// Owned by the call that handles the connection and discarded when it ends.
#[derive(Debug, Default)]
pub struct TranscriptionSession {
    buffer: JsonStreamBuffer,
    words: Vec<RecognitionWord>,
    stats: SessionStats,
}

impl TranscriptionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one inbound frame; returns how many words it added
    pub fn ingest_frame(&mut self, payload: &str) -> usize {
        self.stats.frames += 1;

        if payload.trim().is_empty() {
            self.stats.empty_frames += 1;
            debug!("Received an empty frame; ignoring it");
            return 0;
        }

        let before = self.words.len();
        for item in self.buffer.push(payload) {
            match item {
                ScannedItem::Object(json) => match RecognitionResult::parse(&json) {
                    Ok(result) => {
                        self.stats.results += 1;
                        self.words.extend(result.words());
                    }
                    Err(malformed) => self.record_malformed(&malformed),
                },
                ScannedItem::Malformed(malformed) => self.record_malformed(&malformed),
            }
        }

        let added = self.words.len() - before;
        if added > 0 {
            trace!("Frame added {} word(s), {} total", added, self.words.len());
        }
        added
    }

    /// Words accepted so far, in arrival order
    pub fn words(&self) -> &[RecognitionWord] {
        &self.words
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// True while part of an object is still buffered
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// End the session and hand back the ordered words
    pub fn finish(mut self) -> Vec<RecognitionWord> {
        if self.has_pending() {
            warn!(
                "Transcription ended with an incomplete message buffered ({} bytes); discarding it",
                self.buffer.pending().len()
            );
            self.buffer.clear();
        }
        self.words
    }

    fn record_malformed(&mut self, malformed: &MalformedMessage) {
        self.stats.malformed += 1;
        warn!("{}", malformed);
    }
}

/// WebSocket client for the recognition service
#[derive(Debug, Clone)]
pub struct TranscriptionClient {
    config: RecognitionConfig,
}

impl TranscriptionClient {
    pub fn new(config: RecognitionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    /// Transcribe an audio file
    pub async fn transcribe_file(&self, audio_path: &Path) -> Result<Vec<RecognitionWord>, TranscriptionError> {
        let file = tokio::fs::File::open(audio_path)
            .await
            .map_err(|e| TranscriptionError::AudioSource {
                path: audio_path.to_path_buf(),
                source: e,
            })?;

        info!("Transcribing {:?} via {}", audio_path, self.config.server_url);
        self.transcribe_reader(file, audio_path).await
    }

    /// Transcribe any async byte source; `source_name` is used in errors
    pub async fn transcribe_reader<R>(
        &self,
        mut source: R,
        source_name: &Path,
    ) -> Result<Vec<RecognitionWord>, TranscriptionError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let start_time = Instant::now();
        let mut ws = self.connect().await?;
        let mut session = TranscriptionSession::new();
        let mut chunk = vec![0u8; self.config.chunk_size.max(1)];
        let mut chunks_sent = 0usize;

        loop {
            let count = read_chunk(&mut source, &mut chunk)
                .await
                .map_err(|e| TranscriptionError::AudioSource {
                    path: source_name.to_path_buf(),
                    source: e,
                })?;
            if count == 0 {
                break;
            }

            ws.send(Message::Binary(Bytes::copy_from_slice(&chunk[..count])))
                .await
                .map_err(|e| TranscriptionError::Send(e.to_string()))?;
            chunks_sent += 1;
            trace!("Sent audio chunk {} ({} bytes)", chunks_sent, count);

            self.receive_result(&mut ws, &mut session, false).await?;
        }

        ws.send(Message::Text(EOF_MESSAGE.into()))
            .await
            .map_err(|e| TranscriptionError::Send(e.to_string()))?;

        let state = self.receive_result(&mut ws, &mut session, true).await?;
        if state == StreamState::Open {
            self.close(&mut ws, &mut session).await;
        }

        debug!(
            "Transcription session finished in {:?}: {} chunk(s) sent, {:?}",
            start_time.elapsed(),
            chunks_sent,
            session.stats()
        );

        let words = session.finish();
        info!("Recognized {} word(s)", words.len());
        Ok(words)
    }

    async fn connect(&self) -> Result<WsStream, TranscriptionError> {
        let url = self.config.server_url.as_str();
        let timeout = self.config.connect_timeout();

        let result = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| TranscriptionError::ConnectTimeout {
                url: url.to_string(),
                timeout,
            })?;

        let (ws, _response) = result.map_err(|e| TranscriptionError::Connect {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        debug!("Connected to recognition service at {}", url);
        Ok(ws)
    }

    /// Wait for one response frame and feed it to the session.
    ///
    /// Control frames are skipped. A close from the service is only
    /// acceptable once the end-of-stream frame has been sent.
    async fn receive_result(
        &self,
        ws: &mut WsStream,
        session: &mut TranscriptionSession,
        after_eof: bool,
    ) -> Result<StreamState, TranscriptionError> {
        let timeout = self.config.read_timeout();

        loop {
            let next = tokio::time::timeout(timeout, ws.next())
                .await
                .map_err(|_| TranscriptionError::ReadTimeout(timeout))?;

            match next {
                Some(Ok(message)) => match Frame::classify(message) {
                    Frame::Payload(text) => {
                        session.ingest_frame(&text);
                        return Ok(StreamState::Open);
                    }
                    Frame::Control => continue,
                    Frame::Close => return closed_by_service(after_eof),
                },
                Some(Err(e)) => return Err(TranscriptionError::Receive(e.to_string())),
                None => return closed_by_service(after_eof),
            }
        }
    }

    /// Close normally, still accepting result frames the service had in flight
    async fn close(&self, ws: &mut WsStream, session: &mut TranscriptionSession) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "OK".into(),
        };
        if let Err(e) = ws.close(Some(frame)).await {
            debug!("Close handshake failed: {}", e);
            return;
        }

        let timeout = self.config.read_timeout();
        loop {
            match tokio::time::timeout(timeout, ws.next()).await {
                Ok(Some(Ok(message))) => match Frame::classify(message) {
                    Frame::Payload(text) => {
                        session.ingest_frame(&text);
                    }
                    Frame::Control => {}
                    Frame::Close => break,
                },
                Ok(Some(Err(e))) => {
                    debug!("Error while draining closed connection: {}", e);
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    debug!("Recognition service did not acknowledge close within {:?}", timeout);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl SpeechTranscriber for TranscriptionClient {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<RecognitionWord>, TranscriptionError> {
        self.transcribe_file(audio_path).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Open,
    Closed,
}

fn closed_by_service(after_eof: bool) -> Result<StreamState, TranscriptionError> {
    if after_eof {
        debug!("Recognition service closed the connection after end of stream");
        Ok(StreamState::Closed)
    } else {
        Err(TranscriptionError::ConnectionClosed)
    }
}

/// Inbound message reduced to what the session cares about
enum Frame {
    Payload(String),
    Control,
    Close,
}

impl Frame {
    fn classify(message: Message) -> Self {
        match message {
            Message::Text(text) => Frame::Payload(text.as_str().to_string()),
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => Frame::Payload(text.to_string()),
                Err(_) => {
                    warn!("Ignoring {}-byte binary frame that is not UTF-8", data.len());
                    Frame::Payload(String::new())
                }
            },
            Message::Close(_) => Frame::Close,
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Frame::Control,
        }
    }
}

/// Fill `buf` from `source`, stopping early only at end of input
async fn read_chunk<R>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let count = source.read(&mut buf[filled..]).await?;
        if count == 0 {
            break;
        }
        filled += count;
    }
    Ok(filled)
}
