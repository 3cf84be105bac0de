//! Scripted transport for session and conversation tests.

use std::sync::Mutex;

use futures::stream;
use tokio::sync::mpsc;

use crate::api::{AskAnswer, AskRequest};
use crate::errors::StreamFailure;

use super::{AskBody, AskTransport, ByteStream};

pub(crate) type ChunkSender = mpsc::Sender<Result<bytes::Bytes, StreamFailure>>;

enum Script {
    Fail(StreamFailure),
    Chunks(Vec<Vec<u8>>),
    Channel(Mutex<Option<mpsc::Receiver<Result<bytes::Bytes, StreamFailure>>>>),
    Answer(AskAnswer),
    Pending,
}

pub(crate) struct FakeTransport {
    script: Script,
    requests: Mutex<Vec<AskRequest>>,
}

impl FakeTransport {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every frame is sent newline-terminated in its own chunk.
    pub(crate) fn frames(frames: &[&str]) -> Self {
        Self::chunks(frames.iter().map(|f| format!("{f}\n").into_bytes()).collect())
    }

    pub(crate) fn chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self::with_script(Script::Chunks(chunks))
    }

    pub(crate) fn failing(failure: StreamFailure) -> Self {
        Self::with_script(Script::Fail(failure))
    }

    pub(crate) fn answer(answer: AskAnswer) -> Self {
        Self::with_script(Script::Answer(answer))
    }

    /// Never answers the request.
    pub(crate) fn pending() -> Self {
        Self::with_script(Script::Pending)
    }

    /// Body chunks are pushed by the test through the returned sender.
    pub(crate) fn channel() -> (Self, ChunkSender) {
        let (tx, rx) = mpsc::channel(8);
        (Self::with_script(Script::Channel(Mutex::new(Some(rx)))), tx)
    }

    pub(crate) fn requests(&self) -> Vec<AskRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait::async_trait]
impl AskTransport for FakeTransport {
    async fn ask(&self, request: AskRequest) -> Result<AskBody, StreamFailure> {
        self.requests.lock().expect("requests lock").push(request);
        match &self.script {
            Script::Fail(failure) => Err(failure.clone()),
            Script::Chunks(chunks) => {
                let items: Vec<Result<bytes::Bytes, StreamFailure>> = chunks
                    .iter()
                    .map(|chunk| Ok(bytes::Bytes::from(chunk.clone())))
                    .collect();
                Ok(AskBody::EventStream(Box::pin(stream::iter(items))))
            }
            Script::Channel(slot) => {
                let rx = slot
                    .lock()
                    .expect("channel lock")
                    .take()
                    .expect("channel transport supports one exchange");
                let bytes: ByteStream = Box::pin(stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                }));
                Ok(AskBody::EventStream(bytes))
            }
            Script::Answer(answer) => Ok(AskBody::SingleAnswer(answer.clone())),
            Script::Pending => std::future::pending().await,
        }
    }
}
