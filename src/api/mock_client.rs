use crate::api::client::{AskResponse, ByteStream, MockStreamProducer};
use crate::error::{RequestError, StreamError};
use bytes::Bytes;
use futures::channel::mpsc;
use futures::stream;
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub type FeedSender = mpsc::UnboundedSender<Result<Bytes, StreamError>>;

/// One scripted reply from the fake answer service.
pub enum MockResponse {
    /// Success body delivered as these chunks, then end of stream.
    Chunks(Vec<Vec<u8>>),
    /// Success body that breaks with a read error after the chunks.
    ChunksThenError(Vec<Vec<u8>>, String),
    /// Non-success status with a body.
    Status(u16, String),
    /// Body chunks pushed by the test through a [`FeedSender`].
    Feed(mpsc::UnboundedReceiver<Result<Bytes, StreamError>>),
    /// Whole-response JSON answer.
    Answer(Option<String>),
}

impl MockResponse {
    pub fn text_chunks(chunks: &[&str]) -> Self {
        MockResponse::Chunks(chunks.iter().map(|c| c.as_bytes().to_vec()).collect())
    }

    pub fn feed() -> (FeedSender, Self) {
        let (tx, rx) = mpsc::unbounded();
        (tx, MockResponse::Feed(rx))
    }
}

#[derive(Clone)]
pub struct MockApiClient {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    questions: Arc<Mutex<Vec<String>>>,
}

impl MockApiClient {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            questions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Questions received so far, in request order.
    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }

    fn next_response(&self, question: &str) -> Result<MockResponse, RequestError> {
        self.questions.lock().unwrap().push(question.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| RequestError::Other {
                url: "mock://ask".to_string(),
                message: "MockApiClient: No more responses configured".to_string(),
            })
    }
}

fn status_error(code: u16, body: String) -> RequestError {
    RequestError::Status {
        status: StatusCode::from_u16(code).unwrap(),
        body,
    }
}

impl MockStreamProducer for MockApiClient {
    fn create_mock_stream(&self, question: &str) -> Result<ByteStream, RequestError> {
        match self.next_response(question)? {
            MockResponse::Chunks(chunks) => Ok(Box::pin(stream::iter(
                chunks.into_iter().map(|chunk| Ok(Bytes::from(chunk))),
            ))),
            MockResponse::ChunksThenError(chunks, message) => {
                let mut items: Vec<Result<Bytes, StreamError>> =
                    chunks.into_iter().map(|chunk| Ok(Bytes::from(chunk))).collect();
                items.push(Err(StreamError::Read(message)));
                Ok(Box::pin(stream::iter(items)))
            }
            MockResponse::Status(code, body) => Err(status_error(code, body)),
            MockResponse::Feed(rx) => Ok(Box::pin(rx)),
            MockResponse::Answer(_) => {
                panic!("MockApiClient: answer scripted for a stream request")
            }
        }
    }

    fn create_mock_answer(&self, question: &str) -> Result<AskResponse, RequestError> {
        match self.next_response(question)? {
            MockResponse::Answer(answer) => Ok(AskResponse { answer }),
            MockResponse::Status(code, body) => Err(status_error(code, body)),
            _ => panic!("MockApiClient: stream scripted for a whole-response request"),
        }
    }
}
