//! Message protocol of the software encoder worker
//!
//! The host loads the encoder module, waits for `Ready`, configures the
//! encoder and then streams raw RGBA frames; the worker answers with encoded
//! WebM chunks. Both ends track protocol state explicitly and reject
//! messages that arrive out of order.

use crate::error::MediaResult;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

/// Worker script loaded from the configured base path
pub const WORKER_SCRIPT: &str = "webm-worker.js";
/// Encoder module loaded by the worker
pub const WASM_MODULE: &str = "webm-wasm.wasm";
/// Text signal a worker sends once its module is loaded
pub const READY_SIGNAL: &str = "READY";

/// Encoder parameters sent after `Ready`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncoderParams {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Target bitrate in kbit/s
    pub bitrate: u32,
    /// Timebase denominator, the frame rate
    pub timebase_den: u32,
    /// Encode in real-time mode
    pub realtime: bool,
}

/// Host to worker
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    /// Load the encoder module at this path
    Load {
        /// Module path or URL
        module_path: String,
    },
    /// Configure the encoder
    Configure(EncoderParams),
    /// One raw RGBA frame
    Frame(Bytes),
    /// Shut down
    Terminate,
}

impl HostMessage {
    /// Control messages in their JSON wire form; `None` for binary frames
    pub fn control_json(&self) -> Option<serde_json::Value> {
        match self {
            HostMessage::Load { module_path } => Some(serde_json::Value::String(module_path.clone())),
            HostMessage::Configure(params) => serde_json::to_value(params).ok(),
            HostMessage::Frame(_) => None,
            HostMessage::Terminate => Some(serde_json::Value::Null),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            HostMessage::Load { .. } => "Load",
            HostMessage::Configure(_) => "Configure",
            HostMessage::Frame(_) => "Frame",
            HostMessage::Terminate => "Terminate",
        }
    }
}

/// Worker to host
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    /// Module loaded, waiting for parameters
    Ready,
    /// One encoded WebM chunk
    Chunk(Bytes),
}

impl WorkerMessage {
    /// Parse a text signal from the worker
    pub fn from_signal(signal: &str) -> Option<Self> {
        (signal == READY_SIGNAL).then_some(WorkerMessage::Ready)
    }

    fn name(&self) -> &'static str {
        match self {
            WorkerMessage::Ready => "Ready",
            WorkerMessage::Chunk(_) => "Chunk",
        }
    }
}

/// A message that arrived in a state that does not accept it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unexpected {message} while {state}")]
pub struct ProtocolViolation {
    /// State at the time
    pub state: String,
    /// Offending message
    pub message: String,
}

/// Host-side protocol state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EncoderState {
    /// Module requested, `Ready` pending
    #[default]
    Loading,
    /// Configured and accepting chunks
    Streaming,
    /// Worker shut down
    Terminated,
}

impl fmt::Display for EncoderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncoderState::Loading => write!(f, "loading"),
            EncoderState::Streaming => write!(f, "streaming"),
            EncoderState::Terminated => write!(f, "terminated"),
        }
    }
}

impl EncoderState {
    /// Next state after receiving `message` from the worker
    pub fn on_worker_message(self, message: &WorkerMessage) -> Result<Self, ProtocolViolation> {
        match (self, message) {
            (EncoderState::Loading, WorkerMessage::Ready) => Ok(EncoderState::Streaming),
            (EncoderState::Streaming, WorkerMessage::Chunk(_)) => Ok(EncoderState::Streaming),
            (state, message) => Err(ProtocolViolation {
                state: state.to_string(),
                message: message.name().to_string(),
            }),
        }
    }
}

/// Worker-side protocol state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for the module path
    #[default]
    AwaitingModule,
    /// Module loaded, waiting for parameters
    AwaitingParams,
    /// Accepting frames
    Encoding,
    /// Shut down
    Terminated,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::AwaitingModule => write!(f, "awaiting module"),
            WorkerState::AwaitingParams => write!(f, "awaiting parameters"),
            WorkerState::Encoding => write!(f, "encoding"),
            WorkerState::Terminated => write!(f, "terminated"),
        }
    }
}

impl WorkerState {
    /// Next state after receiving `message` from the host
    pub fn on_host_message(self, message: &HostMessage) -> Result<Self, ProtocolViolation> {
        match (self, message) {
            (WorkerState::AwaitingModule, HostMessage::Load { .. }) => Ok(WorkerState::AwaitingParams),
            (WorkerState::AwaitingParams, HostMessage::Configure(_)) => Ok(WorkerState::Encoding),
            (WorkerState::Encoding, HostMessage::Frame(_)) => Ok(WorkerState::Encoding),
            (WorkerState::Terminated, message) => Err(ProtocolViolation {
                state: WorkerState::Terminated.to_string(),
                message: message.name().to_string(),
            }),
            (_, HostMessage::Terminate) => Ok(WorkerState::Terminated),
            (state, message) => Err(ProtocolViolation {
                state: state.to_string(),
                message: message.name().to_string(),
            }),
        }
    }
}

/// Host handle to a running encoder worker
#[derive(Debug)]
pub struct EncoderWorker {
    /// Messages to the worker
    pub sender: mpsc::UnboundedSender<HostMessage>,
    /// Messages from the worker
    pub receiver: mpsc::UnboundedReceiver<WorkerMessage>,
}

impl EncoderWorker {
    /// Connected host handle and worker endpoint
    pub fn channel() -> (EncoderWorker, WorkerEndpoint) {
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let (worker_tx, worker_rx) = mpsc::unbounded_channel();
        (
            EncoderWorker {
                sender: host_tx,
                receiver: worker_rx,
            },
            WorkerEndpoint {
                receiver: host_rx,
                sender: worker_tx,
                state: WorkerState::default(),
            },
        )
    }
}

/// Worker side of an [`EncoderWorker`] channel
///
/// Incoming messages are checked against [`WorkerState`]; out-of-order
/// messages are logged and skipped.
#[derive(Debug)]
pub struct WorkerEndpoint {
    receiver: mpsc::UnboundedReceiver<HostMessage>,
    sender: mpsc::UnboundedSender<WorkerMessage>,
    state: WorkerState,
}

impl WorkerEndpoint {
    /// Current protocol state
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Next valid host message; `None` once the host is gone
    pub async fn recv(&mut self) -> Option<HostMessage> {
        loop {
            let message = self.receiver.recv().await?;
            if let Some(message) = self.accept(message) {
                return Some(message);
            }
        }
    }

    /// Next valid host message already queued, without waiting
    pub fn try_recv(&mut self) -> Option<HostMessage> {
        loop {
            let message = self.receiver.try_recv().ok()?;
            if let Some(message) = self.accept(message) {
                return Some(message);
            }
        }
    }

    fn accept(&mut self, message: HostMessage) -> Option<HostMessage> {
        match self.state.on_host_message(&message) {
            Ok(next) => {
                self.state = next;
                Some(message)
            }
            Err(violation) => {
                warn!("Encoder worker rejected message: {}", violation);
                None
            }
        }
    }

    /// Signal that the module is loaded; `false` if the host is gone
    pub fn send_ready(&self) -> bool {
        self.sender.send(WorkerMessage::Ready).is_ok()
    }

    /// Emit one encoded chunk; `false` if the host is gone
    pub fn send_chunk(&self, chunk: impl Into<Bytes>) -> bool {
        self.sender.send(WorkerMessage::Chunk(chunk.into())).is_ok()
    }

    /// Whether the host has dropped its handle
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Starts encoder workers
pub trait EncoderWorkerFactory: Send + Sync + fmt::Debug {
    /// Start a worker running the script at `script_url`
    fn spawn(&self, script_url: &str) -> MediaResult<EncoderWorker>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_configure_wire_shape() {
        let params = EncoderParams {
            width: 640,
            height: 480,
            bitrate: 1200,
            timebase_den: 30,
            realtime: true,
        };
        assert_eq!(
            HostMessage::Configure(params).control_json(),
            Some(json!({"width": 640, "height": 480, "bitrate": 1200, "timebaseDen": 30, "realtime": true}))
        );
        assert_eq!(HostMessage::Terminate.control_json(), Some(serde_json::Value::Null));
        assert_eq!(HostMessage::Frame(Bytes::new()).control_json(), None);
    }

    #[test]
    fn test_host_state_transitions() {
        let state = EncoderState::Loading;
        assert!(state.on_worker_message(&WorkerMessage::Chunk(Bytes::new())).is_err());

        let state = state.on_worker_message(&WorkerMessage::Ready).unwrap();
        assert_eq!(state, EncoderState::Streaming);
        assert!(state.on_worker_message(&WorkerMessage::Ready).is_err());
        assert_eq!(
            state.on_worker_message(&WorkerMessage::Chunk(Bytes::new())).unwrap(),
            EncoderState::Streaming
        );

        let error = EncoderState::Terminated
            .on_worker_message(&WorkerMessage::Chunk(Bytes::new()))
            .unwrap_err();
        assert_eq!(error.to_string(), "unexpected Chunk while terminated");
    }

    #[test]
    fn test_worker_state_transitions() {
        let state = WorkerState::AwaitingModule;
        assert!(state.on_host_message(&HostMessage::Frame(Bytes::new())).is_err());

        let state = state
            .on_host_message(&HostMessage::Load {
                module_path: WASM_MODULE.to_string(),
            })
            .unwrap();
        assert!(state.on_host_message(&HostMessage::Frame(Bytes::new())).is_err());
        assert_eq!(
            state.on_host_message(&HostMessage::Terminate).unwrap(),
            WorkerState::Terminated
        );
        assert!(WorkerState::Terminated
            .on_host_message(&HostMessage::Terminate)
            .is_err());
    }

    #[test]
    fn test_ready_signal() {
        assert_eq!(WorkerMessage::from_signal("READY"), Some(WorkerMessage::Ready));
        assert_eq!(WorkerMessage::from_signal("ready"), None);
    }

    #[tokio::test]
    async fn test_endpoint_skips_out_of_order_messages() {
        let (worker, mut endpoint) = EncoderWorker::channel();
        worker.sender.send(HostMessage::Frame(Bytes::from_static(b"early"))).unwrap();
        worker
            .sender
            .send(HostMessage::Load {
                module_path: WASM_MODULE.to_string(),
            })
            .unwrap();

        let first = endpoint.recv().await.unwrap();
        assert!(matches!(first, HostMessage::Load { .. }));
        assert_eq!(endpoint.state(), WorkerState::AwaitingParams);

        drop(worker);
        assert!(endpoint.recv().await.is_none());
        assert!(endpoint.is_closed());
    }
}
