//! OpenAI Realtime connector.
//!
//! Implements the `mago-core` realtime boundary over the OpenAI Realtime
//! WebSocket API. The ephemeral credential is presented as a bearer token, the
//! agent's instructions and tools are registered with `session.update`, and a
//! background task answers the model's function calls with the agent's tool
//! handlers.

use async_openai::types::realtime::{
    self as oai_realtime, ClientEvent as OAIClientEvent, ServerEvent as OAIServerEvent,
};
use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use mago_core::{
    AgentDefinition, Credential, RealtimeConnector, RealtimeError, RealtimeSession, SessionConfig,
    Teardown,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::{
    net::TcpStream,
    sync::Mutex,
    task::{JoinHandle, JoinSet},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, protocol::Message as WsMessage},
};
use tracing::{Instrument, debug, error, info, info_span, trace, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SharedSink = Arc<Mutex<SplitSink<WsStream, WsMessage>>>;
type ToolCalls = Arc<StdMutex<JoinSet<()>>>;

/// Realtime endpoint used when none is configured.
pub const DEFAULT_URL: &str = "wss://api.openai.com/v1/realtime";

/// Opens OpenAI Realtime sessions.
#[derive(Debug, Clone)]
pub struct OpenAIRealtimeConnector {
    url: String,
}

impl Default for OpenAIRealtimeConnector {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

impl OpenAIRealtimeConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn endpoint(&self, model: &str) -> Result<Url, RealtimeError> {
        let mut url = Url::parse(self.url.trim_end_matches('/'))
            .map_err(|e| RealtimeError::Connect(format!("invalid realtime URL: {}", e)))?;
        url.query_pairs_mut().append_pair("model", model);
        Ok(url)
    }
}

#[async_trait]
impl RealtimeConnector for OpenAIRealtimeConnector {
    async fn connect(
        &self,
        agent: Arc<AgentDefinition>,
        config: SessionConfig,
        credential: Credential,
    ) -> Result<Box<dyn RealtimeSession>, RealtimeError> {
        let mut request = self
            .endpoint(&config.model)?
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;
        let authorization = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;
        request.headers_mut().insert("Authorization", authorization);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;
        let (mut sink, stream) = ws_stream.split();
        info!(model = %config.model, agent = %agent.name, "Connected to OpenAI Realtime API.");

        let event = OAIClientEvent::SessionUpdate(oai_realtime::SessionUpdateEvent {
            session: session_resource(&agent, &config.model),
            event_id: None,
        });
        sink.send(encode(&event)?)
            .await
            .map_err(|e| RealtimeError::Transport(e.to_string()))?;

        let sink = Arc::new(Mutex::new(sink));
        let span = info_span!("realtime_events", agent = %agent.name);
        let tool_calls: ToolCalls = Arc::new(StdMutex::new(JoinSet::new()));
        let event_loop = tokio::spawn(
            run_event_loop(agent, sink.clone(), stream, tool_calls.clone()).instrument(span),
        );

        Ok(Box::new(OpenAIRealtimeSession {
            sink,
            event_loop: StdMutex::new(Some(event_loop)),
            tool_calls,
        }))
    }
}

/// A live OpenAI Realtime session.
pub struct OpenAIRealtimeSession {
    sink: SharedSink,
    event_loop: StdMutex<Option<JoinHandle<()>>>,
    /// Tool calls still being answered; aborted with the event loop.
    tool_calls: ToolCalls,
}

impl OpenAIRealtimeSession {
    fn stop_event_loop(&self) {
        if let Ok(mut guard) = self.event_loop.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
        if let Ok(mut tool_calls) = self.tool_calls.lock() {
            tool_calls.abort_all();
        }
    }
}

#[async_trait]
impl RealtimeSession for OpenAIRealtimeSession {
    fn supported_teardowns(&self) -> Vec<Teardown> {
        vec![Teardown::Disconnect, Teardown::StopAudio]
    }

    async fn teardown(&self, method: Teardown) -> Result<(), RealtimeError> {
        match method {
            Teardown::Disconnect => {
                let result = self.sink.lock().await.close().await;
                self.stop_event_loop();
                result.map_err(|e| RealtimeError::Transport(e.to_string()))
            }
            Teardown::StopAudio => {
                let mut sink = self.sink.lock().await;
                for event in stop_audio_events() {
                    sink.send(WsMessage::Text(event.to_string().into()))
                        .await
                        .map_err(|e| RealtimeError::Transport(e.to_string()))?;
                }
                Ok(())
            }
            other => Err(RealtimeError::Unsupported(other)),
        }
    }
}

impl Drop for OpenAIRealtimeSession {
    fn drop(&mut self) {
        self.stop_event_loop();
    }
}

/// Builds the `session.update` payload for an agent.
pub fn session_resource(agent: &AgentDefinition, model: &str) -> oai_realtime::SessionResource {
    let tools = agent
        .tools
        .iter()
        .map(|tool| oai_realtime::ToolDefinition::Function {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        })
        .collect();

    oai_realtime::SessionResource {
        model: Some(model.to_string()),
        modalities: Some(vec!["text".to_string(), "audio".to_string()]),
        instructions: Some(agent.instructions.clone()),
        voice: Some(oai_realtime::RealtimeVoice::Alloy),
        input_audio_format: Some(oai_realtime::AudioFormat::PCM16),
        output_audio_format: Some(oai_realtime::AudioFormat::PCM16),
        input_audio_transcription: Some(oai_realtime::AudioTranscription {
            model: Some("whisper-1".to_string()),
            ..Default::default()
        }),
        turn_detection: Some(oai_realtime::TurnDetection::ServerVAD {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
            interrupt_response: Some(true),
            create_response: Some(true),
        }),
        tools: Some(tools),
        ..Default::default()
    }
}

/// A function call the model asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

impl FunctionCall {
    /// Extracts a function call from a completed output item, if it is one.
    pub fn from_item(item: &oai_realtime::Item) -> Option<Self> {
        if !matches!(item.r#type, Some(oai_realtime::ItemType::FunctionCall)) {
            return None;
        }
        Some(Self {
            call_id: item.call_id.clone()?,
            name: item.name.clone()?,
            arguments: item.arguments.clone().unwrap_or_default(),
        })
    }
}

/// Events that hand a tool result back and ask the model to continue.
pub fn function_output_events(call_id: String, output: &Value) -> [OAIClientEvent; 2] {
    let item = oai_realtime::Item {
        r#type: Some(oai_realtime::ItemType::FunctionCallOutput),
        call_id: Some(call_id),
        output: Some(output.to_string()),
        id: None,
        status: None,
        role: None,
        content: None,
        name: None,
        arguments: None,
    };
    [
        OAIClientEvent::ConversationItemCreate(oai_realtime::ConversationItemCreateEvent {
            item,
            event_id: None,
            previous_item_id: None,
        }),
        OAIClientEvent::ResponseCreate(oai_realtime::ResponseCreateEvent {
            response: None,
            event_id: None,
        }),
    ]
}

fn stop_audio_events() -> [Value; 2] {
    [
        json!({ "type": "response.cancel" }),
        json!({ "type": "input_audio_buffer.clear" }),
    ]
}

fn encode(event: &OAIClientEvent) -> Result<WsMessage, RealtimeError> {
    let text = serde_json::to_string(event).map_err(|e| RealtimeError::Protocol(e.to_string()))?;
    Ok(WsMessage::Text(text.into()))
}

/// Pumps server events until the connection ends, answering function calls.
async fn run_event_loop(
    agent: Arc<AgentDefinition>,
    sink: SharedSink,
    mut stream: SplitStream<WsStream>,
    tool_calls: ToolCalls,
) {
    while let Some(msg_result) = stream.next().await {
        let text = match msg_result {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(frame)) => {
                info!(?frame, "Realtime server closed the connection.");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                error!(error = %e, "Error receiving from realtime WebSocket");
                break;
            }
        };

        let Ok(server_event) = serde_json::from_str::<OAIServerEvent>(&text) else {
            trace!("Ignoring unrecognized realtime event");
            continue;
        };

        match server_event {
            OAIServerEvent::ResponseOutputItemDone(done) => {
                if let Some(call) = FunctionCall::from_item(&done.item) {
                    if let Ok(mut tool_calls) = tool_calls.lock() {
                        while tool_calls.try_join_next().is_some() {}
                        tool_calls.spawn(
                            answer_function_call(agent.clone(), sink.clone(), call)
                                .in_current_span(),
                        );
                    }
                }
            }
            OAIServerEvent::Error(e) => {
                warn!(message = %e.error.message, "Realtime service reported an error");
            }
            _ => {}
        }
    }
    debug!("Realtime event loop finished");
}

async fn answer_function_call(agent: Arc<AgentDefinition>, sink: SharedSink, call: FunctionCall) {
    let output = agent.invoke_tool(&call.name, &call.arguments).await;
    let mut sink = sink.lock().await;
    for event in function_output_events(call.call_id, &output) {
        let sent = match encode(&event) {
            Ok(message) => sink
                .send(message)
                .await
                .map_err(|e| RealtimeError::Transport(e.to_string())),
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            error!(tool = %call.name, error = %e, "Failed to return tool output");
            return;
        }
    }
}
