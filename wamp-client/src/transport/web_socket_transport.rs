use ahash::HashMap;
use anyhow::{
    Error,
    Result,
};
use futures_util::{
    SinkExt,
    StreamExt,
};
use log::{
    debug,
    error,
    info,
};
use tokio::{
    net::TcpStream,
    sync::mpsc::{
        UnboundedReceiver,
        UnboundedSender,
        unbounded_channel,
    },
};
use tokio_tungstenite::{
    MaybeTlsStream,
    WebSocketStream,
    connect_async,
    tungstenite::{
        ClientRequestBuilder,
        Message,
        http::header::SEC_WEBSOCKET_PROTOCOL,
        protocol::{
            CloseFrame,
            frame::coding::CloseCode,
        },
    },
};

use crate::{
    serializer::serializer::SerializerType,
    transport::transport::{
        Transport,
        TransportEvent,
        TransportEvents,
    },
};

/// Configuration for a [`WebSocketTransport`].
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// The router URI, such as `ws://localhost:8080/ws`.
    pub uri: String,
    /// Allowed serializers, offered as sub-protocols in order.
    ///
    /// The actual serializer is selected by the router during the handshake.
    pub serializers: Vec<SerializerType>,
    /// Additional headers to include in the handshake request.
    pub headers: HashMap<String, String>,
    /// Agent name, sent as the user agent.
    pub agent: String,
}

impl WebSocketConfig {
    /// Creates a configuration for the given router URI, with default settings.
    pub fn new<S>(uri: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            uri: uri.into(),
            serializers: Vec::from_iter([SerializerType::Json, SerializerType::MessagePack]),
            headers: HashMap::default(),
            agent: String::new(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.serializers.is_empty() {
            return Err(Error::msg("at least one serializer is required"));
        }
        Ok(())
    }
}

#[derive(Debug)]
enum WebSocketCommand {
    Send(Vec<u8>),
    Close(String),
}

/// A transport implemented for a TCP stream using the WebSocket protocol.
///
/// The connection is driven by a task on the tokio runtime that is current when
/// [`Transport::connect`] is called.
#[derive(Debug)]
pub struct WebSocketTransport {
    config: WebSocketConfig,
    commands_tx: Option<UnboundedSender<WebSocketCommand>>,
}

impl WebSocketTransport {
    pub fn new(config: WebSocketConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            commands_tx: None,
        })
    }

    fn command(&self, command: WebSocketCommand) -> Result<()> {
        match &self.commands_tx {
            Some(commands_tx) => commands_tx
                .send(command)
                .map_err(|_| Error::msg("websocket connection is closed")),
            None => Err(Error::msg("websocket connection was never opened")),
        }
    }
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, events: TransportEvents) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()?;
        let (commands_tx, commands_rx) = unbounded_channel();
        self.commands_tx = Some(commands_tx);
        runtime.spawn(run_connection(self.config.clone(), events, commands_rx));
        Ok(())
    }

    fn disconnect(&mut self, reason: &str) -> Result<()> {
        let result = self.command(WebSocketCommand::Close(reason.to_owned()));
        self.commands_tx = None;
        result
    }

    fn send(&mut self, payload: Vec<u8>) -> Result<()> {
        self.command(WebSocketCommand::Send(payload))
    }
}

async fn open_stream(
    config: &WebSocketConfig,
) -> Result<(WebSocketStream<MaybeTlsStream<TcpStream>>, SerializerType)> {
    let mut request = ClientRequestBuilder::new(config.uri.as_str().try_into()?);
    if !config.agent.is_empty() {
        request = request.with_header("User-Agent", &config.agent);
    }
    for serializer in &config.serializers {
        request = request.with_sub_protocol(serializer.uri().to_string());
    }
    for (key, value) in &config.headers {
        request = request.with_header(key, value);
    }

    let (stream, response) = connect_async(request).await?;
    let serializer = match response.headers().get(SEC_WEBSOCKET_PROTOCOL) {
        Some(protocol) => {
            let protocol = protocol.to_str()?;
            SerializerType::try_from(protocol).map_err(Error::msg)?
        }
        None => return Err(Error::msg("handshake did not produce a sub-protocol")),
    };
    Ok((stream, serializer))
}

async fn run_connection(
    config: WebSocketConfig,
    events: TransportEvents,
    mut commands_rx: UnboundedReceiver<WebSocketCommand>,
) {
    let (stream, serializer) = match open_stream(&config).await {
        Ok(connection) => connection,
        Err(err) => {
            error!("Failed to connect to {}: {err:#}", config.uri);
            events.deliver(TransportEvent::Disconnected {
                reason: err.to_string(),
                code: None,
            });
            return;
        }
    };
    info!(
        "WebSocket connection established with {} using {}",
        config.uri,
        serializer.uri()
    );
    events.deliver(TransportEvent::Connected(serializer));

    let (mut sink, mut stream) = stream.split();
    // Closes requested by the peer are not reported back to it.
    let closed: Option<(String, Option<u16>)> = loop {
        tokio::select! {
            command = commands_rx.recv() => {
                match command {
                    Some(WebSocketCommand::Send(payload)) => {
                        let message = if serializer.binary() {
                            Message::Binary(payload.into())
                        } else {
                            match String::from_utf8(payload) {
                                Ok(text) => Message::Text(text.into()),
                                Err(err) => {
                                    error!("Dropping outgoing message that is not valid UTF-8: {err}");
                                    continue;
                                }
                            }
                        };
                        if let Err(err) = sink.send(message).await {
                            break Some((err.to_string(), None));
                        }
                    }
                    Some(WebSocketCommand::Close(reason)) => {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: reason.clone().into(),
                        };
                        if let Err(err) = sink.send(Message::Close(Some(frame))).await {
                            debug!("Failed to send close frame to {}: {err}", config.uri);
                        }
                        debug!("WebSocket connection with {} closed by peer: {reason}", config.uri);
                        break None;
                    }
                    None => break None,
                }
            }
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        events.deliver(TransportEvent::Received(text.as_bytes().to_vec()))
                    }
                    Some(Ok(Message::Binary(data))) => {
                        events.deliver(TransportEvent::Received(data.to_vec()))
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(err) = sink.send(Message::Pong(data)).await {
                            break Some((err.to_string(), None));
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break Some(match frame {
                            Some(frame) => (frame.reason.as_str().to_owned(), Some(frame.code.into())),
                            None => ("connection closed by router".to_owned(), None),
                        });
                    }
                    Some(Ok(_)) => (),
                    Some(Err(err)) => break Some((err.to_string(), None)),
                    None => break Some(("connection closed by router".to_owned(), None)),
                }
            }
        }
    };

    if let Some((reason, code)) = closed {
        info!("WebSocket connection with {} closed: {reason}", config.uri);
        events.deliver(TransportEvent::Disconnected { reason, code });
    }
}
