//! Streaming question command

use anyhow::{bail, Result};
use clap::Args;
use gov_api_contract::EventKind;
use gov_client_api::{ClientApi, ClientApiError};
use gov_rest_client::{Conversation, EventDispatcher, EventHandlers, StreamState};
use gov_rest_client_mock::MockClient;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{require_login, ConnectionArgs};

/// Arguments for the ask command
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    #[arg(required = true)]
    pub question: Vec<String>,

    /// Continue the conversation with this session id
    #[arg(long)]
    pub session: Option<String>,

    /// Print the model's intermediate reasoning to stderr
    #[arg(long)]
    pub show_thinking: bool,

    /// Answer from the built-in scripted backend instead of a server
    #[arg(long)]
    pub mock: bool,
}

impl AskArgs {
    pub fn question_text(&self) -> String {
        self.question.join(" ")
    }

    pub async fn run(self, connection: &ConnectionArgs) -> Result<()> {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });

        let failure = Arc::new(Mutex::new(None));
        let mut dispatcher = EventDispatcher::new(terminal_handlers(self.show_thinking, &failure));
        let mut conversation = match &self.session {
            Some(id) => Conversation::resume(id.clone()),
            None => Conversation::new(),
        };
        let question = self.question_text();

        let result = if self.mock {
            let client = MockClient::new();
            client.login("demo", "demo").await?;
            ask(&client, &mut conversation, &question, &mut dispatcher, &cancel).await
        } else {
            let client = connection.connect("/explain").await?;
            require_login(&client, "/explain").await?;
            ask(&client, &mut conversation, &question, &mut dispatcher, &cancel).await
        };

        let state = match result {
            Ok(state) => state,
            Err(ClientApiError::Unauthorized) => {
                bail!("Not logged in or session expired; run `gov login`")
            }
            Err(e) => return Err(e.into()),
        };

        match state {
            StreamState::Completed => {
                if let Some(id) = conversation.session_id() {
                    eprintln!("session: {}", id);
                }
                Ok(())
            }
            StreamState::Cancelled => {
                eprintln!("cancelled");
                Ok(())
            }
            StreamState::Failed => {
                let message = failure
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .take()
                    .unwrap_or_else(|| "unknown error".to_string());
                bail!("Answer stream failed: {}", message)
            }
            StreamState::Open => bail!("Answer stream ended unexpectedly"),
        }
    }
}

async fn ask<C: ClientApi>(
    client: &C,
    conversation: &mut Conversation,
    question: &str,
    dispatcher: &mut EventDispatcher,
    cancel: &CancellationToken,
) -> Result<StreamState, ClientApiError> {
    conversation.ask(client, question, dispatcher, cancel).await
}

/// Callbacks that render the answer on the terminal
pub fn terminal_handlers(show_thinking: bool, failure: &Arc<Mutex<Option<String>>>) -> EventHandlers {
    let failure = failure.clone();
    let handlers = EventHandlers::new()
        .on(EventKind::Metadata, |event| {
            debug!("Answering in session {}", event.session_id().unwrap_or("?"));
        })
        .on(EventKind::AnswerStart, |_| {
            let _ = std::io::stdout().flush();
        })
        .on(EventKind::Chunk, |event| {
            let mut stdout = std::io::stdout();
            let _ = write!(stdout, "{}", event.content().unwrap_or_default());
            let _ = stdout.flush();
        })
        .on(EventKind::Done, |_| println!())
        .on(EventKind::Error, move |event| {
            let message = event.message().unwrap_or("stream error").to_string();
            *failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(message);
        });

    if show_thinking {
        handlers
            .on(EventKind::Thinking, |event| {
                eprint!("{}", event.content().unwrap_or_default());
            })
            .on(EventKind::ThinkingDone, |_| eprintln!())
    } else {
        handlers
    }
}
