use crate::domain::session::{FlowState, Session, SessionKind};
use serde::Serialize;
use std::io::{self, Write};

/// The view of a session handed to the UI layer or printed by the CLI.
///
/// The secret, when present, is only ever rendered redacted.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub kind: SessionKind,
    pub state: FlowState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            kind: session.kind,
            state: session.state().clone(),
            secret: session.secret().map(|s| s.redacted()),
            external_id: session.external_id().map(str::to_string),
        }
    }
}

/// Writes session summaries as JSON lines.
pub struct SessionWriter<W: Write> {
    sink: W,
}

impl<W: Write> SessionWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn write_session(&mut self, session: &Session) -> io::Result<()> {
        serde_json::to_writer(&mut self.sink, &SessionSummary::from(session))?;
        self.sink.write_all(b"\n")?;
        self.sink.flush()
    }
}
