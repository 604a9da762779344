//! Result emission.

use crate::error::ServerResult;
use crate::handler::{HandlerContext, Response};
use sylva_core::{Database, NodeReadTrx, RevisionNumber, SerializerOptions, XmlSerializer};
use tokio::sync::{mpsc, oneshot};

/// Serializes `resource` at `revision` (latest if `None`) with node ids and
/// the REST envelope.
pub fn serialize_resource(
    ctx: &HandlerContext,
    db: &Database,
    resource: &str,
    revision: Option<RevisionNumber>,
) -> ServerResult<String> {
    let session = db.open_resource(resource)?;
    let rtx = match revision {
        Some(revision) => session.begin_read_at(revision)?,
        None => session.begin_read(),
    };
    serialize_snapshot(ctx, &rtx)
}

/// Serializes the revision pinned by `rtx` with node ids and the REST
/// envelope.
pub fn serialize_snapshot(ctx: &HandlerContext, rtx: &NodeReadTrx) -> ServerResult<String> {
    let options = SerializerOptions::rest().with_pretty_print(ctx.config.pretty_print);
    Ok(XmlSerializer::new(rtx).with_options(options).to_xml_string()?)
}

/// Destination of a response.
pub trait ResponseSink: Send {
    /// Delivers `response`, handing it back if the receiver is gone.
    fn send(self, response: Response) -> Result<(), Response>;
}

impl ResponseSink for oneshot::Sender<Response> {
    fn send(self, response: Response) -> Result<(), Response> {
        oneshot::Sender::send(self, response)
    }
}

impl ResponseSink for mpsc::UnboundedSender<Response> {
    fn send(self, response: Response) -> Result<(), Response> {
        mpsc::UnboundedSender::send(&self, response).map_err(|e| e.0)
    }
}

/// Delivers `response` to `sink`; if the caller has gone away the response
/// is logged and discarded.
pub fn deliver<S: ResponseSink>(sink: S, response: Response) {
    if let Err(response) = sink.send(response) {
        tracing::warn!(status = response.status, "caller gone, response discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_waiting_receiver() {
        let (tx, rx) = oneshot::channel();
        deliver(tx, Response::ok());
        assert_eq!(rx.await.unwrap().status, 200);
    }

    #[test]
    fn discards_when_receiver_dropped() {
        let (tx, rx) = oneshot::channel::<Response>();
        drop(rx);
        deliver(tx, Response::ok());

        let (tx, rx) = mpsc::unbounded_channel::<Response>();
        drop(rx);
        deliver(tx, Response::ok());
    }
}
