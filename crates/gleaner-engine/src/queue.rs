//! Edge queues.
//!
//! Each dependency edge gets one queue with a single producer and a single
//! consumer. A producer ends its stream with an explicit sentinel: [`Message::End`]
//! after the last document, or [`Message::Failed`] when it failed. Both
//! sentinels consume the sender, so nothing can follow them.
//!
//! A node with several consumers writes through a [`FanOut`], which pushes
//! every document to each consumer queue in emission order. Documents are
//! shared, not copied.

use futures::stream::{self, BoxStream, StreamExt};
use gleaner_document::SharedDocument;
use tokio::sync::mpsc;
use tracing::debug;

/// An item travelling through a queue.
#[derive(Debug, Clone)]
pub enum Message {
  /// The next document.
  Document(SharedDocument),
  /// The producer finished normally.
  End,
  /// The producer (or one of its upstreams) failed.
  Failed { node_id: String, reason: String },
}

impl Message {
  pub fn is_sentinel(&self) -> bool {
    !matches!(self, Message::Document(_))
  }
}

/// The consumer side has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

enum Tx {
  Unbounded(mpsc::UnboundedSender<Message>),
  Bounded(mpsc::Sender<Message>),
}

enum Rx {
  Unbounded(mpsc::UnboundedReceiver<Message>),
  Bounded(mpsc::Receiver<Message>),
}

/// Producer half of an edge queue.
pub struct QueueSender {
  tx: Tx,
}

/// Consumer half of an edge queue.
pub struct QueueReceiver {
  rx: Rx,
  producer: String,
  terminated: bool,
}

/// Create a queue fed by `producer`.
///
/// `capacity` of `None` gives an unbounded queue where `send` never waits.
pub fn channel(producer: &str, capacity: Option<usize>) -> (QueueSender, QueueReceiver) {
  let (tx, rx) = match capacity {
    None => {
      let (tx, rx) = mpsc::unbounded_channel();
      (Tx::Unbounded(tx), Rx::Unbounded(rx))
    }
    Some(n) => {
      let (tx, rx) = mpsc::channel(n.max(1));
      (Tx::Bounded(tx), Rx::Bounded(rx))
    }
  };

  (
    QueueSender { tx },
    QueueReceiver {
      rx,
      producer: producer.to_string(),
      terminated: false,
    },
  )
}

impl QueueSender {
  async fn push(&self, message: Message) -> Result<(), QueueClosed> {
    match &self.tx {
      Tx::Unbounded(tx) => tx.send(message).map_err(|_| QueueClosed),
      Tx::Bounded(tx) => tx.send(message).await.map_err(|_| QueueClosed),
    }
  }

  /// Push a document. Waits for room on a bounded queue.
  pub async fn send(&self, document: SharedDocument) -> Result<(), QueueClosed> {
    self.push(Message::Document(document)).await
  }

  /// Push the end-of-stream sentinel.
  pub async fn finish(self) -> Result<(), QueueClosed> {
    self.push(Message::End).await
  }

  /// Push the failure sentinel.
  pub async fn fail(self, node_id: &str, reason: &str) -> Result<(), QueueClosed> {
    self
      .push(Message::Failed {
        node_id: node_id.to_string(),
        reason: reason.to_string(),
      })
      .await
  }
}

impl QueueReceiver {
  /// Id of the node feeding this queue.
  pub fn producer(&self) -> &str {
    &self.producer
  }

  /// Receive the next message.
  ///
  /// Returns `None` once a sentinel has been delivered. A producer that
  /// disappears without a sentinel is reported as a failure.
  pub async fn recv(&mut self) -> Option<Message> {
    if self.terminated {
      return None;
    }

    let message = match &mut self.rx {
      Rx::Unbounded(rx) => rx.recv().await,
      Rx::Bounded(rx) => rx.recv().await,
    };

    match message {
      Some(message) => {
        self.terminated = message.is_sentinel();
        Some(message)
      }
      None => {
        self.terminated = true;
        Some(Message::Failed {
          node_id: self.producer.clone(),
          reason: "producer stopped without an end-of-stream marker".to_string(),
        })
      }
    }
  }

  /// Turn the queue into a stream of messages ending after the sentinel.
  pub fn into_stream(self) -> BoxStream<'static, Message> {
    stream::unfold(self, |mut rx| async move {
      let message = rx.recv().await?;
      Some((message, rx))
    })
    .boxed()
  }
}

/// Replicates one producer's output stream to every consumer queue.
pub struct FanOut {
  producer: String,
  senders: Vec<QueueSender>,
}

impl FanOut {
  pub fn new(producer: impl Into<String>, senders: Vec<QueueSender>) -> Self {
    Self {
      producer: producer.into(),
      senders,
    }
  }

  /// Number of consumer queues.
  pub fn width(&self) -> usize {
    self.senders.len()
  }

  /// Push a document to every consumer, in consumer order.
  ///
  /// A consumer that has already stopped is skipped.
  pub async fn send(&self, document: &SharedDocument) {
    for sender in &self.senders {
      if sender.send(document.clone()).await.is_err() {
        debug!(
          node_id = %self.producer,
          document_id = %document.id(),
          "consumer queue closed, dropping document"
        );
      }
    }
  }

  /// End every consumer stream normally.
  pub async fn finish(self) {
    for sender in self.senders {
      let _ = sender.finish().await;
    }
  }

  /// End every consumer stream with a failure sentinel.
  pub async fn fail(self, reason: &str) {
    for sender in self.senders {
      let _ = sender.fail(&self.producer, reason).await;
    }
  }
}
