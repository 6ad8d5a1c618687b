//! Outbound typing indicator with an idle auto-stop per chat.

use std::time::Duration;

use crate::{
    realtime::{protocol::OutboundFrame, timer::KeyedTimers},
    usecases::contracts::FrameSender,
};

const TYPING_STOP_FAILED: &str = "TYPING_STOP_FAILED";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetTypingError {
    #[error("chat socket is not connected")]
    NotConnected,
    #[error("chat client is shut down")]
    ClientClosed,
}

/// Tracks the auto-stop timer of every chat the local user is typing in.
#[derive(Debug)]
pub struct TypingTimers {
    idle: Duration,
    timers: KeyedTimers,
}

impl TypingTimers {
    pub fn new(idle: Duration) -> Self {
        Self {
            idle,
            timers: KeyedTimers::default(),
        }
    }

    /// Sends the typing state for `chat_id`. Starting to type arms a timer
    /// that calls `on_idle` with its generation; hand that generation back to
    /// [`Self::on_idle`] to send the stop frame.
    pub fn set_typing<F>(
        &mut self,
        sender: &mut dyn FrameSender,
        chat_id: &str,
        is_typing: bool,
        user_id: Option<&str>,
        on_idle: F,
    ) -> Result<(), SetTypingError>
    where
        F: FnOnce(u64) + Send + 'static,
    {
        if !sender.is_connected() {
            return Err(SetTypingError::NotConnected);
        }

        self.timers.cancel(chat_id);
        sender
            .send_frame(&OutboundFrame::typing(chat_id, is_typing, user_id))
            .map_err(|_| SetTypingError::NotConnected)?;

        if is_typing {
            self.timers.arm(chat_id, self.idle, on_idle);
        }
        Ok(())
    }

    /// Handles an idle timer firing. Returns whether a stop frame was sent.
    pub fn on_idle(
        &mut self,
        sender: &mut dyn FrameSender,
        chat_id: &str,
        generation: u64,
        user_id: Option<&str>,
    ) -> bool {
        if !self.timers.accept(chat_id, generation) {
            return false;
        }
        send_stop(sender, chat_id, user_id)
    }

    /// Ends an active typing state early, e.g. because a message is sent.
    pub fn stop_if_active(
        &mut self,
        sender: &mut dyn FrameSender,
        chat_id: &str,
        user_id: Option<&str>,
    ) -> bool {
        if !self.timers.cancel(chat_id) {
            return false;
        }
        send_stop(sender, chat_id, user_id)
    }

    pub fn cancel_all(&mut self) {
        self.timers.cancel_all();
    }
}

fn send_stop(sender: &mut dyn FrameSender, chat_id: &str, user_id: Option<&str>) -> bool {
    match sender.send_frame(&OutboundFrame::typing(chat_id, false, user_id)) {
        Ok(()) => true,
        Err(error) => {
            tracing::debug!(code = TYPING_STOP_FAILED, chat_id, error = %error, "typing stop not sent");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::realtime::transport::TransportError;

    #[derive(Default)]
    struct StubSender {
        disconnected: bool,
        frames: Vec<OutboundFrame>,
    }

    impl FrameSender for StubSender {
        fn is_connected(&self) -> bool {
            !self.disconnected
        }

        fn send_frame(&mut self, frame: &OutboundFrame) -> Result<(), TransportError> {
            if self.disconnected {
                return Err(TransportError::NotConnected);
            }
            self.frames.push(frame.clone());
            Ok(())
        }
    }

    fn notify(tx: &mpsc::UnboundedSender<u64>) -> impl FnOnce(u64) + Send + 'static {
        let tx = tx.clone();
        move |generation| {
            let _ = tx.send(generation);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn typing_stops_automatically_after_idle_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TypingTimers::new(Duration::from_millis(3_000));
        let mut sender = StubSender::default();

        timers
            .set_typing(&mut sender, "c1", true, Some("me"), notify(&tx))
            .expect("typing should be sent");

        tokio::time::advance(Duration::from_millis(2_999)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_millis(2)).await;
        let generation = rx.recv().await.expect("idle timer fires");
        assert!(timers.on_idle(&mut sender, "c1", generation, Some("me")));

        assert_eq!(
            sender.frames,
            vec![
                OutboundFrame::typing("c1", true, Some("me")),
                OutboundFrame::typing("c1", false, Some("me")),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retyping_supersedes_pending_stop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TypingTimers::new(Duration::from_millis(3_000));
        let mut sender = StubSender::default();

        timers
            .set_typing(&mut sender, "c1", true, Some("me"), notify(&tx))
            .expect("typing");
        tokio::time::advance(Duration::from_millis(2_000)).await;
        timers
            .set_typing(&mut sender, "c1", true, Some("me"), notify(&tx))
            .expect("typing again");

        tokio::time::advance(Duration::from_millis(1_500)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        let generation = rx.recv().await.expect("second timer fires");
        assert!(timers.on_idle(&mut sender, "c1", generation, Some("me")));
        assert_eq!(sender.frames.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_stop_cancels_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TypingTimers::new(Duration::from_millis(3_000));
        let mut sender = StubSender::default();

        timers
            .set_typing(&mut sender, "c1", true, Some("me"), notify(&tx))
            .expect("typing");
        timers
            .set_typing(&mut sender, "c1", false, Some("me"), notify(&tx))
            .expect("stop");

        tokio::time::advance(Duration::from_millis(5_000)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert!(!timers.stop_if_active(&mut sender, "c1", Some("me")));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_if_active_sends_stop_once() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timers = TypingTimers::new(Duration::from_millis(3_000));
        let mut sender = StubSender::default();
        timers
            .set_typing(&mut sender, "c1", true, Some("me"), notify(&tx))
            .expect("typing");

        assert!(timers.stop_if_active(&mut sender, "c1", Some("me")));
        assert!(!timers.stop_if_active(&mut sender, "c1", Some("me")));

        assert_eq!(sender.frames.last(), Some(&OutboundFrame::typing("c1", false, Some("me"))));
    }

    #[tokio::test(start_paused = true)]
    async fn requires_connection() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timers = TypingTimers::new(Duration::from_millis(3_000));
        let mut sender = StubSender {
            disconnected: true,
            ..StubSender::default()
        };

        let result = timers.set_typing(&mut sender, "c1", true, Some("me"), notify(&tx));

        assert_eq!(result, Err(SetTypingError::NotConnected));
    }
}
