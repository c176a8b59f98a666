//! Command queue items and the per-call reply slot.
//!
//! Many producers push [`Command`]s into a bounded `mpsc` channel; the session
//! worker is the single consumer. Each command carries its own [`ReplySlot`], a
//! one-shot sender nobody else can observe, so concurrent callers never see
//! each other's answers.

use amdp_protocol::{CommandArgs, CommandKind, Response};
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};

/// Sending half of the command queue.
pub type CommandSender = mpsc::Sender<Command>;
/// Receiving half of the command queue, owned by the session worker.
pub type CommandReceiver = mpsc::Receiver<Command>;

/// Creates a bounded command queue.
pub fn command_queue(capacity: usize) -> (CommandSender, CommandReceiver) {
	mpsc::channel(capacity.max(1))
}

/// A queued request for the session worker.
#[derive(Debug)]
pub struct Command {
	pub kind: CommandKind,
	pub args: CommandArgs,
	pub reply: ReplySlot,
}

impl Command {
	/// Builds a command and the receiver its caller waits on.
	pub fn new(kind: CommandKind, args: CommandArgs) -> (Self, oneshot::Receiver<Result<Response>>) {
		let (tx, rx) = oneshot::channel();
		(
			Self {
				kind,
				args,
				reply: ReplySlot(tx),
			},
			rx,
		)
	}
}

/// Single-use reply slot for one command.
#[derive(Debug)]
pub struct ReplySlot(oneshot::Sender<Result<Response>>);

impl ReplySlot {
	/// Delivers the reply without waiting.
	///
	/// If the caller already gave up (timed out or was cancelled), the reply is
	/// dropped and `false` is returned. The worker must never stall on an
	/// abandoned caller; losing an answer nobody is waiting for is preferred
	/// over delaying every later command.
	pub fn deliver(self, reply: Result<Response>) -> bool {
		self.0.send(reply).is_ok()
	}
}

/// Closes the queue and answers every command still buffered with `err`.
///
/// Buffered commands are never executed once the session is ending; their
/// callers get an immediate answer instead of waiting out their timeout.
pub fn reject_pending(queue: &mut CommandReceiver, err: &Error) -> usize {
	queue.close();
	let mut rejected = 0;
	while let Ok(command) = queue.try_recv() {
		command.reply.deliver(Err(err.clone()));
		rejected += 1;
	}
	rejected
}
