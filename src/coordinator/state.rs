//! Single-flight refresh state machine and its queue of parked requests.

// crates.io
use futures::channel::oneshot;
// self
use crate::{_prelude::*, transport::ApiRequest};

/// Continuation resolved once the refresh a request is parked behind settles.
pub(crate) type Responder = oneshot::Sender<Result<ReplayTurn>>;

/// A request that observed a 401 while a refresh was already in flight.
#[derive(Debug)]
pub(crate) struct PendingRequest {
	pub(crate) request: ApiRequest,
	pub(crate) responder: Responder,
}

/// Permission for a parked request to run its own retry after a successful refresh.
///
/// Turns are chained: each parked caller waits for its predecessor to start its retry, so
/// retries start in arrival order even though every caller drives its own exchange.
#[derive(Debug)]
pub(crate) struct ReplayTurn {
	pub(crate) request: ApiRequest,
	/// Resolves (or is cancelled) once the previous parked request has started its retry.
	pub(crate) after: Option<oneshot::Receiver<()>>,
	/// Fired once this request's retry has been started.
	pub(crate) started: oneshot::Sender<()>,
}

/// Hands every parked request its turn and returns the signal fired by the last one to start.
pub(crate) fn release_turns(
	pending: VecDeque<PendingRequest>,
) -> Option<oneshot::Receiver<()>> {
	let mut previous = None;

	for PendingRequest { request, responder } in pending {
		let (started, next) = oneshot::channel();
		let turn = ReplayTurn { request, after: previous.take(), started };

		previous = match responder.send(Ok(turn)) {
			Ok(()) => Some(next),
			// The parked caller is gone; its successor waits on the predecessor instead.
			Err(unsent) => unsent.ok().and_then(|turn| turn.after),
		};
	}

	previous
}

/// Refresh state owned by one coordinator.
#[derive(Debug, Default)]
pub(crate) enum RefreshState {
	#[default]
	Idle,
	Refreshing {
		queue: VecDeque<PendingRequest>,
	},
}
impl RefreshState {
	/// Admits a request that observed a 401.
	///
	/// The first caller while idle becomes the leader and flips the state to refreshing; every
	/// later caller is parked at the back of the queue.
	pub(crate) fn admit(&mut self, request: ApiRequest) -> Admission {
		match self {
			Self::Idle => {
				*self = Self::Refreshing { queue: VecDeque::new() };

				Admission::Leader(request)
			},
			Self::Refreshing { queue } => {
				let (responder, receiver) = oneshot::channel();

				queue.push_back(PendingRequest { request, responder });

				Admission::Follower(receiver)
			},
		}
	}

	/// Returns to idle, handing back every parked request in arrival order.
	pub(crate) fn settle(&mut self) -> VecDeque<PendingRequest> {
		match std::mem::take(self) {
			Self::Refreshing { queue } => queue,
			Self::Idle => VecDeque::new(),
		}
	}

	pub(crate) fn is_refreshing(&self) -> bool {
		matches!(self, Self::Refreshing { .. })
	}
}

/// Role assigned to a request by [`RefreshState::admit`].
#[derive(Debug)]
pub(crate) enum Admission {
	/// Runs the refresh and replays the queue.
	Leader(ApiRequest),
	/// Waits for the leader's verdict.
	Follower(oneshot::Receiver<Result<ReplayTurn>>),
}

/// Leader's hold on the refreshing state.
///
/// Settling hands the queue back to the leader. Dropping an unsettled lease (the leader's future
/// was cancelled) returns the state to idle and drops every responder, so parked callers wake
/// with a cancellation instead of waiting forever.
pub(crate) struct RefreshLease<'a> {
	state: &'a Mutex<RefreshState>,
	settled: bool,
}
impl<'a> RefreshLease<'a> {
	pub(crate) fn new(state: &'a Mutex<RefreshState>) -> Self {
		Self { state, settled: false }
	}

	pub(crate) fn settle(mut self) -> VecDeque<PendingRequest> {
		self.settled = true;

		self.state.lock().settle()
	}
}
impl Drop for RefreshLease<'_> {
	fn drop(&mut self) {
		if !self.settled {
			drop(self.state.lock().settle());
		}
	}
}
