use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettleState {
    Pending,
    Resolved,
    Rejected,
}

enum State<T> {
    Pending,
    // The outcome is `None` once it has been taken.
    Resolved(Option<T>),
    Rejected(Option<Error>),
}

/// A one-shot cell that goes from pending to resolved or rejected exactly
/// once.
///
/// Settling a cell that is no longer pending is a programming error and
/// panics. The outcome can be taken out once; the cell keeps reporting how it
/// settled afterwards.
///
/// ```rust
/// use cosync::SettleState;
/// use cosync::Settleable;
///
/// let mut cell = Settleable::new();
/// assert_eq!(cell.state(), SettleState::Pending);
/// cell.resolve(5);
/// assert_eq!(cell.take().map(Result::ok), Some(Some(5)));
/// assert_eq!(cell.state(), SettleState::Resolved);
/// ```
pub struct Settleable<T> {
    state: State<T>,
    cancelled: bool,
}

impl<T> Default for Settleable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Settleable<T> {
    pub fn new() -> Self {
        Settleable {
            state: State::Pending,
            cancelled: false,
        }
    }

    pub fn state(&self) -> SettleState {
        match self.state {
            State::Pending => SettleState::Pending,
            State::Resolved(_) => SettleState::Resolved,
            State::Rejected(_) => SettleState::Rejected,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == SettleState::Pending
    }

    pub fn resolve(&mut self, value: T) {
        assert!(self.is_pending(), "resolving a settled cell");
        self.state = State::Resolved(Some(value));
    }

    pub fn reject(&mut self, error: Error) {
        assert!(self.is_pending(), "rejecting a settled cell");
        self.state = State::Rejected(Some(error));
    }

    /// Takes the outcome out of a settled cell. Returns `None` while pending
    /// and after the outcome was already taken.
    pub fn take(&mut self) -> Option<Result<T, Error>> {
        match &mut self.state {
            State::Pending => None,
            State::Resolved(value) => value.take().map(Ok),
            State::Rejected(error) => error.take().map(Err),
        }
    }

    /// Marks that the owner no longer cares about the outcome.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}
