/// Per-light outcome of a state-changing request, as reported by the remote API.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    Ok,
    Async,
    TimedOut,
    Offline,
}

impl Status {
    /// How the outcome maps onto the light's connectivity: a light that answered (or will
    /// answer asynchronously) is connected, one that timed out or was reported offline is
    /// not.
    pub fn is_connected(&self) -> bool {
        matches!(self, Status::Ok | Status::Async)
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct OperationResult {
    pub id: String,
    pub status: Status,
    /// The authoritative post-toggle power state. Only present on toggle results; lights in
    /// a group may have had different individual power states before a group toggle, so the
    /// server's answer is the only trustworthy source.
    pub power: Option<bool>,
}

impl OperationResult {
    pub fn new(id: impl Into<String>, status: Status) -> Self {
        OperationResult { id: id.into(), status, power: None }
    }
}
