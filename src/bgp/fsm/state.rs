use std::fmt;

/// Session FSM states.
///
/// `Idle` is the initial state; `Disabled` is terminal and only reached
/// through a shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FsmState {
    Disabled,
    #[default]
    Idle,
    Connect,
    Active,
    OpenSent,
    OpenConfirm,
    Established,
}

impl FsmState {
    /// Whether the FSM may move from `self` to `to`. Any edge outside this
    /// table is a bug in the state handlers, not a runtime condition.
    pub(crate) fn permits(self, to: FsmState) -> bool {
        use FsmState::*;
        match to {
            Disabled | Idle => true,
            Connect => matches!(self, Idle | Connect | Active),
            Active => matches!(self, Connect | Active | OpenSent),
            OpenSent => matches!(self, Connect | Active),
            OpenConfirm => matches!(self, OpenSent | OpenConfirm),
            Established => matches!(self, OpenConfirm | Established),
        }
    }
}

impl fmt::Display for FsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FsmState::Disabled => "disabled",
            FsmState::Idle => "idle",
            FsmState::Connect => "connect",
            FsmState::Active => "active",
            FsmState::OpenSent => "open-sent",
            FsmState::OpenConfirm => "open-confirm",
            FsmState::Established => "established",
        };
        f.write_str(name)
    }
}
