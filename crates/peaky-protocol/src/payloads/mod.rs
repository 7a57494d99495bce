//! Request and response payloads, one set per catalog operation.
//!
//! Every payload derives `Default` and decodes with `#[serde(default)]`, so an
//! empty or partial payload yields sensible zero values. Operations without a
//! meaningful response (kill, close, swap, input, focus, signal, relay stop)
//! reply with an empty payload.

mod output;
mod pane;
mod relay;
mod replay;
mod session;
mod terminal;
mod view;

pub use output::{
    OutputLine, PaneActionEntry, PaneHistoryRequest, PaneHistoryResponse, PaneOutputRequest,
    PaneOutputResponse, PaneSnapshotRequest, PaneSnapshotResponse, PaneWaitRequest,
    PaneWaitResponse,
};
pub use pane::{
    ClosePaneRequest, MouseAction, MouseEventPayload, PaneFocusRequest, PaneSignalRequest,
    PaneTagListResponse, PaneTagRequest, RenamePaneRequest, ResizePaneRequest, SendInputRequest,
    SendMouseRequest, SplitPaneRequest, SplitPaneResponse, SwapPanesRequest,
};
pub use relay::{
    RelayConfig, RelayCreateRequest, RelayCreateResponse, RelayInfo, RelayListResponse, RelayMode,
    RelayStatus, RelayStopRequest,
};
pub use replay::{EventsReplayRequest, EventsReplayResponse};
pub use session::{
    HelloRequest, HelloResponse, KillSessionRequest, PaneSnapshot, RenameSessionRequest,
    RenameSessionResponse, SessionFocusRequest, SessionNamesResponse, SessionSnapshot,
    SnapshotRequest, SnapshotResponse, StartSessionRequest, StartSessionResponse,
};
pub use terminal::{
    TerminalAction, TerminalActionRequest, TerminalActionResponse, TerminalKeyRequest,
    TerminalKeyResponse, ToastLevel,
};
pub use view::{
    ColorProfile, Cursor, Frame, PaneViewMode, PaneViewPriority, PaneViewRequest,
    PaneViewResponse,
};
