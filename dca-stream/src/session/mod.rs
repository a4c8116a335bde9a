// 流会话
//
// - `state`: 会话状态与暂停/恢复状态转换（不涉及I/O）
// - `streaming`: 后台投递任务与控制接口

pub mod state;
pub mod streaming;

pub use state::{PauseAction, SessionState, SessionStatus};
pub use streaming::StreamingSession;
