// 流会话状态机
//
// 状态：Idle -> Running -> {Paused, Finished}，Paused -> Running。
// Finished 为终态，不会再离开。
//
// 所有字段由会话的同一把锁保护；这里的方法只做簿记，调用方负责持锁。

use crate::error::StreamError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `set_paused` 之后调用方需要执行的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseAction {
    /// 会话已结束，什么都不做
    Finished,
    /// 任务仍在运行，取消其暂停标记
    ClearPause,
    /// 没有任务运行，记下暂停意图
    DeferPause,
    /// 任务已因暂停退出，需要启动新的投递任务
    Restart,
    /// 仅记录标志
    Record,
}

/// 会话状态
#[derive(Debug, Default)]
pub struct SessionState {
    running: bool,
    paused: bool,
    finished: bool,
    last_error: Option<StreamError>,
    frames_sent: u64,
}

/// 会话状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub running: bool,
    pub paused: bool,
    pub finished: bool,
    pub frames_sent: u64,
    /// 已播放时长（毫秒）
    pub position_ms: u64,
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn last_error(&self) -> Option<&StreamError> {
        self.last_error.as_ref()
    }

    /// 占用运行权
    ///
    /// 由启动投递任务的一方在持锁时调用；已有任务在运行时返回
    /// `StreamError::AlreadyRunning`，不能启动第二个读取者。
    pub fn claim_run(&mut self) -> Result<(), StreamError> {
        if self.running {
            return Err(StreamError::AlreadyRunning);
        }
        self.running = true;
        Ok(())
    }

    /// 投递任务退出时释放运行权
    pub fn release_run(&mut self) {
        self.running = false;
    }

    /// 投递任务在每次迭代前检查
    ///
    /// 已暂停时在同一临界区内释放运行权并返回 `true`，
    /// 之后的恢复调用必然看到 `running == false` 并重启任务。
    pub fn stop_if_paused(&mut self) -> bool {
        if self.paused {
            self.running = false;
        }
        self.paused
    }

    pub fn record_frame(&mut self) {
        self.frames_sent += 1;
    }

    /// 进入终态
    ///
    /// 正常的流结束不会被记录为错误。
    pub fn finish(&mut self, reason: StreamError) {
        self.finished = true;
        if !reason.is_end_of_stream() {
            self.last_error = Some(reason);
        }
    }

    /// 暂停/恢复状态转换
    pub fn set_paused(&mut self, paused: bool) -> PauseAction {
        if self.finished {
            return PauseAction::Finished;
        }

        if !paused && self.running {
            self.paused = false;
            return PauseAction::ClearPause;
        }

        if paused && !self.running {
            self.paused = true;
            return PauseAction::DeferPause;
        }

        let action = if !self.running && self.paused && !paused {
            PauseAction::Restart
        } else {
            PauseAction::Record
        };
        self.paused = paused;
        action
    }

    /// 已播放时长 = 已发送帧数 × 帧时长
    pub fn playback_position(&self, frame_duration: Duration) -> Duration {
        let nanos = frame_duration.as_nanos() * self.frames_sent as u128;
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }

    pub fn status(&self, frame_duration: Duration) -> SessionStatus {
        SessionStatus {
            running: self.running,
            paused: self.paused,
            finished: self.finished,
            frames_sent: self.frames_sent,
            position_ms: self.playback_position(frame_duration).as_millis() as u64,
            last_error: self.last_error.as_ref().map(|e| e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::DcaError;

    fn running_state() -> SessionState {
        let mut state = SessionState::new();
        state.claim_run().unwrap();
        state
    }

    #[test]
    fn test_claim_run_twice_fails() {
        let mut state = running_state();
        let err = state.claim_run().unwrap_err();
        assert!(err.is_fatal_invariant());

        state.release_run();
        assert!(state.claim_run().is_ok());
    }

    #[test]
    fn test_pause_running_task() {
        let mut state = running_state();
        assert_eq!(state.set_paused(true), PauseAction::Record);
        assert!(state.is_paused());
        assert!(state.stop_if_paused());
        assert!(!state.is_running());
    }

    #[test]
    fn test_unpaused_task_keeps_running() {
        let mut state = running_state();
        assert!(!state.stop_if_paused());
        assert!(state.is_running());
    }

    #[test]
    fn test_resume_right_after_pause_observed() {
        let mut state = running_state();
        state.set_paused(true);

        // 任务观察到暂停的同时已释放运行权，恢复不会被吞掉
        assert!(state.stop_if_paused());
        assert_eq!(state.set_paused(false), PauseAction::Restart);
        assert!(state.claim_run().is_ok());
        assert!(!state.stop_if_paused());
    }

    #[test]
    fn test_unpause_before_task_stops() {
        let mut state = running_state();
        state.set_paused(true);

        // 任务尚未退出，只需取消暂停标记
        assert_eq!(state.set_paused(false), PauseAction::ClearPause);
        assert!(!state.is_paused());
        assert!(state.is_running());
    }

    #[test]
    fn test_resume_after_task_stopped() {
        let mut state = running_state();
        state.set_paused(true);
        state.release_run();

        assert_eq!(state.set_paused(false), PauseAction::Restart);
        assert!(!state.is_paused());
    }

    #[test]
    fn test_pause_while_idle_is_deferred() {
        let mut state = SessionState::new();
        assert_eq!(state.set_paused(true), PauseAction::DeferPause);
        assert!(state.is_paused());

        // 重复暂停保持幂等
        assert_eq!(state.set_paused(true), PauseAction::DeferPause);
        assert!(state.is_paused());
    }

    #[test]
    fn test_finished_is_terminal() {
        let mut state = running_state();
        state.finish(StreamError::SinkClosed);
        state.release_run();

        assert_eq!(state.set_paused(true), PauseAction::Finished);
        assert_eq!(state.set_paused(false), PauseAction::Finished);
        assert!(state.is_finished());
        assert!(!state.is_paused());
        assert!(matches!(state.last_error(), Some(StreamError::SinkClosed)));
    }

    #[test]
    fn test_end_of_stream_not_recorded_as_error() {
        let mut state = running_state();
        state.finish(StreamError::from(DcaError::EndOfStream));
        assert!(state.is_finished());
        assert!(state.last_error().is_none());
    }

    #[test]
    fn test_playback_position() {
        let mut state = running_state();
        for _ in 0..50 {
            state.record_frame();
        }
        assert_eq!(state.frames_sent(), 50);
        assert_eq!(
            state.playback_position(Duration::from_millis(20)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_status_snapshot() {
        let mut state = running_state();
        state.record_frame();
        state.record_frame();
        state.finish(StreamError::SinkTimeout(Duration::from_secs(1)));

        let status = state.status(Duration::from_millis(20));
        assert!(status.finished);
        assert_eq!(status.frames_sent, 2);
        assert_eq!(status.position_ms, 40);
        assert!(status.last_error.is_some());
    }
}
