// DCA 流传输 - StreamingSession实现
//
// 后台投递任务从编码源逐帧解码，并在限定时间内把每一帧交给接收端。
//
// # 特性
//
// - 单一锁保护会话状态，解码和投递在锁外进行
// - 接收端超时或关闭即终止会话，不会无限阻塞
// - 暂停只阻止下一次迭代，不打断进行中的解码或投递
// - 恢复从下一个未投递的帧继续，不丢帧也不重复

use super::state::{PauseAction, SessionState, SessionStatus};
use crate::codec::decode_frame;
use crate::config::StreamSettings;
use crate::error::StreamError;
use crate::sink::FrameSink;
use crate::source::EncoderSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 会话共享部分
struct SessionInner {
    /// 会话ID
    id: Uuid,
    /// 会话状态（running/paused/finished/last_error/frames_sent）
    state: Mutex<SessionState>,
    /// 编码源，投递任务运行期间独占
    source: Mutex<Box<dyn EncoderSource>>,
    /// 帧接收端
    sink: Arc<dyn FrameSink>,
    /// 单帧播放时长
    frame_duration: Duration,
    /// 单帧投递期限
    send_timeout: Duration,
    /// 当前投递任务句柄
    task: Mutex<Option<JoinHandle<()>>>,
}

/// 流会话
///
/// 创建时即启动后台投递任务，之后通过 [`StreamingSession::set_paused`] 控制暂停/恢复。
/// 任务因流结束或错误退出后会话进入终态，错误通过 [`StreamingSession::finished`] 查询。
///
/// # 示例
///
/// ```rust,ignore
/// let (tx, mut rx) = frame_channel(settings.sink_capacity);
/// let source = ReaderSource::new(ffmpeg_stdout, EncodeOptions::default());
///
/// let session = StreamingSession::start(source, tx, &settings).await?;
///
/// while let Some(frame) = rx.recv().await {
///     voice.send_opus(frame).await?;
/// }
///
/// let (finished, error) = session.finished().await;
/// ```
#[derive(Clone)]
pub struct StreamingSession {
    inner: Arc<SessionInner>,
}

impl StreamingSession {
    /// 创建会话并启动投递任务
    ///
    /// 必须在 tokio 运行时中调用。
    pub async fn start<S, K>(
        source: S,
        sink: K,
        settings: &StreamSettings,
    ) -> Result<Self, StreamError>
    where
        S: EncoderSource,
        K: FrameSink,
    {
        let frame_duration = source.options().frame_duration;
        let session = Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                state: Mutex::new(SessionState::new()),
                source: Mutex::new(Box::new(source)),
                sink: Arc::new(sink),
                frame_duration,
                send_timeout: settings.send_timeout,
                task: Mutex::new(None),
            }),
        };

        info!(
            "Starting streaming session: {} (frame_duration={:?}, send_timeout={:?})",
            session.inner.id, frame_duration, settings.send_timeout
        );

        {
            let mut state = session.inner.state.lock().await;
            session.spawn_delivery(&mut state).await?;
        }

        Ok(session)
    }

    /// 会话ID
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// 暂停/恢复
    ///
    /// 会话结束后调用无效。只有在任务已因暂停退出后恢复时才会启动新任务。
    pub async fn set_paused(&self, paused: bool) -> Result<(), StreamError> {
        let mut state = self.inner.state.lock().await;

        match state.set_paused(paused) {
            PauseAction::Restart => {
                debug!("Resuming delivery for session: {}", self.inner.id);
                self.spawn_delivery(&mut state).await?;
            }
            action => {
                debug!(
                    "set_paused({}) on session {}: {:?}",
                    paused, self.inner.id, action
                );
            }
        }

        Ok(())
    }

    /// 已播放时长
    pub async fn playback_position(&self) -> Duration {
        self.inner
            .state
            .lock()
            .await
            .playback_position(self.inner.frame_duration)
    }

    /// 是否已结束，以及导致结束的错误（正常结束时为 `None`）
    pub async fn finished(&self) -> (bool, Option<StreamError>) {
        let state = self.inner.state.lock().await;
        (state.is_finished(), state.last_error().cloned())
    }

    pub async fn is_paused(&self) -> bool {
        self.inner.state.lock().await.is_paused()
    }

    pub async fn frames_sent(&self) -> u64 {
        self.inner.state.lock().await.frames_sent()
    }

    /// 状态快照
    pub async fn status(&self) -> SessionStatus {
        self.inner
            .state
            .lock()
            .await
            .status(self.inner.frame_duration)
    }

    /// 等待当前投递任务退出（暂停或结束）
    pub async fn wait(&self) {
        let handle = self.inner.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Delivery task for session {} aborted: {}", self.inner.id, e);
            }
        }
    }

    /// 启动投递任务，调用方必须持有状态锁
    async fn spawn_delivery(&self, state: &mut SessionState) -> Result<(), StreamError> {
        if let Err(e) = state.claim_run() {
            error!(
                "Refusing to start a second delivery task for session: {}",
                self.inner.id
            );
            return Err(e);
        }

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move { inner.deliver().await });
        *self.inner.task.lock().await = Some(handle);
        Ok(())
    }
}

impl SessionInner {
    /// 投递循环
    async fn deliver(self: Arc<Self>) {
        debug!("Delivery task started for session: {}", self.id);
        let mut source = self.source.lock().await;

        let stop_reason = loop {
            if self.state.lock().await.stop_if_paused() {
                break None;
            }

            if let Err(e) = self.send_next(&mut **source).await {
                break Some(e);
            }
        };

        match stop_reason {
            None => {
                // 运行权已随暂停一起释放
                debug!("Delivery task paused for session: {}", self.id);
            }
            Some(reason) => {
                if reason.is_end_of_stream() {
                    info!("Stream finished for session: {}", self.id);
                } else {
                    error!("Stream failed for session {}: {}", self.id, reason);
                }

                self.state.lock().await.finish(reason);
                source.truncate().await;
                drop(source);
                self.state.lock().await.release_run();
            }
        }

        debug!("Delivery task exited for session: {}", self.id);
    }

    /// 解码一帧并在期限内交给接收端
    async fn send_next(&self, source: &mut dyn EncoderSource) -> Result<(), StreamError> {
        let frame = decode_frame(source).await?;

        match tokio::time::timeout(self.send_timeout, self.sink.accept(frame)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Sink did not accept frame within {:?} (session: {})",
                    self.send_timeout, self.id
                );
                return Err(StreamError::SinkTimeout(self.send_timeout));
            }
        }

        self.state.lock().await.record_frame();
        Ok(())
    }
}
