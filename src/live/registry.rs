//! 会话注册表 - 编排层
//!
//! ## 职责
//! - 加入码 → 运行中会话的显式映射(可注入,不用全局单例)
//! - 创建会话时启动该部署的事件循环,关闭时回收
//!
//! ## 生命周期
//! `create` 生成协调器并 spawn 事件循环 → `lookup` 按加入码取句柄 →
//! `close` 下发 Shutdown 并从映射移除 → `evict_closed` 清理
//! 事件循环已退出的残留条目。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, AppResult, SessionError};
use crate::models::SessionStats;
use crate::providers::AssignmentStore;
use crate::services::Summarizer;

use super::coordinator::LiveSessionCoordinator;
use super::transport::SessionEvent;

/// 指向一个运行中会话的句柄,可自由克隆
#[derive(Clone, Debug)]
pub struct SessionHandle {
    deployment_id: String,
    join_code: String,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    pub fn join_code(&self) -> &str {
        &self.join_code
    }

    /// 向会话事件循环投递一条事件
    pub fn event(&self, event: SessionEvent) -> AppResult<()> {
        self.tx.send(event).map_err(|_| {
            AppError::Session(SessionError::SessionClosed {
                deployment_id: self.deployment_id.clone(),
            })
        })
    }

    /// 查询会话统计快照
    pub async fn stats(&self) -> AppResult<SessionStats> {
        let (reply, reply_rx) = oneshot::channel();
        self.event(SessionEvent::GetStats { reply })?;
        reply_rx.await.map_err(|_| {
            AppError::Session(SessionError::SessionClosed {
                deployment_id: self.deployment_id.clone(),
            })
        })
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// 加入码 → 会话句柄的注册表
pub struct SessionRegistry {
    config: Config,
    assignment_store: Arc<dyn AssignmentStore>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new(config: Config, assignment_store: Arc<dyn AssignmentStore>) -> Self {
        Self {
            config,
            assignment_store,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// 创建会话并启动事件循环;加入码已存在时返回现有句柄
    pub async fn create(
        &self,
        join_code: &str,
        deployment_id: &str,
        summarizer: Summarizer,
    ) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(join_code) {
            if !existing.is_closed() {
                debug!("会话已存在,复用: {}", join_code);
                return existing.clone();
            }
        }

        info!("🚀 创建会话: {} (部署: {})", join_code, deployment_id);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut coordinator = LiveSessionCoordinator::new(
            deployment_id,
            &self.config,
            self.assignment_store.clone(),
            summarizer,
        );
        let loop_deployment = deployment_id.to_string();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if !coordinator.handle_event(event).await {
                    break;
                }
            }
            info!("会话事件循环退出: {}", loop_deployment);
        });

        let handle = SessionHandle {
            deployment_id: deployment_id.to_string(),
            join_code: join_code.to_string(),
            tx,
        };
        sessions.insert(join_code.to_string(), handle.clone());
        handle
    }

    /// 按加入码查找运行中的会话
    pub async fn lookup(&self, join_code: &str) -> AppResult<SessionHandle> {
        let sessions = self.sessions.read().await;
        match sessions.get(join_code) {
            Some(handle) if !handle.is_closed() => Ok(handle.clone()),
            _ => Err(AppError::Session(SessionError::SessionNotFound {
                join_code: join_code.to_string(),
            })),
        }
    }

    /// 关闭会话:下发 Shutdown 并从注册表移除
    pub async fn close(&self, join_code: &str) -> AppResult<()> {
        let removed = self.sessions.write().await.remove(join_code);
        match removed {
            Some(handle) => {
                // 事件循环可能已自行退出,此时 Shutdown 投递失败无妨
                let _ = handle.event(SessionEvent::Shutdown);
                Ok(())
            }
            None => Err(AppError::Session(SessionError::SessionNotFound {
                join_code: join_code.to_string(),
            })),
        }
    }

    /// 清理事件循环已退出的残留条目,返回清理数量
    pub async fn evict_closed(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| !handle.is_closed());
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("清理已关闭会话: {} 个", evicted);
        }
        evicted
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
