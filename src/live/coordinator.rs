//! 实时会话协调器 - 编排层
//!
//! ## 职责
//! - 维护单个部署的全部在线状态:参与者连接、演示端连接、当前提示、
//!   就绪检查、分组完成状态
//! - 连接时惰性发现分组(内存为空则读最近一次分配记录)
//! - 广播提示,按分组个性化列表项,晚加入者在新鲜度窗口内重放
//! - 全组响应完毕后恰好一次地生成并下发分组总结
//!
//! ## 并发模型
//! 一个部署一个协调器,所有方法经由 `handle_event` 在单一事件循环内
//! 串行执行,状态无锁。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{
    AssignmentRecord, ConnectionStatus, Group, GroupCompletionStatus, GroupStats,
    LivePresentationPrompt, ParticipantConnection, ParticipantIdentity, SessionStats,
};
use crate::providers::AssignmentStore;
use crate::services::{assign_list_items, DispatchOutcome, Summarizer};

use super::messages::ServerMessage;
use super::transport::{ConnectionRole, ConnectionTransport, SessionEvent};

/// 一条参与者连接:状态记录 + 出站通道
struct ParticipantHandle {
    record: ParticipantConnection,
    transport: Arc<dyn ConnectionTransport>,
}

struct PresenterHandle {
    id: String,
    transport: Arc<dyn ConnectionTransport>,
}

/// 最近一次广播的提示及其分配快照
struct ActivePrompt {
    prompt: LivePresentationPrompt,
    sent_at: DateTime<Utc>,
    /// group_name → 分到的列表项(广播时确定,晚加入者沿用)
    group_items: HashMap<String, Value>,
    /// 无分组数据时统一下发的条目
    uniform_item: Option<Value>,
}

/// 每部署的会话协调器
pub struct LiveSessionCoordinator {
    deployment_id: String,
    prompt_freshness_secs: i64,
    session_active: bool,
    participants: HashMap<String, ParticipantHandle>,
    presenters: Vec<PresenterHandle>,
    /// 断开的连接记录(保留断开时间戳,供归档持久化)
    archived: Vec<ParticipantConnection>,
    groups: Vec<Group>,
    current_prompt: Option<ActivePrompt>,
    ready_check_active: bool,
    /// (prompt_id, group_name) → 完成状态,保证总结恰好一次
    completion: HashMap<(String, String), GroupCompletionStatus>,
    assignment_store: Arc<dyn AssignmentStore>,
    summarizer: Summarizer,
    rng: StdRng,
}

impl LiveSessionCoordinator {
    pub fn new(
        deployment_id: &str,
        config: &Config,
        assignment_store: Arc<dyn AssignmentStore>,
        summarizer: Summarizer,
    ) -> Self {
        Self {
            deployment_id: deployment_id.to_string(),
            prompt_freshness_secs: config.prompt_freshness_secs,
            session_active: true,
            participants: HashMap::new(),
            presenters: Vec::new(),
            archived: Vec::new(),
            groups: Vec::new(),
            current_prompt: None,
            ready_check_active: false,
            completion: HashMap::new(),
            assignment_store,
            summarizer,
            rng: StdRng::seed_from_u64(config.kmeans_seed),
        }
    }

    /// 事件循环入口。返回 `false` 表示会话已关闭,循环应当退出。
    pub async fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Connect {
                identity,
                role,
                transport,
            } => self.connect(identity, role, transport).await,
            SessionEvent::Disconnect { user_id } => self.disconnect(&user_id).await,
            SessionEvent::BroadcastPrompt { prompt, list_items } => {
                self.broadcast_prompt(prompt, list_items).await
            }
            SessionEvent::Response {
                user_id,
                prompt_id,
                response,
            } => self.receive_response(&user_id, &prompt_id, response).await,
            SessionEvent::StartReadyCheck => self.start_ready_check().await,
            SessionEvent::Ready { user_id } => self.mark_ready(&user_id).await,
            SessionEvent::GroupDataUpdated { record } => self.apply_group_data(record).await,
            SessionEvent::GetStats { reply } => {
                let _ = reply.send(self.stats());
            }
            SessionEvent::Shutdown => {
                self.shutdown().await;
                return false;
            }
        }
        true
    }

    /// 新连接(同一用户重连时沿用已有的响应记录)
    pub async fn connect(
        &mut self,
        identity: ParticipantIdentity,
        role: ConnectionRole,
        transport: Arc<dyn ConnectionTransport>,
    ) {
        if role == ConnectionRole::Presenter {
            info!("🎤 演示端连接: {} ({})", identity.display_name, identity.id);
            let handle = PresenterHandle {
                id: identity.id.clone(),
                transport,
            };
            let stats = self.stats();
            if handle
                .transport
                .send(&ServerMessage::RosterUpdate { stats })
                .await
                .is_ok()
            {
                self.presenters.push(handle);
            } else {
                warn!("演示端连接立即失效: {}", identity.id);
            }
            return;
        }

        self.ensure_groups().await;

        let mut record = match self.participants.remove(&identity.id) {
            Some(existing) => {
                let mut r = existing.record;
                r.status = ConnectionStatus::Connected;
                r.disconnected_at = None;
                r
            }
            None => ParticipantConnection::new(&identity),
        };
        record.group_info = self.find_group(&record).cloned();

        info!(
            "👋 参与者连接: {} ({}), 分组: {:?}",
            record.user_name,
            record.user_id,
            record.group_info.as_ref().map(|g| &g.group_name)
        );

        let welcome = ServerMessage::Welcome {
            user_id: record.user_id.clone(),
            user_name: record.user_name.clone(),
            group: record.group_info.clone(),
            session_active: self.session_active,
        };
        if transport.send(&welcome).await.is_err() {
            warn!("参与者连接立即失效: {}", identity.id);
            return;
        }

        // 新鲜度窗口内的晚加入者收到当前提示的重放
        if let Some(active) = &self.current_prompt {
            let age = (Utc::now() - active.sent_at).num_seconds();
            if age < self.prompt_freshness_secs {
                let item = record
                    .group_info
                    .as_ref()
                    .and_then(|g| active.group_items.get(&g.group_name).cloned())
                    .or_else(|| active.uniform_item.clone());
                debug!("重放当前提示给晚加入者: {} (age={}s)", record.user_id, age);
                let _ = transport
                    .send(&ServerMessage::Prompt {
                        prompt: active.prompt.clone(),
                        assigned_item: item,
                    })
                    .await;
            }
        }

        if self.ready_check_active {
            let _ = transport.send(&ServerMessage::ReadyCheck).await;
        }

        self.participants.insert(
            record.user_id.clone(),
            ParticipantHandle { record, transport },
        );
        self.notify_presenters_roster().await;
    }

    pub async fn disconnect(&mut self, user_id: &str) {
        if let Some(mut handle) = self.participants.remove(user_id) {
            info!("👋 参与者断开: {}", user_id);
            handle.record.status = ConnectionStatus::Disconnected;
            handle.record.disconnected_at = Some(Utc::now());
            self.archived.push(handle.record);
            self.notify_presenters_roster().await;
        } else {
            let before = self.presenters.len();
            self.presenters.retain(|p| p.id != user_id);
            if self.presenters.len() < before {
                info!("🎤 演示端断开: {}", user_id);
            }
        }
    }

    /// 广播一道提示
    ///
    /// `list_items` 为调用方解析好的列表项;为 `None` 且提示要求
    /// 个性化时,退而使用最近一次分配记录里的主题列表。
    pub async fn broadcast_prompt(
        &mut self,
        prompt: LivePresentationPrompt,
        list_items: Option<Vec<Value>>,
    ) {
        info!(
            "📢 广播提示: {} (个性化: {})",
            prompt.id, prompt.use_random_list_item
        );

        let mut group_items: HashMap<String, Value> = HashMap::new();
        let mut uniform_item: Option<Value> = None;

        if prompt.use_random_list_item && prompt.list_variable_id.is_some() {
            self.ensure_groups().await;
            // 分配前按最新分组数据重推所有在线参与者的归属,
            // 早于分配记录连接的参与者也能拿到按组的条目
            self.refresh_group_memberships();
            let items = match list_items {
                Some(items) => items,
                None => self.themes_as_list_items().await,
            };
            let connected_groups = self.connected_groups();
            if connected_groups.is_empty() && !items.is_empty() {
                // 没有分组数据:所有人收到第一项
                debug!("无分组数据,统一下发第一项");
                uniform_item = Some(items[0].clone());
            } else {
                match assign_list_items(&items, &connected_groups, &mut self.rng) {
                    DispatchOutcome::Assigned(map) => group_items = map,
                    DispatchOutcome::NoData => {
                        warn!("列表项来源为空,统一广播提示(不带条目)");
                    }
                }
            }
        }

        let targets: Vec<_> = self
            .participants
            .values()
            .map(|h| {
                let item = h
                    .record
                    .group_info
                    .as_ref()
                    .and_then(|g| group_items.get(&g.group_name).cloned())
                    .or_else(|| uniform_item.clone());
                (
                    h.record.user_id.clone(),
                    h.transport.clone(),
                    ServerMessage::Prompt {
                        prompt: prompt.clone(),
                        assigned_item: item,
                    },
                )
            })
            .collect();
        let failed = deliver(targets).await;
        self.mark_failed(failed);

        self.notify_presenters(&ServerMessage::Prompt {
            prompt: prompt.clone(),
            assigned_item: None,
        })
        .await;

        self.current_prompt = Some(ActivePrompt {
            prompt,
            sent_at: Utc::now(),
            group_items,
            uniform_item,
        });
        self.notify_presenters_roster().await;
    }

    /// 参与者提交响应
    pub async fn receive_response(&mut self, user_id: &str, prompt_id: &str, response: String) {
        let Some(handle) = self.participants.get_mut(user_id) else {
            warn!("未知参与者的响应被忽略: {}", user_id);
            return;
        };
        handle
            .record
            .responses
            .insert(prompt_id.to_string(), response.clone());
        let user_name = handle.record.user_name.clone();
        let group = handle.record.group_info.clone();
        debug!("💬 收到响应: {} → {}", user_name, prompt_id);

        self.notify_presenters(&ServerMessage::ResponseReceived {
            user_id: user_id.to_string(),
            user_name,
            prompt_id: prompt_id.to_string(),
            response,
        })
        .await;
        self.notify_presenters_roster().await;

        if let Some(group) = group {
            self.check_group_completion(&group, prompt_id).await;
        }
    }

    pub async fn start_ready_check(&mut self) {
        info!("🙋 就绪检查开始: {}", self.deployment_id);
        self.ready_check_active = true;
        for handle in self.participants.values_mut() {
            if handle.record.status == ConnectionStatus::Ready {
                handle.record.status = ConnectionStatus::Connected;
            }
        }

        let targets: Vec<_> = self
            .participants
            .values()
            .map(|h| {
                (
                    h.record.user_id.clone(),
                    h.transport.clone(),
                    ServerMessage::ReadyCheck,
                )
            })
            .collect();
        let failed = deliver(targets).await;
        self.mark_failed(failed);
        self.notify_presenters_roster().await;
    }

    pub async fn mark_ready(&mut self, user_id: &str) {
        if !self.ready_check_active {
            debug!("就绪检查未激活,忽略: {}", user_id);
            if let Some(handle) = self.participants.get(user_id) {
                let _ = handle
                    .transport
                    .send(&ServerMessage::Error {
                        message: "No ready check is currently active.".to_string(),
                    })
                    .await;
            }
            return;
        }
        let Some(handle) = self.participants.get_mut(user_id) else {
            return;
        };
        handle.record.status = ConnectionStatus::Ready;
        let user_name = handle.record.user_name.clone();

        self.notify_presenters(&ServerMessage::ReadyAck {
            user_id: user_id.to_string(),
            user_name,
        })
        .await;
        self.notify_presenters_roster().await;
    }

    /// 流水线产出新分配后刷新在线参与者的分组
    pub async fn apply_group_data(&mut self, record: AssignmentRecord) {
        info!(
            "🔄 分组数据更新: {} ({} 组)",
            self.deployment_id,
            record.groups.len()
        );
        let mut updates = Vec::new();
        for handle in self.participants.values_mut() {
            let new_group = record
                .group_of(&handle.record.user_name)
                .or_else(|| record.group_of(&handle.record.user_id))
                .cloned();
            let changed = match (&handle.record.group_info, &new_group) {
                (Some(a), Some(b)) => a.group_name != b.group_name,
                (None, None) => false,
                _ => true,
            };
            handle.record.group_info = new_group.clone();
            if changed {
                updates.push((
                    handle.record.user_id.clone(),
                    handle.transport.clone(),
                    ServerMessage::GroupUpdate { group: new_group },
                ));
            }
        }
        self.groups = record.groups;
        let failed = deliver(updates).await;
        self.mark_failed(failed);
        self.notify_presenters_roster().await;
    }

    /// 只读的会话统计快照
    pub fn stats(&self) -> SessionStats {
        let current_prompt_id = self.current_prompt.as_ref().map(|a| a.prompt.id.clone());

        let mut groups: HashMap<String, GroupStats> = self
            .groups
            .iter()
            .map(|g| (g.group_name.clone(), GroupStats::default()))
            .collect();
        let mut ready = 0usize;
        for handle in self.participants.values() {
            if handle.record.status == ConnectionStatus::Ready {
                ready += 1;
            }
            if let Some(g) = &handle.record.group_info {
                let entry = groups.entry(g.group_name.clone()).or_default();
                entry.connected += 1;
                if handle.record.status == ConnectionStatus::Ready {
                    entry.ready += 1;
                }
                if let Some(pid) = &current_prompt_id {
                    if handle.record.responses.contains_key(pid) {
                        entry.responded_current_prompt += 1;
                    }
                }
            }
        }

        SessionStats {
            deployment_id: self.deployment_id.clone(),
            connected_participants: self
                .participants
                .values()
                .filter(|h| h.record.is_live())
                .count(),
            ready_participants: ready,
            presenter_connections: self.presenters.len(),
            ready_check_active: self.ready_check_active,
            session_active: self.session_active,
            current_prompt_id,
            groups,
        }
    }

    pub async fn shutdown(&mut self) {
        info!("🔚 会话关闭: {}", self.deployment_id);
        self.session_active = false;

        let targets: Vec<_> = self
            .participants
            .values()
            .map(|h| {
                (
                    h.record.user_id.clone(),
                    h.transport.clone(),
                    ServerMessage::SessionClosed,
                )
            })
            .collect();
        let _ = deliver(targets).await;
        self.notify_presenters(&ServerMessage::SessionClosed).await;

        for (_, mut handle) in self.participants.drain() {
            handle.record.status = ConnectionStatus::Disconnected;
            handle.record.disconnected_at = Some(Utc::now());
            self.archived.push(handle.record);
        }
        self.presenters.clear();
    }

    /// 断开后归档的连接记录
    pub fn archived(&self) -> &[ParticipantConnection] {
        &self.archived
    }

    // --- 内部辅助 ---

    /// 内存中没有分组数据时,读最近一次分配记录惰性加载
    async fn ensure_groups(&mut self) {
        if !self.groups.is_empty() {
            return;
        }
        match self
            .assignment_store
            .latest_for_deployment(&self.deployment_id)
            .await
        {
            Ok(Some(record)) if !record.groups.is_empty() => {
                info!(
                    "📥 惰性加载分组数据: {} ({} 组)",
                    self.deployment_id,
                    record.groups.len()
                );
                self.groups = record.groups;
            }
            Ok(_) => {}
            Err(e) => warn!("读取分配记录失败: {:#}", e),
        }
    }

    /// 最近一次分配记录里的主题,作为列表项的默认来源
    async fn themes_as_list_items(&self) -> Vec<Value> {
        match self
            .assignment_store
            .latest_for_deployment(&self.deployment_id)
            .await
        {
            Ok(Some(record)) => record
                .themes
                .iter()
                .filter_map(|t| serde_json::to_value(t).ok())
                .collect(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("读取列表项来源失败: {:#}", e);
                Vec::new()
            }
        }
    }

    /// 按当前分组数据重推所有在线参与者的归属
    fn refresh_group_memberships(&mut self) {
        for handle in self.participants.values_mut() {
            handle.record.group_info = self
                .groups
                .iter()
                .find(|g| {
                    g.contains(&handle.record.user_name) || g.contains(&handle.record.user_id)
                })
                .cloned();
        }
    }

    fn find_group(&self, record: &ParticipantConnection) -> Option<&Group> {
        self.groups
            .iter()
            .find(|g| g.contains(&record.user_name) || g.contains(&record.user_id))
    }

    /// 当前在线参与者按分组聚合(BTreeMap 保证分配顺序稳定)
    fn connected_groups(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for handle in self.participants.values() {
            if let Some(g) = &handle.record.group_info {
                map.entry(g.group_name.clone())
                    .or_default()
                    .push(handle.record.user_name.clone());
            }
        }
        map
    }

    /// 全组在线成员都已响应时,恰好一次地生成并下发总结
    async fn check_group_completion(&mut self, group: &Group, prompt_id: &str) {
        let key = (prompt_id.to_string(), group.group_name.clone());
        if self
            .completion
            .get(&key)
            .map(|s| s.summary_sent)
            .unwrap_or(false)
        {
            debug!("总结已发送,忽略重复完成: {}", group.group_name);
            return;
        }

        let mut responses = Vec::new();
        let mut connected_members = 0usize;
        for handle in self.participants.values() {
            let in_group = group.contains(&handle.record.user_name)
                || group.contains(&handle.record.user_id);
            if !in_group {
                continue;
            }
            connected_members += 1;
            match handle.record.responses.get(prompt_id) {
                Some(r) => responses.push((handle.record.user_name.clone(), r.clone())),
                // 还有在线成员没响应
                None => return,
            }
        }
        if connected_members == 0 {
            return;
        }

        // 先标记再生成,总结期间的重复提交不会再次触发
        self.completion.insert(
            key,
            GroupCompletionStatus {
                completed: true,
                summary_sent: true,
            },
        );

        info!(
            "📋 分组 {} 全员响应完毕 ({} 人),生成总结",
            group.group_name, connected_members
        );
        let statement = self
            .current_prompt
            .as_ref()
            .filter(|a| a.prompt.id == prompt_id)
            .map(|a| a.prompt.statement.clone())
            .unwrap_or_default();
        let summary = self
            .summarizer
            .summarize_group(&group.group_name, &statement, &responses)
            .await;

        let message = ServerMessage::GroupSummary {
            group_name: group.group_name.clone(),
            prompt_id: prompt_id.to_string(),
            summary,
        };
        let targets: Vec<_> = self
            .participants
            .values()
            .filter(|h| {
                group.contains(&h.record.user_name) || group.contains(&h.record.user_id)
            })
            .map(|h| (h.record.user_id.clone(), h.transport.clone(), message.clone()))
            .collect();
        let failed = deliver(targets).await;
        self.mark_failed(failed);
        self.notify_presenters(&message).await;
    }

    /// 发送失败的连接视为已断开,移除并归档
    fn mark_failed(&mut self, failed: Vec<String>) {
        for user_id in failed {
            if let Some(mut handle) = self.participants.remove(&user_id) {
                warn!("⚠️ 发送失败,标记断开: {}", user_id);
                handle.record.status = ConnectionStatus::Disconnected;
                handle.record.disconnected_at = Some(Utc::now());
                self.archived.push(handle.record);
            }
        }
    }

    async fn notify_presenters(&mut self, message: &ServerMessage) {
        let existing = std::mem::take(&mut self.presenters);
        for presenter in existing {
            if presenter.transport.send(message).await.is_ok() {
                self.presenters.push(presenter);
            } else {
                warn!("演示端连接失效,移除: {}", presenter.id);
            }
        }
    }

    async fn notify_presenters_roster(&mut self) {
        let stats = self.stats();
        self.notify_presenters(&ServerMessage::RosterUpdate { stats })
            .await;
    }
}

/// 逐连接发送,收集失败的 user_id。单个失败不中断其余发送。
async fn deliver(
    targets: Vec<(String, Arc<dyn ConnectionTransport>, ServerMessage)>,
) -> Vec<String> {
    let mut failed = Vec::new();
    for (user_id, transport, message) in targets {
        if transport.send(&message).await.is_err() {
            failed.push(user_id);
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::transport::ChannelTransport;
    use crate::models::{AssignmentKind, PromptInputType, Theme};
    use crate::providers::MemoryAssignmentStore;
    use chrono::Duration;
    use tokio::sync::mpsc;

    fn identity(id: &str, name: &str) -> ParticipantIdentity {
        ParticipantIdentity {
            id: id.to_string(),
            display_name: name.to_string(),
        }
    }

    fn prompt(id: &str, personalized: bool) -> LivePresentationPrompt {
        LivePresentationPrompt {
            id: id.to_string(),
            statement: "Discuss your topic".to_string(),
            has_input: true,
            input_type: PromptInputType::Text,
            use_random_list_item: personalized,
            list_variable_id: personalized.then(|| "themes".to_string()),
            is_system_prompt: false,
        }
    }

    fn group_record(deployment_id: &str, groups: &[(&str, &[&str])]) -> AssignmentRecord {
        AssignmentRecord {
            execution_id: uuid::Uuid::new_v4(),
            deployment_id: deployment_id.to_string(),
            kind: AssignmentKind::Group,
            groups: groups
                .iter()
                .map(|(name, members)| Group {
                    group_name: name.to_string(),
                    group_members: members.iter().map(|m| m.to_string()).collect(),
                    explanation: None,
                })
                .collect(),
            themes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn coordinator(store: Arc<MemoryAssignmentStore>) -> LiveSessionCoordinator {
        LiveSessionCoordinator::new(
            "dep-1",
            &Config::default(),
            store,
            Summarizer::new(None),
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            out.push(message);
        }
        out
    }

    fn count_summaries(messages: &[ServerMessage]) -> usize {
        messages
            .iter()
            .filter(|m| matches!(m, ServerMessage::GroupSummary { .. }))
            .count()
    }

    async fn connect_participant(
        coord: &mut LiveSessionCoordinator,
        id: &str,
        name: &str,
    ) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (transport, rx) = ChannelTransport::new(id);
        coord
            .connect(
                identity(id, name),
                ConnectionRole::Participant,
                Arc::new(transport),
            )
            .await;
        rx
    }

    #[tokio::test]
    async fn test_late_joiner_gets_fresh_prompt_replay() {
        let store = Arc::new(MemoryAssignmentStore::new());
        let mut coord = coordinator(store);

        let mut rx_a = connect_participant(&mut coord, "u-a", "alice").await;
        coord.broadcast_prompt(prompt("p1", false), None).await;
        let mut rx_b = connect_participant(&mut coord, "u-b", "bob").await;

        let a_msgs = drain(&mut rx_a);
        assert!(a_msgs
            .iter()
            .any(|m| matches!(m, ServerMessage::Prompt { prompt, .. } if prompt.id == "p1")));

        // 晚加入者同样收到当前提示
        let b_msgs = drain(&mut rx_b);
        assert!(matches!(b_msgs[0], ServerMessage::Welcome { .. }));
        assert!(b_msgs
            .iter()
            .any(|m| matches!(m, ServerMessage::Prompt { prompt, .. } if prompt.id == "p1")));
    }

    #[tokio::test]
    async fn test_stale_prompt_not_replayed() {
        let store = Arc::new(MemoryAssignmentStore::new());
        let mut coord = coordinator(store);

        coord.broadcast_prompt(prompt("p1", false), None).await;
        if let Some(active) = coord.current_prompt.as_mut() {
            active.sent_at = Utc::now() - Duration::seconds(601);
        }

        let mut rx = connect_participant(&mut coord, "u-late", "late").await;
        let msgs = drain(&mut rx);
        assert!(matches!(msgs[0], ServerMessage::Welcome { .. }));
        assert!(!msgs
            .iter()
            .any(|m| matches!(m, ServerMessage::Prompt { .. })));
    }

    #[tokio::test]
    async fn test_groups_lazily_loaded_on_connect() {
        let store = Arc::new(MemoryAssignmentStore::new());
        store
            .save(&group_record("dep-1", &[("TeamX", &["alice", "bob"])]))
            .await
            .unwrap();
        let mut coord = coordinator(store);

        let mut rx = connect_participant(&mut coord, "u-a", "alice").await;
        let msgs = drain(&mut rx);
        match &msgs[0] {
            ServerMessage::Welcome { group, .. } => {
                assert_eq!(group.as_ref().unwrap().group_name, "TeamX");
            }
            other => panic!("预期 Welcome,实际: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_group_summary_sent_exactly_once() {
        let store = Arc::new(MemoryAssignmentStore::new());
        store
            .save(&group_record(
                "dep-1",
                &[("TeamX", &["alice", "bob", "cara"])],
            ))
            .await
            .unwrap();
        let mut coord = coordinator(store);

        let mut rx_a = connect_participant(&mut coord, "u-a", "alice").await;
        let mut rx_b = connect_participant(&mut coord, "u-b", "bob").await;
        let mut rx_c = connect_participant(&mut coord, "u-c", "cara").await;

        coord.broadcast_prompt(prompt("p1", false), None).await;
        coord
            .receive_response("u-a", "p1", "Solar power".to_string())
            .await;
        coord
            .receive_response("u-b", "p1", "Wind farms".to_string())
            .await;

        // 两人响应还不够
        assert_eq!(count_summaries(&drain(&mut rx_a)), 0);

        coord
            .receive_response("u-c", "p1", "Hydro plants".to_string())
            .await;
        assert_eq!(count_summaries(&drain(&mut rx_a)), 1);
        assert_eq!(count_summaries(&drain(&mut rx_b)), 1);
        assert_eq!(count_summaries(&drain(&mut rx_c)), 1);

        // 重复提交不会再次触发
        coord
            .receive_response("u-a", "p1", "Solar power again".to_string())
            .await;
        assert_eq!(count_summaries(&drain(&mut rx_a)), 0);
        assert_eq!(count_summaries(&drain(&mut rx_b)), 0);
    }

    #[tokio::test]
    async fn test_send_failure_isolated_to_failing_connection() {
        let store = Arc::new(MemoryAssignmentStore::new());
        let mut coord = coordinator(store);

        let rx_a = connect_participant(&mut coord, "u-a", "alice").await;
        let mut rx_b = connect_participant(&mut coord, "u-b", "bob").await;
        drop(rx_a); // alice 的接收端消失,后续发送必然失败

        coord.broadcast_prompt(prompt("p1", false), None).await;

        let b_msgs = drain(&mut rx_b);
        assert!(b_msgs
            .iter()
            .any(|m| matches!(m, ServerMessage::Prompt { .. })));

        let stats = coord.stats();
        assert_eq!(stats.connected_participants, 1);
        assert_eq!(coord.archived().len(), 1);
        assert_eq!(coord.archived()[0].user_id, "u-a");
        assert!(coord.archived()[0].disconnected_at.is_some());
    }

    #[tokio::test]
    async fn test_ready_check_state_transitions() {
        let store = Arc::new(MemoryAssignmentStore::new());
        let mut coord = coordinator(store);

        let mut rx_a = connect_participant(&mut coord, "u-a", "alice").await;
        let (presenter_transport, mut rx_p) = ChannelTransport::new("pres-1");
        coord
            .connect(
                identity("pres-1", "Teacher"),
                ConnectionRole::Presenter,
                Arc::new(presenter_transport),
            )
            .await;

        coord.start_ready_check().await;
        assert!(drain(&mut rx_a)
            .iter()
            .any(|m| matches!(m, ServerMessage::ReadyCheck)));

        coord.mark_ready("u-a").await;
        assert_eq!(coord.stats().ready_participants, 1);
        assert!(drain(&mut rx_p).iter().any(
            |m| matches!(m, ServerMessage::ReadyAck { user_id, .. } if user_id == "u-a")
        ));

        // 重新发起就绪检查会清掉已就绪状态
        coord.start_ready_check().await;
        assert_eq!(coord.stats().ready_participants, 0);

        // 就绪检查窗口内连接的晚加入者也会收到检查
        let mut rx_b = connect_participant(&mut coord, "u-b", "bob").await;
        assert!(drain(&mut rx_b)
            .iter()
            .any(|m| matches!(m, ServerMessage::ReadyCheck)));
    }

    #[tokio::test]
    async fn test_list_items_personalized_per_group() {
        let store = Arc::new(MemoryAssignmentStore::new());
        store
            .save(&group_record(
                "dep-1",
                &[("G1", &["alice", "bob"]), ("G2", &["cara"])],
            ))
            .await
            .unwrap();
        let mut coord = coordinator(store);

        let mut rx_a = connect_participant(&mut coord, "u-a", "alice").await;
        let mut rx_b = connect_participant(&mut coord, "u-b", "bob").await;
        let mut rx_c = connect_participant(&mut coord, "u-c", "cara").await;

        let items = vec![
            serde_json::json!({"title": "Theme 1"}),
            serde_json::json!({"title": "Theme 2"}),
        ];
        coord
            .broadcast_prompt(prompt("p1", true), Some(items.clone()))
            .await;

        let item_of = |msgs: &[ServerMessage]| -> Value {
            msgs.iter()
                .find_map(|m| match m {
                    ServerMessage::Prompt { assigned_item, .. } => assigned_item.clone(),
                    _ => None,
                })
                .expect("应当带有分配条目")
        };
        let a_item = item_of(&drain(&mut rx_a));
        let b_item = item_of(&drain(&mut rx_b));
        let c_item = item_of(&drain(&mut rx_c));

        // 同组成员拿到同一项,不同组拿到不同项,且都来自输入列表
        assert_eq!(a_item, b_item);
        assert_ne!(a_item, c_item);
        assert!(items.contains(&a_item));
        assert!(items.contains(&c_item));
    }

    #[tokio::test]
    async fn test_broadcast_rederives_group_memberships() {
        let store = Arc::new(MemoryAssignmentStore::new());
        let mut coord = coordinator(store.clone());

        // 两人先连接,此时还没有任何分配记录
        let mut rx_a = connect_participant(&mut coord, "u-a", "alice").await;
        let mut rx_b = connect_participant(&mut coord, "u-b", "bob").await;

        // 分配记录随后才产出(例如行为执行刚刚完成)
        store
            .save(&group_record(
                "dep-1",
                &[("G1", &["alice"]), ("G2", &["bob"])],
            ))
            .await
            .unwrap();

        let items = vec![
            serde_json::json!({"title": "Theme 1"}),
            serde_json::json!({"title": "Theme 2"}),
        ];
        coord
            .broadcast_prompt(prompt("p1", true), Some(items.clone()))
            .await;

        // 广播时重推归属:两人分属不同组,各拿各的条目
        let item_of = |msgs: Vec<ServerMessage>| -> Value {
            msgs.into_iter()
                .find_map(|m| match m {
                    ServerMessage::Prompt { assigned_item, .. } => assigned_item,
                    _ => None,
                })
                .expect("应当带有分配条目")
        };
        let a_item = item_of(drain(&mut rx_a));
        let b_item = item_of(drain(&mut rx_b));
        assert_ne!(a_item, b_item);
        assert!(items.contains(&a_item));
        assert!(items.contains(&b_item));
    }

    #[tokio::test]
    async fn test_uniform_first_item_without_group_data() {
        let store = Arc::new(MemoryAssignmentStore::new());
        let record = AssignmentRecord {
            execution_id: uuid::Uuid::new_v4(),
            deployment_id: "dep-1".to_string(),
            kind: AssignmentKind::Theme,
            groups: Vec::new(),
            themes: vec![Theme::placeholder(0), Theme::placeholder(1)],
            created_at: Utc::now(),
        };
        store.save(&record).await.unwrap();
        let mut coord = coordinator(store);

        let mut rx_a = connect_participant(&mut coord, "u-a", "alice").await;
        let mut rx_b = connect_participant(&mut coord, "u-b", "bob").await;

        coord.broadcast_prompt(prompt("p1", true), None).await;

        for rx in [&mut rx_a, &mut rx_b] {
            let msgs = drain(rx);
            let item = msgs
                .iter()
                .find_map(|m| match m {
                    ServerMessage::Prompt { assigned_item, .. } => assigned_item.clone(),
                    _ => None,
                })
                .expect("应当带有统一条目");
            assert_eq!(item["title"], "Theme 1");
        }
    }

    #[tokio::test]
    async fn test_event_loop_processes_events_serially() {
        let store = Arc::new(MemoryAssignmentStore::new());
        let mut coord = coordinator(store);

        let (transport, mut rx) = ChannelTransport::new("u-a");
        let keep_going = coord
            .handle_event(SessionEvent::Connect {
                identity: identity("u-a", "alice"),
                role: ConnectionRole::Participant,
                transport: Arc::new(transport),
            })
            .await;
        assert!(keep_going);

        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        coord
            .handle_event(SessionEvent::GetStats { reply: reply_tx })
            .await;
        let stats = reply_rx.await.unwrap();
        assert_eq!(stats.connected_participants, 1);
        assert!(stats.session_active);

        let keep_going = coord.handle_event(SessionEvent::Shutdown).await;
        assert!(!keep_going);
        assert!(drain(&mut rx)
            .iter()
            .any(|m| matches!(m, ServerMessage::SessionClosed)));
        assert!(!coord.stats().session_active);
    }
}
