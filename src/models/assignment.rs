use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 聚类结果：学生名 → 簇索引 (0..k-1)
///
/// 不变式：每个输入学生恰好对应一个簇索引；当学生数 ≥ k 时，
/// 再平衡之后 [0, k) 内的每个索引都非空。
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClusterAssignment {
    /// 实际使用的簇数量（可能小于请求的 k）
    pub cluster_count: usize,
    /// 学生名 → 簇索引
    pub members: HashMap<String, usize>,
}

impl ClusterAssignment {
    /// 按簇索引收集学生名（簇内按名字排序，保证稳定输出）
    pub fn members_of(&self, cluster_id: usize) -> Vec<String> {
        let mut names: Vec<String> = self
            .members
            .iter()
            .filter(|(_, &c)| c == cluster_id)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// 各簇的大小
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.cluster_count];
        for &c in self.members.values() {
            if c < sizes.len() {
                sizes[c] += 1;
            }
        }
        sizes
    }
}

/// 主题
///
/// 每个非空簇产出一个，由 Theme Labeler 构建。
/// `keywords` 与 `snippets` 均按显著性从高到低排序。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Theme {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub snippets: Vec<String>,
    pub cluster_id: usize,
    pub student_names: Vec<String>,
    pub student_count: usize,
}

impl Theme {
    /// 空簇的占位主题
    pub fn placeholder(cluster_id: usize) -> Self {
        Self {
            title: format!("Theme {}", cluster_id + 1),
            description: String::new(),
            keywords: Vec::new(),
            snippets: Vec::new(),
            cluster_id,
            student_names: Vec::new(),
            student_count: 0,
        }
    }
}

/// 分组
///
/// 与 Theme 同源（同一个聚类引擎），但表示"人对人"的分组
/// 而不是内容分类。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Group {
    pub group_name: String,
    pub group_members: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Group {
    pub fn contains(&self, member: &str) -> bool {
        self.group_members.iter().any(|m| m == member)
    }
}

/// 行为执行的产物类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    Group,
    Theme,
}

/// 一次行为执行产出的分配记录
///
/// 聚类流水线产出一次、写入外部存储后不再修改；
/// 实时会话冷启动/晚加入时按"某部署最近一次记录"读取。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub execution_id: uuid::Uuid,
    pub deployment_id: String,
    pub kind: AssignmentKind,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub themes: Vec<Theme>,
    pub created_at: DateTime<Utc>,
}

impl AssignmentRecord {
    /// 查找某个学生所在的分组
    pub fn group_of(&self, member: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.contains(member))
    }
}
