//! 聚类引擎 - 业务能力层
//!
//! 把一组学生向量划分为 k 个平衡的簇，分组和主题发现走的是
//! 同一套逻辑。
//!
//! ## 算法
//! 1. 固定种子的标准 k-means（有限迭代 + 少量重启，取最优惯性）
//! 2. k-means 收敛到的非空簇少于 k' 时（向量几乎相同的常见情形，
//!    比如近似重复的 PDF），丢弃该结果做确定性的平衡分配：
//!    贪心选 k' 个相互最远的种子点（余弦距离），其余学生按
//!    "到种子的距离 + 簇满度惩罚" 贪心入簇，带硬容量上限，
//!    保证每个簇非空且大小差 ≤ 1
//! 3. 其他任何失败（数值异常等）退化为轮转分配 `i % k'`
//!
//! 不变式：每个输入学生恰好落在一个簇里，调用方永远拿到完整划分。

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ClusteringError};
use crate::models::{ClusterAssignment, StudentVector};
use crate::utils::vecmath;

/// 聚类参数
#[derive(Clone, Copy, Debug)]
pub struct ClusterOptions {
    /// 固定随机种子（保证测试可复现）
    pub seed: u64,
    /// 单次 k-means 的最大迭代次数
    pub max_iters: usize,
    /// 重启次数（取惯性最小的一次）
    pub restarts: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            max_iters: 100,
            restarts: 3,
        }
    }
}

impl From<&Config> for ClusterOptions {
    fn from(config: &Config) -> Self {
        Self {
            seed: config.kmeans_seed,
            max_iters: config.kmeans_max_iters,
            restarts: config.kmeans_restarts.max(1),
        }
    }
}

/// 聚类引擎
#[derive(Clone, Copy, Debug, Default)]
pub struct ClusterEngine {
    options: ClusterOptions,
}

impl ClusterEngine {
    pub fn new(options: ClusterOptions) -> Self {
        Self { options }
    }

    /// 聚类入口
    ///
    /// # 参数
    /// - `vectors`: (学生名, 向量) 列表
    /// - `k`: 请求的簇数量
    ///
    /// # 返回
    /// 覆盖全部输入学生的完整划分；学生不足 2 人、名字非法/重复、
    /// 向量维度不一致时返回输入错误。
    pub fn cluster(&self, vectors: &[StudentVector], k: usize) -> AppResult<ClusterAssignment> {
        let n = vectors.len();
        if n < 2 {
            return Err(AppError::insufficient_submissions(n, 2));
        }

        // 名字是一次执行内的唯一身份：空名/重名会让划分悄悄缺人，
        // 必须作为输入错误同步抛出
        let mut seen = HashSet::new();
        for v in vectors {
            if v.name.trim().is_empty() {
                return Err(AppError::Clustering(ClusteringError::MalformedSubmission {
                    name: v.name.clone(),
                    reason: "名字为空".to_string(),
                }));
            }
            if !seen.insert(v.name.as_str()) {
                return Err(AppError::Clustering(ClusteringError::MalformedSubmission {
                    name: v.name.clone(),
                    reason: "名字重复".to_string(),
                }));
            }
        }
        let expected_dim = vectors[0].vector.len();
        if let Some(v) = vectors.iter().find(|v| v.vector.len() != expected_dim) {
            return Err(AppError::Clustering(ClusteringError::DimensionMismatch {
                expected: expected_dim,
                got: v.vector.len(),
            }));
        }

        let k_eff = effective_k(n, k);
        debug!("聚类开始: n={}, 请求 k={}, 生效 k'={}", n, k, k_eff);

        // 归一化后欧氏距离与余弦距离单调一致
        let data: Vec<Vec<f32>> = vectors.iter().map(|v| vecmath::normalize(&v.vector)).collect();

        let labels = if !vecmath::all_finite(&data) {
            warn!("输入向量包含非有限值，退化为轮转分配");
            round_robin(n, k_eff)
        } else {
            match self.kmeans_best(&data, k_eff) {
                Some(labels) => {
                    let nonempty = distinct_nonempty(&labels, k_eff);
                    if nonempty < k_eff {
                        debug!(
                            "k-means 只产出 {} 个非空簇 (< {})，触发平衡再分配",
                            nonempty, k_eff
                        );
                        balanced_assign(&data, k_eff)
                    } else {
                        labels
                    }
                }
                None => {
                    warn!("k-means 未能产出有效结果，退化为轮转分配");
                    round_robin(n, k_eff)
                }
            }
        };

        let members: HashMap<String, usize> = vectors
            .iter()
            .zip(labels.iter())
            .map(|(v, &c)| (v.name.clone(), c))
            .collect();

        Ok(ClusterAssignment {
            cluster_count: k_eff,
            members,
        })
    }

    /// 多次重启取惯性最小的一次
    fn kmeans_best(&self, data: &[Vec<f32>], k: usize) -> Option<Vec<usize>> {
        let mut best: Option<(f32, Vec<usize>)> = None;
        for restart in 0..self.options.restarts {
            let seed = self.options.seed.wrapping_add(restart as u64);
            if let Some((inertia, labels)) = kmeans_once(data, k, seed, self.options.max_iters) {
                let better = match &best {
                    Some((best_inertia, _)) => inertia < *best_inertia,
                    None => true,
                };
                if better {
                    best = Some((inertia, labels));
                }
            }
        }
        best.map(|(_, labels)| labels)
    }
}

/// 生效簇数量
///
/// 学生数不足 2k 时缩减为 `max(1, n/2)`；只要 n ≥ 2 就保证
/// 至少 2 个簇，避免退化的单簇输出；最后不超过学生数本身。
fn effective_k(n: usize, k: usize) -> usize {
    let k = k.max(1);
    let mut k_eff = if n < 2 * k { (n / 2).max(1) } else { k };
    if n >= 2 {
        k_eff = k_eff.max(2);
    }
    k_eff.min(n)
}

/// 单次 k-means
///
/// 返回 (惯性, 标签)；出现非有限惯性时返回 None 交给上层兜底。
fn kmeans_once(
    data: &[Vec<f32>],
    k: usize,
    seed: u64,
    max_iters: usize,
) -> Option<(f32, Vec<usize>)> {
    let n = data.len();
    let mut rng = StdRng::seed_from_u64(seed);

    // 随机选 k 个不同的点作为初始中心
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);
    let mut centroids: Vec<Vec<f32>> = indices[..k].iter().map(|&i| data[i].clone()).collect();

    let mut labels = vec![0usize; n];
    for _ in 0..max_iters {
        // 分配：最近中心（平手取索引最小者，保证确定性）
        let mut changed = false;
        for (i, point) in data.iter().enumerate() {
            let mut best_c = 0usize;
            let mut best_d = f32::INFINITY;
            for (c, centroid) in centroids.iter().enumerate() {
                let d = vecmath::squared_euclidean(point, centroid);
                if d < best_d {
                    best_d = d;
                    best_c = c;
                }
            }
            if labels[i] != best_c {
                labels[i] = best_c;
                changed = true;
            }
        }

        if !changed {
            break;
        }

        // 更新：空簇保留旧中心
        for c in 0..k {
            let members: Vec<Vec<f32>> = data
                .iter()
                .zip(labels.iter())
                .filter(|(_, &l)| l == c)
                .map(|(v, _)| v.clone())
                .collect();
            if let Some(mean) = vecmath::mean_vector(&members) {
                centroids[c] = mean;
            }
        }
    }

    let inertia: f32 = data
        .iter()
        .zip(labels.iter())
        .map(|(v, &c)| vecmath::squared_euclidean(v, &centroids[c]))
        .sum();

    if !inertia.is_finite() {
        return None;
    }
    Some((inertia, labels))
}

/// 确定性的平衡分配
///
/// 种子选取：第一个种子是离全体均值最远的点，其后贪心取
/// "到已选种子的最小余弦距离"最大的点。容量为
/// `floor(n/k)`，前 `n mod k` 个簇各 +1，因此大小差 ≤ 1
/// 且每个簇至少含自己的种子。
fn balanced_assign(data: &[Vec<f32>], k: usize) -> Vec<usize> {
    let n = data.len();
    let capacities: Vec<usize> = (0..k).map(|c| n / k + usize::from(c < n % k)).collect();

    // 种子选取
    let mean = vecmath::mean_vector(data).unwrap_or_default();
    let mut seeds: Vec<usize> = Vec::with_capacity(k);
    let first = (0..n)
        .max_by(|&a, &b| {
            vecmath::cosine_distance(&data[a], &mean)
                .partial_cmp(&vecmath::cosine_distance(&data[b], &mean))
                .unwrap_or(std::cmp::Ordering::Equal)
                // 平手取索引小的（max_by 取最后的最大值，因此反转索引比较）
                .then(b.cmp(&a))
        })
        .unwrap_or(0);
    seeds.push(first);

    while seeds.len() < k {
        let next = (0..n)
            .filter(|i| !seeds.contains(i))
            .max_by(|&a, &b| {
                let da = min_seed_distance(data, &seeds, a);
                let db = min_seed_distance(data, &seeds, b);
                da.partial_cmp(&db)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(b.cmp(&a))
            })
            .unwrap_or(0);
        seeds.push(next);
    }

    // 种子先占位
    let mut labels = vec![usize::MAX; n];
    let mut sizes = vec![0usize; k];
    for (c, &s) in seeds.iter().enumerate() {
        labels[s] = c;
        sizes[c] = 1;
    }

    // 其余学生按 (距离 + 满度惩罚) 贪心入簇，硬容量封顶
    for i in 0..n {
        if labels[i] != usize::MAX {
            continue;
        }
        let mut best_c = None;
        let mut best_score = f32::INFINITY;
        for c in 0..k {
            if sizes[c] >= capacities[c] {
                continue;
            }
            let distance = vecmath::cosine_distance(&data[i], &data[seeds[c]]);
            let penalty = sizes[c] as f32 / capacities[c].max(1) as f32;
            let score = distance + penalty;
            if score < best_score {
                best_score = score;
                best_c = Some(c);
            }
        }
        // 容量恰好 sum == n，这里必然还有空位
        let c = best_c.unwrap_or(0);
        labels[i] = c;
        sizes[c] += 1;
    }

    labels
}

fn min_seed_distance(data: &[Vec<f32>], seeds: &[usize], i: usize) -> f32 {
    seeds
        .iter()
        .map(|&s| vecmath::cosine_distance(&data[i], &data[s]))
        .fold(f32::INFINITY, f32::min)
}

/// 最后的兜底：轮转分配
fn round_robin(n: usize, k: usize) -> Vec<usize> {
    (0..n).map(|i| i % k).collect()
}

fn distinct_nonempty(labels: &[usize], k: usize) -> usize {
    let mut seen = vec![false; k];
    for &l in labels {
        if l < k {
            seen[l] = true;
        }
    }
    seen.iter().filter(|&&s| s).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sv(name: &str, vector: Vec<f32>) -> StudentVector {
        StudentVector {
            name: name.to_string(),
            vector,
        }
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("student-{:02}", i)).collect()
    }

    #[test]
    fn test_insufficient_submissions_is_input_error() {
        let engine = ClusterEngine::default();
        let result = engine.cluster(&[sv("only", vec![1.0, 0.0])], 2);
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_names_are_input_errors() {
        // 重名会让 HashMap 划分悄悄缺人，必须同步报错
        let engine = ClusterEngine::default();
        let vectors = vec![
            sv("alice", vec![1.0, 0.0]),
            sv("bob", vec![0.0, 1.0]),
            sv("alice", vec![0.5, 0.5]),
        ];
        let err = engine.cluster(&vectors, 2).unwrap_err();
        assert!(matches!(
            err,
            AppError::Clustering(ClusteringError::MalformedSubmission { ref name, .. })
                if name == "alice"
        ));
    }

    #[test]
    fn test_empty_name_is_input_error() {
        let engine = ClusterEngine::default();
        let vectors = vec![sv("  ", vec![1.0, 0.0]), sv("bob", vec![0.0, 1.0])];
        let err = engine.cluster(&vectors, 2).unwrap_err();
        assert!(matches!(
            err,
            AppError::Clustering(ClusteringError::MalformedSubmission { .. })
        ));
    }

    #[test]
    fn test_dimension_mismatch_is_input_error() {
        let engine = ClusterEngine::default();
        let vectors = vec![sv("alice", vec![1.0, 0.0]), sv("bob", vec![0.0, 1.0, 0.5])];
        let err = engine.cluster(&vectors, 2).unwrap_err();
        assert!(matches!(
            err,
            AppError::Clustering(ClusteringError::DimensionMismatch {
                expected: 2,
                got: 3
            })
        ));
    }

    #[test]
    fn test_effective_k_reduction_and_floor() {
        // n < 2k 时缩减
        assert_eq!(effective_k(4, 3), 2);
        assert_eq!(effective_k(6, 3), 3);
        // n >= 2 时至少 2 个簇
        assert_eq!(effective_k(2, 1), 2);
        assert_eq!(effective_k(10, 1), 2);
        // 不超过学生数
        assert_eq!(effective_k(2, 5), 2);
    }

    #[test]
    fn test_coverage_every_student_assigned_once() {
        let engine = ClusterEngine::default();
        let vectors: Vec<StudentVector> = names(9)
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let angle = i as f32 * 0.7;
                sv(&name, vec![angle.cos(), angle.sin(), (i as f32) * 0.1])
            })
            .collect();

        let assignment = engine.cluster(&vectors, 3).unwrap();
        assert_eq!(assignment.members.len(), 9);
        for &c in assignment.members.values() {
            assert!(c < assignment.cluster_count);
        }
    }

    #[test]
    fn test_determinism_same_input_same_output() {
        let engine = ClusterEngine::default();
        let vectors: Vec<StudentVector> = names(12)
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let angle = i as f32 * 1.3;
                sv(&name, vec![angle.cos(), angle.sin()])
            })
            .collect();

        let a = engine.cluster(&vectors, 4).unwrap();
        let b = engine.cluster(&vectors, 4).unwrap();
        assert_eq!(a.members, b.members);
    }

    #[test]
    fn test_identical_vectors_trigger_balanced_rebalancing() {
        // 6 个学生，k=3，向量几乎相同（模拟近似重复 PDF）
        let engine = ClusterEngine::default();
        let vectors: Vec<StudentVector> = names(6)
            .into_iter()
            .map(|name| sv(&name, vec![0.5, 0.5, 0.5]))
            .collect();

        let assignment = engine.cluster(&vectors, 3).unwrap();
        assert_eq!(assignment.cluster_count, 3);

        let sizes = assignment.cluster_sizes();
        assert_eq!(sizes.len(), 3);
        // 恰好 3 个非空簇，每簇 2 人
        assert_eq!(sizes, vec![2, 2, 2]);
    }

    #[test]
    fn test_balance_invariant_sizes_differ_at_most_one() {
        let engine = ClusterEngine::default();
        // 7 个相同向量分 3 簇：大小只能是 3/2/2
        let vectors: Vec<StudentVector> = names(7)
            .into_iter()
            .map(|name| sv(&name, vec![1.0, 1.0]))
            .collect();

        let assignment = engine.cluster(&vectors, 3).unwrap();
        let sizes = assignment.cluster_sizes();
        let max = sizes.iter().max().unwrap();
        let min = sizes.iter().min().unwrap();
        assert!(max - min <= 1, "簇大小差超过 1: {:?}", sizes);
        assert!(sizes.iter().all(|&s| s > 0));
    }

    #[test]
    fn test_non_finite_input_falls_back_to_round_robin() {
        let engine = ClusterEngine::default();
        let vectors = vec![
            sv("a", vec![f32::NAN, 0.0]),
            sv("b", vec![1.0, 0.0]),
            sv("c", vec![0.0, 1.0]),
            sv("d", vec![1.0, 1.0]),
        ];

        let assignment = engine.cluster(&vectors, 2).unwrap();
        // 轮转: 按输入顺序 i % 2
        assert_eq!(assignment.members["a"], 0);
        assert_eq!(assignment.members["b"], 1);
        assert_eq!(assignment.members["c"], 0);
        assert_eq!(assignment.members["d"], 1);
    }

    #[test]
    fn test_two_students_give_two_clusters() {
        let engine = ClusterEngine::default();
        let vectors = vec![sv("a", vec![1.0, 0.0]), sv("b", vec![0.0, 1.0])];

        let assignment = engine.cluster(&vectors, 5).unwrap();
        assert_eq!(assignment.cluster_count, 2);
        assert_ne!(assignment.members["a"], assignment.members["b"]);
    }
}
