//! 向量数学工具
//!
//! 聚类、主题提取、多样性采样共用的基础向量运算。
//! 所有函数对空向量和零向量都有定义（返回 0 或单位化为原样），
//! 避免在退化输入上 panic。

/// 点积
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2 范数
pub fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

/// L2 归一化（零向量原样返回）
pub fn normalize(a: &[f32]) -> Vec<f32> {
    let n = norm(a);
    if n <= f32::EPSILON {
        return a.to_vec();
    }
    a.iter().map(|x| x / n).collect()
}

/// 余弦距离 (1 - cosine similarity)，范围 [0, 2]
///
/// 任一向量为零向量时按最大距离 1.0 处理。
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let na = norm(a);
    let nb = norm(b);
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return 1.0;
    }
    1.0 - dot(a, b) / (na * nb)
}

/// 欧几里得距离的平方
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// 一组向量的无加权均值
///
/// 维度以第一个向量为准，较短的向量按 0 补齐参与。
/// 空输入返回 None。
pub fn mean_vector(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let dim = first.len();
    let mut sum = vec![0.0f32; dim];
    for v in vectors {
        for (i, slot) in sum.iter_mut().enumerate() {
            *slot += v.get(i).copied().unwrap_or(0.0);
        }
    }
    let n = vectors.len() as f32;
    Some(sum.into_iter().map(|x| x / n).collect())
}

/// 检查向量是否全部为有限值
pub fn all_finite(vectors: &[Vec<f32>]) -> bool {
    vectors.iter().all(|v| v.iter().all(|x| x.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance_basics() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        let c = vec![1.0, 0.0];

        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
        assert!(cosine_distance(&a, &c).abs() < 1e-6);
        // 零向量按最大距离处理
        assert!((cosine_distance(&a, &[0.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mean_vector() {
        let vs = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(mean_vector(&vs), Some(vec![2.0, 3.0]));
        assert_eq!(mean_vector(&[]), None);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
        let n = normalize(&[3.0, 4.0]);
        assert!((norm(&n) - 1.0).abs() < 1e-6);
    }
}
