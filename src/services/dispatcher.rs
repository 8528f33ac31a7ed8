//! 列表项分组分配 - 业务能力层
//!
//! 给定一组离散的列表项（最常见的是生成的主题）和已经成形的
//! 学生分组，为每个分组分配一个列表项：
//! 洗牌一次消除位置偏置，然后按稳定的分组顺序循环取用
//! `items[i % len]`。分组多于列表项时按轮转复用，而不是独立
//! 随机重抽——独立抽样会纯凭运气把多个分组挤到同一个热门项上，
//! 也会让个别项被系统性饿死。

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// 分配结果
#[derive(Debug)]
pub enum DispatchOutcome {
    /// group_name → 分到的列表项
    Assigned(HashMap<String, Value>),
    /// 列表项为空或来源不存在：非致命的"无数据"状态，
    /// 调用方自行决定如何降级（通常是统一广播）
    NoData,
}

/// 为每个分组分配一个列表项
///
/// # 参数
/// - `list_items`: 列表项（洗牌在本函数内做，调用方无需预处理）
/// - `groups`: group_name → 成员列表（BTreeMap 保证遍历顺序稳定）
/// - `rng`: 注入的随机源（测试传固定种子即可复现）
///
/// # 不变式
/// - 每个分组键在输出里恰好出现一次
/// - 输出值全部来自 `list_items`
/// - 分组数 ≥ 列表项数时没有列表项被饿死
pub fn assign_list_items<R: Rng>(
    list_items: &[Value],
    groups: &BTreeMap<String, Vec<String>>,
    rng: &mut R,
) -> DispatchOutcome {
    if list_items.is_empty() {
        debug!("列表项为空，报告无数据状态");
        return DispatchOutcome::NoData;
    }

    let mut shuffled: Vec<Value> = list_items.to_vec();
    shuffled.shuffle(rng);

    let assignments: HashMap<String, Value> = groups
        .keys()
        .enumerate()
        .map(|(i, group_name)| (group_name.clone(), shuffled[i % shuffled.len()].clone()))
        .collect();

    debug!(
        "列表项分配完成: {} 个分组, {} 个列表项",
        assignments.len(),
        list_items.len()
    );
    DispatchOutcome::Assigned(assignments)
}
