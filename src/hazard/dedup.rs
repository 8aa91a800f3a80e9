//! 危险去重器 - 合并同类型、相距很近的重复上报
//!
//! 多个司机往往会对同一处事故重复上报，此模块把它们合并为一条再发送提醒。
//!
//! ## 去重策略
//! 1. 按危险类型分组（不同类型永不合并）
//! 2. 组内按输入顺序（即到司机的距离顺序）做单遍贪心聚类：
//!    取第一个未分配的危险作为种子，之后所有与 **种子** 距离 ≤ 50 米的未分配危险并入该簇
//! 3. 每簇保留一个代表：严重度最高者优先，其次创建时间最新者
//!
//! 聚类只比较种子与成员，不具有传递性：两个都在种子 50 米内的危险彼此可能相距近 100 米，
//! 而只与某个成员相近、与种子相距超过 50 米的危险会另起一簇。结果依赖输入顺序。
//! `ClusterMode::Transitive` 提供按邻近图连通分量聚类的版本，默认不启用。

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use super::locator::NearbyHazard;
use super::model::HazardType;
use crate::geo::haversine_distance;

/// 默认去重半径（米）
pub const DEFAULT_DEDUP_RADIUS_METERS: f64 = 50.0;

/// 聚类方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMode {
    /// 以种子为中心的单遍贪心聚类
    #[default]
    Greedy,
    /// 邻近图的连通分量
    Transitive,
}

/// 危险去重器
#[derive(Debug, Clone)]
pub struct HazardDeduplicator {
    radius_m: f64,
    mode: ClusterMode,
}

impl HazardDeduplicator {
    pub fn new() -> Self {
        Self {
            radius_m: DEFAULT_DEDUP_RADIUS_METERS,
            mode: ClusterMode::Greedy,
        }
    }

    /// 设置合并半径
    pub fn with_radius(mut self, radius_m: f64) -> Self {
        self.radius_m = radius_m;
        self
    }

    /// 设置聚类方式
    pub fn with_mode(mut self, mode: ClusterMode) -> Self {
        self.mode = mode;
        self
    }

    /// 去重，返回每簇的代表
    ///
    /// 输出顺序：类型按首次出现顺序，类型内按簇的生成顺序
    pub fn deduplicate(&self, hazards: &[NearbyHazard]) -> Vec<NearbyHazard> {
        let mut representatives = Vec::new();

        for (hazard_type, group) in Self::group_by_type(hazards) {
            let clusters = match self.mode {
                ClusterMode::Greedy => self.greedy_clusters(&group),
                ClusterMode::Transitive => self.transitive_clusters(&group),
            };

            debug!(
                hazard_type = %hazard_type.as_str(),
                reports = group.len(),
                clusters = clusters.len(),
                "Clustered hazard reports"
            );

            for cluster in &clusters {
                if let Some(best) = Self::select_representative(cluster) {
                    representatives.push(best.clone());
                }
            }
        }

        representatives
    }

    /// 按类型分组，保持类型首次出现顺序和组内原始顺序
    fn group_by_type(hazards: &[NearbyHazard]) -> Vec<(HazardType, Vec<&NearbyHazard>)> {
        let mut groups: Vec<(HazardType, Vec<&NearbyHazard>)> = Vec::new();
        for nearby in hazards {
            let hazard_type = nearby.hazard.hazard_type;
            match groups.iter_mut().find(|(t, _)| *t == hazard_type) {
                Some((_, members)) => members.push(nearby),
                None => groups.push((hazard_type, vec![nearby])),
            }
        }
        groups
    }

    fn is_close(&self, a: &NearbyHazard, b: &NearbyHazard) -> bool {
        haversine_distance(
            a.hazard.latitude,
            a.hazard.longitude,
            b.hazard.latitude,
            b.hazard.longitude,
        ) <= self.radius_m
    }

    fn greedy_clusters<'a>(&self, group: &[&'a NearbyHazard]) -> Vec<Vec<&'a NearbyHazard>> {
        let mut assigned = vec![false; group.len()];
        let mut clusters = Vec::new();

        for i in 0..group.len() {
            if assigned[i] {
                continue;
            }
            assigned[i] = true;
            let seed = group[i];
            let mut cluster = vec![seed];

            for j in (i + 1)..group.len() {
                if !assigned[j] && self.is_close(seed, group[j]) {
                    assigned[j] = true;
                    cluster.push(group[j]);
                }
            }

            clusters.push(cluster);
        }

        clusters
    }

    fn transitive_clusters<'a>(&self, group: &[&'a NearbyHazard]) -> Vec<Vec<&'a NearbyHazard>> {
        let mut assigned = vec![false; group.len()];
        let mut clusters = Vec::new();

        for start in 0..group.len() {
            if assigned[start] {
                continue;
            }
            assigned[start] = true;
            let mut members = vec![start];
            let mut queue = VecDeque::from([start]);

            while let Some(k) = queue.pop_front() {
                for j in 0..group.len() {
                    if !assigned[j] && self.is_close(group[k], group[j]) {
                        assigned[j] = true;
                        members.push(j);
                        queue.push_back(j);
                    }
                }
            }

            // 代表选择的最终平局按输入顺序
            members.sort_unstable();
            clusters.push(members.into_iter().map(|i| group[i]).collect());
        }

        clusters
    }

    /// 严重度降序，其次创建时间降序；完全相同时保留簇内靠前者
    fn select_representative<'a>(cluster: &[&'a NearbyHazard]) -> Option<&'a NearbyHazard> {
        let mut iter = cluster.iter().copied();
        let mut best = iter.next()?;
        for candidate in iter {
            let better = (candidate.hazard.severity, candidate.hazard.created_at)
                > (best.hazard.severity, best.hazard.created_at);
            if better {
                best = candidate;
            }
        }
        Some(best)
    }
}

impl Default for HazardDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hazard::model::{Hazard, Severity};
    use chrono::{Duration, TimeZone, Utc};

    const BASE_LAT: f64 = 37.7749;
    const BASE_LON: f64 = -122.4194;

    fn nearby(id: u64, hazard_type: HazardType, severity: u8, lat_offset: f64, created_secs: i64) -> NearbyHazard {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let hazard = Hazard::new(
            id,
            hazard_type,
            Severity::new(severity).unwrap(),
            BASE_LAT + lat_offset,
            BASE_LON,
        )
        .with_created_at(t0 + Duration::seconds(created_secs));
        NearbyHazard {
            distance_m: lat_offset.abs() * 111_195.0,
            hazard,
        }
    }

    fn ids(hazards: &[NearbyHazard]) -> Vec<u64> {
        hazards.iter().map(|n| n.hazard.id).collect()
    }

    #[test]
    fn test_higher_severity_wins_within_cluster() {
        // 约 30 米
        let h1 = nearby(1, HazardType::Accident, 3, 0.0, 0);
        let h2 = nearby(2, HazardType::Accident, 5, 0.00027, 1);

        let result = HazardDeduplicator::new().deduplicate(&[h1, h2]);
        assert_eq!(ids(&result), vec![2]);
    }

    #[test]
    fn test_different_types_never_merge() {
        let h1 = nearby(1, HazardType::Accident, 3, 0.0, 0);
        let h3 = nearby(3, HazardType::BadRoad, 3, 0.0, 0);

        let result = HazardDeduplicator::new().deduplicate(&[h1, h3]);
        assert_eq!(ids(&result), vec![1, 3]);
    }

    #[test]
    fn test_same_severity_most_recent_wins() {
        let older = nearby(1, HazardType::Pedestrians, 4, 0.0, 0);
        let newer = nearby(2, HazardType::Pedestrians, 4, 0.0001, 600);

        let result = HazardDeduplicator::new().deduplicate(&[older, newer]);
        assert_eq!(ids(&result), vec![2]);
    }

    #[test]
    fn test_full_tie_keeps_first() {
        let a = nearby(1, HazardType::BlackSpot, 2, 0.0, 0);
        let b = nearby(2, HazardType::BlackSpot, 2, 0.0001, 0);

        let result = HazardDeduplicator::new().deduplicate(&[a, b]);
        assert_eq!(ids(&result), vec![1]);
    }

    #[test]
    fn test_greedy_compares_against_seed_only() {
        // A、B 相距约 40 米，B、C 约 40 米，A、C 约 80 米
        let a = nearby(1, HazardType::Accident, 2, 0.0, 0);
        let b = nearby(2, HazardType::Accident, 2, 0.00036, 0);
        let c = nearby(3, HazardType::Accident, 2, 0.00072, 0);

        let result = HazardDeduplicator::new().deduplicate(&[a, b, c]);
        // {A, B} 和 {C}
        assert_eq!(ids(&result), vec![1, 3]);
    }

    #[test]
    fn test_greedy_result_depends_on_order() {
        let a = nearby(1, HazardType::Accident, 2, 0.0, 0);
        let b = nearby(2, HazardType::Accident, 2, 0.00036, 0);
        let c = nearby(3, HazardType::Accident, 2, 0.00072, 0);

        // B 作为种子时，A 和 C 都在 50 米内
        let result = HazardDeduplicator::new().deduplicate(&[b, a, c]);
        assert_eq!(ids(&result), vec![2]);
    }

    #[test]
    fn test_transitive_mode_chains_members() {
        let a = nearby(1, HazardType::Accident, 2, 0.0, 0);
        let b = nearby(2, HazardType::Accident, 2, 0.00036, 0);
        let c = nearby(3, HazardType::Accident, 5, 0.00072, 0);

        let result = HazardDeduplicator::new()
            .with_mode(ClusterMode::Transitive)
            .deduplicate(&[a, b, c]);
        assert_eq!(ids(&result), vec![3]);
    }

    #[test]
    fn test_far_apart_same_type_kept() {
        let a = nearby(1, HazardType::BadRoad, 3, 0.0, 0);
        let b = nearby(2, HazardType::BadRoad, 3, 0.001, 0); // 约 111 米

        let result = HazardDeduplicator::new().deduplicate(&[a, b]);
        assert_eq!(ids(&result), vec![1, 2]);
    }

    #[test]
    fn test_output_groups_types_in_first_seen_order() {
        let a = nearby(1, HazardType::BadRoad, 3, 0.0, 0);
        let b = nearby(2, HazardType::Accident, 3, 0.0002, 0);
        let c = nearby(3, HazardType::BadRoad, 3, 0.002, 0);

        let result = HazardDeduplicator::new().deduplicate(&[a, b, c]);
        assert_eq!(ids(&result), vec![1, 3, 2]);
    }

    #[test]
    fn test_custom_radius() {
        let a = nearby(1, HazardType::Accident, 2, 0.0, 0);
        let b = nearby(2, HazardType::Accident, 4, 0.00036, 0); // 约 40 米

        let result = HazardDeduplicator::new().with_radius(30.0).deduplicate(&[a, b]);
        assert_eq!(ids(&result), vec![1, 2]);
    }

    #[test]
    fn test_empty_input() {
        assert!(HazardDeduplicator::new().deduplicate(&[]).is_empty());
    }
}
