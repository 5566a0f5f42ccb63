//! Bounded LRU cache for per-variable geometry.
//!
//! Grid and level-set information is derived from a variable's axes and is
//! needed by both the find and the insert step of a resolver. The cache keeps
//! the most recently derived values keyed by file identity and variable name.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::RwLock;

use meta_common::{
    cell_avg_area_sq_km, is_regular_series, mean_step, proj4_to_wkt, MetaError, DEFAULT_PROJ4,
};
use nc_describe::{CoordinateAxis, DescribedFile, GridAxes, SamplingGeometry};

use crate::error::{CatalogError, Result};

/// Default number of variables whose geometry is kept.
pub const DEFAULT_CACHE_SIZE: usize = 4;

/// Values that identify and describe a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridInfo {
    pub xc_origin: f64,
    pub yc_origin: f64,
    pub xc_grid_step: f64,
    pub yc_grid_step: f64,
    pub xc_count: i64,
    pub yc_count: i64,
    pub xc_units: String,
    pub yc_units: String,
    pub evenly_spaced_y: bool,
    pub cell_avg_area_sq_km: Option<f64>,
    pub proj4: String,
    pub srtext: String,
    /// `(bottom, centre, top)` per row of the Y axis.
    pub y_bounds: Vec<(f64, f64, f64)>,
}

impl GridInfo {
    pub fn from_axes(grid: &GridAxes, relative_tolerance: f64) -> Result<Self> {
        let x = &grid.x.values;
        let y = &grid.y.values;
        let (Some(&xc_origin), Some(&yc_origin)) = (x.first(), y.first()) else {
            let axis = if x.is_empty() { "x" } else { "y" };
            return Err(MetaError::EmptyAxis(axis.to_string()).into());
        };

        let proj4 = grid.proj4.clone().unwrap_or_else(|| DEFAULT_PROJ4.to_string());
        let srtext = proj4_to_wkt(Some(&proj4))?;

        Ok(Self {
            xc_origin,
            yc_origin,
            xc_grid_step: mean_step(x),
            yc_grid_step: mean_step(y),
            xc_count: x.len() as i64,
            yc_count: y.len() as i64,
            xc_units: grid.x.units.clone(),
            yc_units: grid.y.units.clone(),
            evenly_spaced_y: is_regular_series(y, relative_tolerance),
            cell_avg_area_sq_km: cell_avg_area_sq_km(x, &grid.x.units, y, &grid.y.units),
            proj4,
            srtext,
            y_bounds: grid.y.bounds_and_values(),
        })
    }
}

/// Values that identify and describe a vertical level set.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSetInfo {
    pub units: String,
    /// `(start, level, end)` per level, in file order.
    pub levels: Vec<(f64, f64, f64)>,
}

impl LevelSetInfo {
    pub fn from_axis(axis: &CoordinateAxis) -> Self {
        Self {
            units: axis.units.clone(),
            levels: axis.bounds_and_values(),
        }
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.levels.iter().map(|(_, level, _)| *level)
    }
}

/// Derived geometry of one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableGeometryInfo {
    pub grid: Option<GridInfo>,
    pub levels: Option<LevelSetInfo>,
}

/// Cache key: (unique id, content hash, variable name).
type GeometryKey = (String, String, String);

/// Statistics for the geometry cache
#[derive(Debug, Default, Clone)]
pub struct GeometryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl GeometryCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

pub struct GeometryCache {
    cache: Arc<RwLock<LruCache<GeometryKey, Arc<VariableGeometryInfo>>>>,
    stats: Arc<RwLock<GeometryCacheStats>>,
    capacity: usize,
    relative_tolerance: f64,
}

impl GeometryCache {
    /// Create a cache holding at most `capacity` variables (minimum 1).
    pub fn new(capacity: usize, relative_tolerance: f64) -> Self {
        let capacity = capacity.max(1);
        let size = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Arc::new(RwLock::new(LruCache::new(size))),
            stats: Arc::new(RwLock::new(GeometryCacheStats::default())),
            capacity,
            relative_tolerance,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn relative_tolerance(&self) -> f64 {
        self.relative_tolerance
    }

    /// Geometry of `var_name` in `file`, derived on a miss.
    pub async fn get(&self, file: &DescribedFile, var_name: &str) -> Result<Arc<VariableGeometryInfo>> {
        let key = (
            file.unique_id.clone(),
            file.content_hash.clone(),
            var_name.to_string(),
        );

        {
            let mut cache = self.cache.write().await;
            if let Some(info) = cache.get(&key) {
                self.stats.write().await.hits += 1;
                return Ok(info.clone());
            }
        }

        let info = Arc::new(self.derive(file, var_name)?);

        let mut cache = self.cache.write().await;
        cache.put(key, info.clone());
        let mut stats = self.stats.write().await;
        stats.misses += 1;
        stats.entries = cache.len();

        Ok(info)
    }

    fn derive(&self, file: &DescribedFile, var_name: &str) -> Result<VariableGeometryInfo> {
        let variable = file
            .variable(var_name)
            .ok_or_else(|| CatalogError::UnknownVariable {
                path: file.path.clone(),
                variable: var_name.to_string(),
            })?;

        Ok(match &variable.geometry {
            SamplingGeometry::Gridded { grid, levels } => VariableGeometryInfo {
                grid: Some(GridInfo::from_axes(grid, self.relative_tolerance)?),
                levels: levels.as_ref().map(LevelSetInfo::from_axis),
            },
            SamplingGeometry::DsgTimeSeries { .. } => VariableGeometryInfo {
                grid: None,
                levels: None,
            },
        })
    }

    pub async fn stats(&self) -> GeometryCacheStats {
        let mut stats = self.stats.read().await.clone();
        stats.entries = self.cache.read().await.len();
        stats
    }

    pub async fn clear(&self) {
        self.cache.write().await.clear();
        let mut stats = self.stats.write().await;
        *stats = GeometryCacheStats::default();
    }
}

impl Default for GeometryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE, meta_common::DEFAULT_RELATIVE_TOLERANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures;

    #[tokio::test]
    async fn test_second_lookup_hits() {
        let cache = GeometryCache::default();
        let file = fixtures::gridded_file("U1", "H1", "/a/f.nc");

        let first = cache.get(&file, "tasmax").await.unwrap();
        let second = cache.get(&file, "tasmax").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_capacity_bounds_entries() {
        let cache = GeometryCache::new(2, 1e-6);
        for i in 0..5 {
            let file = fixtures::gridded_file(&format!("U{i}"), &format!("H{i}"), "/a/f.nc");
            cache.get(&file, "tasmax").await.unwrap();
        }
        assert_eq!(cache.stats().await.entries, 2);
    }

    #[test]
    fn test_unknown_variable() {
        let cache = GeometryCache::default();
        let file = fixtures::gridded_file("U1", "H1", "/a/f.nc");
        let err = tokio_test::block_on(cache.get(&file, "pr")).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownVariable { .. }));
    }

    #[test]
    fn test_grid_info_from_geographic_axes() {
        let file = fixtures::gridded_file("U1", "H1", "/a/f.nc");
        let SamplingGeometry::Gridded { grid, .. } = &file.variables[0].geometry else {
            panic!("fixture is gridded");
        };
        let info = GridInfo::from_axes(grid, 1e-6).unwrap();
        assert_eq!(info.xc_count, grid.x.values.len() as i64);
        assert!(info.evenly_spaced_y);
        assert!(info.srtext.starts_with("GEOGCS"));
        assert!(info.cell_avg_area_sq_km.unwrap() > 0.0);
    }
}
