use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub fn display_name(id: &str) -> &str {
    let stem = id.rsplit_once('/').map(|(_, rest)| rest).unwrap_or(id);
    stem.rsplit_once('.').map(|(name, _)| name).unwrap_or(stem)
}

pub fn stable_pair(id: &str) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}
