use super::ProductMatcher;
use crate::config::MatcherSettings;
use crate::error::Result;
use crate::index::BuildReport;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// 照合エンジンの遅延構築キャッシュ
///
/// 初回アクセス時に構築し、以降は同じ `Arc` を返す。
/// `invalidate` 後の次のアクセスで作り直す。
#[derive(Debug)]
pub struct MatcherCache {
    settings: MatcherSettings,
    state: Mutex<Option<Cached>>,
}

#[derive(Debug)]
struct Cached {
    matcher: Arc<ProductMatcher>,
    report: Arc<BuildReport>,
}

impl MatcherCache {
    pub fn new(settings: MatcherSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(None),
        }
    }

    /// 構築済みの照合エンジンを返す（未構築なら構築）
    ///
    /// 構築中は他の呼び出しを待たせるため、構築は一度しか走らない。
    pub fn get(&self) -> Result<Arc<ProductMatcher>> {
        let mut state = self.lock();
        if let Some(cached) = state.as_ref() {
            return Ok(Arc::clone(&cached.matcher));
        }

        info!("照合エンジンを構築します");
        let (matcher, report) = ProductMatcher::build(self.settings.clone())?;
        let matcher = Arc::new(matcher);
        *state = Some(Cached {
            matcher: Arc::clone(&matcher),
            report: Arc::new(report),
        });
        Ok(matcher)
    }

    /// 直近の構築レポート（未構築なら `None`）
    pub fn report(&self) -> Option<Arc<BuildReport>> {
        self.lock().as_ref().map(|c| Arc::clone(&c.report))
    }

    pub fn is_built(&self) -> bool {
        self.lock().is_some()
    }

    /// キャッシュを破棄（取得済みの `Arc` はそのまま使える）
    pub fn invalidate(&self) {
        if self.lock().take().is_some() {
            info!("照合エンジンのキャッシュを破棄しました");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Cached>> {
        // 構築中のパニックで毒化しても状態は None か構築済みのどちらか
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_builds_once_and_invalidates() {
        let temp = TempDir::new().unwrap();
        let settings = MatcherSettings {
            reference_images_dir: temp.path().join("images"),
            catalog_csv_path: temp.path().join("catalog.csv"),
            ..Default::default()
        };
        let cache = MatcherCache::new(settings);
        assert!(!cache.is_built());
        assert!(cache.report().is_none());

        let first = cache.get().unwrap();
        let second = cache.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.index().is_empty());
        assert!(cache.report().unwrap().catalog_issue.is_some());

        cache.invalidate();
        assert!(!cache.is_built());
        let third = cache.get().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }
}
