use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// 一次限流判定的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// 固定窗口限流器，按客户端标识计数
///
/// 状态只存在内存里，进程重启后所有计数清零。
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self {
            limit,
            window: Duration::seconds(window_secs as i64),
            windows: DashMap::new(),
        }
    }

    pub fn check(&self, key: &str) -> Verdict {
        self.check_at(key, Utc::now())
    }

    // 时间由调用方传入，测试里可以直接拨动时钟
    fn check_at(&self, key: &str, now: DateTime<Utc>) -> Verdict {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + self.window,
        });

        // 窗口已过期，重新开窗计数
        if now >= entry.reset_at {
            entry.count = 1;
            entry.reset_at = now + self.window;
            return Verdict {
                allowed: true,
                remaining: self.limit.saturating_sub(1),
            };
        }

        if entry.count >= self.limit {
            return Verdict {
                allowed: false,
                remaining: 0,
            };
        }

        entry.count += 1;
        Verdict {
            allowed: true,
            remaining: self.limit - entry.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_within_window() {
        let limiter = RateLimiter::new(3, 60);
        let now = Utc::now();

        // 窗口内恰好允许 limit 次
        for i in 0..3 {
            let verdict = limiter.check_at("1.2.3.4", now);
            assert!(verdict.allowed, "第 {} 次请求应该放行", i + 1);
            assert_eq!(verdict.remaining, 2 - i);
        }

        // 第 limit+1 次必须拒绝
        let verdict = limiter.check_at("1.2.3.4", now);
        assert!(!verdict.allowed);
        assert_eq!(verdict.remaining, 0);
    }

    #[test]
    fn test_window_reset() {
        let limiter = RateLimiter::new(2, 60);
        let now = Utc::now();

        assert!(limiter.check_at("key", now).allowed);
        assert!(limiter.check_at("key", now).allowed);
        assert!(!limiter.check_at("key", now).allowed);

        // 窗口过期后计数重置
        let later = now + Duration::seconds(61);
        let verdict = limiter.check_at("key", later);
        assert!(verdict.allowed);
        assert_eq!(verdict.remaining, 1);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1, 60);
        let now = Utc::now();

        assert!(limiter.check_at("a", now).allowed);
        assert!(!limiter.check_at("a", now).allowed);
        // 另一个 key 不受影响
        assert!(limiter.check_at("b", now).allowed);
    }
}
