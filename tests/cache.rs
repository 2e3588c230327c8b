use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rs_ali_sts_cache::{
    AssumeRoleRequest, Clock, CredentialCache, CredentialSource, Credentials, Result, StsError,
    default_key,
};

const T0: i64 = 1_700_000_000;

#[derive(Clone)]
struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    fn at(secs: i64) -> Self {
        Self(Arc::new(AtomicI64::new(secs)))
    }

    fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }

    fn now_secs(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.now_secs(), 0).unwrap()
    }
}

/// Source stub that issues credentials valid for `ttl` seconds from the
/// clock's current time, and can be switched to failing.
struct StubSource {
    clock: ManualClock,
    ttl: i64,
    calls: AtomicUsize,
    failing: Mutex<bool>,
}

impl StubSource {
    fn new(clock: ManualClock, ttl: i64) -> Self {
        Self {
            clock,
            ttl,
            calls: AtomicUsize::new(0),
            failing: Mutex::new(false),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

impl CredentialSource for StubSource {
    fn fetch(&self, request: &AssumeRoleRequest) -> Result<Credentials> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.failing.lock().unwrap() {
            return Err(StsError::Api {
                status: 403,
                request_id: "req-denied".into(),
                host_id: "sts.aliyuncs.com".into(),
                code: "Forbidden.NoPermission".into(),
                message: "not allowed".into(),
                recommend: None,
            });
        }
        Ok(Credentials {
            access_key_id: format!("STS.{}.{}", request.role_session_name, n),
            access_key_secret: format!("secret-{}", n),
            security_token: Some(format!("token-{}", n)),
            expiration: Utc.timestamp_opt(self.clock.now_secs() + self.ttl, 0).unwrap(),
        })
    }
}

fn r1() -> AssumeRoleRequest {
    AssumeRoleRequest::for_role("123456789012", "uploader", "r1").with_duration_seconds(3600)
}

fn creds_expiring_at(secs: i64) -> Credentials {
    Credentials {
        access_key_id: "STS.PRELOADED".into(),
        access_key_secret: "preloaded".into(),
        security_token: None,
        expiration: Utc.timestamp_opt(secs, 0).unwrap(),
    }
}

#[test]
fn miss_then_hit_then_stale_refresh() {
    let clock = ManualClock::at(T0);
    let cache = CredentialCache::new(StubSource::new(clock.clone(), 3600)).with_clock(clock.clone());
    let window = Duration::from_secs(1800);

    let first = cache.get(&r1(), window).unwrap();
    assert_eq!(cache.source().calls(), 1);
    assert_eq!(first.expiration, Utc.timestamp_opt(T0 + 3600, 0).unwrap());

    let second = cache.get(&r1(), window).unwrap();
    assert_eq!(cache.source().calls(), 1);
    assert_eq!(first, second);

    // 600s left is less than the 1800s window.
    clock.advance(3000);
    let third = cache.get(&r1(), window).unwrap();
    assert_eq!(cache.source().calls(), 2);
    assert_ne!(third, first);
    assert_eq!(cache.cached(&r1()), Some(third));
}

#[test]
fn hit_never_calls_source() {
    let clock = ManualClock::at(T0);
    let preloaded = creds_expiring_at(T0 + 3600);
    let served = AtomicUsize::new(0);
    let source = |_: &AssumeRoleRequest| -> Result<Credentials> {
        // The first call populates the cache; any later one is a bug.
        assert_eq!(served.fetch_add(1, Ordering::SeqCst), 0, "source called on a hit");
        Ok(creds_expiring_at(T0 + 3600))
    };
    let cache = CredentialCache::new(source).with_clock(clock.clone());
    cache.get(&r1(), Duration::ZERO).unwrap();

    for window in [0, 1, 1800, 3599] {
        let got = cache.get(&r1(), Duration::from_secs(window)).unwrap();
        assert_eq!(got, preloaded);
    }
    assert_eq!(served.load(Ordering::SeqCst), 1);
}

#[test]
fn miss_calls_source_once_and_stores() {
    let clock = ManualClock::at(T0);
    let cache = CredentialCache::new(StubSource::new(clock.clone(), 3600)).with_clock(clock);
    assert!(cache.is_empty());

    let got = cache.get(&r1(), Duration::from_secs(60)).unwrap();
    assert_eq!(cache.source().calls(), 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.cached(&r1()), Some(got));
}

#[test]
fn expired_entry_is_refreshed_with_zero_window() {
    let clock = ManualClock::at(T0);
    let calls = AtomicUsize::new(0);
    let source = |_: &AssumeRoleRequest| -> Result<Credentials> {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        // First fetch is already expired by one second.
        let expires = if n == 0 { T0 - 1 } else { T0 + 3600 };
        Ok(creds_expiring_at(expires))
    };
    let cache = CredentialCache::new(source).with_clock(clock);

    let stale = cache.get(&r1(), Duration::ZERO).unwrap();
    assert_eq!(stale.expiration, Utc.timestamp_opt(T0 - 1, 0).unwrap());

    let fresh = cache.get(&r1(), Duration::ZERO).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(fresh.expiration, Utc.timestamp_opt(T0 + 3600, 0).unwrap());
}

#[test]
fn failed_refresh_keeps_stale_entry() {
    let clock = ManualClock::at(T0);
    let cache = CredentialCache::new(StubSource::new(clock.clone(), 60)).with_clock(clock.clone());

    let original = cache.get(&r1(), Duration::ZERO).unwrap();
    clock.advance(120);

    cache.source().set_failing(true);
    let err = cache.get(&r1(), Duration::ZERO).unwrap_err();
    assert_eq!(err.error_code(), Some("Forbidden.NoPermission"));
    assert_eq!(err.request_id(), Some("req-denied"));
    assert_eq!(cache.cached(&r1()), Some(original.clone()));

    cache.source().set_failing(false);
    let recovered = cache.get(&r1(), Duration::ZERO).unwrap();
    assert_ne!(recovered, original);
    assert_eq!(cache.cached(&r1()), Some(recovered));
    assert_eq!(cache.source().calls(), 3);
}

#[test]
fn failed_first_fetch_stores_nothing() {
    let clock = ManualClock::at(T0);
    let source = StubSource::new(clock.clone(), 3600);
    source.set_failing(true);
    let cache = CredentialCache::new(source).with_clock(clock);

    assert!(cache.get(&r1(), Duration::ZERO).is_err());
    assert!(cache.is_empty());
    assert!(cache.cached(&r1()).is_none());
}

#[test]
fn key_derivation_is_deterministic_and_field_sensitive() {
    let base = AssumeRoleRequest::new("acs:ram::123456789012:role/a", "s").with_policy("p");
    assert_eq!(default_key(&base), default_key(&base.clone()));

    let other_role = AssumeRoleRequest::new("acs:ram::123456789012:role/b", "s").with_policy("p");
    let other_session = AssumeRoleRequest::new("acs:ram::123456789012:role/a", "t").with_policy("p");
    let other_policy = AssumeRoleRequest::new("acs:ram::123456789012:role/a", "s").with_policy("q");
    for other in [&other_role, &other_session, &other_policy] {
        assert_ne!(default_key(&base), default_key(other));
    }
}

#[test]
fn equal_requests_share_a_slot() {
    let clock = ManualClock::at(T0);
    let cache = CredentialCache::new(StubSource::new(clock.clone(), 3600)).with_clock(clock);

    let a = cache.get(&r1(), Duration::ZERO).unwrap();
    let b = cache.get(&r1(), Duration::ZERO).unwrap();
    let c = cache
        .get(
            &AssumeRoleRequest::for_role("123456789012", "uploader", "r2"),
            Duration::ZERO,
        )
        .unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.source().calls(), 2);
}

#[test]
fn tenant_partitioned_key_fn() {
    let clock = ManualClock::at(T0);
    let cache = CredentialCache::new(StubSource::new(clock.clone(), 3600))
        .with_clock(clock)
        .with_key_fn(|req: &AssumeRoleRequest| {
            let tenant = req.external_id.as_deref().unwrap_or("none");
            format!("{}|{}", tenant, default_key(req))
        });

    cache.get(&r1().with_external_id("tenant-a"), Duration::ZERO).unwrap();
    cache.get(&r1().with_external_id("tenant-b"), Duration::ZERO).unwrap();
    cache.get(&r1().with_external_id("tenant-a"), Duration::ZERO).unwrap();

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.source().calls(), 2);
}

#[test]
fn concurrent_readers_and_refreshers() {
    let clock = ManualClock::at(T0);
    let source = |req: &AssumeRoleRequest| -> Result<Credentials> {
        thread::sleep(Duration::from_millis(20));
        Ok(Credentials {
            access_key_id: format!("STS.{}", req.role_session_name),
            access_key_secret: "secret".into(),
            security_token: Some("token".into()),
            expiration: Utc.timestamp_opt(T0 + 3600, 0).unwrap(),
        })
    };
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = {
        let calls = Arc::clone(&calls);
        move |req: &AssumeRoleRequest| -> Result<Credentials> {
            calls.fetch_add(1, Ordering::SeqCst);
            source(req)
        }
    };
    let cache = Arc::new(CredentialCache::new(counted).with_clock(clock));

    let sessions = ["a", "b", "c", "d"];
    thread::scope(|scope| {
        for i in 0..32 {
            let cache = Arc::clone(&cache);
            let session = sessions[i % sessions.len()];
            scope.spawn(move || {
                let req = AssumeRoleRequest::for_role("123456789012", "worker", session);
                let creds = cache.get(&req, Duration::from_secs(60)).unwrap();
                assert_eq!(creds.access_key_id, format!("STS.{}", session));
            });
        }
    });

    // Racing misses may duplicate fetches, but never beyond one per caller.
    let after_race = calls.load(Ordering::SeqCst);
    assert!(after_race >= sessions.len());
    assert!(after_race <= 32);
    assert_eq!(cache.len(), sessions.len());

    for session in sessions {
        let req = AssumeRoleRequest::for_role("123456789012", "worker", session);
        cache.get(&req, Duration::from_secs(60)).unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), after_race);
}

#[test]
fn caches_can_be_stacked() {
    let clock = ManualClock::at(T0);
    let inner = CredentialCache::new(StubSource::new(clock.clone(), 3600)).with_clock(clock.clone());
    let outer = CredentialCache::new(inner).with_clock(clock.clone());

    outer.get(&r1(), Duration::from_secs(1800)).unwrap();
    clock.advance(3000);
    // The outer window rejects the entry; the inner cache still serves it.
    let refreshed = outer.get(&r1(), Duration::from_secs(1800)).unwrap();

    assert_eq!(outer.source().source().calls(), 1);
    assert_eq!(refreshed.expiration, Utc.timestamp_opt(T0 + 3600, 0).unwrap());
}

/// Source that inspects the cache it feeds from inside `fetch`.
struct ReentrantSource {
    cache: OnceLock<Weak<CredentialCache<ReentrantSource>>>,
    clock: ManualClock,
    seen: Mutex<Vec<(usize, Option<Credentials>)>>,
}

impl CredentialSource for ReentrantSource {
    fn fetch(&self, request: &AssumeRoleRequest) -> Result<Credentials> {
        let cache = self
            .cache
            .get()
            .and_then(Weak::upgrade)
            .expect("cache outlives its source");
        // Both calls take the read lock; they would block if `get` held a lock here.
        let seen = (cache.len(), cache.cached(request));
        self.seen.lock().unwrap().push(seen);
        Ok(creds_expiring_at(self.clock.now_secs() + 60))
    }
}

#[test]
fn source_can_read_cache_during_fetch() {
    let clock = ManualClock::at(T0);
    let source = ReentrantSource {
        cache: OnceLock::new(),
        clock: clock.clone(),
        seen: Mutex::new(Vec::new()),
    };
    let cache = Arc::new(CredentialCache::new(source).with_clock(clock.clone()));
    assert!(cache.source().cache.set(Arc::downgrade(&cache)).is_ok());

    let first = cache.get(&r1(), Duration::ZERO).unwrap();
    clock.advance(120);
    let second = cache.get(&r1(), Duration::ZERO).unwrap();

    let seen = cache.source().seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], (0, None));
    // The refresh sees the stale entry it is about to replace.
    assert_eq!(seen[1], (1, Some(first)));
    assert_eq!(cache.cached(&r1()), Some(second));
}
