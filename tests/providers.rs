mod common;

use std::time::Duration;

use rocket::{
    local::asynchronous::Client,
    tokio::{join, task::yield_now, time::sleep},
};
use rocket_pluggable_session::{
    error::SessionError,
    id::generate_id,
    provider::{file::FileProvider, SessionProvider},
};
use test_case::test_case;

use crate::common::{is_server_side, setup_provider};

async fn local_client() -> Client {
    Client::untracked(rocket::build()).await.unwrap()
}

#[cfg_attr(feature = "cookie", test_case("cookie"; "Cookie"))]
#[test_case("memory"; "Memory")]
#[test_case("file"; "File")]
#[rocket::async_test]
async fn test_read_creates_session(provider_name: &str) {
    let (provider, _dir) = setup_provider(provider_name, 3600).await;
    let client = local_client().await;
    let req = client.get("/");

    let id = generate_id(16).unwrap();
    let store = provider.read(&id, req.inner().cookies()).await.unwrap();
    assert_eq!(store.id(), id);
    assert!(store.is_empty(), "New session is empty");
    assert!(provider.exists(&id).await, "Session exists after read");
}

#[cfg_attr(feature = "cookie", test_case("cookie"; "Cookie"))]
#[test_case("memory"; "Memory")]
#[test_case("file"; "File")]
#[rocket::async_test]
async fn test_release_persists_data(provider_name: &str) {
    let (provider, _dir) = setup_provider(provider_name, 3600).await;
    let client = local_client().await;
    let id = generate_id(16).unwrap();

    let req = client.get("/");
    let store = provider.read(&id, req.inner().cookies()).await.unwrap();
    store.set("user", "alice").unwrap();
    store.set("visits", 3).unwrap();
    let data_cookie = provider.release(&store).await.unwrap();
    assert_eq!(data_cookie.is_some(), !is_server_side(provider_name));

    let req = match data_cookie {
        Some(cookie) => client.get("/").cookie(cookie),
        None => client.get("/"),
    };
    let store = provider.read(&id, req.inner().cookies()).await.unwrap();
    assert_eq!(store.get::<String>("user").as_deref(), Some("alice"));
    assert_eq!(store.get::<u32>("visits"), Some(3));
    assert_eq!(store.len(), 2);
}

#[cfg_attr(feature = "cookie", test_case("cookie"; "Cookie"))]
#[test_case("memory"; "Memory")]
#[test_case("file"; "File")]
#[rocket::async_test]
async fn test_regenerate_moves_data(provider_name: &str) {
    let (provider, _dir) = setup_provider(provider_name, 3600).await;
    let client = local_client().await;
    let old_id = generate_id(16).unwrap();
    let new_id = generate_id(16).unwrap();

    let req = client.get("/");
    let store = provider.read(&old_id, req.inner().cookies()).await.unwrap();
    store.set("user", "alice").unwrap();
    let data_cookie = provider.release(&store).await.unwrap();

    let req = match data_cookie {
        Some(cookie) => client.get("/").cookie(cookie),
        None => client.get("/"),
    };
    let store = provider
        .regenerate(&old_id, &new_id, req.inner().cookies())
        .await
        .unwrap();
    assert_eq!(store.id(), new_id);
    assert_eq!(store.get::<String>("user").as_deref(), Some("alice"));
    assert!(provider.exists(&new_id).await);
    if is_server_side(provider_name) {
        assert!(!provider.exists(&old_id).await, "Old session is gone");
    }
}

#[cfg_attr(feature = "cookie", test_case("cookie"; "Cookie"))]
#[test_case("memory"; "Memory")]
#[test_case("file"; "File")]
#[rocket::async_test]
async fn test_regenerate_missing_session(provider_name: &str) {
    let (provider, _dir) = setup_provider(provider_name, 3600).await;
    let client = local_client().await;
    let req = client.get("/");
    let new_id = generate_id(16).unwrap();

    let store = provider
        .regenerate(&generate_id(16).unwrap(), &new_id, req.inner().cookies())
        .await
        .unwrap();
    assert_eq!(store.id(), new_id);
    assert!(store.is_empty());
}

#[cfg_attr(feature = "cookie", test_case("cookie"; "Cookie"))]
#[test_case("memory"; "Memory")]
#[test_case("file"; "File")]
#[rocket::async_test]
async fn test_destroy_twice(provider_name: &str) {
    let (provider, _dir) = setup_provider(provider_name, 3600).await;
    let client = local_client().await;
    let req = client.get("/");
    let jar = req.inner().cookies();
    let id = generate_id(16).unwrap();

    let store = provider.read(&id, jar).await.unwrap();
    store.set("user", "alice").unwrap();
    provider.release(&store).await.unwrap();

    provider.destroy(&id, jar).await.unwrap();
    provider.destroy(&id, jar).await.expect("Destroying twice is fine");
    if is_server_side(provider_name) {
        assert!(!provider.exists(&id).await);
    }

    let store = provider.read(&id, jar).await.unwrap();
    assert!(store.is_empty(), "Destroyed data is gone");
}

#[cfg_attr(feature = "cookie", test_case("cookie", 0; "Cookie"))]
#[test_case("memory", 2; "Memory")]
#[test_case("file", 2; "File")]
#[rocket::async_test]
async fn test_count(provider_name: &str, expected: usize) {
    let (provider, _dir) = setup_provider(provider_name, 3600).await;
    let client = local_client().await;
    let req = client.get("/");
    assert_eq!(provider.count().await.unwrap(), 0);

    for _ in 0..2 {
        let store = provider
            .read(&generate_id(16).unwrap(), req.inner().cookies())
            .await
            .unwrap();
        provider.release(&store).await.unwrap();
    }
    assert_eq!(provider.count().await.unwrap(), expected);
}

#[test_case("memory"; "Memory")]
#[test_case("file"; "File")]
#[rocket::async_test]
async fn test_gc_evicts_expired(provider_name: &str) {
    let (provider, _dir) = setup_provider(provider_name, 1).await;
    let client = local_client().await;
    let req = client.get("/");

    let expired_id = generate_id(16).unwrap();
    let store = provider.read(&expired_id, req.inner().cookies()).await.unwrap();
    provider.release(&store).await.unwrap();
    sleep(Duration::from_secs(2)).await;

    let fresh_id = generate_id(16).unwrap();
    let store = provider.read(&fresh_id, req.inner().cookies()).await.unwrap();
    provider.release(&store).await.unwrap();

    assert!(!provider.exists(&expired_id).await, "Expired before GC runs");
    assert_eq!(provider.gc().await, 1);
    assert_eq!(provider.count().await.unwrap(), 1);
    assert!(provider.exists(&fresh_id).await);
}

#[test_case("memory"; "Memory")]
#[test_case("file"; "File")]
#[rocket::async_test]
async fn test_expired_session_reads_empty(provider_name: &str) {
    let (provider, _dir) = setup_provider(provider_name, 1).await;
    let client = local_client().await;
    let req = client.get("/");
    let id = generate_id(16).unwrap();

    let store = provider.read(&id, req.inner().cookies()).await.unwrap();
    store.set("user", "alice").unwrap();
    provider.release(&store).await.unwrap();
    sleep(Duration::from_secs(2)).await;

    let store = provider.read(&id, req.inner().cookies()).await.unwrap();
    assert!(store.is_empty());
}

#[cfg_attr(feature = "cookie", test_case("cookie"; "Cookie"))]
#[test_case("memory"; "Memory")]
#[test_case("file"; "File")]
#[rocket::async_test]
async fn test_regenerate_expired_session(provider_name: &str) {
    let (provider, _dir) = setup_provider(provider_name, 1).await;
    let client = local_client().await;
    let old_id = generate_id(16).unwrap();
    let new_id = generate_id(16).unwrap();

    let req = client.get("/");
    let store = provider.read(&old_id, req.inner().cookies()).await.unwrap();
    store.set("user", "alice").unwrap();
    let data_cookie = provider.release(&store).await.unwrap();
    sleep(Duration::from_secs(3)).await;

    let req = match data_cookie {
        Some(cookie) => client.get("/").cookie(cookie),
        None => client.get("/"),
    };
    let store = provider
        .regenerate(&old_id, &new_id, req.inner().cookies())
        .await
        .unwrap();
    assert_eq!(store.id(), new_id);
    assert!(store.is_empty(), "Expired data is not carried over");
    if is_server_side(provider_name) {
        assert!(!provider.exists(&old_id).await);
        assert_eq!(provider.count().await.unwrap(), 1);
    }
}

#[rocket::async_test]
async fn test_file_gc_skips_unexpected_entries() {
    let (provider, dir) = setup_provider("file", 1).await;
    let dir = dir.unwrap();
    let client = local_client().await;
    let req = client.get("/");

    let expired_id = generate_id(16).unwrap();
    let store = provider.read(&expired_id, req.inner().cookies()).await.unwrap();
    provider.release(&store).await.unwrap();

    let sub_dir = dir.path().join("abcdef0123");
    std::fs::create_dir(&sub_dir).unwrap();
    let stale_write = dir.path().join(format!("{}.tmp", generate_id(16).unwrap()));
    std::fs::write(&stale_write, b"{}").unwrap();
    let readme = dir.path().join("README");
    std::fs::write(&readme, b"not a session").unwrap();
    sleep(Duration::from_secs(2)).await;

    assert_eq!(provider.gc().await, 1, "Expired session evicted despite other entries");
    assert!(!provider.exists(&expired_id).await);
    assert!(sub_dir.is_dir(), "Directories are left alone");
    assert!(readme.exists());
    assert!(!stale_write.exists(), "Interrupted write is cleaned up");
    assert_eq!(provider.count().await.unwrap(), 0);
}

#[test_case("memory"; "Memory")]
#[test_case("file"; "File")]
#[rocket::async_test]
async fn test_gc_during_traffic(provider_name: &str) {
    let (provider, _dir) = setup_provider(provider_name, 3600).await;
    let client = local_client().await;
    let req = client.get("/");
    let jar = req.inner().cookies();
    let ids: Vec<String> = (0..10).map(|_| generate_id(16).unwrap()).collect();

    let traffic = async {
        for round in 0..5u32 {
            for id in &ids {
                let store = provider.read(id, jar).await.unwrap();
                store.set("round", round).unwrap();
                provider.release(&store).await.unwrap();
            }
        }
    };
    let sweeps = async {
        let mut evicted = 0;
        for _ in 0..20 {
            evicted += provider.gc().await;
            yield_now().await;
        }
        evicted
    };
    let ((), evicted) = join!(traffic, sweeps);

    assert_eq!(evicted, 0, "Active sessions are never evicted");
    assert_eq!(provider.count().await.unwrap(), ids.len());
    for id in &ids {
        let store = provider.read(id, jar).await.unwrap();
        assert_eq!(store.get::<u32>("round"), Some(4));
    }
}

#[test_case("memory"; "Memory")]
#[test_case("file"; "File")]
#[rocket::async_test]
async fn test_concurrent_access_to_one_session(provider_name: &str) {
    let (provider, dir) = setup_provider(provider_name, 3600).await;
    let client = local_client().await;
    let req = client.get("/");
    let jar = req.inner().cookies();
    let id = generate_id(16).unwrap();

    let writer = |name: &'static str| {
        let (provider, id) = (&provider, &id);
        async move {
            for i in 0..20u32 {
                let store = provider.read(id, jar).await.unwrap();
                store.set(name, i).unwrap();
                provider.release(&store).await.unwrap();
            }
        }
    };
    let destroyer = async {
        for _ in 0..20 {
            provider.destroy(&id, jar).await.unwrap();
            yield_now().await;
        }
    };
    let sweeper = async {
        for _ in 0..20 {
            provider.gc().await;
        }
    };
    join!(writer("a"), writer("b"), destroyer, sweeper);

    provider.read(&id, jar).await.expect("Session is still usable");
    if let Some(dir) = dir {
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}

#[rocket::async_test]
async fn test_file_provider_rejects_invalid_ids() {
    let (provider, dir) = setup_provider("file", 3600).await;
    let client = local_client().await;
    let req = client.get("/");

    for id in ["../escape", "ABCDEF", "", "abc/def"] {
        let result = provider.read(id, req.inner().cookies()).await;
        assert!(matches!(result, Err(SessionError::InvalidId)), "{id:?}");
        assert!(!provider.exists(id).await);
        provider.destroy(id, req.inner().cookies()).await.unwrap();
    }
    let files = std::fs::read_dir(dir.unwrap().path()).unwrap().count();
    assert_eq!(files, 0);
}

#[rocket::async_test]
async fn test_file_provider_persists_across_instances() {
    let (provider, dir) = setup_provider("file", 3600).await;
    let client = local_client().await;
    let req = client.get("/");
    let id = generate_id(16).unwrap();

    let store = provider.read(&id, req.inner().cookies()).await.unwrap();
    store.set("user", "alice").unwrap();
    provider.release(&store).await.unwrap();
    drop(provider);

    let dir = dir.unwrap();
    let mut reopened = FileProvider::default();
    reopened
        .init(3600, dir.path().to_str().unwrap())
        .await
        .unwrap();
    let store = reopened.read(&id, req.inner().cookies()).await.unwrap();
    assert_eq!(store.get::<String>("user").as_deref(), Some("alice"));
}
