#![allow(dead_code)]

#[cfg(feature = "cookie")]
use rocket_pluggable_session::provider::cookie::CookieProvider;
use rocket_pluggable_session::provider::{
    file::FileProvider, memory::MemoryProvider, SessionProvider,
};
use tempfile::TempDir;

#[cfg(feature = "cookie")]
pub const COOKIE_PROVIDER_CONFIG: &str = r#"{
    "blockKey": "0123456789abcdef0123456789abcdef",
    "hashKey": "fedcba9876543210fedcba9876543210",
    "securityName": "test_session"
}"#;

/// Initialize one of the built-in providers. The temp directory of the file
/// provider must be kept alive for the duration of the test.
pub async fn setup_provider(name: &str, max_lifetime: u64) -> (Box<dyn SessionProvider>, Option<TempDir>) {
    match name {
        "memory" => {
            let mut provider = MemoryProvider::default();
            provider.init(max_lifetime, "").await.expect("Should init memory provider");
            (Box::new(provider), None)
        }
        "file" => {
            let dir = tempfile::tempdir().expect("Should create temp dir");
            let mut provider = FileProvider::default();
            provider
                .init(max_lifetime, dir.path().to_str().unwrap())
                .await
                .expect("Should init file provider");
            (Box::new(provider), Some(dir))
        }
        #[cfg(feature = "cookie")]
        "cookie" => {
            let mut provider = CookieProvider::default();
            provider
                .init(max_lifetime, COOKIE_PROVIDER_CONFIG)
                .await
                .expect("Should init cookie provider");
            (Box::new(provider), None)
        }
        _ => unimplemented!(),
    }
}

/// Whether the provider keeps sessions on the server
pub fn is_server_side(name: &str) -> bool {
    name != "cookie"
}
