//! Storage key generation
//!
//! Priority: registered hook, owner record folder path, dated default path.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, warn};

use super::sanitize::sanitize_file_name;
use crate::core::config::S3Settings;
use crate::features::files::repositories::FileRepository;
use crate::shared::constants::KEY_TOKEN_LENGTH;

/// Inputs handed to a key generator hook
#[derive(Debug, Clone, Copy)]
pub struct KeyRequest<'a> {
    pub file_name: &'a str,
    pub owner_type: Option<&'a str>,
    pub owner_id: Option<&'a str>,
}

/// Site-supplied key override. `Ok(None)` or an empty string means "no override".
pub type KeyHook = Arc<dyn Fn(&KeyRequest<'_>) -> anyhow::Result<Option<String>> + Send + Sync>;

/// Named key generator hooks, selected with `S3_KEY_GENERATOR_HOOK`
pub struct KeyHookRegistry {
    hooks: HashMap<String, KeyHook>,
}

impl KeyHookRegistry {
    pub fn empty() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }

    /// Registry with the built-in hooks
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("owner_scoped", Arc::new(owner_scoped_key));
        registry
    }

    pub fn register(&mut self, name: &str, hook: KeyHook) {
        self.hooks.insert(name.to_string(), hook);
    }

    pub fn get(&self, name: &str) -> Option<KeyHook> {
        self.hooks.get(name).cloned()
    }
}

/// `{owner_type}/{owner_id}/{token}_{name}`; defers when the owner is unknown
fn owner_scoped_key(request: &KeyRequest<'_>) -> anyhow::Result<Option<String>> {
    match (request.owner_type, request.owner_id) {
        (Some(owner_type), Some(owner_id)) if !owner_type.is_empty() && !owner_id.is_empty() => {
            Ok(Some(format!(
                "{}/{}/{}",
                owner_type,
                owner_id,
                prefixed_name(request.file_name)
            )))
        }
        _ => Ok(None),
    }
}

/// Random alphanumeric token from the thread-local CSPRNG
pub fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// `{token}_{sanitized display name}`
pub fn prefixed_name(display_name: &str) -> String {
    format!("{}_{}", random_token(), sanitize_file_name(display_name))
}

/// Run a fallible producer; any error or panic becomes `None`.
pub fn fail_soft<T>(label: &str, f: impl FnOnce() -> anyhow::Result<Option<T>>) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            debug!("{} failed, falling back: {:#}", label, e);
            None
        }
        Err(_) => {
            debug!("{} panicked, falling back", label);
            None
        }
    }
}

/// Join path segments with `/`, trimming slashes and skipping empty segments
fn join_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    segments
        .into_iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

pub struct KeyGenerator {
    repo: Arc<dyn FileRepository>,
    folder_name: String,
    hook: Option<KeyHook>,
}

impl KeyGenerator {
    pub fn new(
        repo: Arc<dyn FileRepository>,
        settings: &S3Settings,
        registry: &KeyHookRegistry,
    ) -> Self {
        let hook = settings.key_generator_hook.as_deref().and_then(|name| {
            let hook = registry.get(name);
            if hook.is_none() {
                warn!("Unknown key generator hook '{}', using default keys", name);
            }
            hook
        });

        Self {
            repo,
            folder_name: settings.folder_name.clone(),
            hook,
        }
    }

    #[cfg(test)]
    pub fn with_hook(mut self, hook: KeyHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Key for a new upload. Never fails; every override failure falls back.
    pub async fn generate_key(
        &self,
        display_name: &str,
        owner_type: Option<&str>,
        owner_id: Option<&str>,
    ) -> String {
        self.generate_key_at(display_name, owner_type, owner_id, Utc::now())
            .await
    }

    pub(crate) async fn generate_key_at(
        &self,
        display_name: &str,
        owner_type: Option<&str>,
        owner_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> String {
        if let Some(hook) = &self.hook {
            let request = KeyRequest {
                file_name: display_name,
                owner_type,
                owner_id,
            };
            let key = fail_soft("Key generator hook", || (**hook)(&request))
                .map(|k| k.trim_matches('/').to_string())
                .filter(|k| !k.is_empty());
            if let Some(key) = key {
                return key;
            }
        }

        let file_name = prefixed_name(display_name);

        if let Some(folder) = self.owner_folder_path(owner_type, owner_id).await {
            return join_segments([folder.as_str(), file_name.as_str()]);
        }

        let date_path = now.format("%Y/%m/%d").to_string();
        join_segments([
            self.folder_name.as_str(),
            date_path.as_str(),
            owner_type.unwrap_or(""),
            file_name.as_str(),
        ])
    }

    /// Folder override from the owning record; lookup failures count as "none"
    async fn owner_folder_path(
        &self,
        owner_type: Option<&str>,
        owner_id: Option<&str>,
    ) -> Option<String> {
        let (owner_type, owner_id) = match (owner_type, owner_id) {
            (Some(t), Some(id)) if !t.is_empty() && !id.is_empty() => (t, id),
            _ => return None,
        };

        match self.repo.owner_folder_path(owner_type, owner_id).await {
            Ok(Some(path)) if !path.trim_matches('/').is_empty() => {
                Some(path.trim_matches('/').to_string())
            }
            Ok(_) => None,
            Err(e) => {
                debug!(
                    "No folder path for {} {} ({}), using default key",
                    owner_type, owner_id, e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::files::test_support::InMemoryFileRepository;
    use chrono::TimeZone;
    use regex::Regex;

    fn generator(repo: Arc<InMemoryFileRepository>, folder_name: &str) -> KeyGenerator {
        let settings = S3Settings {
            folder_name: folder_name.to_string(),
            ..S3Settings::default()
        };
        KeyGenerator::new(repo, &settings, &KeyHookRegistry::empty())
    }

    fn march_fifth() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn test_default_key_layout() {
        let repo = Arc::new(InMemoryFileRepository::default());
        let keys = generator(repo, "attachments");

        let key = keys
            .generate_key_at("Bérícht ß.pdf", Some("Invoice"), Some("INV-1"), march_fifth())
            .await;

        let pattern =
            Regex::new(r"^attachments/2024/03/05/Invoice/[A-Za-z0-9]{8}_Bericht_ss\.pdf$").unwrap();
        assert!(pattern.is_match(&key), "unexpected key {}", key);
    }

    #[tokio::test]
    async fn test_default_key_skips_empty_segments() {
        let repo = Arc::new(InMemoryFileRepository::default());
        let keys = generator(repo, "");

        let key = keys
            .generate_key_at("notes.txt", None, None, march_fifth())
            .await;

        assert!(key.starts_with("2024/03/05/"), "unexpected key {}", key);
        assert!(!key.starts_with('/'));
        assert!(key.ends_with("_notes.txt"));
    }

    #[tokio::test]
    async fn test_owner_folder_path_wins_over_default() {
        let repo = Arc::new(InMemoryFileRepository::default());
        repo.set_owner_folder("Invoice", "INV-1", "/customers/acme/");
        let keys = generator(repo, "attachments");

        let key = keys
            .generate_key("scan.png", Some("Invoice"), Some("INV-1"))
            .await;

        assert!(key.starts_with("customers/acme/"), "unexpected key {}", key);
        assert!(key.ends_with("_scan.png"));
    }

    #[tokio::test]
    async fn test_folder_lookup_failure_falls_back() {
        let repo = Arc::new(InMemoryFileRepository::default());
        repo.fail_owner_lookups();
        let keys = generator(repo, "attachments");

        let key = keys
            .generate_key_at("scan.png", Some("Invoice"), Some("INV-1"), march_fifth())
            .await;

        assert!(key.starts_with("attachments/2024/03/05/Invoice/"));
    }

    #[tokio::test]
    async fn test_hook_result_is_trimmed() {
        let repo = Arc::new(InMemoryFileRepository::default());
        let hook: KeyHook = Arc::new(|req: &KeyRequest<'_>| -> anyhow::Result<Option<String>> {
            Ok(Some(format!("/custom/{}/", req.file_name)))
        });
        let keys = generator(repo, "attachments").with_hook(hook);

        let key = keys.generate_key("a.pdf", None, None).await;

        assert_eq!(key, "custom/a.pdf");
    }

    #[tokio::test]
    async fn test_failing_hooks_fall_through() {
        let repo = Arc::new(InMemoryFileRepository::default());

        let hook: KeyHook = Arc::new(|_: &KeyRequest<'_>| -> anyhow::Result<Option<String>> {
            Err(anyhow::anyhow!("hook exploded"))
        });
        let erroring = generator(repo.clone(), "attachments").with_hook(hook);
        let key = erroring
            .generate_key_at("a.pdf", Some("Invoice"), None, march_fifth())
            .await;
        assert!(key.starts_with("attachments/2024/03/05/Invoice/"));

        let hook: KeyHook = Arc::new(|_: &KeyRequest<'_>| -> anyhow::Result<Option<String>> {
            panic!("hook panicked")
        });
        let panicking = generator(repo.clone(), "attachments").with_hook(hook);
        let key = panicking
            .generate_key_at("a.pdf", Some("Invoice"), None, march_fifth())
            .await;
        assert!(key.starts_with("attachments/2024/03/05/Invoice/"));

        let hook: KeyHook = Arc::new(|_: &KeyRequest<'_>| -> anyhow::Result<Option<String>> {
            Ok(Some("//".to_string()))
        });
        let empty = generator(repo, "attachments").with_hook(hook);
        let key = empty
            .generate_key_at("a.pdf", Some("Invoice"), None, march_fifth())
            .await;
        assert!(key.starts_with("attachments/2024/03/05/Invoice/"));
    }

    #[tokio::test]
    async fn test_named_hook_from_settings() {
        let repo = Arc::new(InMemoryFileRepository::default());
        let settings = S3Settings {
            key_generator_hook: Some("owner_scoped".to_string()),
            ..S3Settings::default()
        };
        let keys = KeyGenerator::new(repo, &settings, &KeyHookRegistry::with_builtins());

        let key = keys
            .generate_key("a b.pdf", Some("Invoice"), Some("INV-7"))
            .await;

        assert!(key.starts_with("Invoice/INV-7/"), "unexpected key {}", key);
        assert!(key.ends_with("_a_b.pdf"));
    }

    #[tokio::test]
    async fn test_identical_inputs_yield_distinct_keys() {
        let repo = Arc::new(InMemoryFileRepository::default());
        let keys = generator(repo, "attachments");

        let first = keys.generate_key("same.pdf", Some("Invoice"), None).await;
        let second = keys.generate_key("same.pdf", Some("Invoice"), None).await;

        assert_ne!(first, second);
    }

    #[test]
    fn test_random_token_shape() {
        let token = random_token();
        assert_eq!(token.len(), KEY_TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
