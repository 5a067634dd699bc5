//! Cache names, key conventions and TTL constants.
//!
//! Keys are `<domain>:<qualifier>` strings (e.g. `detail:42`, `tree:0`). The
//! cache never parses them; these helpers only keep callers consistent.

use std::fmt::Display;

/// Separator between key segments.
pub const KEY_SEPARATOR: &str = ":";

/// Global prefix for keys in the distributed tier.
pub const DEFAULT_KEY_PREFIX: &str = "backend";

/// Logical cache names.
pub mod names {
    pub const USER: &str = "user";
    pub const ROLE: &str = "role";
    pub const PERMISSION: &str = "permission";
    pub const MENU: &str = "menu";
    pub const DICTIONARY: &str = "dictionary";
    pub const CONFIG: &str = "config";

    /// Every name the reference policy table knows about.
    pub const ALL: [&str; 6] = [USER, ROLE, PERMISSION, MENU, DICTIONARY, CONFIG];
}

/// TTL constants in seconds.
pub mod ttl {
    pub const DEFAULT_SECS: u64 = 1800;
    pub const SHORT_SECS: u64 = 300;
    pub const LONG_SECS: u64 = 3600;
    /// Lifetime of an explicitly cached absence.
    pub const NULL_SECS: u64 = 60;
}

/// Join a domain and a qualifier into a cache key.
#[inline]
pub fn cache_key(domain: &str, qualifier: impl Display) -> String {
    format!("{domain}{KEY_SEPARATOR}{qualifier}")
}

/// `detail:<id>` in the `user` cache.
pub fn user_detail(user_id: impl Display) -> String {
    cache_key("detail", user_id)
}

/// `permission:<id>` in the `user` cache.
pub fn user_permissions(user_id: impl Display) -> String {
    cache_key("permission", user_id)
}

/// `role:<id>` in the `user` cache.
pub fn user_roles(user_id: impl Display) -> String {
    cache_key("role", user_id)
}

/// `menu:<id>` in the `user` cache.
pub fn user_menus(user_id: impl Display) -> String {
    cache_key("menu", user_id)
}

/// `permission:<id>` in the `role` cache.
pub fn role_permissions(role_id: impl Display) -> String {
    cache_key("permission", role_id)
}

/// `tree:<root>` in the `menu` or `role` cache.
pub fn tree(root_id: impl Display) -> String {
    cache_key("tree", root_id)
}

/// `item:<code>` in the `dictionary` cache.
pub fn dictionary_item(code: impl Display) -> String {
    cache_key("item", code)
}

/// `system:<key>` in the `config` cache.
pub fn system_config(key: impl Display) -> String {
    cache_key("system", key)
}

/// `feature:<key>` in the `config` cache.
pub fn feature_toggle(key: impl Display) -> String {
    cache_key("feature", key)
}

/// Namespace of a cache in the distributed tier: `<global prefix>:<name>`.
pub fn namespace(global_prefix: &str, cache_name: &str) -> String {
    cache_key(global_prefix, cache_name)
}

/// Characters with special meaning in a Redis `MATCH` pattern.
const GLOB_CHARS: [char; 5] = ['*', '?', '[', ']', '\\'];

/// Check that `name` can be used as a cache name.
///
/// A name becomes one segment of the distributed-tier namespace, so it must
/// not contain the key separator, glob characters or whitespace.
pub fn validate_cache_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("cache name must not be empty".into());
    }
    if name.contains(KEY_SEPARATOR) {
        return Err(format!("cache name '{name}' must not contain '{KEY_SEPARATOR}'"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| GLOB_CHARS.contains(c) || c.is_whitespace())
    {
        return Err(format!("cache name '{name}' must not contain {c:?}"));
    }
    Ok(())
}

/// Escape `text` so a Redis `MATCH` pattern treats it literally.
pub fn escape_glob(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if GLOB_CHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builders() {
        assert_eq!(user_detail(42), "detail:42");
        assert_eq!(tree(0), "tree:0");
        assert_eq!(dictionary_item("gender"), "item:gender");
        assert_eq!(feature_toggle("audit"), "feature:audit");
        assert_eq!(namespace(DEFAULT_KEY_PREFIX, names::USER), "backend:user");
    }

    #[test]
    fn test_cache_name_validation() {
        for name in names::ALL {
            assert!(validate_cache_name(name).is_ok());
        }
        assert!(validate_cache_name("audit_log").is_ok());
        assert!(validate_cache_name("").is_err());
        assert!(validate_cache_name("user:archive").is_err());
        assert!(validate_cache_name("a*").is_err());
        assert!(validate_cache_name("u?er").is_err());
        assert!(validate_cache_name("[ab]").is_err());
        assert!(validate_cache_name("my cache").is_err());
    }

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("backend:user"), "backend:user");
        assert_eq!(escape_glob("a*b?[c]"), r"a\*b\?\[c\]");
        assert_eq!(escape_glob(r"x\y"), r"x\\y");
    }

    #[test]
    fn test_ttl_ordering() {
        assert!(ttl::NULL_SECS < ttl::SHORT_SECS);
        assert!(ttl::SHORT_SECS < ttl::DEFAULT_SECS);
        assert!(ttl::DEFAULT_SECS < ttl::LONG_SECS);
    }
}
