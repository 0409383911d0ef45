//! 统一环境变量加载逻辑
//!
//! 集中维护 fallback 链，避免在业务代码中重复 `or_else` 调用。

use std::env;
use std::path::Path;
use std::str::FromStr;

/// 加载当前目录下的 `.env` 到环境变量（不覆盖已存在的变量）
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let dir = env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
        load_dotenv_from_dir(&dir);
    });
}

/// 从指定目录加载 `.env`（不覆盖已存在的变量）。返回写入的变量个数。
pub fn load_dotenv_from_dir(dir: &Path) -> usize {
    let Ok(content) = std::fs::read_to_string(dir.join(".env")) else {
        return 0;
    };
    let mut applied = 0;
    for (key, value) in parse_dotenv(&content) {
        if env::var(&key).is_err() {
            set_env_var(&key, &value);
            applied += 1;
        }
    }
    applied
}

fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(eq_pos) = line.find('=') else {
            continue;
        };
        let key = line[..eq_pos].trim();
        let mut value = line[eq_pos + 1..].trim();
        // Strip inline comment (# not inside quotes)
        if let Some(hash_pos) = value.find('#') {
            let before_hash = value[..hash_pos].trim_end();
            if !before_hash.contains('"') && !before_hash.contains('\'') {
                value = before_hash;
            }
        }
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        if !key.is_empty() {
            pairs.push((key.to_string(), value.to_string()));
        }
    }
    pairs
}

/// 从主变量或别名链读取环境变量，失败时使用默认值
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default)
}

/// 从主变量或别名链读取，返回 Option（空值视为未设置）
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// 解析布尔型环境变量：0/false/no/off 为 false，其余为 true
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    let v = env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()));
    match v.as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

/// 解析数值型环境变量；无法解析时记录警告并使用默认值
pub fn env_parse<T: FromStr>(primary: &str, default: T) -> T {
    match env_optional(primary, &[]) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable {}='{}', using default", primary, raw);
            default
        }),
        None => default,
    }
}

/// 设置单个环境变量（集中在此处）
#[allow(unsafe_code, unused_unsafe)]
pub fn set_env_var(key: &str, value: &str) {
    unsafe { env::set_var(key, value) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotenv_quotes_and_comments() {
        let pairs = parse_dotenv(
            "# comment\nPOISCOUT_A=1\nPOISCOUT_B=\"quoted value\"\nPOISCOUT_C=x # trailing\nbroken line\n",
        );
        assert_eq!(
            pairs,
            vec![
                ("POISCOUT_A".to_string(), "1".to_string()),
                ("POISCOUT_B".to_string(), "quoted value".to_string()),
                ("POISCOUT_C".to_string(), "x".to_string()),
            ]
        );
    }

    #[test]
    fn test_load_dotenv_does_not_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".env"),
            "POISCOUT_TEST_DOTENV_NEW=fresh\nPOISCOUT_TEST_DOTENV_SET=from_file\n",
        )
        .unwrap();
        set_env_var("POISCOUT_TEST_DOTENV_SET", "from_env");
        let applied = load_dotenv_from_dir(dir.path());
        assert_eq!(applied, 1);
        assert_eq!(env::var("POISCOUT_TEST_DOTENV_NEW").unwrap(), "fresh");
        assert_eq!(env::var("POISCOUT_TEST_DOTENV_SET").unwrap(), "from_env");
    }

    #[test]
    fn test_env_parse_falls_back() {
        set_env_var("POISCOUT_TEST_PARSE_BAD", "not-a-number");
        set_env_var("POISCOUT_TEST_PARSE_OK", "7");
        assert_eq!(env_parse("POISCOUT_TEST_PARSE_BAD", 3u32), 3);
        assert_eq!(env_parse("POISCOUT_TEST_PARSE_OK", 3u32), 7);
        assert_eq!(env_parse("POISCOUT_TEST_PARSE_UNSET", 0.5f64), 0.5);
    }
}
