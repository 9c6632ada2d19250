// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置设置测试模块
///
/// 测试默认值、显式配置文件覆盖以及派生参数

#[cfg(test)]
mod tests {
    use siteshot::config::settings::Settings;
    use siteshot::domain::models::asset::AssetFormat;
    use std::time::Duration;

    fn write_config(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("override.toml");
        std::fs::write(&path, contents).unwrap();
        let path = path.to_string_lossy().to_string();
        (dir, path)
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::new().unwrap();

        assert_eq!(settings.pipeline.batch_size, 3);
        assert_eq!(settings.pipeline.per_item_retries, 3);
        assert_eq!(settings.pipeline.backoff_base_ms, 2_000);
        assert_eq!(settings.pipeline.inter_batch_delay_ms, 3_000);
        assert!(settings.pipeline.optimize);
        assert_eq!(settings.browser.viewport_width, 1920);
        assert_eq!(settings.browser.viewport_height, 1080);
        assert_eq!(settings.storage.storage_type, "local");
        assert_eq!(settings.storage.public_prefix, "/assets");
        assert_eq!(settings.paths.websites_file, "data/websites.json");
        assert!(!settings.metrics.enabled);
        assert_eq!(settings.variants.favicon.len(), 2);
        assert_eq!(settings.variants.screenshot[0].format, AssetFormat::Webp);
    }

    #[test]
    fn test_explicit_file_overrides_only_given_keys() {
        let (_dir, path) = write_config(
            r#"
[pipeline]
batch_size = 5
backoff_base_ms = 250

[[variants.logo]]
width = 128
height = 128
format = "webp"
"#,
        );
        let settings = Settings::with_file(Some(&path)).unwrap();

        assert_eq!(settings.pipeline.batch_size, 5);
        assert_eq!(settings.pipeline.per_item_retries, 3);

        let batch = settings.pipeline.batch_config();
        assert_eq!(batch.batch_size, 5);
        assert_eq!(batch.backoff_base, Duration::from_millis(250));
        assert_eq!(batch.inter_batch_delay, Duration::from_secs(3));

        assert_eq!(settings.variants.logo.len(), 1);
        assert_eq!(settings.variants.logo[0].format, AssetFormat::Webp);
        assert!(settings.variants.screenshot.is_empty());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(Settings::with_file(Some("/nonexistent/siteshot-config.toml")).is_err());
    }

    #[test]
    fn test_session_options_follow_browser_and_pipeline() {
        let (_dir, path) = write_config(
            r#"
[browser]
viewport_width = 800
viewport_height = 600

[pipeline]
navigation_timeout_ms = 5000
network_idle_ms = 0
"#,
        );
        let settings = Settings::with_file(Some(&path)).unwrap();
        let options = settings.session_options();

        assert_eq!(options.viewport.width, 800);
        assert_eq!(options.viewport.height, 600);
        assert_eq!(options.navigation_timeout, Duration::from_secs(5));
        assert_eq!(options.network_idle, Duration::ZERO);
    }
}
