use serial_test::serial;
use std::io::Write;
use tempfile::Builder;
use threadwatch::cli::Cli;
use threadwatch::config::Config;
use threadwatch::filters::FilterSet;

fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

#[test]
#[serial]
fn test_load_full_toml_config() {
    let file = write_config(
        ".toml",
        r#"
        log_level = "debug"
        site_base_url = "https://old.reddit.com"
        [dispatch]
        event_timeout_secs = 30
        rate_limit_cooldown_secs = 120
        queue_capacity = 50
        [webhook]
        id = "1234567890"
        token = "secret"
        [feed]
        user_agent = "linux:threadwatch:v0.1 (by /u/someone)"
        polling_period_secs = 60
        [metrics]
        listen_address = "127.0.0.1:9100"

        [[filters]]
        name = "Rust jobs"
        subreddits = ["rust", "rust_jobs"]
        text_regex = "(?i)hiring"

        [[filters]]
        name = "Bots"
        subreddits = ["rust"]
        author_regex = "bot$"
        "#,
    );

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    let config = Config::load(&cli).unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.site_base_url, "https://old.reddit.com");
    assert_eq!(config.dispatch.event_timeout_secs, 30);
    assert_eq!(config.dispatch.rate_limit_cooldown_secs, 120);
    assert_eq!(config.dispatch.queue_capacity, 50);
    assert_eq!(config.webhook.id, "1234567890");
    assert_eq!(config.webhook.token, "secret");
    // Not in the file, so the default is kept.
    assert_eq!(config.webhook.api_base_url, "https://discord.com/api");
    assert_eq!(config.feed.polling_period_secs, 60);
    assert_eq!(config.feed.base_url, "https://www.reddit.com");
    assert_eq!(
        config.metrics.listen_address,
        Some("127.0.0.1:9100".parse().unwrap())
    );
    assert_eq!(config.filters.len(), 2);
    assert_eq!(config.filters[0].forums, vec!["rust", "rust_jobs"]);
    assert_eq!(config.filters[1].author_regex, "bot$");
    assert_eq!(config.filters[1].text_regex, "");

    let filters = FilterSet::new(&config.filters).unwrap();
    assert_eq!(filters.forums(), vec!["rust", "rust_jobs"]);
}

#[test]
#[serial]
fn test_load_flat_json_layout() {
    let file = write_config(
        ".json",
        r#"{
            "webhookID": "42",
            "webhookToken": "tok",
            "redditUserAgent": "my-agent",
            "filters": [
                {"name": "Go", "subreddits": ["Golang"], "textRegex": "generics", "authorRegex": ""}
            ]
        }"#,
    );

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    let config = Config::load(&cli).unwrap();

    assert_eq!(config.webhook.id, "42");
    assert_eq!(config.webhook.token, "tok");
    assert_eq!(config.feed.user_agent, "my-agent");
    // Untouched siblings keep their defaults.
    assert_eq!(config.webhook.api_base_url, "https://discord.com/api");
    assert_eq!(config.feed.polling_period_secs, 300);
    assert_eq!(config.filters.len(), 1);
    assert_eq!(config.filters[0].name, "Go");
    assert_eq!(config.filters[0].forums, vec!["Golang"]);
    assert_eq!(config.filters[0].text_regex, "generics");
    assert_eq!(config.filters[0].author_regex, "");
}

#[test]
#[serial]
fn test_env_overrides_flat_json_keys() {
    let file = write_config(
        ".json",
        r#"{"webhookID": "42", "webhookToken": "from-file"}"#,
    );
    std::env::set_var("THREADWATCH_WEBHOOK__TOKEN", "from-env");

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    let config = Config::load(&cli);
    std::env::remove_var("THREADWATCH_WEBHOOK__TOKEN");

    let config = config.unwrap();
    assert_eq!(config.webhook.id, "42");
    assert_eq!(config.webhook.token, "from-env");
}

#[test]
#[serial]
fn test_defaults_without_file() {
    let config = Config::load(&Cli::default()).unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.dispatch.event_timeout_secs, 60);
    assert_eq!(config.dispatch.rate_limit_cooldown_secs, 300);
    assert_eq!(config.feed.polling_period_secs, 300);
    assert!(!config.dry_run);
    assert!(config.filters.is_empty());
}

#[test]
#[serial]
fn test_cli_overrides_file() {
    let file = write_config(
        ".toml",
        r#"
        dry_run = false
        [feed]
        polling_period_secs = 60
        [dispatch]
        rate_limit_cooldown_secs = 10
        "#,
    );

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        polling_period: Some(15),
        delay_429: Some(600),
        dry_run: true,
        log_level: Some("trace".to_string()),
        metrics_address: Some("0.0.0.0:9000".parse().unwrap()),
    };
    let config = Config::load(&cli).unwrap();

    assert_eq!(config.feed.polling_period_secs, 15);
    assert_eq!(config.dispatch.rate_limit_cooldown_secs, 600);
    assert!(config.dry_run);
    assert_eq!(config.log_level, "trace");
    assert_eq!(
        config.metrics.listen_address,
        Some("0.0.0.0:9000".parse().unwrap())
    );
    // Sibling keys of an overridden table survive the merge.
    assert_eq!(config.dispatch.event_timeout_secs, 60);
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let file = write_config(
        ".toml",
        r#"
        [webhook]
        id = "1"
        token = "from-file"
        "#,
    );
    std::env::set_var("THREADWATCH_WEBHOOK__TOKEN", "from-env");

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    let config = Config::load(&cli);
    std::env::remove_var("THREADWATCH_WEBHOOK__TOKEN");

    let config = config.unwrap();
    assert_eq!(config.webhook.id, "1");
    assert_eq!(config.webhook.token, "from-env");
}

#[test]
#[serial]
fn test_invalid_value_type() {
    let file = write_config(
        ".toml",
        r#"
        [dispatch]
        event_timeout_secs = "a minute"
        "#,
    );

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    assert!(Config::load(&cli).is_err());
}

#[test]
#[serial]
fn test_filter_missing_name_is_rejected() {
    let file = write_config(
        ".toml",
        r#"
        [[filters]]
        subreddits = ["rust"]
        "#,
    );

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    assert!(Config::load(&cli).is_err());
}
