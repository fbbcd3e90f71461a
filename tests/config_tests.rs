//! Configuration file loading.

use std::io::Write;

use vertex_gateway::config::Config;

#[test]
fn test_load_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "server": {{"listen": "127.0.0.1:8080", "api_key": "sk-local"}},
            "vertex": {{"project_id": "my-project", "location": "europe-west1"}},
            "models": {{"chat": {{"my-alias": "gemini-2.5-flash"}}}},
            "streaming": {{"sentence_buffering": false}}
        }}"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.server.listen, "127.0.0.1:8080");
    assert_eq!(config.server.api_key.as_deref(), Some("sk-local"));
    assert!(config.server.cors);
    assert_eq!(config.vertex.project_id, "my-project");
    assert_eq!(
        config.vertex.endpoint(),
        "https://europe-west1-aiplatform.googleapis.com"
    );
    // A configured table replaces the default aliases.
    assert_eq!(config.models.chat.len(), 1);
    assert_eq!(config.models.default_chat, "gemini-2.5-pro");
    assert!(!config.streaming.sentence_buffering);
    assert_eq!(config.streaming.max_buffer_chars, 200);
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.json")).unwrap();

    assert_eq!(config.server.listen, "0.0.0.0:5000");
    assert_eq!(config.vertex.token_command[0], "gcloud");
}

#[test]
fn test_invalid_json_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"{\"server\": ").unwrap();

    assert!(Config::load(file.path()).is_err());
}
